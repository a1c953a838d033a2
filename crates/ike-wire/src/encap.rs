//! UDP encapsulation (spec §6): plain UDP/500, NAT-T UDP/4500 with the
//! 4-byte non-ESP marker, and the TCP framing option.

/// The marker NAT-T prepends on UDP/4500 to disambiguate IKE traffic from
/// ESP-in-UDP traffic on the same port.
pub const NON_ESP_MARKER: [u8; 4] = [0, 0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encapsulation {
    Udp500,
    NatTUdp4500,
    Tcp,
}

/// Strip the non-ESP marker if present, telling the caller which
/// encapsulation the datagram actually used.
pub fn decapsulate(datagram: &[u8], port: u16) -> (&[u8], Encapsulation) {
    if port == 4500 && datagram.starts_with(&NON_ESP_MARKER) {
        (&datagram[4..], Encapsulation::NatTUdp4500)
    } else if port == 4500 {
        // ESP-in-UDP, not ours to parse; caller should route to the kernel.
        (datagram, Encapsulation::NatTUdp4500)
    } else {
        (datagram, Encapsulation::Udp500)
    }
}

/// Prefix the non-ESP marker when sending on the NAT-T port.
pub fn encapsulate(message: &[u8], port: u16) -> Vec<u8> {
    if port == 4500 {
        let mut out = Vec::with_capacity(4 + message.len());
        out.extend_from_slice(&NON_ESP_MARKER);
        out.extend_from_slice(message);
        out
    } else {
        message.to_vec()
    }
}

/// A 2-byte big-endian length prefix, per RFC 8229 TCP encapsulation.
pub fn tcp_frame(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + message.len());
    out.extend_from_slice(&(message.len() as u16).to_be_bytes());
    out.extend_from_slice(message);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nat_t_marker_is_stripped_and_restored() {
        let msg = b"ike-message-bytes";
        let wire = encapsulate(msg, 4500);
        assert!(wire.starts_with(&NON_ESP_MARKER));

        let (payload, encap) = decapsulate(&wire, 4500);
        assert_eq!(payload, msg);
        assert_eq!(encap, Encapsulation::NatTUdp4500);
    }

    #[test]
    fn plain_udp_500_is_untouched() {
        let msg = b"ike-message-bytes";
        let wire = encapsulate(msg, 500);
        assert_eq!(wire, msg);
        let (payload, encap) = decapsulate(&wire, 500);
        assert_eq!(payload, msg);
        assert_eq!(encap, Encapsulation::Udp500);
    }

    #[test]
    fn tcp_frame_prefixes_length() {
        let msg = b"abc";
        let framed = tcp_frame(msg);
        assert_eq!(&framed[0..2], &[0, 3]);
        assert_eq!(&framed[2..], msg);
    }
}
