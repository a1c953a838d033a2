//! `D` (Delete) payload (spec §6).

use bytes::{Buf, BufMut};

use crate::WireError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePayload {
    pub protocol_id: u8,
    pub spi_size: u8,
    pub spis: Vec<Vec<u8>>,
}

impl DeletePayload {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let protocol_id = buf.get_u8();
        let spi_size = buf.get_u8();
        let count = buf.get_u16() as usize;

        let mut spis = Vec::with_capacity(count);
        for _ in 0..count {
            if buf.remaining() < spi_size as usize {
                return Err(WireError::Truncated {
                    need: spi_size as usize,
                    have: buf.remaining(),
                });
            }
            spis.push(buf.copy_to_bytes(spi_size as usize).to_vec());
        }

        Ok(Self {
            protocol_id,
            spi_size,
            spis,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.protocol_id);
        out.put_u8(self.spi_size);
        out.put_u16(self.spis.len() as u16);
        for spi in &self.spis {
            out.put_slice(spi);
        }
    }

    /// An empty INFORMATIONAL delete-nothing body, used as a liveness probe
    /// (spec §4.5: "empty SK body ⇒ liveness probe").
    pub fn is_empty(&self) -> bool {
        self.spis.is_empty()
    }
}
