//! `SK`/`SKF` (Encrypted and Encrypted Fragment) payloads (spec §4.5, §6).
//!
//! The actual AEAD mechanics are an opaque, externally-supplied provider
//! (spec §1 "out of scope"); this module only owns wire framing and
//! fragment reassembly. [`Aead`] is the seam a real cipher implementation
//! plugs into.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

use crate::WireError;

/// AEAD encrypt/decrypt, supplied externally (spec §1). The nonce is
/// `salt ‖ wire_iv`; the tag is appended contiguously to the ciphertext so
/// that encrypted output length always equals plaintext length plus tag
/// length exactly (spec §8 boundary behavior).
pub trait Aead {
    fn tag_len(&self) -> usize;
    fn iv_len(&self) -> usize;

    fn encrypt(&self, iv: &[u8], associated_data: &[u8], plaintext: &[u8]) -> Vec<u8>;

    fn decrypt(
        &self,
        iv: &[u8],
        associated_data: &[u8],
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>, WireError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkPayload {
    pub iv: Bytes,
    /// Ciphertext with the AEAD tag appended contiguously.
    pub ciphertext_and_tag: Bytes,
}

impl SkPayload {
    pub fn encrypt(cipher: &dyn Aead, iv: &[u8], associated_data: &[u8], plaintext: &[u8]) -> Self {
        let ct = cipher.encrypt(iv, associated_data, plaintext);
        debug_assert_eq!(ct.len(), plaintext.len() + cipher.tag_len());
        Self {
            iv: Bytes::copy_from_slice(iv),
            ciphertext_and_tag: Bytes::from(ct),
        }
    }

    pub fn decrypt(&self, cipher: &dyn Aead, associated_data: &[u8]) -> Result<Vec<u8>, WireError> {
        if self.iv.len() != cipher.iv_len() {
            return Err(WireError::MalformedSkPayload);
        }
        if self.ciphertext_and_tag.len() < cipher.tag_len() {
            return Err(WireError::MalformedSkPayload);
        }
        cipher.decrypt(&self.iv, associated_data, &self.ciphertext_and_tag)
    }

    pub fn decode(buf: &mut impl Buf, iv_len: usize) -> Result<Self, WireError> {
        if buf.remaining() < iv_len {
            return Err(WireError::Truncated {
                need: iv_len,
                have: buf.remaining(),
            });
        }
        let iv = buf.copy_to_bytes(iv_len);
        let ciphertext_and_tag = buf.copy_to_bytes(buf.remaining());
        Ok(Self {
            iv,
            ciphertext_and_tag,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_slice(&self.iv);
        out.put_slice(&self.ciphertext_and_tag);
    }
}

/// Reassembles `SKF` fragments back into the logical `SK` payload they
/// replace. A standalone `SKF` is treated identically to `SK` once
/// reassembled (spec §4.5 step 1 normalization).
#[derive(Debug, Default)]
pub struct FragmentReassembler {
    fragments: BTreeMap<u16, Bytes>,
    total: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkfHeader {
    pub fragment_number: u16,
    pub total_fragments: u16,
}

impl FragmentReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the reassembled, concatenated ciphertext once every fragment
    /// from 1..=total has arrived.
    pub fn add(&mut self, header: SkfHeader, data: Bytes) -> Result<Option<BytesMut>, WireError> {
        if header.fragment_number == 0 || header.fragment_number > header.total_fragments {
            return Err(WireError::MalformedFragment);
        }

        match self.total {
            Some(total) if total != header.total_fragments => {
                return Err(WireError::MalformedFragment);
            }
            _ => self.total = Some(header.total_fragments),
        }

        self.fragments.insert(header.fragment_number, data);

        let total = header.total_fragments as usize;
        if self.fragments.len() < total {
            return Ok(None);
        }

        let mut out = BytesMut::new();
        for i in 1..=header.total_fragments {
            let Some(chunk) = self.fragments.get(&i) else {
                return Ok(None);
            };
            out.extend_from_slice(chunk);
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct XorCipher {
        key: u8,
    }

    impl Aead for XorCipher {
        fn tag_len(&self) -> usize {
            4
        }

        fn iv_len(&self) -> usize {
            8
        }

        fn encrypt(&self, _iv: &[u8], _ad: &[u8], plaintext: &[u8]) -> Vec<u8> {
            let mut out: Vec<u8> = plaintext.iter().map(|b| b ^ self.key).collect();
            out.extend_from_slice(&[0xAA; 4]);
            out
        }

        fn decrypt(&self, _iv: &[u8], _ad: &[u8], ct: &[u8]) -> Result<Vec<u8>, WireError> {
            let (body, tag) = ct.split_at(ct.len() - 4);
            if tag != [0xAA; 4] {
                return Err(WireError::MalformedSkPayload);
            }
            Ok(body.iter().map(|b| b ^ self.key).collect())
        }
    }

    #[test]
    fn aead_output_length_equals_input_plus_tag() {
        let cipher = XorCipher { key: 0x42 };
        let plaintext = b"hello world";
        let sk = SkPayload::encrypt(&cipher, &[0u8; 8], b"ad", plaintext);
        assert_eq!(
            sk.ciphertext_and_tag.len(),
            plaintext.len() + cipher.tag_len()
        );

        let decrypted = sk.decrypt(&cipher, b"ad").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn fragments_reassemble_in_order_regardless_of_arrival_order() {
        let mut reassembler = FragmentReassembler::new();

        let h = |n, total| SkfHeader {
            fragment_number: n,
            total_fragments: total,
        };

        assert!(reassembler
            .add(h(2, 3), Bytes::from_static(b"BBB"))
            .unwrap()
            .is_none());
        assert!(reassembler
            .add(h(3, 3), Bytes::from_static(b"CCC"))
            .unwrap()
            .is_none());
        let full = reassembler
            .add(h(1, 3), Bytes::from_static(b"AAA"))
            .unwrap()
            .unwrap();

        assert_eq!(&full[..], b"AAABBBCCC");
    }

    #[test]
    fn fragment_number_zero_is_rejected() {
        let mut reassembler = FragmentReassembler::new();
        assert!(matches!(
            reassembler.add(
                SkfHeader {
                    fragment_number: 0,
                    total_fragments: 1
                },
                Bytes::new()
            ),
            Err(WireError::MalformedFragment)
        ));
    }
}
