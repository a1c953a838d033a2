//! `N` (Notify) payload body (spec §6).

use bytes::{Buf, BufMut, Bytes};

use crate::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyMessageType {
    NothingWrong,
    Cookie,
    InvalidKePayload,
    Redirect,
    RedirectSupported,
    RekeySa,
    NoProposalChosen,
    AuthenticationFailed,
    TsUnacceptable,
    AdditionalTsPossible,
    MobikeSupported,
    Other(u16),
}

impl NotifyMessageType {
    pub fn to_wire(self) -> u16 {
        match self {
            NotifyMessageType::NothingWrong => 0,
            NotifyMessageType::NoProposalChosen => 14,
            NotifyMessageType::InvalidKePayload => 17,
            NotifyMessageType::AuthenticationFailed => 24,
            NotifyMessageType::TsUnacceptable => 39,
            NotifyMessageType::RekeySa => 16393,
            NotifyMessageType::Cookie => 16390,
            NotifyMessageType::AdditionalTsPossible => 16404,
            NotifyMessageType::MobikeSupported => 16396,
            NotifyMessageType::Redirect => 16407,
            NotifyMessageType::RedirectSupported => 16408,
            NotifyMessageType::Other(v) => v,
        }
    }

    pub fn from_wire(v: u16) -> Self {
        match v {
            0 => NotifyMessageType::NothingWrong,
            14 => NotifyMessageType::NoProposalChosen,
            17 => NotifyMessageType::InvalidKePayload,
            24 => NotifyMessageType::AuthenticationFailed,
            39 => NotifyMessageType::TsUnacceptable,
            16393 => NotifyMessageType::RekeySa,
            16390 => NotifyMessageType::Cookie,
            16404 => NotifyMessageType::AdditionalTsPossible,
            16396 => NotifyMessageType::MobikeSupported,
            16407 => NotifyMessageType::Redirect,
            16408 => NotifyMessageType::RedirectSupported,
            other => NotifyMessageType::Other(other),
        }
    }

    /// Error notifications (< 16384) MUST abort the exchange; status
    /// notifications (>= 16384) are informational.
    pub fn is_error(self) -> bool {
        self.to_wire() < 16384 && !matches!(self, NotifyMessageType::NothingWrong)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyPayload {
    pub protocol_id: u8,
    pub spi: Bytes,
    pub message_type: NotifyMessageType,
    pub data: Bytes,
}

impl NotifyPayload {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                need: 4,
                have: buf.remaining(),
            });
        }
        let protocol_id = buf.get_u8();
        let spi_size = buf.get_u8() as usize;
        let message_type = NotifyMessageType::from_wire(buf.get_u16());

        if buf.remaining() < spi_size {
            return Err(WireError::Truncated {
                need: spi_size,
                have: buf.remaining(),
            });
        }
        let spi = buf.copy_to_bytes(spi_size);
        let data = buf.copy_to_bytes(buf.remaining());

        Ok(Self {
            protocol_id,
            spi,
            message_type,
            data,
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u8(self.protocol_id);
        out.put_u8(self.spi.len() as u8);
        out.put_u16(self.message_type.to_wire());
        out.put_slice(&self.spi);
        out.put_slice(&self.data);
    }

    pub fn empty(message_type: NotifyMessageType) -> Self {
        Self {
            protocol_id: 0,
            spi: Bytes::new(),
            message_type,
            data: Bytes::new(),
        }
    }
}
