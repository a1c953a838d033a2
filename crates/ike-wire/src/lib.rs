//! Wire framing for IKEv1/IKEv2 packets (spec §6). All numeric fields are
//! big-endian; every `decode` takes `&mut impl bytes::Buf` and every
//! `encode` takes `&mut impl bytes::BufMut`, so callers compose payloads by
//! chaining calls into one outbound buffer without intermediate `Vec`s.

pub mod delete;
pub mod digest;
pub mod encap;
pub mod header;
pub mod id;
pub mod notify;
pub mod payload;
pub mod sa;
pub mod sk;
pub mod ts;

pub use delete::DeletePayload;
pub use digest::{DigestHalf, MessageDigest, PayloadSummary};
pub use encap::Encapsulation;
pub use header::{ExchangeType, HeaderFlags, IkeHeader};
pub use id::{AuthMethod, AuthPayload, IdPayload, IdType};
pub use notify::{NotifyMessageType, NotifyPayload};
pub use payload::{GenericPayloadHeader, PayloadSet, PayloadType};
pub use sk::{Aead, FragmentReassembler, SkPayload, SkfHeader};
pub use ts::{TrafficSelector, TsPayload};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("message truncated: need at least {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown transform type {0}")]
    UnknownTransformType(u8),
    #[error("unknown protocol id {0}")]
    UnknownProtocol(u8),
    #[error("unknown traffic selector type {0}")]
    UnknownTsType(u8),
    #[error("malformed traffic selector")]
    MalformedTrafficSelector,
    #[error("malformed SK payload")]
    MalformedSkPayload,
    #[error("malformed SKF fragment")]
    MalformedFragment,
}
