//! Categorized return codes surfaced to the admin CLI (spec §6). These
//! mirror the original source's `RC_*` whack return classes; integration
//! tests assert on the numeric value of `ExitCode`, so renumbering any of
//! these is a breaking change.

use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Success = 0,
    Log = 1,
    Route = 2,
    RtBusy = 3,
    NoPeerIp = 4,
    Orient = 5,
    InitShunt = 6,
    OppoFailure = 7,
    UnknownName = 8,
    DupName = 9,
    Fatal = 10,
}

impl ReturnCode {
    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReturnCode::Success => "RC_SUCCESS",
            ReturnCode::Log => "RC_LOG",
            ReturnCode::Route => "RC_ROUTE",
            ReturnCode::RtBusy => "RC_RTBUSY",
            ReturnCode::NoPeerIp => "RC_NOPEERIP",
            ReturnCode::Orient => "RC_ORIENT",
            ReturnCode::InitShunt => "RC_INITSHUNT",
            ReturnCode::OppoFailure => "RC_OPPOFAILURE",
            ReturnCode::UnknownName => "RC_UNKNOWN_NAME",
            ReturnCode::DupName => "RC_DUPNAME",
            ReturnCode::Fatal => "RC_FATAL",
        };
        f.write_str(name)
    }
}
