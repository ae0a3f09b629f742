//! NVMe completion queue entry status.
//!
//! The 16-bit status field of a completion entry packs:
//!
//! ```text
//!  15   14   13:12   11:9   8:1   0
//! DNR   M    CRD     SCT    SC    P
//! ```
//!
//! A command succeeded when both SCT and SC are zero.

use std::fmt;

/// Status code type: generic command status.
pub const SCT_GENERIC: u8 = 0x0;
/// Status code type: command specific status.
pub const SCT_COMMAND_SPECIFIC: u8 = 0x1;
/// Status code type: media and data integrity errors.
pub const SCT_MEDIA_ERROR: u8 = 0x2;
/// Status code type: path related status.
pub const SCT_PATH: u8 = 0x3;
/// Status code type: vendor specific.
pub const SCT_VENDOR_SPECIFIC: u8 = 0x7;

/// Generic status: LBA out of range.
pub const SC_LBA_OUT_OF_RANGE: u8 = 0x80;
/// Media error status: write fault.
pub const SC_WRITE_FAULTS: u8 = 0x80;

/// Decoded status field of a completion entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionStatus {
    raw: u16,
}

impl CompletionStatus {
    /// Successful completion.
    pub const SUCCESS: Self = Self { raw: 0 };

    /// Wrap the raw status word as found in the completion entry.
    pub fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Build a status from its code type and code.
    pub fn new(sct: u8, sc: u8) -> Self {
        Self {
            raw: (u16::from(sct & 0x7) << 9) | (u16::from(sc) << 1),
        }
    }

    /// Set the Do Not Retry bit.
    pub fn with_dnr(self) -> Self {
        Self {
            raw: self.raw | (1 << 15),
        }
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// Status Code Type (bits 11:9).
    pub fn sct(&self) -> u8 {
        ((self.raw >> 9) & 0x7) as u8
    }

    /// Status Code (bits 8:1).
    pub fn sc(&self) -> u8 {
        ((self.raw >> 1) & 0xff) as u8
    }

    /// Phase tag.
    pub fn phase(&self) -> bool {
        self.raw & 1 != 0
    }

    /// More information available in the error log page.
    pub fn more(&self) -> bool {
        self.raw & (1 << 14) != 0
    }

    /// Do Not Retry.
    pub fn dnr(&self) -> bool {
        self.raw & (1 << 15) != 0
    }

    pub fn is_error(&self) -> bool {
        self.sct() != SCT_GENERIC || self.sc() != 0
    }

    /// Human-readable name of the status, in the driver's wording.
    pub fn description(&self) -> &'static str {
        match (self.sct(), self.sc()) {
            (SCT_GENERIC, 0x00) => "SUCCESS",
            (SCT_GENERIC, 0x01) => "INVALID OPCODE",
            (SCT_GENERIC, 0x02) => "INVALID FIELD",
            (SCT_GENERIC, 0x03) => "COMMAND ID CONFLICT",
            (SCT_GENERIC, 0x04) => "DATA TRANSFER ERROR",
            (SCT_GENERIC, 0x05) => "ABORTED - POWER LOSS",
            (SCT_GENERIC, 0x06) => "INTERNAL DEVICE ERROR",
            (SCT_GENERIC, 0x07) => "ABORTED - BY REQUEST",
            (SCT_GENERIC, 0x08) => "ABORTED - SQ DELETION",
            (SCT_GENERIC, 0x0b) => "INVALID NAMESPACE OR FORMAT",
            (SCT_GENERIC, 0x20) => "NAMESPACE IS WRITE PROTECTED",
            (SCT_GENERIC, SC_LBA_OUT_OF_RANGE) => "LBA OUT OF RANGE",
            (SCT_GENERIC, 0x81) => "CAPACITY EXCEEDED",
            (SCT_GENERIC, 0x82) => "NAMESPACE NOT READY",
            (SCT_COMMAND_SPECIFIC, 0x80) => "CONFLICTING ATTRIBUTES",
            (SCT_COMMAND_SPECIFIC, 0x82) => "ATTEMPTED WRITE TO READ ONLY RANGE",
            (SCT_MEDIA_ERROR, SC_WRITE_FAULTS) => "WRITE FAULTS",
            (SCT_MEDIA_ERROR, 0x81) => "UNRECOVERED READ ERROR",
            (SCT_MEDIA_ERROR, 0x86) => "ACCESS DENIED",
            (SCT_PATH, 0x00) => "INTERNAL PATH ERROR",
            (SCT_VENDOR_SPECIFIC, _) => "VENDOR SPECIFIC",
            _ => "RESERVED",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (sct {:#x} sc {:#04x}",
            self.description(),
            self.sct(),
            self.sc()
        )?;
        if self.dnr() {
            f.write_str(" dnr")?;
        }
        if self.more() {
            f.write_str(" m")?;
        }
        f.write_str(")")
    }
}

/// The completion queue entry fields a benchmark needs to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionRecord {
    /// Command specific dword 0
    pub cdw0: u32,
    /// Submission queue head pointer
    pub sqhd: u16,
    /// Submission queue identifier
    pub sqid: u16,
    /// Command identifier
    pub cid: u16,
    pub status: CompletionStatus,
}

impl CompletionRecord {
    /// A successful completion carrying no command specific data.
    pub fn success() -> Self {
        Self::default()
    }

    pub fn with_status(status: CompletionStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}

impl fmt::Display for CompletionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sqid:{} cid:{} cdw0:{:#x} sqhd:{:04x} p:{}",
            self.status,
            self.sqid,
            self.cid,
            self.cdw0,
            self.sqhd,
            u8::from(self.status.phase())
        )
    }
}
