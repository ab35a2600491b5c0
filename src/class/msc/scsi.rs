//! SCSI transparent command set
//!
//! Command block parsing, the fixed-format responses, sense
//! bookkeeping, and the Bulk-Only data-direction arbitration
//! ("the thirteen cases", BBB spec 6.7).

use num_enum::TryFromPrimitive;

/* SPC */
pub const TEST_UNIT_READY: u8 = 0x00;
pub const REQUEST_SENSE: u8 = 0x03;
pub const INQUIRY: u8 = 0x12;
pub const MODE_SENSE_6: u8 = 0x1A;
pub const START_STOP_UNIT: u8 = 0x1B;
pub const PREVENT_ALLOW_MEDIUM_REMOVAL: u8 = 0x1E;

/* SBC */
pub const READ_CAPACITY_10: u8 = 0x25;
pub const READ_10: u8 = 0x28;
pub const WRITE_10: u8 = 0x2A;

/// A parsed command block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScsiCommand {
    TestUnitReady,
    RequestSense { alloc_len: u8 },
    Inquiry { alloc_len: u16 },
    ModeSense6 { alloc_len: u8 },
    StartStopUnit,
    PreventAllowMediumRemoval,
    ReadCapacity10 { pmi: bool, lba: u32 },
    Read10 { lba: u32, blocks: u16 },
    Write10 { lba: u32, blocks: u16 },
    Unknown(u8),
}

/// Decode the command block of a CBW
///
/// Multi-byte SCSI fields are big-endian, unlike the CBW framing
/// around them.
pub fn parse(cb: &[u8]) -> ScsiCommand {
    if cb.is_empty() {
        return ScsiCommand::Unknown(0);
    }
    match cb[0] {
        TEST_UNIT_READY if cb.len() >= 6 => ScsiCommand::TestUnitReady,
        REQUEST_SENSE if cb.len() >= 6 => ScsiCommand::RequestSense { alloc_len: cb[4] },
        INQUIRY if cb.len() >= 6 => ScsiCommand::Inquiry {
            alloc_len: u16::from_be_bytes([cb[3], cb[4]]),
        },
        MODE_SENSE_6 if cb.len() >= 6 => ScsiCommand::ModeSense6 { alloc_len: cb[4] },
        START_STOP_UNIT if cb.len() >= 6 => ScsiCommand::StartStopUnit,
        PREVENT_ALLOW_MEDIUM_REMOVAL if cb.len() >= 6 => ScsiCommand::PreventAllowMediumRemoval,
        READ_CAPACITY_10 if cb.len() >= 10 => ScsiCommand::ReadCapacity10 {
            pmi: cb[8] & 1 != 0,
            lba: u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]),
        },
        READ_10 if cb.len() >= 10 => ScsiCommand::Read10 {
            lba: u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]),
            blocks: u16::from_be_bytes([cb[7], cb[8]]),
        },
        WRITE_10 if cb.len() >= 10 => ScsiCommand::Write10 {
            lba: u32::from_be_bytes([cb[2], cb[3], cb[4], cb[5]]),
            blocks: u16::from_be_bytes([cb[7], cb[8]]),
        },
        opcode => ScsiCommand::Unknown(opcode),
    }
}

/// Sense keys carried in fixed-format sense data
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SenseKey {
    NoSense = 0x0,
    NotReady = 0x2,
    MediumError = 0x3,
    IllegalRequest = 0x5,
    DataProtect = 0x7,
}

/// The error a failed command leaves behind for REQUEST_SENSE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sense {
    pub key: SenseKey,
    pub asc: u8,
    pub ascq: u8,
}

impl Sense {
    pub const NONE: Sense = Sense {
        key: SenseKey::NoSense,
        asc: 0x00,
        ascq: 0x00,
    };
    pub const INVALID_COMMAND: Sense = Sense {
        key: SenseKey::IllegalRequest,
        asc: 0x20,
        ascq: 0x00,
    };
    pub const LBA_OUT_OF_RANGE: Sense = Sense {
        key: SenseKey::IllegalRequest,
        asc: 0x21,
        ascq: 0x00,
    };
    pub const WRITE_PROTECTED: Sense = Sense {
        key: SenseKey::DataProtect,
        asc: 0x27,
        ascq: 0x00,
    };
    pub const MEDIUM_NOT_PRESENT: Sense = Sense {
        key: SenseKey::NotReady,
        asc: 0x3A,
        ascq: 0x00,
    };
    pub const UNRECOVERED_READ_ERROR: Sense = Sense {
        key: SenseKey::MediumError,
        asc: 0x11,
        ascq: 0x00,
    };
    pub const WRITE_FAULT: Sense = Sense {
        key: SenseKey::MediumError,
        asc: 0x03,
        ascq: 0x00,
    };

    /// Fixed-format sense data, 18 bytes
    pub fn fixed(&self) -> [u8; 18] {
        let mut data = [0u8; 18];
        data[0] = 0x70; // current error, fixed format
        data[2] = self.key as u8;
        data[7] = 10; // additional length
        data[12] = self.asc;
        data[13] = self.ascq;
        data
    }
}

/// 36-byte standard INQUIRY response
pub fn inquiry_response(vendor: &[u8; 8], product: &[u8; 16], revision: &[u8; 4]) -> [u8; 36] {
    let mut data = [0u8; 36];
    data[0] = 0x00; // direct access block device, connected
    data[1] = 0x80; // removable
    data[2] = 0x04; // SPC-2
    data[3] = 0x02; // response data format
    data[4] = 0x20; // additional length: 32
    data[8..16].copy_from_slice(vendor);
    data[16..32].copy_from_slice(product);
    data[32..36].copy_from_slice(revision);
    data
}

/// 8-byte READ CAPACITY(10) response
pub fn read_capacity_response(capacity_blocks: u32, block_size: u32) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&(capacity_blocks - 1).to_be_bytes());
    data[4..].copy_from_slice(&block_size.to_be_bytes());
    data
}

/// 4-byte minimal MODE SENSE(6) response
pub fn mode_sense_response(write_protected: bool) -> [u8; 4] {
    [3, 0, if write_protected { 0x80 } else { 0x00 }, 0]
}

/// What the device intends to transfer for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataExpectation {
    /// No data stage
    None,
    /// Device-to-host, this many bytes
    In(u32),
    /// Host-to-device, this many bytes
    Out(u32),
}

/// Classify a transfer per the Bulk-Only thirteen cases (BBB 6.7)
///
/// `host_in` is bit 7 of `bmCBWFlags`, only meaningful when the
/// host expects data (`h > 0`).
pub fn classify(h: u32, host_in: bool, device: DataExpectation) -> u8 {
    use DataExpectation::*;
    if h == 0 {
        return match device {
            None => 1,
            In(_) => 2,
            Out(_) => 3,
        };
    }
    if host_in {
        match device {
            None => 4,
            In(d) if d < h => 5,
            In(d) if d == h => 6,
            In(_) => 7,
            Out(_) => 8,
        }
    } else {
        match device {
            None => 9,
            In(_) => 10,
            Out(d) if d < h => 11,
            Out(d) if d == h => 12,
            Out(_) => 13,
        }
    }
}
