//! Bulk-Only mass storage (BBB) with the SCSI transparent command set
//!
//! The transfer cycle is CBW, an optional data stage in either
//! direction, then CSW. Command blocks are validated, run through the
//! thirteen-case direction arbiter (BBB 6.7), and answered by the
//! SCSI responder in [`scsi`], streaming media through a [`Storage`]
//! backend one endpoint packet at a time.
//!
//! The interrupt path only records completed bulk transactions into a
//! small ring; [`Msc::service`] drains the ring from the main loop
//! and does the actual parsing and media work.

pub mod scsi;
pub mod storage;

use crate::bd::TokenPid;
use crate::bdt::Parity;
use crate::class::{ControlResponse, Function};
use crate::descriptor::Descriptors;
use crate::driver::{Driver, Transaction};
use crate::fmt::{debug, trace, warning};
use crate::interrupt_free;
use crate::setup::SetupPacket;
use scsi::{DataExpectation, ScsiCommand, Sense};
use storage::Storage;
use usb_device::UsbDirection;

/// The bulk endpoint pair
pub const BULK_EP: usize = 1;

const BULK_PACKET: usize = 64;
const CBW_LEN: usize = 31;
const CBW_SIGNATURE: [u8; 4] = 0x43425355u32.to_le_bytes();
const CSW_SIGNATURE: [u8; 4] = 0x53425355u32.to_le_bytes();

/* Class requests (BBB 3.1, 3.2) */
const BULK_ONLY_MASS_STORAGE_RESET: u8 = 0xFF;
const GET_MAX_LUN: u8 = 0xFE;

const VENDOR_ID: [u8; 8] = *b"KINETIS ";
const PRODUCT_ID: [u8; 16] = *b"USB STORAGE     ";
const PRODUCT_REV: [u8; 4] = *b"1.00";

static DEVICE_DESCRIPTOR: [u8; 18] = [
    0x12, 0x01, 0x00, 0x02, // USB 2.0
    0x00, 0x00, 0x00, // class defined at the interface
    0x40, // EP0: 64 bytes
    0xC0, 0x16, // idVendor
    0x81, 0x04, // idProduct
    0x00, 0x01, // bcdDevice 1.00
    0x01, 0x02, 0x03, // strings
    0x01, // one configuration
];

static CONFIG_DESCRIPTOR: [u8; 32] = [
    // Configuration
    0x09, 0x02, 32, 0x00, 0x01, 0x01, 0x00, 0x80, 50,
    // Interface 0: mass storage, SCSI transparent, Bulk-Only
    0x09, 0x04, 0x00, 0x00, 0x02, 0x08, 0x06, 0x50, 0x00,
    // EP1 OUT / EP1 IN, bulk
    0x07, 0x05, 0x01, 0x02, BULK_PACKET as u8, 0x00, 0x00,
    0x07, 0x05, 0x81, 0x02, BULK_PACKET as u8, 0x00, 0x00,
];

/// Descriptor set for the storage device
pub static DESCRIPTORS: Descriptors = Descriptors {
    device: &DEVICE_DESCRIPTOR,
    configurations: &[&CONFIG_DESCRIPTOR],
    langid: 0x0409,
    strings: &["kinetis-usbd", "USB storage", "00001"],
};

/// CSW status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CswStatus {
    Passed = 0x00,
    Failed = 0x01,
    PhaseError = 0x02,
}

/// A validated Command Block Wrapper
#[derive(Debug, Clone, Copy)]
struct Cbw {
    tag: u32,
    data_len: u32,
    /// Bit 7 of `bmCBWFlags`
    host_in: bool,
    lun: u8,
    cb_len: usize,
    cb: [u8; 16],
}

impl Cbw {
    /// Parse and validate 31 CBW bytes (BBB 6.2.1)
    fn parse(bytes: &[u8; CBW_LEN]) -> Option<Cbw> {
        if bytes[..4] != CBW_SIGNATURE {
            return None;
        }
        let cb_len = (bytes[14] & 0x1F) as usize;
        if !(1..=16).contains(&cb_len) {
            return None;
        }
        let mut cb = [0u8; 16];
        cb.copy_from_slice(&bytes[15..31]);
        Some(Cbw {
            tag: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            data_len: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            host_in: bytes[12] & 0x80 != 0,
            lun: bytes[13] & 0x0F,
            cb_len,
            cb,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Bulk OUT armed, expecting a CBW
    Cbw,
    /// Streaming the data stage to the host
    DataIn,
    /// Accepting the data stage from the host
    DataOut,
    /// CSW armed on bulk IN
    Csw,
    /// Data endpoint stalled after a short or failed transfer; the
    /// CSW goes out once the host clears the halt
    WaitIllegal,
    /// The CBW itself was invalid: both endpoints stay stalled until
    /// a Bulk-Only Mass Storage Reset
    WaitInvalid,
}

/// Where IN data-stage bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InSource {
    /// Sector fragments from the backend
    Media,
    /// The fixed response assembled for the command
    Fixed,
    /// Zero filler for host-overread cases
    Zeros,
}

/// Completed bulk transactions, recorded by the ISR for the main loop
#[derive(Debug, Clone, Copy)]
enum BulkEvent {
    Out { parity: Parity, len: u16 },
    In,
}

/// Bounded ring shared between the ISR and `service`
struct EventRing {
    slots: [Option<BulkEvent>; 4],
    enqueue: usize,
    dequeue: usize,
}

impl EventRing {
    const fn new() -> Self {
        EventRing {
            slots: [None; 4],
            enqueue: 0,
            dequeue: 0,
        }
    }

    fn push(&mut self, event: BulkEvent) -> bool {
        if self.slots[self.enqueue].is_some() {
            return false;
        }
        self.slots[self.enqueue] = Some(event);
        self.enqueue = (self.enqueue + 1) % self.slots.len();
        true
    }

    fn pop(&mut self) -> Option<BulkEvent> {
        let event = self.slots[self.dequeue].take()?;
        self.dequeue = (self.dequeue + 1) % self.slots.len();
        Some(event)
    }
}

enum CommandOutcome {
    Ok,
    /// CHECK CONDITION: fail the command and store sense
    Fail(Sense),
    /// Malformed in a way the spec answers with a phase error
    Phase,
}

/// The Bulk-Only mass storage function
pub struct Msc<S: Storage> {
    storage: S,
    state: State,
    events: EventRing,
    sense: Sense,

    /* per-command bookkeeping */
    tag: u32,
    host_len: u32,
    residue: u32,
    status: CswStatus,
    in_source: InSource,
    fixed: [u8; 36],
    fixed_pos: usize,
    lba: u32,
    byte_of_sector: usize,
    /// Data-stage bytes not yet handed to the SIE
    bytes_remaining: u32,
    data_done: u32,
    stall_in_after: bool,
    stall_out_after: bool,
    csw_pending: bool,
}

impl<S: Storage> Msc<S> {
    pub fn new(storage: S) -> Self {
        Msc {
            storage,
            state: State::Cbw,
            events: EventRing::new(),
            sense: Sense::NONE,
            tag: 0,
            host_len: 0,
            residue: 0,
            status: CswStatus::Passed,
            in_source: InSource::Fixed,
            fixed: [0; 36],
            fixed_pos: 0,
            lba: 0,
            byte_of_sector: 0,
            bytes_remaining: 0,
            data_done: 0,
            stall_in_after: false,
            stall_out_after: false,
            csw_pending: false,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Drain completed bulk transactions; call from the main loop
    ///
    /// Command parsing and media access happen here, never in the
    /// interrupt handler.
    pub fn service(&mut self, driver: &mut Driver) {
        loop {
            let event = interrupt_free(|| self.events.pop());
            match event {
                Some(BulkEvent::Out { parity, len }) => self.on_bulk_out(driver, parity, len),
                Some(BulkEvent::In) => self.on_bulk_in(driver),
                None => break,
            }
        }
    }

    fn on_bulk_out(&mut self, driver: &mut Driver, parity: Parity, len: u16) {
        let transaction = Transaction {
            ep: BULK_EP,
            direction: UsbDirection::Out,
            parity,
            pid: TokenPid::Out,
            len: len as usize,
        };
        match self.state {
            State::Cbw => {
                let mut bytes = [0u8; CBW_LEN];
                if transaction.len != CBW_LEN {
                    self.invalid_cbw(driver);
                    return;
                }
                driver.read_out(&transaction, &mut bytes);
                match Cbw::parse(&bytes) {
                    Some(cbw) if cbw.lun == 0 => self.handle_cbw(driver, cbw),
                    _ => self.invalid_cbw(driver),
                }
            }
            State::DataOut => {
                let mut packet = [0u8; BULK_PACKET];
                let len = driver.read_out(&transaction, &mut packet);
                self.write_packet(driver, &packet[..len]);
            }
            _ => {
                warning!("bbb: unexpected bulk out");
            }
        }
    }

    fn on_bulk_in(&mut self, driver: &mut Driver) {
        match self.state {
            State::DataIn => {
                if self.bytes_remaining > 0 {
                    self.continue_data_in(driver);
                } else {
                    self.end_data_in(driver);
                }
            }
            State::Csw => {
                // Status wrapper delivered; expect the next command
                self.state = State::Cbw;
                let _ = driver.arm_out(BULK_EP);
            }
            _ => {}
        }
    }

    /// BBB 6.6.1: bad CBW. No CSW; both endpoints stall until reset.
    fn invalid_cbw(&mut self, driver: &mut Driver) {
        warning!("bbb: invalid cbw");
        driver.stall(BULK_EP, UsbDirection::Out);
        driver.stall(BULK_EP, UsbDirection::In);
        self.state = State::WaitInvalid;
    }

    fn handle_cbw(&mut self, driver: &mut Driver, cbw: Cbw) {
        let command = scsi::parse(&cbw.cb[..cbw.cb_len]);
        self.tag = cbw.tag;
        self.host_len = cbw.data_len;
        self.status = CswStatus::Passed;
        self.residue = 0;
        self.data_done = 0;
        self.bytes_remaining = 0;
        self.stall_in_after = false;
        self.stall_out_after = false;
        trace!("bbb: cbw tag {=u32:x} len {=u32}", cbw.tag, cbw.data_len);

        match self.check_command(command) {
            CommandOutcome::Fail(sense) => {
                self.fail_command(driver, cbw.host_in, sense);
                return;
            }
            CommandOutcome::Phase => {
                self.phase_error(driver, cbw.host_in);
                return;
            }
            CommandOutcome::Ok => {}
        }

        let expectation = self.prepare(command);
        let case = scsi::classify(cbw.data_len, cbw.host_in, expectation);
        trace!("bbb: case {=u8}", case);

        let h = cbw.data_len;
        let device_bytes = match expectation {
            DataExpectation::None => 0,
            DataExpectation::In(d) | DataExpectation::Out(d) => d,
        };

        match case {
            1 => self.send_csw(driver),
            2 | 3 => {
                self.status = CswStatus::PhaseError;
                self.send_csw(driver);
            }
            4 | 8 => {
                // Host reads although the device has nothing: feed it
                // zeros and report that none of them were data
                self.in_source = InSource::Zeros;
                self.bytes_remaining = h;
                self.residue = h;
                if case == 8 {
                    self.status = CswStatus::PhaseError;
                }
                self.state = State::DataIn;
                self.continue_data_in(driver);
            }
            5 | 6 | 7 => {
                self.bytes_remaining = device_bytes.min(h);
                self.residue = h - self.bytes_remaining;
                match case {
                    5 => self.stall_in_after = true,
                    7 => self.status = CswStatus::PhaseError,
                    _ => {}
                }
                self.state = State::DataIn;
                self.continue_data_in(driver);
            }
            9 => {
                driver.stall(BULK_EP, UsbDirection::Out);
                self.residue = h;
                self.send_csw(driver);
            }
            10 => {
                driver.stall(BULK_EP, UsbDirection::In);
                self.status = CswStatus::PhaseError;
                self.residue = h;
                self.defer_csw();
            }
            11 | 12 => {
                self.bytes_remaining = device_bytes.min(h);
                self.residue = h - self.bytes_remaining;
                self.stall_out_after = case == 11;
                self.state = State::DataOut;
                let _ = driver.arm_out(BULK_EP);
            }
            _ => {
                // 13
                driver.stall(BULK_EP, UsbDirection::Out);
                self.status = CswStatus::PhaseError;
                self.residue = h;
                self.send_csw(driver);
            }
        }
    }

    /// Validate a command before any data moves
    fn check_command(&mut self, command: ScsiCommand) -> CommandOutcome {
        match command {
            ScsiCommand::Unknown(opcode) => {
                debug!("scsi: unknown opcode {=u8:x}", opcode);
                CommandOutcome::Fail(Sense::INVALID_COMMAND)
            }
            ScsiCommand::TestUnitReady | ScsiCommand::StartStopUnit => {
                if self.storage.media_present() {
                    CommandOutcome::Ok
                } else {
                    CommandOutcome::Fail(Sense::MEDIUM_NOT_PRESENT)
                }
            }
            ScsiCommand::ReadCapacity10 { pmi, lba } => {
                if !self.storage.media_present() {
                    CommandOutcome::Fail(Sense::MEDIUM_NOT_PRESENT)
                } else if !pmi && lba != 0 {
                    CommandOutcome::Phase
                } else {
                    CommandOutcome::Ok
                }
            }
            ScsiCommand::Read10 { lba, blocks } => self.check_range(lba, blocks),
            ScsiCommand::Write10 { lba, blocks } => {
                if self.storage.write_protected() {
                    CommandOutcome::Fail(Sense::WRITE_PROTECTED)
                } else {
                    self.check_range(lba, blocks)
                }
            }
            _ => CommandOutcome::Ok,
        }
    }

    fn check_range(&mut self, lba: u32, blocks: u16) -> CommandOutcome {
        if !self.storage.media_present() {
            return CommandOutcome::Fail(Sense::MEDIUM_NOT_PRESENT);
        }
        let end = lba as u64 + blocks as u64;
        if end > self.storage.capacity_blocks() as u64 {
            CommandOutcome::Fail(Sense::LBA_OUT_OF_RANGE)
        } else {
            CommandOutcome::Ok
        }
    }

    /// Set up the data stage and report the device's intent
    ///
    /// A command that reaches this point will pass, so the stored
    /// sense resets here; REQUEST_SENSE first snapshots it into the
    /// response.
    fn prepare(&mut self, command: ScsiCommand) -> DataExpectation {
        let expectation = match command {
            ScsiCommand::Inquiry { alloc_len } => {
                let response =
                    scsi::inquiry_response(&VENDOR_ID, &PRODUCT_ID, &PRODUCT_REV);
                self.fixed[..36].copy_from_slice(&response);
                self.fixed_response(36, alloc_len as u32)
            }
            ScsiCommand::RequestSense { alloc_len } => {
                let response = self.sense.fixed();
                self.fixed[..18].copy_from_slice(&response);
                self.fixed_response(18, alloc_len as u32)
            }
            ScsiCommand::ModeSense6 { alloc_len } => {
                let response = scsi::mode_sense_response(self.storage.write_protected());
                self.fixed[..4].copy_from_slice(&response);
                self.fixed_response(4, alloc_len as u32)
            }
            ScsiCommand::ReadCapacity10 { .. } => {
                let response = scsi::read_capacity_response(
                    self.storage.capacity_blocks(),
                    self.storage.block_size() as u32,
                );
                self.fixed[..8].copy_from_slice(&response);
                self.fixed_response(8, u32::MAX)
            }
            ScsiCommand::Read10 { lba, blocks } => {
                self.in_source = InSource::Media;
                self.lba = lba;
                self.byte_of_sector = 0;
                expect_blocks(blocks, self.storage.block_size(), DataExpectation::In)
            }
            ScsiCommand::Write10 { lba, blocks } => {
                self.lba = lba;
                self.byte_of_sector = 0;
                expect_blocks(blocks, self.storage.block_size(), DataExpectation::Out)
            }
            ScsiCommand::TestUnitReady
            | ScsiCommand::StartStopUnit
            | ScsiCommand::PreventAllowMediumRemoval
            | ScsiCommand::Unknown(_) => DataExpectation::None,
        };
        self.sense = Sense::NONE;
        expectation
    }

    fn fixed_response(&mut self, len: u32, alloc_len: u32) -> DataExpectation {
        self.in_source = InSource::Fixed;
        self.fixed_pos = 0;
        let len = len.min(alloc_len);
        if len == 0 {
            DataExpectation::None
        } else {
            DataExpectation::In(len)
        }
    }

    /// Stage the next IN packet of the data stage
    fn continue_data_in(&mut self, driver: &mut Driver) {
        let mut packet = [0u8; BULK_PACKET];
        let mut chunk = (self.bytes_remaining as usize).min(BULK_PACKET);

        match self.in_source {
            InSource::Zeros => {}
            InSource::Fixed => {
                packet[..chunk].copy_from_slice(&self.fixed[self.fixed_pos..self.fixed_pos + chunk]);
                self.fixed_pos += chunk;
            }
            InSource::Media => {
                let block = self.storage.block_size();
                chunk = chunk.min(block - self.byte_of_sector);
                if let Err(_err) = self.storage.read_chunk(
                    self.lba,
                    self.byte_of_sector,
                    &mut packet[..chunk],
                ) {
                    self.abort_data_in(driver, Sense::UNRECOVERED_READ_ERROR);
                    return;
                }
                self.byte_of_sector += chunk;
                if self.byte_of_sector == block {
                    self.byte_of_sector = 0;
                    self.lba += 1;
                }
            }
        }

        if driver.arm_in(BULK_EP, &packet[..chunk]).is_err() {
            warning!("bbb: bulk in arm failed");
            return;
        }
        self.bytes_remaining -= chunk as u32;
        self.data_done += chunk as u32;
    }

    /// The whole data stage went out; stall if the case demands it,
    /// then send the status
    fn end_data_in(&mut self, driver: &mut Driver) {
        if self.stall_in_after {
            driver.stall(BULK_EP, UsbDirection::In);
            self.defer_csw();
        } else {
            self.send_csw(driver);
        }
    }

    fn abort_data_in(&mut self, driver: &mut Driver, sense: Sense) {
        self.sense = sense;
        self.status = CswStatus::Failed;
        self.residue = self.host_len - self.data_done;
        driver.stall(BULK_EP, UsbDirection::In);
        self.defer_csw();
    }

    /// One packet of the host-to-device data stage
    fn write_packet(&mut self, driver: &mut Driver, data: &[u8]) {
        let block = self.storage.block_size();
        let mut offset = 0;
        while offset < data.len() {
            let chunk = (data.len() - offset).min(block - self.byte_of_sector);
            if let Err(_err) =
                self.storage
                    .write_chunk(self.lba, self.byte_of_sector, &data[offset..offset + chunk])
            {
                self.sense = Sense::WRITE_FAULT;
                self.status = CswStatus::Failed;
                self.residue = self.host_len - self.data_done;
                driver.stall(BULK_EP, UsbDirection::Out);
                self.send_csw(driver);
                return;
            }
            self.byte_of_sector += chunk;
            if self.byte_of_sector == block {
                self.byte_of_sector = 0;
                self.lba += 1;
            }
            offset += chunk;
        }

        self.data_done += data.len() as u32;
        self.bytes_remaining = self.bytes_remaining.saturating_sub(data.len() as u32);
        if self.bytes_remaining == 0 {
            if self.stall_out_after {
                driver.stall(BULK_EP, UsbDirection::Out);
            }
            self.send_csw(driver);
        } else {
            let _ = driver.arm_out(BULK_EP);
        }
    }

    /// Fail before the data stage (BBB 6.7.2 / 6.7.3 short paths)
    ///
    /// Stalls the endpoint the host expects data on, stores sense for
    /// the follow-up REQUEST_SENSE, and reports the full residue.
    fn fail_command(&mut self, driver: &mut Driver, host_in: bool, sense: Sense) {
        self.sense = sense;
        self.status = CswStatus::Failed;
        self.residue = self.host_len;
        if self.host_len > 0 {
            if host_in {
                driver.stall(BULK_EP, UsbDirection::In);
                self.defer_csw();
                return;
            }
            driver.stall(BULK_EP, UsbDirection::Out);
        }
        self.send_csw(driver);
    }

    fn phase_error(&mut self, driver: &mut Driver, host_in: bool) {
        self.status = CswStatus::PhaseError;
        self.residue = self.host_len;
        if self.host_len > 0 {
            if host_in {
                driver.stall(BULK_EP, UsbDirection::In);
                self.defer_csw();
                return;
            }
            driver.stall(BULK_EP, UsbDirection::Out);
        }
        self.send_csw(driver);
    }

    /// The CSW has to wait until the host clears the IN halt
    fn defer_csw(&mut self) {
        self.csw_pending = true;
        self.state = State::WaitIllegal;
    }

    fn send_csw(&mut self, driver: &mut Driver) {
        let mut csw = [0u8; 13];
        csw[..4].copy_from_slice(&CSW_SIGNATURE);
        csw[4..8].copy_from_slice(&self.tag.to_le_bytes());
        csw[8..12].copy_from_slice(&self.residue.to_le_bytes());
        csw[12] = self.status as u8;
        trace!("bbb: csw status {=u8} residue {=u32}", csw[12], self.residue);

        self.csw_pending = false;
        if driver.arm_in(BULK_EP, &csw).is_ok() {
            self.state = State::Csw;
        } else {
            // IN halted; hold the CSW for the clear-halt hook
            self.defer_csw();
        }
    }

    /// Reset transport bookkeeping (BOMSR)
    ///
    /// Halted endpoints stay halted: hosts follow the reset with a
    /// Clear-Feature on each bulk endpoint, and only then does the
    /// transport expect the next CBW.
    fn bulk_only_reset(&mut self, driver: &mut Driver) {
        debug!("bbb: reset");
        self.state = State::Cbw;
        self.csw_pending = false;
        self.bytes_remaining = 0;
        self.sense = Sense::NONE;
        let _ = driver.arm_out(BULK_EP);
    }
}

/// `blocks * block_size` as a device expectation, `None` when zero
fn expect_blocks(
    blocks: u16,
    block_size: usize,
    direction: fn(u32) -> DataExpectation,
) -> DataExpectation {
    if blocks == 0 {
        DataExpectation::None
    } else {
        direction(blocks as u32 * block_size as u32)
    }
}

impl<S: Storage> Function for Msc<S> {
    fn init(&mut self, driver: &mut Driver) {
        self.state = State::Cbw;
        self.csw_pending = false;
        self.events = EventRing::new();

        driver.configure_endpoint(BULK_EP, UsbDirection::Out, BULK_PACKET);
        driver.configure_endpoint(BULK_EP, UsbDirection::In, BULK_PACKET);
        let _ = driver.arm_out(BULK_EP);
        debug!("msc configured");
    }

    fn tasks(&mut self, _driver: &mut Driver, transaction: &Transaction) {
        if transaction.ep != BULK_EP {
            return;
        }
        let event = match transaction.direction {
            UsbDirection::Out => BulkEvent::Out {
                parity: transaction.parity,
                len: transaction.len as u16,
            },
            UsbDirection::In => BulkEvent::In,
        };
        if !interrupt_free(|| self.events.push(event)) {
            warning!("bbb: event ring full");
        }
    }

    fn class_request<'a>(
        &'a mut self,
        driver: &mut Driver,
        setup: &SetupPacket,
    ) -> ControlResponse<'a> {
        match setup.request {
            BULK_ONLY_MASS_STORAGE_RESET if setup.length == 0 => {
                self.bulk_only_reset(driver);
                ControlResponse::AcceptStatus
            }
            // A single logical unit; zero is the answer Windows
            // insists on hearing
            GET_MAX_LUN => ControlResponse::DataInStatic(&[0x00]),
            _ => ControlResponse::Reject,
        }
    }

    fn clear_halt(&mut self, driver: &mut Driver, ep: usize, dir: UsbDirection) {
        if ep != BULK_EP {
            return;
        }
        match self.state {
            // Stalls persist until a Bulk-Only Mass Storage Reset
            State::WaitInvalid => driver.stall(ep, dir),
            State::WaitIllegal if dir == UsbDirection::In && self.csw_pending => {
                self.send_csw(driver);
            }
            State::Cbw if dir == UsbDirection::Out => {
                let _ = driver.arm_out(BULK_EP);
            }
            _ => {}
        }
    }
}
