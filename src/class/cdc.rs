//! CDC-ACM: a virtual serial port
//!
//! Two interfaces: the communication interface with its interrupt
//! notification endpoint, and the data interface with a bulk pair.
//! Flow control is application driven: a received bulk packet parks
//! in the function until the application drains it, and only then is
//! the OUT endpoint re-armed.

use crate::class::{ControlResponse, Function};
use crate::descriptor::Descriptors;
use crate::driver::{Driver, EndpointError, Transaction};
use crate::fmt::{debug, trace};
use crate::setup::SetupPacket;
use usb_device::UsbDirection;

/// Interrupt IN endpoint carrying SERIAL_STATE notifications
pub const NOTIFICATION_EP: usize = 1;
/// Bulk endpoint pair carrying serial data
pub const DATA_EP: usize = 2;

const NOTIFICATION_PACKET: usize = 16;
const BULK_PACKET: usize = 64;

/* Class requests (CDC PSTN subclass) */
const SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
const GET_ENCAPSULATED_RESPONSE: u8 = 0x01;
const SET_LINE_CODING: u8 = 0x20;
const GET_LINE_CODING: u8 = 0x21;
const SET_CONTROL_LINE_STATE: u8 = 0x22;

/// SERIAL_STATE notification code
const SERIAL_STATE: u8 = 0x20;

static DEVICE_DESCRIPTOR: [u8; 18] = [
    0x12, // bLength
    0x01, // DEVICE
    0x00, 0x02, // USB 2.0
    0x02, // Communications device class
    0x00, 0x00, // no subclass/protocol at the device level
    0x40, // EP0: 64 bytes
    0xC0, 0x16, // idVendor
    0x83, 0x04, // idProduct
    0x00, 0x01, // bcdDevice 1.00
    0x01, 0x02, 0x03, // strings
    0x01, // one configuration
];

static CONFIG_DESCRIPTOR: [u8; 67] = [
    // Configuration
    0x09, 0x02, 67, 0x00, 0x02, 0x01, 0x00, 0x80, 50,
    // Interface 0: communication, one notification endpoint
    0x09, 0x04, 0x00, 0x00, 0x01, 0x02, 0x02, 0x00, 0x00,
    // Header functional, CDC 1.10
    0x05, 0x24, 0x00, 0x10, 0x01,
    // ACM functional: line coding + serial state
    0x04, 0x24, 0x02, 0x02,
    // Union functional: control 0, subordinate 1
    0x05, 0x24, 0x06, 0x00, 0x01,
    // Call management: no call management here
    0x05, 0x24, 0x01, 0x00, 0x01,
    // Notification endpoint: EP1 IN, interrupt
    0x07, 0x05, 0x81, 0x03, NOTIFICATION_PACKET as u8, 0x00, 0x10,
    // Interface 1: CDC data
    0x09, 0x04, 0x01, 0x00, 0x02, 0x0A, 0x00, 0x00, 0x00,
    // Data endpoints: EP2 OUT / EP2 IN, bulk
    0x07, 0x05, 0x02, 0x02, BULK_PACKET as u8, 0x00, 0x00,
    0x07, 0x05, 0x82, 0x02, BULK_PACKET as u8, 0x00, 0x00,
];

/// Descriptor set for the serial device
pub static DESCRIPTORS: Descriptors = Descriptors {
    device: &DEVICE_DESCRIPTOR,
    configurations: &[&CONFIG_DESCRIPTOR],
    langid: 0x0409,
    strings: &["kinetis-usbd", "USB serial", "00001"],
};

/// Line coding as carried by SET/GET_LINE_CODING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    pub dte_rate: u32,
    /// 0: one stop bit, 1: 1.5, 2: two
    pub char_format: u8,
    /// 0: none, 1: odd, 2: even, 3: mark, 4: space
    pub parity_type: u8,
    pub data_bits: u8,
}

impl LineCoding {
    pub fn from_bytes(bytes: &[u8; 7]) -> Self {
        LineCoding {
            dte_rate: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            char_format: bytes[4],
            parity_type: bytes[5],
            data_bits: bytes[6],
        }
    }

    pub fn to_bytes(self) -> [u8; 7] {
        let rate = self.dte_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.char_format,
            self.parity_type,
            self.data_bits,
        ]
    }
}

impl Default for LineCoding {
    /// 9600 8N1, the traditional power-on coding
    fn default() -> Self {
        LineCoding {
            dte_rate: 9600,
            char_format: 0,
            parity_type: 0,
            data_bits: 8,
        }
    }
}

bitflags::bitflags! {
    /// SET_CONTROL_LINE_STATE bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlLineState: u8 {
        const DTR = 1 << 0;
        const RTS = 1 << 1;
    }
}

bitflags::bitflags! {
    /// SERIAL_STATE notification bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SerialState: u16 {
        const RX_CARRIER = 1 << 0;
        const TX_CARRIER = 1 << 1;
        const BREAK = 1 << 2;
        const RING_SIGNAL = 1 << 3;
        const FRAMING = 1 << 4;
        const PARITY = 1 << 5;
        const OVERRUN = 1 << 6;
    }
}

/// The CDC-ACM function
pub struct CdcAcm {
    line_coding: LineCoding,
    control_line_state: ControlLineState,
    line_state_changed: bool,
    coding_scratch: [u8; 7],
    encapsulated: [u8; 8],
    rx: [u8; BULK_PACKET],
    rx_len: usize,
    rx_pos: usize,
    tx_complete: bool,
}

impl CdcAcm {
    pub fn new() -> Self {
        CdcAcm {
            line_coding: LineCoding::default(),
            control_line_state: ControlLineState::empty(),
            line_state_changed: false,
            coding_scratch: [0; 7],
            encapsulated: [0; 8],
            rx: [0; BULK_PACKET],
            rx_len: 0,
            rx_pos: 0,
            tx_complete: false,
        }
    }

    /// Line coding last applied by the host
    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    pub fn control_line_state(&self) -> ControlLineState {
        self.control_line_state
    }

    /// DTR: the host-side application opened the port
    pub fn dtr(&self) -> bool {
        self.control_line_state.contains(ControlLineState::DTR)
    }

    pub fn rts(&self) -> bool {
        self.control_line_state.contains(ControlLineState::RTS)
    }

    /// Control line state, if it changed since the last call
    pub fn take_line_state_change(&mut self) -> Option<ControlLineState> {
        self.line_state_changed
            .then(|| {
                self.line_state_changed = false;
                self.control_line_state
            })
    }

    /// Drain received serial data into `buf`
    ///
    /// Once the parked packet is fully consumed, the bulk OUT
    /// endpoint is re-armed for the next one.
    pub fn read(&mut self, driver: &mut Driver, buf: &mut [u8]) -> usize {
        let available = self.rx_len - self.rx_pos;
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&self.rx[self.rx_pos..self.rx_pos + count]);
        self.rx_pos += count;

        if count > 0 && self.rx_pos == self.rx_len {
            self.rx_len = 0;
            self.rx_pos = 0;
            let _ = driver.arm_out(DATA_EP);
        }
        count
    }

    /// Send one bulk packet of serial data
    ///
    /// Returns the bytes accepted: at most one packet's worth, zero
    /// if the IN endpoint is still busy with the previous packet.
    pub fn write(&mut self, driver: &mut Driver, data: &[u8]) -> Result<usize, EndpointError> {
        let chunk = data.len().min(BULK_PACKET);
        match driver.arm_in(DATA_EP, &data[..chunk]) {
            Ok(()) => Ok(chunk),
            Err(EndpointError::Busy) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Indicates if the data IN endpoint can take another packet
    pub fn write_ready(&self, driver: &Driver) -> bool {
        driver.in_idle(DATA_EP)
    }

    /// The last queued packet finished transmitting
    pub fn take_write_complete(&mut self) -> bool {
        core::mem::take(&mut self.tx_complete)
    }

    /// Send a SERIAL_STATE notification on the interrupt endpoint
    ///
    /// The packet is the usual request-like notification header
    /// followed by the two-byte state bitmap.
    pub fn notify_serial_state(
        &mut self,
        driver: &mut Driver,
        state: SerialState,
    ) -> Result<(), EndpointError> {
        let bits = state.bits().to_le_bytes();
        let packet: [u8; 10] = [
            0xA1, // notification, class, interface
            SERIAL_STATE,
            0x00,
            0x00, // wValue
            0x00,
            0x00, // wIndex: communication interface
            0x02,
            0x00, // wLength
            bits[0],
            bits[1],
        ];
        driver.arm_in(NOTIFICATION_EP, &packet)
    }
}

impl Default for CdcAcm {
    fn default() -> Self {
        Self::new()
    }
}

impl Function for CdcAcm {
    fn init(&mut self, driver: &mut Driver) {
        self.rx_len = 0;
        self.rx_pos = 0;
        self.tx_complete = false;

        driver.configure_endpoint(NOTIFICATION_EP, UsbDirection::In, NOTIFICATION_PACKET);
        driver.configure_endpoint(DATA_EP, UsbDirection::Out, BULK_PACKET);
        driver.configure_endpoint(DATA_EP, UsbDirection::In, BULK_PACKET);
        let _ = driver.arm_out(DATA_EP);
        debug!("cdc configured");
    }

    fn tasks(&mut self, driver: &mut Driver, transaction: &Transaction) {
        match (transaction.ep, transaction.direction) {
            (DATA_EP, UsbDirection::Out) => {
                // Park the packet until the application drains it
                self.rx_len = driver.read_out(transaction, &mut self.rx);
                self.rx_pos = 0;
                trace!("cdc rx {=usize}", self.rx_len);
                if self.rx_len == 0 {
                    let _ = driver.arm_out(DATA_EP);
                }
            }
            (DATA_EP, UsbDirection::In) => {
                self.tx_complete = true;
            }
            (NOTIFICATION_EP, UsbDirection::In) => {}
            _ => {}
        }
    }

    fn class_request<'a>(
        &'a mut self,
        _driver: &mut Driver,
        setup: &SetupPacket,
    ) -> ControlResponse<'a> {
        match setup.request {
            SET_LINE_CODING => ControlResponse::DataOut(7),
            GET_LINE_CODING => {
                self.coding_scratch = self.line_coding.to_bytes();
                ControlResponse::DataIn(&self.coding_scratch)
            }
            SET_CONTROL_LINE_STATE => {
                self.control_line_state = ControlLineState::from_bits_truncate(setup.value as u8);
                self.line_state_changed = true;
                debug!("cdc line state {=u8:x}", setup.value as u8);
                ControlResponse::AcceptStatus
            }
            // Present so hosts see the full ACM request set; the
            // payload itself is meaningless here
            SEND_ENCAPSULATED_COMMAND => ControlResponse::DataOut(self.encapsulated.len()),
            GET_ENCAPSULATED_RESPONSE => ControlResponse::DataIn(&self.encapsulated),
            _ => ControlResponse::Reject,
        }
    }

    fn out_control_finished(&mut self, setup: &SetupPacket, data: &[u8]) -> bool {
        match setup.request {
            SET_LINE_CODING => {
                if data.len() != 7 {
                    return false;
                }
                let mut bytes = [0u8; 7];
                bytes.copy_from_slice(data);
                self.line_coding = LineCoding::from_bytes(&bytes);
                debug!("cdc line coding {=u32}", self.line_coding.dte_rate);
                true
            }
            SEND_ENCAPSULATED_COMMAND => {
                let len = data.len().min(self.encapsulated.len());
                self.encapsulated[..len].copy_from_slice(&data[..len]);
                true
            }
            _ => false,
        }
    }

    fn clear_halt(&mut self, driver: &mut Driver, ep: usize, dir: UsbDirection) {
        if ep == DATA_EP && dir == UsbDirection::Out && self.rx_len == 0 {
            let _ = driver.arm_out(DATA_EP);
        }
    }
}
