//! HID: keyboards, mice, and custom report devices
//!
//! The stack is report-shape agnostic: a [`HidConfig`] names the
//! report descriptor, the report sizes per type, and whether report
//! IDs are on the wire. Reports move over the interrupt IN endpoint
//! (and optionally an interrupt OUT endpoint); GET/SET_REPORT and the
//! idle machinery run over EP0.
//!
//! Idle scheduling follows the HID contract: a report with a nonzero
//! idle duration must be resent when the duration lapses without a
//! change. The SOF hook counts milliseconds; the application polls
//! [`idle_expired`](Hid::idle_expired) and calls
//! [`send_report`](Hid::send_report).

use crate::class::{ControlResponse, Function};
use crate::descriptor::{descriptor_type, Descriptors};
use crate::driver::{Driver, EndpointError, Transaction};
use crate::fmt::{debug, trace};
use crate::setup::SetupPacket;
use usb_device::UsbDirection;

/// Largest report content, excluding the report ID byte
pub const MAX_REPORT_SIZE: usize = 64;
/// Reports of each type a configuration may declare
pub const MAX_REPORTS: usize = 4;

/* Class requests */
const GET_REPORT: u8 = 0x01;
const GET_IDLE: u8 = 0x02;
const GET_PROTOCOL: u8 = 0x03;
const SET_REPORT: u8 = 0x09;
const SET_IDLE: u8 = 0x0A;
const SET_PROTOCOL: u8 = 0x0B;

/* Report types in the wValue high byte */
const REPORT_TYPE_INPUT: u8 = 1;
const REPORT_TYPE_OUTPUT: u8 = 2;
const REPORT_TYPE_FEATURE: u8 = 3;

/// Shape of one report
#[derive(Debug, Clone, Copy)]
pub struct ReportSpec {
    /// Report ID, zero when IDs are not in use
    pub id: u8,
    /// Content length, excluding the ID byte
    pub len: usize,
}

/// Compile-time description of a HID function
pub struct HidConfig {
    pub report_descriptor: &'static [u8],
    /// The nine-byte HID class descriptor, as embedded in the
    /// configuration blob
    pub hid_descriptor: &'static [u8],
    pub in_reports: &'static [ReportSpec],
    pub out_reports: &'static [ReportSpec],
    pub feature_reports: &'static [ReportSpec],
    /// Report IDs on the wire; ID zero is then illegal
    pub uses_report_ids: bool,
    pub interrupt_in_ep: usize,
    pub in_packet: usize,
    /// Interrupt OUT endpoint, if the configuration declares one
    pub interrupt_out_ep: Option<usize>,
    pub out_packet: usize,
}

#[derive(Clone, Copy)]
struct Report {
    buf: [u8; MAX_REPORT_SIZE],
    /// Idle duration in 4 ms units; zero means never auto-fire
    idle_4ms: u8,
    idle_counter_ms: u16,
    idle_expired: bool,
    sent: bool,
    updated: bool,
}

impl Report {
    const INIT: Report = Report {
        buf: [0; MAX_REPORT_SIZE],
        idle_4ms: 0,
        idle_counter_ms: 0,
        idle_expired: false,
        sent: false,
        updated: false,
    };
}

/// The HID function
pub struct Hid {
    config: &'static HidConfig,
    in_reports: [Report; MAX_REPORTS],
    out_reports: [Report; MAX_REPORTS],
    feature_reports: [Report; MAX_REPORTS],
    /// Index of the IN report on the wire right now
    in_flight: Option<usize>,
    report_sent: bool,
    scratch: [u8; MAX_REPORT_SIZE + 1],
}

fn find_report(specs: &[ReportSpec], uses_ids: bool, id: u8) -> Option<usize> {
    if uses_ids {
        if id == 0 {
            return None;
        }
        specs.iter().position(|spec| spec.id == id)
    } else {
        (id == 0 && !specs.is_empty()).then_some(0)
    }
}

impl Hid {
    pub fn new(config: &'static HidConfig) -> Self {
        debug_assert!(config.in_reports.len() <= MAX_REPORTS);
        debug_assert!(config.out_reports.len() <= MAX_REPORTS);
        debug_assert!(config.feature_reports.len() <= MAX_REPORTS);
        Hid {
            config,
            in_reports: [Report::INIT; MAX_REPORTS],
            out_reports: [Report::INIT; MAX_REPORTS],
            feature_reports: [Report::INIT; MAX_REPORTS],
            in_flight: None,
            report_sent: false,
            scratch: [0; MAX_REPORT_SIZE + 1],
        }
    }

    /// Mutable content of IN report `index`, for the application to fill
    pub fn report_mut(&mut self, index: usize) -> &mut [u8] {
        let len = self.config.in_reports[index].len;
        &mut self.in_reports[index].buf[..len]
    }

    /// Queue IN report `index` on the interrupt endpoint
    pub fn send_report(&mut self, driver: &mut Driver, index: usize) -> Result<(), EndpointError> {
        let spec = self.config.in_reports[index];
        let report = &self.in_reports[index];

        let payload = if self.config.uses_report_ids {
            self.scratch[0] = spec.id;
            self.scratch[1..1 + spec.len].copy_from_slice(&report.buf[..spec.len]);
            &self.scratch[..1 + spec.len]
        } else {
            &report.buf[..spec.len]
        };
        driver.arm_in(self.config.interrupt_in_ep, payload)?;
        self.in_flight = Some(index);
        Ok(())
    }

    /// Indicates if IN report `index` is due under its idle duration
    pub fn idle_expired(&self, index: usize) -> bool {
        self.in_reports[index].idle_expired
    }

    /// Indicates if any report finished transmitting since the last call
    pub fn take_report_sent(&mut self) -> bool {
        core::mem::take(&mut self.report_sent)
    }

    /// Indicates if IN report `index` finished transmitting
    pub fn take_report_sent_for(&mut self, index: usize) -> bool {
        core::mem::take(&mut self.in_reports[index].sent)
    }

    /// Copy OUT report `index` if the host updated it
    pub fn take_output_report(&mut self, index: usize, buf: &mut [u8]) -> Option<usize> {
        let report = &mut self.out_reports[index];
        if !core::mem::take(&mut report.updated) {
            return None;
        }
        let len = self.config.out_reports[index].len.min(buf.len());
        buf[..len].copy_from_slice(&report.buf[..len]);
        Some(len)
    }

    /// Current idle duration of IN report `index`, in 4 ms units
    pub fn idle(&self, index: usize) -> u8 {
        self.in_reports[index].idle_4ms
    }

    /// One millisecond of idle time for every IN report
    fn idle_tick(&mut self) {
        for report in self.in_reports[..self.config.in_reports.len()].iter_mut() {
            if report.idle_4ms == 0 {
                continue;
            }
            report.idle_counter_ms = report.idle_counter_ms.saturating_add(1);
            if report.idle_counter_ms > u16::from(report.idle_4ms) * 4 - 1 {
                report.idle_expired = true;
            }
        }
    }

    fn set_idle(&mut self, duration_4ms: u8, id: u8) -> bool {
        if id == 0 {
            for report in self.in_reports[..self.config.in_reports.len()].iter_mut() {
                report.idle_4ms = duration_4ms;
                report.idle_counter_ms = 0;
                report.idle_expired = false;
            }
            true
        } else {
            match find_report(self.config.in_reports, self.config.uses_report_ids, id) {
                Some(index) => {
                    let report = &mut self.in_reports[index];
                    report.idle_4ms = duration_4ms;
                    report.idle_counter_ms = 0;
                    report.idle_expired = false;
                    true
                }
                None => false,
            }
        }
    }

    fn store_report(&mut self, report_type: u8, id: u8, data: &[u8]) -> bool {
        let (specs, reports) = match report_type {
            REPORT_TYPE_OUTPUT => (self.config.out_reports, &mut self.out_reports),
            REPORT_TYPE_FEATURE => (self.config.feature_reports, &mut self.feature_reports),
            _ => return false,
        };
        let Some(index) = find_report(specs, self.config.uses_report_ids, id) else {
            return false;
        };

        // With IDs in use the first data byte repeats the ID
        let content = if self.config.uses_report_ids {
            if data.first() != Some(&id) {
                return false;
            }
            &data[1..]
        } else {
            data
        };
        if content.len() != specs[index].len {
            return false;
        }
        reports[index].buf[..content.len()].copy_from_slice(content);
        reports[index].updated = true;
        true
    }
}

impl Function for Hid {
    fn init(&mut self, driver: &mut Driver) {
        self.in_flight = None;
        self.report_sent = false;

        driver.configure_endpoint(
            self.config.interrupt_in_ep,
            UsbDirection::In,
            self.config.in_packet,
        );
        if let Some(out_ep) = self.config.interrupt_out_ep {
            driver.configure_endpoint(out_ep, UsbDirection::Out, self.config.out_packet);
            let _ = driver.arm_out(out_ep);
        }
        debug!("hid configured");
    }

    fn tasks(&mut self, driver: &mut Driver, transaction: &Transaction) {
        if transaction.ep == self.config.interrupt_in_ep
            && transaction.direction == UsbDirection::In
        {
            self.report_sent = true;
            if let Some(index) = self.in_flight.take() {
                let report = &mut self.in_reports[index];
                report.sent = true;
                report.idle_counter_ms = 0;
                report.idle_expired = false;
            }
        } else if Some(transaction.ep) == self.config.interrupt_out_ep
            && transaction.direction == UsbDirection::Out
        {
            let mut packet = [0u8; MAX_REPORT_SIZE + 1];
            let len = driver.read_out(transaction, &mut packet);
            let (id, content) = if self.config.uses_report_ids {
                (packet[0], &packet[1..len])
            } else {
                (0, &packet[..len])
            };
            if let Some(index) =
                find_report(self.config.out_reports, self.config.uses_report_ids, id)
            {
                let expected = self.config.out_reports[index].len;
                if content.len() == expected {
                    self.out_reports[index].buf[..expected].copy_from_slice(content);
                    self.out_reports[index].updated = true;
                }
            }
            let _ = driver.arm_out(transaction.ep);
        }
    }

    fn sof(&mut self, _driver: &mut Driver, _frame: u16) {
        self.idle_tick();
    }

    fn class_request<'a>(
        &'a mut self,
        _driver: &mut Driver,
        setup: &SetupPacket,
    ) -> ControlResponse<'a> {
        match setup.request {
            GET_REPORT => {
                let report_type = (setup.value >> 8) as u8;
                let id = setup.value as u8;
                let (specs, reports) = match report_type {
                    REPORT_TYPE_INPUT => (self.config.in_reports, &self.in_reports),
                    REPORT_TYPE_OUTPUT => (self.config.out_reports, &self.out_reports),
                    REPORT_TYPE_FEATURE => (self.config.feature_reports, &self.feature_reports),
                    _ => return ControlResponse::Reject,
                };
                let Some(index) = find_report(specs, self.config.uses_report_ids, id) else {
                    return ControlResponse::Reject;
                };
                let len = specs[index].len;
                if self.config.uses_report_ids {
                    self.scratch[0] = id;
                    self.scratch[1..1 + len].copy_from_slice(&reports[index].buf[..len]);
                    ControlResponse::DataIn(&self.scratch[..1 + len])
                } else {
                    ControlResponse::DataIn(&reports[index].buf[..len])
                }
            }
            SET_REPORT => {
                let id_byte = usize::from(self.config.uses_report_ids);
                ControlResponse::DataOut(MAX_REPORT_SIZE + id_byte)
            }
            GET_IDLE => {
                let id = setup.value as u8;
                match find_report(self.config.in_reports, self.config.uses_report_ids, id) {
                    Some(index) => {
                        self.scratch[0] = self.in_reports[index].idle_4ms;
                        ControlResponse::DataIn(&self.scratch[..1])
                    }
                    None => ControlResponse::Reject,
                }
            }
            SET_IDLE => {
                let duration_4ms = (setup.value >> 8) as u8;
                let id = setup.value as u8;
                trace!("hid set idle {=u8} for {=u8}", duration_4ms, id);
                if self.set_idle(duration_4ms, id) {
                    ControlResponse::AcceptStatus
                } else {
                    ControlResponse::Reject
                }
            }
            GET_PROTOCOL | SET_PROTOCOL => ControlResponse::Reject,
            _ => ControlResponse::Reject,
        }
    }

    fn class_descriptor(&self, setup: &SetupPacket) -> Option<&'static [u8]> {
        match setup.descriptor_type() {
            descriptor_type::HID => Some(self.config.hid_descriptor),
            descriptor_type::REPORT => Some(self.config.report_descriptor),
            _ => None,
        }
    }

    fn out_control_finished(&mut self, setup: &SetupPacket, data: &[u8]) -> bool {
        if setup.request != SET_REPORT {
            return false;
        }
        let report_type = (setup.value >> 8) as u8;
        let id = setup.value as u8;
        self.store_report(report_type, id, data)
    }
}

/// Boot-protocol keyboard: eight-byte input report, one-byte LED
/// output report, both transported without report IDs.
pub mod boot_keyboard {
    use super::{HidConfig, ReportSpec};
    use crate::descriptor::Descriptors;

    pub const INTERRUPT_IN_EP: usize = 1;

    static REPORT_DESCRIPTOR: [u8; 63] = [
        0x05, 0x01, // Usage page: generic desktop
        0x09, 0x06, // Usage: keyboard
        0xA1, 0x01, // Collection: application
        0x05, 0x07, //   Usage page: key codes
        0x19, 0xE0, //   Usage minimum: left control
        0x29, 0xE7, //   Usage maximum: right GUI
        0x15, 0x00, //   Logical minimum: 0
        0x25, 0x01, //   Logical maximum: 1
        0x75, 0x01, //   Report size: 1
        0x95, 0x08, //   Report count: 8
        0x81, 0x02, //   Input: modifier bits
        0x95, 0x01, //   Report count: 1
        0x75, 0x08, //   Report size: 8
        0x81, 0x03, //   Input: reserved byte
        0x95, 0x05, //   Report count: 5
        0x75, 0x01, //   Report size: 1
        0x05, 0x08, //   Usage page: LEDs
        0x19, 0x01, //   Usage minimum: num lock
        0x29, 0x05, //   Usage maximum: kana
        0x91, 0x02, //   Output: LED bits
        0x95, 0x01, //   Report count: 1
        0x75, 0x03, //   Report size: 3
        0x91, 0x03, //   Output: padding
        0x95, 0x06, //   Report count: 6
        0x75, 0x08, //   Report size: 8
        0x15, 0x00, //   Logical minimum: 0
        0x25, 0x65, //   Logical maximum: 101
        0x05, 0x07, //   Usage page: key codes
        0x19, 0x00, //   Usage minimum: 0
        0x29, 0x65, //   Usage maximum: 101
        0x81, 0x00, //   Input: key array
        0xC0, // End collection
    ];

    static HID_DESCRIPTOR: [u8; 9] = [
        0x09, // bLength
        0x21, // HID
        0x11, 0x01, // HID 1.11
        0x00, // no country code
        0x01, // one class descriptor
        0x22, // report descriptor
        63, 0x00, // its length
    ];

    static DEVICE_DESCRIPTOR: [u8; 18] = [
        0x12, 0x01, 0x00, 0x02, // USB 2.0
        0x00, 0x00, 0x00, // class defined at the interface
        0x40, // EP0: 64 bytes
        0xC0, 0x16, // idVendor
        0xDB, 0x27, // idProduct
        0x00, 0x01, // bcdDevice 1.00
        0x01, 0x02, 0x00, // strings; no serial
        0x01, // one configuration
    ];

    static CONFIG_DESCRIPTOR: [u8; 34] = [
        // Configuration
        0x09, 0x02, 34, 0x00, 0x01, 0x01, 0x00, 0xA0, 50,
        // Interface 0: HID, boot keyboard
        0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00,
        // HID descriptor
        0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 63, 0x00,
        // EP1 IN, interrupt, 8 bytes, 10 ms
        0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0A,
    ];

    pub static DESCRIPTORS: Descriptors = Descriptors {
        device: &DEVICE_DESCRIPTOR,
        configurations: &[&CONFIG_DESCRIPTOR],
        langid: 0x0409,
        strings: &["kinetis-usbd", "USB keyboard"],
    };

    pub static CONFIG: HidConfig = HidConfig {
        report_descriptor: &REPORT_DESCRIPTOR,
        hid_descriptor: &HID_DESCRIPTOR,
        in_reports: &[ReportSpec { id: 0, len: 8 }],
        out_reports: &[ReportSpec { id: 0, len: 1 }],
        feature_reports: &[],
        uses_report_ids: false,
        interrupt_in_ep: INTERRUPT_IN_EP,
        in_packet: 8,
        interrupt_out_ep: None,
        out_packet: 0,
    };
}

#[cfg(test)]
mod test {
    use super::*;

    fn keyboard() -> Hid {
        Hid::new(&boot_keyboard::CONFIG)
    }

    #[test]
    fn report_lookup_without_ids() {
        assert_eq!(find_report(boot_keyboard::CONFIG.in_reports, false, 0), Some(0));
        assert_eq!(find_report(boot_keyboard::CONFIG.in_reports, false, 1), None);
    }

    #[test]
    fn report_lookup_with_ids_rejects_zero() {
        let specs = [ReportSpec { id: 2, len: 4 }];
        assert_eq!(find_report(&specs, true, 0), None);
        assert_eq!(find_report(&specs, true, 2), Some(0));
    }

    #[test]
    fn idle_counter_expires_at_duration() {
        let mut hid = keyboard();
        // 2 * 4 ms
        assert!(hid.set_idle(2, 0));
        for _ in 0..7 {
            hid.idle_tick();
            assert!(!hid.idle_expired(0));
        }
        hid.idle_tick();
        assert!(hid.idle_expired(0));
    }

    #[test]
    fn zero_idle_never_expires() {
        let mut hid = keyboard();
        assert!(hid.set_idle(0, 0));
        for _ in 0..10_000 {
            hid.idle_tick();
        }
        assert!(!hid.idle_expired(0));
    }

    #[test]
    fn set_report_round_trips_through_storage() {
        let mut hid = keyboard();
        assert!(hid.store_report(REPORT_TYPE_OUTPUT, 0, &[0x05]));
        let mut leds = [0u8; 4];
        assert_eq!(hid.take_output_report(0, &mut leds), Some(1));
        assert_eq!(leds[0], 0x05);
        // Consumed
        assert_eq!(hid.take_output_report(0, &mut leds), None);
    }

    #[test]
    fn report_descriptor_length_matches_hid_descriptor() {
        let config = &boot_keyboard::CONFIG;
        let declared =
            u16::from_le_bytes([config.hid_descriptor[7], config.hid_descriptor[8]]) as usize;
        assert_eq!(config.report_descriptor.len(), declared);
    }
}
