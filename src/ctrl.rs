//! The EP0 control pipe
//!
//! SETUP decode, the standard request set, data staging with the
//! short-packet and zero-length-packet rules, and the status
//! handshake. A SETUP always supersedes whatever the pipe was doing:
//! pending EP0 IN data is reclaimed, both toggles move to DATA1, and
//! EP0 OUT is re-armed before the request is decoded.

use crate::bd::TokenPid;
use crate::class::{ControlResponse, Function};
use crate::descriptor::{self, descriptor_type};
use crate::device::{DeviceControl, DeviceState};
use crate::driver::{Driver, Transaction};
use crate::fmt::{debug, trace};
use crate::setup::SetupPacket;
use usb_device::control::{Recipient, Request, RequestType};
use usb_device::UsbDirection;

/// Staging buffer for RAM-sourced control data, both directions
pub(crate) const STAGING: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Between transfers; EP0 OUT armed for a SETUP
    Idle,
    DataIn,
    DataOut,
    StatusIn,
    StatusOut,
}

enum Source {
    Static(&'static [u8]),
    Ram,
}

pub(crate) struct ControlPipe {
    stage: Stage,
    setup: SetupPacket,
    source: Source,
    /// Bytes of the data stage already handed to the SIE
    pos: usize,
    /// Total data-stage length: min(device length, wLength)
    len: usize,
    send_zlp: bool,
    out_pos: usize,
    out_len: usize,
    ram: [u8; STAGING],
    pending_address: Option<u8>,
}

impl ControlPipe {
    pub fn new() -> Self {
        ControlPipe {
            stage: Stage::Idle,
            setup: SetupPacket::parse(&[0; 8]),
            source: Source::Ram,
            pos: 0,
            len: 0,
            send_zlp: false,
            out_pos: 0,
            out_len: 0,
            ram: [0; STAGING],
            pending_address: None,
        }
    }

    /// Drop any transfer in progress (bus reset)
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.pending_address = None;
        self.send_zlp = false;
    }

    /// Advance the pipe on an EP0 transaction
    pub fn on_transaction<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &mut DeviceControl,
        function: &mut F,
        transaction: &Transaction,
    ) {
        match (transaction.pid, transaction.direction) {
            (TokenPid::Setup, UsbDirection::Out) => {
                self.on_setup(drv, dev, function, transaction)
            }
            (TokenPid::Out, UsbDirection::Out) => self.on_out(drv, function, transaction),
            (TokenPid::In, UsbDirection::In) => self.on_in(drv, dev),
            _ => {}
        }
    }

    fn on_setup<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &mut DeviceControl,
        function: &mut F,
        transaction: &Transaction,
    ) {
        let mut bytes = [0u8; 8];
        let len = drv.read_out(transaction, &mut bytes);

        // A SETUP supersedes any staged EP0 IN data. Reclaim it,
        // release the SIE's token freeze, and get EP0 OUT armed again
        // before spending time on the decode.
        drv.ep0_cancel_in();
        drv.resume_token_processing();
        drv.ep0_arm_out();
        drv.ep0_toggles_data1();

        if len != 8 {
            drv.request_error();
            self.stage = Stage::Idle;
            return;
        }

        self.setup = SetupPacket::parse(&bytes);
        self.stage = Stage::Idle;
        self.send_zlp = false;
        trace!(
            "setup {=u8:x} {=u8:x} len {=u16}",
            bytes[0],
            bytes[1],
            self.setup.length,
        );

        match self.setup.request_type {
            RequestType::Standard => self.standard_request(drv, dev, function),
            RequestType::Class => {
                let setup = self.setup;
                let response = function.class_request(drv, &setup);
                self.apply_response(drv, response);
            }
            RequestType::Vendor | RequestType::Reserved => {
                drv.request_error();
            }
        }
    }

    fn apply_response(&mut self, drv: &mut Driver, response: ControlResponse<'_>) {
        match response {
            ControlResponse::Reject => {
                drv.request_error();
                self.stage = Stage::Idle;
            }
            ControlResponse::AcceptStatus => {
                drv.ep0_arm_status_in();
                self.stage = Stage::StatusIn;
            }
            ControlResponse::DataIn(data) => self.respond_in(drv, data),
            ControlResponse::DataInStatic(data) => {
                self.start_data_in(drv, Source::Static(data), data.len())
            }
            ControlResponse::DataOut(capacity) => self.expect_data_out(drv, capacity),
        }
    }

    /// Respond with function- or pipe-assembled bytes
    fn respond_in(&mut self, drv: &mut Driver, data: &[u8]) {
        let len = data.len().min(STAGING);
        self.ram[..len].copy_from_slice(&data[..len]);
        self.start_data_in(drv, Source::Ram, len);
    }

    /// Collect a host-to-device data stage of `wLength` bytes
    fn expect_data_out(&mut self, drv: &mut Driver, capacity: usize) {
        let host_len = self.setup.length as usize;
        if host_len == 0 || host_len > capacity.min(STAGING) {
            drv.request_error();
            self.stage = Stage::Idle;
            return;
        }
        self.out_len = host_len;
        self.out_pos = 0;
        self.stage = Stage::DataOut;
        // EP0 OUT is already armed for the first chunk
    }

    /// Begin the IN data stage, applying the short-packet rules
    ///
    /// With `device_len >= wLength`, exactly `wLength` bytes go out
    /// and the transfer may end mid-packet. With less device data the
    /// transfer ends on the naturally short final packet, or on one
    /// ZLP when the length divides evenly into EP0 packets.
    fn start_data_in(&mut self, drv: &mut Driver, source: Source, device_len: usize) {
        let requested = self.setup.length as usize;
        if requested == 0 {
            drv.ep0_arm_status_in();
            self.stage = Stage::StatusIn;
            return;
        }

        self.len = device_len.min(requested);
        // A zero-length stage is itself the terminating packet
        self.send_zlp = self.len != 0 && device_len < requested && self.len % drv.ep0_max() == 0;
        self.source = source;
        self.pos = 0;
        self.stage = Stage::DataIn;
        self.arm_in_chunk(drv);
    }

    fn arm_in_chunk(&mut self, drv: &mut Driver) {
        let chunk = drv.ep0_max().min(self.len - self.pos);
        let bytes = match &self.source {
            Source::Static(data) => &data[self.pos..self.pos + chunk],
            Source::Ram => &self.ram[self.pos..self.pos + chunk],
        };
        if drv.arm_in(0, bytes).is_err() {
            // EP0 IN was reclaimed at SETUP, so this is unreachable
            // short of a hardware fault
            drv.request_error();
            self.stage = Stage::Idle;
            return;
        }
        self.pos += chunk;
    }

    /// EP0 IN transaction completed
    fn on_in(&mut self, drv: &mut Driver, dev: &mut DeviceControl) {
        match self.stage {
            Stage::DataIn => {
                if self.pos < self.len {
                    self.arm_in_chunk(drv);
                } else if self.send_zlp {
                    self.send_zlp = false;
                    let _ = drv.arm_in(0, &[]);
                } else {
                    // Host acknowledges with a zero-length OUT
                    self.stage = Stage::StatusOut;
                }
            }
            Stage::StatusIn => {
                // The address may only change once the handshake for
                // SET_ADDRESS has gone out on the old address
                if let Some(address) = self.pending_address.take() {
                    drv.set_address(address);
                    dev.state = if address == 0 {
                        DeviceState::Default
                    } else {
                        DeviceState::Address
                    };
                    debug!("address committed {=u8}", address);
                }
                self.stage = Stage::Idle;
            }
            _ => {}
        }
    }

    /// EP0 OUT transaction completed (non-SETUP)
    fn on_out<F: Function>(
        &mut self,
        drv: &mut Driver,
        function: &mut F,
        transaction: &Transaction,
    ) {
        match self.stage {
            Stage::DataOut => {
                let read = {
                    let dst = &mut self.ram[self.out_pos..self.out_len];
                    drv.read_out(transaction, dst)
                };
                self.out_pos += read;
                drv.ep0_arm_out();

                if self.out_pos >= self.out_len {
                    let setup = self.setup;
                    if function.out_control_finished(&setup, &self.ram[..self.out_len]) {
                        drv.ep0_arm_status_in();
                        self.stage = Stage::StatusIn;
                    } else {
                        drv.request_error();
                        self.stage = Stage::Idle;
                    }
                }
            }
            Stage::StatusOut => {
                self.stage = Stage::Idle;
                drv.ep0_arm_out();
            }
            Stage::DataIn if transaction.len == 0 => {
                // Host moved to the status stage before draining the
                // data we staged; drop the rest of the transfer
                drv.ep0_cancel_in();
                self.stage = Stage::Idle;
                drv.ep0_arm_out();
            }
            _ => {
                drv.ep0_arm_out();
            }
        }
    }

    fn standard_request<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &mut DeviceControl,
        function: &mut F,
    ) {
        let setup = self.setup;
        match setup.request {
            Request::GET_STATUS => self.get_status(drv, dev),
            Request::CLEAR_FEATURE => self.feature(drv, dev, function, false),
            Request::SET_FEATURE => self.feature(drv, dev, function, true),
            Request::SET_ADDRESS => {
                self.pending_address = Some((setup.value & 0x7F) as u8);
                drv.ep0_arm_status_in();
                self.stage = Stage::StatusIn;
            }
            Request::GET_DESCRIPTOR => self.get_descriptor(drv, dev, function),
            Request::GET_CONFIGURATION => {
                let value = [dev.configuration];
                self.respond_in(drv, &value);
            }
            Request::SET_CONFIGURATION => self.set_configuration(drv, dev, function),
            Request::GET_INTERFACE => {
                if dev.state == DeviceState::Configured {
                    match function.get_interface(setup.index as u8) {
                        Some(alternate) => self.respond_in(drv, &[alternate]),
                        None => drv.request_error(),
                    }
                } else {
                    drv.request_error();
                }
            }
            Request::SET_INTERFACE => {
                if dev.state == DeviceState::Configured
                    && function.set_interface(drv, setup.index as u8, setup.value as u8)
                {
                    drv.ep0_arm_status_in();
                    self.stage = Stage::StatusIn;
                } else {
                    drv.request_error();
                }
            }
            // SET_DESCRIPTOR, SYNCH_FRAME, and reserved codes
            _ => drv.request_error(),
        }
    }

    fn get_status(&mut self, drv: &mut Driver, dev: &DeviceControl) {
        let setup = self.setup;
        let bytes: [u8; 2] = match setup.recipient {
            Recipient::Device => {
                let mut status = 0;
                if dev.self_powered() {
                    status |= 1;
                }
                if dev.remote_wakeup {
                    status |= 1 << 1;
                }
                [status, 0]
            }
            Recipient::Interface => {
                if !dev.interface_valid(setup.index) {
                    drv.request_error();
                    return;
                }
                [0, 0]
            }
            Recipient::Endpoint => {
                let (ep, dir) = setup.endpoint();
                if !endpoint_valid(drv, dev, ep, dir) {
                    drv.request_error();
                    return;
                }
                [drv.is_halted(ep, dir) as u8, 0]
            }
            _ => {
                drv.request_error();
                return;
            }
        };
        self.respond_in(drv, &bytes);
    }

    fn feature<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &mut DeviceControl,
        function: &mut F,
        set: bool,
    ) {
        let setup = self.setup;
        match (setup.recipient, setup.value) {
            (Recipient::Device, Request::FEATURE_DEVICE_REMOTE_WAKEUP) => {
                dev.remote_wakeup = set;
            }
            (Recipient::Endpoint, Request::FEATURE_ENDPOINT_HALT) => {
                let (ep, dir) = setup.endpoint();
                if !endpoint_valid(drv, dev, ep, dir) {
                    drv.request_error();
                    return;
                }
                if ep != 0 {
                    if set {
                        drv.stall(ep, dir);
                    } else {
                        // Toggle returns to DATA0 whether or not the
                        // endpoint was halted
                        drv.reset_toggle(ep, dir);
                        if drv.is_halted(ep, dir) {
                            drv.unstall(ep, dir);
                            function.clear_halt(drv, ep, dir);
                        }
                    }
                }
            }
            // TEST_MODE and everything else
            _ => {
                drv.request_error();
                return;
            }
        }
        drv.ep0_arm_status_in();
        self.stage = Stage::StatusIn;
    }

    fn get_descriptor<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &DeviceControl,
        function: &F,
    ) {
        let setup = self.setup;
        let descriptors = dev.descriptors;
        match setup.descriptor_type() {
            descriptor_type::DEVICE => self.start_data_in(
                drv,
                Source::Static(descriptors.device),
                descriptors.device.len(),
            ),
            descriptor_type::CONFIGURATION => {
                match descriptors.configuration(setup.descriptor_index() as usize) {
                    Some(config) => {
                        debug_assert!(config.len() == descriptor::total_length(config));
                        self.start_data_in(drv, Source::Static(config), config.len())
                    }
                    None => drv.request_error(),
                }
            }
            descriptor_type::STRING => {
                match descriptor::write_string(
                    descriptors.langid,
                    descriptors.strings,
                    setup.descriptor_index() as usize,
                    &mut self.ram,
                ) {
                    Some(len) => self.start_data_in(drv, Source::Ram, len),
                    None => drv.request_error(),
                }
            }
            // Full-speed-only device: no device qualifier
            descriptor_type::DEVICE_QUALIFIER => drv.request_error(),
            _ => match function.class_descriptor(&setup) {
                Some(data) => self.start_data_in(drv, Source::Static(data), data.len()),
                None => drv.request_error(),
            },
        }
    }

    fn set_configuration<F: Function>(
        &mut self,
        drv: &mut Driver,
        dev: &mut DeviceControl,
        function: &mut F,
    ) {
        if dev.state == DeviceState::Default {
            drv.request_error();
            return;
        }
        let value = self.setup.value as u8;
        if value == 0 {
            drv.disable_nonzero_endpoints();
            dev.configuration = 0;
            dev.state = DeviceState::Address;
        } else {
            if dev.descriptors.configuration_by_value(value).is_none() {
                drv.request_error();
                return;
            }
            drv.disable_nonzero_endpoints();
            drv.reset_parities();
            function.init(drv);
            dev.configuration = value;
            dev.state = DeviceState::Configured;
            debug!("configured {=u8}", value);
        }
        drv.ep0_arm_status_in();
        self.stage = Stage::StatusIn;
    }
}

/// EP0 is always valid; other endpoints must be enabled
fn endpoint_valid(drv: &Driver, dev: &DeviceControl, ep: usize, dir: UsbDirection) -> bool {
    if ep == 0 {
        return true;
    }
    dev.state == DeviceState::Configured
        && ep < crate::bdt::ENDPOINTS
        && drv.endpoint_enabled(ep, dir)
}
