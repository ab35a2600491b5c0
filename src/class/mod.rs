//! The function layer
//!
//! One function is active per device. The control pipe and the event
//! dispatch know nothing about class internals; they reach the
//! function through [`Function`], and the function drives its
//! endpoints through the [`Driver`].

use crate::driver::{Driver, Transaction};
use crate::setup::SetupPacket;
use usb_device::UsbDirection;

pub mod cdc;
pub mod hid;
pub mod msc;

/// A function's answer to a class SETUP
pub enum ControlResponse<'a> {
    /// Unrecognized request; the control pipe answers STALL
    Reject,
    /// No data stage; go straight to the status handshake
    AcceptStatus,
    /// Respond with bytes owned by the function
    ///
    /// The pipe copies them into its staging buffer, so they only
    /// need to live for the duration of the call.
    DataIn(&'a [u8]),
    /// Respond with a static blob
    DataInStatic(&'static [u8]),
    /// Accept a host-to-device data stage of up to this many bytes
    ///
    /// The collected bytes arrive in
    /// [`out_control_finished`](Function::out_control_finished).
    DataOut(usize),
}

/// Hooks the device core calls into the active function
pub trait Function {
    /// The device entered a configuration
    ///
    /// Bind endpoint buffers, enable endpoint controls, and arm the
    /// initial OUT transfers here. May run more than once.
    fn init(&mut self, driver: &mut Driver);

    /// A transaction completed on a non-zero endpoint
    fn tasks(&mut self, driver: &mut Driver, transaction: &Transaction);

    /// A class SETUP arrived on EP0
    fn class_request<'a>(
        &'a mut self,
        driver: &mut Driver,
        setup: &SetupPacket,
    ) -> ControlResponse<'a>;

    /// Class-specific GET_DESCRIPTOR (HID descriptors and friends)
    fn class_descriptor(&self, setup: &SetupPacket) -> Option<&'static [u8]> {
        let _ = setup;
        None
    }

    /// A class OUT control transfer finished; validate and apply
    ///
    /// Returning `false` stalls the status stage.
    fn out_control_finished(&mut self, setup: &SetupPacket, data: &[u8]) -> bool {
        let _ = (setup, data);
        true
    }

    /// The host cleared an endpoint halt
    fn clear_halt(&mut self, driver: &mut Driver, ep: usize, dir: UsbDirection) {
        let _ = (driver, ep, dir);
    }

    /// Select an alternate setting
    ///
    /// An accepting function resets the data toggles of the
    /// interface's endpoints through the driver. The default accepts
    /// only alternate zero, which every interface has.
    fn set_interface(&mut self, driver: &mut Driver, interface: u8, alternate: u8) -> bool {
        let _ = (driver, interface);
        alternate == 0
    }

    fn get_interface(&self, interface: u8) -> Option<u8> {
        let _ = interface;
        Some(0)
    }

    /// Start of frame, with the current frame number
    fn sof(&mut self, driver: &mut Driver, frame: u16) {
        let _ = (driver, frame);
    }

    /// The bus was reset
    fn bus_reset(&mut self, driver: &mut Driver) {
        let _ = driver;
    }
}
