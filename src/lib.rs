//! A USB device stack for Kinetis USB-FS controllers
//!
//! `kinetis-usbd` drives the full-speed device controller found on
//! NXP Kinetis K and KL parts: a buffer-descriptor-table SIE with
//! even/odd ping-pong banks per endpoint direction. The crate owns
//! the whole device side of the wire protocol:
//!
//! - the buffer descriptor table and endpoint arming discipline,
//! - the EP0 control pipe with the standard request set,
//! - three ready-made functions: CDC-ACM serial ([`class::cdc`]),
//!   HID ([`class::hid`]), and Bulk-Only mass storage
//!   ([`class::msc`]).
//!
//! Custom functions implement [`class::Function`].
//!
//! To interface the library, define a safe implementation of
//! [`Peripherals`], statically allocate a
//! [`BufferDescriptorTable`](bdt::BufferDescriptorTable) and an
//! [`EndpointMemory`](buffer::EndpointMemory), and hand everything to
//! [`UsbDevice::new`](device::UsbDevice::new). Call
//! [`poll()`](device::UsbDevice::poll) from the USB interrupt.

#![no_std]

mod ctrl;
mod fmt;
mod endpoint;
mod ral;
mod setup;
mod vcell;

pub mod bd;
pub mod bdt;
pub mod buffer;
pub mod class;
pub mod descriptor;
pub mod device;
pub mod driver;

pub use device::{DeviceState, PollStatus, UsbDevice};
pub use setup::SetupPacket;

/// A type that owns the USB-FS register block
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that owns the
/// USB-FS register block for the instance it represents. The returned
/// pointer is cast to the register block definition, so it must be
/// valid for the lifetime of the device, and no other software may
/// drive those registers.
///
/// # Example
///
/// A Kinetis K20's USB-FS module sits at `0x4007_2000`:
///
/// ```no_run
/// use kinetis_usbd::Peripherals;
///
/// struct UsbFs;
///
/// unsafe impl Peripherals for UsbFs {
///     fn usbfs(&self) -> *const () {
///         0x4007_2000 as *const ()
///     }
/// }
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the USB-FS register block
    fn usbfs(&self) -> *const ();
}

/// Run `f` with the USB interrupt masked
///
/// Shared state between the interrupt service routine and the main
/// loop (the mass-storage task queue, for one) is touched inside this
/// guard. Host-side test builds run the closure directly.
pub(crate) fn interrupt_free<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    {
        cortex_m::interrupt::free(|_| f())
    }
    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    {
        f()
    }
}
