//! The owned device aggregate
//!
//! [`UsbDevice`] bundles the driver, the control pipe, the device
//! state machine, and the active function. Interrupt handlers call
//! [`poll()`](UsbDevice::poll); everything else happens from the main
//! loop through [`split_mut()`](UsbDevice::split_mut).

use crate::bdt::BufferDescriptorTable;
use crate::buffer::EndpointMemory;
use crate::class::Function;
use crate::ctrl::ControlPipe;
use crate::descriptor::{self, Descriptors};
use crate::driver::{Driver, Errors};
use crate::fmt::debug;
use crate::Peripherals;

/// USB 2.0 visible device states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// Not presented to the bus
    Detached,
    /// Pull-up enabled, no bus reset seen yet
    Powered,
    /// Reset seen, address zero
    Default,
    /// Address assigned
    Address,
    /// A configuration is active
    Configured,
    /// Bus idle; wakes on resume signaling or reset
    Suspended,
}

bitflags::bitflags! {
    /// Events observed by one [`UsbDevice::poll`] call
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PollStatus: u8 {
        const RESET = 1 << 0;
        const SUSPEND = 1 << 1;
        const RESUME = 1 << 2;
        const SOF = 1 << 3;
        const ERROR = 1 << 4;
        const TRANSACTION = 1 << 5;
    }
}

/// Device-level state shared between the control pipe and dispatch
pub struct DeviceControl {
    pub state: DeviceState,
    /// `bConfigurationValue` of the active configuration, or zero
    pub configuration: u8,
    pub remote_wakeup: bool,
    pub descriptors: &'static Descriptors,
    /// State to restore when the bus resumes
    resume_state: DeviceState,
}

impl DeviceControl {
    /// Self-powered bit of the active (or first) configuration
    pub fn self_powered(&self) -> bool {
        let config = self
            .descriptors
            .configuration_by_value(self.configuration)
            .or_else(|| self.descriptors.configuration(0));
        config.map(|c| c[7] & 0x40 != 0).unwrap_or(false)
    }

    /// Indicates if `index` names an interface of the active configuration
    pub fn interface_valid(&self, index: u16) -> bool {
        self.state == DeviceState::Configured
            && self
                .descriptors
                .configuration_by_value(self.configuration)
                .map(|c| (index as usize) < descriptor::num_interfaces(c) as usize)
                .unwrap_or(false)
    }
}

/// A USB device: driver, control pipe, and one function
pub struct UsbDevice<F: Function> {
    drv: Driver,
    pipe: ControlPipe,
    dev: DeviceControl,
    function: F,
}

impl<F: Function> UsbDevice<F> {
    /// Create a device over the USB-FS instance described by `peripherals`
    ///
    /// # Panics
    ///
    /// Panics if `bdt` or `memory` is already assigned to another
    /// device.
    pub fn new<P: Peripherals, const SIZE: usize>(
        peripherals: P,
        bdt: &'static BufferDescriptorTable,
        memory: &'static EndpointMemory<SIZE>,
        descriptors: &'static Descriptors,
        function: F,
    ) -> Self {
        let ep0_max = descriptors.ep0_max_packet();
        debug_assert!(matches!(ep0_max, 8 | 16 | 32 | 64));
        UsbDevice {
            drv: Driver::new(peripherals, bdt, memory, ep0_max),
            pipe: ControlPipe::new(),
            dev: DeviceControl {
                state: DeviceState::Detached,
                configuration: 0,
                remote_wakeup: false,
                descriptors,
                resume_state: DeviceState::Detached,
            },
            function,
        }
    }

    /// Initialize the controller; call once before [`attach`](Self::attach)
    pub fn initialize(&mut self) {
        self.drv.initialize();
    }

    /// Present to the host
    pub fn attach(&mut self) {
        self.drv.attach();
        self.dev.state = DeviceState::Powered;
    }

    pub fn detach(&mut self) {
        self.drv.detach();
        self.dev.state = DeviceState::Detached;
    }

    pub fn state(&self) -> DeviceState {
        self.dev.state
    }

    /// Active `bConfigurationValue`, zero when unconfigured
    pub fn configuration(&self) -> u8 {
        self.dev.configuration
    }

    /// Bus error conditions accumulated since the last call
    pub fn bus_errors(&mut self) -> Errors {
        self.drv.take_errors()
    }

    /// Access the driver and the function together
    ///
    /// This is the main-loop path for class APIs that arm endpoints,
    /// like sending a HID report or draining serial data.
    pub fn split_mut(&mut self) -> (&mut Driver, &mut F) {
        (&mut self.drv, &mut self.function)
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    /// Service the bus; the interrupt handler's entry point
    ///
    /// Call until the returned status is empty: each call consumes at
    /// most one completed transaction.
    pub fn poll(&mut self) -> PollStatus {
        let bus = self.drv.poll();
        let mut status = PollStatus::default();

        if bus.reset {
            self.drv.bus_reset();
            self.pipe.reset();
            self.dev.configuration = 0;
            self.dev.state = DeviceState::Default;
            self.function.bus_reset(&mut self.drv);
            // Anything else latched alongside the reset is stale
            return PollStatus::RESET;
        }

        if bus.error {
            status |= PollStatus::ERROR;
        }
        if bus.suspend && self.dev.state != DeviceState::Suspended {
            self.dev.resume_state = self.dev.state;
            self.dev.state = DeviceState::Suspended;
            status |= PollStatus::SUSPEND;
            debug!("suspend");
        }
        if bus.resume && self.dev.state == DeviceState::Suspended {
            self.dev.state = self.dev.resume_state;
            status |= PollStatus::RESUME;
            debug!("resume");
        }
        if bus.stall {
            // The SIE reported a STALL handshake; a protocol stall on
            // EP0 clears on the next SETUP, so recover it now
            self.drv.clear_ep0_stall();
        }
        if let Some(frame) = bus.sof {
            self.function.sof(&mut self.drv, frame);
            status |= PollStatus::SOF;
        }
        if let Some(transaction) = bus.transaction {
            status |= PollStatus::TRANSACTION;
            if transaction.ep == 0 {
                self.pipe.on_transaction(
                    &mut self.drv,
                    &mut self.dev,
                    &mut self.function,
                    &transaction,
                );
            } else {
                self.function.tasks(&mut self.drv, &transaction);
            }
        }

        status
    }
}
