//! USB-FS device driver
//!
//! Owns the register block, the buffer descriptor table, and the
//! endpoint state table. Everything here is transaction-granular;
//! transfer semantics (control stages, class traffic) live above.

use crate::bd::{Bd, TokenPid};
use crate::bdt::{self, BufferDescriptorTable, Parity, ENDPOINTS, PPB_MODE};
use crate::buffer::{Allocator, EndpointMemory};
use crate::endpoint::{EndpointTable, EpBuffers};
use crate::fmt::{debug, warning};
use crate::ral;
use usb_device::UsbDirection;

bitflags::bitflags! {
    /// Accumulated bus error conditions, mirroring `ERRSTAT`
    ///
    /// Errors are informational: recovery happens through host
    /// retries and bus reset, never through software retry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Errors: u8 {
        const PID_MISMATCH = 1 << 0;
        const CRC5_EOF = 1 << 1;
        const CRC16 = 1 << 2;
        const DATA_FIELD = 1 << 3;
        const BUS_TURNAROUND = 1 << 4;
        const DMA = 1 << 5;
        const BIT_STUFF = 1 << 7;
    }
}

/// Errors arming an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointError {
    /// The descriptor for the next parity is still owned by the SIE
    Busy,
    /// The endpoint is halted
    Halted,
    /// No buffers are bound to the endpoint
    NotConfigured,
}

/// A completed transaction, decoded from the `STAT` latch
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    pub ep: usize,
    pub direction: UsbDirection,
    pub parity: Parity,
    pub pid: TokenPid,
    pub len: usize,
}

/// One `poll()` worth of latched bus events
#[derive(Default)]
pub(crate) struct BusPoll {
    pub reset: bool,
    pub error: bool,
    pub suspend: bool,
    pub resume: bool,
    pub stall: bool,
    pub sof: Option<u16>,
    pub transaction: Option<Transaction>,
}

pub struct Driver {
    usb: ral::usbfs::Instance,
    bds: &'static [Bd; bdt::LEN],
    allocator: Allocator,
    eps: EndpointTable,
    ep0_max: usize,
    errors: Errors,
}

impl Driver {
    /// # Panics
    ///
    /// Panics if the table or the endpoint memory is already assigned
    /// to another driver.
    pub(crate) fn new<P: crate::Peripherals, const SIZE: usize>(
        peripherals: P,
        bdt: &'static BufferDescriptorTable,
        memory: &'static EndpointMemory<SIZE>,
        ep0_max: usize,
    ) -> Self {
        // Safety: the Peripherals contract vouches for the pointer.
        let usb = unsafe { ral::usbfs::Instance::new(peripherals.usbfs()) };
        Driver {
            usb,
            bds: bdt.take().expect("BDT already assigned"),
            allocator: memory.allocator().expect("Endpoint memory already assigned"),
            eps: EndpointTable::new(),
            ep0_max,
            errors: Errors::empty(),
        }
    }

    /// Bring the module out of reset and enable device operation
    ///
    /// Assumes the 48 MHz USB clock is already running.
    pub(crate) fn initialize(&mut self) {
        // Module soft reset; the bit self-clears within two USB clocks
        ral::modify_reg!(ral::usbfs, self.usb, USBTRC0, USBRESET: 1);

        let base = self.bds.as_ptr() as usize;
        ral::write_reg!(ral::usbfs, self.usb, BDTPAGE1, (base >> 8) as u8);
        ral::write_reg!(ral::usbfs, self.usb, BDTPAGE2, (base >> 16) as u8);
        ral::write_reg!(ral::usbfs, self.usb, BDTPAGE3, (base >> 24) as u8);

        ral::write_reg!(ral::usbfs, self.usb, ISTAT, 0xFF);
        ral::write_reg!(ral::usbfs, self.usb, ERRSTAT, 0xFF);
        ral::write_reg!(ral::usbfs, self.usb, ERREN, 0xBF);

        ral::write_reg!(
            ral::usbfs,
            self.usb,
            INTEN,
            USBRSTEN: 1,
            ERROREN: 1,
            SOFTOKEN: 1,
            TOKDNEEN: 1,
            SLEEPEN: 1,
            RESUMEEN: 1,
            STALLEN: 1
        );

        // Out of suspend, weak pull-downs off
        ral::write_reg!(ral::usbfs, self.usb, USBCTRL, 0);
        ral::write_reg!(ral::usbfs, self.usb, CTL, USBENSOFEN: 1);
    }

    /// Present to the host by enabling the D+ pull-up
    pub(crate) fn attach(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CONTROL, DPPULLUPNONOTG: 1);
    }

    pub(crate) fn detach(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CONTROL, DPPULLUPNONOTG: 0);
    }

    /// Reinitialize after a bus reset
    ///
    /// Drops the device address, reclaims every descriptor, resets
    /// ping-pong parity to even, and re-arms EP0 OUT for a SETUP.
    pub(crate) fn bus_reset(&mut self) {
        ral::write_reg!(ral::usbfs, self.usb, ADDR, 0);

        for bd in self.bds.iter() {
            bd.release();
        }
        self.eps.reset_all();

        ral::modify_reg!(ral::usbfs, self.usb, CTL, ODDRST: 1);
        ral::modify_reg!(ral::usbfs, self.usb, CTL, ODDRST: 0);

        for ep in 1..ENDPOINTS {
            let endpt = ral::endpt::register(&self.usb, ep);
            ral::write_reg!(ral::endpt, &endpt, ENDPT, 0);
        }
        self.configure_endpoint(0, UsbDirection::Out, self.ep0_max);
        self.configure_endpoint(0, UsbDirection::In, self.ep0_max);
        self.ep0_arm_out();

        ral::modify_reg!(ral::usbfs, self.usb, CTL, TXSUSPENDTOKENBUSY: 0);
        debug!("bus reset");
    }

    /// Decode pending bus events
    ///
    /// Call from the USB interrupt until nothing is pending. Each call
    /// consumes at most one completed transaction, matching the depth
    /// of the `STAT` latch.
    pub(crate) fn poll(&mut self) -> BusPoll {
        let istat = ral::read_reg!(ral::usbfs, self.usb, ISTAT);
        let mut poll = BusPoll::default();

        use ral::usbfs::ISTAT;
        if istat & ISTAT::USBRST::mask != 0 {
            poll.reset = true;
        }
        if istat & ISTAT::ERROR::mask != 0 {
            let errstat = ral::read_reg!(ral::usbfs, self.usb, ERRSTAT);
            ral::write_reg!(ral::usbfs, self.usb, ERRSTAT, errstat);
            self.errors |= Errors::from_bits_truncate(errstat);
            poll.error = true;
            warning!("bus error {=u8:x}", errstat);
        }
        if istat & ISTAT::SOFTOK::mask != 0 {
            poll.sof = Some(self.frame_number());
        }
        if istat & ISTAT::SLEEP::mask != 0 {
            poll.suspend = true;
        }
        if istat & ISTAT::RESUME::mask != 0 {
            poll.resume = true;
        }
        if istat & ISTAT::STALL::mask != 0 {
            poll.stall = true;
        }
        if istat & ISTAT::TOKDNE::mask != 0 {
            poll.transaction = self.take_transaction();
        }

        // All latched events handled; write-one-to-clear
        ral::write_reg!(ral::usbfs, self.usb, ISTAT, istat);
        poll
    }

    fn take_transaction(&mut self) -> Option<Transaction> {
        let (ep, tx, odd) = ral::read_reg!(ral::usbfs, self.usb, STAT, ENDP, TX, ODD);
        let ep = ep as usize;
        let direction = if tx == 1 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        };
        let parity = Parity::from_odd_bit(odd == 1);

        let bd = &self.bds[bdt::index(ep, direction, parity)];
        let Some(pid) = bd.token_pid() else {
            warning!("unknown token pid on ep {}", ep);
            return None;
        };

        let state = self.eps.get_mut(ep, direction);
        state.last_parity = parity;
        // The value for the packet after this one
        state.data01 = !state.data01;

        Some(Transaction {
            ep,
            direction,
            parity,
            pid,
            len: bd.byte_count(),
        })
    }

    /// Bind packet buffers to `(ep, dir)` and enable its control bits
    ///
    /// Buffers persist across bus resets and reconfiguration; repeated
    /// calls only re-enable the endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the endpoint memory is exhausted, which is a static
    /// sizing error.
    pub fn configure_endpoint(&mut self, ep: usize, dir: UsbDirection, max_packet: usize) {
        let ping_pong = bdt::is_ping_pong(PPB_MODE, ep, dir);
        if self.eps.get(ep, dir).buffers.is_none() {
            let even = self
                .allocator
                .allocate(max_packet)
                .expect("out of endpoint memory");
            let odd = ping_pong.then(|| {
                self.allocator
                    .allocate(max_packet)
                    .expect("out of endpoint memory")
            });
            self.eps.get_mut(ep, dir).buffers = Some(EpBuffers::new(even, odd));
        }

        let state = self.eps.get_mut(ep, dir);
        state.max_packet = max_packet;
        let buffers = state.buffers.as_ref().unwrap();
        self.bds[bdt::index(ep, dir, Parity::Even)].set_address(buffers.bank(Parity::Even).as_ptr());
        if ping_pong {
            self.bds[bdt::index(ep, dir, Parity::Odd)].set_address(buffers.bank(Parity::Odd).as_ptr());
        }

        let endpt = ral::endpt::register(&self.usb, ep);
        match dir {
            UsbDirection::In => {
                ral::modify_reg!(ral::endpt, &endpt, ENDPT, EPHSHK: 1, EPTXEN: 1)
            }
            UsbDirection::Out => {
                ral::modify_reg!(ral::endpt, &endpt, ENDPT, EPHSHK: 1, EPRXEN: 1)
            }
        }
    }

    /// Disable all non-zero endpoints and reclaim their descriptors
    pub(crate) fn disable_nonzero_endpoints(&mut self) {
        for ep in 1..ENDPOINTS {
            let endpt = ral::endpt::register(&self.usb, ep);
            ral::write_reg!(ral::endpt, &endpt, ENDPT, 0);
            for dir in [UsbDirection::Out, UsbDirection::In] {
                self.bds[bdt::index(ep, dir, Parity::Even)].release();
                self.bds[bdt::index(ep, dir, Parity::Odd)].release();
                self.eps.get_mut(ep, dir).reset();
            }
        }
    }

    /// Resynchronize every ping-pong parity to even
    pub(crate) fn reset_parities(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CTL, ODDRST: 1);
        ral::modify_reg!(ral::usbfs, self.usb, CTL, ODDRST: 0);
        for ep in 0..ENDPOINTS {
            for dir in [UsbDirection::Out, UsbDirection::In] {
                self.eps.get_mut(ep, dir).last_parity = Parity::Odd;
            }
        }
    }

    /// Release the SIE's token-processing freeze after a SETUP
    pub(crate) fn resume_token_processing(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CTL, TXSUSPENDTOKENBUSY: 0);
    }

    /// Arm an OUT endpoint to receive the next packet
    pub fn arm_out(&mut self, ep: usize) -> Result<(), EndpointError> {
        let state = self.eps.get(ep, UsbDirection::Out);
        if state.halted {
            return Err(EndpointError::Halted);
        }
        if state.buffers.is_none() {
            return Err(EndpointError::NotConfigured);
        }
        let parity = state.next_parity(ep, UsbDirection::Out);
        let bd = &self.bds[bdt::index(ep, UsbDirection::Out, parity)];
        if bd.is_owned() {
            return Err(EndpointError::Busy);
        }
        bd.arm(state.max_packet, state.data01, true);
        Ok(())
    }

    /// Stage `data` on an IN endpoint
    ///
    /// The payload is copied into the bank for the next parity and the
    /// descriptor handed to the SIE with the current DATA0/1 value.
    pub fn arm_in(&mut self, ep: usize, data: &[u8]) -> Result<(), EndpointError> {
        let state = self.eps.get_mut(ep, UsbDirection::In);
        if state.halted {
            return Err(EndpointError::Halted);
        }
        let parity = state.next_parity(ep, UsbDirection::In);
        let bd = &self.bds[bdt::index(ep, UsbDirection::In, parity)];
        if bd.is_owned() {
            return Err(EndpointError::Busy);
        }
        let buffers = state
            .buffers
            .as_mut()
            .ok_or(EndpointError::NotConfigured)?;
        let written = buffers.bank_mut(parity).volatile_write(data);
        debug_assert!(written == data.len(), "payload exceeds endpoint buffer");
        bd.arm(data.len(), state.data01, true);
        Ok(())
    }

    /// Indicates if the IN side of `ep` can accept another payload
    pub fn in_idle(&self, ep: usize) -> bool {
        let state = self.eps.get(ep, UsbDirection::In);
        let parity = state.next_parity(ep, UsbDirection::In);
        !self.bds[bdt::index(ep, UsbDirection::In, parity)].is_owned()
    }

    /// Copy a completed OUT transaction's payload into `buf`
    pub fn read_out(&self, transaction: &Transaction, buf: &mut [u8]) -> usize {
        let state = self.eps.get(transaction.ep, UsbDirection::Out);
        let Some(buffers) = state.buffers.as_ref() else {
            return 0;
        };
        let len = transaction.len.min(buf.len());
        buffers.bank(transaction.parity).volatile_read(&mut buf[..len])
    }

    /// Arm EP0 OUT for the next SETUP, data, or status packet
    ///
    /// Toggle checking stays off: EP0 OUT must accept a retried SETUP
    /// at any time, and the control pipe validates the stage and PID
    /// in software.
    pub(crate) fn ep0_arm_out(&mut self) {
        let state = self.eps.get(0, UsbDirection::Out);
        let parity = state.next_parity(0, UsbDirection::Out);
        let bd = &self.bds[bdt::index(0, UsbDirection::Out, parity)];
        if !bd.is_owned() {
            bd.arm(self.ep0_max, state.data01, false);
        }
    }

    /// Arm the zero-length, DATA1 status handshake on EP0 IN
    pub(crate) fn ep0_arm_status_in(&mut self) {
        self.eps.get_mut(0, UsbDirection::In).data01 = true;
        let _ = self.arm_in(0, &[]);
    }

    /// Reclaim any pending EP0 IN descriptors
    ///
    /// A SETUP supersedes whatever EP0 IN data was staged.
    pub(crate) fn ep0_cancel_in(&mut self) {
        self.bds[bdt::index(0, UsbDirection::In, Parity::Even)].release();
        self.bds[bdt::index(0, UsbDirection::In, Parity::Odd)].release();
    }

    /// Answer the current control request with STALL
    ///
    /// Both EP0 IN banks respond with STALL so the host sees a request
    /// error no matter which bank the SIE consults next. The condition
    /// clears itself when the next SETUP arrives.
    pub(crate) fn request_error(&mut self) {
        debug!("request error");
        self.ep0_cancel_in();
        self.bds[bdt::index(0, UsbDirection::In, Parity::Even)].arm_stall();
        self.bds[bdt::index(0, UsbDirection::In, Parity::Odd)].arm_stall();
    }

    /// Clear the EP0 protocol stall once the SIE reports it was sent
    pub(crate) fn clear_ep0_stall(&mut self) {
        for parity in [Parity::Even, Parity::Odd] {
            let bd = &self.bds[bdt::index(0, UsbDirection::In, parity)];
            if bd.is_stalled() {
                bd.release();
            }
        }
        let endpt = ral::endpt::register(&self.usb, 0);
        ral::modify_reg!(ral::endpt, &endpt, ENDPT, EPSTALL: 0);
        self.ep0_arm_out();
    }

    /// Halt an endpoint direction
    pub fn stall(&mut self, ep: usize, dir: UsbDirection) {
        self.eps.get_mut(ep, dir).halted = true;
        self.bds[bdt::index(ep, dir, Parity::Even)].arm_stall();
        self.bds[bdt::index(ep, dir, Parity::Odd)].arm_stall();
    }

    /// Clear an endpoint halt, resetting its data toggle to DATA0
    pub fn unstall(&mut self, ep: usize, dir: UsbDirection) {
        let state = self.eps.get_mut(ep, dir);
        state.halted = false;
        state.data01 = false;
        self.bds[bdt::index(ep, dir, Parity::Even)].release();
        self.bds[bdt::index(ep, dir, Parity::Odd)].release();
    }

    pub fn is_halted(&self, ep: usize, dir: UsbDirection) -> bool {
        self.eps.get(ep, dir).halted
    }

    /// Reset the software data toggle for `(ep, dir)`
    pub fn reset_toggle(&mut self, ep: usize, dir: UsbDirection) {
        self.eps.get_mut(ep, dir).data01 = false;
    }

    /// Set both EP0 toggles so the next packet is DATA1
    pub(crate) fn ep0_toggles_data1(&mut self) {
        self.eps.get_mut(0, UsbDirection::Out).data01 = true;
        self.eps.get_mut(0, UsbDirection::In).data01 = true;
    }

    /// Commit the device address assigned by the host
    pub(crate) fn set_address(&mut self, address: u8) {
        ral::write_reg!(ral::usbfs, self.usb, ADDR, ADDR: address & 0x7F);
        debug!("address {}", address);
    }

    pub fn frame_number(&self) -> u16 {
        let low = ral::read_reg!(ral::usbfs, self.usb, FRMNUML) as u16;
        let high = ral::read_reg!(ral::usbfs, self.usb, FRMNUMH) as u16;
        ((high & 0x7) << 8) | low
    }

    /// Indicates if `(ep, dir)` is enabled in its control register
    pub fn endpoint_enabled(&self, ep: usize, dir: UsbDirection) -> bool {
        let endpt = ral::endpt::register(&self.usb, ep);
        match dir {
            UsbDirection::In => ral::read_reg!(ral::endpt, &endpt, ENDPT, EPTXEN == 1),
            UsbDirection::Out => ral::read_reg!(ral::endpt, &endpt, ENDPT, EPRXEN == 1),
        }
    }

    /// Drive resume signaling for a remote wakeup
    pub fn remote_wakeup(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CTL, RESUME: 1);
        // Resume signaling must hold for 1-15 ms; the caller times it
    }

    pub fn end_remote_wakeup(&mut self) {
        ral::modify_reg!(ral::usbfs, self.usb, CTL, RESUME: 0);
    }

    /// Accumulated bus errors since the last call
    pub fn take_errors(&mut self) -> Errors {
        core::mem::take(&mut self.errors)
    }

    pub fn ep0_max(&self) -> usize {
        self.ep0_max
    }
}
