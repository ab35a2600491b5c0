//! A software SIE and host, for driving the stack on the build machine
//!
//! The harness owns a register block in plain memory and plays both
//! the hardware and the host: it honors the OWN-bit handover on the
//! real buffer descriptor table, writes completed-transaction status
//! into `STAT`/`ISTAT` exactly like the SIE's latch, and checks the
//! DATA0/1 sequence of everything the device transmits.

#![allow(dead_code)]

use kinetis_usbd::bd::Bd;
use kinetis_usbd::bdt::{self, BufferDescriptorTable, Parity, ENDPOINTS};
use kinetis_usbd::buffer::EndpointMemory;
use kinetis_usbd::class::Function;
use kinetis_usbd::descriptor::Descriptors;
use kinetis_usbd::{Peripherals, UsbDevice};
use usb_device::UsbDirection;

/* Register offsets within the USB-FS block */
pub const ISTAT: usize = 0x80;
pub const ERRSTAT: usize = 0x88;
pub const STAT: usize = 0x90;
pub const CTL: usize = 0x94;
pub const ADDR: usize = 0x98;
pub const BDTPAGE1: usize = 0x9C;
pub const FRMNUML: usize = 0xA0;
pub const FRMNUMH: usize = 0xA4;
pub const BDTPAGE2: usize = 0xB0;
pub const BDTPAGE3: usize = 0xB4;
pub const ENDPT0: usize = 0xC0;

/* ISTAT bits */
pub const ISTAT_USBRST: u8 = 1 << 0;
pub const ISTAT_ERROR: u8 = 1 << 1;
pub const ISTAT_SOFTOK: u8 = 1 << 2;
pub const ISTAT_TOKDNE: u8 = 1 << 3;
pub const ISTAT_SLEEP: u8 = 1 << 4;
pub const ISTAT_RESUME: u8 = 1 << 5;
pub const ISTAT_STALL: u8 = 1 << 7;

const CTL_TXSUSPENDTOKENBUSY: u8 = 1 << 5;

const REG_BLOCK: usize = 0x118;

/// How the bus turned a host request down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    /// No descriptor armed: the endpoint would NAK
    Nak,
    /// The endpoint answered STALL
    Stall,
}

struct TestPeripherals {
    regs: *mut u8,
}

unsafe impl Peripherals for TestPeripherals {
    fn usbfs(&self) -> *const () {
        self.regs as *const ()
    }
}

pub struct Host<F: Function> {
    pub dev: UsbDevice<F>,
    regs: *mut u8,
    bdt: &'static BufferDescriptorTable,
    /// DATA0/1 the host expects on the next IN, per endpoint
    expect_in_data1: [bool; ENDPOINTS],
    /// DATA0/1 the host will send on the next OUT, per endpoint
    out_data1: [bool; ENDPOINTS],
    ep0_max: usize,
}

impl<F: Function> Host<F> {
    /// Build a device around leaked statics and bring it on the bus
    pub fn new(function: F, descriptors: &'static Descriptors) -> Self {
        let regs = Box::leak(Box::new([0u8; REG_BLOCK])).as_mut_ptr();
        let bdt: &'static BufferDescriptorTable = Box::leak(Box::new(BufferDescriptorTable::new()));
        let memory: &'static EndpointMemory<4096> = Box::leak(Box::new(EndpointMemory::new()));

        let mut dev = UsbDevice::new(TestPeripherals { regs }, bdt, memory, descriptors, function);
        dev.initialize();
        dev.attach();

        Host {
            dev,
            regs,
            bdt,
            expect_in_data1: [false; ENDPOINTS],
            out_data1: [false; ENDPOINTS],
            ep0_max: descriptors.ep0_max_packet(),
        }
    }

    pub fn read_reg(&self, offset: usize) -> u8 {
        unsafe { self.regs.add(offset).read_volatile() }
    }

    fn write_reg(&mut self, offset: usize, value: u8) {
        unsafe { self.regs.add(offset).write_volatile(value) }
    }

    fn bd(&self, ep: usize, dir: UsbDirection, parity: Parity) -> &Bd {
        unsafe { &*self.bdt.as_ptr().add(bdt::index(ep, dir, parity)) }
    }

    /// Bank the SIE would use for the next `(ep, dir)` transaction
    pub fn armed_parity(&self, ep: usize, dir: UsbDirection) -> Option<Parity> {
        self.armed(ep, dir).map(|(parity, _)| parity)
    }

    /// The descriptor currently owned by the SIE for `(ep, dir)`
    fn armed(&self, ep: usize, dir: UsbDirection) -> Option<(Parity, &Bd)> {
        for parity in [Parity::Even, Parity::Odd] {
            let bd = self.bd(ep, dir, parity);
            if bd.is_owned() {
                return Some((parity, bd));
            }
        }
        None
    }

    /// Raise an interrupt condition and let the device service it
    fn interrupt(&mut self, istat: u8) {
        self.write_reg(ISTAT, istat);
        self.dev.poll();
        self.write_reg(ISTAT, 0);
    }

    /// Complete a transaction on a descriptor the way the SIE does:
    /// write the token PID and count back, clear OWN, latch `STAT`.
    fn complete(&mut self, ep: usize, dir: UsbDirection, parity: Parity, pid: u8, count: usize) {
        let bd = self.bd(ep, dir, parity);
        let ctrl = ((count as u32) << 16) | ((pid as u32) << 2);
        unsafe { (bd as *const Bd as *mut u32).write_volatile(ctrl) };

        let tx = (dir == UsbDirection::In) as u8;
        let odd = (parity == Parity::Odd) as u8;
        let stat = ((ep as u8) << 4) | (tx << 3) | (odd << 2);
        self.write_reg(STAT, stat);
        self.interrupt(ISTAT_TOKDNE);
    }

    /// Host-to-device transaction: a SETUP or an OUT data packet
    pub fn submit_out(
        &mut self,
        ep: usize,
        setup: bool,
        data: &[u8],
    ) -> Result<(), HostError> {
        let (parity, stalled, dts, data01, capacity, address) =
            match self.armed(ep, UsbDirection::Out) {
                Some((parity, bd)) => (
                    parity,
                    bd.is_stalled(),
                    bd.dts(),
                    bd.data01(),
                    bd.byte_count(),
                    bd.address(),
                ),
                None => return Err(HostError::Nak),
            };
        if stalled && !setup {
            self.handshake_stall();
            return Err(HostError::Stall);
        }

        assert!(
            data.len() <= capacity,
            "host payload exceeds the armed receive length"
        );
        if dts && !setup {
            assert_eq!(
                data01, self.out_data1[ep],
                "device armed the wrong OUT toggle on ep {ep}"
            );
        }

        for (i, byte) in data.iter().enumerate() {
            unsafe { address.add(i).write_volatile(*byte) };
        }

        if setup {
            // SETUP freezes token processing until software releases it
            let ctl = self.read_reg(CTL);
            self.write_reg(CTL, ctl | CTL_TXSUSPENDTOKENBUSY);
        }

        let pid = if setup { 0xD } else { 0x1 };
        self.complete(ep, UsbDirection::Out, parity, pid, data.len());

        if setup {
            assert_eq!(
                self.read_reg(CTL) & CTL_TXSUSPENDTOKENBUSY,
                0,
                "SETUP handler left token processing frozen"
            );
            // The next packets of this transfer are DATA1
            self.expect_in_data1[0] = true;
            self.out_data1[0] = true;
        } else {
            self.out_data1[ep] = !self.out_data1[ep];
        }
        Ok(())
    }

    /// Device-to-host transaction: collect one armed IN packet
    pub fn take_in(&mut self, ep: usize) -> Result<Vec<u8>, HostError> {
        let (parity, stalled, data01, count, address) = match self.armed(ep, UsbDirection::In) {
            Some((parity, bd)) => (
                parity,
                bd.is_stalled(),
                bd.data01(),
                bd.byte_count(),
                bd.address(),
            ),
            None => return Err(HostError::Nak),
        };
        if stalled {
            self.handshake_stall();
            return Err(HostError::Stall);
        }

        assert_eq!(
            data01, self.expect_in_data1[ep],
            "IN data toggle out of sequence on ep {ep}"
        );
        self.expect_in_data1[ep] = !self.expect_in_data1[ep];

        let mut data = Vec::with_capacity(count);
        for i in 0..count {
            data.push(unsafe { address.add(i).read_volatile() });
        }

        self.complete(ep, UsbDirection::In, parity, 0x9, count);
        Ok(data)
    }

    /// The SIE sent a STALL handshake; report it like the latch does
    fn handshake_stall(&mut self) {
        self.interrupt(ISTAT_STALL);
    }

    /* Bus events */

    pub fn bus_reset(&mut self) {
        self.interrupt(ISTAT_USBRST);
        self.expect_in_data1 = [false; ENDPOINTS];
        self.out_data1 = [false; ENDPOINTS];
    }

    pub fn sof(&mut self, frame: u16) {
        self.write_reg(FRMNUML, frame as u8);
        self.write_reg(FRMNUMH, (frame >> 8) as u8);
        self.interrupt(ISTAT_SOFTOK);
    }

    pub fn suspend(&mut self) {
        self.interrupt(ISTAT_SLEEP);
    }

    pub fn resume(&mut self) {
        self.interrupt(ISTAT_RESUME);
    }

    pub fn inject_error(&mut self, errstat: u8) {
        self.write_reg(ERRSTAT, errstat);
        self.interrupt(ISTAT_ERROR);
    }

    /* Control transfers */

    pub fn setup(&mut self, bytes: [u8; 8]) -> Result<(), HostError> {
        self.submit_out(0, true, &bytes)
    }

    /// Control read: SETUP, IN data stage, OUT status
    pub fn control_read(&mut self, setup: [u8; 8]) -> Result<Vec<u8>, HostError> {
        let wlength = u16::from_le_bytes([setup[6], setup[7]]) as usize;
        self.setup(setup)?;

        let mut data = Vec::new();
        loop {
            let packet = self.take_in(0)?;
            let len = packet.len();
            data.extend_from_slice(&packet);
            if len < self.ep0_max || data.len() >= wlength {
                break;
            }
        }

        self.submit_out(0, false, &[])?;
        Ok(data)
    }

    /// Control write: SETUP, OUT data stage, IN status
    pub fn control_write(&mut self, setup: [u8; 8], data: &[u8]) -> Result<(), HostError> {
        self.setup(setup)?;
        for chunk in data.chunks(self.ep0_max) {
            self.submit_out(0, false, chunk)?;
        }
        let status = self.take_in(0)?;
        assert!(status.is_empty(), "status stage carried data");
        Ok(())
    }

    /// Control transfer without a data stage
    pub fn control_nodata(&mut self, setup: [u8; 8]) -> Result<(), HostError> {
        self.setup(setup)?;
        let status = self.take_in(0)?;
        assert!(status.is_empty(), "status stage carried data");
        Ok(())
    }

    /* Standard request shorthands */

    pub fn get_descriptor(
        &mut self,
        descriptor_type: u8,
        index: u8,
        length: u16,
    ) -> Result<Vec<u8>, HostError> {
        let len = length.to_le_bytes();
        self.control_read([
            0x80,
            0x06,
            index,
            descriptor_type,
            0x00,
            0x00,
            len[0],
            len[1],
        ])
    }

    pub fn set_address(&mut self, address: u8) -> Result<(), HostError> {
        self.control_nodata([0x00, 0x05, address, 0x00, 0x00, 0x00, 0x00, 0x00])
    }

    pub fn set_configuration(&mut self, value: u8) -> Result<(), HostError> {
        self.control_nodata([0x00, 0x09, value, 0x00, 0x00, 0x00, 0x00, 0x00])?;
        // Fresh toggles on every function endpoint
        for ep in 1..ENDPOINTS {
            self.expect_in_data1[ep] = false;
            self.out_data1[ep] = false;
        }
        Ok(())
    }

    pub fn clear_endpoint_halt(&mut self, ep: usize, dir: UsbDirection) -> Result<(), HostError> {
        let index = ep as u8 | if dir == UsbDirection::In { 0x80 } else { 0x00 };
        self.control_nodata([0x02, 0x01, 0x00, 0x00, index, 0x00, 0x00, 0x00])?;
        match dir {
            UsbDirection::In => self.expect_in_data1[ep] = false,
            UsbDirection::Out => self.out_data1[ep] = false,
        }
        Ok(())
    }

    /// Reset, read the device descriptor, address, and configure
    pub fn enumerate(&mut self, address: u8) {
        self.bus_reset();
        let device = self
            .get_descriptor(0x01, 0, 64)
            .expect("device descriptor");
        assert_eq!(device.len(), 18);

        self.set_address(address).expect("set address");
        assert_eq!(self.read_reg(ADDR), address);

        let header = self.get_descriptor(0x02, 0, 9).expect("config header");
        let total = u16::from_le_bytes([header[2], header[3]]);
        let config = self
            .get_descriptor(0x02, 0, total)
            .expect("config descriptor");
        assert_eq!(config.len(), total as usize);

        self.set_configuration(config[5]).expect("set configuration");
    }
}
