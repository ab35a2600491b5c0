//! Register access layer for the USB-FS device controller
//!
//! The USB-FS module exposes 8-bit registers on 32-bit boundaries.
//! The register block below is hand-written in the `ral-registers`
//! style so the usual `read_reg!` / `write_reg!` / `modify_reg!`
//! macros work against it. Only device-mode registers carry field
//! definitions; host/OTG registers are mapped but unused.

#![allow(non_snake_case, non_upper_case_globals)]

pub use ral_registers::{modify_reg, read_reg, write_reg, RORegister, RWRegister};

pub mod usbfs {
    use super::{RORegister, RWRegister};

    #[repr(C)]
    pub struct RegisterBlock {
        /// Peripheral ID register
        pub PERID: RORegister<u8>,
        _pad0: [u8; 3],
        /// Peripheral ID complement register
        pub IDCOMP: RORegister<u8>,
        _pad1: [u8; 3],
        /// Peripheral revision register
        pub REV: RORegister<u8>,
        _pad2: [u8; 3],
        /// Peripheral additional info register
        pub ADDINFO: RORegister<u8>,
        _pad3: [u8; 0x73],
        /// Interrupt status register
        pub ISTAT: RWRegister<u8>,
        _pad4: [u8; 3],
        /// Interrupt enable register
        pub INTEN: RWRegister<u8>,
        _pad5: [u8; 3],
        /// Error interrupt status register
        pub ERRSTAT: RWRegister<u8>,
        _pad6: [u8; 3],
        /// Error interrupt enable register
        pub ERREN: RWRegister<u8>,
        _pad7: [u8; 3],
        /// Status register: the last-transaction latch
        pub STAT: RORegister<u8>,
        _pad8: [u8; 3],
        /// Control register
        pub CTL: RWRegister<u8>,
        _pad9: [u8; 3],
        /// Address register
        pub ADDR: RWRegister<u8>,
        _pad10: [u8; 3],
        /// BDT page register 1: bits 15:9 of the table base
        pub BDTPAGE1: RWRegister<u8>,
        _pad11: [u8; 3],
        /// Frame number register, low byte
        pub FRMNUML: RORegister<u8>,
        _pad12: [u8; 3],
        /// Frame number register, bits 10:8
        pub FRMNUMH: RORegister<u8>,
        _pad13: [u8; 3],
        /// Token register (host mode, unused)
        pub TOKEN: RWRegister<u8>,
        _pad14: [u8; 3],
        /// SOF threshold register (host mode, unused)
        pub SOFTHLD: RWRegister<u8>,
        _pad15: [u8; 3],
        /// BDT page register 2: bits 23:16 of the table base
        pub BDTPAGE2: RWRegister<u8>,
        _pad16: [u8; 3],
        /// BDT page register 3: bits 31:24 of the table base
        pub BDTPAGE3: RWRegister<u8>,
        _pad17: [u8; 0xB],
        /// Endpoint control registers
        pub ENDPT: [EndptReg; 16],
        /// Transceiver control register
        pub USBCTRL: RWRegister<u8>,
        _pad18: [u8; 3],
        /// Transceiver observe register
        pub OBSERVE: RORegister<u8>,
        _pad19: [u8; 3],
        /// Transceiver pull-up control register
        pub CONTROL: RWRegister<u8>,
        _pad20: [u8; 3],
        /// Transceiver control register 0
        pub USBTRC0: RWRegister<u8>,
        _pad21: [u8; 7],
        /// Frame adjust register
        pub USBFRMADJUST: RWRegister<u8>,
        _pad22: [u8; 3],
    }

    const _: [(); 1] = [(); (core::mem::size_of::<RegisterBlock>() == 0x118) as usize];

    #[repr(C)]
    pub struct EndptReg {
        pub ENDPT: RWRegister<u8>,
        _pad: [u8; 3],
    }

    /// A USB-FS register block at a fixed address
    ///
    /// `Instance` is a non-owning view; the [`Peripherals`](crate::Peripherals)
    /// implementation vouches for the pointer.
    pub struct Instance {
        ptr: *const RegisterBlock,
    }

    impl Instance {
        /// # Safety
        ///
        /// `ptr` must point at a USB-FS register block, and the caller
        /// must be the only software agent driving those registers.
        pub(crate) unsafe fn new(ptr: *const ()) -> Self {
            Instance { ptr: ptr.cast() }
        }
    }

    impl core::ops::Deref for Instance {
        type Target = RegisterBlock;
        fn deref(&self) -> &Self::Target {
            // Safety: pointer validity asserted at construction.
            unsafe { &*self.ptr }
        }
    }

    // Safety: the register block is a fixed MMIO (or test-provided) region.
    unsafe impl Send for Instance {}

    pub mod ISTAT {
        pub mod USBRST {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ERROR {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SOFTOK {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod TOKDNE {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SLEEP {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod RESUME {
            pub const offset: u8 = 5;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ATTACH {
            pub const offset: u8 = 6;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod STALL {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod INTEN {
        pub mod USBRSTEN {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ERROREN {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SOFTOKEN {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod TOKDNEEN {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SLEEPEN {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod RESUMEEN {
            pub const offset: u8 = 5;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ATTACHEN {
            pub const offset: u8 = 6;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod STALLEN {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod STAT {
        pub mod ODD {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod TX {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ENDP {
            pub const offset: u8 = 4;
            pub const mask: u8 = 0xF << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod CTL {
        pub mod USBENSOFEN {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod ODDRST {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod RESUME {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod HOSTMODEEN {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod RESET {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod TXSUSPENDTOKENBUSY {
            pub const offset: u8 = 5;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SE0 {
            pub const offset: u8 = 6;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod JSTATE {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod ADDR {
        pub mod ADDR {
            pub const offset: u8 = 0;
            pub const mask: u8 = 0x7F;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod LSEN {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod USBCTRL {
        pub mod PDE {
            pub const offset: u8 = 6;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SUSP {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod CONTROL {
        pub mod DPPULLUPNONOTG {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub mod USBTRC0 {
        pub mod USB_RESUME_INT {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod SYNC_DET {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod USBRESMEN {
            pub const offset: u8 = 5;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod USBRESET {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }
}

/// Per-endpoint control register access
///
/// The RAL macros want a register named by an identifier, so this
/// module pairs the `ENDPT` array element with its field definitions.
pub mod endpt {
    use super::usbfs;

    pub struct Endpt<'a> {
        pub ENDPT: &'a super::RWRegister<u8>,
    }

    pub mod ENDPT {
        pub mod EPHSHK {
            pub const offset: u8 = 0;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPSTALL {
            pub const offset: u8 = 1;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPTXEN {
            pub const offset: u8 = 2;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPRXEN {
            pub const offset: u8 = 3;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod EPCTLDIS {
            pub const offset: u8 = 4;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod RETRYDIS {
            pub const offset: u8 = 6;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
        pub mod HOSTWOHUB {
            pub const offset: u8 = 7;
            pub const mask: u8 = 1 << offset;
            pub mod RW {}
            pub mod R {}
            pub mod W {}
        }
    }

    pub fn register(usb: &usbfs::Instance, endpoint: usize) -> Endpt<'_> {
        Endpt {
            ENDPT: &usb.ENDPT[endpoint].ENDPT,
        }
    }
}
