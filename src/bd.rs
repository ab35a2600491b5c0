//! Buffer descriptors (BD)
//!
//! One BD per (endpoint, direction, parity). The control word is
//! shared with the SIE: while `OWN` is set the SIE may write the
//! token PID and byte count back into it, so software must not
//! touch the descriptor until `OWN` clears. Arming is a single
//! volatile store so `OWN` becomes visible together with the rest
//! of the word.

#![allow(non_snake_case, non_upper_case_globals)]

use crate::ral;
use crate::vcell::VCell;
use num_enum::TryFromPrimitive;

/// Token PIDs the SIE records in a completed BD
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TokenPid {
    Out = 0x1,
    Sof = 0x5,
    In = 0x9,
    Setup = 0xD,
}

#[repr(C)]
pub struct Bd {
    CTRL: VCell<u32>,
    // The hardware address word is 32 bits; a usize keeps the same
    // layout on 32-bit targets and stays sound on wider hosts.
    ADDR: VCell<usize>,
}

impl Bd {
    pub const fn new() -> Self {
        Bd {
            CTRL: VCell::new(0),
            ADDR: VCell::new(0),
        }
    }

    /// Point the descriptor at its packet buffer
    ///
    /// Only valid while software owns the descriptor.
    pub fn set_address(&self, addr: *const u8) {
        self.ADDR.write(addr as usize);
    }

    pub fn address(&self) -> *mut u8 {
        self.ADDR.read() as *mut u8
    }

    /// Hand the descriptor to the SIE for a data transaction
    ///
    /// `count` is the maximum receive length for an OUT descriptor,
    /// or the exact payload length for an IN descriptor. `dts`
    /// enables the hardware DATA0/DATA1 check against `data1`.
    pub fn arm(&self, count: usize, data1: bool, dts: bool) {
        ral::write_reg!(
            crate::bd,
            self,
            CTRL,
            BC: count as u32,
            DATA01: data1 as u32,
            DTS: dts as u32,
            OWN: 1
        );
    }

    /// Hand the descriptor to the SIE armed to answer with STALL
    pub fn arm_stall(&self) {
        ral::write_reg!(crate::bd, self, CTRL, BDT_STALL: 1, OWN: 1);
    }

    /// Reclaim the descriptor from the SIE
    pub fn release(&self) {
        self.CTRL.write(0);
    }

    /// Indicates if the SIE currently owns the descriptor
    pub fn is_owned(&self) -> bool {
        ral::read_reg!(crate::bd, self, CTRL, OWN == 1)
    }

    pub fn is_stalled(&self) -> bool {
        ral::read_reg!(crate::bd, self, CTRL, BDT_STALL == 1)
    }

    /// Byte count the SIE wrote back for the completed transaction
    pub fn byte_count(&self) -> usize {
        ral::read_reg!(crate::bd, self, CTRL, BC) as usize
    }

    /// Token PID of the completed transaction
    pub fn token_pid(&self) -> Option<TokenPid> {
        TokenPid::try_from(ral::read_reg!(crate::bd, self, CTRL, TOK_PID) as u8).ok()
    }

    pub fn data01(&self) -> bool {
        ral::read_reg!(crate::bd, self, CTRL, DATA01 == 1)
    }

    /// Indicates if the SIE will enforce the DATA0/1 value
    pub fn dts(&self) -> bool {
        ral::read_reg!(crate::bd, self, CTRL, DTS == 1)
    }
}

pub mod CTRL {
    pub mod BC {
        pub const offset: u32 = 16;
        pub const mask: u32 = 0x3FF << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod OWN {
        pub const offset: u32 = 7;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod DATA01 {
        pub const offset: u32 = 6;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    /// Received token PID, valid when the SIE hands the BD back
    pub mod TOK_PID {
        pub const offset: u32 = 2;
        pub const mask: u32 = 0xF << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod KEEP {
        pub const offset: u32 = 5;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod NINC {
        pub const offset: u32 = 4;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod DTS {
        pub const offset: u32 = 3;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
    pub mod BDT_STALL {
        pub const offset: u32 = 2;
        pub const mask: u32 = 1 << offset;
        pub mod RW {}
        pub mod R {}
        pub mod W {}
    }
}

#[cfg(target_pointer_width = "32")]
const _: [(); 1] = [(); (core::mem::size_of::<Bd>() == 8) as usize];
