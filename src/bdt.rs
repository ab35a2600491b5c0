//! Buffer descriptor table layout
//!
//! The SIE locates a transaction's descriptor by endpoint, direction,
//! and ping-pong parity. Which coordinates actually ping-pong is a
//! build-time property of the SIE variant, selected by the `ppb-*`
//! features; the table length and index arithmetic follow from it.

use crate::bd::Bd;
use core::sync::atomic::{AtomicBool, Ordering};
use usb_device::UsbDirection;

/// Endpoints supported by the USB-FS module
pub const ENDPOINTS: usize = 16;

/// Ping-pong (double buffering) arrangement of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPongMode {
    /// Single-buffered table
    None,
    /// Only EP0 OUT is double buffered
    Ep0OutOnly,
    /// Every direction except the control endpoint is double buffered
    AllNonzero,
    /// Every endpoint direction is double buffered
    All,
}

#[cfg(feature = "ppb-none")]
pub const PPB_MODE: PingPongMode = PingPongMode::None;
#[cfg(all(feature = "ppb-ep0-out-only", not(feature = "ppb-none")))]
pub const PPB_MODE: PingPongMode = PingPongMode::Ep0OutOnly;
#[cfg(all(
    feature = "ppb-all-nonzero",
    not(any(feature = "ppb-none", feature = "ppb-ep0-out-only"))
))]
pub const PPB_MODE: PingPongMode = PingPongMode::AllNonzero;
#[cfg(not(any(
    feature = "ppb-none",
    feature = "ppb-ep0-out-only",
    feature = "ppb-all-nonzero"
)))]
pub const PPB_MODE: PingPongMode = PingPongMode::All;

/// Ping-pong bank of a buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn other(self) -> Self {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    /// Parity from the `STAT` register's ODD bit
    pub(crate) fn from_odd_bit(odd: bool) -> Self {
        if odd {
            Parity::Odd
        } else {
            Parity::Even
        }
    }
}

/// Indicates if `(ep, dir)` has two banks under `mode`
pub const fn is_ping_pong(mode: PingPongMode, ep: usize, dir: UsbDirection) -> bool {
    match mode {
        PingPongMode::None => false,
        PingPongMode::Ep0OutOnly => ep == 0 && matches!(dir, UsbDirection::Out),
        PingPongMode::AllNonzero => ep != 0,
        PingPongMode::All => true,
    }
}

/// Number of table entries under `mode`
pub const fn entries(mode: PingPongMode) -> usize {
    match mode {
        PingPongMode::None => ENDPOINTS * 2,
        PingPongMode::Ep0OutOnly => ENDPOINTS * 2 + 1,
        PingPongMode::AllNonzero => 2 + (ENDPOINTS - 1) * 4,
        PingPongMode::All => ENDPOINTS * 4,
    }
}

/// Length of the table selected at build time
pub const LEN: usize = entries(PPB_MODE);

const fn dir_bit(dir: UsbDirection) -> usize {
    match dir {
        UsbDirection::Out => 0,
        UsbDirection::In => 1,
    }
}

const fn parity_bit(parity: Parity) -> usize {
    match parity {
        Parity::Even => 0,
        Parity::Odd => 1,
    }
}

/// Table index of the descriptor for `(ep, dir, parity)` under `mode`
///
/// For coordinates without ping-pong, the parity is ignored and the
/// single descriptor is returned. The `All` layout matches the address
/// computation the USB-FS hardware performs from `STAT`.
pub const fn index_in(mode: PingPongMode, ep: usize, dir: UsbDirection, parity: Parity) -> usize {
    let d = dir_bit(dir);
    let p = parity_bit(parity);
    match mode {
        PingPongMode::None => ep * 2 + d,
        PingPongMode::Ep0OutOnly => {
            if ep == 0 {
                match dir {
                    UsbDirection::Out => p,
                    UsbDirection::In => 2,
                }
            } else {
                1 + ep * 2 + d
            }
        }
        PingPongMode::AllNonzero => {
            if ep == 0 {
                d
            } else {
                2 + (ep - 1) * 4 + d * 2 + p
            }
        }
        PingPongMode::All => ep * 4 + d * 2 + p,
    }
}

/// Table index under the build-time layout
pub const fn index(ep: usize, dir: UsbDirection, parity: Parity) -> usize {
    index_in(PPB_MODE, ep, dir, parity)
}

/// The buffer descriptor table
///
/// Statically allocate one of these, and hand it to the device on
/// construction. The SIE requires the table to sit on a 512-byte
/// boundary; the address ends up in the BDT page registers.
///
/// ```
/// use kinetis_usbd::bdt::BufferDescriptorTable;
/// static BDT: BufferDescriptorTable = BufferDescriptorTable::new();
/// ```
#[repr(C, align(512))]
pub struct BufferDescriptorTable {
    bds: [Bd; LEN],
    taken: AtomicBool,
}

impl BufferDescriptorTable {
    pub const fn new() -> Self {
        const BD_INIT: Bd = Bd::new();
        BufferDescriptorTable {
            bds: [BD_INIT; LEN],
            taken: AtomicBool::new(false),
        }
    }

    /// Base address of the table, as programmed into the BDT page registers
    pub fn as_ptr(&self) -> *const Bd {
        self.bds.as_ptr()
    }

    /// Assign the table to a driver
    ///
    /// Returns `None` if the table is already assigned.
    pub(crate) fn take(&self) -> Option<&[Bd; LEN]> {
        if self.taken.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(&self.bds)
        }
    }
}

impl Default for BufferDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: descriptor words are volatile cells; the OWN handover
// protocol serializes access between software and the SIE.
unsafe impl Sync for BufferDescriptorTable {}
