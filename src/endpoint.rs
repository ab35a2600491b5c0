//! Per-endpoint software state
//!
//! One entry per (endpoint, direction): the DATA0/DATA1 value for the
//! next transaction, the halt condition, the last completed ping-pong
//! parity, and the packet buffers bound to the descriptors.

use crate::bdt::{is_ping_pong, Parity, ENDPOINTS, PPB_MODE};
use crate::buffer::Buffer;
use usb_device::UsbDirection;

pub(crate) struct EpBuffers {
    even: Buffer,
    odd: Option<Buffer>,
}

impl EpBuffers {
    pub fn new(even: Buffer, odd: Option<Buffer>) -> Self {
        EpBuffers { even, odd }
    }

    /// Buffer bound to the descriptor of `parity`
    ///
    /// Without ping-pong there is a single buffer on the even slot.
    pub fn bank(&self, parity: Parity) -> &Buffer {
        match parity {
            Parity::Even => &self.even,
            Parity::Odd => self.odd.as_ref().unwrap_or(&self.even),
        }
    }

    pub fn bank_mut(&mut self, parity: Parity) -> &mut Buffer {
        match parity {
            Parity::Even => &mut self.even,
            Parity::Odd => self.odd.as_mut().unwrap_or(&mut self.even),
        }
    }
}

pub(crate) struct EpState {
    /// DATA0 (false) / DATA1 (true) for the next transaction
    pub data01: bool,
    pub halted: bool,
    /// Parity of the most recently completed transaction
    pub last_parity: Parity,
    pub max_packet: usize,
    pub buffers: Option<EpBuffers>,
}

impl EpState {
    const INIT: EpState = EpState {
        data01: false,
        halted: false,
        // The SIE starts on the even bank after an ODDRST pulse
        last_parity: Parity::Odd,
        max_packet: 0,
        buffers: None,
    };

    /// Parity the SIE will use for the next transaction
    pub fn next_parity(&self, ep: usize, dir: UsbDirection) -> Parity {
        if is_ping_pong(PPB_MODE, ep, dir) {
            self.last_parity.other()
        } else {
            Parity::Even
        }
    }

    /// Reset transfer state, keeping buffers bound
    pub fn reset(&mut self) {
        self.data01 = false;
        self.halted = false;
        self.last_parity = Parity::Odd;
    }
}

pub(crate) struct EndpointTable {
    table: [[EpState; 2]; ENDPOINTS],
}

fn dir_index(dir: UsbDirection) -> usize {
    (dir == UsbDirection::In) as usize
}

impl EndpointTable {
    pub const fn new() -> Self {
        const DIR_INIT: [EpState; 2] = [EpState::INIT, EpState::INIT];
        EndpointTable {
            table: [DIR_INIT; ENDPOINTS],
        }
    }

    pub fn get(&self, ep: usize, dir: UsbDirection) -> &EpState {
        &self.table[ep][dir_index(dir)]
    }

    pub fn get_mut(&mut self, ep: usize, dir: UsbDirection) -> &mut EpState {
        &mut self.table[ep][dir_index(dir)]
    }

    /// Reset every endpoint's transfer state
    pub fn reset_all(&mut self) {
        for ep in self.table.iter_mut().flatten() {
            ep.reset();
        }
    }
}
