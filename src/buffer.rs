//! Endpoint packet memory
//!
//! A single statically-allocated region backs every endpoint's packet
//! buffers. The allocator is a one-way bump allocator: endpoints keep
//! their buffers until the next bus reset re-runs configuration, and
//! reconfiguration reuses the buffers already handed out.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Endpoint packet memory for all endpoints
///
/// Size it for the sum of the packet buffers your function needs;
/// 2KiB comfortably fits the bundled functions with every direction
/// double buffered.
///
/// ```
/// use kinetis_usbd::buffer::EndpointMemory;
/// static EP_MEMORY: EndpointMemory<2048> = EndpointMemory::new();
/// ```
pub struct EndpointMemory<const SIZE: usize> {
    buffer: UnsafeCell<[u8; SIZE]>,
    taken: AtomicBool,
}

impl<const SIZE: usize> EndpointMemory<SIZE> {
    pub const fn new() -> Self {
        EndpointMemory {
            buffer: UnsafeCell::new([0; SIZE]),
            taken: AtomicBool::new(false),
        }
    }

    /// Assign the memory to a driver
    ///
    /// Returns `None` if the memory is already assigned.
    pub(crate) fn allocator(&self) -> Option<Allocator> {
        if self.taken.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Allocator {
                start: self.buffer.get().cast(),
                ptr: unsafe { self.buffer.get().cast::<u8>().add(SIZE) },
            })
        }
    }
}

impl<const SIZE: usize> Default for EndpointMemory<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: the interior buffer is only reachable through the one
// allocator, and each allocation is handed to exactly one endpoint.
unsafe impl<const SIZE: usize> Sync for EndpointMemory<SIZE> {}

/// Bump-down allocator over the endpoint memory
pub(crate) struct Allocator {
    start: *mut u8,
    ptr: *mut u8,
}

impl Allocator {
    /// Allocates a buffer of `size` bytes, aligned to a word boundary
    pub fn allocate(&mut self, size: usize) -> Option<Buffer> {
        let ptr = (self.ptr as usize).checked_sub(size)? & !3;
        if ptr < self.start as usize {
            None
        } else {
            self.ptr = ptr as *mut u8;
            Some(Buffer {
                ptr: self.ptr,
                len: size,
            })
        }
    }
}

/// A packet buffer shared with the SIE
///
/// All accesses are volatile: the SIE reads and writes the memory
/// while the owning BD is armed.
pub(crate) struct Buffer {
    ptr: *mut u8,
    len: usize,
}

impl Buffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Copy out of the buffer, returning the bytes read
    pub fn volatile_read(&self, destination: &mut [u8]) -> usize {
        let size = self.len.min(destination.len());
        for (i, dst) in destination[..size].iter_mut().enumerate() {
            // Safety: i < len, in bounds of the allocation
            *dst = unsafe { self.ptr.add(i).read_volatile() };
        }
        size
    }

    /// Copy into the buffer, returning the bytes written
    pub fn volatile_write(&mut self, source: &[u8]) -> usize {
        let size = self.len.min(source.len());
        for (i, src) in source[..size].iter().enumerate() {
            // Safety: i < len, in bounds of the allocation
            unsafe { self.ptr.add(i).write_volatile(*src) };
        }
        size
    }
}

// Safety: a buffer is an exclusive view of its sub-slice of the
// endpoint memory.
unsafe impl Send for Buffer {}
