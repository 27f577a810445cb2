//! Lock-free, single producer & single consumer (SPSC) byte ring buffer that keeps track of
//! occupancy using lap-counting positions. Works in process (threads, main loop and signal handler)
//! as well as across processes with shared memory.
//!
//! Read and write positions are monotonically increasing counters that are wider than the index
//! space. The bit just above the index bits (the lap bit) tells a full buffer from an empty one when
//! both indices point at the same byte, so no separate occupancy counter has to be shared between
//! the producer and the consumer.
//!
//! ## Examples
//! Split the `RingBuffer` into `Producer` and `Consumer` and move bytes between them.
//! ```
//! use lapring::RingBuffer;
//!
//! let (mut producer, mut consumer) = RingBuffer::new(16).unwrap().split();
//!
//! assert_eq!(5, producer.push_slice(b"hello"));
//! assert_eq!(5, consumer.state().used_size);
//!
//! let mut payload = [0u8; 16];
//! let len = consumer.pop_slice(&mut payload);
//! assert_eq!(b"hello", &payload[..len]);
//! assert!(consumer.state().empty);
//! ```
//! Use the zero copy path: take a snapshot, write directly into storage and publish.
//! ```
//! use lapring::RingBuffer;
//!
//! let (mut producer, consumer) = RingBuffer::new(8).unwrap().split();
//!
//! let state = producer.state();
//! let (head, _) = producer.vacant_slices();
//! head[..3].copy_from_slice(b"abc");
//! producer.try_advance_write(3, &state).unwrap();
//!
//! let (head, tail) = consumer.occupied_slices();
//! assert_eq!(b"abc", head);
//! assert!(tail.is_empty());
//! ```

pub mod error;
pub mod mem;
#[cfg(feature = "mmap")]
pub mod mmap;
mod state;

use crossbeam_utils::CachePadded;
use std::cmp::min;
use std::fmt;
use std::mem::{align_of, size_of};
use std::ptr::{NonNull, copy_nonoverlapping};
use std::slice::{from_raw_parts, from_raw_parts_mut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::mem::{HeapMemory, Memory};
// re-export
pub use error::{Error, Result};
pub use state::State;

/// Ring buffer header size in bytes.
pub const HEADER_SIZE: usize = size_of::<Header>();
/// Required alignment of the backing memory.
pub const HEADER_ALIGNMENT: usize = align_of::<Header>();

/// Ring buffer header that contains the producer and consumer positions. Both positions are
/// expressed in bytes and will always increase (wrapping at `usize::MAX`).
#[derive(Debug)]
#[repr(C)]
struct Header {
    write_position: CachePadded<AtomicUsize>, // only ever stored by the producer
    read_position: CachePadded<AtomicUsize>,  // only ever stored by the consumer
}

impl Header {
    #[inline]
    fn reset(&self) {
        self.write_position.store(0, Ordering::Release);
        self.read_position.store(0, Ordering::Release);
    }
}

/// Check that `capacity` can be used as ring buffer data section length. Any power of two that
/// fits in `usize` leaves at least one position bit above the index bits for the lap count.
#[inline]
const fn validate_capacity(capacity: usize) -> Result<()> {
    if !capacity.is_power_of_two() {
        return Err(error::capacity_not_power_of_two(capacity));
    }
    Ok(())
}

/// Allocation shared by the producer and the consumer.
struct Shared {
    header: NonNull<Header>,
    data: NonNull<u8>,
    capacity: usize,
    _memory: Box<dyn Memory>, // keeps header and data alive
}

// positions are atomics, data section access is partitioned between the two handles
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    #[inline]
    const fn header(&self) -> &Header {
        unsafe { self.header.as_ref() }
    }

    /// Get `(first, second)` slices of the data section, `first` starting at `index` and `second`
    /// starting at zero.
    ///
    /// # Safety
    /// Both ranges must lie within the data section, must not overlap and must not be accessed
    /// by the other side for the lifetime of the returned slices.
    #[inline]
    unsafe fn slices(&self, index: usize, first: usize, second: usize) -> (&[u8], &[u8]) {
        unsafe {
            (
                from_raw_parts(self.data.as_ptr().add(index), first),
                from_raw_parts(self.data.as_ptr(), second),
            )
        }
    }

    /// Mutable variant of `slices`.
    ///
    /// # Safety
    /// Same as `slices`, and the caller must hold exclusive access to the ranges.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn slices_mut(&self, index: usize, first: usize, second: usize) -> (&mut [u8], &mut [u8]) {
        unsafe {
            (
                from_raw_parts_mut(self.data.as_ptr().add(index), first),
                from_raw_parts_mut(self.data.as_ptr(), second),
            )
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("header", self.header())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Single producer, single consumer byte ring buffer. It is necessary to call `split()`, or
/// `into_producer()` / `into_consumer()`, following the buffer construction to start using it.
#[derive(Debug)]
pub struct RingBuffer {
    shared: Arc<Shared>,
}

impl RingBuffer {
    /// Create new heap allocated `RingBuffer` with `capacity` bytes of data section. Both positions
    /// start at zero.
    pub fn new(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        let len = HEADER_SIZE
            .checked_add(capacity)
            .ok_or_else(|| error::capacity_too_large(capacity))?;
        let memory = HeapMemory::zeroed(len).ok_or_else(|| error::capacity_too_large(capacity))?;
        let ring = Self::from_memory(memory)?;
        debug!(capacity, "created ring buffer");
        Ok(ring)
    }

    /// Create new `RingBuffer` on top of provided `memory`. The memory must be able to fit the header
    /// followed by power of two data section. Both positions are reset to zero.
    pub fn from_memory<M: Memory>(memory: M) -> Result<Self> {
        let ring = Self::wrap(Box::new(memory))?;
        ring.shared.header().reset();
        Ok(ring)
    }

    /// Attach to `memory` that already contains initialised ring buffer, keeping the current
    /// producer and consumer positions. Unlike `from_memory`, the region may also be reachable
    /// through other ring buffers, such as another mapping of the same file.
    ///
    /// # Safety
    /// Across every ring buffer attached to the same region there must be at most one live
    /// `Producer` and at most one live `Consumer` at any time.
    pub unsafe fn join_memory<M: Memory>(memory: M) -> Result<Self> {
        let ring = Self::wrap(Box::new(memory))?;
        let state = ring.state();
        debug!(
            capacity = state.capacity,
            read_position = state.read_position,
            write_position = state.write_position,
            "joined ring buffer"
        );
        Ok(ring)
    }

    fn wrap(memory: Box<dyn Memory>) -> Result<Self> {
        let len = memory.len();
        if len <= HEADER_SIZE {
            return Err(error::insufficient_memory(len, HEADER_SIZE + 1));
        }
        let capacity = len - HEADER_SIZE;
        validate_capacity(capacity)?;

        let ptr = memory.as_ptr();
        let Some(header) = NonNull::new(ptr.cast::<Header>()) else {
            return Err(error::misaligned_memory(0, HEADER_ALIGNMENT));
        };
        if !header.is_aligned() {
            return Err(error::misaligned_memory(ptr as usize, HEADER_ALIGNMENT));
        }
        let data = unsafe { header.cast::<u8>().add(HEADER_SIZE) };

        Ok(Self {
            shared: Arc::new(Shared {
                header,
                data,
                capacity,
                _memory: memory,
            }),
        })
    }

    /// Data section length in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Take a snapshot of the ring buffer occupancy.
    #[inline]
    pub fn state(&self) -> State {
        let header = self.shared.header();
        let read_position = header.read_position.load(Ordering::Acquire);
        let write_position = header.write_position.load(Ordering::Acquire);
        State::new(read_position, write_position, self.shared.capacity)
    }

    /// Will consume `self` and return a connected pair of producer and consumer.
    pub fn split(self) -> (Producer, Consumer) {
        let consumer = Consumer::new(self.shared.clone());
        (self.into_producer(), consumer)
    }

    /// Will consume `self` and return instance of producer backed by this ring buffer. The
    /// producer continues from the current write position. Only single producer should be present
    /// at any time.
    pub fn into_producer(self) -> Producer {
        Producer::new(self.shared)
    }

    /// Will consume `self` and return instance of consumer backed by this ring buffer. The
    /// consumer continues from the current read position. Only single consumer should be present
    /// at any time.
    pub fn into_consumer(self) -> Consumer {
        Consumer::new(self.shared)
    }
}

/// Writing side of the `RingBuffer`. Owns the write position and the free region of the data
/// section.
#[derive(Debug)]
pub struct Producer {
    shared: Arc<Shared>,
    position: usize, // local write position
}

impl Producer {
    fn new(shared: Arc<Shared>) -> Self {
        let position = shared.header().write_position.load(Ordering::Acquire);
        Self { shared, position }
    }

    /// Data section length in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Current write position.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Take a snapshot of the ring buffer occupancy. Free space reported can only grow until
    /// the next advance of this producer.
    #[inline]
    pub fn state(&self) -> State {
        let read_position = self.shared.header().read_position.load(Ordering::Acquire);
        State::new(read_position, self.position, self.shared.capacity)
    }

    /// Get the free region as `(first, second)` slices. The `first` slice starts at the write index
    /// and spans `contiguous_free_size` bytes, the `second` one holds the remaining free bytes from the
    /// beginning of the data section.
    #[inline]
    pub fn vacant_slices(&mut self) -> (&mut [u8], &mut [u8]) {
        let state = self.state();
        unsafe {
            self.shared
                .slices_mut(state.write_index, state.contiguous_free_size, state.wrapped_free_size())
        }
    }

    /// Publish `n` bytes that have already been written to the free region.
    ///
    /// # Safety
    /// `n` must not exceed `free_size` of a snapshot taken since the last advance of this producer,
    /// otherwise the producer would overwrite bytes the consumer is allowed to read.
    #[inline]
    pub unsafe fn advance_write(&mut self, n: usize) {
        debug_assert!(n <= self.state().free_size, "advancing past free space");
        self.position = self.position.wrapping_add(n);
        // signal updated producer position
        self.shared.header().write_position.store(self.position, Ordering::Release);
    }

    /// Publish `n` bytes after checking them against `state`. The snapshot must have been taken by
    /// this producer after its most recent advance.
    #[inline]
    pub fn try_advance_write(&mut self, n: usize, state: &State) -> Result<()> {
        if state.write_position != self.position {
            return Err(error::stale_state(state.write_position, self.position));
        }
        if n > state.free_size {
            return Err(error::insufficient_space(n, state.free_size));
        }
        unsafe { self.advance_write(n) };
        Ok(())
    }

    /// Copy as many bytes from `bytes` as the free space allows and publish them. Returns the number
    /// of bytes written.
    #[inline]
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let (first, second) = self.vacant_slices();
        let first_len = min(bytes.len(), first.len());
        let second_len = min(bytes.len() - first_len, second.len());
        unsafe {
            copy_nonoverlapping(bytes.as_ptr(), first.as_mut_ptr(), first_len);
            copy_nonoverlapping(bytes.as_ptr().add(first_len), second.as_mut_ptr(), second_len);
        }
        let len = first_len + second_len;
        if len > 0 {
            unsafe { self.advance_write(len) };
        }
        len
    }
}

/// Reading side of the `RingBuffer`. Owns the read position and the used region of the data
/// section.
#[derive(Debug)]
pub struct Consumer {
    shared: Arc<Shared>,
    position: usize, // local read position
}

impl Consumer {
    fn new(shared: Arc<Shared>) -> Self {
        let position = shared.header().read_position.load(Ordering::Acquire);
        Self { shared, position }
    }

    /// Data section length in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Current read position.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Take a snapshot of the ring buffer occupancy. Used space reported can only grow until
    /// the next advance of this consumer.
    #[inline]
    pub fn state(&self) -> State {
        let write_position = self.shared.header().write_position.load(Ordering::Acquire);
        State::new(self.position, write_position, self.shared.capacity)
    }

    /// Get the used region as `(first, second)` slices. The `first` slice starts at the read index
    /// and spans `contiguous_used_size` bytes, the `second` one holds the remaining used bytes from the
    /// beginning of the data section.
    #[inline]
    pub fn occupied_slices(&self) -> (&[u8], &[u8]) {
        let state = self.state();
        unsafe {
            self.shared
                .slices(state.read_index, state.contiguous_used_size, state.wrapped_used_size())
        }
    }

    /// Release `n` bytes that have already been consumed from the used region.
    ///
    /// # Safety
    /// `n` must not exceed `used_size` of a snapshot taken since the last advance of this consumer,
    /// otherwise the producer would be allowed to overwrite bytes that were never published.
    #[inline]
    pub unsafe fn advance_read(&mut self, n: usize) {
        debug_assert!(n <= self.state().used_size, "advancing past used space");
        self.position = self.position.wrapping_add(n);
        // signal updated consumer position
        self.shared.header().read_position.store(self.position, Ordering::Release);
    }

    /// Release `n` bytes after checking them against `state`. The snapshot must have been taken by
    /// this consumer after its most recent advance.
    #[inline]
    pub fn try_advance_read(&mut self, n: usize, state: &State) -> Result<()> {
        if state.read_position != self.position {
            return Err(error::stale_state(state.read_position, self.position));
        }
        if n > state.used_size {
            return Err(error::insufficient_data(n, state.used_size));
        }
        unsafe { self.advance_read(n) };
        Ok(())
    }

    /// Copy up to `buf.len()` pending bytes into `buf` and release them. Returns the number of
    /// bytes read.
    #[inline]
    pub fn pop_slice(&mut self, buf: &mut [u8]) -> usize {
        let (first, second) = self.occupied_slices();
        let first_len = min(buf.len(), first.len());
        let second_len = min(buf.len() - first_len, second.len());
        unsafe {
            copy_nonoverlapping(first.as_ptr(), buf.as_mut_ptr(), first_len);
            copy_nonoverlapping(second.as_ptr(), buf.as_mut_ptr().add(first_len), second_len);
        }
        let len = first_len + second_len;
        if len > 0 {
            unsafe { self.advance_read(len) };
        }
        len
    }

    /// Discard up to `n` pending bytes. Returns the number of bytes discarded.
    #[inline]
    pub fn skip(&mut self, n: usize) -> usize {
        let len = min(n, self.state().used_size);
        if len > 0 {
            unsafe { self.advance_read(len) };
        }
        len
    }
}
