//! Backing memory for the ring buffer. The memory region holds the ring buffer header
//! (`HEADER_SIZE` bytes) immediately followed by the data section.

use crate::HEADER_ALIGNMENT;
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::UnsafeCell;
use std::ptr::NonNull;

/// Contiguous memory region that can back a ring buffer.
///
/// # Safety
/// Implementations must guarantee that `as_ptr()` points to `len()` readable and writable bytes
/// which stay valid (and at the same address) for as long as the implementing value is alive, and
/// that the region can be mutated through that pointer while only a shared reference exists. The
/// region must not be reachable through any other `Memory` value, so that `RingBuffer::from_memory`
/// grants exclusive access to it. Regions shared on purpose (for example several mappings of one file)
/// may only be attached with the unsafe `RingBuffer::join_memory`.
pub unsafe trait Memory: Send + Sync + 'static {
    /// Pointer to the first byte of the region.
    fn as_ptr(&self) -> *mut u8;

    /// Length of the region in bytes.
    fn len(&self) -> usize;
}

unsafe impl<M: Memory> Memory for &'static mut M {
    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        (**self).as_ptr()
    }

    #[inline]
    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Zero initialised heap allocation aligned for the ring buffer header.
#[derive(Debug)]
pub struct HeapMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

// the allocation is exclusively owned and only ever accessed through raw pointers
unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl HeapMemory {
    /// Allocate `len` zeroed bytes. Returns `None` when `len` is zero, exceeds the maximum
    /// allocation size or the allocator is unable to provide the memory.
    pub fn zeroed(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let layout = Layout::from_size_align(len, HEADER_ALIGNMENT).ok()?;
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self { ptr, layout })
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

unsafe impl Memory for HeapMemory {
    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    fn len(&self) -> usize {
        self.layout.size()
    }
}

/// Fixed size array of bytes with 128-byte alignment, for when the ring buffer size is known at
/// compile time. The size `N` covers both the header and the data section.
/// ## Example
/// ```
/// use lapring::mem::InlineMemory;
/// use lapring::{HEADER_SIZE, RingBuffer};
///
/// // exclusive 'static reference, e.g. to share with a signal handler
/// let memory = Box::leak(Box::new(InlineMemory::<{ HEADER_SIZE + 1024 }>::new()));
///
/// let ring = RingBuffer::from_memory(memory).unwrap();
/// assert_eq!(1024, ring.capacity());
/// ```
/// Shared references cannot back a ring buffer, as that would allow more than one producer.
/// ```compile_fail
/// use lapring::mem::InlineMemory;
/// use lapring::{HEADER_SIZE, RingBuffer};
///
/// static MEMORY: InlineMemory<{ HEADER_SIZE + 1024 }> = InlineMemory::new();
///
/// let producer = RingBuffer::from_memory(&MEMORY).unwrap().into_producer();
/// let aliased = RingBuffer::from_memory(&MEMORY).unwrap().into_producer();
/// ```
#[repr(C, align(128))]
pub struct InlineMemory<const N: usize>(UnsafeCell<[u8; N]>);

// all access goes through raw pointers handed out to a single producer and a single consumer
unsafe impl<const N: usize> Sync for InlineMemory<N> {}

impl<const N: usize> InlineMemory<N> {
    /// Construct new zeroed array with specific size `N`.
    #[inline]
    pub const fn new() -> InlineMemory<N> {
        Self(UnsafeCell::new([0; N]))
    }
}

impl<const N: usize> Default for InlineMemory<N> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const N: usize> Memory for InlineMemory<N> {
    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        self.0.get().cast()
    }

    #[inline]
    fn len(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::align_of;

    #[test]
    fn should_allocate_zeroed_and_aligned() {
        let memory = HeapMemory::zeroed(4096).unwrap();
        assert_eq!(4096, memory.len());
        assert_eq!(0, memory.as_ptr() as usize % HEADER_ALIGNMENT);
        let bytes = unsafe { std::slice::from_raw_parts(memory.as_ptr(), memory.len()) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn should_reject_invalid_heap_size() {
        assert!(HeapMemory::zeroed(0).is_none());
        assert!(HeapMemory::zeroed(usize::MAX).is_none());
    }

    #[test]
    fn should_align_inline_memory() {
        assert_eq!(128, align_of::<InlineMemory<64>>());
        let memory = Box::new(InlineMemory::<512>::new());
        assert_eq!(512, memory.len());
        assert_eq!(0, memory.as_ptr() as usize % 128);
    }
}
