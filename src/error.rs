//! Defines error types.
use thiserror::Error;

/// Crate result type (re-exported).
pub type Result<T> = std::result::Result<T, Error>;

/// Error types.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Ring buffer capacity (data section length) is not a power of two.
    #[error("capacity must be power of two, provided: {0}")]
    CapacityNotPowerOfTwo(usize),
    /// Ring buffer capacity cannot be allocated.
    #[error("capacity too large, provided: {0}")]
    CapacityTooLarge(usize),
    /// Backing memory cannot fit the header and at least one data byte.
    #[error("memory is of insufficient size, provided: {0}, required: {1}")]
    InsufficientMemory(usize, usize),
    /// Backing memory is not aligned for the header.
    #[error("memory is misaligned, address: {0:#x}, required alignment: {1}")]
    MisalignedMemory(usize, usize),
    /// Attempting to advance the producer past the free space.
    #[error("insufficient free space, requested: {0}, available: {1}")]
    InsufficientSpace(usize, usize),
    /// Attempting to advance the consumer past the pending data.
    #[error("insufficient data, requested: {0}, available: {1}")]
    InsufficientData(usize, usize),
    /// State snapshot was taken before the most recent advance of the caller.
    #[error("stale state, snapshot position: {0}, current position: {1}")]
    StaleState(usize, usize),
}

#[cold]
#[inline(never)]
pub(crate) const fn capacity_not_power_of_two(capacity: usize) -> Error {
    Error::CapacityNotPowerOfTwo(capacity)
}

#[cold]
#[inline(never)]
pub(crate) const fn capacity_too_large(capacity: usize) -> Error {
    Error::CapacityTooLarge(capacity)
}

#[cold]
#[inline(never)]
pub(crate) const fn insufficient_memory(provided: usize, required: usize) -> Error {
    Error::InsufficientMemory(provided, required)
}

#[cold]
#[inline(never)]
pub(crate) const fn misaligned_memory(address: usize, alignment: usize) -> Error {
    Error::MisalignedMemory(address, alignment)
}

#[cold]
#[inline(never)]
pub(crate) const fn insufficient_space(requested: usize, available: usize) -> Error {
    Error::InsufficientSpace(requested, available)
}

#[cold]
#[inline(never)]
pub(crate) const fn insufficient_data(requested: usize, available: usize) -> Error {
    Error::InsufficientData(requested, available)
}

#[cold]
#[inline(never)]
pub(crate) const fn stale_state(snapshot: usize, current: usize) -> Error {
    Error::StaleState(snapshot, current)
}
