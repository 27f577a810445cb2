//! Occupancy snapshot derived from the two ring positions.

/// Point-in-time view of the ring buffer occupancy. It is derived purely from the read and write
/// positions and the capacity, and becomes stale as soon as either position is advanced.
///
/// Positions are `usize` counters that only ever grow (wrapping at `usize::MAX`). The low `N` bits
/// of a position (where `capacity == 2^N`) form the buffer index, bit `N` is the lap bit. Since the
/// producer can never be more than one lap ahead of the consumer, the lap bit alone is enough to
/// tell a full buffer from an empty one when both indices coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Raw read position the snapshot was taken from.
    pub read_position: usize,
    /// Raw write position the snapshot was taken from.
    pub write_position: usize,
    /// Ring buffer capacity in bytes.
    pub capacity: usize,
    /// Buffer index at which next read will happen.
    pub read_index: usize,
    /// Buffer index at which next write will happen.
    pub write_index: usize,
    /// No free bytes left.
    pub full: bool,
    /// No bytes to consume.
    pub empty: bool,
    /// Total number of bytes pending consumption.
    pub used_size: usize,
    /// Total number of bytes available to the producer.
    pub free_size: usize,
    /// Number of used bytes starting at `read_index` without wrapping around.
    pub contiguous_used_size: usize,
    /// Number of free bytes starting at `write_index` without wrapping around.
    pub contiguous_free_size: usize,
}

impl State {
    /// Calculate occupancy from raw positions. The `capacity` must be a power of two.
    ///
    /// ## Examples
    /// ```
    /// use lapring::State;
    ///
    /// // producer has lapped the consumer exactly once
    /// let state = State::new(0, 8, 8);
    /// assert!(state.full);
    /// assert_eq!(0, state.write_index);
    /// assert_eq!(8, state.used_size);
    /// ```
    #[inline]
    pub const fn new(read_position: usize, write_position: usize, capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two(), "capacity must be power of two");

        let idx_mask = capacity.wrapping_sub(1);
        let write_index = write_position & idx_mask;
        let read_index = read_position & idx_mask;

        // isolates lap bit together with all index bits
        let lap_mask = (capacity | idx_mask) & (read_position ^ write_position);
        let full = lap_mask == capacity;
        let empty = lap_mask == 0;

        // masked subtraction relies on unsigned wrap around when the indices have crossed
        let free_size = if empty {
            capacity
        } else {
            read_index.wrapping_sub(write_index) & idx_mask
        };
        let used_size = if full {
            capacity
        } else {
            write_index.wrapping_sub(read_index) & idx_mask
        };

        let contiguous_free_size = if full {
            0
        } else if write_index >= read_index {
            capacity - write_index
        } else {
            read_index - write_index
        };
        let contiguous_used_size = if empty {
            0
        } else if write_index <= read_index {
            capacity - read_index
        } else {
            write_index - read_index
        };

        Self {
            read_position,
            write_position,
            capacity,
            read_index,
            write_index,
            full,
            empty,
            used_size,
            free_size,
            contiguous_used_size,
            contiguous_free_size,
        }
    }

    /// Number of free bytes past the end of the buffer, starting at index zero.
    #[inline]
    pub const fn wrapped_free_size(&self) -> usize {
        self.free_size - self.contiguous_free_size
    }

    /// Number of used bytes past the end of the buffer, starting at index zero.
    #[inline]
    pub const fn wrapped_used_size(&self) -> usize {
        self.used_size - self.contiguous_used_size
    }
}
