//! Provides wrappers for `Producer` and `Consumer` to work with memory mapped files, so that the
//! two sides of the ring buffer can live in different processes.

use crate::mem::Memory;
use crate::{Consumer, HEADER_SIZE, Producer, RingBuffer, validate_capacity};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use tracing::info;

/// Memory mapped file used as ring buffer backing memory.
struct MappedMemory(MmapMut);

unsafe impl Memory for MappedMemory {
    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        // the mapping is writable, the pointer is only ever used through the ring buffer
        self.0.as_ptr().cast_mut()
    }

    #[inline]
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl MappedMemory {
    fn map(file: &File) -> io::Result<Self> {
        let mmap = unsafe { MmapOptions::new().map_mut(file)? };
        Ok(Self(mmap))
    }
}

fn open(path: impl AsRef<Path>) -> io::Result<MappedMemory> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    MappedMemory::map(&file)
}

/// Producer backed by memory mapped object.
pub struct MappedProducer {
    producer: Producer,
}

impl Deref for MappedProducer {
    type Target = Producer;

    fn deref(&self) -> &Self::Target {
        &self.producer
    }
}

impl DerefMut for MappedProducer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.producer
    }
}

impl MappedProducer {
    /// Construct producer backed by memory mapped file with `capacity` bytes of data section. If the
    /// file already exists it will be removed. If you need to continue writing to existing file use
    /// `MappedProducer::join` instead.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> io::Result<Self> {
        validate_capacity(capacity).map_err(io::Error::other)?;
        let size = HEADER_SIZE
            .checked_add(capacity)
            .ok_or_else(|| io::Error::other(crate::error::capacity_too_large(capacity)))?;

        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        file.set_len(size as u64)?;
        file.sync_all()?;

        let ring = RingBuffer::from_memory(MappedMemory::map(&file)?).map_err(io::Error::other)?;
        info!(path = %path.display(), capacity, "created mapped ring buffer");
        Ok(Self {
            producer: ring.into_producer(),
        })
    }

    /// Construct producer backed by memory mapped file and continue writing from the most
    /// recent write position. It assumes the file already exists.
    ///
    /// # Safety
    /// No other producer (in this or any other process) may be attached to the file while the
    /// returned one is alive.
    pub unsafe fn join(path: impl AsRef<Path>) -> io::Result<Self> {
        let ring = unsafe { RingBuffer::join_memory(open(path.as_ref())?) }.map_err(io::Error::other)?;
        info!(path = %path.as_ref().display(), position = ring.state().write_position, "joined mapped ring buffer as producer");
        Ok(Self {
            producer: ring.into_producer(),
        })
    }
}

/// Consumer backed by memory mapped object.
pub struct MappedConsumer {
    consumer: Consumer,
}

impl Deref for MappedConsumer {
    type Target = Consumer;

    fn deref(&self) -> &Self::Target {
        &self.consumer
    }
}

impl DerefMut for MappedConsumer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.consumer
    }
}

impl MappedConsumer {
    /// Construct consumer backed by memory mapped file, continuing from the most recent read
    /// position. The file must have been created with `MappedProducer::create`.
    ///
    /// # Safety
    /// No other consumer (in this or any other process) may be attached to the file while the
    /// returned one is alive.
    pub unsafe fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let ring = unsafe { RingBuffer::join_memory(open(path.as_ref())?) }.map_err(io::Error::other)?;
        info!(path = %path.as_ref().display(), position = ring.state().read_position, "joined mapped ring buffer as consumer");
        Ok(Self {
            consumer: ring.into_consumer(),
        })
    }
}
