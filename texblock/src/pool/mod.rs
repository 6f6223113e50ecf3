//! Fixed-size reusable buffer pools.
//!
//! Every frame in flight needs several large scratch buffers (the encoded
//! output, the raw DXT block stream, the color-converted pixels). Allocating
//! them per frame is wasteful, so each session keeps one [`BufferPool`] per
//! buffer role. Buffers are allocated lazily on a pool miss and recycled on
//! release.
//!
//! # Design
//!
//! ```text
//! acquire() ──► SegQueue::pop ──► hit  ──► PooledBuffer
//!                    │
//!                    └── miss ──► try_reserve_exact ──► PooledBuffer
//!
//! drop(PooledBuffer) ──► SegQueue::push   (or free, once destroyed)
//! ```
//!
//! The free list is a lock-free `crossbeam` queue, so acquire and release are
//! safe under arbitrary concurrent callers and never block. It hands idle
//! buffers out first-in first-out; every idle buffer of a pool is
//! interchangeable, so reuse order does not matter.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{self, AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use tracing::{debug, trace};

use crate::error::CodecError;

/// Shared state of a pool. Buffers hold an `Arc` to it so they always know
/// which pool they belong to.
struct PoolInner {
    label: String,
    buffer_size: usize,
    free: SegQueue<Box<[u8]>>,
    allocated: AtomicUsize,
    destroyed: AtomicBool,
}

impl PoolInner {
    fn allocate(&self) -> Result<Box<[u8]>, CodecError> {
        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(self.buffer_size).map_err(|e| {
            CodecError::OutOfMemory(format!(
                "{} pool: failed to allocate {} bytes: {}",
                self.label, self.buffer_size, e
            ))
        })?;
        data.resize(self.buffer_size, 0);
        self.allocated.fetch_add(1, Ordering::Relaxed);

        trace!(
            pool = %self.label,
            size = self.buffer_size,
            "Allocated pool buffer"
        );

        Ok(data.into_boxed_slice())
    }

    fn give_back(&self, data: Box<[u8]>) {
        if self.destroyed.load(Ordering::Acquire) {
            // Released after destroy: free immediately.
            self.allocated.fetch_sub(1, Ordering::Relaxed);
            return;
        }
        self.free.push(data);

        // Pairs with the fence in `destroy`: either destroy's drain sees this
        // push, or this load sees the flag and drains it here.
        atomic::fence(Ordering::SeqCst);
        if self.destroyed.load(Ordering::Relaxed) {
            self.drain_idle();
        }
    }

    /// Frees every idle buffer, returning how many were freed.
    fn drain_idle(&self) -> usize {
        let mut freed = 0usize;
        while self.free.pop().is_some() {
            freed += 1;
        }
        self.allocated.fetch_sub(freed, Ordering::Relaxed);
        freed
    }
}

/// A pool of fixed-size byte buffers.
///
/// Cloning a `BufferPool` yields another handle to the same pool.
///
/// # Example
///
/// ```
/// use texblock::pool::BufferPool;
///
/// let pool = BufferPool::new("dxt", 1024);
/// let buffer = pool.acquire().unwrap();
/// assert_eq!(buffer.len(), 1024);
/// drop(buffer); // returned to the pool
/// assert_eq!(pool.idle_count(), 1);
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Creates an empty pool handing out buffers of `buffer_size` bytes.
    pub fn new(label: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                label: label.into(),
                buffer_size,
                free: SegQueue::new(),
                allocated: AtomicUsize::new(0),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Takes a buffer from the pool, allocating a new one on a miss.
    ///
    /// Never blocks. Fails with [`CodecError::OutOfMemory`] if the allocation
    /// fails, or [`CodecError::Internal`] if the pool was destroyed.
    pub fn acquire(&self) -> Result<PooledBuffer, CodecError> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(CodecError::internal(format!(
                "{} pool: acquire after destroy",
                self.inner.label
            )));
        }

        let data = match self.inner.free.pop() {
            Some(data) => data,
            None => self.inner.allocate()?,
        };

        Ok(PooledBuffer {
            data: Some(data),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Returns a buffer to its owning pool. `None` is a no-op.
    pub fn release(buffer: Option<PooledBuffer>) {
        drop(buffer);
    }

    /// Drains and frees every retained buffer.
    ///
    /// Buffers still checked out are freed when they are released.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        atomic::fence(Ordering::SeqCst);
        let freed = self.inner.drain_idle();

        debug!(pool = %self.inner.label, freed, "Destroyed buffer pool");
    }

    /// Drops idle buffers without destroying the pool.
    ///
    /// Used to reclaim memory under pressure once all tasks are finished.
    pub fn trim(&self) -> usize {
        self.inner.drain_idle()
    }

    /// Size in bytes of every buffer handed out by this pool.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Label used in log output.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Number of live buffers owned by this pool (idle or checked out).
    pub fn allocated_count(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }

    /// Number of buffers currently sitting on the free list.
    pub fn idle_count(&self) -> usize {
        self.inner.free.len()
    }

    /// Returns true once [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("label", &self.inner.label)
            .field("buffer_size", &self.inner.buffer_size)
            .field("allocated", &self.allocated_count())
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// A buffer checked out of a [`BufferPool`].
///
/// Dereferences to a byte slice of exactly the pool's buffer size. The
/// buffer goes back to its pool when dropped.
pub struct PooledBuffer {
    data: Option<Box<[u8]>>,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Explicitly returns the buffer to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Label of the owning pool.
    pub fn pool_label(&self) -> &str {
        &self.pool.label
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.give_back(data);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("pool", &self.pool.label)
            .field("len", &self.len())
            .finish()
    }
}
