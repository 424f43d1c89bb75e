//! Lock-free object pool and intrusive index stacks.
//!
//! Slots live in lazily allocated chunks that are never moved or freed
//! while the pool exists, so a slot index stays valid for the pool's
//! lifetime. Each slot carries a `next` link that threads it onto at
//! most one [`IndexStack`] at a time: the pool's free list while vacant,
//! or a caller's stack while occupied.

use crate::fatal::fatal;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

const CHUNK_BITS: u32 = 12;
const CHUNK_SIZE: usize = 1 << CHUNK_BITS;
const MAX_CHUNKS: usize = 4096;

/// Slots a single pool can hand out.
pub const POOL_CAPACITY: usize = CHUNK_SIZE * MAX_CHUNKS;

/// Link value for "no slot".
const NIL: u32 = 0;

struct Slot<T> {
    value: UnsafeCell<Option<T>>,
    next: AtomicU32,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Self {
            value: UnsafeCell::new(None),
            next: AtomicU32::new(NIL),
        }
    }
}

/// Treiber stack of slot indices.
///
/// The head packs a generation tag in the upper half and `index + 1` in
/// the lower half, so a pop racing with a pop-push of the same slot fails
/// its compare-exchange instead of installing a stale link.
pub struct IndexStack {
    head: AtomicU64,
}

impl Default for IndexStack {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStack {
    pub const fn new() -> Self {
        Self {
            head: AtomicU64::new(0),
        }
    }

    fn unpack(head: u64) -> (u32, u32) {
        ((head >> 32) as u32, head as u32)
    }

    fn pack(tag: u32, link: u32) -> u64 {
        ((tag as u64) << 32) | link as u64
    }

    /// Pushes an occupied or vacant slot of `pool`. The slot must not be
    /// on any other stack.
    pub fn push<T>(&self, pool: &ObjectPool<T>, index: u32) {
        let slot = pool.slot(index);
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let (tag, top) = Self::unpack(head);
            slot.next.store(top, Ordering::Relaxed);
            let new = Self::pack(tag.wrapping_add(1), index + 1);
            match self
                .head
                .compare_exchange_weak(head, new, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    pub fn pop<T>(&self, pool: &ObjectPool<T>) -> Option<u32> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let (tag, top) = Self::unpack(head);
            if top == NIL {
                return None;
            }
            let index = top - 1;
            let next = pool.slot(index).next.load(Ordering::Relaxed);
            let new = Self::pack(tag.wrapping_add(1), next);
            match self
                .head
                .compare_exchange_weak(head, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(index),
                Err(current) => head = current,
            }
        }
    }
}

/// Fixed-capacity arena handing out `u32` slot indices.
pub struct ObjectPool<T> {
    chunks: Box<[OnceLock<Box<[Slot<T>]>>]>,
    bump: AtomicU32,
    free: IndexStack,
    live: AtomicUsize,
}

// SAFETY: slot values are only touched through `insert`, `get` and
// `remove`, whose contracts give each occupied slot a single owner that
// hands it between threads through release/acquire operations.
unsafe impl<T: Send> Send for ObjectPool<T> {}
unsafe impl<T: Send + Sync> Sync for ObjectPool<T> {}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectPool<T> {
    pub fn new() -> Self {
        Self {
            chunks: (0..MAX_CHUNKS).map(|_| OnceLock::new()).collect(),
            bump: AtomicU32::new(0),
            free: IndexStack::new(),
            live: AtomicUsize::new(0),
        }
    }

    fn slot(&self, index: u32) -> &Slot<T> {
        let index = index as usize;
        let chunk = self.chunks[index >> CHUNK_BITS]
            .get_or_init(|| (0..CHUNK_SIZE).map(|_| Slot::vacant()).collect());
        &chunk[index & (CHUNK_SIZE - 1)]
    }

    /// Stores `value` in a vacant slot and returns its index.
    ///
    /// Aborts the process when the pool is exhausted.
    pub fn insert(&self, value: T) -> u32 {
        let index = match self.free.pop(self) {
            Some(index) => index,
            None => {
                let index = self.bump.fetch_add(1, Ordering::Relaxed);
                if index as usize >= POOL_CAPACITY {
                    fatal(format_args!("object pool exhausted ({POOL_CAPACITY} slots)"));
                }
                index
            }
        };
        // SAFETY: the slot came off the free list or the bump counter, so
        // no other thread holds it.
        unsafe {
            *self.slot(index).value.get() = Some(value);
        }
        self.live.fetch_add(1, Ordering::Relaxed);
        index
    }

    /// Shared access to an occupied slot.
    ///
    /// # Safety
    /// `index` must come from `insert` and must not be removed while the
    /// returned reference is alive.
    pub unsafe fn get(&self, index: u32) -> &T {
        match &*self.slot(index).value.get() {
            Some(value) => value,
            None => fatal(format_args!("pool slot {index} read while vacant")),
        }
    }

    /// Takes the value out and returns the slot to the free list.
    ///
    /// # Safety
    /// The caller must be the slot's only user; no reference from `get`
    /// may outlive this call.
    pub unsafe fn remove(&self, index: u32) -> T {
        let value = match (*self.slot(index).value.get()).take() {
            Some(value) => value,
            None => fatal(format_args!("pool slot {index} removed twice")),
        };
        self.live.fetch_sub(1, Ordering::Relaxed);
        self.free.push(self, index);
        value
    }

    /// Occupied slots.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// A lock-free LIFO of owned values, backed by its own pool.
pub struct AtomicStack<T> {
    pool: ObjectPool<T>,
    stack: IndexStack,
}

impl<T> Default for AtomicStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AtomicStack<T> {
    pub fn new() -> Self {
        Self {
            pool: ObjectPool::new(),
            stack: IndexStack::new(),
        }
    }

    pub fn push(&self, value: T) {
        let index = self.pool.insert(value);
        self.stack.push(&self.pool, index);
    }

    pub fn pop(&self) -> Option<T> {
        let index = self.stack.pop(&self.pool)?;
        // SAFETY: a popped index is owned exclusively by this thread.
        Some(unsafe { self.pool.remove(index) })
    }

    /// Pops everything, top first.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.pop()).collect()
    }
}
