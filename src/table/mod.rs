use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::error::{DataError, DataResult};
use crate::stack::CallStack;

#[cfg(test)]
mod test;

/// Default slot count of the counter table.
pub const DEFAULT_CAPACITY: usize = 65_536;

const EMPTY: u8 = 0;
const RESERVED: u8 = 1;
const OCCUPIED: u8 = 2;
const TOMBSTONE: u8 = 3;

struct Slot {
    state: AtomicU8,
    count: AtomicU64,
    key: UnsafeCell<CallStack>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: AtomicU8::new(EMPTY),
            count: AtomicU64::new(0),
            key: UnsafeCell::new(CallStack::new()),
        }
    }
}

enum Claim<'a> {
    /// The slot was free and now holds `key` with a zero count.
    Claimed(&'a AtomicU64),
    /// The slot already held an equal key.
    Matched(&'a AtomicU64),
    /// The slot was taken by a different key mid-claim.
    Lost,
}

/// A pre-allocated, open-addressed map from [`CallStack`] to a sample
/// count.
///
/// The table is owned by one worker thread and may additionally be
/// written by that thread's own signal handler. Slot states carry the
/// synchronization: a slot is claimed (`RESERVED`) by compare-exchange
/// *before* its key is written and published `OCCUPIED` with release
/// ordering afterwards, so a handler interrupting a half-finished insert
/// only ever observes committed keys. Probes treat `RESERVED` as a
/// non-match. No operation allocates, blocks, or performs I/O.
///
/// When the table is full the sample is dropped and counted in
/// [`dropped`](Self::dropped).
pub struct CounterTable {
    slots: Box<[Slot]>,
    len: AtomicUsize,
    dropped: AtomicU64,
}

// One owning thread plus its signal handler; never shared across threads.
unsafe impl Send for CounterTable {}

impl CounterTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots: Vec<Slot> = (0..capacity).map(|_| Slot::new()).collect();
        CounterTable {
            slots: slots.into_boxed_slice(),
            len: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples dropped because the table was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Looks up `key` and returns its current count.
    pub fn find(&self, key: &CallStack) -> Option<u64> {
        let cap = self.slots.len();
        let mut idx = key.hash() as usize % cap;
        for _ in 0..cap {
            let slot = &self.slots[idx];
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return None,
                OCCUPIED if unsafe { &*slot.key.get() } == key => {
                    return Some(slot.count.load(Ordering::Relaxed));
                }
                _ => {}
            }
            idx = (idx + 1) % cap;
        }
        None
    }

    /// Finds the slot for `key`, claiming a free one if necessary, and
    /// returns its count cell. Returns `None` and bumps the drop counter
    /// when the table is full.
    pub fn insert_or_get(&self, key: &CallStack) -> Option<&AtomicU64> {
        let cap = self.slots.len();
        let mut idx = key.hash() as usize % cap;
        let mut fallback: Option<usize> = None;
        let mut scanned = 0;
        while scanned < cap {
            let slot = &self.slots[idx];
            match slot.state.load(Ordering::Acquire) {
                OCCUPIED => {
                    if unsafe { &*slot.key.get() } == key {
                        return Some(&slot.count);
                    }
                }
                TOMBSTONE => {
                    if fallback.is_none() {
                        fallback = Some(idx);
                    }
                }
                EMPTY => {
                    let target = fallback.take().unwrap_or(idx);
                    match self.try_claim(target, key) {
                        Claim::Claimed(count) => {
                            self.len.fetch_add(1, Ordering::AcqRel);
                            return Some(count);
                        }
                        Claim::Matched(count) => return Some(count),
                        // A signal handler landed on the same slot with a
                        // different key; re-examine the current index.
                        Claim::Lost => continue,
                    }
                }
                // RESERVED belongs to an insert this handler interrupted;
                // it can never commit while we run, so probe past it.
                _ => {}
            }
            idx = (idx + 1) % cap;
            scanned += 1;
        }
        if let Some(target) = fallback {
            match self.try_claim(target, key) {
                Claim::Claimed(count) => {
                    self.len.fetch_add(1, Ordering::AcqRel);
                    return Some(count);
                }
                Claim::Matched(count) => return Some(count),
                Claim::Lost => {}
            }
        }
        self.dropped.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Adds one observation of `key`. Returns `false` if the sample was
    /// dropped because the table is full.
    pub fn increment(&self, key: &CallStack) -> bool {
        self.add(key, 1)
    }

    /// Adds `delta` observations of `key`.
    pub fn add(&self, key: &CallStack, delta: u64) -> bool {
        match self.insert_or_get(key) {
            Some(count) => {
                count.fetch_add(delta, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Removes `key`, leaving a tombstone. Not used on the sampling path.
    pub fn erase(&self, key: &CallStack) -> bool {
        let cap = self.slots.len();
        let mut idx = key.hash() as usize % cap;
        for _ in 0..cap {
            let slot = &self.slots[idx];
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return false,
                OCCUPIED if unsafe { &*slot.key.get() } == key => {
                    slot.state.store(TOMBSTONE, Ordering::Release);
                    self.len.fetch_sub(1, Ordering::AcqRel);
                    return true;
                }
                _ => {}
            }
            idx = (idx + 1) % cap;
        }
        false
    }

    /// Visits every occupied entry.
    pub fn for_each(&self, mut f: impl FnMut(&CallStack, u64)) {
        for slot in self.slots.iter() {
            if slot.state.load(Ordering::Acquire) == OCCUPIED {
                let key = unsafe { &*slot.key.get() };
                f(key, slot.count.load(Ordering::Relaxed));
            }
        }
    }

    /// Sum of all counts, i.e. the number of successful increments.
    pub fn total(&self) -> u64 {
        let mut sum = 0;
        self.for_each(|_, count| sum += count);
        sum
    }

    /// Resets every slot to empty and clears the counters.
    pub fn clear(&mut self) {
        for slot in self.slots.iter() {
            slot.state.store(EMPTY, Ordering::Release);
            slot.count.store(0, Ordering::Relaxed);
        }
        self.len.store(0, Ordering::Release);
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Folds every entry of `other` into this table. Used when worker
    /// threads keep private tables that are combined at finalize.
    pub fn merge_from(&self, other: &CounterTable) -> DataResult<u64> {
        let mut merged = 0;
        let mut full = false;
        other.for_each(|key, count| {
            if self.add(key, count) {
                merged += 1;
            } else {
                full = true;
            }
        });
        if full {
            return Err(DataError::OutOfCapacity);
        }
        Ok(merged)
    }

    fn try_claim<'a>(&'a self, idx: usize, key: &CallStack) -> Claim<'a> {
        let slot = &self.slots[idx];
        let seen = slot.state.load(Ordering::Acquire);
        if seen == OCCUPIED {
            return if unsafe { &*slot.key.get() } == key {
                Claim::Matched(&slot.count)
            } else {
                Claim::Lost
            };
        }
        if seen == RESERVED {
            return Claim::Lost;
        }
        if slot
            .state
            .compare_exchange(seen, RESERVED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // The handler finished a whole insert in between; if it was
            // for the same key, share the slot.
            if slot.state.load(Ordering::Acquire) == OCCUPIED
                && unsafe { &*slot.key.get() } == key
            {
                return Claim::Matched(&slot.count);
            }
            return Claim::Lost;
        }
        unsafe { (*slot.key.get()).set(key.frames()) };
        slot.count.store(0, Ordering::Relaxed);
        slot.state.store(OCCUPIED, Ordering::Release);
        Claim::Claimed(&slot.count)
    }
}
