//! Slot table correlating an intercepted call with its later return.
//!
//! The driver manager hands back whatever the wrapper returned at call time,
//! so the handle is simply the slot index. One mutex guards the whole table;
//! calls are driven by application SQL traffic and the critical section is a
//! short scan, so there is nothing to gain from sharding.

use std::sync::{Mutex, MutexGuard};

use crate::call::CallRecord;

/// Slot count used by [`CallRegistry::new`].
pub const DEFAULT_CAPACITY: usize = 256;

/// Correlation token returned to the driver manager in place of `RETCODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle(i16);

impl CallHandle {
    /// Returned when a call could not be registered.
    pub const INVALID: CallHandle = CallHandle(-1);

    pub fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> i16 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    fn slot(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

/// Fixed-capacity table of in-flight calls.
#[derive(Debug)]
pub struct CallRegistry {
    slots: Mutex<Vec<Option<CallRecord>>>,
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Capacity is clamped so every slot index fits in a `CallHandle`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(i16::MAX as usize);
        Self {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    // A panic while holding the lock leaves the slots consistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<Option<CallRecord>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `record` in the first free slot.
    ///
    /// Returns [`CallHandle::INVALID`] and drops the record when the table is full.
    pub fn register(&self, record: CallRecord) -> CallHandle {
        let mut slots = self.lock();
        match slots.iter().position(Option::is_none) {
            Some(index) => {
                slots[index] = Some(record);
                CallHandle(index as i16)
            }
            None => {
                tracing::warn!(
                    function = %record.function,
                    capacity = slots.len(),
                    "Call registry full, call will not be traced"
                );
                CallHandle::INVALID
            }
        }
    }

    /// Take the record stored under `handle`, leaving the slot empty.
    ///
    /// Invalid, out-of-range and already-empty handles all yield `None`.
    pub fn retrieve(&self, handle: CallHandle) -> Option<CallRecord> {
        let index = handle.slot()?;
        let mut slots = self.lock();
        let record = slots.get_mut(index)?.take();
        if record.is_none() {
            tracing::trace!(handle = handle.as_raw(), "No call registered under handle");
        }
        record
    }

    /// Number of slots currently holding a call.
    pub fn occupied(&self) -> usize {
        self.lock().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }
}
