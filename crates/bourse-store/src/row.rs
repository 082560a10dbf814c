//! Exclusively lockable rows.
//!
//! A [`Row`] pairs the stored value with an ownership flag. A transaction
//! owns the row from `acquire` until `release`; other transactions wait
//! on the condvar up to the lock-wait limit. The value itself sits behind
//! an `RwLock` so snapshot readers never wait for row ownership.

use std::sync::{
    Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub(crate) struct Row<T> {
    held: Mutex<bool>,
    released: Condvar,
    value: RwLock<T>,
}

impl<T: Clone> Row<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            held: Mutex::new(false),
            released: Condvar::new(),
            value: RwLock::new(value),
        }
    }

    /// A row already owned by its creator.
    pub(crate) fn new_held(value: T) -> Self {
        Self {
            held: Mutex::new(true),
            released: Condvar::new(),
            value: RwLock::new(value),
        }
    }

    /// Take ownership, waiting at most `wait`. `false` on timeout.
    pub(crate) fn acquire(&self, wait: Duration) -> bool {
        let held = lock(&self.held);
        let (mut held, _) = self
            .released
            .wait_timeout_while(held, wait, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if *held {
            return false;
        }
        *held = true;
        true
    }

    pub(crate) fn release(&self) {
        *lock(&self.held) = false;
        self.released.notify_one();
    }

    pub(crate) fn get(&self) -> T {
        read(&self.value).clone()
    }

    pub(crate) fn set(&self, value: T) {
        *write(&self.value) = value;
    }
}
