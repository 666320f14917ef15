//! Raw spin lock backing [`SpinLock`](super::SpinLock)
//!
//! This module provides a spin lock implementation that integrates with `lock_api::RawMutex`.
//!
//! # Key Differences from a plain busy loop
//!
//! - Implements `lock_api::RawMutex`, so guards come from `lock_api::Mutex`
//! - Spins a bounded number of times, then yields the thread to the scheduler
//! - Checks the flag with a relaxed load before retrying the CAS
//!
//! The bus holds these locks only around short list and state updates. Locks that
//! span backend I/O use [`SleepLock`](super::SleepLock) instead.

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// 自旋次数上限，超过后让出 CPU
const SPIN_LIMIT: u32 = 64;

/// 自旋锁的底层实现，本身不返回 Guard，由 `lock_api::Mutex` 包装后使用。
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// 创建一个新的 RawSpinLock 实例。
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardSend;

    /// 获取锁，必要时让出 CPU。
    fn lock(&self) {
        let mut spins = 0u32;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // wait on a plain load so the cache line stays shared
            while self.locked.load(Ordering::Relaxed) {
                if spins < SPIN_LIMIT {
                    spins += 1;
                    hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }

    /// 尝试获取锁，不等待。
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// 释放锁。
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
