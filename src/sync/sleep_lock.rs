//! Raw sleep lock backing [`SleepLock`](super::SleepLock)
//!
//! 用于可能被长时间持有的锁，例如跨越一次文件或网络传输的设备锁。
//! 拿不到锁的线程进入等待队列并挂起，解锁时唤醒队首线程。
//! 等待队列与 `locked` 标志由一把 [`RawSpinLock`] 保护。

use alloc::collections::VecDeque;
use std::thread::{self, Thread};

use super::raw_spin_lock::RawSpinLock;

struct WaitState {
    locked: bool,
    waiters: VecDeque<Thread>,
}

/// 睡眠锁的底层实现，由 `lock_api::Mutex` 包装后使用。
pub struct RawSleepLock {
    state: lock_api::Mutex<RawSpinLock, WaitState>,
}

impl RawSleepLock {
    /// 创建一个新的 RawSleepLock 实例。
    pub const fn new() -> Self {
        Self {
            state: lock_api::Mutex::const_new(
                RawSpinLock::new(),
                WaitState {
                    locked: false,
                    waiters: VecDeque::new(),
                },
            ),
        }
    }
}

impl Default for RawSleepLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSleepLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardSend;

    /// 获取锁，拿不到时挂起当前线程。
    fn lock(&self) {
        let mut queued = false;
        loop {
            let mut state = self.state.lock();
            if !state.locked {
                state.locked = true;
                if queued {
                    // woken spuriously or by someone else's unlock: drop our stale entry
                    let me = thread::current().id();
                    state.waiters.retain(|t| t.id() != me);
                }
                return;
            }
            let me = thread::current();
            if !state.waiters.iter().any(|t| t.id() == me.id()) {
                state.waiters.push_back(me);
            }
            queued = true;
            // 先释放保护锁再挂起；unpark 先于 park 到达时 park 立即返回
            drop(state);
            thread::park();
        }
    }

    /// 尝试获取锁，不等待。
    fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.locked {
            return false;
        }
        state.locked = true;
        true
    }

    /// 释放锁并唤醒一个等待者。
    unsafe fn unlock(&self) {
        let next = {
            let mut state = self.state.lock();
            state.locked = false;
            state.waiters.pop_front()
        };
        if let Some(next) = next {
            next.unpark();
        }
    }

    fn is_locked(&self) -> bool {
        self.state.lock().locked
    }
}
