//! 同步原语
//!
//! 向总线与设备模块提供自旋锁、睡眠锁和一次性完成信号
mod oneshot;
mod raw_spin_lock;
mod sleep_lock;

pub use oneshot::{Completer, Waiter, oneshot};
pub use raw_spin_lock::RawSpinLock;
pub use sleep_lock::RawSleepLock;

/// 自旋锁，基于 [`RawSpinLock`] 的 `lock_api::Mutex`
pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;

/// [`SpinLock`] 的 RAII 保护器
pub type SpinLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;

/// 睡眠锁，基于 [`RawSleepLock`] 的 `lock_api::Mutex`，用于跨越阻塞 I/O 的锁
pub type SleepLock<T> = lock_api::Mutex<RawSleepLock, T>;

/// [`SleepLock`] 的 RAII 保护器
pub type SleepLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSleepLock, T>;
