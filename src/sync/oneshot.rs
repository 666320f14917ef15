//! 一次性完成信号
//!
//! 同步调用者把工作项交给总线工作线程后，在 [`Waiter`] 上阻塞，
//! 直到工作线程通过对应的 [`Completer`] 交回结果。
//! 若 [`Completer`] 未完成就被丢弃（例如工作项被取消），等待方得到 `None`。

use crossbeam_channel::{Receiver, Sender, bounded};

/// 创建一对完成信号
pub fn oneshot<T>() -> (Completer<T>, Waiter<T>) {
    let (tx, rx) = bounded(1);
    (Completer { tx }, Waiter { rx })
}

/// 完成方，只能使用一次
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<T>,
}

impl<T> Completer<T> {
    /// 交回结果并唤醒等待方
    pub fn complete(self, value: T) {
        // 等待方已经放弃时结果直接丢弃
        let _ = self.tx.send(value);
    }
}

/// 等待方
#[derive(Debug)]
pub struct Waiter<T> {
    rx: Receiver<T>,
}

impl<T> Waiter<T> {
    /// 阻塞直到完成；完成方被丢弃时返回 `None`
    pub fn wait(self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// 非阻塞地检查是否已完成
    pub fn try_wait(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completes_across_threads() {
        let (done, waiter) = oneshot();
        let t = thread::spawn(move || done.complete(7u32));
        assert_eq!(waiter.wait(), Some(7));
        t.join().unwrap();
    }

    #[test]
    fn dropped_completer_yields_none() {
        let (done, waiter) = oneshot::<u32>();
        assert_eq!(waiter.try_wait(), None);
        drop(done);
        assert_eq!(waiter.wait(), None);
    }
}
