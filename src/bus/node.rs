//! 总线上的设备节点

use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicBool, Ordering};

use log::trace;

use super::BusInner;
use crate::device::{Device, DeviceState};
use crate::error::{BusError, Result};
use crate::host::Handle;
use crate::request::Request;
use crate::sync::{SleepLock, SleepLockGuard};

/// 设备节点
///
/// 节点持有设备本身；对总线只保留弱引用。
/// `boot` 节点由探测器发现，不能通过 `detach` 卸载。
pub struct Node {
    /// 读写请求持有该锁直到传输结束
    device: SleepLock<Device>,
    unit: u32,
    linked: AtomicBool,
    boot: bool,
    bus: Weak<BusInner>,
}

impl Node {
    pub(crate) fn new(device: Device, unit: u32, boot: bool, bus: Weak<BusInner>) -> Self {
        Self {
            device: SleepLock::new(device),
            unit,
            linked: AtomicBool::new(false),
            boot,
            bus,
        }
    }

    /// 锁住设备
    pub fn device(&self) -> SleepLockGuard<'_, Device> {
        self.device.lock()
    }

    /// 单元号，节点存续期间不变
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// 是否仍在总线的节点列表中
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub(crate) fn set_linked(&self, linked: bool) {
        self.linked.store(linked, Ordering::Release);
    }

    /// 是否为启动设备
    pub fn is_boot(&self) -> bool {
        self.boot
    }

    /// 设备状态
    pub fn state(&self) -> DeviceState {
        self.device.lock().state()
    }

    /// 设备的宿主句柄
    pub fn handle(&self) -> Option<Handle> {
        self.device.lock().handle()
    }

    /// 分发一个子设备请求，返回前请求已完成
    ///
    /// 已删除的设备直接以 `NoSuchDevice` 完成请求，不进入分发表。
    pub fn dispatch(self: &Arc<Self>, req: Request) {
        let handlers = {
            let device = self.device.lock();
            match device.state() {
                DeviceState::Deleted => None,
                _ => device.handlers(),
            }
        };
        match handlers {
            Some(table) => {
                trace!("unit {}: {:?}/{:#04x}", self.unit(), req.major(), req.minor());
                table.dispatch(self, req);
            }
            None => req.complete(Err(BusError::NoSuchDevice)),
        }
    }

    /// 通过所属总线移除本节点
    pub fn remove(self: &Arc<Self>) -> Result<()> {
        let bus = self.bus.upgrade().ok_or(BusError::NoSuchDevice)?;
        let node = self.clone();
        bus.run_on_worker(move |ctx| ctx.remove_device(&node))?
    }
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("unit", &self.unit())
            .field("linked", &self.is_linked())
            .field("boot", &self.boot)
            .finish()
    }
}
