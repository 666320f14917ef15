//! 设备抽象层
//!
//! [`Device`] 是总线上一个子设备的状态与操作表；目前唯一的设备类别是磁盘
//! （[`Disk`]），磁盘再持有具体介质的后端（内存、文件、远程）。

pub mod disk;
mod handlers;

#[cfg(test)]
mod tests;

pub use disk::file_disk::FileDisk;
pub use disk::ram_disk::RamDisk;
pub use disk::remote_disk::{RemoteDisk, SectorTransport};
pub use disk::{Disk, DiskBackend, Geometry, IoMode, Media, SectorRange};
pub(crate) use handlers::DISK_HANDLERS;

use alloc::boxed::Box;
use alloc::sync::Arc;

use bitflags::bitflags;

use crate::bus::Node;
use crate::error::Result;
use crate::host::Handle;
use crate::request::DispatchTable;

bitflags! {
    /// 设备标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        /// 直接 I/O，缓冲区不经过中转
        const DIRECT_IO = 1 << 0;
        /// 上电时有浪涌电流，需要串行上电
        const POWER_INRUSH = 1 << 1;
        /// 设备尚未加入总线
        const INITIALIZING = 1 << 2;
    }
}

/// 设备状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// 已加入总线，尚未启动
    Added,
    /// 已启动
    Started,
    /// 正在停止
    StopPending,
    /// 正在移除
    RemovePending,
    /// 已从总线移除，之后的请求一律失败
    Deleted,
}

/// 设备操作表
///
/// `init` 在设备加入总线时调用一次，`free` 在移除时调用一次。
pub trait DeviceOps: Send {
    /// 加入总线前的初始化
    fn init(&mut self) -> Result<()>;

    /// 释放设备资源
    fn free(&mut self);

    /// 子设备请求使用的分发表
    fn handlers(&self) -> &'static DispatchTable<Arc<Node>>;

    /// 设备类别名，用于向宿主申请句柄
    fn class_name(&self) -> &'static str;

    /// 转换为磁盘
    fn as_disk(&self) -> Option<&Disk> {
        None
    }

    /// 转换为可变的磁盘
    fn as_disk_mut(&mut self) -> Option<&mut Disk> {
        None
    }
}

/// 总线上的一个子设备
pub struct Device {
    state: DeviceState,
    flags: DeviceFlags,
    handle: Option<Handle>,
    /// 释放后为 `None`
    ops: Option<Box<dyn DeviceOps>>,
}

impl Device {
    /// 用操作表创建设备
    pub fn new(ops: Box<dyn DeviceOps>) -> Self {
        Self {
            state: DeviceState::Added,
            flags: DeviceFlags::DIRECT_IO | DeviceFlags::POWER_INRUSH | DeviceFlags::INITIALIZING,
            handle: None,
            ops: Some(ops),
        }
    }

    /// 以磁盘构造设备
    pub fn from_disk(disk: Disk) -> Self {
        Self::new(Box::new(disk))
    }

    /// 设备状态
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// 修改设备状态
    pub fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    /// 设备标志
    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }

    pub(crate) fn clear_initializing(&mut self) {
        self.flags.remove(DeviceFlags::INITIALIZING);
    }

    /// 宿主句柄，加入总线后才有
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// 取走宿主句柄，用于删除
    pub(crate) fn take_handle(&mut self) -> Option<Handle> {
        self.handle.take()
    }

    pub(crate) fn set_handle(&mut self, handle: Handle) {
        self.handle = Some(handle);
    }

    /// 设备类别名，释放后为 `Device`
    pub fn class_name(&self) -> &'static str {
        self.ops.as_ref().map_or("Device", |ops| ops.class_name())
    }

    /// 子设备请求的分发表，释放后为 `None`
    pub fn handlers(&self) -> Option<&'static DispatchTable<Arc<Node>>> {
        self.ops.as_ref().map(|ops| ops.handlers())
    }

    /// 磁盘视图
    pub fn disk(&self) -> Option<&Disk> {
        self.ops.as_ref().and_then(|ops| ops.as_disk())
    }

    /// 可变的磁盘视图
    pub fn disk_mut(&mut self) -> Option<&mut Disk> {
        self.ops.as_mut().and_then(|ops| ops.as_disk_mut())
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        match self.ops.as_mut() {
            Some(ops) => ops.init(),
            None => Err(crate::error::BusError::NoSuchDevice),
        }
    }

    /// 释放设备资源并标记为已删除，可重复调用
    pub(crate) fn free(&mut self) {
        self.state = DeviceState::Deleted;
        if let Some(mut ops) = self.ops.take() {
            ops.free();
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // a device dropped without passing through the bus still releases its backend
        self.free();
    }
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("class", &self.class_name())
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("handle", &self.handle)
            .finish()
    }
}
