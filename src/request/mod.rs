//! 请求与应答
//!
//! 外部请求以 `(major, minor)` 两级代码分类，附带参数与数据缓冲区。
//! 请求只能完成一次：[`Request::complete()`] 消耗请求并把 [`Reply`] 交给持有
//! [`Ticket`] 的发起方。请求未完成就被丢弃（例如排队的工作项被取消）时，
//! 发起方得到 `NoSuchDevice`。

mod dispatch;

#[cfg(test)]
mod tests;

pub use dispatch::{DispatchTable, Disposition, Handler, Rule};

use alloc::string::String;
use alloc::vec::Vec;
use std::path::PathBuf;

use crate::device::{Geometry, Media};
use crate::error::{BusError, Result};
use crate::host::Handle;
use crate::sync::{Completer, Waiter, oneshot};

/// 主功能码
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Major {
    /// 打开
    Create = 0x00,
    /// 关闭
    Close = 0x02,
    /// 读扇区
    Read = 0x03,
    /// 写扇区
    Write = 0x04,
    /// 设备控制
    DeviceControl = 0x0e,
    /// SCSI 直通
    Scsi = 0x0f,
    /// 电源管理
    Power = 0x16,
    /// 系统管理
    SystemControl = 0x17,
    /// 即插即用
    Pnp = 0x1b,
}

/// PnP 次功能码
pub mod pnp {
    /// 启动设备
    pub const START_DEVICE: u8 = 0x00;
    /// 移除设备
    pub const REMOVE_DEVICE: u8 = 0x02;
    /// 查询设备关系
    pub const QUERY_DEVICE_RELATIONS: u8 = 0x07;
    /// 查询设备文本
    pub const QUERY_DEVICE_TEXT: u8 = 0x0c;
    /// 查询标识
    pub const QUERY_ID: u8 = 0x13;
}

/// 标识查询类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIdType {
    /// 设备标识
    DeviceId,
    /// 实例标识，区分同类设备
    InstanceId,
    /// 硬件标识列表
    HardwareIds,
    /// 兼容标识列表
    CompatibleIds,
    /// 序列号
    DeviceSerialNumber,
    /// 容器标识
    ContainerId,
}

/// 设备文本查询类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTextType {
    /// 设备描述
    Description,
    /// 位置信息
    LocationInformation,
}

/// 设备关系查询类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    /// 总线上的子设备
    Bus,
    /// 弹出关系
    Ejection,
    /// 移除关系
    Removal,
    /// 目标设备
    TargetDevice,
}

/// `ATTACH_FILE` 控制码的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttach {
    /// 文件路径
    pub path: PathBuf,
    /// 磁盘大小，0 表示使用文件长度
    pub size_bytes: u64,
    /// 介质类型
    pub media: Media,
}

/// 设备控制码
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCode {
    /// 挂接文件磁盘，完成时返回单元号
    AttachFile(FileAttach),
    /// 按单元号卸载磁盘
    Detach(u32),
    /// 查询磁盘几何参数
    GetGeometry,
    /// 查询单元号
    GetUnitNumber,
    /// 未知控制码
    Other(u32),
}

/// 请求参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    /// 无参数
    None,
    /// 扇区读写
    Io {
        /// 起始扇区
        start_sector: u64,
        /// 扇区数
        sector_count: u32,
    },
    /// 设备控制码
    Control(ControlCode),
    /// 标识查询
    QueryId(QueryIdType),
    /// 设备文本查询
    QueryDeviceText(DeviceTextType),
    /// 设备关系查询
    QueryRelations(RelationType),
}

/// 请求成功时附带的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Information {
    /// 无附加信息
    None,
    /// 传输的字节数
    Bytes(usize),
    /// 文本
    Text(String),
    /// 标识列表
    Ids(Vec<String>),
    /// 单元号
    Unit(u32),
    /// 磁盘几何参数
    Geometry(Geometry),
    /// 设备句柄列表
    Handles(Vec<Handle>),
}

/// 请求的应答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// 处理结果
    pub result: Result<Information>,
    /// 请求携带的缓冲区，读请求的数据在这里
    pub buffer: Vec<u8>,
}

impl Reply {
    /// 传输的字节数，失败的请求总是 0
    pub fn bytes(&self) -> usize {
        match self.result {
            Ok(Information::Bytes(n)) => n,
            _ => 0,
        }
    }

    /// 请求是否成功
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// 发起方持有的凭据，用于等待应答
#[derive(Debug)]
pub struct Ticket(Waiter<Reply>);

impl Ticket {
    /// 阻塞直到请求完成
    pub fn wait(self) -> Reply {
        self.0.wait().unwrap_or(Reply {
            result: Err(BusError::NoSuchDevice),
            buffer: Vec::new(),
        })
    }

    /// 请求已完成时取回应答
    pub fn try_wait(&self) -> Option<Reply> {
        self.0.try_wait()
    }
}

/// 一个待分发的请求
#[derive(Debug)]
pub struct Request {
    major: Major,
    minor: u8,
    params: Params,
    buffer: Vec<u8>,
    pending: bool,
    done: Completer<Reply>,
}

impl Request {
    /// 创建请求与配套的凭据
    pub fn new(major: Major, minor: u8, params: Params, buffer: Vec<u8>) -> (Self, Ticket) {
        let (done, waiter) = oneshot();
        let req = Self {
            major,
            minor,
            params,
            buffer,
            pending: false,
            done,
        };
        (req, Ticket(waiter))
    }

    /// 读请求，`buffer` 至少容纳 `sector_count` 个扇区
    pub fn read(start_sector: u64, sector_count: u32, buffer: Vec<u8>) -> (Self, Ticket) {
        let params = Params::Io {
            start_sector,
            sector_count,
        };
        Self::new(Major::Read, 0, params, buffer)
    }

    /// 写请求，`data` 至少包含 `sector_count` 个扇区
    pub fn write(start_sector: u64, sector_count: u32, data: Vec<u8>) -> (Self, Ticket) {
        let params = Params::Io {
            start_sector,
            sector_count,
        };
        Self::new(Major::Write, 0, params, data)
    }

    /// 打开请求
    pub fn create() -> (Self, Ticket) {
        Self::new(Major::Create, 0, Params::None, Vec::new())
    }

    /// 关闭请求
    pub fn close() -> (Self, Ticket) {
        Self::new(Major::Close, 0, Params::None, Vec::new())
    }

    /// 设备控制请求
    pub fn control(code: ControlCode) -> (Self, Ticket) {
        Self::new(Major::DeviceControl, 0, Params::Control(code), Vec::new())
    }

    /// 标识查询请求
    pub fn query_id(query: QueryIdType) -> (Self, Ticket) {
        Self::new(Major::Pnp, pnp::QUERY_ID, Params::QueryId(query), Vec::new())
    }

    /// 设备文本查询请求
    pub fn query_device_text(query: DeviceTextType) -> (Self, Ticket) {
        let params = Params::QueryDeviceText(query);
        Self::new(Major::Pnp, pnp::QUERY_DEVICE_TEXT, params, Vec::new())
    }

    /// 设备关系查询请求
    pub fn query_relations(query: RelationType) -> (Self, Ticket) {
        let params = Params::QueryRelations(query);
        Self::new(Major::Pnp, pnp::QUERY_DEVICE_RELATIONS, params, Vec::new())
    }

    /// 其它 PnP 请求（启动、移除等）
    pub fn pnp(minor: u8) -> (Self, Ticket) {
        Self::new(Major::Pnp, minor, Params::None, Vec::new())
    }

    /// 电源请求
    pub fn power(minor: u8) -> (Self, Ticket) {
        Self::new(Major::Power, minor, Params::None, Vec::new())
    }

    /// 系统管理请求
    pub fn system_control(minor: u8) -> (Self, Ticket) {
        Self::new(Major::SystemControl, minor, Params::None, Vec::new())
    }

    /// 主功能码
    pub fn major(&self) -> Major {
        self.major
    }

    /// 次功能码
    pub fn minor(&self) -> u8 {
        self.minor
    }

    /// 请求参数
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// 数据缓冲区
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// 可写的数据缓冲区
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// 标记为挂起，稍后由工作线程完成
    pub fn mark_pending(&mut self) {
        self.pending = true;
    }

    /// 是否已被标记为挂起
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// 完成请求
    pub fn complete(self, result: Result<Information>) {
        self.done.complete(Reply {
            result,
            buffer: self.buffer,
        });
    }
}
