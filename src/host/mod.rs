//! 宿主接口
//!
//! 总线依赖的两个外部协作者：
//! - [`Host`]：宿主的枚举/挂接服务，负责句柄、符号名称与设备栈
//! - [`ConfigStore`]：持久化配置，只存取布尔标志
//!
//! 另外提供进程内实现 [`LoopbackHost`] 与 [`MemoryConfigStore`]，
//! 使总线可以脱离真实宿主运行和测试。

mod loopback;
mod store;

pub use loopback::{HostOp, LoopbackHost};
pub use store::MemoryConfigStore;

use core::fmt;

use crate::error::Result;
use crate::request::Major;

/// 宿主分配的不透明句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// 由原始值构造
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// 原始值
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

/// 句柄种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// 总线服务句柄
    Servicing,
    /// 根枚举句柄（总线的父设备）
    Enumeration,
    /// 子设备句柄
    Device,
}

/// 宿主的枚举/挂接服务
pub trait Host: Send + Sync {
    /// 创建总线服务句柄
    fn create_servicing_handle(&self, name: &str) -> Result<Handle>;

    /// 删除任意句柄
    fn delete_handle(&self, handle: Handle);

    /// 创建指向 `target` 的符号名称
    fn create_symbolic_link(&self, link: &str, target: &str) -> Result<()>;

    /// 删除符号名称
    fn delete_symbolic_link(&self, link: &str);

    /// 创建根枚举句柄
    fn create_enumeration_handle(&self) -> Result<Handle>;

    /// 为子设备创建句柄，`kind` 为设备的类别名
    fn create_device_handle(&self, kind: &str) -> Result<Handle>;

    /// 把 `this` 挂到 `parent` 的设备栈上，返回下层句柄
    fn attach_to_device_stack(&self, this: Handle, parent: Handle) -> Result<Handle>;

    /// 从设备栈上摘下
    fn detach_from_device_stack(&self, lower: Handle);

    /// 把请求转交给下层
    fn pass_to_lower(&self, lower: Handle, major: Major, minor: u8) -> Result<()>;
}

/// 持久化配置
pub trait ConfigStore: Send + Sync {
    /// 读取布尔标志，键不存在时为 `false`
    fn get_flag(&self, key: &str) -> Result<bool>;

    /// 写入布尔标志
    fn set_flag(&self, key: &str, value: bool) -> Result<()>;
}
