//! # vblk
//!
//! 虚拟块设备总线。
//!
//! 内存、文件与远程协议承载的存储区域以可枚举块设备的形式挂在同一条总线下。
//! 总线控制器拥有设备节点列表，所有生命周期变更都经由专用工作线程串行执行；
//! 通用 I/O 与控制请求经分发表路由到总线处理函数或各磁盘后端的能力表。
//!
//! ## 模块
//!
//! - [`bus`]：总线控制器、工作线程、探测器
//! - [`device`]：设备、磁盘与三种后端
//! - [`request`]：请求、应答与分发表
//! - [`host`]：宿主枚举服务与持久化配置的接口及进程内实现
//! - [`mem`]：内存磁盘所在的物理内存
//! - [`sync`]：自旋锁与一次性完成信号
//!
//! ## 示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use vblk::{Bus, BusConfig, LoopbackHost, MemoryConfigStore};
//!
//! let host = Arc::new(LoopbackHost::new());
//! let store = Arc::new(MemoryConfigStore::new());
//! let bus = Bus::new(BusConfig::default(), host, store);
//! bus.establish().unwrap();
//! ```

extern crate alloc;

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod mem;
pub mod request;
pub mod sync;

pub use bus::{Bus, BusState, Node, Probe, WorkerContext};
pub use config::BusConfig;
pub use device::{Device, DeviceFlags, DeviceState, Disk, DiskBackend, IoMode, Media};
pub use error::{BusError, Result};
pub use host::{ConfigStore, Handle, Host, LoopbackHost, MemoryConfigStore};
pub use mem::PhysMemory;
pub use request::{Major, Reply, Request, Ticket};
