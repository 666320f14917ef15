//! 总线配置与常量（平台无关）
#![allow(unused)]

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::time::Duration;

use crate::bus::Probe;

// naming
/// 产品名称，用于设备标识与描述文本
pub const PRODUCT_NAME: &str = "VBlock";
/// 默认的总线服务句柄名称
pub const DEFAULT_BUS_NAME: &str = "\\Device\\VBlock";
/// 默认的总线符号名称
pub const DEFAULT_BUS_DOS_NAME: &str = "\\DosDevices\\VBlock";

/// 持久化配置中记录“根枚举句柄已创建”的键
pub const PDO_DONE_KEY: &str = "PdoDone";

/// 工作线程的心跳间隔，仅用于保活，不是请求超时
pub const WORKER_HEARTBEAT: Duration = Duration::from_secs(30);

// about disks
/// 硬盘与软盘的默认扇区大小
pub const DEFAULT_SECTOR_SIZE: u32 = 512;
/// 光盘扇区大小
pub const OPTICAL_SECTOR_SIZE: u32 = 2048;
/// 默认磁头数
pub const DEFAULT_HEADS: u32 = 255;
/// 默认每磁道扇区数
pub const DEFAULT_SECTORS_PER_TRACK: u32 = 63;
/// 软盘磁头数
pub const FLOPPY_HEADS: u32 = 2;
/// 软盘每磁道扇区数
pub const FLOPPY_SECTORS_PER_TRACK: u32 = 18;

// MEMDISK probe: scan window in physical memory (conventional memory + EBDA)
/// 扫描窗口起始地址
pub const MEMDISK_SCAN_START: u64 = 0x8_0000;
/// 扫描窗口结束地址（不含）
pub const MEMDISK_SCAN_END: u64 = 0xA_0000;
/// 扫描步长，表按 16 字节对齐
pub const MEMDISK_SCAN_STEP: u64 = 16;

/// 单条总线的配置
#[derive(Clone)]
pub struct BusConfig {
    /// 总线服务句柄的名称
    pub name: String,
    /// 总线的符号名称
    pub dos_name: String,
    /// 工作线程心跳间隔
    pub heartbeat: Duration,
    /// 挂接到父设备栈后运行的探测器，探测到的设备作为启动设备加入总线
    pub probes: Vec<Arc<dyn Probe>>,
}

impl BusConfig {
    /// 使用指定名称创建配置，符号名称由名称推导
    pub fn named(name: &str) -> Self {
        Self {
            name: alloc::format!("\\Device\\{name}"),
            dos_name: alloc::format!("\\DosDevices\\{name}"),
            ..Self::default()
        }
    }

    /// 追加一个探测器
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// 修改心跳间隔
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: String::from(DEFAULT_BUS_NAME),
            dos_name: String::from(DEFAULT_BUS_DOS_NAME),
            heartbeat: WORKER_HEARTBEAT,
            probes: Vec::new(),
        }
    }
}

impl core::fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusConfig")
            .field("name", &self.name)
            .field("dos_name", &self.dos_name)
            .field("heartbeat", &self.heartbeat)
            .field("probes", &self.probes.len())
            .finish()
    }
}
