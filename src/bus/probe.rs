//! 启动设备探测
//!
//! 总线挂接到父设备栈后依次运行 [`BusConfig`](crate::config::BusConfig) 中登记的探测器，
//! 探测到的设备作为启动设备（`boot`）加入总线。

use alloc::vec::Vec;

use super::WorkerContext;
use crate::device::Device;

/// 启动设备探测器
pub trait Probe: Send + Sync {
    /// 探测器名称，用于日志
    fn name(&self) -> &'static str;

    /// 在工作线程上运行，返回探测到的设备
    fn probe(&self, ctx: &WorkerContext) -> Vec<Device>;
}

#[cfg(feature = "memdisk-probe")]
pub use memdisk::MemdiskProbe;

#[cfg(feature = "memdisk-probe")]
mod memdisk {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use log::{info, warn};

    use super::{Probe, WorkerContext};
    use crate::config::{MEMDISK_SCAN_END, MEMDISK_SCAN_START, MEMDISK_SCAN_STEP};
    use crate::device::{Device, Media, RamDisk};
    use crate::mem::PhysMemory;

    const SIGNATURE: &[u8; 4] = b"mBFT";
    /// 表的最小长度，要覆盖到 `SECTOR_SHIFT`
    const MIN_LEN: usize = 68;
    const LENGTH: usize = 4;
    const DISK_BUF: usize = 44;
    const DISK_SIZE: usize = 48;
    const SECTOR_SHIFT: usize = 67;

    /// 磁盘的位置与大小，从 mBFT 表中读出
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct MemdiskInfo {
        /// 磁盘起始物理地址
        pub base: u64,
        /// 磁盘大小（字节）
        pub size_bytes: u64,
        /// 扇区大小
        pub sector_size: u32,
    }

    /// 扫描物理内存中的 MEMDISK 表
    ///
    /// 在扫描窗口内按 16 字节对齐查找 `mBFT` 签名，表内所有字节之和为 0 才有效。
    pub struct MemdiskProbe {
        memory: Arc<PhysMemory>,
    }

    impl MemdiskProbe {
        /// 在 `memory` 上扫描
        pub fn new(memory: Arc<PhysMemory>) -> Self {
            Self { memory }
        }

        fn read_u32(table: &[u8], at: usize) -> u32 {
            u32::from_le_bytes([table[at], table[at + 1], table[at + 2], table[at + 3]])
        }

        /// 解析 `addr` 处的表
        fn parse(&self, addr: u64) -> Option<MemdiskInfo> {
            let mut header = [0u8; 8];
            self.memory.read(addr, &mut header).ok()?;
            if &header[..4] != SIGNATURE {
                return None;
            }
            let len = Self::read_u32(&header, LENGTH) as usize;
            if len < MIN_LEN {
                warn!("memdisk: table at {:#x} too short ({})", addr, len);
                return None;
            }
            if !self.memory.contains(addr, len as u64) {
                warn!("memdisk: table at {:#x} runs past memory ({})", addr, len);
                return None;
            }
            let mut table = alloc::vec![0u8; len];
            self.memory.read(addr, &mut table).ok()?;
            let sum = table.iter().fold(0u8, |s, b| s.wrapping_add(*b));
            if sum != 0 {
                warn!("memdisk: bad checksum at {:#x}", addr);
                return None;
            }

            let sector_size = match table[SECTOR_SHIFT] {
                0 => 512,
                shift if shift < 16 => 1u32 << shift,
                _ => return None,
            };
            Some(MemdiskInfo {
                base: u64::from(Self::read_u32(&table, DISK_BUF)),
                size_bytes: u64::from(Self::read_u32(&table, DISK_SIZE)) * u64::from(sector_size),
                sector_size,
            })
        }

        /// 扫描窗口，返回找到的所有表
        pub(crate) fn scan(&self) -> Vec<MemdiskInfo> {
            let region_end = match self.memory.end() {
                Ok(end) => end,
                Err(e) => {
                    warn!("memdisk: {}", e);
                    return Vec::new();
                }
            };
            let start = MEMDISK_SCAN_START.max(self.memory.base());
            let end = MEMDISK_SCAN_END.min(region_end);
            let mut found = Vec::new();
            let mut addr = start.next_multiple_of(MEMDISK_SCAN_STEP);
            while addr + MIN_LEN as u64 <= end {
                if let Some(info) = self.parse(addr) {
                    found.push(info);
                }
                addr += MEMDISK_SCAN_STEP;
            }
            found
        }
    }

    impl Probe for MemdiskProbe {
        fn name(&self) -> &'static str {
            "memdisk"
        }

        fn probe(&self, _ctx: &WorkerContext) -> Vec<Device> {
            self.scan()
                .into_iter()
                .filter_map(|info| {
                    let media = match info.sector_size {
                        2048 => Media::Optical,
                        _ => Media::HardDisk,
                    };
                    info!(
                        "memdisk: disk at {:#x}, {} bytes",
                        info.base, info.size_bytes
                    );
                    RamDisk::create(
                        self.memory.clone(),
                        info.base,
                        info.size_bytes,
                        media,
                        info.sector_size,
                    )
                    .map_err(|e| warn!("memdisk: unusable disk at {:#x}: {}", info.base, e))
                    .ok()
                })
                .collect()
        }
    }
}
