//! 内存磁盘

use super::{Disk, DiskBackend, IoMode, Media, SectorRange};
use crate::device::Device;
use crate::error::{BusError, Result};
use crate::mem::{PhysMemory, fast_copy};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

/// 内存磁盘
///
/// 数据位于物理内存 `[base, base + size)`，每次传输前临时映射目标范围
pub struct RamDisk {
    /// 所在的物理内存
    memory: Arc<PhysMemory>,

    /// 磁盘起始物理地址
    base: u64,
}

impl RamDisk {
    /// 在 `memory` 的 `[base, base + size_bytes)` 上创建内存磁盘设备
    pub fn create(
        memory: Arc<PhysMemory>,
        base: u64,
        size_bytes: u64,
        media: Media,
        sector_size: u32,
    ) -> Result<Device> {
        if sector_size == 0 {
            return Err(BusError::InvalidParameter("zero sector size"));
        }
        let lba_size = size_bytes / u64::from(sector_size);
        if lba_size == 0 {
            return Err(BusError::InvalidParameter("ram disk smaller than one sector"));
        }

        let region_end = memory.end()?;
        let disk_end = base
            .checked_add(size_bytes)
            .ok_or(BusError::InvalidParameter("ram disk range overflows"))?;
        if base < memory.base() || disk_end > region_end {
            return Err(BusError::InvalidParameter("ram disk outside physical memory"));
        }

        let backend = Box::new(RamDisk { memory, base });
        Ok(Device::from_disk(Disk::new(backend, media, sector_size, lba_size)))
    }

    /// 磁盘起始物理地址
    pub fn base(&self) -> u64 {
        self.base
    }
}

impl DiskBackend for RamDisk {
    fn io(&mut self, mode: IoMode, range: SectorRange, buf: &mut [u8]) -> Result<usize> {
        if range.count == 0 {
            return Err(BusError::Cancelled);
        }
        let addr = self
            .base
            .checked_add(range.byte_offset()?)
            .ok_or(BusError::InvalidParameter("sector offset overflows"))?;
        let len = range.byte_len()?;

        let mut map = self.memory.map_io_space(addr, len)?;
        match mode {
            IoMode::Read => fast_copy(buf, &map),
            IoMode::Write => fast_copy(&mut map, buf),
        }
        // map drops here -> unmapped
        Ok(len)
    }

    fn kind(&self) -> &'static str {
        "RamDisk"
    }

    fn id_prefix(&self) -> &'static str {
        "RAM"
    }

    fn instance_id(&self) -> String {
        format!("RAM_at_{:08X}", self.base)
    }
}
