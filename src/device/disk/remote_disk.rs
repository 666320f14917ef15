//! 远程磁盘
//!
//! 扇区读写交给 [`SectorTransport`]，协议的编码与网络传输不在本 crate 内。

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use log::info;

use super::{Disk, DiskBackend, IoMode, Media, SectorRange};
use crate::device::Device;
use crate::error::{BusError, Result};

/// 远程块协议的传输端
pub trait SectorTransport: Send {
    /// 目标的可读名称，用于实例标识
    fn target(&self) -> String;

    /// 读 `count` 个扇区到 `buf`
    fn read_sectors(&mut self, start: u64, count: u32, buf: &mut [u8]) -> Result<()>;

    /// 把 `buf` 写到 `count` 个扇区
    fn write_sectors(&mut self, start: u64, count: u32, buf: &[u8]) -> Result<()>;

    /// 断开连接
    fn close(&mut self) {}
}

/// 远程磁盘
pub struct RemoteDisk {
    transport: Box<dyn SectorTransport>,
}

impl RemoteDisk {
    /// 在 `transport` 上创建远程磁盘设备，容量为 `lba_size` 个扇区
    pub fn create(
        transport: Box<dyn SectorTransport>,
        media: Media,
        sector_size: u32,
        lba_size: u64,
    ) -> Result<Device> {
        if sector_size == 0 || lba_size == 0 {
            return Err(BusError::InvalidParameter("empty remote disk"));
        }
        info!("remote disk: {} ({} sectors)", transport.target(), lba_size);
        let backend = Box::new(RemoteDisk { transport });
        Ok(Device::from_disk(Disk::new(backend, media, sector_size, lba_size)))
    }
}

impl DiskBackend for RemoteDisk {
    fn io(&mut self, mode: IoMode, range: SectorRange, buf: &mut [u8]) -> Result<usize> {
        if range.count == 0 {
            return Err(BusError::Cancelled);
        }
        match mode {
            IoMode::Read => self.transport.read_sectors(range.start, range.count, buf)?,
            IoMode::Write => self.transport.write_sectors(range.start, range.count, buf)?,
        }
        Ok(buf.len())
    }

    fn kind(&self) -> &'static str {
        "RemoteDisk"
    }

    fn id_prefix(&self) -> &'static str {
        "NET"
    }

    fn instance_id(&self) -> String {
        format!("NET_at_{}", self.transport.target())
    }

    fn free(&mut self) {
        self.transport.close();
    }
}
