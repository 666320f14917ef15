//! 磁盘
//!
//! [`Disk`] 保存所有介质共有的字段（扇区大小、容量、几何参数、单元号），
//! 具体的读写和标识由 [`DiskBackend`] 提供。

/// 文件磁盘
pub mod file_disk;
/// 内存磁盘
pub mod ram_disk;
/// 远程磁盘
pub mod remote_disk;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use super::{DISK_HANDLERS, DeviceOps};
use crate::bus::Node;
use crate::config::{
    DEFAULT_HEADS, DEFAULT_SECTOR_SIZE, DEFAULT_SECTORS_PER_TRACK, FLOPPY_HEADS,
    FLOPPY_SECTORS_PER_TRACK, OPTICAL_SECTOR_SIZE, PRODUCT_NAME,
};
use crate::error::{BusError, Result};
use crate::request::{DeviceTextType, DispatchTable, QueryIdType};

/// 介质类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Media {
    /// 软盘
    Floppy,
    /// 硬盘
    HardDisk,
    /// 光盘
    Optical,
}

impl Media {
    /// 该介质的默认扇区大小
    pub fn default_sector_size(self) -> u32 {
        match self {
            Media::Optical => OPTICAL_SECTOR_SIZE,
            _ => DEFAULT_SECTOR_SIZE,
        }
    }

    /// 设备标识中的介质名
    pub fn id_suffix(self) -> &'static str {
        match self {
            Media::Floppy => "FloppyDisk",
            Media::HardDisk => "HardDisk",
            Media::Optical => "OpticalDisc",
        }
    }

    /// 兼容标识
    pub fn compatible_id(self) -> &'static str {
        match self {
            Media::Floppy => "GenSFloppy",
            Media::HardDisk => "GenDisk",
            Media::Optical => "GenCdRom",
        }
    }
}

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// 读
    Read,
    /// 写
    Write,
}

/// 一次传输覆盖的扇区范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    /// 起始扇区
    pub start: u64,
    /// 扇区数
    pub count: u32,
    /// 扇区大小
    pub sector_size: u32,
}

impl SectorRange {
    /// 起始字节偏移
    pub fn byte_offset(&self) -> Result<u64> {
        self.start
            .checked_mul(u64::from(self.sector_size))
            .ok_or(BusError::InvalidParameter("sector offset overflows"))
    }

    /// 传输字节数
    pub fn byte_len(&self) -> Result<usize> {
        usize::try_from(u64::from(self.count) * u64::from(self.sector_size))
            .map_err(|_| BusError::InvalidParameter("transfer too large"))
    }
}

/// CHS 几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    /// 柱面数
    pub cylinders: u64,
    /// 磁头数
    pub heads: u32,
    /// 每磁道扇区数
    pub sectors_per_track: u32,
    /// 每扇区字节数
    pub bytes_per_sector: u32,
}

/// 某种介质的后端
///
/// 后端拥有自己的介质数据，只负责按扇区读写和提供位置相关的标识。
pub trait DiskBackend: Send {
    /// 读写扇区，返回传输的字节数
    ///
    /// `buf` 的长度恰为 `range` 覆盖的字节数。
    fn io(&mut self, mode: IoMode, range: SectorRange, buf: &mut [u8]) -> Result<usize>;

    /// 后端名称，用于日志和设备类别
    fn kind(&self) -> &'static str;

    /// 设备标识前缀，如 `RAM`
    fn id_prefix(&self) -> &'static str;

    /// 实例标识，由后端位置决定
    fn instance_id(&self) -> String;

    /// 初始化后端
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// 释放后端资源
    fn free(&mut self) {}

    /// 标识查询
    fn pnp_query_id(&self, media: Media, query: QueryIdType) -> Result<Vec<String>> {
        let device_id = format!("{}\\{}{}", PRODUCT_NAME, self.id_prefix(), media.id_suffix());
        match query {
            QueryIdType::DeviceId => Ok(vec![device_id]),
            QueryIdType::InstanceId => Ok(vec![self.instance_id()]),
            QueryIdType::HardwareIds => {
                Ok(vec![device_id, String::from(media.compatible_id())])
            }
            QueryIdType::CompatibleIds => Ok(vec![String::from(media.compatible_id())]),
            _ => Err(BusError::InvalidParameter("unknown query id type")),
        }
    }

    /// 设备文本查询
    fn pnp_query_device_text(&self, query: DeviceTextType) -> Result<String> {
        match query {
            DeviceTextType::Description => Ok(format!("{} Disk", PRODUCT_NAME)),
            _ => Err(BusError::NotSupported),
        }
    }
}

/// 磁盘
pub struct Disk {
    media: Media,
    sector_size: u32,
    /// 容量（扇区数）
    lba_size: u64,
    geometry: Geometry,
    unit: u8,
    backend: Box<dyn DiskBackend>,
}

impl Disk {
    /// 用后端与介质参数创建磁盘
    pub fn new(
        backend: Box<dyn DiskBackend>,
        media: Media,
        sector_size: u32,
        lba_size: u64,
    ) -> Self {
        Self {
            media,
            sector_size,
            lba_size,
            geometry: Geometry::default(),
            unit: 0,
            backend,
        }
    }

    /// 介质类型
    pub fn media(&self) -> Media {
        self.media
    }

    /// 扇区大小
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// 容量（扇区数）
    pub fn lba_size(&self) -> u64 {
        self.lba_size
    }

    /// 几何参数，`init` 之后有效
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// 后端名称
    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// 当前单元号
    pub fn unit_num(&self) -> u8 {
        self.unit
    }

    pub(crate) fn set_unit(&mut self, unit: u8) {
        self.unit = unit;
    }

    /// 读写 `sector_count` 个扇区，返回传输的字节数
    ///
    /// `sector_count == 0` 时返回 `Cancelled` 且不访问 `buf`。
    pub fn io(
        &mut self,
        mode: IoMode,
        start_sector: u64,
        sector_count: u32,
        buf: &mut [u8],
    ) -> Result<usize> {
        if sector_count == 0 {
            return Err(BusError::Cancelled);
        }
        let end = start_sector
            .checked_add(u64::from(sector_count))
            .ok_or(BusError::InvalidParameter("sector range overflows"))?;
        if end > self.lba_size {
            return Err(BusError::InvalidParameter("sector range beyond disk"));
        }
        let range = SectorRange {
            start: start_sector,
            count: sector_count,
            sector_size: self.sector_size,
        };
        let len = range.byte_len()?;
        if buf.len() < len {
            return Err(BusError::InvalidParameter("buffer too small"));
        }
        self.backend.io(mode, range, &mut buf[..len])
    }

    /// 标识查询
    pub fn pnp_query_id(&self, query: QueryIdType) -> Result<Vec<String>> {
        self.backend.pnp_query_id(self.media, query)
    }

    /// 设备文本查询
    pub fn pnp_query_device_text(&self, query: DeviceTextType) -> Result<String> {
        self.backend.pnp_query_device_text(query)
    }

    fn init_geometry(&mut self) {
        let (heads, sectors_per_track) = match self.media {
            Media::Floppy => (FLOPPY_HEADS, FLOPPY_SECTORS_PER_TRACK),
            _ => (DEFAULT_HEADS, DEFAULT_SECTORS_PER_TRACK),
        };
        self.geometry = Geometry {
            cylinders: self.lba_size / u64::from(heads * sectors_per_track),
            heads,
            sectors_per_track,
            bytes_per_sector: self.sector_size,
        };
    }
}

impl DeviceOps for Disk {
    fn init(&mut self) -> Result<()> {
        self.backend.init()?;
        self.init_geometry();
        debug!(
            "disk: {} {:?}, {} sectors of {} bytes, {:?}",
            self.kind(),
            self.media,
            self.lba_size,
            self.sector_size,
            self.geometry
        );
        Ok(())
    }

    fn free(&mut self) {
        self.backend.free();
    }

    fn handlers(&self) -> &'static DispatchTable<Arc<Node>> {
        &DISK_HANDLERS
    }

    fn class_name(&self) -> &'static str {
        self.backend.kind()
    }

    fn as_disk(&self) -> Option<&Disk> {
        Some(self)
    }

    fn as_disk_mut(&mut self) -> Option<&mut Disk> {
        Some(self)
    }
}
