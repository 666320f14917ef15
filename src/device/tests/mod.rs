use crate::device::{Device, Media, RamDisk, SectorTransport};
use crate::error::{BusError, Result};
use crate::mem::PhysMemory;
use crate::sync::SpinLock;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

// 测试辅助函数 (fixtures)

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 物理内存基址，避开 0 以便检查地址换算
pub const MEM_BASE: u64 = 0x10_0000;

/// 创建指定大小的物理内存
pub fn create_test_memory(size: usize) -> Arc<PhysMemory> {
    Arc::new(PhysMemory::new(MEM_BASE, size))
}

/// 在内存起始处创建一个已初始化的内存磁盘
pub fn create_test_ram_device(memory: &Arc<PhysMemory>, size: u64, media: Media) -> Device {
    let mut device = RamDisk::create(
        memory.clone(),
        MEM_BASE,
        size,
        media,
        media.default_sector_size(),
    )
    .unwrap();
    device.init().unwrap();
    device
}

/// 以内存数组模拟的远程目标
pub struct LoopTransport {
    pub target: String,
    pub sector_size: usize,
    pub data: Arc<SpinLock<Vec<u8>>>,
    pub closed: Arc<AtomicBool>,
}

impl LoopTransport {
    pub fn new(target: &str, sectors: usize, sector_size: usize) -> Self {
        Self {
            target: String::from(target),
            sector_size,
            data: Arc::new(SpinLock::new(alloc::vec![0u8; sectors * sector_size])),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn span(&self, start: u64, count: u32) -> Result<core::ops::Range<usize>> {
        let from = start as usize * self.sector_size;
        let to = from + count as usize * self.sector_size;
        if to > self.data.lock().len() {
            return Err(BusError::Io(String::from("remote range")));
        }
        Ok(from..to)
    }
}

impl SectorTransport for LoopTransport {
    fn target(&self) -> String {
        self.target.clone()
    }

    fn read_sectors(&mut self, start: u64, count: u32, buf: &mut [u8]) -> Result<()> {
        let span = self.span(start, count)?;
        buf.copy_from_slice(&self.data.lock()[span]);
        Ok(())
    }

    fn write_sectors(&mut self, start: u64, count: u32, buf: &[u8]) -> Result<()> {
        let span = self.span(start, count)?;
        self.data.lock()[span].copy_from_slice(buf);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

pub mod ram_disk;
