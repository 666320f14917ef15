//! 物理内存区域
//!
//! 内存磁盘的数据保存在一段“物理内存”中，以物理地址寻址。
//! 访问前必须先用 [`PhysMemory::map_io_space()`] 把目标范围映射出来，
//! 映射对象被丢弃即视为解除映射。

use alloc::vec;
use core::ops::{Deref, DerefMut, Range};
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{BusError, Result};
use crate::sync::{SpinLock, SpinLockGuard};

/// 一段连续的物理内存
pub struct PhysMemory {
    /// 起始物理地址
    base: u64,
    /// 存储数据
    bytes: SpinLock<Box<[u8]>>,
    /// 已建立过的映射次数
    mappings: AtomicUsize,
}

impl PhysMemory {
    /// 创建从 `base` 开始、长度为 `size` 字节的物理内存区域
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: SpinLock::new(vec![0u8; size].into_boxed_slice()),
            mappings: AtomicUsize::new(0),
        }
    }

    /// 起始物理地址
    pub fn base(&self) -> u64 {
        self.base
    }

    /// 区域长度（字节）
    pub fn size(&self) -> usize {
        self.bytes.lock().len()
    }

    /// 区域结束地址（不含），超出地址空间时返回 `InvalidParameter`
    pub fn end(&self) -> Result<u64> {
        self.base
            .checked_add(self.size() as u64)
            .ok_or(BusError::InvalidParameter("physical region overflows"))
    }

    /// `[addr, addr + len)` 是否完全落在本区域内
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        match (addr.checked_add(len), self.end()) {
            (Some(end), Ok(region_end)) => addr >= self.base && end <= region_end,
            _ => false,
        }
    }

    /// 已建立过的映射次数
    pub fn mapping_count(&self) -> usize {
        self.mappings.load(Ordering::Relaxed)
    }

    fn local_range(&self, addr: u64, len: usize, size: usize) -> Result<Range<usize>> {
        let start = addr
            .checked_sub(self.base)
            .ok_or(BusError::InvalidParameter("physical address below region"))?;
        let start = usize::try_from(start)
            .map_err(|_| BusError::InvalidParameter("physical address out of range"))?;
        let end = start
            .checked_add(len)
            .ok_or(BusError::InvalidParameter("physical range overflows"))?;
        if end > size {
            return Err(BusError::InvalidParameter("physical range beyond region"));
        }
        Ok(start..end)
    }

    /// 映射 `[addr, addr + len)`
    ///
    /// 范围不在本区域内时返回 `ResourceExhausted`，与无法映射 I/O 空间的情况一致。
    pub fn map_io_space(&self, addr: u64, len: usize) -> Result<IoMapping<'_>> {
        let guard = self.bytes.lock();
        let range = self
            .local_range(addr, len, guard.len())
            .map_err(|_| BusError::ResourceExhausted)?;
        self.mappings.fetch_add(1, Ordering::Relaxed);
        Ok(IoMapping { guard, range })
    }

    /// 读取物理内存（用于探测与调试）
    pub fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        let guard = self.bytes.lock();
        let range = self.local_range(addr, buf.len(), guard.len())?;
        buf.copy_from_slice(&guard[range]);
        Ok(())
    }

    /// 写入物理内存（用于装载镜像与测试）
    pub fn write(&self, addr: u64, data: &[u8]) -> Result<()> {
        let mut guard = self.bytes.lock();
        let range = self.local_range(addr, data.len(), guard.len())?;
        guard[range].copy_from_slice(data);
        Ok(())
    }
}

/// 一次 I/O 空间映射，丢弃时解除映射
pub struct IoMapping<'a> {
    guard: SpinLockGuard<'a, Box<[u8]>>,
    range: Range<usize>,
}

impl Deref for IoMapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard[self.range.clone()]
    }
}

impl DerefMut for IoMapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let range = self.range.clone();
        &mut self.guard[range]
    }
}

/// 按 32 位字批量复制，尾部不足一个字的字节逐字节复制
pub fn fast_copy(dest: &mut [u8], src: &[u8]) {
    let len = dest.len().min(src.len());
    let (dest, src) = (&mut dest[..len], &src[..len]);
    let words = len / 4 * 4;

    for (d, s) in dest[..words]
        .chunks_exact_mut(4)
        .zip(src[..words].chunks_exact(4))
    {
        let word = u32::from_ne_bytes([s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&word.to_ne_bytes());
    }
    dest[words..].copy_from_slice(&src[words..]);
}
