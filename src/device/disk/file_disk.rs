//! 文件磁盘
//!
//! 以宿主文件作为介质。读越过文件末尾的部分补零，写会扩展文件。

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use log::{debug, warn};

use super::{Disk, DiskBackend, IoMode, Media, SectorRange};
use crate::device::Device;
use crate::error::{BusError, Result};

/// 文件磁盘
pub struct FileDisk {
    file: File,
    path: PathBuf,
    /// 路径哈希，作为实例标识
    hash: u32,
}

impl FileDisk {
    /// 打开 `path` 创建文件磁盘设备
    ///
    /// `size_bytes` 为 0 时使用文件当前长度。
    pub fn create(path: &Path, size_bytes: u64, media: Media) -> Result<Device> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size_bytes = match size_bytes {
            0 => file.metadata()?.len(),
            n => n,
        };
        let sector_size = media.default_sector_size();
        let lba_size = size_bytes / u64::from(sector_size);
        if lba_size == 0 {
            // file is closed when dropped
            return Err(BusError::InvalidParameter("file disk smaller than one sector"));
        }

        debug!("file disk: {} ({} sectors)", path.display(), lba_size);
        let backend = Box::new(FileDisk {
            file,
            path: path.to_path_buf(),
            hash: path_hash(path),
        });
        Ok(Device::from_disk(Disk::new(backend, media, sector_size, lba_size)))
    }

    /// 文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `h = h * 31 + b`，逐字节计算
fn path_hash(path: &Path) -> u32 {
    path.to_string_lossy()
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

impl DiskBackend for FileDisk {
    fn io(&mut self, mode: IoMode, range: SectorRange, buf: &mut [u8]) -> Result<usize> {
        if range.count == 0 {
            return Err(BusError::Cancelled);
        }
        self.file.seek(SeekFrom::Start(range.byte_offset()?))?;
        match mode {
            IoMode::Read => {
                let mut done = 0;
                while done < buf.len() {
                    match self.file.read(&mut buf[done..])? {
                        0 => break,
                        n => done += n,
                    }
                }
                buf[done..].fill(0);
            }
            IoMode::Write => self.file.write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn kind(&self) -> &'static str {
        "FileDisk"
    }

    fn id_prefix(&self) -> &'static str {
        "File"
    }

    fn instance_id(&self) -> String {
        format!("Hash_{:08X}", self.hash)
    }

    fn free(&mut self) {
        if let Err(e) = self.file.flush() {
            warn!("file disk: flush {} failed: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_fold() {
        // "ab" = 97 * 31 + 98
        assert_eq!(path_hash(Path::new("ab")), 97 * 31 + 98);
    }
}
