//! 内存中的持久化配置

use alloc::string::String;
use core::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;

use super::ConfigStore;
use crate::error::{BusError, Result};
use crate::sync::SpinLock;

/// 以 `HashMap` 保存的配置，可切换为只读以模拟写入失败
#[derive(Default)]
pub struct MemoryConfigStore {
    flags: SpinLock<HashMap<String, bool>>,
    read_only: AtomicBool,
}

impl MemoryConfigStore {
    /// 创建空的配置存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换只读模式，只读时写入失败
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.flags.lock().get(key).copied().unwrap_or(false))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(BusError::Io(String::from("config store is read-only")));
        }
        self.flags.lock().insert(String::from(key), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_false() {
        let store = MemoryConfigStore::new();
        assert_eq!(store.get_flag("PdoDone"), Ok(false));
        store.set_flag("PdoDone", true).unwrap();
        assert_eq!(store.get_flag("PdoDone"), Ok(true));
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = MemoryConfigStore::new();
        store.set_read_only(true);
        assert!(store.set_flag("PdoDone", true).is_err());
        assert_eq!(store.get_flag("PdoDone"), Ok(false));
    }
}
