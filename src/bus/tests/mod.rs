use crate::bus::Bus;
use crate::config::BusConfig;
use crate::device::{Device, Media, RamDisk};
use crate::host::{LoopbackHost, MemoryConfigStore};
use crate::mem::PhysMemory;
use alloc::sync::Arc;

// 测试辅助函数 (fixtures)

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const MEM_BASE: u64 = 0x10_0000;

/// 创建一条未建立的总线及其宿主与配置
pub fn create_test_bus(config: BusConfig) -> (Bus, Arc<LoopbackHost>, Arc<MemoryConfigStore>) {
    init_logger();
    let host = Arc::new(LoopbackHost::new());
    let store = Arc::new(MemoryConfigStore::new());
    let bus = Bus::new(config, host.clone(), store.clone());
    (bus, host, store)
}

/// 创建并建立一条总线
pub fn create_started_bus() -> (Bus, Arc<LoopbackHost>, Arc<MemoryConfigStore>) {
    let (bus, host, store) = create_test_bus(BusConfig::named("TestBus"));
    bus.establish().unwrap();
    (bus, host, store)
}

pub fn create_test_memory(size: usize) -> Arc<PhysMemory> {
    Arc::new(PhysMemory::new(MEM_BASE, size))
}

/// 以整段内存为介质的硬盘
pub fn create_ram_device(memory: &Arc<PhysMemory>) -> Device {
    RamDisk::create(
        memory.clone(),
        memory.base(),
        memory.size() as u64,
        Media::HardDisk,
        512,
    )
    .unwrap()
}

pub mod lifecycle;
pub mod worker;
