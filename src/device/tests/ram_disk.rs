use super::*;
use crate::device::{IoMode, RamDisk};
use crate::request::QueryIdType;
use alloc::vec::Vec;

// P0 核心功能测试

#[test]
fn test_ramdisk_create() {
    init_logger();
    let memory = create_test_memory(1024 * 1024);
    let device = create_test_ram_device(&memory, 1024 * 1024, Media::HardDisk);

    let disk = device.disk().unwrap();
    assert_eq!(disk.sector_size(), 512);
    assert_eq!(disk.lba_size(), 2048);
    assert_eq!(disk.kind(), "RamDisk");
}

#[test]
fn test_ramdisk_write_then_read() {
    let memory = create_test_memory(4096);
    let mut device = create_test_ram_device(&memory, 4096, Media::HardDisk);
    let disk = device.disk_mut().unwrap();

    let mut data = alloc::vec![0xCCu8; 1024];
    data[1023] = 0x11;
    assert_eq!(disk.io(IoMode::Write, 2, 2, &mut data), Ok(1024));

    let mut back = alloc::vec![0u8; 1024];
    assert_eq!(disk.io(IoMode::Read, 2, 2, &mut back), Ok(1024));
    assert_eq!(back, data);

    // 数据落在物理内存的对应位置
    let mut raw = [0u8; 1];
    memory.read(MEM_BASE + 2 * 512, &mut raw).unwrap();
    assert_eq!(raw[0], 0xCC);
}

#[test]
fn test_ramdisk_every_in_range_transfer() {
    let memory = create_test_memory(4096);
    let mut device = create_test_ram_device(&memory, 4096, Media::HardDisk);
    let disk = device.disk_mut().unwrap();
    let lba = disk.lba_size();
    assert_eq!(lba, 8);

    for start in 0..lba {
        for count in 1..=(lba - start) as u32 {
            let len = count as usize * 512;
            let mut data: Vec<u8> = (0..len)
                .map(|i| (start as usize * 31 + count as usize * 7 + i) as u8)
                .collect();
            assert_eq!(
                disk.io(IoMode::Write, start, count, &mut data),
                Ok(len),
                "write ({}, {})",
                start,
                count
            );

            let mut back = alloc::vec![0u8; len];
            assert_eq!(disk.io(IoMode::Read, start, count, &mut back), Ok(len));
            assert_eq!(back, data, "read back ({}, {})", start, count);
        }
    }
}

#[test]
fn test_ramdisk_whole_disk_and_last_sector() {
    let memory = create_test_memory(64 * 1024);
    let mut device = create_test_ram_device(&memory, 64 * 1024, Media::HardDisk);
    let disk = device.disk_mut().unwrap();
    let lba = disk.lba_size();

    let mut whole: Vec<u8> = (0..64 * 1024).map(|i| (i / 512) as u8).collect();
    assert_eq!(disk.io(IoMode::Write, 0, lba as u32, &mut whole), Ok(64 * 1024));

    // 最后一个扇区单独读出
    let mut last = alloc::vec![0u8; 512];
    assert_eq!(disk.io(IoMode::Read, lba - 1, 1, &mut last), Ok(512));
    assert!(last.iter().all(|b| *b == (lba - 1) as u8));

    let mut tail = alloc::vec![0x5Au8; 512];
    assert_eq!(disk.io(IoMode::Write, lba - 1, 1, &mut tail), Ok(512));

    let mut back = alloc::vec![0u8; 64 * 1024];
    assert_eq!(disk.io(IoMode::Read, 0, lba as u32, &mut back), Ok(64 * 1024));
    assert_eq!(back[..63 * 1024], whole[..63 * 1024]);
    assert!(back[63 * 1024..].iter().all(|b| *b == 0x5A));
}

#[test]
fn test_ramdisk_zero_count_is_cancelled() {
    let memory = create_test_memory(4096);
    let mut device = create_test_ram_device(&memory, 4096, Media::HardDisk);
    let before = memory.mapping_count();

    let mut buf = alloc::vec![0x77u8; 512];
    let disk = device.disk_mut().unwrap();
    assert_eq!(disk.io(IoMode::Write, 0, 0, &mut buf), Err(BusError::Cancelled));
    assert_eq!(disk.io(IoMode::Read, 0, 0, &mut buf), Err(BusError::Cancelled));

    // 未映射内存，缓冲区也未被改动
    assert_eq!(memory.mapping_count(), before);
    assert!(buf.iter().all(|b| *b == 0x77));
}

#[test]
fn test_ramdisk_rejects_out_of_range() {
    let memory = create_test_memory(4096);
    let mut device = create_test_ram_device(&memory, 4096, Media::HardDisk);
    let disk = device.disk_mut().unwrap();

    let mut buf = alloc::vec![0u8; 1024];
    assert!(matches!(
        disk.io(IoMode::Read, 7, 2, &mut buf),
        Err(BusError::InvalidParameter(_))
    ));
    // 缓冲区不足两个扇区
    let mut short = alloc::vec![0u8; 600];
    assert!(matches!(
        disk.io(IoMode::Read, 0, 2, &mut short),
        Err(BusError::InvalidParameter(_))
    ));
}

#[test]
fn test_ramdisk_outside_memory_fails() {
    let memory = create_test_memory(4096);
    let result = RamDisk::create(memory.clone(), MEM_BASE + 2048, 4096, Media::HardDisk, 512);
    assert!(matches!(result, Err(BusError::InvalidParameter(_))));

    let result = RamDisk::create(memory, MEM_BASE, 100, Media::HardDisk, 512);
    assert!(matches!(result, Err(BusError::InvalidParameter(_))));
}

#[test]
fn test_ramdisk_identity() {
    let memory = create_test_memory(8192);
    let device = create_test_ram_device(&memory, 8192, Media::Floppy);
    let disk = device.disk().unwrap();

    assert_eq!(
        disk.pnp_query_id(QueryIdType::DeviceId).unwrap(),
        ["VBlock\\RAMFloppyDisk"]
    );
    assert_eq!(
        disk.pnp_query_id(QueryIdType::InstanceId).unwrap(),
        ["RAM_at_00100000"]
    );
    assert_eq!(
        disk.pnp_query_id(QueryIdType::CompatibleIds).unwrap(),
        ["GenSFloppy"]
    );
}

#[test]
fn test_ramdisk_memory_at_top_of_address_space() {
    let memory = Arc::new(PhysMemory::new(u64::MAX - 1023, 4096));
    let result = RamDisk::create(memory, u64::MAX - 1023, 1024, Media::HardDisk, 512);
    assert!(matches!(result, Err(BusError::InvalidParameter(_))));
}
