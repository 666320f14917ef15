use super::*;
use crate::device::{DeviceFlags, DeviceState};
use crate::error::BusError;
use crate::host::HandleKind;
use crate::request::Request;

#[test]
fn test_add_device_without_bus_has_no_side_effects() {
    let (bus, host, _store) = create_test_bus(BusConfig::default());
    let memory = create_test_memory(4096);

    let result = bus.add_device(create_ram_device(&memory));
    assert!(matches!(result, Err(BusError::NoSuchDevice)));
    assert!(bus.nodes().is_empty());
    assert_eq!(host.live_handles(HandleKind::Device), 0);
}

#[test]
fn test_add_device_after_cleanup_fails() {
    let (bus, host, _store) = create_started_bus();
    bus.cleanup();

    let memory = create_test_memory(4096);
    assert!(bus.add_device(create_ram_device(&memory)).is_err());
    assert_eq!(host.live_handles(HandleKind::Device), 0);
}

#[test]
fn test_add_device_links_and_initializes() {
    let (bus, host, _store) = create_started_bus();
    let memory = create_test_memory(4096);

    let node = bus.add_device(create_ram_device(&memory)).unwrap();
    assert!(node.is_linked());
    assert!(!node.is_boot());
    assert_eq!(node.unit(), 0);
    assert_eq!(node.state(), DeviceState::Added);
    assert_eq!(host.handle_kind(node.handle().unwrap()), Some(HandleKind::Device));

    let device = node.device();
    assert!(!device.flags().contains(DeviceFlags::INITIALIZING));
    assert_eq!(device.disk().unwrap().geometry().heads, 255);
}

#[test]
fn test_units_reuse_lowest_free() {
    let (bus, _host, _store) = create_started_bus();
    let memory = create_test_memory(4096);

    let nodes: Vec<_> = (0..3)
        .map(|_| bus.add_device(create_ram_device(&memory)).unwrap())
        .collect();
    let units: Vec<_> = nodes.iter().map(|n| n.unit()).collect();
    assert_eq!(units, [0, 1, 2]);

    bus.remove_device(&nodes[1]).unwrap();
    let again = bus.add_device(create_ram_device(&memory)).unwrap();
    assert_eq!(again.unit(), 1);

    // 枚举顺序为插入顺序
    let order: Vec<_> = bus.nodes().iter().map(|n| n.unit()).collect();
    assert_eq!(order, [0, 2, 1]);
}

#[test]
fn test_remove_device_is_single_shot() {
    let (bus, host, _store) = create_started_bus();
    let memory = create_test_memory(4096);
    let node = bus.add_device(create_ram_device(&memory)).unwrap();

    bus.remove_device(&node).unwrap();
    assert!(!node.is_linked());
    assert_eq!(node.state(), DeviceState::Deleted);
    assert_eq!(node.handle(), None);
    assert_eq!(host.live_handles(HandleKind::Device), 0);

    assert_eq!(bus.remove_device(&node), Err(BusError::NoSuchDevice));
}

#[test]
fn test_requests_to_deleted_device_fail() {
    let (bus, _host, _store) = create_started_bus();
    let memory = create_test_memory(4096);
    let node = bus.add_device(create_ram_device(&memory)).unwrap();
    bus.remove_device(&node).unwrap();

    let (req, ticket) = Request::read(0, 1, alloc::vec![0u8; 512]);
    node.dispatch(req);
    let reply = ticket.wait();
    assert_eq!(reply.result, Err(BusError::NoSuchDevice));
    assert_eq!(reply.bytes(), 0);
}

#[test]
fn test_cleanup_releases_nodes() {
    let (bus, host, _store) = create_started_bus();
    let memory = create_test_memory(4096);
    let node = bus.add_device(create_ram_device(&memory)).unwrap();

    bus.cleanup();
    assert!(bus.nodes().is_empty());
    assert!(!node.is_linked());
    assert_eq!(node.state(), DeviceState::Deleted);
    assert_eq!(host.live_handles(HandleKind::Device), 0);
}
