use super::*;
use crate::bus::WorkerState;
use crate::error::BusError;
use crate::request::Request;
use crate::sync::SpinLock;
use core::time::Duration;
use std::thread;

#[test]
fn test_work_items_run_in_fifo_order() {
    let (bus, _host, _store) = create_started_bus();
    let seen = Arc::new(SpinLock::new(Vec::new()));

    for i in 0..100 {
        let seen = seen.clone();
        bus.enqueue(move |_ctx| seen.lock().push(i)).unwrap();
    }
    // 同步调用排在所有工作项之后
    bus.run_on_worker(|_ctx| ()).unwrap();

    let seen = seen.lock();
    assert_eq!(*seen, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_items_run_on_worker_thread() {
    let (bus, _host, _store) = create_started_bus();
    let name = bus
        .run_on_worker(|_ctx| thread::current().name().map(String::from))
        .unwrap()
        .unwrap();
    assert!(name.starts_with("vblk-worker"));
}

#[test]
fn test_nested_call_runs_inline() {
    let (bus, _host, _store) = create_started_bus();
    let memory = create_test_memory(4096);
    let node = bus.add_device(create_ram_device(&memory)).unwrap();

    // 在工作线程上再次请求移除，必须直接执行而不是排队等待自己
    let target = node.clone();
    let result = bus.run_on_worker(move |_ctx| target.remove()).unwrap();
    assert_eq!(result, Ok(()));
    assert!(!node.is_linked());
}

#[test]
fn test_enqueue_after_cleanup_fails() {
    let (bus, _host, _store) = create_started_bus();
    bus.cleanup();

    assert_eq!(bus.enqueue(|_ctx| ()), Err(BusError::NoSuchDevice));
    assert_eq!(bus.run_on_worker(|_ctx| 1), Err(BusError::NoSuchDevice));
}

#[test]
fn test_stop_flag_alone_keeps_worker_running() {
    let (bus, host, _store) = create_test_bus(
        BusConfig::named("TestBus").with_heartbeat(Duration::from_millis(5)),
    );
    bus.establish().unwrap();
    let fdo = bus.handle().unwrap();
    assert!(host.lower_of(fdo).is_some());

    bus.run_on_worker(|ctx| ctx.bus.stop.store(true, core::sync::atomic::Ordering::Release))
        .unwrap();
    bus.signal();

    // 工作线程在下一次醒来时摘下父设备，但继续运行
    let mut detached = false;
    for _ in 0..200 {
        if host.lower_of(fdo).is_none() {
            detached = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(detached);
    assert_eq!(bus.parent(), None);
    assert_eq!(bus.worker_state(), WorkerState::Started);
    assert_eq!(bus.run_on_worker(|_ctx| 7), Ok(7));
}

/// 在工作线程上执行一个被闸门挡住的工作项，放行后由它自己请求退出
fn enqueue_gated_stop(bus: &Bus) -> crossbeam_channel::Sender<()> {
    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    bus.enqueue(move |ctx| {
        entered_tx.send(()).unwrap();
        gate_rx.recv().unwrap();
        ctx.bus.worker.stop();
    })
    .unwrap();
    entered_rx.recv().unwrap();
    gate_tx
}

#[test]
fn test_items_queued_behind_stop_are_cancelled() {
    let (bus, _host, _store) = create_started_bus();
    let gate = enqueue_gated_stop(&bus);

    let (req, ticket) = Request::create();
    bus.submit(req);

    thread::scope(|s| {
        let sync_call = s.spawn(|| bus.run_on_worker(|_ctx| 42));

        // 两个工作项都已排在被挡住的工作项之后
        for _ in 0..1000 {
            if bus.inner.worker.pending() == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(bus.inner.worker.pending(), 2);

        gate.send(()).unwrap();
        assert_eq!(sync_call.join().unwrap(), Err(BusError::NoSuchDevice));
    });

    let reply = ticket.wait();
    assert_eq!(reply.result, Err(BusError::NoSuchDevice));
    assert_eq!(reply.bytes(), 0);
    assert_eq!(bus.worker_state(), WorkerState::Stopped);
}

#[test]
fn test_worker_exit_leaves_parent_stack() {
    let (bus, host, _store) = create_started_bus();
    let fdo = bus.handle().unwrap();
    assert!(host.lower_of(fdo).is_some());

    // 退出时 stop 标志未置位
    assert!(!bus.inner.stop.load(core::sync::atomic::Ordering::Acquire));
    let gate = enqueue_gated_stop(&bus);
    gate.send(()).unwrap();

    let mut detached = false;
    for _ in 0..200 {
        if bus.worker_state() == WorkerState::Stopped && host.lower_of(fdo).is_none() {
            detached = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(detached);
    assert_eq!(bus.parent(), None);
}
