//! 总线工作线程
//!
//! 每条总线一个工作线程。节点列表的增删、挂接状态的修改都只在这里执行：
//! 其它线程把工作项放进队列，再在一次性完成信号上等待结果。
//!
//! 线程在三种情况下醒来：有新工作项、总线信号、心跳超时。每次醒来先按 FIFO
//! 顺序处理完所有就绪的工作项，再检查 `stop` 标志与线程状态。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, error, info, trace, warn};

use super::node::Node;
use super::{BusInner, BusState};
use crate::config::BusConfig;
use crate::device::{Device, FileDisk};
use crate::error::{BusError, Result};
use crate::host::{Handle, Host};
use crate::request::FileAttach;
use crate::sync::{SpinLock, oneshot};

/// 工作项，由工作线程恰好执行一次
pub type WorkItem = Box<dyn FnOnce(&WorkerContext) + Send>;

/// 工作线程状态
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// 尚未启动
    NotStarted = 0,
    /// 正在运行
    Started = 1,
    /// 已请求退出
    Stopping = 2,
    /// 已退出
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Started,
            2 => WorkerState::Stopping,
            3 => WorkerState::Stopped,
            _ => WorkerState::NotStarted,
        }
    }
}

/// 工作线程的句柄与通道
pub(crate) struct Worker {
    state: AtomicU8,
    work_tx: SpinLock<Option<Sender<WorkItem>>>,
    wake_tx: SpinLock<Option<Sender<()>>>,
    thread: SpinLock<Option<JoinHandle<()>>>,
    thread_id: SpinLock<Option<ThreadId>>,
}

impl Worker {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::NotStarted as u8),
            work_tx: SpinLock::new(None),
            wake_tx: SpinLock::new(None),
            thread: SpinLock::new(None),
            thread_id: SpinLock::new(None),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// 已请求退出（`Stopping`，或在工作线程内部调用 `stop` 后的 `Stopped`）
    fn stop_requested(&self) -> bool {
        matches!(self.state(), WorkerState::Stopping | WorkerState::Stopped)
    }

    /// 队列中尚未执行的工作项数
    pub(crate) fn pending(&self) -> usize {
        self.work_tx.lock().as_ref().map_or(0, |tx| tx.len())
    }

    /// 当前线程是否为工作线程
    pub(crate) fn is_current(&self) -> bool {
        *self.thread_id.lock() == Some(thread::current().id())
    }

    /// 启动线程并等待它报告 `Started`
    pub(crate) fn start(&self, bus: Arc<BusInner>) -> Result<()> {
        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let (started, started_wait) = oneshot::<()>();
        let heartbeat = bus.config.heartbeat;
        let name = alloc::format!("vblk-worker:{}", bus.config.name);

        *self.work_tx.lock() = Some(work_tx);
        *self.wake_tx.lock() = Some(wake_tx);

        let ctx = WorkerContext { bus };
        let spawned = thread::Builder::new().name(name).spawn(move || {
            ctx.bus.worker.set_state(WorkerState::Started);
            started.complete(());
            run(&ctx, &work_rx, &wake_rx, heartbeat);
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!("worker: spawn failed: {}", e);
                self.release_channels();
                return Err(BusError::ResourceExhausted);
            }
        };

        *self.thread_id.lock() = Some(handle.thread().id());
        *self.thread.lock() = Some(handle);

        if started_wait.wait().is_none() {
            // thread died before reporting
            self.stop();
            return Err(BusError::Internal("worker did not start"));
        }
        info!("worker: started");
        Ok(())
    }

    fn release_channels(&self) {
        *self.work_tx.lock() = None;
        *self.wake_tx.lock() = None;
    }

    /// 放入一个工作项；线程未运行时工作项被丢弃并返回 `NoSuchDevice`
    pub(crate) fn enqueue(&self, item: WorkItem) -> Result<()> {
        let tx = self.work_tx.lock().clone().ok_or(BusError::NoSuchDevice)?;
        tx.send(item).map_err(|_| BusError::NoSuchDevice)?;
        trace!("worker: queued, {} pending", self.pending());
        Ok(())
    }

    /// 唤醒工作线程
    pub(crate) fn signal(&self) {
        if let Some(tx) = self.wake_tx.lock().as_ref() {
            // a pending wake is as good as a new one
            let _ = tx.try_send(());
        }
    }

    /// 通知线程退出并等待，可重复调用
    pub(crate) fn stop(&self) {
        if self.state() == WorkerState::Started {
            self.set_state(WorkerState::Stopping);
        }
        self.signal();

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // stopping from inside a work item: the loop exits after it returns
                warn!("worker: stop requested from the worker itself");
            } else if handle.join().is_err() {
                error!("worker: thread panicked");
            }
        }

        self.release_channels();
        *self.thread_id.lock() = None;
        if self.state() != WorkerState::NotStarted {
            self.set_state(WorkerState::Stopped);
        }
    }
}

fn run(ctx: &WorkerContext, work: &Receiver<WorkItem>, wake: &Receiver<()>, heartbeat: Duration) {
    let worker = &ctx.bus.worker;
    loop {
        // items still queued once a stop is requested are cancelled below
        while !worker.stop_requested() {
            match work.try_recv() {
                Ok(item) => item(ctx),
                Err(_) => break,
            }
        }

        if ctx.bus.stop.load(Ordering::Acquire) {
            ctx.detach_from_parent();
        }

        if worker.stop_requested() {
            // `stop` may have been set after the check above
            ctx.detach_from_parent();
            break;
        }

        select! {
            recv(work) -> item => match item {
                Ok(item) => item(ctx),
                Err(_) => {
                    // every sender is gone
                    ctx.detach_from_parent();
                    break;
                }
            },
            recv(wake) -> _ => trace!("worker: signalled"),
            default(heartbeat) => trace!("worker: heartbeat"),
        }
    }
    worker.set_state(WorkerState::Stopped);

    let cancelled = work.try_iter().count();
    if cancelled > 0 {
        warn!("worker: cancelled {} queued item(s)", cancelled);
    }
    info!("worker: stopped");
}

/// 工作线程上下文
///
/// 只有工作项（以及在工作线程上运行的探测器和总线请求处理函数）能拿到它，
/// 因此这里的方法就是总线状态的唯一写入路径。
pub struct WorkerContext {
    pub(crate) bus: Arc<BusInner>,
}

impl WorkerContext {
    /// 总线配置
    pub fn config(&self) -> &BusConfig {
        &self.bus.config
    }

    /// 宿主枚举服务
    pub fn host(&self) -> &dyn Host {
        self.bus.host.as_ref()
    }

    /// 总线状态
    pub fn bus_state(&self) -> BusState {
        *self.bus.state.lock()
    }

    /// 已链接的节点，按枚举顺序
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.bus.nodes.lock().clone()
    }

    /// 挂接后的下层句柄
    pub fn lower(&self) -> Option<Handle> {
        self.bus.attachment.lock().lower
    }

    /// 挂接到父设备栈并运行探测器
    pub fn attach(&self, parent: Handle) -> Result<()> {
        let bus = &self.bus;
        {
            let mut attachment = bus.attachment.lock();
            if attachment.parent.is_some() {
                return Err(BusError::AlreadyExists);
            }
            bus.stop.store(false, Ordering::Release);

            let fdo = (*bus.fdo.lock()).ok_or(BusError::NoSuchDevice)?;
            let lower = bus.host.attach_to_device_stack(fdo, parent).map_err(|e| {
                warn!("bus: attach to {:?} failed: {}", parent, e);
                BusError::NoSuchDevice
            })?;
            attachment.parent = Some(parent);
            attachment.lower = Some(lower);
            info!("bus: attached to {:?}, lower {:?}", parent, lower);
        }

        for probe in &bus.config.probes {
            let found = probe.probe(self);
            debug!("bus: probe {} found {} device(s)", probe.name(), found.len());
            for device in found {
                if let Err(e) = self.add_device(device, true) {
                    warn!("bus: probe {} device rejected: {}", probe.name(), e);
                }
            }
        }
        Ok(())
    }

    /// 从父设备栈上摘下（若已挂接）
    pub(crate) fn detach_from_parent(&self) {
        let mut attachment = self.bus.attachment.lock();
        if attachment.parent.take().is_some() {
            if let Some(lower) = attachment.lower.take() {
                self.bus.host.detach_from_device_stack(lower);
            }
            info!("bus: detached from parent");
        }
    }

    /// 把设备加入总线，返回新节点
    pub fn add_device(&self, mut device: Device, boot: bool) -> Result<Arc<Node>> {
        let bus = &self.bus;
        if !bus.is_present() {
            warn!("bus: add_device while bus is absent");
            return Err(BusError::NoSuchDevice);
        }

        let mut created = None;
        if device.handle().is_none() {
            let handle = bus.host.create_device_handle(device.class_name())?;
            device.set_handle(handle);
            created = Some(handle);
        }
        let release = |device: &mut Device| {
            if let Some(handle) = created {
                device.take_handle();
                bus.host.delete_handle(handle);
            }
        };

        if let Err(e) = device.init() {
            release(&mut device);
            return Err(e);
        }
        device.clear_initializing();

        let mut nodes = bus.nodes.lock();
        let unit = match lowest_free_unit(&nodes) {
            Some(unit) => unit,
            None => {
                drop(nodes);
                release(&mut device);
                return Err(BusError::ResourceExhausted);
            }
        };
        if let Some(disk) = device.disk_mut() {
            disk.set_unit(unit);
        }
        let node = Arc::new(Node::new(device, u32::from(unit), boot, Arc::downgrade(bus)));
        node.set_linked(true);
        nodes.push(node.clone());
        info!(
            "bus: added unit {} ({}{})",
            unit,
            node.device().class_name(),
            if boot { ", boot" } else { "" }
        );
        Ok(node)
    }

    /// 移除节点：摘链、释放设备、删除宿主句柄，一次完成
    pub fn remove_device(&self, node: &Arc<Node>) -> Result<()> {
        let bus = &self.bus;
        {
            let mut nodes = bus.nodes.lock();
            let pos = nodes
                .iter()
                .position(|n| Arc::ptr_eq(n, node))
                .ok_or(BusError::NoSuchDevice)?;
            nodes.remove(pos);
            node.set_linked(false);
        }

        let handle = {
            let mut device = node.device();
            device.free();
            device.take_handle()
        };
        if let Some(handle) = handle {
            bus.host.delete_handle(handle);
        }
        info!("bus: removed unit {}", node.unit());
        Ok(())
    }

    /// 按单元号卸载非启动设备
    pub fn detach(&self, unit: u32) -> Result<()> {
        let node = self.bus.find_detachable(unit)?;
        self.remove_device(&node)
    }

    /// 挂接文件磁盘，返回单元号
    pub fn attach_file(&self, attach: &FileAttach) -> Result<u32> {
        let device = FileDisk::create(&attach.path, attach.size_bytes, attach.media)?;
        Ok(self.add_device(device, false)?.unit())
    }
}

/// 已链接节点未使用的最小单元号
fn lowest_free_unit(nodes: &[Arc<Node>]) -> Option<u8> {
    (0..=u8::MAX).find(|unit| !nodes.iter().any(|n| n.unit() == u32::from(*unit)))
}
