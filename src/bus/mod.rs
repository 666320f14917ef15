//! 总线控制器
//!
//! [`Bus`] 拥有设备节点列表、工作队列和工作线程，是总线状态的唯一写入者。
//!
//! # 生命周期
//!
//! - [`Bus::establish()`]：创建服务句柄与符号名称，启动工作线程，
//!   首次启动时创建根枚举句柄并挂接
//! - [`Bus::attach()`]：挂接到父设备栈，运行探测器
//! - [`Bus::add_device()`] / [`Bus::remove_device()`] / [`Bus::detach()`]：增删节点
//! - [`Bus::cleanup()`]：拆除，可重复调用，`Bus` 被丢弃时自动执行
//!
//! 节点列表的修改全部在工作线程上进行：其它线程的调用被包装成工作项排队，
//! 调用方阻塞等待；已经在工作线程上的调用直接执行。

mod handlers;
mod node;
mod probe;
mod worker;

#[cfg(test)]
mod tests;

pub use node::Node;
#[cfg(feature = "memdisk-probe")]
pub use probe::MemdiskProbe;
pub use probe::Probe;
pub use worker::{WorkItem, WorkerContext, WorkerState};

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::config::{BusConfig, PDO_DONE_KEY};
use crate::device::Device;
use crate::error::{BusError, Result};
use crate::host::{ConfigStore, Handle, Host};
use crate::request::{FileAttach, Request};
use crate::sync::{SpinLock, oneshot};
use handlers::BUS_HANDLERS;
use worker::Worker;

/// 总线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// 尚未建立，或建立失败后已回滚
    NotEstablished,
    /// 正在建立
    Establishing,
    /// 已启动
    Started,
    /// 正在拆除
    StopPending,
    /// 已拆除
    Stopped,
}

/// 与父设备栈的挂接关系
#[derive(Debug, Default)]
pub(crate) struct Attachment {
    /// 父设备句柄
    pub parent: Option<Handle>,
    /// 挂接后位于总线之下的句柄
    pub lower: Option<Handle>,
}

pub(crate) struct BusInner {
    pub(crate) config: BusConfig,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) store: Arc<dyn ConfigStore>,
    pub(crate) state: SpinLock<BusState>,
    /// 设置后工作线程从父设备栈摘下，但不退出
    pub(crate) stop: AtomicBool,
    /// 总线服务句柄
    pub(crate) fdo: SpinLock<Option<Handle>>,
    symlink: AtomicBool,
    /// 已链接的节点，插入顺序即枚举顺序
    pub(crate) nodes: SpinLock<Vec<Arc<Node>>>,
    pub(crate) attachment: SpinLock<Attachment>,
    pub(crate) worker: Worker,
}

impl BusInner {
    /// 总线存在且未在停止
    pub(crate) fn is_present(&self) -> bool {
        matches!(
            *self.state.lock(),
            BusState::Establishing | BusState::Started
        ) && self.fdo.lock().is_some()
    }

    /// 在调用线程上扫描节点，找出可卸载的节点
    pub(crate) fn find_detachable(&self, unit: u32) -> Result<Arc<Node>> {
        let nodes = self.nodes.lock();
        let node = nodes
            .iter()
            .find(|n| n.unit() == unit)
            .ok_or(BusError::InvalidParameter("no such unit"))?;
        if node.is_boot() {
            warn!("bus: unit {} is a boot device", unit);
            return Err(BusError::InvalidOperation("boot device cannot be detached"));
        }
        Ok(node.clone())
    }

    /// 在工作线程上执行 `f` 并等待结果
    pub(crate) fn run_on_worker<T, F>(self: &Arc<Self>, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&WorkerContext) -> T + Send + 'static,
    {
        if self.worker.is_current() {
            let ctx = WorkerContext { bus: self.clone() };
            return Ok(f(&ctx));
        }
        let (done, waiter) = oneshot();
        self.worker
            .enqueue(Box::new(move |ctx: &WorkerContext| done.complete(f(ctx))))?;
        // a dropped item means the worker exited first
        waiter.wait().ok_or(BusError::NoSuchDevice)
    }
}

/// 已获取的资源，`establish` 失败时按相反顺序释放
#[derive(Default)]
struct Acquired {
    fdo: Option<Handle>,
    symlink: bool,
    worker: bool,
    parent: Option<Handle>,
}

/// 虚拟块设备总线
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// 创建总线，此时尚未建立
    pub fn new(config: BusConfig, host: Arc<dyn Host>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                host,
                store,
                state: SpinLock::new(BusState::NotEstablished),
                stop: AtomicBool::new(false),
                fdo: SpinLock::new(None),
                symlink: AtomicBool::new(false),
                nodes: SpinLock::new(Vec::new()),
                attachment: SpinLock::new(Attachment::default()),
                worker: Worker::new(),
            }),
        }
    }

    /// 总线配置
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// 总线状态
    pub fn state(&self) -> BusState {
        *self.inner.state.lock()
    }

    /// 工作线程状态
    pub fn worker_state(&self) -> WorkerState {
        self.inner.worker.state()
    }

    /// 总线服务句柄
    pub fn handle(&self) -> Option<Handle> {
        *self.inner.fdo.lock()
    }

    /// 父设备句柄（已挂接时）
    pub fn parent(&self) -> Option<Handle> {
        self.inner.attachment.lock().parent
    }

    /// 建立总线
    ///
    /// 总线已启动时返回 `AlreadyStarted`。失败时按相反顺序释放已获取的资源。
    pub fn establish(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                BusState::Establishing | BusState::Started => return Err(BusError::AlreadyStarted),
                _ => *state = BusState::Establishing,
            }
        }

        let mut acquired = Acquired::default();
        match self.establish_steps(&mut acquired) {
            Ok(()) => {
                *self.inner.state.lock() = BusState::Started;
                info!("bus {}: started", self.inner.config.name);
                Ok(())
            }
            Err(e) => {
                warn!("bus {}: establish failed: {}", self.inner.config.name, e);
                self.unwind(acquired);
                *self.inner.state.lock() = BusState::NotEstablished;
                Err(e)
            }
        }
    }

    fn establish_steps(&self, acquired: &mut Acquired) -> Result<()> {
        let inner = &self.inner;
        let host = &inner.host;
        let config = &inner.config;

        let fdo = host.create_servicing_handle(&config.name)?;
        acquired.fdo = Some(fdo);
        *inner.fdo.lock() = Some(fdo);

        host.create_symbolic_link(&config.dos_name, &config.name)?;
        acquired.symlink = true;
        inner.symlink.store(true, Ordering::Release);

        inner.worker.start(inner.clone())?;
        acquired.worker = true;

        let pdo_done = inner.store.get_flag(PDO_DONE_KEY).unwrap_or_else(|e| {
            warn!("bus: reading {} failed: {}", PDO_DONE_KEY, e);
            false
        });
        if pdo_done {
            // the host re-attaches through `attach`
            return Ok(());
        }

        let parent = host.create_enumeration_handle()?;
        acquired.parent = Some(parent);
        self.attach(parent)?;

        // stored only after a successful attach
        if let Err(e) = inner.store.set_flag(PDO_DONE_KEY, true) {
            warn!("bus: storing {} failed: {}", PDO_DONE_KEY, e);
        }
        Ok(())
    }

    fn unwind(&self, acquired: Acquired) {
        let inner = &self.inner;
        if let Some(parent) = acquired.parent {
            inner.host.delete_handle(parent);
        }
        if acquired.worker {
            inner.worker.stop();
        }
        if acquired.symlink {
            inner.symlink.store(false, Ordering::Release);
            inner.host.delete_symbolic_link(&inner.config.dos_name);
        }
        if let Some(fdo) = acquired.fdo {
            *inner.fdo.lock() = None;
            inner.host.delete_handle(fdo);
        }
    }

    /// 挂接到 `parent` 的设备栈
    pub fn attach(&self, parent: Handle) -> Result<()> {
        self.inner.run_on_worker(move |ctx| ctx.attach(parent))?
    }

    /// 加入一个设备
    pub fn add_device(&self, device: Device) -> Result<Arc<Node>> {
        self.add(device, false)
    }

    /// 加入一个启动设备，启动设备不能被卸载
    pub fn add_boot_device(&self, device: Device) -> Result<Arc<Node>> {
        self.add(device, true)
    }

    fn add(&self, device: Device, boot: bool) -> Result<Arc<Node>> {
        if !self.inner.is_present() {
            return Err(BusError::NoSuchDevice);
        }
        self.inner
            .run_on_worker(move |ctx| ctx.add_device(device, boot))?
    }

    /// 移除节点
    pub fn remove_device(&self, node: &Arc<Node>) -> Result<()> {
        let node = node.clone();
        self.inner.run_on_worker(move |ctx| ctx.remove_device(&node))?
    }

    /// 按单元号卸载非启动设备
    pub fn detach(&self, unit: u32) -> Result<()> {
        let node = self.inner.find_detachable(unit)?;
        self.remove_device(&node)
    }

    /// 挂接文件磁盘，返回单元号
    pub fn attach_file(&self, attach: FileAttach) -> Result<u32> {
        self.inner.run_on_worker(move |ctx| ctx.attach_file(&attach))?
    }

    /// 已链接的节点，按枚举顺序
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.nodes.lock().clone()
    }

    /// 按单元号查找已链接的节点
    pub fn node(&self, unit: u32) -> Option<Arc<Node>> {
        self.inner
            .nodes
            .lock()
            .iter()
            .find(|n| n.unit() == unit)
            .cloned()
    }

    /// 提交总线请求
    ///
    /// 请求被标记为挂起并排入工作队列；总线不存在或正在停止时以 `NoSuchDevice` 完成。
    pub fn submit(&self, mut req: Request) {
        if !self.inner.is_present() {
            req.complete(Err(BusError::NoSuchDevice));
            return;
        }
        req.mark_pending();
        // on failure the item, and with it the request, is dropped: the ticket sees NoSuchDevice
        let item: WorkItem =
            Box::new(move |ctx: &WorkerContext| BUS_HANDLERS.dispatch(ctx, req));
        let _ = self.inner.worker.enqueue(item);
    }

    /// 排入一个工作项，不等待
    pub fn enqueue<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&WorkerContext) + Send + 'static,
    {
        self.inner.worker.enqueue(Box::new(f))
    }

    /// 在工作线程上执行 `f` 并等待结果
    pub fn run_on_worker<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&WorkerContext) -> T + Send + 'static,
    {
        self.inner.run_on_worker(f)
    }

    /// 唤醒工作线程
    pub fn signal(&self) {
        self.inner.worker.signal();
    }

    /// 拆除总线，可重复调用
    pub fn cleanup(&self) {
        let inner = &self.inner;
        let was = {
            let mut state = inner.state.lock();
            let was = *state;
            if matches!(was, BusState::Establishing | BusState::Started) {
                *state = BusState::StopPending;
            }
            was
        };

        if inner.symlink.swap(false, Ordering::AcqRel) {
            inner.host.delete_symbolic_link(&inner.config.dos_name);
        }
        inner.stop.store(true, Ordering::Release);
        inner.worker.stop();

        // the worker is gone, so nothing else touches the list now
        let nodes: Vec<_> = inner.nodes.lock().drain(..).collect();
        for node in nodes {
            node.set_linked(false);
            let handle = {
                let mut device = node.device();
                device.free();
                device.take_handle()
            };
            if let Some(handle) = handle {
                inner.host.delete_handle(handle);
            }
        }

        if let Some(fdo) = inner.fdo.lock().take() {
            inner.host.delete_handle(fdo);
        }
        if matches!(was, BusState::Establishing | BusState::Started) {
            *inner.state.lock() = BusState::Stopped;
            info!("bus {}: stopped", inner.config.name);
        }
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        self.cleanup();
    }
}
