//! 进程内宿主
//!
//! 记录所有句柄、符号名称和设备栈关系，并支持对下一次指定操作注入失败。

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::{HashMap, HashSet};
use log::{debug, warn};

use super::{Handle, HandleKind, Host};
use crate::error::{BusError, Result};
use crate::request::Major;
use crate::sync::SpinLock;

/// 可注入失败的宿主操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    /// 创建总线服务句柄
    CreateServicingHandle,
    /// 创建符号名称
    CreateSymbolicLink,
    /// 创建根枚举句柄
    CreateEnumerationHandle,
    /// 创建子设备句柄
    CreateDeviceHandle,
    /// 挂接到设备栈
    AttachToDeviceStack,
    /// 向下层转发请求
    PassToLower,
}

#[derive(Default)]
struct Registry {
    handles: HashMap<Handle, HandleKind>,
    links: HashMap<String, String>,
    /// this -> lower
    stacks: HashMap<Handle, Handle>,
    passed: Vec<(Handle, Major, u8)>,
    armed: HashSet<HostOp>,
}

impl Registry {
    fn take_failure(&mut self, op: HostOp) -> bool {
        self.armed.remove(&op)
    }
}

/// 进程内宿主实现
pub struct LoopbackHost {
    next_id: AtomicU64,
    registry: SpinLock<Registry>,
}

impl LoopbackHost {
    /// 创建空的宿主
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            registry: SpinLock::new(Registry::default()),
        }
    }

    /// 让下一次 `op` 失败
    pub fn fail_next(&self, op: HostOp) {
        self.registry.lock().armed.insert(op);
    }

    /// 某种类仍存活的句柄数
    pub fn live_handles(&self, kind: HandleKind) -> usize {
        self.registry
            .lock()
            .handles
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    /// 句柄的类别，已删除的句柄返回 `None`
    pub fn handle_kind(&self, handle: Handle) -> Option<HandleKind> {
        self.registry.lock().handles.get(&handle).copied()
    }

    /// 符号名称是否存在
    pub fn has_link(&self, link: &str) -> bool {
        self.registry.lock().links.contains_key(link)
    }

    /// `this` 当前挂接的下层句柄
    pub fn lower_of(&self, this: Handle) -> Option<Handle> {
        self.registry.lock().stacks.get(&this).copied()
    }

    /// 已转交给下层的请求
    pub fn passed_requests(&self) -> Vec<(Handle, Major, u8)> {
        self.registry.lock().passed.clone()
    }

    fn allocate(&self, kind: HandleKind) -> Handle {
        let handle = Handle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry.lock().handles.insert(handle, kind);
        debug!("host: created {:?} handle {:?}", kind, handle);
        handle
    }

    fn create(&self, op: HostOp, kind: HandleKind) -> Result<Handle> {
        if self.registry.lock().take_failure(op) {
            warn!("host: injected failure for {:?}", op);
            return Err(BusError::ResourceExhausted);
        }
        Ok(self.allocate(kind))
    }
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LoopbackHost {
    fn create_servicing_handle(&self, name: &str) -> Result<Handle> {
        debug!("host: servicing handle for {}", name);
        self.create(HostOp::CreateServicingHandle, HandleKind::Servicing)
    }

    fn delete_handle(&self, handle: Handle) {
        let mut reg = self.registry.lock();
        if reg.handles.remove(&handle).is_none() {
            warn!("host: delete of unknown handle {:?}", handle);
        }
        reg.stacks.remove(&handle);
    }

    fn create_symbolic_link(&self, link: &str, target: &str) -> Result<()> {
        let mut reg = self.registry.lock();
        if reg.take_failure(HostOp::CreateSymbolicLink) {
            return Err(BusError::ResourceExhausted);
        }
        if reg.links.contains_key(link) {
            return Err(BusError::AlreadyExists);
        }
        reg.links.insert(String::from(link), String::from(target));
        Ok(())
    }

    fn delete_symbolic_link(&self, link: &str) {
        if self.registry.lock().links.remove(link).is_none() {
            warn!("host: delete of unknown link {}", link);
        }
    }

    fn create_enumeration_handle(&self) -> Result<Handle> {
        self.create(HostOp::CreateEnumerationHandle, HandleKind::Enumeration)
    }

    fn create_device_handle(&self, kind: &str) -> Result<Handle> {
        debug!("host: device handle for {}", kind);
        self.create(HostOp::CreateDeviceHandle, HandleKind::Device)
    }

    fn attach_to_device_stack(&self, this: Handle, parent: Handle) -> Result<Handle> {
        let mut reg = self.registry.lock();
        if reg.take_failure(HostOp::AttachToDeviceStack) {
            return Err(BusError::NoSuchDevice);
        }
        if !reg.handles.contains_key(&this) || !reg.handles.contains_key(&parent) {
            return Err(BusError::NoSuchDevice);
        }
        // the lower device is the current top of the parent's stack
        let mut lower = parent;
        while let Some((above, _)) = reg.stacks.iter().find(|(_, l)| **l == lower) {
            lower = *above;
        }
        reg.stacks.insert(this, lower);
        Ok(lower)
    }

    fn detach_from_device_stack(&self, lower: Handle) {
        self.registry.lock().stacks.retain(|_, l| *l != lower);
    }

    fn pass_to_lower(&self, lower: Handle, major: Major, minor: u8) -> Result<()> {
        let mut reg = self.registry.lock();
        if reg.take_failure(HostOp::PassToLower) || !reg.handles.contains_key(&lower) {
            return Err(BusError::NoSuchDevice);
        }
        reg.passed.push((lower, major, minor));
        Ok(())
    }
}
