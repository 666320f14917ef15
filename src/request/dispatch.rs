//! 分发表
//!
//! 每条规则按 `(major, minor)` 匹配请求，两者都可以是通配。
//! 构建时按特异性稳定排序：
//!
//! 1. major 与 minor 都精确
//! 2. 仅 major 精确
//! 3. 仅 minor 精确
//! 4. 全通配
//!
//! 分发时按表序依次调用匹配的处理函数，直到某个处理函数完成请求。
//! 表尾总有一条全通配规则，以 `NotSupported` 完成请求。

use alloc::vec::Vec;

use log::trace;

use super::{Information, Major, Request};
use crate::error::{BusError, Result};

/// 处理函数的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 以此结果完成请求
    Complete(Result<Information>),
    /// 交给下一条匹配的规则
    Continue,
}

/// 处理函数
pub type Handler<C> = fn(&C, &mut Request) -> Disposition;

/// 一条分发规则
pub struct Rule<C> {
    major: Major,
    minor: u8,
    any_major: bool,
    any_minor: bool,
    handler: Handler<C>,
}

impl<C> Rule<C> {
    /// 精确匹配 major 与 minor
    pub const fn exact(major: Major, minor: u8, handler: Handler<C>) -> Self {
        Self {
            major,
            minor,
            any_major: false,
            any_minor: false,
            handler,
        }
    }

    /// 匹配 major 下的所有 minor
    pub const fn major(major: Major, handler: Handler<C>) -> Self {
        Self {
            major,
            minor: 0,
            any_major: false,
            any_minor: true,
            handler,
        }
    }

    /// 匹配任意 major 下的某个 minor
    pub const fn minor(minor: u8, handler: Handler<C>) -> Self {
        Self {
            major: Major::Create,
            minor,
            any_major: true,
            any_minor: false,
            handler,
        }
    }

    /// 匹配所有请求
    pub const fn catch_all(handler: Handler<C>) -> Self {
        Self {
            major: Major::Create,
            minor: 0,
            any_major: true,
            any_minor: true,
            handler,
        }
    }

    fn matches(&self, major: Major, minor: u8) -> bool {
        (self.any_major || self.major == major) && (self.any_minor || self.minor == minor)
    }

    fn rank(&self) -> u8 {
        match (self.any_major, self.any_minor) {
            (false, false) => 0,
            (false, true) => 1,
            (true, false) => 2,
            (true, true) => 3,
        }
    }
}

fn not_supported<C>(_ctx: &C, _req: &mut Request) -> Disposition {
    Disposition::Complete(Err(BusError::NotSupported))
}

/// 不可变的分发表
pub struct DispatchTable<C> {
    rules: Vec<Rule<C>>,
}

impl<C> DispatchTable<C> {
    /// 按特异性排序规则；同一特异性保持给定顺序
    pub fn new(mut rules: Vec<Rule<C>>) -> Self {
        rules.sort_by_key(Rule::rank);
        rules.push(Rule::catch_all(not_supported::<C>));
        Self { rules }
    }

    /// 规则数（含表尾的全通配规则）
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 是否没有任何规则
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 分发请求，请求在返回前一定已完成
    pub fn dispatch(&self, ctx: &C, mut req: Request) {
        let (major, minor) = (req.major(), req.minor());
        for rule in self.rules.iter().filter(|r| r.matches(major, minor)) {
            if let Disposition::Complete(result) = (rule.handler)(ctx, &mut req) {
                trace!("dispatch {:?}/{:#04x}: {:?}", major, minor, result);
                req.complete(result);
                return;
            }
        }
        // unreachable while the trailing catch-all completes
        req.complete(Err(BusError::NotSupported));
    }
}
