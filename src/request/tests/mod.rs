use crate::request::{DispatchTable, Disposition, Reply, Request, Rule, Ticket};
use crate::sync::SpinLock;
use alloc::vec::Vec;

// 测试辅助 (fixtures)

/// 记录处理函数调用顺序的上下文
#[derive(Default)]
pub struct Trace {
    pub calls: SpinLock<Vec<&'static str>>,
}

impl Trace {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

/// 构造分发表并分发一个请求，返回调用顺序
pub fn run(rules: Vec<Rule<Trace>>, req: (Request, Ticket)) -> (Vec<&'static str>, Reply) {
    let table = DispatchTable::new(rules);
    let trace = Trace::default();
    let (req, ticket) = req;
    table.dispatch(&trace, req);
    (trace.calls(), ticket.wait())
}

pub fn record(trace: &Trace, name: &'static str) -> Disposition {
    trace.calls.lock().push(name);
    Disposition::Continue
}

pub mod dispatch;
