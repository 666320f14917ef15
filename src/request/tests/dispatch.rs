use super::*;
use crate::error::BusError;
use crate::request::{Information, Major, pnp};

fn exact(t: &Trace, _r: &mut Request) -> Disposition {
    record(t, "exact")
}

fn major_only(t: &Trace, _r: &mut Request) -> Disposition {
    record(t, "major")
}

fn minor_only(t: &Trace, _r: &mut Request) -> Disposition {
    record(t, "minor")
}

fn finish(t: &Trace, _r: &mut Request) -> Disposition {
    t.calls.lock().push("finish");
    Disposition::Complete(Ok(Information::None))
}

// 通配规则先于精确规则给出时，仍按特异性排序
#[test]
fn test_precedence_most_specific_first() {
    let rules = alloc::vec![
        Rule::minor(pnp::QUERY_ID, minor_only),
        Rule::major(Major::Pnp, major_only),
        Rule::exact(Major::Pnp, pnp::QUERY_ID, exact),
    ];
    let (calls, reply) = run(rules, Request::pnp(pnp::QUERY_ID));
    assert_eq!(calls, ["exact", "major", "minor"]);
    // 全部 Continue，落到表尾
    assert_eq!(reply.result, Err(BusError::NotSupported));
}

#[test]
fn test_complete_stops_chain() {
    let rules = alloc::vec![
        Rule::major(Major::Pnp, finish),
        Rule::exact(Major::Pnp, pnp::START_DEVICE, exact),
        Rule::minor(pnp::START_DEVICE, minor_only),
    ];
    let (calls, reply) = run(rules, Request::pnp(pnp::START_DEVICE));
    assert_eq!(calls, ["exact", "finish"]);
    assert_eq!(reply.result, Ok(Information::None));
}

#[test]
fn test_non_matching_rules_are_skipped() {
    let rules = alloc::vec![
        Rule::exact(Major::Pnp, pnp::QUERY_ID, exact),
        Rule::major(Major::Read, major_only),
    ];
    let (calls, reply) = run(rules, Request::pnp(pnp::REMOVE_DEVICE));
    assert!(calls.is_empty());
    assert_eq!(reply.result, Err(BusError::NotSupported));
    assert_eq!(reply.bytes(), 0);
}

#[test]
fn test_user_catch_all_runs_before_trailing_rule() {
    let rules = alloc::vec![Rule::catch_all(finish), Rule::major(Major::Close, major_only)];
    let table = DispatchTable::new(rules);
    assert_eq!(table.len(), 3);

    let trace = Trace::default();
    let (req, ticket) = Request::close();
    table.dispatch(&trace, req);
    assert_eq!(trace.calls(), ["major", "finish"]);
    assert!(ticket.wait().is_ok());
}
