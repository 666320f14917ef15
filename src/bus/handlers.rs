//! 总线自身的请求处理函数，均在工作线程上运行

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use lazy_static::lazy_static;
use log::{debug, info};

use super::WorkerContext;
use crate::config::PRODUCT_NAME;
use crate::error::BusError;
use crate::request::{
    ControlCode, DeviceTextType, DispatchTable, Disposition, Information, Major, Params,
    RelationType, Request, Rule, pnp,
};

lazy_static! {
    /// 总线的分发表
    pub(crate) static ref BUS_HANDLERS: DispatchTable<WorkerContext> = DispatchTable::new(vec![
        Rule::major(Major::Create, succeed),
        Rule::major(Major::Close, succeed),
        Rule::exact(Major::Pnp, pnp::START_DEVICE, start_device),
        Rule::exact(Major::Pnp, pnp::QUERY_DEVICE_TEXT, query_device_text),
        Rule::exact(Major::Pnp, pnp::QUERY_DEVICE_RELATIONS, query_relations),
        Rule::major(Major::DeviceControl, device_control),
        Rule::major(Major::Power, pass_to_lower),
        Rule::major(Major::SystemControl, pass_to_lower),
    ]);
}

fn succeed(_ctx: &WorkerContext, _req: &mut Request) -> Disposition {
    Disposition::Complete(Ok(Information::None))
}

fn start_device(ctx: &WorkerContext, _req: &mut Request) -> Disposition {
    info!("bus {}: start device", ctx.config().name);
    Disposition::Complete(Ok(Information::None))
}

fn query_device_text(_ctx: &WorkerContext, req: &mut Request) -> Disposition {
    let result = match req.params() {
        Params::QueryDeviceText(DeviceTextType::Description) => {
            Ok(Information::Text(format!("{} Bus", PRODUCT_NAME)))
        }
        _ => Err(BusError::NotSupported),
    };
    Disposition::Complete(result)
}

fn query_relations(ctx: &WorkerContext, req: &mut Request) -> Disposition {
    match req.params() {
        Params::QueryRelations(RelationType::Bus) => {
            let handles: Vec<_> = ctx.nodes().iter().filter_map(|n| n.handle()).collect();
            debug!("bus: reporting {} child(ren)", handles.len());
            Disposition::Complete(Ok(Information::Handles(handles)))
        }
        _ => Disposition::Continue,
    }
}

fn device_control(ctx: &WorkerContext, req: &mut Request) -> Disposition {
    let result = match req.params() {
        Params::Control(ControlCode::AttachFile(attach)) => {
            ctx.attach_file(attach).map(Information::Unit)
        }
        Params::Control(ControlCode::Detach(unit)) => {
            ctx.detach(*unit).map(|()| Information::None)
        }
        _ => Err(BusError::NotSupported),
    };
    Disposition::Complete(result)
}

fn pass_to_lower(ctx: &WorkerContext, req: &mut Request) -> Disposition {
    let result = match ctx.lower() {
        Some(lower) => ctx
            .host()
            .pass_to_lower(lower, req.major(), req.minor())
            .map(|()| Information::None),
        None => Err(BusError::NoSuchDevice),
    };
    Disposition::Complete(result)
}
