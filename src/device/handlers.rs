//! 子设备（磁盘）的请求处理函数

use alloc::sync::Arc;
use alloc::vec;

use lazy_static::lazy_static;
use log::{debug, warn};

use super::{DeviceState, IoMode};
use crate::bus::Node;
use crate::error::BusError;
use crate::request::{
    ControlCode, DispatchTable, Disposition, Information, Major, Params, Request, Rule, pnp,
};

lazy_static! {
    /// 磁盘设备的分发表
    pub(crate) static ref DISK_HANDLERS: DispatchTable<Arc<Node>> = DispatchTable::new(vec![
        Rule::major(Major::Create, succeed),
        Rule::major(Major::Close, succeed),
        Rule::major(Major::Read, read_write),
        Rule::major(Major::Write, read_write),
        Rule::major(Major::Power, succeed),
        Rule::exact(Major::Pnp, pnp::START_DEVICE, start_device),
        Rule::exact(Major::Pnp, pnp::REMOVE_DEVICE, remove_device),
        Rule::exact(Major::Pnp, pnp::QUERY_ID, query_id),
        Rule::exact(Major::Pnp, pnp::QUERY_DEVICE_TEXT, query_device_text),
        Rule::major(Major::DeviceControl, device_control),
    ]);
}

fn succeed(_node: &Arc<Node>, _req: &mut Request) -> Disposition {
    Disposition::Complete(Ok(Information::None))
}

fn read_write(node: &Arc<Node>, req: &mut Request) -> Disposition {
    let &Params::Io {
        start_sector,
        sector_count,
    } = req.params()
    else {
        return Disposition::Complete(Err(BusError::InvalidParameter("missing io parameters")));
    };
    let mode = match req.major() {
        Major::Read => IoMode::Read,
        _ => IoMode::Write,
    };

    let mut device = node.device();
    let result = match device.disk_mut() {
        Some(disk) => disk
            .io(mode, start_sector, sector_count, req.buffer_mut())
            .map(Information::Bytes),
        None => Err(BusError::NoSuchDevice),
    };
    Disposition::Complete(result)
}

fn start_device(node: &Arc<Node>, _req: &mut Request) -> Disposition {
    node.device().set_state(DeviceState::Started);
    debug!("unit {}: started", node.unit());
    Disposition::Complete(Ok(Information::None))
}

fn remove_device(node: &Arc<Node>, _req: &mut Request) -> Disposition {
    if node.is_boot() {
        warn!("unit {}: refusing to remove boot device", node.unit());
        return Disposition::Complete(Err(BusError::InvalidOperation("boot device")));
    }
    // must not hold the device lock here: removal locks it on the worker
    Disposition::Complete(node.remove().map(|()| Information::None))
}

fn query_id(node: &Arc<Node>, req: &mut Request) -> Disposition {
    let &Params::QueryId(query) = req.params() else {
        return Disposition::Complete(Err(BusError::InvalidParameter("missing query type")));
    };
    let device = node.device();
    let result = match device.disk() {
        Some(disk) => disk.pnp_query_id(query).map(Information::Ids),
        None => Err(BusError::NoSuchDevice),
    };
    Disposition::Complete(result)
}

fn query_device_text(node: &Arc<Node>, req: &mut Request) -> Disposition {
    let &Params::QueryDeviceText(query) = req.params() else {
        return Disposition::Complete(Err(BusError::InvalidParameter("missing query type")));
    };
    let device = node.device();
    let result = match device.disk() {
        Some(disk) => disk.pnp_query_device_text(query).map(Information::Text),
        None => Err(BusError::NoSuchDevice),
    };
    Disposition::Complete(result)
}

fn device_control(node: &Arc<Node>, req: &mut Request) -> Disposition {
    let Params::Control(code) = req.params() else {
        return Disposition::Continue;
    };
    let device = node.device();
    let Some(disk) = device.disk() else {
        return Disposition::Complete(Err(BusError::NoSuchDevice));
    };
    match code {
        ControlCode::GetGeometry => {
            Disposition::Complete(Ok(Information::Geometry(disk.geometry())))
        }
        ControlCode::GetUnitNumber => {
            Disposition::Complete(Ok(Information::Unit(u32::from(disk.unit_num()))))
        }
        // unknown codes fall through to the catch-all
        _ => Disposition::Continue,
    }
}
