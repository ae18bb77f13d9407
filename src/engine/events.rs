//! 引擎事件
//!
//! `DeviceReady`：设备完成一次发送，尝试发送队列中的下一帧；
//! `DeliverFrame`：帧到达接收设备；`Beacon`：AP 周期广播。

use super::frame::Frame;
use super::id::DeviceHandle;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};
use tracing::{error, trace};

fn net_world(world: &mut dyn World) -> Option<&mut NetWorld> {
    let w = world.as_any_mut().downcast_mut::<NetWorld>();
    if w.is_none() {
        error!("world is not a NetWorld, dropping engine event");
    }
    w
}

/// 事件：设备序列化发送完成
#[derive(Debug)]
pub struct DeviceReady {
    pub device: DeviceHandle,
}

impl Event for DeviceReady {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeviceReady { device } = *self;
        if let Some(w) = net_world(world) {
            w.net.on_device_ready(device, sim);
        }
    }
}

/// 事件：把一帧交给接收设备
#[derive(Debug)]
pub struct DeliverFrame {
    pub to: DeviceHandle,
    pub frame: Frame,
}

impl Event for DeliverFrame {
    #[tracing::instrument(level = "trace", skip(self, sim, world), fields(to = ?self.to, len = self.frame.len()))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverFrame { to, frame } = *self;
        trace!(now = %sim.now(), dst = %frame.dst(), src = %frame.src(), "帧到达设备");
        if let Some(w) = net_world(world) {
            w.net.deliver(to, frame);
        }
    }
}

/// 事件：AP 发送 Beacon，并调度下一次
#[derive(Debug)]
pub struct Beacon {
    pub ap: DeviceHandle,
}

impl Event for Beacon {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Beacon { ap } = *self;
        if let Some(w) = net_world(world) {
            w.net.on_beacon(ap, sim);
        }
    }
}
