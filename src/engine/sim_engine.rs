//! 仿真引擎
//!
//! `Engine` 把离散事件仿真器与仿真网络组合在一起，对外暴露桥接层
//! 需要的全部原语：节点、设备、信道、属性、TapBridge、移动模型，
//! 以及运行/停止/销毁。

use super::attr::AttrValue;
use super::channel::ChannelKind;
use super::device::DeviceSpec;
use super::error::EngineError;
use super::frame::Frame;
use super::id::{BridgeHandle, ChannelHandle, DeviceHandle, NodeHandle};
use super::mac::MacAddr;
use super::mobility::{MobilityKind, Vector3};
use super::net_world::NetWorld;
use super::stats::Stats;
use super::tap_bridge::{BridgeMode, TapBridgeConfig};
use crate::os::HostOs;
use crate::sim::{SimTime, Simulator};
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub struct Engine {
    sim: Simulator,
    world: NetWorld,
    os: Arc<dyn HostOs>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("epoch", &self.epoch())
            .field("now", &self.sim.now())
            .field("pending", &self.sim.pending())
            .field("nodes", &self.world.net.node_count())
            .field("devices", &self.world.net.device_count())
            .field("bridges", &self.world.net.bridge_count())
            .finish()
    }
}

impl Engine {
    pub fn new(os: Arc<dyn HostOs>) -> Self {
        Self {
            sim: Simulator::default(),
            world: NetWorld::default(),
            os,
        }
    }

    /// 从指定代数开始的新引擎；更早代数的句柄一律视为过期
    pub fn with_epoch(os: Arc<dyn HostOs>, epoch: u32) -> Self {
        Self {
            sim: Simulator::default(),
            world: NetWorld::with_epoch(epoch),
            os,
        }
    }

    /// 当前引擎代数；`destroy()` 后加一
    pub fn epoch(&self) -> u32 {
        self.world.net.epoch()
    }

    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    pub fn is_stopped(&self) -> bool {
        self.sim.is_stopped()
    }

    pub fn stats(&self) -> Stats {
        self.world.net.stats
    }

    pub fn os(&self) -> &Arc<dyn HostOs> {
        &self.os
    }

    // ---------------------------------------------------------------------
    // 对象与属性
    // ---------------------------------------------------------------------

    pub fn create_node(&mut self) -> NodeHandle {
        self.world.net.add_node()
    }

    pub fn has_node(&self, node: NodeHandle) -> bool {
        self.world.net.node(node).is_ok()
    }

    pub fn create_channel(&mut self, kind: ChannelKind) -> ChannelHandle {
        self.world.net.add_channel(kind)
    }

    pub fn set_channel_attribute(
        &mut self,
        channel: ChannelHandle,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), EngineError> {
        self.world
            .net
            .set_channel_attribute(channel, key, value.into())
    }

    /// 在节点上创建设备并接入信道；地址顺序分配
    pub fn create_device(
        &mut self,
        node: NodeHandle,
        channel: ChannelHandle,
        spec: DeviceSpec,
    ) -> Result<DeviceHandle, EngineError> {
        self.world.net.add_device(node, channel, spec)
    }

    pub fn set_device_attribute(
        &mut self,
        device: DeviceHandle,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), EngineError> {
        self.world.net.set_device_attribute(device, key, value.into())
    }

    pub fn device_address(&self, device: DeviceHandle) -> Result<MacAddr, EngineError> {
        Ok(self.world.net.device(device)?.mac)
    }

    pub fn device_node(&self, device: DeviceHandle) -> Result<NodeHandle, EngineError> {
        Ok(self.world.net.device(device)?.node)
    }

    pub fn supports_send_from(&self, device: DeviceHandle) -> Result<bool, EngineError> {
        Ok(self.world.net.device(device)?.supports_send_from())
    }

    /// STA 当前关联的 BSSID；非 STA 设备返回 None
    pub fn wifi_association(&self, device: DeviceHandle) -> Result<Option<MacAddr>, EngineError> {
        let dev = self.world.net.device(device)?;
        Ok(dev.wifi().and_then(|w| match w.role {
            super::wifi::WifiRole::Sta { associated, .. } => associated,
            _ => None,
        }))
    }

    pub fn wifi_channel_number(&self, device: DeviceHandle) -> Result<Option<u8>, EngineError> {
        Ok(self
            .world
            .net
            .device(device)?
            .wifi()
            .map(|w| w.channel_number))
    }

    /// 在节点上添加 TapBridge 并绑定设备
    pub fn add_tap_bridge(
        &mut self,
        node: NodeHandle,
        device: DeviceHandle,
        cfg: TapBridgeConfig,
    ) -> Result<BridgeHandle, EngineError> {
        self.world.net.add_tap_bridge(node, device, cfg)
    }

    pub fn set_bridge_attribute(
        &mut self,
        bridge: BridgeHandle,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), EngineError> {
        self.world.net.set_bridge_attribute(bridge, key, value.into())
    }

    pub fn bridge_mode(&self, bridge: BridgeHandle) -> Result<BridgeMode, EngineError> {
        Ok(self.world.net.bridge(bridge)?.mode)
    }

    pub fn bridge_device_name(&self, bridge: BridgeHandle) -> Result<String, EngineError> {
        Ok(self.world.net.bridge(bridge)?.device_name.clone())
    }

    /// 引擎是否已经打开了该 TapBridge 的 tap
    pub fn bridge_link_up(&self, bridge: BridgeHandle) -> Result<bool, EngineError> {
        Ok(self.world.net.bridge(bridge)?.is_link_up())
    }

    /// 以设备上层的身份发送一帧
    pub fn transmit(&mut self, device: DeviceHandle, frame: Frame) -> Result<(), EngineError> {
        self.world.net.device(device)?;
        self.world.net.transmit(device, frame, &mut self.sim);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 移动模型
    // ---------------------------------------------------------------------

    pub fn install_mobility(
        &mut self,
        node: NodeHandle,
        kind: MobilityKind,
    ) -> Result<(), EngineError> {
        let now = self.sim.now();
        self.world.net.install_mobility(node, kind, now)
    }

    pub fn mobility_kind(&self, node: NodeHandle) -> Result<Option<MobilityKind>, EngineError> {
        Ok(self.world.net.mobility(node)?.map(|m| m.kind))
    }

    pub fn position(&self, node: NodeHandle) -> Result<Vector3, EngineError> {
        let now = self.sim.now();
        self.world
            .net
            .mobility(node)?
            .map(|m| m.position(now))
            .ok_or(EngineError::NoMobility(node))
    }

    pub fn set_position(&mut self, node: NodeHandle, pos: Vector3) -> Result<(), EngineError> {
        let now = self.sim.now();
        self.world.net.mobility_mut(node)?.set_position(pos, now);
        Ok(())
    }

    pub fn velocity(&self, node: NodeHandle) -> Result<Vector3, EngineError> {
        self.world
            .net
            .mobility(node)?
            .ok_or(EngineError::NoMobility(node))?
            .velocity()
            .ok_or(EngineError::NotConstantVelocity(node))
    }

    pub fn set_velocity(&mut self, node: NodeHandle, v: Vector3) -> Result<(), EngineError> {
        let now = self.sim.now();
        if self.world.net.mobility_mut(node)?.set_velocity(v, now) {
            Ok(())
        } else {
            Err(EngineError::NotConstantVelocity(node))
        }
    }

    // ---------------------------------------------------------------------
    // 运行
    // ---------------------------------------------------------------------

    /// 进入运行状态：清除停止标志，AP 开始发 Beacon
    pub fn start(&mut self) {
        self.sim.resume();
        self.world.net.on_start(&mut self.sim);
    }

    /// 在 `now + delay` 调度停止事件
    pub fn schedule_stop(&mut self, delay: SimTime) {
        self.sim.schedule_stop(delay);
    }

    /// 轮询 tap 并运行事件直到 `until`；返回是否已停止
    pub fn pump(&mut self, until: SimTime) -> bool {
        self.world.net.poll_taps(self.os.as_ref(), &mut self.sim);
        self.sim.run_until(until, &mut self.world)
    }

    /// 销毁全部仿真状态；旧句柄随之失效
    #[tracing::instrument(skip(self), fields(epoch = self.epoch()))]
    pub fn destroy(&mut self) {
        let next = self.epoch().wrapping_add(1);
        info!(
            nodes = self.world.net.node_count(),
            bridges = self.world.net.bridge_count(),
            next_epoch = next,
            "🧹 销毁仿真状态"
        );
        self.sim.destroy();
        self.world = NetWorld::with_epoch(next);
    }
}
