//! 仿真网络
//!
//! 持有节点、信道、设备与 TapBridge，实现帧的发送、排队、交付，
//! 以及 tap 侧的读写。所有对象都按下标存放，句柄带引擎代数校验。

use super::attr::AttrValue;
use super::channel::{Channel, ChannelKind};
use super::device::{DeviceModel, DeviceSpec, NetDevice};
use super::error::EngineError;
use super::events::{Beacon, DeliverFrame, DeviceReady};
use super::frame::Frame;
use super::id::{BridgeHandle, ChannelHandle, DeviceHandle, NodeHandle};
use super::mac::{MacAddr, MacAllocator};
use super::mobility::{Mobility, MobilityKind, Vector3};
use super::stats::Stats;
use super::tap_bridge::{BridgeMode, TapBridge, TapBridgeConfig};
use super::wifi::{WifiRole, roles_pair};
use crate::os::HostOs;
use crate::queue::FrameQueue;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, info, trace, warn};

/// 光速（m/s），用于无线传播时延
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// 每次轮询单个 tap 最多读入的帧数
const MAX_FRAMES_PER_POLL: usize = 256;

#[derive(Debug, Default)]
pub(crate) struct SimNode {
    pub devices: Vec<DeviceHandle>,
    pub bridges: Vec<BridgeHandle>,
    pub mobility: Option<Mobility>,
}

/// 仿真网络
#[derive(Debug, Default)]
pub struct Network {
    epoch: u32,
    nodes: Vec<SimNode>,
    channels: Vec<Channel>,
    devices: Vec<NetDevice>,
    bridges: Vec<TapBridge>,
    macs: MacAllocator,
    started: bool,
    pub stats: Stats,
}

impl Network {
    pub(crate) fn new(epoch: u32) -> Self {
        Self {
            epoch,
            ..Default::default()
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    fn check_epoch(&self, epoch: u32) -> Result<(), EngineError> {
        if epoch != self.epoch {
            return Err(EngineError::StaleHandle {
                found: epoch,
                current: self.epoch,
            });
        }
        Ok(())
    }

    pub(crate) fn node(&self, h: NodeHandle) -> Result<&SimNode, EngineError> {
        self.check_epoch(h.epoch)?;
        self.nodes.get(h.index).ok_or(EngineError::UnknownNode(h))
    }

    fn node_mut(&mut self, h: NodeHandle) -> Result<&mut SimNode, EngineError> {
        self.check_epoch(h.epoch)?;
        self.nodes.get_mut(h.index).ok_or(EngineError::UnknownNode(h))
    }

    pub(crate) fn device(&self, h: DeviceHandle) -> Result<&NetDevice, EngineError> {
        self.check_epoch(h.epoch)?;
        self.devices.get(h.index).ok_or(EngineError::UnknownDevice(h))
    }

    fn device_mut(&mut self, h: DeviceHandle) -> Result<&mut NetDevice, EngineError> {
        self.check_epoch(h.epoch)?;
        self.devices
            .get_mut(h.index)
            .ok_or(EngineError::UnknownDevice(h))
    }

    fn channel(&self, h: ChannelHandle) -> Result<&Channel, EngineError> {
        self.check_epoch(h.epoch)?;
        self.channels.get(h.index).ok_or(EngineError::UnknownChannel(h))
    }

    fn channel_mut(&mut self, h: ChannelHandle) -> Result<&mut Channel, EngineError> {
        self.check_epoch(h.epoch)?;
        self.channels
            .get_mut(h.index)
            .ok_or(EngineError::UnknownChannel(h))
    }

    pub(crate) fn bridge(&self, h: BridgeHandle) -> Result<&TapBridge, EngineError> {
        self.check_epoch(h.epoch)?;
        self.bridges.get(h.index).ok_or(EngineError::UnknownBridge(h))
    }

    fn bridge_mut(&mut self, h: BridgeHandle) -> Result<&mut TapBridge, EngineError> {
        self.check_epoch(h.epoch)?;
        self.bridges
            .get_mut(h.index)
            .ok_or(EngineError::UnknownBridge(h))
    }

    // ---------------------------------------------------------------------
    // 拓扑构建
    // ---------------------------------------------------------------------

    pub(crate) fn add_node(&mut self) -> NodeHandle {
        let h = NodeHandle::new(self.epoch, self.nodes.len());
        self.nodes.push(SimNode::default());
        debug!(node = ?h, "创建仿真节点");
        h
    }

    pub(crate) fn add_channel(&mut self, kind: ChannelKind) -> ChannelHandle {
        let h = ChannelHandle::new(self.epoch, self.channels.len());
        debug!(channel = ?h, kind = kind.name(), "创建信道");
        self.channels.push(Channel::new(kind));
        h
    }

    pub(crate) fn add_device(
        &mut self,
        node: NodeHandle,
        channel: ChannelHandle,
        spec: DeviceSpec,
    ) -> Result<DeviceHandle, EngineError> {
        self.node(node)?;
        let ch_kind = self.channel(channel)?.kind;
        let compatible = matches!(
            (&spec, &ch_kind),
            (DeviceSpec::Simple, ChannelKind::Simple)
                | (DeviceSpec::Csma { .. }, ChannelKind::Csma(_))
                | (DeviceSpec::Wifi(_), ChannelKind::Wifi(_))
        );
        if !compatible {
            return Err(EngineError::ChannelMismatch {
                device: spec.name(),
                channel: ch_kind.name(),
            });
        }

        let h = DeviceHandle::new(self.epoch, self.devices.len());
        let mac = self.macs.allocate();
        debug!(device = ?h, node = ?node, channel = ?channel, %mac, kind = spec.name(), "创建仿真设备");
        self.devices.push(NetDevice::new(node, channel, mac, spec));
        self.node_mut(node)?.devices.push(h);
        self.channel_mut(channel)?.devices.push(h);
        Ok(h)
    }

    pub(crate) fn set_channel_attribute(
        &mut self,
        h: ChannelHandle,
        key: &str,
        value: AttrValue,
    ) -> Result<(), EngineError> {
        let ch = self.channel_mut(h)?;
        let target = ch.kind.name();
        match (&mut ch.kind, key) {
            (ChannelKind::Csma(p), "DataRate") => p.data_rate = Some(value.into_data_rate(key)?),
            (ChannelKind::Csma(p), "Delay") => p.delay = value.into_time(key)?,
            _ => {
                return Err(EngineError::UnknownAttribute {
                    target,
                    key: key.to_string(),
                });
            }
        }
        debug!(channel = ?h, key, "设置信道属性");
        Ok(())
    }

    pub(crate) fn set_device_attribute(
        &mut self,
        h: DeviceHandle,
        key: &str,
        value: AttrValue,
    ) -> Result<(), EngineError> {
        let dev = self.device_mut(h)?;
        let target = dev.model_name();
        let unknown = || EngineError::UnknownAttribute {
            target,
            key: key.to_string(),
        };

        if key == "Address" {
            dev.mac = value.into_mac(key)?;
            debug!(device = ?h, mac = %dev.mac, "设置设备地址");
            return Ok(());
        }

        let DeviceModel::Wifi(w) = &mut dev.model else {
            return Err(unknown());
        };
        match key {
            "ChannelNumber" => {
                let n = value.into_uint(key)?;
                if !(1..=u8::MAX as u64).contains(&n) {
                    return Err(EngineError::InvalidAttribute {
                        key: key.to_string(),
                        reason: format!("channel number {n} out of range"),
                    });
                }
                w.channel_number = n as u8;
            }
            "Ssid" => {
                let new = value.into_ssid(key)?;
                match &mut w.role {
                    WifiRole::Ap { ssid, .. } | WifiRole::Sta { ssid, .. } => *ssid = new,
                    _ => return Err(unknown()),
                }
            }
            "ScanType" => match &mut w.role {
                WifiRole::Sta { scan, .. } => *scan = value.into_scan_type(key)?,
                _ => return Err(unknown()),
            },
            "MaxScanningChannelNumber" => match &mut w.role {
                WifiRole::Sta {
                    max_scan_channel, ..
                } => {
                    let n = value.into_uint(key)?;
                    *max_scan_channel = n.min(u8::MAX as u64) as u8;
                }
                _ => return Err(unknown()),
            },
            "BeaconInterval" => match &mut w.role {
                WifiRole::Ap {
                    beacon_interval, ..
                } => {
                    let t = value.into_time(key)?;
                    if t == SimTime::ZERO {
                        return Err(EngineError::InvalidAttribute {
                            key: key.to_string(),
                            reason: "beacon interval must be positive".to_string(),
                        });
                    }
                    *beacon_interval = t;
                }
                _ => return Err(unknown()),
            },
            "ReceiverAddress" => match &mut w.role {
                WifiRole::Wds { receiver } => *receiver = Some(value.into_mac(key)?),
                _ => return Err(unknown()),
            },
            _ => return Err(unknown()),
        }
        debug!(device = ?h, key, "设置设备属性");
        Ok(())
    }

    pub(crate) fn add_tap_bridge(
        &mut self,
        node: NodeHandle,
        device: DeviceHandle,
        cfg: TapBridgeConfig,
    ) -> Result<BridgeHandle, EngineError> {
        self.node(node)?;
        let dev = self.device(device)?;
        if dev.node != node {
            return Err(EngineError::DeviceNotOnNode {
                device,
                owner: dev.node,
                node,
            });
        }
        if dev.bridge.is_some() {
            return Err(EngineError::DeviceAlreadyBridged(device));
        }
        if cfg.mode == BridgeMode::UseBridge && !dev.supports_send_from() {
            return Err(EngineError::SendFromUnsupported(device));
        }

        let h = BridgeHandle::new(self.epoch, self.bridges.len());
        info!(bridge = ?h, device = ?device, mode = %cfg.mode, device_name = %cfg.device_name, "🌉 添加 TapBridge");
        self.bridges.push(TapBridge::new(node, device, cfg));
        self.device_mut(device)?.bridge = Some(h);
        self.node_mut(node)?.bridges.push(h);
        Ok(h)
    }

    pub(crate) fn set_bridge_attribute(
        &mut self,
        h: BridgeHandle,
        key: &str,
        value: AttrValue,
    ) -> Result<(), EngineError> {
        match key {
            "DeviceName" => {
                let name = value.into_str(key)?;
                let b = self.bridge_mut(h)?;
                if b.is_link_up() {
                    return Err(EngineError::InvalidAttribute {
                        key: key.to_string(),
                        reason: "tap is already open".to_string(),
                    });
                }
                debug!(bridge = ?h, old = %b.device_name, new = %name, "更新 DeviceName");
                b.device_name = name;
            }
            "Mode" => {
                let mode = value.into_mode(key)?;
                let device = self.bridge(h)?.device;
                if mode == BridgeMode::UseBridge && !self.device(device)?.supports_send_from() {
                    return Err(EngineError::SendFromUnsupported(device));
                }
                self.bridge_mut(h)?.mode = mode;
            }
            _ => {
                return Err(EngineError::UnknownAttribute {
                    target: "tap bridge",
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 移动模型
    // ---------------------------------------------------------------------

    pub(crate) fn install_mobility(
        &mut self,
        node: NodeHandle,
        kind: MobilityKind,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let n = self.node_mut(node)?;
        // 保留原位置
        let pos = n.mobility.as_ref().map(|m| m.position(now));
        let mut m = Mobility::new(kind, now);
        if let Some(p) = pos {
            m.set_position(p, now);
        }
        n.mobility = Some(m);
        debug!(node = ?node, %kind, "安装移动模型");
        Ok(())
    }

    pub(crate) fn mobility(&self, node: NodeHandle) -> Result<Option<&Mobility>, EngineError> {
        Ok(self.node(node)?.mobility.as_ref())
    }

    pub(crate) fn mobility_mut(&mut self, node: NodeHandle) -> Result<&mut Mobility, EngineError> {
        self.node_mut(node)?
            .mobility
            .as_mut()
            .ok_or(EngineError::NoMobility(node))
    }

    /// 节点位置；没有移动模型的节点视为在原点
    fn node_position(&self, node: NodeHandle, now: SimTime) -> Vector3 {
        self.nodes
            .get(node.index)
            .and_then(|n| n.mobility.as_ref())
            .map(|m| m.position(now))
            .unwrap_or(Vector3::ZERO)
    }

    // ---------------------------------------------------------------------
    // 运行期
    // ---------------------------------------------------------------------

    /// 仿真开始：为尚未发 Beacon 的 AP 调度第一次 Beacon
    pub(crate) fn on_start(&mut self, sim: &mut Simulator) {
        self.started = true;
        for (i, dev) in self.devices.iter_mut().enumerate() {
            let Some(w) = dev.wifi_mut() else {
                continue;
            };
            if matches!(w.role, WifiRole::Ap { .. }) && !w.beaconing {
                w.beaconing = true;
                sim.schedule(
                    sim.now(),
                    Beacon {
                        ap: DeviceHandle::new(self.epoch, i),
                    },
                );
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 打开尚未连接的 tap，并读入已连接 tap 上的帧
    pub(crate) fn poll_taps(&mut self, os: &dyn HostOs, sim: &mut Simulator) {
        for i in 0..self.bridges.len() {
            let b = &mut self.bridges[i];
            if b.port.is_none() {
                match os.open_tap(&b.device_name) {
                    Ok(port) => {
                        info!(device_name = %b.device_name, now = %sim.now(), "🔌 TapBridge 已打开 tap");
                        b.port = Some(port);
                    }
                    Err(e) => {
                        b.open_failures += 1;
                        if b.open_failures == 1 {
                            warn!(device_name = %b.device_name, error = %e, "打开 tap 失败，稍后重试");
                        }
                        continue;
                    }
                }
            }

            let mut frames = Vec::new();
            if let Some(port) = b.port.as_mut() {
                while frames.len() < MAX_FRAMES_PER_POLL {
                    match port.try_recv() {
                        Some(f) => frames.push(f),
                        None => break,
                    }
                }
            }
            let handle = BridgeHandle::new(self.epoch, i);
            for data in frames {
                self.bridge_ingress(handle, data, sim);
            }
        }
    }

    /// tap → 仿真设备
    fn bridge_ingress(&mut self, h: BridgeHandle, data: Vec<u8>, sim: &mut Simulator) {
        self.stats.frames_from_taps += 1;
        self.stats.bytes_from_taps += data.len() as u64;
        let mut frame = Frame::new(data);
        if !frame.is_valid() {
            self.stats.malformed_frames += 1;
            return;
        }

        let b = &mut self.bridges[h.index];
        let device = b.device;
        if b.mode == BridgeMode::UseLocal {
            let src = frame.src();
            if b.tap_mac != Some(src) {
                debug!(device_name = %b.device_name, tap_mac = %src, "学习到 tap 地址");
                b.tap_mac = Some(src);
            }
            frame.set_src(self.devices[device.index].mac);
        }
        self.transmit(device, frame, sim);
    }

    /// 仿真设备 → tap
    fn bridge_egress(&mut self, h: BridgeHandle, device_mac: MacAddr, mut frame: Frame) {
        let b = &mut self.bridges[h.index];
        if !b.accepts(frame.dst(), device_mac) {
            self.stats.filtered_frames += 1;
            return;
        }
        if b.mode == BridgeMode::UseLocal && frame.dst() == device_mac {
            if let Some(tap_mac) = b.tap_mac {
                frame.set_dst(tap_mac);
            }
        }
        let Some(port) = b.port.as_mut() else {
            self.stats.tap_errors += 1;
            return;
        };
        match port.send(frame.as_bytes()) {
            Ok(()) => {
                self.stats.frames_to_taps += 1;
                self.stats.bytes_to_taps += frame.len() as u64;
            }
            Err(e) => {
                self.stats.tap_errors += 1;
                debug!(device_name = %b.device_name, error = %e, "写 tap 失败");
            }
        }
    }

    /// 上层把一帧交给设备发送
    pub(crate) fn transmit(&mut self, h: DeviceHandle, frame: Frame, sim: &mut Simulator) {
        let Some(dev) = self.devices.get_mut(h.index) else {
            return;
        };
        if let DeviceModel::Simple = dev.model {
            let channel = dev.channel;
            for &peer in &self.channels[channel.index].devices {
                if peer != h {
                    sim.schedule(
                        sim.now(),
                        DeliverFrame {
                            to: peer,
                            frame: frame.clone(),
                        },
                    );
                }
            }
            return;
        }

        if let Err(dropped) = dev.queue.enqueue(frame) {
            self.stats.dropped_frames += 1;
            debug!(device = ?h, len = dropped.len(), "设备队列已满，丢弃");
            return;
        }
        if !dev.tx_busy {
            self.start_tx(h, sim);
        }
    }

    pub(crate) fn on_device_ready(&mut self, h: DeviceHandle, sim: &mut Simulator) {
        let Some(dev) = self.devices.get_mut(h.index) else {
            return;
        };
        dev.tx_busy = false;
        if !dev.queue.is_empty() {
            self.start_tx(h, sim);
        }
    }

    fn start_tx(&mut self, h: DeviceHandle, sim: &mut Simulator) {
        let dev = &mut self.devices[h.index];
        let Some(frame) = dev.queue.dequeue() else {
            dev.tx_busy = false;
            return;
        };
        if matches!(dev.model, DeviceModel::Wifi(_)) {
            self.wifi_tx(h, frame, sim);
        } else {
            self.csma_tx(h, frame, sim);
        }
    }

    /// CSMA：start = max(now, busy_until)，接收方在 start + tx + delay 收到
    fn csma_tx(&mut self, h: DeviceHandle, frame: Frame, sim: &mut Simulator) {
        let channel = self.devices[h.index].channel;
        let ch = &mut self.channels[channel.index];
        let ChannelKind::Csma(params) = ch.kind else {
            return;
        };
        let now = sim.now();
        let start = now.max(ch.busy_until);
        let tx = params
            .data_rate
            .map(|r| r.tx_time(frame.len()))
            .unwrap_or(SimTime::ZERO);
        let end = start.saturating_add(tx);
        let arrive = end.saturating_add(params.delay);
        ch.busy_until = arrive;

        trace!(device = ?h, start = %start, end = %end, arrive = %arrive, len = frame.len(), "CSMA 发送");
        self.devices[h.index].tx_busy = true;
        sim.schedule(end, DeviceReady { device: h });
        for &peer in &ch.devices {
            if peer != h {
                sim.schedule(
                    arrive,
                    DeliverFrame {
                        to: peer,
                        frame: frame.clone(),
                    },
                );
            }
        }
    }

    /// Wi-Fi：同信道号共享介质，接收受角色配对与距离限制
    fn wifi_tx(&mut self, h: DeviceHandle, frame: Frame, sim: &mut Simulator) {
        let now = sim.now();
        let dev = &self.devices[h.index];
        let channel = dev.channel;
        let ChannelKind::Wifi(params) = self.channels[channel.index].kind else {
            return;
        };
        let Some(tx_mac) = dev.wifi() else {
            return;
        };
        let channel_number = tx_mac.channel_number;
        let tx_pos = self.node_position(dev.node, now);

        let mut receivers: Vec<(DeviceHandle, f64, MacAddr)> = Vec::new();
        for &peer in &self.channels[channel.index].devices {
            if peer == h {
                continue;
            }
            let rx = &self.devices[peer.index];
            let Some(rx_mac) = rx.wifi() else {
                continue;
            };
            if rx_mac.channel_number != channel_number {
                continue;
            }
            if !roles_pair(&tx_mac.role, dev.mac, &rx_mac.role, rx.mac) {
                continue;
            }
            let d = tx_pos.distance(&self.node_position(rx.node, now));
            if d > params.range_m {
                continue;
            }
            receivers.push((peer, d, rx.mac));
        }

        let dst = frame.dst();
        let rate = if dst.is_group() {
            params.standard.basic_rate()
        } else {
            let d = receivers
                .iter()
                .find(|(_, _, mac)| *mac == dst)
                .map(|(_, d, _)| *d)
                .or_else(|| receivers.iter().map(|(_, d, _)| *d).reduce(f64::max))
                .unwrap_or(params.range_m);
            tx_mac
                .station_manager
                .rate(params.standard, d, params.range_m)
        };

        let ch = &mut self.channels[channel.index];
        let busy = ch
            .radio_busy
            .get(&channel_number)
            .copied()
            .unwrap_or(SimTime::ZERO);
        let start = now.max(busy);
        let end = start.saturating_add(rate.tx_time(frame.len()));
        ch.radio_busy.insert(channel_number, end);

        trace!(device = ?h, %rate, start = %start, end = %end, receivers = receivers.len(), "Wi-Fi 发送");
        self.devices[h.index].tx_busy = true;
        sim.schedule(end, DeviceReady { device: h });
        for (peer, d, _) in receivers {
            let prop = SimTime::from_nanos((d / SPEED_OF_LIGHT * 1e9).round() as u64);
            sim.schedule(
                end.saturating_add(prop),
                DeliverFrame {
                    to: peer,
                    frame: frame.clone(),
                },
            );
        }
    }

    /// 帧到达设备：地址过滤后交给 TapBridge
    pub(crate) fn deliver(&mut self, to: DeviceHandle, frame: Frame) {
        let Some(dev) = self.devices.get(to.index) else {
            return;
        };
        if !dev.accepts(frame.dst()) {
            self.stats.filtered_frames += 1;
            return;
        }
        self.stats.delivered_frames += 1;
        let mac = dev.mac;
        match dev.bridge {
            Some(b) => self.bridge_egress(b, mac, frame),
            None => trace!(device = ?to, "设备没有上层，帧被丢弃"),
        }
    }

    /// AP 发 Beacon：处理范围内 STA 的关联与解除关联
    pub(crate) fn on_beacon(&mut self, ap: DeviceHandle, sim: &mut Simulator) {
        let now = sim.now();
        let Some(dev) = self.devices.get(ap.index) else {
            return;
        };
        let Some(w) = dev.wifi() else {
            return;
        };
        let WifiRole::Ap {
            ssid: ap_ssid,
            beacon_interval,
        } = &w.role
        else {
            return;
        };
        let (ap_ssid, interval) = (ap_ssid.clone(), *beacon_interval);
        let (ap_mac, ap_channel, channel) = (dev.mac, w.channel_number, dev.channel);
        let ChannelKind::Wifi(params) = self.channels[channel.index].kind else {
            return;
        };
        let ap_pos = self.node_position(dev.node, now);

        let members = self.channels[channel.index].devices.clone();
        for peer in members {
            let d = self
                .node_position(self.devices[peer.index].node, now)
                .distance(&ap_pos);
            let in_range = d <= params.range_m;
            let sta = &mut self.devices[peer.index];
            let sta_mac = sta.mac;
            let Some(w) = sta.wifi_mut() else {
                continue;
            };
            let visible = w.can_see_channel(ap_channel);
            let WifiRole::Sta {
                ssid, associated, ..
            } = &mut w.role
            else {
                continue;
            };

            let mut joined = false;
            match *associated {
                Some(bssid) if bssid == ap_mac => {
                    if !in_range {
                        *associated = None;
                        self.stats.disassociations += 1;
                        info!(sta = %sta_mac, ap = %ap_mac, distance = d, "📴 STA 移出范围，解除关联");
                    }
                }
                Some(_) => {}
                None => {
                    if in_range && visible && ssid.accepts(&ap_ssid) {
                        *associated = Some(ap_mac);
                        joined = true;
                        self.stats.associations += 1;
                        info!(sta = %sta_mac, ap = %ap_mac, ssid = %ap_ssid, channel = ap_channel, "📶 STA 关联 AP");
                    }
                }
            }
            if joined {
                w.channel_number = ap_channel;
            }
        }

        sim.schedule(now.saturating_add(interval), Beacon { ap });
    }
}
