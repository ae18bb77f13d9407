//! 共享介质
//!
//! 一个 Segment 持有一个引擎信道。每次 attach 为节点创建一个仿真设备、
//! 分配端口与接口名（`<node>-eth<port>`），并建立桥接接口。

use super::intf::{IntfId, IntfSpec};
use super::lifecycle::Emulation;
use super::node::NodeKey;
use crate::engine::{
    BridgeMode, ChannelHandle, ChannelKind, CsmaParams, DataRate, DeviceHandle, DeviceSpec,
    MobilityKind, NodeHandle, ScanType, Ssid, StationManager, WifiChannelParams, WifiDeviceSpec,
    WifiRole, WifiStandard,
};
use crate::error::{Error, Result, Warning};
use crate::sim::SimTime;
use std::fmt;
use tracing::debug;

/// attach 时可选的端口、接口名与桥接模式
#[derive(Debug, Clone, Default)]
pub struct AttachOpts {
    pub port: Option<u32>,
    pub name: Option<String>,
    pub mode: Option<BridgeMode>,
}

pub trait Segment: fmt::Debug {
    fn channel(&self) -> ChannelHandle;

    fn kind_name(&self) -> &'static str;

    /// 本 Segment 建立的所有接口
    fn intfs(&self) -> &[IntfId];

    /// 把节点接到该介质上，返回新建的桥接接口
    fn attach(&mut self, emu: &mut Emulation, node: NodeKey, opts: AttachOpts) -> Result<IntfId>;
}

#[derive(Debug, Clone)]
pub enum SegmentKind {
    Simple,
    Csma {
        data_rate: Option<DataRate>,
        delay: SimTime,
    },
    Wifi(WifiSegmentOpts),
}

/// 按类型创建 Segment
pub fn create_segment(emu: &mut Emulation, kind: SegmentKind) -> Result<Box<dyn Segment>> {
    Ok(match kind {
        SegmentKind::Simple => Box::new(SimpleSegment::new(emu)?),
        SegmentKind::Csma { data_rate, delay } => Box::new(CsmaSegment::new(emu, data_rate, delay)?),
        SegmentKind::Wifi(opts) => Box::new(WifiSegment::new(emu, opts)?),
    })
}

/// 端口与接口名先确定，再建设备，避免端口冲突时留下孤立设备
fn resolve_port_and_name(emu: &Emulation, node: NodeKey, opts: &AttachOpts) -> Result<(u32, String)> {
    let n = emu.node(node)?;
    let port = match opts.port {
        Some(p) if n.port_in_use(p) => {
            return Err(Error::PortInUse {
                node: n.name().to_string(),
                port: p,
            });
        }
        Some(p) => p,
        None => n.new_port(),
    };
    let name = opts.name.clone().unwrap_or_else(|| n.intf_name(port));
    Ok((port, name))
}

/// 公共的 attach 流程：仿真节点 → 设备 → 桥接接口
fn attach_device(
    emu: &mut Emulation,
    node: NodeKey,
    channel: ChannelHandle,
    spec: DeviceSpec,
    opts: AttachOpts,
) -> Result<(IntfId, NodeHandle, DeviceHandle)> {
    let (port, name) = resolve_port_and_name(emu, node, &opts)?;
    let sim_node = emu.get_or_create_sim_node(node)?;
    let device = emu
        .engine_mut("attach a node")?
        .create_device(sim_node, channel, spec)?;

    let mut intf = IntfSpec::new(name, node)
        .port(port)
        .sim_node(sim_node)
        .device(device);
    intf.mode = opts.mode;
    let id = emu.create_intf(intf)?;
    Ok((id, sim_node, device))
}

#[derive(Debug)]
pub struct SimpleSegment {
    channel: ChannelHandle,
    intfs: Vec<IntfId>,
}

impl SimpleSegment {
    pub fn new(emu: &mut Emulation) -> Result<Self> {
        let channel = emu
            .engine_mut("create a segment")?
            .create_channel(ChannelKind::Simple);
        Ok(Self {
            channel,
            intfs: Vec::new(),
        })
    }
}

impl Segment for SimpleSegment {
    fn channel(&self) -> ChannelHandle {
        self.channel
    }

    fn kind_name(&self) -> &'static str {
        "simple"
    }

    fn intfs(&self) -> &[IntfId] {
        &self.intfs
    }

    fn attach(&mut self, emu: &mut Emulation, node: NodeKey, opts: AttachOpts) -> Result<IntfId> {
        let (id, _, _) = attach_device(emu, node, self.channel, DeviceSpec::Simple, opts)?;
        self.intfs.push(id);
        Ok(id)
    }
}

#[derive(Debug)]
pub struct CsmaSegment {
    channel: ChannelHandle,
    intfs: Vec<IntfId>,
}

impl CsmaSegment {
    /// `data_rate` 为空表示不限速
    pub fn new(emu: &mut Emulation, data_rate: Option<DataRate>, delay: SimTime) -> Result<Self> {
        let engine = emu.engine_mut("create a segment")?;
        let channel = engine.create_channel(ChannelKind::Csma(CsmaParams::default()));
        if let Some(rate) = data_rate {
            engine.set_channel_attribute(channel, "DataRate", rate)?;
        }
        engine.set_channel_attribute(channel, "Delay", delay)?;
        debug!(?channel, data_rate = ?data_rate, delay = %delay, "创建 CSMA 信道");
        Ok(Self {
            channel,
            intfs: Vec::new(),
        })
    }
}

impl Segment for CsmaSegment {
    fn channel(&self) -> ChannelHandle {
        self.channel
    }

    fn kind_name(&self) -> &'static str {
        "csma"
    }

    fn intfs(&self) -> &[IntfId] {
        &self.intfs
    }

    fn attach(&mut self, emu: &mut Emulation, node: NodeKey, opts: AttachOpts) -> Result<IntfId> {
        let spec = DeviceSpec::Csma { queue_frames: None };
        let (id, _, _) = attach_device(emu, node, self.channel, spec, opts)?;
        self.intfs.push(id);
        Ok(id)
    }
}

#[derive(Debug, Clone)]
pub struct WifiSegmentOpts {
    pub standard: WifiStandard,
    pub station_manager: StationManager,
    /// 合法信道号为 `1..=max_channel_number`
    pub max_channel_number: u8,
    pub range_m: f64,
}

impl Default for WifiSegmentOpts {
    fn default() -> Self {
        Self {
            standard: WifiStandard::default(),
            station_manager: StationManager::default(),
            max_channel_number: 11,
            range_m: WifiChannelParams::default().range_m,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApOpts {
    pub channel: u32,
    pub ssid: Option<String>,
    pub beacon_interval: Option<SimTime>,
    pub attach: AttachOpts,
}

impl Default for ApOpts {
    fn default() -> Self {
        Self {
            channel: 1,
            ssid: None,
            beacon_interval: None,
            attach: AttachOpts::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaOpts {
    pub channel: u32,
    pub ssid: Option<String>,
    pub scan: bool,
    pub attach: AttachOpts,
}

impl Default for StaOpts {
    fn default() -> Self {
        Self {
            channel: 1,
            ssid: None,
            scan: true,
            attach: AttachOpts::default(),
        }
    }
}

#[derive(Debug)]
pub struct WifiSegment {
    channel: ChannelHandle,
    opts: WifiSegmentOpts,
    intfs: Vec<IntfId>,
    aps: Vec<IntfId>,
    stas: Vec<IntfId>,
}

impl WifiSegment {
    pub fn new(emu: &mut Emulation, opts: WifiSegmentOpts) -> Result<Self> {
        let channel = emu
            .engine_mut("create a segment")?
            .create_channel(ChannelKind::Wifi(WifiChannelParams {
                range_m: opts.range_m,
                standard: opts.standard,
            }));
        Ok(Self {
            channel,
            opts,
            intfs: Vec::new(),
            aps: Vec::new(),
            stas: Vec::new(),
        })
    }

    pub fn aps(&self) -> &[IntfId] {
        &self.aps
    }

    pub fn stas(&self) -> &[IntfId] {
        &self.stas
    }

    pub fn max_channel_number(&self) -> u8 {
        self.opts.max_channel_number
    }

    /// 非法信道号替换为确定性伪随机的合法信道，并记录警告
    fn valid_channel(&self, emu: &mut Emulation, requested: u32) -> u8 {
        let max = self.opts.max_channel_number.max(1);
        if (1..=max as u32).contains(&requested) {
            return requested as u8;
        }
        let chosen = 1 + (emu.next_random() % max as u64) as u8;
        emu.report(Warning::ChannelReplaced { requested, chosen });
        chosen
    }

    fn ssid_or(emu: &mut Emulation, requested: Option<String>, fallback: Ssid) -> Ssid {
        let Some(s) = requested else {
            return fallback;
        };
        match Ssid::new(s.clone()) {
            Ok(ssid) => ssid,
            Err(_) => {
                emu.report(Warning::SsidFallback {
                    requested: s,
                    fallback: fallback.to_string(),
                });
                fallback
            }
        }
    }

    fn attach_wifi(
        &mut self,
        emu: &mut Emulation,
        node: NodeKey,
        role: WifiRole,
        channel_number: u8,
        opts: AttachOpts,
    ) -> Result<IntfId> {
        let spec = DeviceSpec::Wifi(WifiDeviceSpec {
            role,
            channel_number,
            station_manager: self.opts.station_manager,
        });
        let (id, sim_node, _) = attach_device(emu, node, self.channel, spec, opts)?;
        ensure_constant_velocity(emu, sim_node)?;
        self.intfs.push(id);
        Ok(id)
    }

    pub fn add_adhoc(&mut self, emu: &mut Emulation, node: NodeKey, channel: u32, opts: AttachOpts) -> Result<IntfId> {
        let ch = self.valid_channel(emu, channel);
        self.attach_wifi(emu, node, WifiRole::Adhoc, ch, opts)
    }

    /// 添加 AP；SSID 默认 `ssid<N>`，N 为已有 AP 数加一
    pub fn add_ap(&mut self, emu: &mut Emulation, node: NodeKey, opts: ApOpts) -> Result<IntfId> {
        let ch = self.valid_channel(emu, opts.channel);
        let default = format!("ssid{}", self.aps.len() + 1);
        let fallback = Ssid::new(default)?;
        let ssid = Self::ssid_or(emu, opts.ssid, fallback);
        let mut role = WifiRole::ap(ssid);
        if let (Some(t), WifiRole::Ap { beacon_interval, .. }) = (opts.beacon_interval, &mut role) {
            *beacon_interval = t;
        }
        let id = self.attach_wifi(emu, node, role, ch, opts.attach)?;
        self.aps.push(id);
        Ok(id)
    }

    /// 添加 STA；SSID 默认为空（关联任意 AP）
    pub fn add_sta(&mut self, emu: &mut Emulation, node: NodeKey, opts: StaOpts) -> Result<IntfId> {
        let ch = self.valid_channel(emu, opts.channel);
        let ssid = Self::ssid_or(emu, opts.ssid, Ssid::any());
        let scan = if opts.scan {
            ScanType::Active
        } else {
            ScanType::NotSupported
        };
        let role = WifiRole::sta(ssid, scan, self.opts.max_channel_number);
        let id = self.attach_wifi(emu, node, role, ch, opts.attach)?;
        self.stas.push(id);
        Ok(id)
    }

    /// WDS 点对点：两个接口先建好 tap，读出各自的 MAC，再建设备并安装
    pub(crate) fn add_wds_pair(
        &mut self,
        emu: &mut Emulation,
        nodes: (NodeKey, NodeKey),
        opts: (AttachOpts, AttachOpts),
    ) -> Result<(IntfId, IntfId)> {
        let ch = self.valid_channel(emu, 1);
        let mut ends = Vec::with_capacity(2);
        for (node, o) in [(nodes.0, opts.0), (nodes.1, opts.1)] {
            let (port, name) = resolve_port_and_name(emu, node, &o)?;
            let sim_node = emu.get_or_create_sim_node(node)?;
            let mut spec = IntfSpec::new(name, node).port(port).sim_node(sim_node);
            spec.mode = o.mode;
            let id = emu.create_intf(spec)?;
            ends.push((id, sim_node));
        }
        let macs = [emu.intf_mac(ends[0].0)?, emu.intf_mac(ends[1].0)?];

        for (i, &(id, sim_node)) in ends.iter().enumerate() {
            let spec = DeviceSpec::Wifi(WifiDeviceSpec {
                role: WifiRole::Wds { receiver: None },
                channel_number: ch,
                station_manager: self.opts.station_manager,
            });
            let engine = emu.engine_mut("attach a node")?;
            let device = engine.create_device(sim_node, self.channel, spec)?;
            engine.set_device_attribute(device, "Address", macs[i])?;
            engine.set_device_attribute(device, "ReceiverAddress", macs[1 - i])?;
            emu.bind_intf(id, sim_node, device)?;
            emu.install_intf(id)?;
            ensure_constant_velocity(emu, sim_node)?;
            self.intfs.push(id);
        }
        Ok((ends[0].0, ends[1].0))
    }
}

impl Segment for WifiSegment {
    fn channel(&self) -> ChannelHandle {
        self.channel
    }

    fn kind_name(&self) -> &'static str {
        "wifi"
    }

    fn intfs(&self) -> &[IntfId] {
        &self.intfs
    }

    /// 默认以 ad hoc 模式接入 1 号信道
    fn attach(&mut self, emu: &mut Emulation, node: NodeKey, opts: AttachOpts) -> Result<IntfId> {
        self.add_adhoc(emu, node, 1, opts)
    }
}

fn ensure_constant_velocity(emu: &mut Emulation, sim_node: NodeHandle) -> Result<()> {
    let engine = emu.engine_mut("install a mobility model")?;
    if engine.mobility_kind(sim_node)?.is_none() {
        engine.install_mobility(sim_node, MobilityKind::ConstantVelocity)?;
    }
    Ok(())
}
