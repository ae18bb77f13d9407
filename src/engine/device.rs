//! 仿真网络设备

use super::id::{BridgeHandle, ChannelHandle, NodeHandle};
use super::mac::MacAddr;
use super::wifi::{WifiDeviceSpec, WifiMac};
use crate::queue::{DropTailQueue, mem_from_frames, DEFAULT_QUEUE_FRAMES};

/// 创建设备时的参数
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSpec {
    Simple,
    Csma {
        /// 发送队列容量（帧）；None 使用默认值
        queue_frames: Option<u64>,
    },
    Wifi(WifiDeviceSpec),
}

impl DeviceSpec {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceSpec::Simple => "simple",
            DeviceSpec::Csma { .. } => "csma",
            DeviceSpec::Wifi(_) => "wifi",
        }
    }
}

#[derive(Debug)]
pub(crate) enum DeviceModel {
    Simple,
    Csma,
    Wifi(WifiMac),
}

#[derive(Debug)]
pub(crate) struct NetDevice {
    pub node: NodeHandle,
    pub channel: ChannelHandle,
    pub mac: MacAddr,
    pub model: DeviceModel,
    pub queue: DropTailQueue,
    /// 正在发送（等待 DeviceReady）
    pub tx_busy: bool,
    pub bridge: Option<BridgeHandle>,
}

impl NetDevice {
    pub(crate) fn new(node: NodeHandle, channel: ChannelHandle, mac: MacAddr, spec: DeviceSpec) -> Self {
        let (model, queue_frames) = match spec {
            DeviceSpec::Simple => (DeviceModel::Simple, DEFAULT_QUEUE_FRAMES),
            DeviceSpec::Csma { queue_frames } => (
                DeviceModel::Csma,
                queue_frames.unwrap_or(DEFAULT_QUEUE_FRAMES),
            ),
            DeviceSpec::Wifi(w) => (DeviceModel::Wifi(WifiMac::from_spec(w)), DEFAULT_QUEUE_FRAMES),
        };
        Self {
            node,
            channel,
            mac,
            model,
            queue: DropTailQueue::new(mem_from_frames(queue_frames)),
            tx_busy: false,
            bridge: None,
        }
    }

    pub(crate) fn model_name(&self) -> &'static str {
        match self.model {
            DeviceModel::Simple => "simple",
            DeviceModel::Csma => "csma",
            DeviceModel::Wifi(_) => "wifi",
        }
    }

    /// 能否以任意源地址发送（UseBridge 的前提）
    pub(crate) fn supports_send_from(&self) -> bool {
        match &self.model {
            DeviceModel::Simple | DeviceModel::Csma => true,
            DeviceModel::Wifi(w) => w.role.supports_send_from(),
        }
    }

    /// 设备层接收过滤；被桥接的设备处于混杂模式
    pub(crate) fn accepts(&self, dst: MacAddr) -> bool {
        self.bridge.is_some() || dst.is_group() || dst == self.mac
    }

    pub(crate) fn wifi(&self) -> Option<&WifiMac> {
        match &self.model {
            DeviceModel::Wifi(w) => Some(w),
            _ => None,
        }
    }

    pub(crate) fn wifi_mut(&mut self) -> Option<&mut WifiMac> {
        match &mut self.model {
            DeviceModel::Wifi(w) => Some(w),
            _ => None,
        }
    }
}
