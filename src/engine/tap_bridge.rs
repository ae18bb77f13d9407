//! TapBridge 设备
//!
//! 把一个 OS tap 设备和一个仿真设备桥接起来。仿真运行时通过
//! `HostOs::open_tap` 打开 tap，成功后即视为 "link up"。

use super::id::{DeviceHandle, NodeHandle};
use super::mac::MacAddr;
use crate::os::TapPort;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 桥接模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeMode {
    /// tap 只用一个本地源地址；进入仿真时源地址改写为设备 MAC
    UseLocal,
    /// 以原始源地址发送，要求设备支持任意源地址
    UseBridge,
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeMode::UseLocal => f.write_str("UseLocal"),
            BridgeMode::UseBridge => f.write_str("UseBridge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bridge mode {0:?} (expected UseLocal or UseBridge)")]
pub struct ParseModeError(pub String);

impl FromStr for BridgeMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UseLocal" | "local" => Ok(BridgeMode::UseLocal),
            "UseBridge" | "bridge" => Ok(BridgeMode::UseBridge),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// 创建 TapBridge 时的属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapBridgeConfig {
    pub mode: BridgeMode,
    pub device_name: String,
}

pub(crate) struct TapBridge {
    pub node: NodeHandle,
    pub device: DeviceHandle,
    pub mode: BridgeMode,
    pub device_name: String,
    pub port: Option<Box<dyn TapPort>>,
    /// UseLocal 模式下从 tap 发出的帧学到的地址
    pub tap_mac: Option<MacAddr>,
    pub open_failures: u64,
}

impl fmt::Debug for TapBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapBridge")
            .field("node", &self.node)
            .field("device", &self.device)
            .field("mode", &self.mode)
            .field("device_name", &self.device_name)
            .field("link_up", &self.is_link_up())
            .field("tap_mac", &self.tap_mac)
            .finish()
    }
}

impl TapBridge {
    pub(crate) fn new(node: NodeHandle, device: DeviceHandle, cfg: TapBridgeConfig) -> Self {
        Self {
            node,
            device,
            mode: cfg.mode,
            device_name: cfg.device_name,
            port: None,
            tap_mac: None,
            open_failures: 0,
        }
    }

    pub(crate) fn is_link_up(&self) -> bool {
        self.port.is_some()
    }

    /// 从仿真设备收到的帧是否要交给 tap
    pub(crate) fn accepts(&self, dst: MacAddr, device_mac: MacAddr) -> bool {
        match self.mode {
            BridgeMode::UseBridge => true,
            BridgeMode::UseLocal => {
                dst.is_group() || dst == device_mac || Some(dst) == self.tap_mac
            }
        }
    }
}
