//! 信道
//!
//! Simple：无竞争、无时延；CSMA：共享总线，发送期间加传播时延内信道忙；
//! Wi-Fi：按信道号共享的无线介质，接收受距离限制。

use super::data_rate::DataRate;
use super::id::DeviceHandle;
use super::wifi::WifiStandard;
use crate::sim::SimTime;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CsmaParams {
    /// None 表示不限速（序列化时延为 0）
    pub data_rate: Option<DataRate>,
    pub delay: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WifiChannelParams {
    /// 接收范围（米）
    pub range_m: f64,
    pub standard: WifiStandard,
}

impl Default for WifiChannelParams {
    fn default() -> Self {
        Self {
            range_m: 100.0,
            standard: WifiStandard::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelKind {
    Simple,
    Csma(CsmaParams),
    Wifi(WifiChannelParams),
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Simple => "simple",
            ChannelKind::Csma(_) => "csma",
            ChannelKind::Wifi(_) => "wifi",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Channel {
    pub kind: ChannelKind,
    pub devices: Vec<DeviceHandle>,
    /// CSMA：总线忙到何时
    pub busy_until: SimTime,
    /// Wi-Fi：每个信道号上的无线介质忙到何时
    pub radio_busy: HashMap<u8, SimTime>,
}

impl Channel {
    pub(crate) fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            devices: Vec::new(),
            busy_until: SimTime::ZERO,
            radio_busy: HashMap::new(),
        }
    }
}
