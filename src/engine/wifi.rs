//! Wi-Fi MAC 模型
//!
//! 角色：AP / STA / Ad hoc / WDS。AP 周期发送 Beacon，STA 在收到
//! SSID 匹配且在范围内的 Beacon 时关联；移出范围后解除关联。

use super::data_rate::DataRate;
use super::error::EngineError;
use super::mac::MacAddr;
use crate::sim::SimTime;
use std::fmt;
use std::str::FromStr;

/// 802.11 SSID（最长 32 字节；空串表示"任意 SSID"）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Ssid(String);

impl Ssid {
    pub const MAX_LEN: usize = 32;

    pub fn new(s: impl Into<String>) -> Result<Self, EngineError> {
        let s = s.into();
        if s.len() > Self::MAX_LEN {
            return Err(EngineError::InvalidAttribute {
                key: "Ssid".to_string(),
                reason: format!("{} bytes exceeds the {}-byte limit", s.len(), Self::MAX_LEN),
            });
        }
        Ok(Ssid(s))
    }

    /// 空 SSID：STA 可以关联任意 AP
    pub fn any() -> Self {
        Ssid(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    /// STA 侧的 SSID 是否接受某个 AP 的 SSID
    pub fn accepts(&self, ap: &Ssid) -> bool {
        self.is_any() || self == ap
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// STA 扫描方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanType {
    /// 扫描 `1..=MaxScanningChannelNumber` 的所有信道
    Active,
    /// 只看自己所在信道上的 AP
    #[default]
    NotSupported,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Active => f.write_str("Active"),
            ScanType::NotSupported => f.write_str("NotSupported"),
        }
    }
}

impl FromStr for ScanType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" | "active" => Ok(ScanType::Active),
            "NotSupported" | "notsupported" | "none" => Ok(ScanType::NotSupported),
            other => Err(EngineError::InvalidAttribute {
                key: "ScanType".to_string(),
                reason: format!("unknown scan type {other:?}"),
            }),
        }
    }
}

/// PHY 标准，决定可用速率集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WifiStandard {
    #[default]
    A,
    B,
    G,
}

impl WifiStandard {
    /// 从高到低的速率集合（Mbps * 10）
    fn rates_decimbps(&self) -> &'static [u64] {
        match self {
            WifiStandard::A | WifiStandard::G => &[540, 480, 360, 240, 180, 120, 90, 60],
            WifiStandard::B => &[110, 55, 20, 10],
        }
    }

    pub fn rates(&self) -> Vec<DataRate> {
        self.rates_decimbps()
            .iter()
            .map(|r| DataRate::from_bps(r * 100_000))
            .collect()
    }

    /// 最低速率（广播/管理帧使用）
    pub fn basic_rate(&self) -> DataRate {
        let rates = self.rates_decimbps();
        DataRate::from_bps(rates[rates.len() - 1] * 100_000)
    }
}

impl FromStr for WifiStandard {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches("802.11") {
            "a" | "A" => Ok(WifiStandard::A),
            "b" | "B" => Ok(WifiStandard::B),
            "g" | "G" => Ok(WifiStandard::G),
            other => Err(EngineError::InvalidAttribute {
                key: "Standard".to_string(),
                reason: format!("unknown wifi standard {other:?}"),
            }),
        }
    }
}

/// 速率控制算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationManager {
    /// 距离越远速率越低
    #[default]
    Arf,
    /// 与 Arf 相同，但提前一档降速
    Aarf,
    ConstantRate(DataRate),
}

impl StationManager {
    /// 按收发距离选择单播速率
    pub fn rate(&self, standard: WifiStandard, distance_m: f64, range_m: f64) -> DataRate {
        let step_early = match self {
            StationManager::ConstantRate(r) => return *r,
            StationManager::Arf => 0,
            StationManager::Aarf => 1,
        };
        let rates = standard.rates();
        let n = rates.len();
        let frac = if range_m > 0.0 {
            (distance_m / range_m).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let idx = ((frac * n as f64) as usize + step_early).min(n - 1);
        rates[idx]
    }
}

impl FromStr for StationManager {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim_start_matches("ns3::").trim_end_matches("WifiManager");
        match name {
            "Arf" | "arf" => Ok(StationManager::Arf),
            "Aarf" | "aarf" => Ok(StationManager::Aarf),
            other => {
                if let Some(rate) = other.strip_prefix("ConstantRate:") {
                    let rate = rate
                        .parse::<DataRate>()
                        .map_err(|e| EngineError::InvalidAttribute {
                            key: "StationManager".to_string(),
                            reason: e.to_string(),
                        })?;
                    return Ok(StationManager::ConstantRate(rate));
                }
                Err(EngineError::InvalidAttribute {
                    key: "StationManager".to_string(),
                    reason: format!("unknown station manager {s:?}"),
                })
            }
        }
    }
}

/// 默认 Beacon 间隔：100 TU
pub const DEFAULT_BEACON_INTERVAL: SimTime = SimTime(102_400_000);

/// Wi-Fi MAC 角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiRole {
    Adhoc,
    Ap {
        ssid: Ssid,
        beacon_interval: SimTime,
    },
    Sta {
        ssid: Ssid,
        scan: ScanType,
        max_scan_channel: u8,
        /// 已关联 AP 的 BSSID
        associated: Option<MacAddr>,
    },
    /// 无线分布式系统：点对点，只和 `receiver` 通信
    Wds { receiver: Option<MacAddr> },
}

impl WifiRole {
    pub fn ap(ssid: Ssid) -> Self {
        WifiRole::Ap {
            ssid,
            beacon_interval: DEFAULT_BEACON_INTERVAL,
        }
    }

    pub fn sta(ssid: Ssid, scan: ScanType, max_scan_channel: u8) -> Self {
        WifiRole::Sta {
            ssid,
            scan,
            max_scan_channel,
            associated: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WifiRole::Adhoc => "adhoc",
            WifiRole::Ap { .. } => "ap",
            WifiRole::Sta { .. } => "sta",
            WifiRole::Wds { .. } => "wds",
        }
    }

    /// 只有 AP 与 WDS 可以用任意源地址发帧
    pub fn supports_send_from(&self) -> bool {
        matches!(self, WifiRole::Ap { .. } | WifiRole::Wds { .. })
    }
}

/// 创建 Wi-Fi 设备的参数
#[derive(Debug, Clone, PartialEq)]
pub struct WifiDeviceSpec {
    pub role: WifiRole,
    pub channel_number: u8,
    pub station_manager: StationManager,
}

impl WifiDeviceSpec {
    pub fn new(role: WifiRole, channel_number: u8) -> Self {
        Self {
            role,
            channel_number,
            station_manager: StationManager::default(),
        }
    }
}

/// 设备上运行时的 Wi-Fi 状态
#[derive(Debug, Clone)]
pub(crate) struct WifiMac {
    pub role: WifiRole,
    pub channel_number: u8,
    pub station_manager: StationManager,
    pub beaconing: bool,
}

impl WifiMac {
    pub(crate) fn from_spec(spec: WifiDeviceSpec) -> Self {
        Self {
            role: spec.role,
            channel_number: spec.channel_number,
            station_manager: spec.station_manager,
            beaconing: false,
        }
    }

    /// STA 是否能看到某个信道上的 AP
    pub(crate) fn can_see_channel(&self, channel_number: u8) -> bool {
        match &self.role {
            WifiRole::Sta {
                scan: ScanType::Active,
                max_scan_channel,
                ..
            } => channel_number == self.channel_number || channel_number <= *max_scan_channel,
            _ => channel_number == self.channel_number,
        }
    }
}

/// 判断 `tx` 发出的帧 `rx` 是否会接收（MAC 角色配对）
pub(crate) fn roles_pair(tx: &WifiRole, tx_mac: MacAddr, rx: &WifiRole, rx_mac: MacAddr) -> bool {
    match (tx, rx) {
        (WifiRole::Adhoc, WifiRole::Adhoc) => true,
        (WifiRole::Ap { .. }, WifiRole::Sta { associated, .. }) => *associated == Some(tx_mac),
        (WifiRole::Sta { associated, .. }, WifiRole::Ap { .. }) => *associated == Some(rx_mac),
        (WifiRole::Wds { receiver }, WifiRole::Wds { .. }) => *receiver == Some(rx_mac),
        _ => false,
    }
}
