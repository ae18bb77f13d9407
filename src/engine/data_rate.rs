//! 数据速率
//!
//! 解析 `10Mbps` / `1.5Gb/s` / `100kbps` / `1MBps` 等形式的速率字符串，
//! 并按链路模型计算序列化时延。

use crate::sim::SimTime;
use std::fmt;
use std::str::FromStr;

/// 数据速率（bit/s）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate {
    bps: u64,
}

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        Self { bps }
    }

    pub const fn from_kbps(kbps: u64) -> Self {
        Self::from_bps(kbps * 1_000)
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        Self::from_bps(mbps * 1_000_000)
    }

    pub const fn from_gbps(gbps: u64) -> Self {
        Self::from_bps(gbps * 1_000_000_000)
    }

    pub fn bps(&self) -> u64 {
        self.bps
    }

    /// 发送 `bytes` 字节所需的时间：ceil(bits * 1e9 / bps) 纳秒
    pub fn tx_time(&self, bytes: usize) -> SimTime {
        if self.bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos =
            (bits.saturating_mul(1_000_000_000u128) + (self.bps as u128 - 1)) / self.bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.bps;
        if bps != 0 && bps % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", bps / 1_000_000_000)
        } else if bps != 0 && bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", bps / 1_000_000)
        } else if bps != 0 && bps % 1_000 == 0 {
            write!(f, "{}kbps", bps / 1_000)
        } else {
            write!(f, "{bps}bps")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid data rate: {0:?} (expected e.g. 10Mbps, 1Gb/s, 100kbps)")]
pub struct ParseDataRateError(pub String);

impl FromStr for DataRate {
    type Err = ParseDataRateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let value: f64 = num
            .parse()
            .map_err(|_| ParseDataRateError(raw.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ParseDataRateError(raw.to_string()));
        }

        let unit = unit.trim();
        // "B" 表示字节，"b" 表示比特
        let (prefix, per_byte) = if let Some(p) = unit
            .strip_suffix("Bps")
            .or_else(|| unit.strip_suffix("B/s"))
        {
            (p, true)
        } else if let Some(p) = unit
            .strip_suffix("bps")
            .or_else(|| unit.strip_suffix("b/s"))
        {
            (p, false)
        } else {
            return Err(ParseDataRateError(raw.to_string()));
        };
        let scale = match prefix {
            "" => 1.0,
            "k" | "K" => 1e3,
            "M" => 1e6,
            "G" => 1e9,
            "Ki" => 1024.0,
            "Mi" => 1024.0 * 1024.0,
            "Gi" => 1024.0 * 1024.0 * 1024.0,
            _ => return Err(ParseDataRateError(raw.to_string())),
        };
        let bits = value * scale * if per_byte { 8.0 } else { 1.0 };
        if bits >= u64::MAX as f64 {
            return Err(ParseDataRateError(raw.to_string()));
        }
        Ok(DataRate::from_bps(bits.round() as u64))
    }
}
