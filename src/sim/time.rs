//! 仿真时间类型
//!
//! 定义仿真时间及其单位转换。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 仿真时间（纳秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub fn from_nanos(ns: u64) -> SimTime {
        SimTime(ns)
    }
    pub fn from_micros(us: u64) -> SimTime {
        SimTime(us.saturating_mul(1_000))
    }
    pub fn from_millis(ms: u64) -> SimTime {
        SimTime(ms.saturating_mul(1_000_000))
    }
    pub fn from_secs(s: u64) -> SimTime {
        SimTime(s.saturating_mul(1_000_000_000))
    }

    /// 从墙钟时长换算（饱和到 `u64::MAX` 纳秒）
    pub fn from_duration(d: Duration) -> SimTime {
        SimTime(d.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn saturating_add(self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(other.0))
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime::from_duration(d)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.0;
        if ns == 0 {
            write!(f, "0s")
        } else if ns % 1_000_000_000 == 0 {
            write!(f, "{}s", ns / 1_000_000_000)
        } else if ns % 1_000_000 == 0 {
            write!(f, "{}ms", ns / 1_000_000)
        } else if ns % 1_000 == 0 {
            write!(f, "{}us", ns / 1_000)
        } else {
            write!(f, "{ns}ns")
        }
    }
}

/// 时间字符串解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time literal: {0:?} (expected e.g. 10ns, 2us, 5ms, 1.5s)")]
pub struct ParseTimeError(pub String);

impl FromStr for SimTime {
    type Err = ParseTimeError;

    /// 解析 `10ns` / `2us` / `5ms` / `1.5s` 形式的时间；不带单位时按秒处理。
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let value: f64 = num.parse().map_err(|_| ParseTimeError(raw.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ParseTimeError(raw.to_string()));
        }
        let scale = match unit.trim() {
            "ns" => 1.0,
            "us" => 1e3,
            "ms" => 1e6,
            "" | "s" => 1e9,
            "min" => 60e9,
            _ => return Err(ParseTimeError(raw.to_string())),
        };
        let nanos = (value * scale).round();
        if nanos >= u64::MAX as f64 {
            return Ok(SimTime::MAX);
        }
        Ok(SimTime(nanos as u64))
    }
}
