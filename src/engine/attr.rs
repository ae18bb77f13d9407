//! 字符串键、强类型的属性值
//!
//! 信道、设备、TapBridge 的可调参数都通过 `set_*_attribute(handle, key, value)`
//! 设置；键不存在或类型不匹配都会返回错误。

use super::data_rate::DataRate;
use super::error::EngineError;
use super::mac::MacAddr;
use super::tap_bridge::BridgeMode;
use super::wifi::{ScanType, Ssid};
use crate::sim::SimTime;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Uint(u64),
    Time(SimTime),
    DataRate(DataRate),
    Mac(MacAddr),
    Ssid(Ssid),
    ScanType(ScanType),
    Mode(BridgeMode),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "string",
            AttrValue::Bool(_) => "bool",
            AttrValue::Uint(_) => "uint",
            AttrValue::Time(_) => "time",
            AttrValue::DataRate(_) => "data rate",
            AttrValue::Mac(_) => "mac address",
            AttrValue::Ssid(_) => "ssid",
            AttrValue::ScanType(_) => "scan type",
            AttrValue::Mode(_) => "bridge mode",
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str) -> EngineError {
        EngineError::AttributeType {
            key: key.to_string(),
            expected,
            got: self.type_name(),
        }
    }

    pub(crate) fn into_str(self, key: &str) -> Result<String, EngineError> {
        match self {
            AttrValue::Str(s) => Ok(s),
            other => Err(other.mismatch(key, "string")),
        }
    }

    pub(crate) fn into_uint(self, key: &str) -> Result<u64, EngineError> {
        match self {
            AttrValue::Uint(v) => Ok(v),
            other => Err(other.mismatch(key, "uint")),
        }
    }

    pub(crate) fn into_time(self, key: &str) -> Result<SimTime, EngineError> {
        match self {
            AttrValue::Time(t) => Ok(t),
            other => Err(other.mismatch(key, "time")),
        }
    }

    pub(crate) fn into_data_rate(self, key: &str) -> Result<DataRate, EngineError> {
        match self {
            AttrValue::DataRate(r) => Ok(r),
            other => Err(other.mismatch(key, "data rate")),
        }
    }

    pub(crate) fn into_mac(self, key: &str) -> Result<MacAddr, EngineError> {
        match self {
            AttrValue::Mac(m) => Ok(m),
            other => Err(other.mismatch(key, "mac address")),
        }
    }

    pub(crate) fn into_ssid(self, key: &str) -> Result<Ssid, EngineError> {
        match self {
            AttrValue::Ssid(s) => Ok(s),
            other => Err(other.mismatch(key, "ssid")),
        }
    }

    pub(crate) fn into_scan_type(self, key: &str) -> Result<ScanType, EngineError> {
        match self {
            AttrValue::ScanType(s) => Ok(s),
            other => Err(other.mismatch(key, "scan type")),
        }
    }

    pub(crate) fn into_mode(self, key: &str) -> Result<BridgeMode, EngineError> {
        match self {
            AttrValue::Mode(m) => Ok(m),
            other => Err(other.mismatch(key, "bridge mode")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Uint(v)
    }
}

impl From<SimTime> for AttrValue {
    fn from(v: SimTime) -> Self {
        AttrValue::Time(v)
    }
}

impl From<DataRate> for AttrValue {
    fn from(v: DataRate) -> Self {
        AttrValue::DataRate(v)
    }
}

impl From<MacAddr> for AttrValue {
    fn from(v: MacAddr) -> Self {
        AttrValue::Mac(v)
    }
}

impl From<Ssid> for AttrValue {
    fn from(v: Ssid) -> Self {
        AttrValue::Ssid(v)
    }
}

impl From<ScanType> for AttrValue {
    fn from(v: ScanType) -> Self {
        AttrValue::ScanType(v)
    }
}

impl From<BridgeMode> for AttrValue {
    fn from(v: BridgeMode) -> Self {
        AttrValue::Mode(v)
    }
}
