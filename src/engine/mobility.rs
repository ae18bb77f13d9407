//! 移动模型
//!
//! 只实现两种：固定位置与匀速直线运动。

use super::error::EngineError;
use crate::sim::SimTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 三维坐标 / 速度（米、米每秒）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    fn offset(&self, v: &Vector3, secs: f64) -> Vector3 {
        Vector3::new(self.x + v.x * secs, self.y + v.y * secs, self.z + v.z * secs)
    }
}

impl From<(f64, f64, f64)> for Vector3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Vector3::new(x, y, z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MobilityKind {
    ConstantPosition,
    #[default]
    ConstantVelocity,
}

impl fmt::Display for MobilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MobilityKind::ConstantPosition => f.write_str("ConstantPosition"),
            MobilityKind::ConstantVelocity => f.write_str("ConstantVelocity"),
        }
    }
}

impl FromStr for MobilityKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .trim_start_matches("ns3::")
            .trim_end_matches("MobilityModel");
        match name {
            "ConstantPosition" => Ok(MobilityKind::ConstantPosition),
            "ConstantVelocity" => Ok(MobilityKind::ConstantVelocity),
            other => Err(EngineError::InvalidAttribute {
                key: "MobilityModel".to_string(),
                reason: format!("unknown mobility model {other:?}"),
            }),
        }
    }
}

/// 节点上的移动模型状态：位置 = base + velocity * (now - since)
#[derive(Debug, Clone)]
pub(crate) struct Mobility {
    pub kind: MobilityKind,
    base: Vector3,
    velocity: Vector3,
    since: SimTime,
}

impl Mobility {
    pub(crate) fn new(kind: MobilityKind, now: SimTime) -> Self {
        Self {
            kind,
            base: Vector3::ZERO,
            velocity: Vector3::ZERO,
            since: now,
        }
    }

    pub(crate) fn position(&self, now: SimTime) -> Vector3 {
        match self.kind {
            MobilityKind::ConstantPosition => self.base,
            MobilityKind::ConstantVelocity => {
                let secs = now.saturating_sub(self.since).as_secs_f64();
                self.base.offset(&self.velocity, secs)
            }
        }
    }

    pub(crate) fn set_position(&mut self, pos: Vector3, now: SimTime) {
        self.base = pos;
        self.since = now;
    }

    pub(crate) fn velocity(&self) -> Option<Vector3> {
        match self.kind {
            MobilityKind::ConstantVelocity => Some(self.velocity),
            MobilityKind::ConstantPosition => None,
        }
    }

    /// 设置速度前先把当前位置固化，轨迹保持连续
    pub(crate) fn set_velocity(&mut self, v: Vector3, now: SimTime) -> bool {
        if self.kind != MobilityKind::ConstantVelocity {
            return false;
        }
        self.base = self.position(now);
        self.since = now;
        self.velocity = v;
        true
    }
}
