//! 引擎错误

use super::id::{BridgeHandle, ChannelHandle, DeviceHandle, NodeHandle};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeHandle),
    #[error("unknown device {0:?}")]
    UnknownDevice(DeviceHandle),
    #[error("unknown channel {0:?}")]
    UnknownChannel(ChannelHandle),
    #[error("unknown tap bridge {0:?}")]
    UnknownBridge(BridgeHandle),
    #[error("handle from engine generation {found}, current generation is {current}")]
    StaleHandle { found: u32, current: u32 },
    #[error("device {device:?} belongs to node {owner:?}, not {node:?}")]
    DeviceNotOnNode {
        device: DeviceHandle,
        owner: NodeHandle,
        node: NodeHandle,
    },
    #[error("device {0:?} is already bridged")]
    DeviceAlreadyBridged(DeviceHandle),
    #[error("device {0:?} cannot send frames with arbitrary source addresses (UseBridge)")]
    SendFromUnsupported(DeviceHandle),
    #[error("a {device} device cannot attach to a {channel} channel")]
    ChannelMismatch {
        device: &'static str,
        channel: &'static str,
    },
    #[error("unknown attribute {key:?} on {target}")]
    UnknownAttribute { target: &'static str, key: String },
    #[error("attribute {key:?} expects {expected}, got {got}")]
    AttributeType {
        key: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("invalid value for attribute {key:?}: {reason}")]
    InvalidAttribute { key: String, reason: String },
    #[error("node {0:?} has no mobility model")]
    NoMobility(NodeHandle),
    #[error("node {0:?} does not use a constant-velocity mobility model")]
    NotConstantVelocity(NodeHandle),
}
