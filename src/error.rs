//! 错误与警告
//!
//! `Error` 是桥接层的统一错误；`Warning` 记录可继续运行的异常情况，
//! 既用 `tracing::warn!` 打印，也保存在 `Emulation::warnings()` 里。

use crate::emu::NodeKey;
use crate::engine::{EngineError, WorkerError};
use crate::os::OsError;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Os(#[from] OsError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("the simulation is running; {0} requires an idle engine")]
    EngineBusy(&'static str),
    #[error("interface {0} is installed into the simulation; call clear() before deleting it")]
    DeleteInstalled(String),
    #[error("cannot clear while the simulation is running; call stop() first")]
    ClearWhileRunning,
    #[error("interface {0} is already connected to the simulation and cannot be renamed")]
    RenameAfterConnect(String),
    #[error("port {port} is already in use on node {node}")]
    PortInUse { node: String, port: u32 },
    #[error("unknown node {0:?}")]
    UnknownNode(NodeKey),
    #[error("node {0} already exists")]
    DuplicateNode(String),
    #[error("unknown interface {0}")]
    UnknownIntf(String),

    #[error("tap bridge for {intf} did not come up after {attempts} attempts")]
    MigrationTimeout { intf: String, attempts: u32 },

    #[error("interface {0} has no simulated node")]
    MissingSimNode(String),
    #[error("interface {0} has no simulated device")]
    MissingDevice(String),
    #[error("interface {0} has no tap on the host; it cannot be bridged")]
    TapMissing(String),
    #[error("interface {0} is not installed")]
    NotInstalled(String),

    #[error("the engine is unavailable after a worker failure; call clear()")]
    EnginePoisoned,
    #[error("failed to spawn the engine worker: {0}")]
    Spawn(std::io::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// 可继续运行的异常情况
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    AlreadyRunning,
    ChannelReplaced { requested: u32, chosen: u8 },
    SsidFallback { requested: String, fallback: String },
    TapCreateFailed { intf: String, reason: String },
    InstallFailed { intf: String, reason: String },
    MigrationFailed { intf: String, reason: String },
    TapRemovalFailed { intf: String, reason: String },
    NoConstantVelocity { node: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AlreadyRunning => write!(f, "simulation is already running"),
            Warning::ChannelReplaced { requested, chosen } => write!(
                f,
                "channel {requested} is not valid, using randomly chosen channel {chosen}"
            ),
            Warning::SsidFallback {
                requested,
                fallback,
            } => write!(f, "ssid {requested:?} is not valid, using {fallback:?}"),
            Warning::TapCreateFailed { intf, reason } => {
                write!(f, "failed to create tap {intf}: {reason}")
            }
            Warning::InstallFailed { intf, reason } => {
                write!(f, "failed to install {intf}: {reason}")
            }
            Warning::MigrationFailed { intf, reason } => {
                write!(f, "failed to move {intf} into its namespace: {reason}")
            }
            Warning::TapRemovalFailed { intf, reason } => {
                write!(f, "failed to remove tap {intf}: {reason}")
            }
            Warning::NoConstantVelocity { node } => write!(
                f,
                "node {node} does not use a constant-velocity mobility model"
            ),
        }
    }
}
