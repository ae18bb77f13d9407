//! 仿真引擎模块
//!
//! 进程内的包级仿真引擎：节点、设备、信道、TapBridge、移动模型，
//! 以及在后台线程里实时运行引擎的 `EngineWorker`。

// 子模块声明
mod attr;
mod channel;
mod data_rate;
mod device;
mod error;
mod events;
mod frame;
mod id;
mod mac;
mod mobility;
mod net_world;
mod network;
mod sim_engine;
mod stats;
mod tap_bridge;
mod wifi;
mod worker;

// 重新导出公共接口
pub use attr::AttrValue;
pub use channel::{ChannelKind, CsmaParams, WifiChannelParams};
pub use data_rate::{DataRate, ParseDataRateError};
pub use device::DeviceSpec;
pub use error::EngineError;
pub use events::{Beacon, DeliverFrame, DeviceReady};
pub use frame::{ETH_HEADER_LEN, Frame};
pub use id::{BridgeHandle, ChannelHandle, DeviceHandle, NodeHandle};
pub use mac::{MacAddr, ParseMacError};
pub use mobility::{MobilityKind, Vector3};
pub use net_world::NetWorld;
pub use network::Network;
pub use sim_engine::Engine;
pub use stats::Stats;
pub use tap_bridge::{BridgeMode, ParseModeError, TapBridgeConfig};
pub use wifi::{
    DEFAULT_BEACON_INTERVAL, ScanType, Ssid, StationManager, WifiDeviceSpec, WifiRole, WifiStandard,
};
pub use worker::{EngineWorker, WorkerError, WorkerOpts};
