//! 仿真桥接层
//!
//! 把 OS 节点上的 tap 接口接入仿真引擎：桥接接口、共享介质（Segment）、
//! 两点链路（Link），以及控制仿真启动/停止/清理的 `Emulation`。

// 子模块声明
mod intf;
mod lifecycle;
mod link;
mod node;
mod registry;
mod segment;

// 重新导出公共接口
pub use intf::{BridgeIntf, IntfId, IntfSpec};
pub use lifecycle::{Emulation, SimState};
pub use link::{Link, LinkKind, LinkOpts, create_link};
pub use node::{EmuNode, NodeKey, NodeKind};
pub use registry::Registry;
pub use segment::{
    ApOpts, AttachOpts, CsmaSegment, Segment, SegmentKind, SimpleSegment, StaOpts, WifiSegment,
    WifiSegmentOpts, create_segment,
};
