//! 两点链路
//!
//! Link 是构造时恰好接入两个节点的 Segment，之后不再接受 attach。

use super::intf::IntfId;
use super::lifecycle::Emulation;
use super::node::NodeKey;
use super::segment::{
    ApOpts, AttachOpts, CsmaSegment, Segment, SimpleSegment, StaOpts, WifiSegment,
    WifiSegmentOpts,
};
use crate::engine::{ChannelHandle, DataRate};
use crate::error::Result;
use crate::sim::SimTime;
use tracing::info;

#[derive(Debug, Clone)]
pub enum LinkKind {
    Simple,
    Csma {
        data_rate: Option<DataRate>,
        delay: SimTime,
    },
    /// node1 为 AP，node2 为 STA，都在 1 号信道
    WifiApSta { ssid: Option<String> },
    /// WDS 点对点
    WifiBridge,
}

/// 两端各自的端口、接口名与模式
#[derive(Debug, Clone, Default)]
pub struct LinkOpts {
    pub end1: AttachOpts,
    pub end2: AttachOpts,
}

#[derive(Debug)]
pub struct Link {
    segment: Box<dyn Segment>,
    intf1: IntfId,
    intf2: IntfId,
}

impl Link {
    pub fn intf1(&self) -> IntfId {
        self.intf1
    }

    pub fn intf2(&self) -> IntfId {
        self.intf2
    }

    pub fn channel(&self) -> ChannelHandle {
        self.segment.channel()
    }

    pub fn segment(&self) -> &dyn Segment {
        self.segment.as_ref()
    }
}

#[tracing::instrument(skip(emu, opts))]
pub fn create_link(
    emu: &mut Emulation,
    node1: NodeKey,
    node2: NodeKey,
    kind: LinkKind,
    opts: LinkOpts,
) -> Result<Link> {
    let LinkOpts { end1, end2 } = opts;
    let (segment, intf1, intf2): (Box<dyn Segment>, IntfId, IntfId) = match kind {
        LinkKind::Simple => {
            let mut seg = SimpleSegment::new(emu)?;
            let a = seg.attach(emu, node1, end1)?;
            let b = seg.attach(emu, node2, end2)?;
            (Box::new(seg), a, b)
        }
        LinkKind::Csma { data_rate, delay } => {
            let mut seg = CsmaSegment::new(emu, data_rate, delay)?;
            let a = seg.attach(emu, node1, end1)?;
            let b = seg.attach(emu, node2, end2)?;
            (Box::new(seg), a, b)
        }
        LinkKind::WifiApSta { ssid } => {
            let mut seg = WifiSegment::new(emu, WifiSegmentOpts::default())?;
            let a = seg.add_ap(
                emu,
                node1,
                ApOpts {
                    channel: 1,
                    ssid: ssid.clone(),
                    attach: end1,
                    ..Default::default()
                },
            )?;
            let b = seg.add_sta(
                emu,
                node2,
                StaOpts {
                    channel: 1,
                    ssid,
                    attach: end2,
                    ..Default::default()
                },
            )?;
            (Box::new(seg), a, b)
        }
        LinkKind::WifiBridge => {
            let mut seg = WifiSegment::new(emu, WifiSegmentOpts::default())?;
            let (a, b) = seg.add_wds_pair(emu, (node1, node2), (end1, end2))?;
            (Box::new(seg), a, b)
        }
    };
    info!(kind = segment.kind_name(), ?intf1, ?intf2, "🔗 链路已创建");
    Ok(Link {
        segment,
        intf1,
        intf2,
    })
}
