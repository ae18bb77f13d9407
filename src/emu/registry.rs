//! 资源登记
//!
//! 保存所有活动的桥接接口，以及 OS 节点到仿真节点的映射。
//! 两者都按插入顺序保存，由 `Emulation::clear()` 清空。

use super::intf::{BridgeIntf, IntfId};
use super::node::NodeKey;
use crate::engine::NodeHandle;

#[derive(Debug, Default)]
pub struct Registry {
    intfs: Vec<BridgeIntf>,
    sim_nodes: Vec<(NodeKey, NodeHandle)>,
    next_id: u64,
}

impl Registry {
    pub fn intfs(&self) -> &[BridgeIntf] {
        &self.intfs
    }

    pub fn intf(&self, id: IntfId) -> Option<&BridgeIntf> {
        self.intfs.iter().find(|i| i.id() == id)
    }

    pub(crate) fn intf_mut(&mut self, id: IntfId) -> Option<&mut BridgeIntf> {
        self.intfs.iter_mut().find(|i| i.id() == id)
    }

    pub fn intf_by_name(&self, name: &str) -> Option<&BridgeIntf> {
        self.intfs.iter().find(|i| i.name() == name)
    }

    pub(crate) fn next_id(&mut self) -> IntfId {
        self.next_id += 1;
        IntfId(self.next_id)
    }

    pub(crate) fn register(&mut self, intf: BridgeIntf) {
        self.intfs.push(intf);
    }

    pub(crate) fn unregister(&mut self, id: IntfId) -> Option<BridgeIntf> {
        let idx = self.intfs.iter().position(|i| i.id() == id)?;
        Some(self.intfs.remove(idx))
    }

    pub fn sim_nodes(&self) -> &[(NodeKey, NodeHandle)] {
        &self.sim_nodes
    }

    pub fn sim_node(&self, key: NodeKey) -> Option<NodeHandle> {
        self.sim_nodes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, h)| *h)
    }

    pub(crate) fn insert_sim_node(&mut self, key: NodeKey, handle: NodeHandle) {
        self.sim_nodes.push((key, handle));
    }

    pub fn is_empty(&self) -> bool {
        self.intfs.is_empty() && self.sim_nodes.is_empty()
    }

    /// 清空两张表，返回被移除的接口
    pub(crate) fn drain(&mut self) -> Vec<BridgeIntf> {
        self.sim_nodes.clear();
        std::mem::take(&mut self.intfs)
    }
}
