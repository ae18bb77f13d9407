//! 仿真中的 OS 节点（主机 / 交换机）

use crate::engine::BridgeMode;
use crate::error::{Error, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Host,
    Switch,
}

impl NodeKind {
    /// 没有端口在用时分配的第一个端口号
    pub fn port_base(&self) -> u32 {
        match self {
            NodeKind::Host => 0,
            NodeKind::Switch => 1,
        }
    }

    /// 交换机转发任意源地址的帧，需要 UseBridge
    pub fn default_mode(&self) -> BridgeMode {
        match self {
            NodeKind::Host => BridgeMode::UseLocal,
            NodeKind::Switch => BridgeMode::UseBridge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmuNode {
    key: NodeKey,
    name: String,
    kind: NodeKind,
    namespace: Option<String>,
    ports: BTreeSet<u32>,
}

impl EmuNode {
    pub(crate) fn new(key: NodeKey, name: &str, kind: NodeKind, namespace: Option<String>) -> Self {
        Self {
            key,
            name: name.to_string(),
            kind,
            namespace,
            ports: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.ports.iter().copied()
    }

    pub fn port_in_use(&self, port: u32) -> bool {
        self.ports.contains(&port)
    }

    /// 下一个可用端口：在用端口最大值加一，或端口基数
    pub fn new_port(&self) -> u32 {
        self.ports
            .last()
            .map(|p| p + 1)
            .unwrap_or_else(|| self.kind.port_base())
    }

    /// 默认接口名 `<node>-eth<port>`
    pub fn intf_name(&self, port: u32) -> String {
        format!("{}-eth{}", self.name, port)
    }

    pub(crate) fn claim_port(&mut self, port: Option<u32>) -> Result<u32> {
        let port = port.unwrap_or_else(|| self.new_port());
        if !self.ports.insert(port) {
            return Err(Error::PortInUse {
                node: self.name.clone(),
                port,
            });
        }
        Ok(port)
    }

    pub(crate) fn release_port(&mut self, port: u32) {
        self.ports.remove(&port);
    }
}
