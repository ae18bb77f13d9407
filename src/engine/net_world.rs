//! 网络世界实现
//!
//! 定义引擎的世界（World）实现，持有仿真网络。

use super::network::Network;
use crate::sim::World;
use std::any::Any;

/// 引擎的世界：持有 Network。
#[derive(Debug, Default)]
pub struct NetWorld {
    pub net: Network,
}

impl NetWorld {
    pub(crate) fn with_epoch(epoch: u32) -> Self {
        Self {
            net: Network::new(epoch),
        }
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
