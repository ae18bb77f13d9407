//! 引擎对象句柄
//!
//! 句柄是引擎内部数组的下标，附带创建时的引擎代数（epoch）。
//! `Engine::destroy()` 之后代数加一，旧句柄全部失效。

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub(crate) epoch: u32,
            pub(crate) index: usize,
        }

        impl $name {
            pub(crate) fn new(epoch: u32, index: usize) -> Self {
                Self { epoch, index }
            }

            /// 在所属引擎代数内的下标
            pub fn index(&self) -> usize {
                self.index
            }

            /// 创建该句柄的引擎代数
            pub fn epoch(&self) -> u32 {
                self.epoch
            }
        }
    };
}

engine_handle!(
    /// 仿真节点句柄
    NodeHandle
);
engine_handle!(
    /// 仿真网络设备句柄
    DeviceHandle
);
engine_handle!(
    /// 信道句柄
    ChannelHandle
);
engine_handle!(
    /// TapBridge 设备句柄
    BridgeHandle
);
