//! 事件 trait
//!
//! 定义仿真事件接口。帧投递、设备发送就绪、AP 信标与停止事件都实现此 trait。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
///
/// 需要 `Send`：整个事件队列会随引擎一起移交给后台仿真线程。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}
