//! 队列策略（Queue disciplines）
//!
//! 竞争型设备（CSMA、Wi-Fi）在信道忙时把待发帧放进设备队列。
//! 目前只提供 DropTail（尾丢弃）队列。

use crate::engine::Frame;

// 子模块声明
mod drop_tail;

// 重新导出公共接口
pub use drop_tail::DropTailQueue;

/// 以太网帧的典型上限（不含 FCS）
pub const DEFAULT_FRAME_BYTES: u64 = 1514;

/// 设备队列默认可容纳的帧数
pub const DEFAULT_QUEUE_FRAMES: u64 = 100;

pub fn mem_from_frames(frames: u64) -> u64 {
    frames.saturating_mul(DEFAULT_FRAME_BYTES)
}

/// 帧队列抽象
pub trait FrameQueue: std::fmt::Debug + Send {
    /// 入队：成功返回 Ok；若被丢弃则返回 Err(frame)
    fn enqueue(&mut self, frame: Frame) -> Result<(), Frame>;
    /// 出队：按队列策略返回下一帧
    fn dequeue(&mut self) -> Option<Frame>;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
