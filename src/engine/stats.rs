//! 统计信息
//!
//! 引擎维护的帧计数器。

use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// 从 tap 读入仿真的帧
    pub frames_from_taps: u64,
    pub bytes_from_taps: u64,
    /// 仿真交付给 tap 的帧
    pub frames_to_taps: u64,
    pub bytes_to_taps: u64,
    /// 设备接收到的帧（过滤后）
    pub delivered_frames: u64,
    /// 设备队列溢出丢弃
    pub dropped_frames: u64,
    /// 地址过滤丢弃
    pub filtered_frames: u64,
    /// 不足以太网头长度的帧
    pub malformed_frames: u64,
    /// 写 tap 失败或 tap 尚未打开
    pub tap_errors: u64,
    pub associations: u64,
    pub disassociations: u64,
}
