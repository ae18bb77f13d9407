//! 运行参数
//!
//! 所有字段都有默认值，JSON 文件里只需写要覆盖的项。

use crate::engine::WorkerOpts;
use crate::error::Result;
use crate::sim::SimTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmuConfig {
    /// 启动时调度的硬截止停止（仿真秒）
    pub default_duration_s: u64,
    /// 迁移前轮询 tap "link up" 的次数
    pub migrate_attempts: u32,
    pub migrate_interval_ms: u64,
    /// link up 之后、移动接口之前的额外等待
    pub migrate_settle_ms: u64,
    /// 停止请求调度的停止事件距当前仿真时间的延迟
    pub stop_delay_ms: u64,
    /// 等待工作线程退出的轮询间隔
    pub stop_poll_ms: u64,
    /// 工作线程每轮之间的休眠
    pub pump_interval_ms: u64,
    /// clear() 时删除 tap
    pub remove_taps_on_clear: bool,
    /// `IpRoute` 是否经 sudo 执行
    pub use_sudo: bool,
    /// Wi-Fi 非法信道号替换用的种子
    pub channel_seed: u64,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            default_duration_s: 3600,
            migrate_attempts: 10,
            migrate_interval_ms: 10,
            migrate_settle_ms: 10,
            stop_delay_ms: 1,
            stop_poll_ms: 10,
            pump_interval_ms: 1,
            remove_taps_on_clear: true,
            use_sudo: false,
            channel_seed: 0,
        }
    }
}

impl EmuConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn worker_opts(&self) -> WorkerOpts {
        WorkerOpts {
            hard_deadline: SimTime::from_secs(self.default_duration_s),
            pump_interval: Duration::from_millis(self.pump_interval_ms),
        }
    }

    pub fn migrate_interval(&self) -> Duration {
        Duration::from_millis(self.migrate_interval_ms)
    }

    pub fn migrate_settle(&self) -> Duration {
        Duration::from_millis(self.migrate_settle_ms)
    }

    pub fn stop_delay(&self) -> SimTime {
        SimTime::from_millis(self.stop_delay_ms)
    }

    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }
}
