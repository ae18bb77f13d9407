use crate::config::EmuConfig;
use crate::emu::Emulation;
use crate::os::{HostOs, MemoryOs};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 内存 OS 上的 Emulation；迁移轮询调快，不额外等待
pub(super) fn memory_emulation() -> (Arc<MemoryOs>, Emulation) {
    memory_emulation_with(EmuConfig {
        migrate_attempts: 400,
        migrate_interval_ms: 5,
        migrate_settle_ms: 0,
        ..Default::default()
    })
}

pub(super) fn memory_emulation_with(config: EmuConfig) -> (Arc<MemoryOs>, Emulation) {
    let os = Arc::new(MemoryOs::new());
    let emu = Emulation::new(Arc::clone(&os) as Arc<dyn HostOs>, config);
    (os, emu)
}

/// 轮询直到条件成立或超时
pub(super) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
