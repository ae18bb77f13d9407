//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间、事件队列与停止标志。
//! 停止是协作式的：`StopEvent` 与普通事件一样进入队列，
//! 到期执行时置位停止标志，运行循环在该事件之后返回。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
    stopped: bool,
}

/// 事件：到期时停止仿真运行循环。
#[derive(Debug)]
pub struct StopEvent;

impl Event for StopEvent {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        info!(now = %sim.now(), "⏹️  停止事件触发");
        sim.stopped = true;
    }
}

fn short_type_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 队列中尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 是否已执行过停止事件
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// 清除停止标志，使运行循环可以继续（重新启动仿真时调用）。
    pub fn resume(&mut self) {
        self.stopped = false;
    }

    /// 调度事件在指定时间执行
    #[tracing::instrument(level = "trace", skip(self, ev), fields(event_type = short_type_name::<E>(), schedule_at = %at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let seq = self.next_seq;
        trace!(now = %self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            kind: short_type_name::<E>(),
            ev: Box::new(ev),
        });
    }

    /// 调度事件在 `now + delay` 执行
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 在 `now + delay` 调度一个停止事件。
    ///
    /// 早于停止时刻（以及同一时刻但先入队）的事件仍会被处理。
    pub fn schedule_stop(&mut self, delay: SimTime) {
        debug!(now = %self.now, delay = %delay, "调度停止事件");
        self.schedule_in(delay, StopEvent);
    }

    /// 运行直到事件队列为空、到达 `until` 或执行了停止事件。
    ///
    /// 未被停止时，仿真时间推进到 `until`；返回是否已停止。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) -> bool {
        while !self.stopped {
            let Some(top) = self.q.peek() else {
                break;
            };
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else {
                break;
            };
            self.now = item.at;
            trace!(now = %self.now, seq = item.seq, kind = item.kind, "执行事件");
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        if !self.stopped {
            self.now = self.now.max(until);
        }
        self.stopped
    }

    /// 运行所有事件直到队列为空或执行了停止事件。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = %self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count: u64 = 0;
        while !self.stopped {
            let Some(item) = self.q.pop() else {
                break;
            };
            event_count += 1;
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }

        info!(
            total_events = event_count,
            final_time = %self.now,
            stopped = self.stopped,
            "✅ 仿真运行结束"
        );
    }

    /// 丢弃全部事件并把时间归零。
    pub fn destroy(&mut self) {
        debug!(dropped_events = self.q.len(), "销毁仿真器状态");
        *self = Simulator::default();
    }
}
