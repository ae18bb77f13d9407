//! 引擎工作线程
//!
//! 仿真在一个专用后台线程里按墙钟时间推进。调用方通过命令通道提交
//! 闭包，闭包在两个事件之间以 `&mut Engine` 执行，结果经应答通道返回。
//! 停止事件触发后线程退出，`join()` 取回引擎。

use super::sim_engine::Engine;
use crate::sim::SimTime;
use std::sync::mpsc::{self, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

type Job = Box<dyn FnOnce(&mut Engine) + Send + 'static>;

enum Command {
    Exec(Job),
    Stop { delay: SimTime },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("engine worker has exited")]
    Gone,
    #[error("engine worker panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOpts {
    /// 启动时调度的硬截止停止（相对当前仿真时间）
    pub hard_deadline: SimTime,
    /// 每轮之间的休眠
    pub pump_interval: Duration,
}

impl Default for WorkerOpts {
    fn default() -> Self {
        Self {
            hard_deadline: SimTime::from_secs(3600),
            pump_interval: Duration::from_millis(1),
        }
    }
}

#[derive(Debug)]
pub struct EngineWorker {
    tx: mpsc::Sender<Command>,
    handle: JoinHandle<Engine>,
}

impl EngineWorker {
    /// 启动工作线程。线程创建失败时引擎随之丢失。
    pub fn spawn(engine: Engine, opts: WorkerOpts) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("tapsim-engine".to_string())
            .spawn(move || run_loop(engine, rx, opts))?;
        Ok(Self { tx, handle })
    }

    /// 在工作线程上执行闭包并等待结果
    pub fn call<T, F>(&self, f: F) -> Result<T, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move |engine: &mut Engine| {
            let _ = reply_tx.send(f(engine));
        });
        self.tx
            .send(Command::Exec(job))
            .map_err(|_| WorkerError::Gone)?;
        reply_rx.recv().map_err(|_| WorkerError::Gone)
    }

    /// 请求在 `now + delay` 停止
    pub fn request_stop(&self, delay: SimTime) -> Result<(), WorkerError> {
        self.tx
            .send(Command::Stop { delay })
            .map_err(|_| WorkerError::Gone)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待线程退出并取回引擎
    pub fn join(self) -> Result<Engine, WorkerError> {
        let EngineWorker { tx, handle } = self;
        drop(tx);
        handle.join().map_err(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WorkerError::Panicked(msg)
        })
    }
}

fn run_loop(mut engine: Engine, rx: mpsc::Receiver<Command>, opts: WorkerOpts) -> Engine {
    let _span = info_span!("engine_worker", epoch = engine.epoch()).entered();
    engine.start();
    engine.schedule_stop(opts.hard_deadline);

    let wall_origin = Instant::now();
    let sim_origin = engine.now();
    info!(now = %sim_origin, hard_deadline = %opts.hard_deadline, "▶️  仿真线程启动");

    let mut rounds: u64 = 0;
    loop {
        loop {
            match rx.try_recv() {
                Ok(Command::Exec(job)) => job(&mut engine),
                Ok(Command::Stop { delay }) => {
                    debug!(now = %engine.now(), delay = %delay, "收到停止请求");
                    engine.schedule_stop(delay);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("控制端已断开，停止仿真");
                    engine.schedule_stop(SimTime::ZERO);
                    break;
                }
            }
        }

        let target = sim_origin.saturating_add(SimTime::from_duration(wall_origin.elapsed()));
        rounds += 1;
        if engine.pump(target) {
            break;
        }
        thread::sleep(opts.pump_interval);
    }

    info!(now = %engine.now(), rounds, stats = ?engine.stats(), "✅ 仿真线程退出");
    engine
}
