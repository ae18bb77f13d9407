//! 仿真生命周期
//!
//! `Emulation` 持有 OS 边界、引擎（空闲时直接持有，运行时由工作线程持有）、
//! 资源登记与 OS 节点。状态机：`Idle → Running → StopRequested → Stopped`，
//! `clear()` 回到 `Idle`。

use super::intf::{BridgeIntf, IntfId};
use super::node::{EmuNode, NodeKey, NodeKind};
use super::registry::Registry;
use crate::config::EmuConfig;
use crate::engine::{Engine, EngineError, EngineWorker, MobilityKind, NodeHandle, Stats, Vector3};
use crate::error::{Error, Result, Warning};
use crate::os::HostOs;
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Idle,
    Running,
    StopRequested,
    Stopped,
}

/// 引擎所在位置；运行时只能通过工作线程访问
enum EngineSlot {
    Idle(Box<Engine>),
    Running(EngineWorker),
    /// 工作线程 panic 或创建失败，引擎已丢失
    Poisoned,
}

impl fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSlot::Idle(e) => f.debug_tuple("Idle").field(e).finish(),
            EngineSlot::Running(_) => f.write_str("Running"),
            EngineSlot::Poisoned => f.write_str("Poisoned"),
        }
    }
}

#[derive(Debug)]
pub struct Emulation {
    pub(super) os: Arc<dyn HostOs>,
    pub(super) config: EmuConfig,
    engine: EngineSlot,
    /// 最近一次见到的引擎代数，引擎丢失后据此重建
    epoch: u32,
    state: SimState,
    pub(super) registry: Registry,
    nodes: Vec<EmuNode>,
    warnings: Vec<Warning>,
    draws: u64,
}

/// splitmix64
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

impl Emulation {
    pub fn new(os: Arc<dyn HostOs>, config: EmuConfig) -> Self {
        let engine = Engine::new(Arc::clone(&os));
        Self {
            os,
            config,
            engine: EngineSlot::Idle(Box::new(engine)),
            epoch: 0,
            state: SimState::Idle,
            registry: Registry::default(),
            nodes: Vec::new(),
            warnings: Vec::new(),
            draws: 0,
        }
    }

    pub fn config(&self) -> &EmuConfig {
        &self.config
    }

    pub fn os(&self) -> &Arc<dyn HostOs> {
        &self.os
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.engine, EngineSlot::Running(_))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// 记录一个可继续运行的异常情况
    pub(crate) fn report(&mut self, w: Warning) {
        warn!("⚠️  {w}");
        self.warnings.push(w);
    }

    /// 确定性伪随机数（splitmix64），由 `channel_seed` 决定序列
    pub(crate) fn next_random(&mut self) -> u64 {
        self.draws += 1;
        mix64(self.config.channel_seed ^ self.draws.wrapping_mul(0x9E3779B97F4A7C15))
    }

    // ---------------------------------------------------------------------
    // OS 节点
    // ---------------------------------------------------------------------

    /// 添加主机：创建同名命名空间
    pub fn add_host(&mut self, name: &str) -> Result<NodeKey> {
        self.add_node(name, NodeKind::Host, Some(name.to_string()))
    }

    /// 添加交换机：位于根命名空间
    pub fn add_switch(&mut self, name: &str) -> Result<NodeKey> {
        self.add_node(name, NodeKind::Switch, None)
    }

    pub fn add_node(&mut self, name: &str, kind: NodeKind, namespace: Option<String>) -> Result<NodeKey> {
        if self.nodes.iter().any(|n| n.name() == name) {
            return Err(Error::DuplicateNode(name.to_string()));
        }
        if let Some(ns) = &namespace {
            self.os.create_namespace(ns)?;
        }
        let key = NodeKey(self.nodes.len());
        debug!(node = name, ?kind, namespace = ?namespace, "添加节点");
        self.nodes.push(EmuNode::new(key, name, kind, namespace));
        Ok(key)
    }

    pub fn node(&self, key: NodeKey) -> Result<&EmuNode> {
        self.nodes.get(key.0).ok_or(Error::UnknownNode(key))
    }

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> Result<&mut EmuNode> {
        self.nodes.get_mut(key.0).ok_or(Error::UnknownNode(key))
    }

    pub fn node_by_name(&self, name: &str) -> Option<&EmuNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn nodes(&self) -> &[EmuNode] {
        &self.nodes
    }

    // ---------------------------------------------------------------------
    // 引擎访问
    // ---------------------------------------------------------------------

    /// 空闲引擎的可变引用；运行时返回 `EngineBusy`
    pub fn engine_mut(&mut self, op: &'static str) -> Result<&mut Engine> {
        match &mut self.engine {
            EngineSlot::Idle(e) => Ok(e.as_mut()),
            EngineSlot::Running(_) => Err(Error::EngineBusy(op)),
            EngineSlot::Poisoned => Err(Error::EnginePoisoned),
        }
    }

    /// 在引擎上执行闭包：空闲时直接执行，运行时交给工作线程在事件之间执行
    pub fn with_engine<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine) -> T + Send + 'static,
    {
        match &mut self.engine {
            EngineSlot::Idle(e) => Ok(f(e.as_mut())),
            EngineSlot::Running(w) => Ok(w.call(f)?),
            EngineSlot::Poisoned => Err(Error::EnginePoisoned),
        }
    }

    /// 取得（必要时创建）OS 节点对应的仿真节点
    pub fn get_or_create_sim_node(&mut self, key: NodeKey) -> Result<NodeHandle> {
        self.node(key)?;
        if let Some(h) = self.registry.sim_node(key) {
            return Ok(h);
        }
        let h = self.engine_mut("create a simulated node")?.create_node();
        self.registry.insert_sim_node(key, h);
        Ok(h)
    }

    pub fn stats(&mut self) -> Result<Stats> {
        self.with_engine(|e| e.stats())
    }

    // ---------------------------------------------------------------------
    // 生命周期
    // ---------------------------------------------------------------------

    /// 安装所有未安装的接口，启动引擎线程，然后迁移接口。
    ///
    /// 已在运行时只记录警告。
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if let EngineSlot::Running(w) = &self.engine {
            if !w.is_finished() {
                self.report(Warning::AlreadyRunning);
                return Ok(());
            }
            info!("仿真线程已到达截止时间并退出，回收引擎后重新启动");
            self.reclaim()?;
        }
        if matches!(self.engine, EngineSlot::Poisoned) {
            return Err(Error::EnginePoisoned);
        }

        let pending: Vec<(IntfId, String)> = self
            .registry
            .intfs()
            .iter()
            .filter(|i| !i.is_installed())
            .map(|i| (i.id(), i.name().to_string()))
            .collect();
        for (id, name) in pending {
            if let Err(e) = self.install_intf(id) {
                self.report(Warning::InstallFailed {
                    intf: name,
                    reason: e.to_string(),
                });
            }
        }

        let EngineSlot::Idle(engine) = std::mem::replace(&mut self.engine, EngineSlot::Poisoned)
        else {
            return Err(Error::EnginePoisoned);
        };
        self.epoch = engine.epoch();
        let worker = EngineWorker::spawn(*engine, self.config.worker_opts()).map_err(Error::Spawn)?;
        self.engine = EngineSlot::Running(worker);
        self.state = SimState::Running;
        info!(
            intfs = self.registry.intfs().len(),
            sim_nodes = self.registry.sim_nodes().len(),
            "🚀 仿真已启动"
        );

        let unmigrated: Vec<(IntfId, String)> = self
            .registry
            .intfs()
            .iter()
            .filter(|i| !i.in_right_namespace())
            .map(|i| (i.id(), i.name().to_string()))
            .collect();
        for (id, name) in unmigrated {
            if let Err(e) = self.migrate_intf(id) {
                self.report(Warning::MigrationFailed {
                    intf: name,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 请求引擎在 1ms 仿真时间后停止，并等待线程退出
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) -> Result<()> {
        let EngineSlot::Running(w) = &self.engine else {
            debug!("仿真未在运行，忽略 stop");
            return Ok(());
        };
        self.state = SimState::StopRequested;
        if w.request_stop(self.config.stop_delay()).is_err() {
            debug!("仿真线程已退出");
        }
        while !w.is_finished() {
            thread::sleep(self.config.stop_poll());
        }
        self.reclaim()?;
        info!("⏹️  仿真已停止");
        Ok(())
    }

    /// 回收已退出的工作线程持有的引擎
    fn reclaim(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.engine, EngineSlot::Poisoned) {
            EngineSlot::Running(w) => {
                self.state = SimState::Stopped;
                let engine = w.join()?;
                self.epoch = engine.epoch();
                self.engine = EngineSlot::Idle(Box::new(engine));
                Ok(())
            }
            other => {
                self.engine = other;
                Ok(())
            }
        }
    }

    /// 销毁全部仿真状态并清空登记表；返回被清理的接口（均已标记为未安装）
    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) -> Result<Vec<BridgeIntf>> {
        if let EngineSlot::Running(w) = &self.engine {
            if !w.is_finished() {
                return Err(Error::ClearWhileRunning);
            }
            if let Err(e) = self.reclaim() {
                warn!(error = %e, "回收仿真线程失败，重建引擎");
            }
        }

        let lost = match &mut self.engine {
            EngineSlot::Idle(engine) => {
                engine.destroy();
                self.epoch = engine.epoch();
                false
            }
            _ => true,
        };
        if lost {
            self.epoch = self.epoch.wrapping_add(1);
            let engine = Engine::with_epoch(Arc::clone(&self.os), self.epoch);
            self.engine = EngineSlot::Idle(Box::new(engine));
        }

        let mut cleared = self.registry.drain();
        for intf in &mut cleared {
            intf.mark_uninstalled();
            if let Ok(node) = self.node_mut(intf.node()) {
                node.release_port(intf.port());
            }
            if self.config.remove_taps_on_clear && intf.tap_exists() {
                if let Err(e) = self.os.delete_intf(intf.name(), intf.current_namespace()) {
                    self.report(Warning::TapRemovalFailed {
                        intf: intf.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.state = SimState::Idle;
        info!(intfs = cleared.len(), epoch = self.epoch, "🧹 仿真状态已清理");
        Ok(cleared)
    }

    // ---------------------------------------------------------------------
    // 移动模型
    // ---------------------------------------------------------------------

    /// 仿真节点与匀速移动模型，没有时创建
    fn ensure_mobility(&mut self, key: NodeKey) -> Result<NodeHandle> {
        let h = self.get_or_create_sim_node(key)?;
        self.with_engine(move |e| -> std::result::Result<(), EngineError> {
            if e.mobility_kind(h)?.is_none() {
                e.install_mobility(h, MobilityKind::ConstantVelocity)?;
            }
            Ok(())
        })??;
        Ok(h)
    }

    pub fn has_mobility_model(&mut self, key: NodeKey) -> Result<bool> {
        let Some(h) = self.registry.sim_node(key) else {
            return Ok(false);
        };
        Ok(self.with_engine(move |e| e.mobility_kind(h))??.is_some())
    }

    pub fn set_mobility_model(&mut self, key: NodeKey, kind: MobilityKind) -> Result<()> {
        let h = self.get_or_create_sim_node(key)?;
        Ok(self.with_engine(move |e| e.install_mobility(h, kind))??)
    }

    pub fn get_position(&mut self, key: NodeKey) -> Result<Vector3> {
        let h = self.ensure_mobility(key)?;
        Ok(self.with_engine(move |e| e.position(h))??)
    }

    pub fn set_position(&mut self, key: NodeKey, pos: Vector3) -> Result<()> {
        let h = self.ensure_mobility(key)?;
        Ok(self.with_engine(move |e| e.set_position(h, pos))??)
    }

    /// 匀速模型的速度；其他模型记录警告并返回零向量
    pub fn get_velocity(&mut self, key: NodeKey) -> Result<Vector3> {
        let h = self.ensure_mobility(key)?;
        match self.with_engine(move |e| e.velocity(h))? {
            Ok(v) => Ok(v),
            Err(EngineError::NotConstantVelocity(_)) => {
                self.warn_no_constant_velocity(key);
                Ok(Vector3::ZERO)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 设置匀速模型的速度；其他模型记录警告并忽略
    pub fn set_velocity(&mut self, key: NodeKey, v: Vector3) -> Result<()> {
        let h = self.ensure_mobility(key)?;
        match self.with_engine(move |e| e.set_velocity(h, v))? {
            Ok(()) => Ok(()),
            Err(EngineError::NotConstantVelocity(_)) => {
                self.warn_no_constant_velocity(key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn warn_no_constant_velocity(&mut self, key: NodeKey) {
        let node = self
            .node(key)
            .map(|n| n.name().to_string())
            .unwrap_or_default();
        self.report(Warning::NoConstantVelocity { node });
    }
}

impl Drop for Emulation {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                warn!(error = %e, "停止仿真线程失败");
            }
        }
    }
}
