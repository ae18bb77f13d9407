//! 桥接接口
//!
//! 一个 OS tap 接口与一个仿真设备的配对。tap 先建在根命名空间，
//! 安装（install）时在仿真节点上添加 TapBridge；仿真运行、引擎打开
//! tap 之后再迁移（migrate）到所属主机的命名空间。

use super::lifecycle::Emulation;
use super::node::NodeKey;
use crate::engine::{AttrValue, BridgeHandle, BridgeMode, DeviceHandle, MacAddr, NodeHandle, TapBridgeConfig};
use crate::error::{Error, Result, Warning};
use std::net::IpAddr;
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntfId(pub u64);

/// 创建桥接接口的参数
#[derive(Debug, Clone)]
pub struct IntfSpec {
    pub name: String,
    pub node: NodeKey,
    pub port: Option<u32>,
    pub sim_node: Option<NodeHandle>,
    pub device: Option<DeviceHandle>,
    pub mode: Option<BridgeMode>,
}

impl IntfSpec {
    pub fn new(name: impl Into<String>, node: NodeKey) -> Self {
        Self {
            name: name.into(),
            node,
            port: None,
            sim_node: None,
            device: None,
            mode: None,
        }
    }

    pub fn port(mut self, port: u32) -> Self {
        self.port = Some(port);
        self
    }

    pub fn sim_node(mut self, sim_node: NodeHandle) -> Self {
        self.sim_node = Some(sim_node);
        self
    }

    pub fn device(mut self, device: DeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    pub fn mode(mut self, mode: BridgeMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

#[derive(Debug, Clone)]
pub struct BridgeIntf {
    id: IntfId,
    name: String,
    node: NodeKey,
    port: u32,
    /// 所属节点的命名空间（迁移目标）
    namespace: Option<String>,
    sim_node: Option<NodeHandle>,
    device: Option<DeviceHandle>,
    /// 安装前为调用方指定的模式（可能为空），安装后为解析结果
    mode: Option<BridgeMode>,
    bridge: Option<BridgeHandle>,
    installed: bool,
    in_right_namespace: bool,
    tap_exists: bool,
    ip: Option<(IpAddr, u8)>,
    up: bool,
}

impl BridgeIntf {
    pub fn id(&self) -> IntfId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn sim_node(&self) -> Option<NodeHandle> {
        self.sim_node
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    pub fn mode(&self) -> Option<BridgeMode> {
        self.mode
    }

    pub fn bridge(&self) -> Option<BridgeHandle> {
        self.bridge
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn in_right_namespace(&self) -> bool {
        self.in_right_namespace
    }

    pub fn tap_exists(&self) -> bool {
        self.tap_exists
    }

    pub fn ip(&self) -> Option<(IpAddr, u8)> {
        self.ip
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// 接口当前所在的命名空间
    pub fn current_namespace(&self) -> Option<&str> {
        if self.in_right_namespace {
            self.namespace.as_deref()
        } else {
            None
        }
    }

    pub(crate) fn mark_uninstalled(&mut self) {
        self.installed = false;
        self.bridge = None;
    }
}

impl Emulation {
    pub fn intf(&self, id: IntfId) -> Result<&BridgeIntf> {
        self.registry
            .intf(id)
            .ok_or_else(|| Error::UnknownIntf(format!("{id:?}")))
    }

    fn intf_mut(&mut self, id: IntfId) -> Result<&mut BridgeIntf> {
        self.registry
            .intf_mut(id)
            .ok_or_else(|| Error::UnknownIntf(format!("{id:?}")))
    }

    /// 创建 tap 并登记接口；两个仿真句柄都已知且引擎空闲时立即安装。
    ///
    /// tap 创建失败与安装失败都只记录警告，接口仍然登记。
    #[tracing::instrument(skip(self, spec), fields(name = %spec.name))]
    pub fn create_intf(&mut self, spec: IntfSpec) -> Result<IntfId> {
        let node = self.node_mut(spec.node)?;
        let port = node.claim_port(spec.port)?;
        let namespace = node.namespace().map(str::to_string);

        let tap_exists = match self.os.create_tap(&spec.name) {
            Ok(()) => true,
            Err(e) => {
                self.report(Warning::TapCreateFailed {
                    intf: spec.name.clone(),
                    reason: e.to_string(),
                });
                false
            }
        };

        let id = self.registry.next_id();
        let intf = BridgeIntf {
            id,
            name: spec.name,
            node: spec.node,
            port,
            in_right_namespace: namespace.is_none(),
            namespace,
            sim_node: spec.sim_node,
            device: spec.device,
            mode: spec.mode,
            bridge: None,
            installed: false,
            tap_exists,
            ip: None,
            up: false,
        };
        debug!(intf = %intf.name, port, tap_exists, "登记桥接接口");
        let both_known = intf.sim_node.is_some() && intf.device.is_some();
        let name = intf.name.clone();
        self.registry.register(intf);

        if both_known && !self.is_running() {
            if let Err(e) = self.install_intf(id) {
                self.report(Warning::InstallFailed {
                    intf: name,
                    reason: e.to_string(),
                });
            }
        }
        Ok(id)
    }

    /// 为尚未安装的接口设置仿真节点与设备
    pub fn bind_intf(&mut self, id: IntfId, sim_node: NodeHandle, device: DeviceHandle) -> Result<()> {
        let intf = self.intf_mut(id)?;
        if intf.installed {
            return Ok(());
        }
        intf.sim_node = Some(sim_node);
        intf.device = Some(device);
        Ok(())
    }

    /// 在仿真节点上添加 TapBridge 并绑定设备；已安装时什么也不做。
    ///
    /// tap 没有建成的接口不能安装，保持未安装状态，可以直接删除。
    #[tracing::instrument(skip(self))]
    pub fn install_intf(&mut self, id: IntfId) -> Result<()> {
        let intf = self.intf(id)?;
        if intf.installed {
            return Ok(());
        }
        let name = intf.name.clone();
        if !intf.tap_exists {
            return Err(Error::TapMissing(name));
        }
        let sim_node = intf
            .sim_node
            .ok_or_else(|| Error::MissingSimNode(name.clone()))?;
        let device = intf
            .device
            .ok_or_else(|| Error::MissingDevice(name.clone()))?;
        let requested = intf.mode;
        let mode = match requested {
            Some(m) => m,
            None => self.node(intf.node)?.kind().default_mode(),
        };

        let engine = self.engine_mut("install")?;
        let bridge = engine.add_tap_bridge(
            sim_node,
            device,
            TapBridgeConfig {
                mode,
                device_name: name.clone(),
            },
        )?;

        let intf = self.intf_mut(id)?;
        intf.bridge = Some(bridge);
        intf.mode = Some(mode);
        intf.installed = true;
        info!(intf = %name, %mode, "✅ 接口已安装到仿真");
        Ok(())
    }

    /// 引擎是否已打开该接口的 tap
    pub fn intf_link_up(&mut self, id: IntfId) -> Result<bool> {
        let bridge = self
            .intf(id)?
            .bridge
            .ok_or_else(|| Error::NotInstalled(format!("{id:?}")))?;
        Ok(self.with_engine(move |e| e.bridge_link_up(bridge))??)
    }

    /// 等引擎打开 tap 后把接口移入所属命名空间。
    ///
    /// 迁移会重置地址与 up 状态，之后重新应用之前配置的 IP 并拉起链路。
    #[tracing::instrument(skip(self))]
    pub fn migrate_intf(&mut self, id: IntfId) -> Result<()> {
        let intf = self.intf(id)?;
        if intf.in_right_namespace {
            return Ok(());
        }
        let name = intf.name.clone();
        let installed = intf.installed;
        let Some(ns) = intf.namespace.clone() else {
            self.intf_mut(id)?.in_right_namespace = true;
            return Ok(());
        };
        if !installed {
            return Err(Error::NotInstalled(name));
        }

        let attempts = self.config.migrate_attempts;
        let mut up = false;
        for attempt in 0..attempts {
            if self.intf_link_up(id)? {
                debug!(intf = %name, attempt, "tap bridge 已连接");
                up = true;
                break;
            }
            thread::sleep(self.config.migrate_interval());
        }
        if !up {
            return Err(Error::MigrationTimeout {
                intf: name,
                attempts,
            });
        }
        thread::sleep(self.config.migrate_settle());

        self.os.move_intf(&name, &ns)?;
        let intf = self.intf_mut(id)?;
        intf.in_right_namespace = true;
        let ip = intf.ip;
        if let Some((addr, prefix)) = ip {
            self.os.set_ip(&name, Some(&ns), addr, prefix)?;
        }
        self.os.set_link_up(&name, Some(&ns), true)?;
        self.intf_mut(id)?.up = true;
        info!(intf = %name, namespace = %ns, "🚚 接口已迁移到命名空间");
        Ok(())
    }

    /// 在接口当前所在的命名空间里执行命令
    pub fn intf_cmd(&self, id: IntfId, cmd: &str) -> Result<String> {
        let intf = self.intf(id)?;
        Ok(self.os.exec(intf.current_namespace(), cmd)?)
    }

    pub fn set_intf_ip(&mut self, id: IntfId, addr: IpAddr, prefix: u8) -> Result<()> {
        let intf = self.intf(id)?;
        self.os
            .set_ip(&intf.name, intf.current_namespace(), addr, prefix)?;
        self.intf_mut(id)?.ip = Some((addr, prefix));
        Ok(())
    }

    pub fn set_intf_up(&mut self, id: IntfId, up: bool) -> Result<()> {
        let intf = self.intf(id)?;
        self.os
            .set_link_up(&intf.name, intf.current_namespace(), up)?;
        self.intf_mut(id)?.up = up;
        Ok(())
    }

    pub fn intf_mac(&self, id: IntfId) -> Result<MacAddr> {
        let intf = self.intf(id)?;
        Ok(self.os.intf_mac(&intf.name, intf.current_namespace())?)
    }

    /// 重命名接口；已安装且 tap 尚未打开时同步更新引擎的 DeviceName
    #[tracing::instrument(skip(self))]
    pub fn rename_intf(&mut self, id: IntfId, new_name: &str) -> Result<()> {
        let intf = self.intf(id)?;
        let old = intf.name.clone();
        let bridge = if intf.installed { intf.bridge } else { None };
        let tap_exists = intf.tap_exists;
        let ns = intf.current_namespace().map(str::to_string);

        if let Some(bridge) = bridge {
            if self.intf_link_up(id)? {
                return Err(Error::RenameAfterConnect(old));
            }
            let value = AttrValue::from(new_name);
            self.with_engine(move |e| e.set_bridge_attribute(bridge, "DeviceName", value))??;
        }
        if tap_exists {
            self.os.rename_intf(&old, new_name, ns.as_deref())?;
        }
        self.intf_mut(id)?.name = new_name.to_string();
        debug!(old = %old, new = %new_name, "接口已重命名");
        Ok(())
    }

    /// 删除未安装的接口：移除 tap 并注销
    #[tracing::instrument(skip(self))]
    pub fn delete_intf(&mut self, id: IntfId) -> Result<()> {
        let intf = self.intf(id)?;
        if intf.installed {
            return Err(Error::DeleteInstalled(intf.name.clone()));
        }
        if intf.tap_exists {
            self.os.delete_intf(&intf.name, intf.current_namespace())?;
        }
        if let Some(intf) = self.registry.unregister(id) {
            if let Ok(node) = self.node_mut(intf.node) {
                node.release_port(intf.port);
            }
            debug!(intf = %intf.name, "接口已删除");
        }
        Ok(())
    }
}
