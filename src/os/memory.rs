//! 内存中的 `HostOs`
//!
//! 模拟命名空间、tap 接口和 tap 帧队列，语义与 `IpRoute` 保持一致：
//! 迁移会重置地址与 up 状态，只有根命名空间里的 tap 能被打开。
//! 同一时刻一个 tap 只能被一个 `TapPort` 持有，端口释放后才能再次打开。
//! 测试通过 `inject` / `take_sent` 扮演内核侧。

use super::{HostOs, OsError, TapPort, validate_intf_name};
use crate::engine::MacAddr;
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

/// tap 两侧的帧队列；接口迁移后仍是同一个
#[derive(Debug, Default)]
struct Wire {
    /// 内核侧 → 引擎
    to_engine: VecDeque<Vec<u8>>,
    /// 引擎 → 内核侧
    to_kernel: Vec<Vec<u8>>,
    opened: bool,
    /// 当前有 `TapPort` 持有
    attached: bool,
    removed: bool,
}

#[derive(Debug)]
struct IntfEntry {
    name: String,
    namespace: Option<String>,
    mac: MacAddr,
    addrs: Vec<(IpAddr, u8)>,
    up: bool,
    wire: Arc<Mutex<Wire>>,
}

/// 接口快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemIntf {
    pub name: String,
    pub namespace: Option<String>,
    pub mac: MacAddr,
    pub addrs: Vec<(IpAddr, u8)>,
    pub up: bool,
    pub opened: bool,
}

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeSet<String>,
    intfs: Vec<IntfEntry>,
    next_mac: u32,
    fail_taps: BTreeSet<String>,
    fail_opens: BTreeSet<String>,
    commands: Vec<(Option<String>, String)>,
}

impl State {
    fn position(&self, name: &str, ns: Option<&str>) -> Option<usize> {
        self.intfs
            .iter()
            .position(|i| i.name == name && i.namespace.as_deref() == ns)
    }

    fn find(&self, name: &str, ns: Option<&str>) -> Result<usize, OsError> {
        self.position(name, ns)
            .ok_or_else(|| OsError::NoSuchInterface(name.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryOs {
    state: Mutex<State>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryOs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后对该名字的 `create_tap` 都会失败
    pub fn fail_tap_creation(&self, name: &str) {
        lock(&self.state).fail_taps.insert(name.to_string());
    }

    /// 之后打开该名字的 tap 都会失败，接口本身照常存在
    pub fn fail_tap_open(&self, name: &str) {
        lock(&self.state).fail_opens.insert(name.to_string());
    }

    /// 扮演内核侧：向 tap 写入一帧，引擎下一次轮询时读到
    pub fn inject(&self, name: &str, frame: Vec<u8>) -> bool {
        let st = lock(&self.state);
        let Some(entry) = st.intfs.iter().find(|i| i.name == name) else {
            return false;
        };
        lock(&entry.wire).to_engine.push_back(frame);
        true
    }

    /// 取走引擎交付给该 tap 的全部帧
    pub fn take_sent(&self, name: &str) -> Vec<Vec<u8>> {
        let st = lock(&self.state);
        st.intfs
            .iter()
            .find(|i| i.name == name)
            .map(|i| std::mem::take(&mut lock(&i.wire).to_kernel))
            .unwrap_or_default()
    }

    pub fn intf(&self, name: &str) -> Option<MemIntf> {
        let st = lock(&self.state);
        st.intfs.iter().find(|i| i.name == name).map(|i| MemIntf {
            name: i.name.clone(),
            namespace: i.namespace.clone(),
            mac: i.mac,
            addrs: i.addrs.clone(),
            up: i.up,
            opened: lock(&i.wire).opened,
        })
    }

    pub fn intf_count(&self) -> usize {
        lock(&self.state).intfs.len()
    }

    pub fn namespaces(&self) -> Vec<String> {
        lock(&self.state).namespaces.iter().cloned().collect()
    }

    /// `exec` 执行过的命令
    pub fn commands(&self) -> Vec<(Option<String>, String)> {
        lock(&self.state).commands.clone()
    }

    fn check_ns(st: &State, ns: Option<&str>) -> Result<(), OsError> {
        match ns {
            Some(ns) if !st.namespaces.contains(ns) => Err(OsError::NoSuchNamespace(ns.to_string())),
            _ => Ok(()),
        }
    }
}

impl HostOs for MemoryOs {
    fn create_namespace(&self, ns: &str) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        if !st.namespaces.insert(ns.to_string()) {
            return Err(OsError::AlreadyExists(ns.to_string()));
        }
        Ok(())
    }

    fn delete_namespace(&self, ns: &str) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        if !st.namespaces.remove(ns) {
            return Err(OsError::NoSuchNamespace(ns.to_string()));
        }
        // 命名空间里的接口随之销毁
        st.intfs.retain(|i| {
            let gone = i.namespace.as_deref() == Some(ns);
            if gone {
                lock(&i.wire).removed = true;
            }
            !gone
        });
        Ok(())
    }

    fn create_tap(&self, name: &str) -> Result<(), OsError> {
        validate_intf_name(name)?;
        let mut st = lock(&self.state);
        if st.fail_taps.contains(name) {
            return Err(OsError::CommandFailed {
                cmd: format!("ip tuntap add dev {name} mode tap"),
                status: "exit status: 1".to_string(),
                stderr: "ioctl(TUNSETIFF): Operation not permitted".to_string(),
            });
        }
        // 与 `ip tuntap add` 一样：未被占用的同名持久 tap 直接复用
        if let Some(idx) = st.position(name, None) {
            if lock(&st.intfs[idx].wire).attached {
                return Err(OsError::CommandFailed {
                    cmd: format!("ip tuntap add dev {name} mode tap"),
                    status: "exit status: 1".to_string(),
                    stderr: "ioctl(TUNSETIFF): Device or resource busy".to_string(),
                });
            }
            return Ok(());
        }
        st.next_mac += 1;
        let n = st.next_mac.to_be_bytes();
        let entry = IntfEntry {
            name: name.to_string(),
            namespace: None,
            mac: MacAddr([0x02, 0x54, n[0], n[1], n[2], n[3]]),
            addrs: Vec::new(),
            up: false,
            wire: Arc::default(),
        };
        st.intfs.push(entry);
        Ok(())
    }

    fn delete_intf(&self, name: &str, ns: Option<&str>) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        let idx = st.find(name, ns)?;
        let entry = st.intfs.remove(idx);
        lock(&entry.wire).removed = true;
        Ok(())
    }

    fn rename_intf(&self, name: &str, new_name: &str, ns: Option<&str>) -> Result<(), OsError> {
        validate_intf_name(new_name)?;
        let mut st = lock(&self.state);
        let idx = st.find(name, ns)?;
        if st.position(new_name, ns).is_some() {
            return Err(OsError::AlreadyExists(new_name.to_string()));
        }
        st.intfs[idx].name = new_name.to_string();
        Ok(())
    }

    fn move_intf(&self, name: &str, ns: &str) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        Self::check_ns(&st, Some(ns))?;
        let idx = st.find(name, None)?;
        if st.position(name, Some(ns)).is_some() {
            return Err(OsError::AlreadyExists(name.to_string()));
        }
        let entry = &mut st.intfs[idx];
        entry.namespace = Some(ns.to_string());
        entry.addrs.clear();
        entry.up = false;
        Ok(())
    }

    fn set_ip(&self, name: &str, ns: Option<&str>, addr: IpAddr, prefix: u8) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        let idx = st.find(name, ns)?;
        let addrs = &mut st.intfs[idx].addrs;
        addrs.retain(|(a, _)| *a != addr);
        addrs.push((addr, prefix));
        Ok(())
    }

    fn set_link_up(&self, name: &str, ns: Option<&str>, up: bool) -> Result<(), OsError> {
        let mut st = lock(&self.state);
        let idx = st.find(name, ns)?;
        st.intfs[idx].up = up;
        Ok(())
    }

    fn intf_mac(&self, name: &str, ns: Option<&str>) -> Result<MacAddr, OsError> {
        let st = lock(&self.state);
        let idx = st.find(name, ns)?;
        Ok(st.intfs[idx].mac)
    }

    fn exec(&self, ns: Option<&str>, cmd: &str) -> Result<String, OsError> {
        let mut st = lock(&self.state);
        Self::check_ns(&st, ns)?;
        st.commands.push((ns.map(str::to_string), cmd.to_string()));
        Ok(String::new())
    }

    fn open_tap(&self, name: &str) -> Result<Box<dyn TapPort>, OsError> {
        let st = lock(&self.state);
        let idx = st.find(name, None)?;
        if st.fail_opens.contains(name) {
            return Err(OsError::Io(io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        let wire = Arc::clone(&st.intfs[idx].wire);
        {
            let mut w = lock(&wire);
            if w.attached {
                return Err(OsError::Io(io::Error::from(io::ErrorKind::ResourceBusy)));
            }
            w.attached = true;
            w.opened = true;
        }
        Ok(Box::new(MemoryTap { wire }))
    }
}

#[derive(Debug)]
struct MemoryTap {
    wire: Arc<Mutex<Wire>>,
}

impl Drop for MemoryTap {
    fn drop(&mut self) {
        lock(&self.wire).attached = false;
    }
}

impl TapPort for MemoryTap {
    fn try_recv(&mut self) -> Option<Vec<u8>> {
        lock(&self.wire).to_engine.pop_front()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), OsError> {
        let mut w = lock(&self.wire);
        if w.removed {
            return Err(OsError::NoSuchInterface("tap removed".to_string()));
        }
        w.to_kernel.push(frame.to_vec());
        Ok(())
    }
}
