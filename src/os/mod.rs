//! 宿主操作系统边界
//!
//! tap 创建、命名空间迁移、IP/链路配置、命令执行与 tap 帧读写都经过
//! `HostOs`。`IpRoute` 驱动真实的 `ip` 工具与 `/dev/net/tun`，
//! `MemoryOs` 在内存里模拟同样的语义，供测试与 dry run 使用。

use std::io;
use std::net::IpAddr;

// 子模块声明
mod ip;
mod memory;
mod tap;

// 重新导出公共接口
pub use ip::IpRoute;
pub use memory::{MemIntf, MemoryOs};

/// Linux 接口名上限（IFNAMSIZ - 1）
pub const MAX_INTF_NAME_LEN: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum OsError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("command `{cmd}` failed ({status}): {stderr}")]
    CommandFailed {
        cmd: String,
        status: String,
        stderr: String,
    },
    #[error("no such interface: {0}")]
    NoSuchInterface(String),
    #[error("interface already exists: {0}")]
    AlreadyExists(String),
    #[error("no such namespace: {0}")]
    NoSuchNamespace(String),
    #[error("invalid interface name {0:?} (1..=15 bytes, no '/' or whitespace)")]
    InvalidName(String),
    #[error("unexpected output from `{cmd}`: {output}")]
    Parse { cmd: String, output: String },
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

/// 一个已打开的 tap：以太网帧的非阻塞读与写
pub trait TapPort: Send + std::fmt::Debug {
    /// 读取内核侧发出的下一帧；没有则返回 None
    fn try_recv(&mut self) -> Option<Vec<u8>>;
    /// 把一帧交给内核侧
    fn send(&mut self, frame: &[u8]) -> Result<(), OsError>;
}

/// 宿主网络操作。`ns == None` 表示根命名空间。
pub trait HostOs: Send + Sync + std::fmt::Debug {
    fn create_namespace(&self, ns: &str) -> Result<(), OsError>;
    fn delete_namespace(&self, ns: &str) -> Result<(), OsError>;
    /// 在根命名空间创建 tap 接口
    fn create_tap(&self, name: &str) -> Result<(), OsError>;
    fn delete_intf(&self, name: &str, ns: Option<&str>) -> Result<(), OsError>;
    fn rename_intf(&self, name: &str, new_name: &str, ns: Option<&str>) -> Result<(), OsError>;
    /// 把根命名空间里的接口移入 `ns`；地址与 up 状态会被重置
    fn move_intf(&self, name: &str, ns: &str) -> Result<(), OsError>;
    fn set_ip(&self, name: &str, ns: Option<&str>, addr: IpAddr, prefix: u8) -> Result<(), OsError>;
    fn set_link_up(&self, name: &str, ns: Option<&str>, up: bool) -> Result<(), OsError>;
    fn intf_mac(&self, name: &str, ns: Option<&str>) -> Result<crate::engine::MacAddr, OsError>;
    /// 在命名空间里执行 shell 命令，返回标准输出
    fn exec(&self, ns: Option<&str>, cmd: &str) -> Result<String, OsError>;
    /// 打开根命名空间里的 tap 供引擎读写
    fn open_tap(&self, name: &str) -> Result<Box<dyn TapPort>, OsError>;
}

pub fn validate_intf_name(name: &str) -> Result<(), OsError> {
    let ok = !name.is_empty()
        && name.len() <= MAX_INTF_NAME_LEN
        && !name.contains('/')
        && !name.chars().any(char::is_whitespace);
    if ok {
        Ok(())
    } else {
        Err(OsError::InvalidName(name.to_string()))
    }
}
