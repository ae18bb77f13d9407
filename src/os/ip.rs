//! 基于 iproute2 的 `HostOs` 实现

use super::{HostOs, OsError, TapPort, tap, validate_intf_name};
use crate::engine::MacAddr;
use std::net::IpAddr;
use std::process::{Command, Output};
use tracing::debug;

/// 调用 `ip` 命令；`sudo` 为 true 时所有命令经 sudo 执行
#[derive(Debug, Clone, Default)]
pub struct IpRoute {
    sudo: bool,
}

impl IpRoute {
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    fn command(&self, args: &[&str]) -> Command {
        if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.args(args);
            cmd
        } else {
            let mut cmd = Command::new(args[0]);
            cmd.args(&args[1..]);
            cmd
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, OsError> {
        debug!(cmd = %args.join(" "), sudo = self.sudo, "执行命令");
        Ok(self.command(args).output()?)
    }

    /// 执行命令，非零退出时带上 stderr 报错
    fn run_checked(&self, args: &[&str]) -> Result<String, OsError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(OsError::CommandFailed {
                cmd: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `ip [-n ns] <rest...>`
    fn ip_in(&self, ns: Option<&str>, rest: &[&str]) -> Result<String, OsError> {
        let mut args = vec!["ip"];
        if let Some(ns) = ns {
            args.extend_from_slice(&["-n", ns]);
        }
        args.extend_from_slice(rest);
        self.run_checked(&args)
    }
}

/// 从 `ip -o link show` 的输出里取出 `link/ether` 后的地址
fn parse_link_mac(output: &str) -> Option<MacAddr> {
    let mut words = output.split_whitespace();
    while let Some(w) = words.next() {
        if w == "link/ether" {
            return words.next()?.parse().ok();
        }
    }
    None
}

impl HostOs for IpRoute {
    fn create_namespace(&self, ns: &str) -> Result<(), OsError> {
        self.run_checked(&["ip", "netns", "add", ns])?;
        // loopback 失败不影响后续
        let _ = self.ip_in(Some(ns), &["link", "set", "lo", "up"]);
        Ok(())
    }

    fn delete_namespace(&self, ns: &str) -> Result<(), OsError> {
        self.run_checked(&["ip", "netns", "del", ns]).map(|_| ())
    }

    fn create_tap(&self, name: &str) -> Result<(), OsError> {
        validate_intf_name(name)?;
        self.ip_in(None, &["tuntap", "add", "dev", name, "mode", "tap"])
            .map(|_| ())
    }

    fn delete_intf(&self, name: &str, ns: Option<&str>) -> Result<(), OsError> {
        self.ip_in(ns, &["link", "del", "dev", name]).map(|_| ())
    }

    fn rename_intf(&self, name: &str, new_name: &str, ns: Option<&str>) -> Result<(), OsError> {
        validate_intf_name(new_name)?;
        self.ip_in(ns, &["link", "set", "dev", name, "name", new_name])
            .map(|_| ())
    }

    fn move_intf(&self, name: &str, ns: &str) -> Result<(), OsError> {
        self.ip_in(None, &["link", "set", "dev", name, "netns", ns])
            .map(|_| ())
    }

    fn set_ip(&self, name: &str, ns: Option<&str>, addr: IpAddr, prefix: u8) -> Result<(), OsError> {
        let cidr = format!("{addr}/{prefix}");
        self.ip_in(ns, &["addr", "replace", &cidr, "dev", name])
            .map(|_| ())
    }

    fn set_link_up(&self, name: &str, ns: Option<&str>, up: bool) -> Result<(), OsError> {
        let state = if up { "up" } else { "down" };
        self.ip_in(ns, &["link", "set", "dev", name, state])
            .map(|_| ())
    }

    fn intf_mac(&self, name: &str, ns: Option<&str>) -> Result<MacAddr, OsError> {
        let out = self.ip_in(ns, &["-o", "link", "show", "dev", name])?;
        parse_link_mac(&out).ok_or_else(|| OsError::Parse {
            cmd: format!("ip -o link show dev {name}"),
            output: out.trim().to_string(),
        })
    }

    fn exec(&self, ns: Option<&str>, cmd: &str) -> Result<String, OsError> {
        match ns {
            Some(ns) => self.run_checked(&["ip", "netns", "exec", ns, "sh", "-c", cmd]),
            None => self.run_checked(&["sh", "-c", cmd]),
        }
    }

    fn open_tap(&self, name: &str) -> Result<Box<dyn TapPort>, OsError> {
        tap::open(name)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_link_mac;
    use crate::engine::MacAddr;

    #[test]
    fn parses_mac_from_link_show() {
        let out = "7: h1-eth0: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DEFAULT \
                   group default qlen 1000\\    link/ether 6a:1f:0c:22:9e:01 brd ff:ff:ff:ff:ff:ff";
        assert_eq!(
            parse_link_mac(out),
            Some(MacAddr([0x6a, 0x1f, 0x0c, 0x22, 0x9e, 0x01]))
        );
        assert_eq!(parse_link_mac("lo: <LOOPBACK> link/loopback 00:00"), None);
    }
}
