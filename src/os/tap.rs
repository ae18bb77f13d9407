//! Linux tap 设备读写
//!
//! 打开 `/dev/net/tun` 并用 `TUNSETIFF` 挂到已存在的 tap 接口上。
//! 读端线程用带超时的 poll 等待帧，经有界通道交给引擎；
//! `TapDevice` 被丢弃时通知读端退出并等待它结束，fd 随之全部关闭，
//! 内核侧的 tap 不再被占用。

use super::{OsError, TapPort};

#[cfg(target_os = "linux")]
mod linux {
    use super::super::{MAX_INTF_NAME_LEN, OsError, TapPort};
    use nix::errno::Errno;
    use nix::libc::{c_char, c_int, c_short};
    use nix::poll::{PollFd, PollFlags, poll};
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Write};
    use std::os::fd::{AsFd, AsRawFd};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
    use std::thread::{self, JoinHandle};
    use tracing::debug;

    const IFF_TAP: c_short = 0x0002;
    const IFF_NO_PI: c_short = 0x1000;
    /// 帧读入通道的容量
    const RX_BACKLOG: usize = 1024;
    const MAX_FRAME: usize = 65_536;
    /// 读端检查退出标志的间隔
    const POLL_INTERVAL_MS: u16 = 50;

    #[repr(C)]
    pub struct IfReq {
        name: [c_char; MAX_INTF_NAME_LEN + 1],
        flags: c_short,
        _pad: [u8; 22],
    }

    nix::ioctl_write_ptr_bad!(
        tun_set_iff,
        nix::request_code_write!(b'T', 202, std::mem::size_of::<c_int>()),
        IfReq
    );

    #[derive(Debug)]
    pub(super) struct TapDevice {
        name: String,
        writer: File,
        rx: Receiver<Vec<u8>>,
        shutdown: Arc<AtomicBool>,
        reader: Option<JoinHandle<()>>,
    }

    impl TapDevice {
        pub(super) fn open(name: &str) -> Result<Self, OsError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/net/tun")?;

            let mut req = IfReq {
                name: [0; MAX_INTF_NAME_LEN + 1],
                flags: IFF_TAP | IFF_NO_PI,
                _pad: [0; 22],
            };
            for (dst, src) in req.name.iter_mut().zip(name.bytes().take(MAX_INTF_NAME_LEN)) {
                *dst = src as c_char;
            }
            // SAFETY: fd 有效，req 在调用期间存活且布局与 struct ifreq 前缀一致
            unsafe { tun_set_iff(file.as_raw_fd(), &req) }
                .map_err(|e| OsError::Io(std::io::Error::from(e)))?;

            let reader = file.try_clone()?;
            let (tx, rx) = mpsc::sync_channel(RX_BACKLOG);
            let shutdown = Arc::new(AtomicBool::new(false));
            let stop = Arc::clone(&shutdown);
            let tap_name = name.to_string();
            let handle = thread::Builder::new()
                .name(format!("tap-rx-{name}"))
                .spawn(move || read_loop(reader, tx, stop, tap_name))?;

            Ok(Self {
                name: name.to_string(),
                writer: file,
                rx,
                shutdown,
                reader: Some(handle),
            })
        }
    }

    fn read_loop(mut reader: File, tx: SyncSender<Vec<u8>>, stop: Arc<AtomicBool>, tap: String) {
        let mut buf = vec![0u8; MAX_FRAME];
        while !stop.load(Ordering::Relaxed) {
            let ready = {
                let mut fds = [PollFd::new(reader.as_fd(), PollFlags::POLLIN)];
                poll(&mut fds, POLL_INTERVAL_MS)
            };
            match ready {
                Ok(0) | Err(Errno::EINTR) => continue,
                Ok(_) => {}
                Err(e) => {
                    debug!(%tap, error = %e, "tap poll 失败，读端退出");
                    return;
                }
            }
            match reader.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => match tx.try_send(buf[..n].to_vec()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(%tap, len = n, "tap 读入通道已满，丢弃帧");
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                },
                Err(e) => {
                    debug!(%tap, error = %e, "tap 读端退出");
                    return;
                }
            }
        }
    }

    impl Drop for TapDevice {
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::Relaxed);
            if let Some(handle) = self.reader.take() {
                if handle.join().is_err() {
                    debug!(tap = %self.name, "tap 读端线程 panic");
                }
            }
            debug!(tap = %self.name, "tap 已释放");
        }
    }

    impl TapPort for TapDevice {
        fn try_recv(&mut self) -> Option<Vec<u8>> {
            self.rx.try_recv().ok()
        }

        fn send(&mut self, frame: &[u8]) -> Result<(), OsError> {
            let n = self.writer.write(frame)?;
            if n != frame.len() {
                debug!(tap = %self.name, written = n, len = frame.len(), "tap 写入不完整");
            }
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
pub(super) fn open(name: &str) -> Result<Box<dyn TapPort>, OsError> {
    Ok(Box::new(linux::TapDevice::open(name)?))
}

#[cfg(not(target_os = "linux"))]
pub(super) fn open(_name: &str) -> Result<Box<dyn TapPort>, OsError> {
    Err(OsError::Unsupported("tap devices require Linux"))
}
