//! 以太网帧
//!
//! 引擎内部按原始字节传递帧；只解析目的/源地址。

use super::mac::MacAddr;

/// 以太网头长度（dst + src + ethertype）
pub const ETH_HEADER_LEN: usize = 14;

/// 原始以太网帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// 构造一个带以太网头的帧（测试与演示用）
    pub fn ethernet(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(ETH_HEADER_LEN + payload.len());
        data.extend_from_slice(&dst.0);
        data.extend_from_slice(&src.0);
        data.extend_from_slice(&ethertype.to_be_bytes());
        data.extend_from_slice(payload);
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 至少包含完整的以太网头
    pub fn is_valid(&self) -> bool {
        self.data.len() >= ETH_HEADER_LEN
    }

    pub fn dst(&self) -> MacAddr {
        self.mac_at(0)
    }

    pub fn src(&self) -> MacAddr {
        self.mac_at(6)
    }

    pub fn set_dst(&mut self, mac: MacAddr) {
        self.set_mac_at(0, mac);
    }

    pub fn set_src(&mut self, mac: MacAddr) {
        self.set_mac_at(6, mac);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn mac_at(&self, off: usize) -> MacAddr {
        let mut out = [0u8; 6];
        if let Some(bytes) = self.data.get(off..off + 6) {
            out.copy_from_slice(bytes);
        }
        MacAddr(out)
    }

    fn set_mac_at(&mut self, off: usize, mac: MacAddr) {
        if let Some(bytes) = self.data.get_mut(off..off + 6) {
            bytes.copy_from_slice(&mac.0);
        }
    }
}
