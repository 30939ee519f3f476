pub mod icmp;

use std::num::Wrapping;

/// IPv4 最小头部长度
pub const IPV4_MINIMUM_HEADER_SIZE: usize = 20;

/// ICMPv4 头部长度 (type + code + checksum + unused)
pub const ICMPV4_MINIMUM_SIZE: usize = 8;

/// ICMPv4 Time Exceeded 消息类型
pub const ICMPV4_TIME_EXCEEDED: u8 = 11;

/// Time Exceeded 的分片重组超时代码
pub const ICMPV4_CODE_REASSEMBLY_TIMEOUT: u8 = 1;

/// IP 协议号: ICMPv4
pub const IP_PROTOCOL_ICMPV4: u8 = 1;

/// 默认服务类型
pub const DEFAULT_TOS: u8 = 0;

/// ICMP 错误报文携带的原始载荷字节数
pub const ICMP_PAYLOAD_EXCERPT_SIZE: usize = 8;

/// 单个 IPv4 数据报的最大字节偏移
pub const MAX_FRAGMENT_OFFSET: u16 = u16::MAX;

/// RFC 1071 互联网校验和。
///
/// 按 16 位大端字分组求和并回卷进位，跨块的奇数字节连续处理，
/// 返回取反后的校验和，可直接写入头部字段。
pub fn internet_checksum(chunks: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut pending: Option<u8> = None;

    for chunk in chunks {
        for &byte in *chunk {
            match pending.take() {
                Some(high) => sum += u32::from(u16::from_be_bytes([high, byte])),
                None => pending = Some(byte),
            }
        }
    }
    if let Some(high) = pending {
        sum += u32::from(u16::from_be_bytes([high, 0]));
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// 由 (源地址, 目的地址, 协议, IP标识) 推导分片组键。
///
/// 同一数据报的所有分片共享这四元组，散列为 32 位键后
/// 冲突由上层的过期替换规则兜底。
pub fn fragment_key(src: [u8; 4], dst: [u8; 4], protocol: u8, ident: u16) -> u32 {
    let mut hash = Wrapping(0u32);
    let ident = ident.to_be_bytes();
    let bytes = src
        .iter()
        .chain(dst.iter())
        .chain(ident.iter())
        .chain(std::iter::once(&protocol));
    for &byte in bytes {
        hash += Wrapping(byte as u32);
        hash += hash << 10;
        hash ^= hash >> 6;
    }
    hash += hash << 3;
    hash ^= hash >> 11;
    hash += hash << 15;
    hash.0
}
