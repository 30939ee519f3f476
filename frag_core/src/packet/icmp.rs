use bytes::{Bytes, BytesMut};
use log::trace;

use super::{
    internet_checksum, DEFAULT_TOS, ICMPV4_CODE_REASSEMBLY_TIMEOUT, ICMPV4_MINIMUM_SIZE,
    ICMPV4_TIME_EXCEEDED, IP_PROTOCOL_ICMPV4,
};
use crate::route::{NetworkHeaderParams, PacketBuffer, Route};
use crate::util::Prependable;

/// 构造 ICMPv4 Time Exceeded (分片重组超时) 报文头。
///
/// 数据区为原始 IP 头快照加上原始载荷的前几个字节，
/// 校验和覆盖 ICMP 头部与数据区。
fn build_time_exceeded(original_header: &[u8], payload_excerpt: &[u8]) -> [u8; ICMPV4_MINIMUM_SIZE] {
    let mut header = [0u8; ICMPV4_MINIMUM_SIZE];
    header[0] = ICMPV4_TIME_EXCEEDED;
    header[1] = ICMPV4_CODE_REASSEMBLY_TIMEOUT;

    let checksum = internet_checksum(&[&header[..], original_header, payload_excerpt]);
    header[2..4].copy_from_slice(&checksum.to_be_bytes());
    header
}

/// 向超时分片组的对端发送 Time Exceeded 通告。
///
/// 发送是尽力而为的，路由层返回的错误被静默丢弃。
pub fn send_time_exceeded(route: &dyn Route, original_header: &Bytes, payload_excerpt: &Bytes) {
    let icmp = build_time_exceeded(original_header, payload_excerpt);

    let mut header = Prependable::new(route.max_header_length() + ICMPV4_MINIMUM_SIZE);
    match header.prepend(ICMPV4_MINIMUM_SIZE) {
        Some(slot) => slot.copy_from_slice(&icmp),
        None => return,
    }

    let mut data = BytesMut::with_capacity(original_header.len() + payload_excerpt.len());
    data.extend_from_slice(original_header);
    data.extend_from_slice(payload_excerpt);

    let params = NetworkHeaderParams {
        protocol: IP_PROTOCOL_ICMPV4,
        ttl: route.default_ttl(),
        tos: DEFAULT_TOS,
    };

    let packet = PacketBuffer {
        header,
        data: data.freeze(),
        transport_header: Bytes::copy_from_slice(&icmp),
    };

    if route.write_packet(params, packet).is_err() {
        trace!("Time Exceeded 通告发送失败，忽略");
    }
}
