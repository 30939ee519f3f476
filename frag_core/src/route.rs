use bytes::Bytes;

use crate::util::Prependable;

/// 网络层头部参数，随数据包一并交给路由
#[derive(Debug, Clone, Copy)]
pub struct NetworkHeaderParams {
    pub protocol: u8,
    pub ttl: u8,
    pub tos: u8,
}

/// 待发送的数据包：预留头部 + 数据区 + 传输层头部视图
#[derive(Debug)]
pub struct PacketBuffer {
    pub header: Prependable,
    pub data: Bytes,
    pub transport_header: Bytes,
}

/// 已解析好的出口路径。
///
/// 重组引擎只在超时通告时使用路由，发送失败由调用方静默忽略。
pub trait Route: Send + Sync {
    /// 此路径上所有下层头部的最大总长度
    fn max_header_length(&self) -> usize;

    /// 此路径的默认 TTL
    fn default_ttl(&self) -> u8;

    /// 沿此路径发送一个数据包
    fn write_packet(
        &self,
        params: NetworkHeaderParams,
        packet: PacketBuffer,
    ) -> std::io::Result<()>;
}
