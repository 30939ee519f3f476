use std::result::Result as StdResult;
use thiserror::Error;

/// 单个数据报重组过程中的协议违规
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// 分片范围非法
    #[error("无效的分片范围: first={first}, last={last}, 载荷 {payload_len} 字节")]
    InvalidRange {
        first: u16,
        last: u16,
        payload_len: usize,
    },

    /// 分片落在已声明的数据报末尾之后
    #[error("分片超出数据报末尾: first={first}, 数据报总长 {total_len} 字节")]
    OverflowPastFinal {
        first: u16,
        total_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum DefragError {
    /// 分片处理错误，携带分片组ID
    #[error("分片组 {id} 重组失败: {source}")]
    Process {
        id: u32,
        #[source]
        source: FragmentError,
    },

    /// 其他内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl DefragError {
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, DefragError::Process { .. })
    }
}

pub type Result<T> = StdResult<T, DefragError>;
