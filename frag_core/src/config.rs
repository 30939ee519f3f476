use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// 重组超时时间，对应 Linux 的 net.ipv4.ipfrag_time
pub const DEFAULT_REASSEMBLE_TIMEOUT: Duration = Duration::from_secs(30);

/// 内存高水位，达到后开始淘汰旧分片组，对应 net.ipv4.ipfrag_high_thresh
pub const HIGH_FRAG_THRESHOLD: usize = 4 << 20; // 4MB

/// 内存低水位，淘汰进行到此为止，需要为新分片组留出空间，
/// 对应 net.ipv4.ipfrag_low_thresh
pub const LOW_FRAG_THRESHOLD: usize = 3 << 20; // 3MB

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefragConfig {
    /// 分片缓存内存上限(字节)
    pub high_limit: usize,
    /// 淘汰目标水位(字节)
    pub low_limit: usize,
    /// 分片组超时时间(秒)
    pub timeout_secs: u64,
}

impl DefragConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DefragConfig {
    fn default() -> Self {
        Self {
            high_limit: HIGH_FRAG_THRESHOLD,
            low_limit: LOW_FRAG_THRESHOLD,
            timeout_secs: DEFAULT_REASSEMBLE_TIMEOUT.as_secs(),
        }
    }
}
