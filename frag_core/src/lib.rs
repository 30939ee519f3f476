pub mod config;
pub mod defrag;
pub mod error;
pub mod packet;
pub mod reassemble;
pub mod route;
pub mod timer;
pub mod util;

// 重新导出常用类型
pub use config::{
    DefragConfig, DEFAULT_REASSEMBLE_TIMEOUT, HIGH_FRAG_THRESHOLD, LOW_FRAG_THRESHOLD,
};
pub use defrag::{DefragStatsSnapshot, IpDefragmenter};
pub use error::{DefragError, FragmentError, Result};
pub use packet::fragment_key;
pub use reassemble::DatagramReassembler;
pub use route::{NetworkHeaderParams, PacketBuffer, Route};
pub use timer::{FragmentTimer, NoopTimer, TimerHandle, TokioTimer};
pub use util::Prependable;

// 全局日志初始化函数
pub fn init_global_logger() {
    crate::util::log::init_logger();
}
