mod defrag;

pub use defrag::{DefragStats, DefragStatsSnapshot, IpDefragmenter};
