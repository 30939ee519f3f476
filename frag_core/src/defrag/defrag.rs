use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use tokio::time::Duration;

use crate::config::DefragConfig;
use crate::error::{DefragError, Result};
use crate::packet::{icmp, ICMP_PAYLOAD_EXCERPT_SIZE};
use crate::reassemble::DatagramReassembler;
use crate::route::Route;
use crate::timer::FragmentTimer;

/// 重组器运行统计
#[derive(Debug, Default)]
pub struct DefragStats {
    total_fragments: AtomicU64,
    reassembled_datagrams: AtomicU64,
    timeout_datagrams: AtomicU64,
    evicted_datagrams: AtomicU64,
    stale_replacements: AtomicU64,
    protocol_errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefragStatsSnapshot {
    pub total_fragments: u64,
    pub reassembled_datagrams: u64,
    pub timeout_datagrams: u64,
    pub evicted_datagrams: u64,
    pub stale_replacements: u64,
    pub protocol_errors: u64,
    pub current_reassemblers: usize,
    pub buffered_bytes: usize,
}

/// 坐标器唯一的临界区：分片组表、LRU 与内存账本一起加锁
#[derive(Debug)]
struct DefragState {
    reassemblers: HashMap<u32, Arc<DatagramReassembler>>,
    /// 最新在前，最旧在后；只在创建时入队，后续分片不提升
    lru: VecDeque<u32>,
    size: usize,
}

/// 进程级 IPv4 分片重组坐标器。
///
/// 按分片组ID分发到各数据报的重组器，内存超过高水位时
/// 从 LRU 尾部淘汰最旧的分片组直到回落至低水位，
/// 每个分片组创建时挂一个一次性超时定时器。
pub struct IpDefragmenter {
    state: Mutex<DefragState>,
    high_limit: usize,
    low_limit: usize,
    timeout: Duration,
    timer: Arc<dyn FragmentTimer>,
    stats: DefragStats,
    weak_self: Weak<IpDefragmenter>,
}

impl IpDefragmenter {
    pub fn new(config: DefragConfig, timer: Arc<dyn FragmentTimer>) -> Arc<Self> {
        let high_limit = config.high_limit;
        // 低水位不得高于高水位
        let low_limit = config.low_limit.min(high_limit);

        info!(
            "初始化IP分片重组器: high={}B, low={}B, timeout={}s",
            high_limit, low_limit, config.timeout_secs
        );

        Arc::new_cyclic(|weak| Self {
            state: Mutex::new(DefragState {
                reassemblers: HashMap::new(),
                lru: VecDeque::new(),
                size: 0,
            }),
            high_limit,
            low_limit,
            timeout: config.timeout(),
            timer,
            stats: DefragStats::default(),
            weak_self: weak.clone(),
        })
    }

    /// 处理一个属于分片组 id 的分片。
    ///
    /// 返回 (重组结果, 是否完成)，结果仅在完成时有意义。
    /// header 是首分片的 IP 头快照，route 是超时通告的出口路径，
    /// 两者只在该分片创建新分片组时被保留。
    pub fn process(
        &self,
        id: u32,
        first: u16,
        last: u16,
        more: bool,
        payload: Bytes,
        header: Bytes,
        route: Arc<dyn Route>,
    ) -> Result<(Bytes, bool)> {
        self.stats.total_fragments.fetch_add(1, Ordering::Relaxed);

        let (reassembler, created) = {
            let mut state = self.state.lock();
            let mut existing = state.reassemblers.get(&id).cloned();
            if let Some(stale) = existing.clone() {
                if stale.too_old(self.timeout) {
                    // 大概率是ID冲突或慢速滴灌攻击，旧分片组按失效处理
                    debug!("分片组 {} 已超时，释放后按新数据报处理", id);
                    self.release_locked(&mut state, &stale);
                    self.stats.stale_replacements.fetch_add(1, Ordering::Relaxed);
                    existing = None;
                }
            }
            match existing {
                Some(r) => (r, false),
                None => {
                    let r = Arc::new(DatagramReassembler::new(id));
                    state.reassemblers.insert(id, r.clone());
                    state.lru.push_front(id);
                    (r, true)
                }
            }
        };

        if created {
            self.schedule_timeout(&reassembler, &header, &payload, &route);
        }

        // 洞表算法在重组器自身的锁下执行，不占用坐标器锁
        let outcome = reassembler.process(first, last, more, payload);
        let (assembled, done, consumed) = match outcome {
            Ok(result) => result,
            Err(source) => {
                let mut state = self.state.lock();
                self.release_locked(&mut state, &reassembler);
                self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
                warn!("分片组 {} 收到非法分片: {}", id, source);
                return Err(DefragError::Process { id, source });
            }
        };

        let mut state = self.state.lock();
        state.size += consumed;
        if done {
            self.release_locked(&mut state, &reassembler);
            self.stats
                .reassembled_datagrams
                .fetch_add(1, Ordering::Relaxed);
            trace!("分片组 {} 重组完成", id);
        }
        if state.size > self.high_limit {
            self.evict_locked(&mut state);
        }

        Ok((assembled.unwrap_or_default(), done))
    }

    /// 创建分片组时挂载一次性超时定时器。
    /// 回调持有首分片的 IP 头快照、载荷前缀与出口路由，
    /// 只在分片组仍有洞未填时发出 Time Exceeded 并释放。
    fn schedule_timeout(
        &self,
        reassembler: &Arc<DatagramReassembler>,
        header: &Bytes,
        payload: &Bytes,
        route: &Arc<dyn Route>,
    ) {
        let weak = self.weak_self.clone();
        let r = reassembler.clone();
        let header = header.clone();
        let excerpt = payload.slice(..payload.len().min(ICMP_PAYLOAD_EXCERPT_SIZE));
        let route = route.clone();

        let handle = self.timer.schedule(
            self.timeout,
            Box::new(move || {
                if let Some(defrag) = weak.upgrade() {
                    defrag.reassembly_timed_out(&r, &header, &excerpt, &route);
                }
            }),
        );
        reassembler.set_timer(handle);
    }

    /// 超时回调。取消可能失败，因此对已完成或已释放的
    /// 分片组必须是空操作，由 claim_done 保证恰好一次。
    fn reassembly_timed_out(
        &self,
        reassembler: &Arc<DatagramReassembler>,
        header: &Bytes,
        excerpt: &Bytes,
        route: &Arc<dyn Route>,
    ) {
        if !reassembler.has_outstanding_holes() {
            return;
        }
        let released = {
            let mut state = self.state.lock();
            self.release_locked(&mut state, reassembler)
        };
        if !released {
            return;
        }
        self.stats.timeout_datagrams.fetch_add(1, Ordering::Relaxed);
        debug!(
            "分片组 {} 重组超时，通告 Time Exceeded",
            reassembler.id()
        );
        icmp::send_time_exceeded(route.as_ref(), header, excerpt);
    }

    /// 释放一个分片组。返回 false 表示其他路径已经释放过，
    /// 本次不做任何事；两次释放与一次释放等价。
    fn release_locked(&self, state: &mut DefragState, reassembler: &DatagramReassembler) -> bool {
        if reassembler.claim_done() {
            return false;
        }
        reassembler.cancel_timer();

        let id = reassembler.id();
        state.reassemblers.remove(&id);
        if let Some(pos) = state.lru.iter().position(|&entry| entry == id) {
            state.lru.remove(pos);
        }

        let released = reassembler.frag_size();
        if released > state.size {
            error!(
                "内存账本异常: 当前 {} 字节，待释放 {} 字节，已强制归零",
                state.size, released
            );
            state.size = 0;
        } else {
            state.size -= released;
        }
        true
    }

    /// 从 LRU 尾部淘汰最旧的分片组，直到回落至低水位或清空
    fn evict_locked(&self, state: &mut DefragState) {
        while state.size > self.low_limit {
            let Some(oldest) = state.lru.pop_back() else {
                break;
            };
            if let Some(r) = state.reassemblers.get(&oldest).cloned() {
                debug!("内存超过高水位，淘汰最旧的分片组 {}", oldest);
                if self.release_locked(state, &r) {
                    self.stats.evicted_datagrams.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// 释放全部在途分片组
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let all: Vec<_> = state.reassemblers.values().cloned().collect();
        for r in all {
            self.release_locked(&mut state, &r);
        }
        info!("已清空全部分片组");
    }

    /// 当前缓存的载荷总字节数
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// 在途分片组数量
    pub fn reassembler_count(&self) -> usize {
        self.state.lock().reassemblers.len()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.state.lock().reassemblers.contains_key(&id)
    }

    pub fn stats(&self) -> DefragStatsSnapshot {
        let (current, buffered) = {
            let state = self.state.lock();
            (state.reassemblers.len(), state.size)
        };
        DefragStatsSnapshot {
            total_fragments: self.stats.total_fragments.load(Ordering::Relaxed),
            reassembled_datagrams: self.stats.reassembled_datagrams.load(Ordering::Relaxed),
            timeout_datagrams: self.stats.timeout_datagrams.load(Ordering::Relaxed),
            evicted_datagrams: self.stats.evicted_datagrams.load(Ordering::Relaxed),
            stale_replacements: self.stats.stale_replacements.load(Ordering::Relaxed),
            protocol_errors: self.stats.protocol_errors.load(Ordering::Relaxed),
            current_reassemblers: current,
            buffered_bytes: buffered,
        }
    }
}

impl std::fmt::Debug for IpDefragmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpDefragmenter")
            .field("high_limit", &self.high_limit)
            .field("low_limit", &self.low_limit)
            .field("timeout", &self.timeout)
            .finish()
    }
}
