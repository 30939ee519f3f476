use bytes::{Bytes, BytesMut};
use log::trace;
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::FragmentError;
use crate::packet::MAX_FRAGMENT_OFFSET;
use crate::timer::TimerHandle;

/// 尚未收到的字节区间，两端均为闭区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub first: u16,
    pub last: u16,
}

/// 已接受分片，按到达顺序保存
#[derive(Debug)]
struct FragmentSlot {
    first: u16,
    payload: Bytes,
}

#[derive(Debug)]
struct ReassemblerInner {
    holes: Vec<Hole>,
    /// 被整体覆盖而消失的洞数量，只增不减
    deleted: usize,
    fragments: Vec<FragmentSlot>,
    /// 第一个 more=false 分片声明的数据报总长
    total_len: Option<usize>,
    size: usize,
    /// 洞已清空，数据报已交付
    completed: bool,
    /// 释放路径已认领，终态
    done: bool,
}

/// 单个在途 IPv4 数据报的重组状态机。
///
/// 洞表算法来自 RFC 815：初始为一个覆盖整个偏移空间的洞，
/// 每个分片切掉与之重叠的洞并留下两侧残余，洞表清空即重组完成。
#[derive(Debug)]
pub struct DatagramReassembler {
    id: u32,
    creation_time: Instant,
    inner: Mutex<ReassemblerInner>,
    timer_slot: Mutex<Option<TimerHandle>>,
}

impl DatagramReassembler {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            creation_time: Instant::now(),
            inner: Mutex::new(ReassemblerInner {
                holes: vec![Hole {
                    first: 0,
                    last: MAX_FRAGMENT_OFFSET,
                }],
                deleted: 0,
                fragments: Vec::new(),
                total_len: None,
                size: 0,
                completed: false,
                done: false,
            }),
            timer_slot: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// 整合一个分片，返回 (重组结果, 是否完成, 新接受的字节数)。
    ///
    /// 协议违规返回错误，调用方应当丢弃整个重组器。
    pub fn process(
        &self,
        first: u16,
        last: u16,
        more: bool,
        payload: Bytes,
    ) -> Result<(Option<Bytes>, bool, usize), FragmentError> {
        let mut inner = self.inner.lock();

        // 完成或释放之后到达的分片不再处理
        if inner.done || inner.completed {
            return Ok((None, false, 0));
        }

        if first > last {
            return Err(FragmentError::InvalidRange {
                first,
                last,
                payload_len: payload.len(),
            });
        }
        let expected = usize::from(last) - usize::from(first) + 1;
        if payload.len() != expected {
            return Err(FragmentError::InvalidRange {
                first,
                last,
                payload_len: payload.len(),
            });
        }
        if let Some(total_len) = inner.total_len {
            if usize::from(first) >= total_len {
                return Err(FragmentError::OverflowPastFinal { first, total_len });
            }
            if usize::from(last) + 1 > total_len {
                // 跨越已声明末尾的分片同样视为协议违规
                return Err(FragmentError::InvalidRange {
                    first,
                    last,
                    payload_len: payload.len(),
                });
            }
        }

        if !more && inner.total_len.is_none() {
            inner.total_len = Some(usize::from(last) + 1);
        }

        let mut consumed = 0;
        if inner.update_holes(first, last, more) {
            // 只保存填补了洞的分片，纯重复分片直接丢弃
            consumed = payload.len();
            inner.size += consumed;
            inner.fragments.push(FragmentSlot { first, payload });
        }
        trace!(
            "分片组 {}: 分片 [{}, {}] more={} 接受 {} 字节，剩余洞 {}",
            self.id,
            first,
            last,
            more,
            consumed,
            inner.holes.len()
        );

        if !inner.holes.is_empty() {
            return Ok((None, false, consumed));
        }

        inner.completed = true;
        let assembled = inner.assemble();
        Ok((Some(assembled), true, consumed))
    }

    /// 原子地检查并标记终态。
    /// 返回 true 表示此前已被标记，调用方不应再做释放动作。
    pub fn claim_done(&self) -> bool {
        let mut inner = self.inner.lock();
        let was_done = inner.done;
        inner.done = true;
        was_done
    }

    /// 自创建起是否已超过给定时限
    pub fn too_old(&self, timeout: Duration) -> bool {
        self.creation_time.elapsed() > timeout
    }

    /// 超时回调的存活判定：尚未释放且仍有洞未填
    pub fn has_outstanding_holes(&self) -> bool {
        let inner = self.inner.lock();
        !inner.done && !inner.holes.is_empty()
    }

    /// 已接受的载荷总字节数
    pub fn frag_size(&self) -> usize {
        self.inner.lock().size
    }

    pub fn hole_count(&self) -> usize {
        self.inner.lock().holes.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.inner.lock().deleted
    }

    pub fn set_timer(&self, handle: TimerHandle) {
        *self.timer_slot.lock() = Some(handle);
    }

    /// 尽力取消超时定时器，回调自身必须能容忍取消失败
    pub fn cancel_timer(&self) {
        if let Some(handle) = self.timer_slot.lock().take() {
            handle.cancel();
        }
    }
}

impl ReassemblerInner {
    /// 用分片 [first, last] 更新洞表，返回是否填补了任何洞
    fn update_holes(&mut self, first: u16, last: u16, more: bool) -> bool {
        let mut used = false;
        let mut i = 0;
        while i < self.holes.len() {
            let hole = self.holes[i];
            if first > hole.last || last < hole.first {
                i += 1;
                continue;
            }
            used = true;
            self.holes.swap_remove(i);
            if hole.first >= first && hole.last <= last {
                self.deleted += 1;
            }
            if first > hole.first {
                self.holes.push(Hole {
                    first: hole.first,
                    last: first - 1,
                });
            }
            if last < hole.last && more {
                // more=false 时右侧残余被截断：数据报长度就此确定
                self.holes.push(Hole {
                    first: last + 1,
                    last: hole.last,
                });
            }
            // 新压入的残余洞与本分片不再重叠，留在队尾等待后续分片
        }
        used
    }

    /// 按偏移拼接全部已接受分片。
    /// 重叠字节以先到的分片为准，后到的重复注入不会覆盖已有数据。
    fn assemble(&mut self) -> Bytes {
        let total = self.total_len.unwrap_or_else(|| {
            self.fragments
                .iter()
                .map(|frag| usize::from(frag.first) + frag.payload.len())
                .max()
                .unwrap_or(0)
        });

        let mut buf = BytesMut::zeroed(total);
        let mut written = vec![false; total];
        for frag in &self.fragments {
            let start = usize::from(frag.first);
            for (i, &byte) in frag.payload.iter().enumerate() {
                let pos = start + i;
                if pos < total && !written[pos] {
                    buf[pos] = byte;
                    written[pos] = true;
                }
            }
        }
        buf.freeze()
    }
}
