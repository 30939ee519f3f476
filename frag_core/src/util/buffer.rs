use bytes::{Bytes, BytesMut};

/// 预留头部空间的数据包缓冲区。
///
/// 构造链路层/网络层数据包时各层头部从后向前写入，
/// 因此缓冲区先按最大头部长度预留空间，再逐层 prepend。
#[derive(Debug)]
pub struct Prependable {
    buf: BytesMut,
    used_from: usize,
}

impl Prependable {
    pub fn new(capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(capacity);
        buf.resize(capacity, 0);
        Self {
            buf,
            used_from: capacity,
        }
    }

    /// 在已写入内容之前开辟 size 字节，返回可写切片。
    /// 剩余空间不足时返回 None。
    pub fn prepend(&mut self, size: usize) -> Option<&mut [u8]> {
        if size > self.used_from {
            return None;
        }
        self.used_from -= size;
        Some(&mut self.buf[self.used_from..self.used_from + size])
    }

    /// 已写入部分的视图
    pub fn view(&self) -> &[u8] {
        &self.buf[self.used_from..]
    }

    /// 尚未使用的头部空间
    pub fn available(&self) -> usize {
        self.used_from
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.used_from
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn freeze(mut self) -> Bytes {
        let _ = self.buf.split_to(self.used_from);
        self.buf.freeze()
    }
}
