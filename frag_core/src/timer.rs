use tokio::time::Duration;

/// 一次性定时器的取消句柄，取消是尽力而为的：
/// 回调可能已经在执行或已执行完毕。
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// 永远不会触发取消动作的句柄
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// 定时器服务：在未来某一时刻执行一次回调
pub trait FragmentTimer: Send + Sync {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle;
}

/// 基于 tokio 运行时的定时器实现
pub struct TokioTimer {
    handle: tokio::runtime::Handle,
}

impl TokioTimer {
    /// 绑定到当前 tokio 运行时，必须在运行时上下文内调用
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl FragmentTimer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        let abort = task.abort_handle();
        TimerHandle::new(Box::new(move || abort.abort()))
    }
}

/// 从不触发的定时器，用于不需要超时路径的场景
pub struct NoopTimer;

impl FragmentTimer for NoopTimer {
    fn schedule(&self, _delay: Duration, _callback: Box<dyn FnOnce() + Send>) -> TimerHandle {
        TimerHandle::inert()
    }
}
