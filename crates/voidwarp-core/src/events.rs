//! 事件通道
//!
//! 把进度和日志通知分发给任意数量的订阅者。
//!
//! - 同步投递，按发布顺序到达每个当前订阅者
//! - 订阅者 panic 会被隔离，不影响其他订阅者和会话流程
//! - 没有回压：[`ChannelSubscriber`] 在队列满时直接丢弃

use crate::error::payload_message;
use crate::logging::{LogEntry, LogLevel};
use log::warn;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// 会话事件
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// 进度 (0-100)，在一个文件的传输内单调不减
    Progress(f32),
    Log(LogEntry),
}

/// 事件订阅者
pub trait EventSubscriber: Send + Sync {
    /// 进度更新
    fn on_progress(&self, _progress: f32) {}
    /// 日志消息
    fn on_log(&self, _entry: &LogEntry) {}
}

/// 订阅 ID，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberList = Vec<(SubscriptionId, Arc<dyn EventSubscriber>)>;

/// 进度与日志的发布/订阅通道
#[derive(Default)]
pub struct EventChannel {
    next_id: AtomicU64,
    subscribers: RwLock<SubscriberList>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));
        id
    }

    /// 订阅到一个有界 mpsc 队列
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<SessionEvent>) {
        let (subscriber, rx) = ChannelSubscriber::new(capacity);
        (self.subscribe(Arc::new(subscriber)), rx)
    }

    /// 只关心进度的订阅
    pub fn on_progress<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(ProgressFn(f)))
    }

    /// 只关心日志的订阅
    pub fn on_log<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(LogFn(f)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn publish_progress(&self, progress: f32) {
        self.deliver(|subscriber| subscriber.on_progress(progress));
    }

    pub fn publish_log(&self, entry: &LogEntry) {
        self.deliver(|subscriber| subscriber.on_log(entry));
    }

    pub fn publish(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Progress(p) => self.publish_progress(*p),
            SessionEvent::Log(entry) => self.publish_log(entry),
        }
    }

    fn deliver<F>(&self, deliver: F)
    where
        F: Fn(&dyn EventSubscriber),
    {
        // 先复制订阅者列表再投递，回调中可以安全地订阅/取消订阅
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| s.clone())
            .collect();

        for subscriber in subscribers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| deliver(subscriber.as_ref()))) {
                warn!(
                    "Event subscriber panicked: {}",
                    payload_message(payload.as_ref())
                );
            }
        }
    }
}

/// 把事件转发到 mpsc 队列的订阅者
pub struct ChannelSubscriber {
    tx: mpsc::Sender<SessionEvent>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSubscriber for ChannelSubscriber {
    fn on_progress(&self, progress: f32) {
        let _ = self.tx.try_send(SessionEvent::Progress(progress));
    }

    fn on_log(&self, entry: &LogEntry) {
        let _ = self.tx.try_send(SessionEvent::Log(entry.clone()));
    }
}

struct ProgressFn<F>(F);

impl<F: Fn(f32) + Send + Sync> EventSubscriber for ProgressFn<F> {
    fn on_progress(&self, progress: f32) {
        (self.0)(progress);
    }
}

struct LogFn<F>(F);

impl<F: Fn(&LogEntry) + Send + Sync> EventSubscriber for LogFn<F> {
    fn on_log(&self, entry: &LogEntry) {
        (self.0)(entry);
    }
}

/// 同时写入 `log` 和事件通道
pub(crate) fn emit(events: &EventChannel, level: LogLevel, message: impl Into<String>) {
    let entry = LogEntry::new(level, message);
    log::log!(target: "voidwarp_core::session", entry.level.as_log_level(), "{}", entry.message);
    events.publish_log(&entry);
}
