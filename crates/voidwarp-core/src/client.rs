//! VoidWarp 客户端
//!
//! 会话编排的入口：持有引擎、事件通道和设置，
//! 发送与接收的流程分别在 [`crate::workflow::sender`] 和 [`crate::workflow::receiver`] 中实现。

use crate::config::ClientSettings;
use crate::engine::TransferEngine;
use crate::events::{EventChannel, EventSubscriber, SessionEvent, SubscriptionId, emit};
use crate::logging::{LogEntry, LogLevel};
use crate::session::{Role, SessionSnapshot, TransferSession};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 文件发送/接收客户端
pub struct VoidWarpClient<E: TransferEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) events: Arc<EventChannel>,
    pub(crate) settings: ClientSettings,
    pub(crate) active: ActiveSessions,
    current: Mutex<Option<Arc<TransferSession>>>,
}

impl<E: TransferEngine> VoidWarpClient<E> {
    pub fn new(engine: E, settings: ClientSettings) -> Self {
        Self::with_shared_engine(Arc::new(engine), settings)
    }

    pub fn with_shared_engine(engine: Arc<E>, settings: ClientSettings) -> Self {
        let client = Self {
            engine,
            events: Arc::new(EventChannel::new()),
            settings,
            active: ActiveSessions::default(),
            current: Mutex::new(None),
        };
        client.log(LogLevel::Debug, "VoidWarpClient initialized");
        client
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// 事件通道，可在多个组件间共享
    pub fn events(&self) -> &Arc<EventChannel> {
        &self.events
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<SessionEvent>) {
        self.events.subscribe_channel(capacity)
    }

    /// 进度变化通知
    pub fn on_progress<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.events.on_progress(f)
    }

    /// 日志通知
    pub fn on_log<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.events.on_log(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// 最近一个会话的状态
    pub fn status(&self) -> Option<SessionSnapshot> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.snapshot())
    }

    /// 取消所有进行中会话的轮询
    ///
    /// 发送端只停止进度监控，引擎的阻塞传输照常结束；接收端会停止并销毁句柄。
    pub fn shutdown(&self) {
        let cancelled = self.active.cancel_all();
        if cancelled > 0 {
            self.log(
                LogLevel::Info,
                format!("Shutting down {cancelled} active session(s)"),
            );
        }
    }

    pub(crate) fn begin_session(&self, role: Role, target: &Path) -> Arc<TransferSession> {
        let session = Arc::new(TransferSession::new(role, target));
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        session
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        emit(&self.events, level, message);
    }
}

impl<E: TransferEngine> Drop for VoidWarpClient<E> {
    fn drop(&mut self) {
        self.active.cancel_all();
    }
}

/// 进行中会话的取消令牌
#[derive(Default)]
pub(crate) struct ActiveSessions {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl ActiveSessions {
    /// 登记令牌，返回的守卫释放时自动注销
    pub(crate) fn register(&self, id: Uuid, token: CancellationToken) -> Registration<'_> {
        self.lock().insert(id, token);
        Registration { sessions: self, id }
    }

    pub(crate) fn cancel_all(&self) -> usize {
        let tokens = self.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct Registration<'a> {
    sessions: &'a ActiveSessions,
    id: Uuid,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.sessions.lock().remove(&self.id);
    }
}
