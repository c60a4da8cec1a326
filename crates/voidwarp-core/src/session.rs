//! 传输会话
//!
//! 一次逻辑操作（发送或接收）的元数据：角色、目标路径、生命周期阶段和当前进度。
//! 句柄本身由 [`crate::engine::lease`] 持有。

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// 会话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Sender,
    Receiver,
}

/// 生命周期阶段，只能前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SessionPhase {
    Created,
    Running,
    Terminal,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub role: Role,
    pub phase: SessionPhase,
    /// 已发布的最新进度，尚未发布时为 `None`
    pub progress: Option<f32>,
    pub target: PathBuf,
}

struct SessionInner {
    phase: SessionPhase,
    progress: Option<f32>,
}

/// 传输会话
///
/// 进度在一个序列内单调不减：低于上次发布值的采样会被丢弃。
/// 发送会话只有一个序列；接收会话每个文件一个序列，见 [`TransferSession::reset_progress`]。
pub struct TransferSession {
    id: Uuid,
    role: Role,
    target: PathBuf,
    inner: Mutex<SessionInner>,
}

impl TransferSession {
    pub fn new(role: Role, target: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            target: target.into(),
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Created,
                progress: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// 推进到下一阶段，后退或原地不动返回 `false`
    pub fn advance(&self, phase: SessionPhase) -> bool {
        let mut inner = self.lock();
        if phase > inner.phase {
            inner.phase = phase;
            true
        } else {
            false
        }
    }

    /// 记录一次进度采样，返回应当发布的值
    ///
    /// 采样会被限制在 0-100；NaN 和回退的值返回 `None`。
    pub fn record_progress(&self, sample: f32) -> Option<f32> {
        if sample.is_nan() {
            return None;
        }
        let value = sample.clamp(0.0, 100.0);
        let mut inner = self.lock();
        match inner.progress {
            Some(last) if value < last => None,
            _ => {
                inner.progress = Some(value);
                Some(value)
            }
        }
    }

    /// 开始新的进度序列
    ///
    /// 接收端每接受一个文件调用一次，之后的第一个采样可以低于上一个文件的终值。
    pub fn reset_progress(&self) {
        self.lock().progress = None;
    }

    pub fn progress(&self) -> Option<f32> {
        self.lock().progress
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            id: self.id,
            role: self.role,
            phase: inner.phase,
            progress: inner.progress,
            target: self.target.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
