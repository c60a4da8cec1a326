//! 会话错误定义

use std::any::Any;
use thiserror::Error;
use tokio::task::JoinError;

/// 会话在得到协议结果之前就失败的原因
///
/// 协议层面的失败（被拒绝、校验失败等）不在这里，见 [`crate::OutcomeKind`]。
#[derive(Debug, Error)]
pub enum SessionError {
    /// 输入不合法，未接触引擎，也没有创建句柄
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 引擎返回了空句柄
    #[error("engine unavailable: failed to create {0}")]
    EngineUnavailable(&'static str),

    /// 引擎调用路径上的意外失败（panic、任务被取消）
    #[error("unexpected failure: {0}")]
    Unexpected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JoinError> for SessionError {
    fn from(err: JoinError) -> Self {
        SessionError::Unexpected(panic_message(err))
    }
}

/// 从 `JoinError` 中提取可读的消息
pub(crate) fn panic_message(err: JoinError) -> String {
    if err.is_panic() {
        payload_message(err.into_panic().as_ref())
    } else {
        err.to_string()
    }
}

/// 从 panic 载荷中提取可读的消息
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
