//! 传输结果翻译
//!
//! 把引擎返回的整数结果码映射为封闭的结果分类。纯函数，无状态。
//!
//! | 结果码 | 分类 |
//! |---|---|
//! | 0 | `Success` |
//! | 1 | `RejectedByPeer` |
//! | 2 | `IntegrityMismatch` |
//! | 3 | `ConnectionFailed` |
//! | 4 | `Timeout` |
//! | 5 | `Cancelled` |
//! | 其他 | `UnknownError(code)` |

use std::fmt;
use uuid::Uuid;

/// 单次会话的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    RejectedByPeer,
    IntegrityMismatch,
    ConnectionFailed,
    Timeout,
    Cancelled,
    UnknownError(i32),
}

impl OutcomeKind {
    /// 从引擎结果码创建
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OutcomeKind::Success,
            1 => OutcomeKind::RejectedByPeer,
            2 => OutcomeKind::IntegrityMismatch,
            3 => OutcomeKind::ConnectionFailed,
            4 => OutcomeKind::Timeout,
            5 => OutcomeKind::Cancelled,
            other => OutcomeKind::UnknownError(other),
        }
    }

    /// 获取对应的引擎结果码
    pub fn code(&self) -> i32 {
        match self {
            OutcomeKind::Success => 0,
            OutcomeKind::RejectedByPeer => 1,
            OutcomeKind::IntegrityMismatch => 2,
            OutcomeKind::ConnectionFailed => 3,
            OutcomeKind::Timeout => 4,
            OutcomeKind::Cancelled => 5,
            OutcomeKind::UnknownError(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Success)
    }

    /// 发送端的诊断日志行
    ///
    /// 与对端相关的失败会带上 `ip:port`。
    pub fn send_message(&self, ip: &str, port: u16) -> String {
        match self {
            OutcomeKind::Success => "✓ File sent successfully".to_string(),
            OutcomeKind::RejectedByPeer => {
                format!("✗ Transfer rejected by receiver at {ip}:{port}")
            }
            OutcomeKind::IntegrityMismatch => {
                format!("✗ Checksum mismatch while sending to {ip}:{port}")
            }
            OutcomeKind::ConnectionFailed => format!("✗ Connection failed to {ip}:{port}"),
            OutcomeKind::Timeout => format!("✗ Transfer timeout talking to {ip}:{port}"),
            OutcomeKind::Cancelled => "✗ Transfer cancelled".to_string(),
            OutcomeKind::UnknownError(code) => format!("✗ Unknown error: {code}"),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::RejectedByPeer => write!(f, "rejected by peer"),
            OutcomeKind::IntegrityMismatch => write!(f, "integrity mismatch"),
            OutcomeKind::ConnectionFailed => write!(f, "connection failed"),
            OutcomeKind::Timeout => write!(f, "timeout"),
            OutcomeKind::Cancelled => write!(f, "cancelled"),
            OutcomeKind::UnknownError(code) => write!(f, "unknown error ({code})"),
        }
    }
}

/// 会话终态结果，每个会话恰好产生一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub session_id: Uuid,
    pub kind: OutcomeKind,
}

impl TransferOutcome {
    pub fn new(session_id: Uuid, kind: OutcomeKind) -> Self {
        Self { session_id, kind }
    }

    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }
}
