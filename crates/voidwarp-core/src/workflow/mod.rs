//! 工作流模块
//!
//! 发送/接收的会话编排，以及两者共用的进度监控

pub mod monitor;
pub mod receiver;
pub mod sender;

pub use monitor::run_progress_monitor;
pub use receiver::ReceiveSummary;
