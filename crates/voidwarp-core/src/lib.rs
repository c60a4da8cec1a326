//! VoidWarp Core Library
//!
//! 点对点文件传输的会话编排层。传输协议本身由外部引擎实现，
//! 这个库负责驱动引擎的阻塞调用、轮询进度和状态、传播取消，
//! 并保证每个引擎句柄恰好创建和销毁一次。
//!
//! # 模块
//!
//! - **engine**: 外部传输引擎接口和句柄租约
//! - **workflow**: 发送端编排、接收端状态机、进度监控
//! - **outcome**: 引擎结果码到结果分类的翻译
//! - **events**: 进度与日志事件通道
//! - **session**: 会话元数据和生命周期
//! - **config**: 客户端设置
//!
//! # 使用示例
//!
//! ## 发送文件
//!
//! ```ignore
//! use voidwarp_core::{ClientSettings, VoidWarpClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = VoidWarpClient::new(engine, ClientSettings::load());
//! client.on_progress(|p| println!("{p:.1}%"));
//! client.on_log(|entry| println!("{}", entry.message));
//!
//! let ok = client
//!     .send_file("192.168.1.20", 42424, "photo.jpg", CancellationToken::new())
//!     .await;
//! ```
//!
//! ## 接收文件
//!
//! ```ignore
//! let token = CancellationToken::new();
//! let summary = client.receive_files("/home/me/Downloads", token.clone()).await?;
//! println!("收到 {} 个文件", summary.accepted);
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod outcome;
pub mod session;
pub mod workflow;

pub use client::VoidWarpClient;
pub use config::ClientSettings;
pub use engine::{
    IncomingFile, PendingDescriptor, ReceiverLease, ReceiverState, SenderLease, TransferEngine,
};
pub use error::SessionError;
pub use events::{ChannelSubscriber, EventChannel, EventSubscriber, SessionEvent, SubscriptionId};
pub use logging::{LogEntry, LogLevel};
pub use outcome::{OutcomeKind, TransferOutcome};
pub use session::{Role, SessionPhase, SessionSnapshot, TransferSession};
pub use workflow::ReceiveSummary;
