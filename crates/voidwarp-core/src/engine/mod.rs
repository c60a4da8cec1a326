//! 传输引擎接口
//!
//! 真正的传输协议（握手、分帧、校验、套接字 I/O）由外部引擎实现，
//! 这里只定义会话层需要的操作集合。
//!
//! # 约定
//!
//! - `start_sender` / `start_receiver` / `accept_transfer` 是阻塞调用，
//!   只会在阻塞线程池中执行
//! - 其余访问器都是快速读取，会在轮询循环中直接调用
//! - 句柄的销毁由 [`lease`] 中的租约类型负责，每个句柄恰好销毁一次

pub mod lease;

pub use lease::{ReceiverLease, SenderLease};

use std::path::Path;

/// 接收端生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverState {
    /// 空闲，等待连接
    Idle,
    /// 有传入文件等待接受
    AwaitingAccept,
    /// 正在接收
    Receiving,
    /// 引擎报告错误
    Error,
}

/// 引擎持有的待接受传输描述
///
/// 只在一次轮询内有效，读取字段后必须交还给 [`TransferEngine::release_pending`]。
pub trait PendingDescriptor: Send {
    fn is_valid(&self) -> bool;
    fn file_name(&self) -> Option<String>;
    fn file_size(&self) -> u64;
}

/// 从待接受描述中复制出来的文件信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_name: String,
    pub file_size: u64,
}

impl IncomingFile {
    /// 复制描述中的字段，无效描述返回 `None`
    pub fn from_descriptor<P: PendingDescriptor + ?Sized>(pending: &P) -> Option<Self> {
        if !pending.is_valid() {
            return None;
        }
        Some(Self {
            file_name: pending.file_name().unwrap_or_else(|| "unknown".to_string()),
            file_size: pending.file_size(),
        })
    }

    /// 用于落盘的文件名，只保留最后一个路径组件
    pub fn safe_file_name(&self) -> String {
        Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// 外部传输引擎
///
/// 句柄类型对会话层是不透明的。引擎必须允许同一句柄上的阻塞调用与访问器并发执行。
pub trait TransferEngine: Send + Sync + 'static {
    type Sender: Send + Sync + 'static;
    type Receiver: Send + Sync + 'static;
    type Pending: PendingDescriptor;

    /// 为指定文件创建发送端，失败返回 `None`
    fn create_sender(&self, file_path: &Path) -> Option<Self::Sender>;

    fn sender_file_size(&self, sender: &Self::Sender) -> u64;

    /// 开始发送（阻塞直到传输结束），返回结果码
    fn start_sender(&self, sender: &Self::Sender, ip: &str, port: u16, sender_name: &str) -> i32;

    /// 发送进度 (0-100)
    fn sender_progress(&self, sender: &Self::Sender) -> f32;

    fn destroy_sender(&self, sender: &Self::Sender);

    /// 创建接收端，失败返回 `None`
    fn create_receiver(&self) -> Option<Self::Receiver>;

    fn receiver_port(&self, receiver: &Self::Receiver) -> u16;

    /// 开始监听（阻塞直到 `stop_receiver`）
    fn start_receiver(&self, receiver: &Self::Receiver);

    fn receiver_state(&self, receiver: &Self::Receiver) -> ReceiverState;

    fn pending_transfer(&self, receiver: &Self::Receiver) -> Self::Pending;

    fn release_pending(&self, pending: Self::Pending);

    /// 接受传入文件并保存到 `dest`，返回结果码
    fn accept_transfer(&self, receiver: &Self::Receiver, dest: &Path) -> i32;

    /// 接收进度 (0-100)
    fn receiver_progress(&self, receiver: &Self::Receiver) -> f32;

    fn stop_receiver(&self, receiver: &Self::Receiver);

    fn destroy_receiver(&self, receiver: &Self::Receiver);
}
