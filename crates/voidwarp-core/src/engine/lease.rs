//! 引擎句柄租约
//!
//! 会话独占句柄，句柄在租约最后一个引用释放时销毁，且只销毁一次。
//! 阻塞线程和轮询任务各自持有一个 `Arc` 引用，
//! 所以被放弃的监控任务也不会在句柄销毁后继续访问它。

use crate::engine::{IncomingFile, ReceiverState, TransferEngine};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 发送端句柄租约
pub struct SenderLease<E: TransferEngine> {
    engine: Arc<E>,
    handle: E::Sender,
}

impl<E: TransferEngine> SenderLease<E> {
    pub fn new(engine: Arc<E>, handle: E::Sender) -> Self {
        Self { engine, handle }
    }

    pub fn file_size(&self) -> u64 {
        self.engine.sender_file_size(&self.handle)
    }

    /// 阻塞直到传输结束
    pub fn start(&self, ip: &str, port: u16, sender_name: &str) -> i32 {
        self.engine.start_sender(&self.handle, ip, port, sender_name)
    }

    pub fn progress(&self) -> f32 {
        self.engine.sender_progress(&self.handle)
    }
}

impl<E: TransferEngine> Drop for SenderLease<E> {
    fn drop(&mut self) {
        self.engine.destroy_sender(&self.handle);
        debug!("Sender handle destroyed");
    }
}

/// 接收端句柄租约
///
/// 停止和销毁是一个序列：`stop()` 幂等，销毁前若尚未停止会先停止。
pub struct ReceiverLease<E: TransferEngine> {
    engine: Arc<E>,
    handle: E::Receiver,
    stopped: AtomicBool,
}

impl<E: TransferEngine> ReceiverLease<E> {
    pub fn new(engine: Arc<E>, handle: E::Receiver) -> Self {
        Self {
            engine,
            handle,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn port(&self) -> u16 {
        self.engine.receiver_port(&self.handle)
    }

    /// 阻塞直到 `stop()` 被调用
    pub fn listen(&self) {
        self.engine.start_receiver(&self.handle);
    }

    pub fn state(&self) -> ReceiverState {
        self.engine.receiver_state(&self.handle)
    }

    /// 读取待接受描述并立即交还给引擎
    pub fn take_pending(&self) -> Option<IncomingFile> {
        let pending = self.engine.pending_transfer(&self.handle);
        let incoming = IncomingFile::from_descriptor(&pending);
        self.engine.release_pending(pending);
        incoming
    }

    pub fn accept(&self, dest: &Path) -> i32 {
        self.engine.accept_transfer(&self.handle, dest)
    }

    pub fn progress(&self) -> f32 {
        self.engine.receiver_progress(&self.handle)
    }

    /// 停止监听，重复调用无效果
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.engine.stop_receiver(&self.handle);
            debug!("Receiver handle stopped");
        }
    }
}

impl<E: TransferEngine> Drop for ReceiverLease<E> {
    fn drop(&mut self) {
        self.stop();
        self.engine.destroy_receiver(&self.handle);
        debug!("Receiver handle destroyed");
    }
}
