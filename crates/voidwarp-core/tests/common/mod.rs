//! 集成测试用的脚本化传输引擎
//!
//! 按预设脚本返回状态和进度，并记录每个引擎调用的次数。

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use voidwarp_core::{
    ClientSettings, LogEntry, PendingDescriptor, ReceiverState, SessionEvent, TransferEngine,
};

/// 接收端脚本的一步
#[derive(Debug, Clone)]
pub enum Step {
    Idle,
    Awaiting {
        name: &'static str,
        size: u64,
        valid: bool,
    },
    Receiving(f32),
    Error,
}

impl Step {
    pub fn awaiting(name: &'static str, size: u64) -> Self {
        Step::Awaiting {
            name,
            size,
            valid: true,
        }
    }
}

pub struct ScriptedSender(pub PathBuf);
pub struct ScriptedReceiver;

pub struct ScriptedPending {
    valid: bool,
    name: Option<String>,
    size: u64,
}

impl PendingDescriptor for ScriptedPending {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn file_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn file_size(&self) -> u64 {
        self.size
    }
}

#[derive(Default)]
pub struct Counters {
    pub create_sender: AtomicUsize,
    pub start_sender: AtomicUsize,
    pub destroy_sender: AtomicUsize,
    pub create_receiver: AtomicUsize,
    pub start_receiver: AtomicUsize,
    pub release_pending: AtomicUsize,
    pub accept: AtomicUsize,
    pub stop_receiver: AtomicUsize,
    pub destroy_receiver: AtomicUsize,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Default)]
pub struct ScriptedEngine {
    pub counters: Counters,

    // 发送端
    pub fail_create_sender: bool,
    pub send_result: i32,
    pub send_delay: Duration,
    pub panic_on_send: bool,
    pub sender_progress: Mutex<VecDeque<f32>>,
    pub sender_progress_delay: Duration,
    pub last_sender_progress: Mutex<f32>,

    // 接收端
    pub fail_create_receiver: bool,
    pub accept_result: i32,
    /// 接受调用最长等待时间，`stop_receiver` 会让它提前以取消码返回
    pub accept_delay: Duration,
    /// 接受调用无视停止信号的额外耗时
    pub accept_stall: Duration,
    pub receiver_script: Mutex<VecDeque<Step>>,
    pub current_step: Mutex<Option<Step>>,
    pub drained: AtomicBool,
    pub stopped: Mutex<bool>,
    pub stop_signal: Condvar,
    pub accepted_paths: Mutex<Vec<PathBuf>>,
}

impl ScriptedEngine {
    pub fn with_sender_progress(mut self, samples: &[f32]) -> Self {
        self.sender_progress = Mutex::new(samples.iter().copied().collect());
        self
    }

    pub fn with_receiver_script(mut self, steps: Vec<Step>) -> Self {
        self.receiver_script = Mutex::new(steps.into());
        self
    }

    /// 接收端脚本是否已全部消费
    pub fn script_drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }
}

impl TransferEngine for ScriptedEngine {
    type Sender = ScriptedSender;
    type Receiver = ScriptedReceiver;
    type Pending = ScriptedPending;

    fn create_sender(&self, file_path: &Path) -> Option<Self::Sender> {
        self.counters.create_sender.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_sender {
            None
        } else {
            Some(ScriptedSender(file_path.to_path_buf()))
        }
    }

    fn sender_file_size(&self, sender: &Self::Sender) -> u64 {
        std::fs::metadata(&sender.0).map(|m| m.len()).unwrap_or(0)
    }

    fn start_sender(&self, _sender: &Self::Sender, _ip: &str, _port: u16, _name: &str) -> i32 {
        self.counters.start_sender.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.send_delay);
        if self.panic_on_send {
            panic!("engine blew up");
        }
        self.send_result
    }

    fn sender_progress(&self, _sender: &Self::Sender) -> f32 {
        std::thread::sleep(self.sender_progress_delay);
        let mut last = self.last_sender_progress.lock().unwrap();
        if let Some(next) = self.sender_progress.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }

    fn destroy_sender(&self, _sender: &Self::Sender) {
        self.counters.destroy_sender.fetch_add(1, Ordering::SeqCst);
    }

    fn create_receiver(&self) -> Option<Self::Receiver> {
        self.counters.create_receiver.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_receiver {
            None
        } else {
            Some(ScriptedReceiver)
        }
    }

    fn receiver_port(&self, _receiver: &Self::Receiver) -> u16 {
        42424
    }

    fn start_receiver(&self, _receiver: &Self::Receiver) {
        self.counters.start_receiver.fetch_add(1, Ordering::SeqCst);
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            stopped = self.stop_signal.wait(stopped).unwrap();
        }
    }

    fn receiver_state(&self, _receiver: &Self::Receiver) -> ReceiverState {
        let next = self.receiver_script.lock().unwrap().pop_front();
        if next.is_none() {
            self.drained.store(true, Ordering::SeqCst);
        }
        let step = next.unwrap_or(Step::Idle);
        let state = match step {
            Step::Idle => ReceiverState::Idle,
            Step::Awaiting { .. } => ReceiverState::AwaitingAccept,
            Step::Receiving(_) => ReceiverState::Receiving,
            Step::Error => ReceiverState::Error,
        };
        *self.current_step.lock().unwrap() = Some(step);
        state
    }

    fn pending_transfer(&self, _receiver: &Self::Receiver) -> Self::Pending {
        match self.current_step.lock().unwrap().clone() {
            Some(Step::Awaiting { name, size, valid }) => ScriptedPending {
                valid,
                name: Some(name.to_string()),
                size,
            },
            _ => ScriptedPending {
                valid: false,
                name: None,
                size: 0,
            },
        }
    }

    fn release_pending(&self, _pending: Self::Pending) {
        self.counters.release_pending.fetch_add(1, Ordering::SeqCst);
    }

    fn accept_transfer(&self, _receiver: &Self::Receiver, dest: &Path) -> i32 {
        self.counters.accept.fetch_add(1, Ordering::SeqCst);
        self.accepted_paths.lock().unwrap().push(dest.to_path_buf());
        if !self.accept_delay.is_zero() {
            let stopped = self.stopped.lock().unwrap();
            let (stopped, _) = self
                .stop_signal
                .wait_timeout_while(stopped, self.accept_delay, |stopped| !*stopped)
                .unwrap();
            if *stopped {
                return 5;
            }
        }
        std::thread::sleep(self.accept_stall);
        self.accept_result
    }

    fn receiver_progress(&self, _receiver: &Self::Receiver) -> f32 {
        match *self.current_step.lock().unwrap() {
            Some(Step::Receiving(p)) => p,
            _ => 0.0,
        }
    }

    fn stop_receiver(&self, _receiver: &Self::Receiver) {
        self.counters.stop_receiver.fetch_add(1, Ordering::SeqCst);
        *self.stopped.lock().unwrap() = true;
        self.stop_signal.notify_all();
    }

    fn destroy_receiver(&self, _receiver: &Self::Receiver) {
        self.counters.destroy_receiver.fetch_add(1, Ordering::SeqCst);
    }
}

/// 测试用的快节奏设置
pub fn fast_settings() -> ClientSettings {
    ClientSettings {
        display_name: "test-host".to_string(),
        poll_interval_ms: 5,
        monitor_join_timeout_ms: 1000,
        listener_join_timeout_ms: 1000,
        ..Default::default()
    }
}

/// 取出队列中已有的事件
pub fn drain_events(rx: &mut mpsc::Receiver<SessionEvent>) -> (Vec<f32>, Vec<LogEntry>) {
    let mut progress = Vec::new();
    let mut logs = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::Progress(p) => progress.push(p),
            SessionEvent::Log(entry) => logs.push(entry),
        }
    }
    (progress, logs)
}

pub fn logs_contain(logs: &[LogEntry], needle: &str) -> bool {
    logs.iter().any(|entry| entry.message.contains(needle))
}

/// 轮询直到条件成立或超时
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
