//! 接收端工作流
//!
//! 高层流程:
//! 1. 确保保存目录存在
//! 2. 创建接收端句柄，在阻塞线程池中开始监听
//! 3. 每个轮询间隔读取一次接收端状态，自动接受所有有效的传入文件
//! 4. 只有外部取消才会结束循环，之后停止并销毁句柄

use crate::client::VoidWarpClient;
use crate::engine::{ReceiverLease, ReceiverState, TransferEngine};
use crate::error::{SessionError, panic_message, payload_message};
use crate::events::{EventChannel, emit};
use crate::logging::LogLevel;
use crate::outcome::OutcomeKind;
use crate::session::{Role, SessionPhase, TransferSession};
use futures_util::FutureExt;
use log::debug;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// 一次接收运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    /// 监听端口
    pub port: u16,
    /// 成功接收的文件数
    pub accepted: u32,
    /// 接受后失败的文件数
    pub failed: u32,
}

impl<E: TransferEngine> VoidWarpClient<E> {
    /// 启动接收端，直到 `cancel` 被取消
    ///
    /// 所有有效的传入文件都会被自动接受，保存为 `save_dir/<文件名>`。
    ///
    /// 进度按文件计：每接受一个新文件，发布的进度序列从头开始，
    /// 同一个文件内不会下降。返回前句柄已经停止并销毁
    /// （接受调用在停止后超过 `listener_join_timeout` 仍未返回的情况除外）。
    pub async fn receive_files(
        &self,
        save_dir: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<ReceiveSummary, SessionError> {
        let save_dir = save_dir.as_ref();

        if save_dir.as_os_str().is_empty() {
            self.log(LogLevel::Error, "Error: Save path is required");
            return Err(SessionError::InvalidInput(
                "save path is required".to_string(),
            ));
        }

        if !tokio::fs::try_exists(save_dir).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::create_dir_all(save_dir).await {
                self.log(
                    LogLevel::Error,
                    format!(
                        "Error: Failed to create save directory {}: {e}",
                        save_dir.display()
                    ),
                );
                return Err(e.into());
            }
            self.log(
                LogLevel::Info,
                format!("Created save directory: {}", save_dir.display()),
            );
        }

        self.log(
            LogLevel::Info,
            format!("Starting receiver, save path: {}", save_dir.display()),
        );

        let session = self.begin_session(Role::Receiver, save_dir);
        let token = cancel.child_token();
        let registration = self.active.register(session.id(), token.clone());

        let result = self.drive_receiver(&session, save_dir, token).await;

        drop(registration);
        session.advance(SessionPhase::Terminal);

        match &result {
            Ok(summary) => self.log(
                LogLevel::Info,
                format!(
                    "Receiver stopped ({} received, {} failed)",
                    summary.accepted, summary.failed
                ),
            ),
            Err(SessionError::EngineUnavailable(_)) => {
                self.log(LogLevel::Error, "Error: Failed to create receiver");
            }
            Err(SessionError::Unexpected(msg)) => {
                self.log(LogLevel::Error, format!("Receiver exception: {msg}"));
            }
            Err(err) => self.log(LogLevel::Error, format!("Receiver failed: {err}")),
        }

        result
    }

    /// 接收到设置中的默认下载目录
    pub async fn receive_to_download_dir(
        &self,
        cancel: CancellationToken,
    ) -> Result<ReceiveSummary, SessionError> {
        let save_dir = self.settings.download_dir.clone();
        self.receive_files(save_dir, cancel).await
    }

    async fn drive_receiver(
        &self,
        session: &Arc<TransferSession>,
        save_dir: &Path,
        token: CancellationToken,
    ) -> Result<ReceiveSummary, SessionError> {
        let engine = self.engine.clone();
        let created = tokio::task::spawn_blocking(move || {
            let handle = engine.create_receiver()?;
            let lease = ReceiverLease::new(engine, handle);
            let port = lease.port();
            Some((lease, port))
        })
        .await?;

        let Some((lease, port)) = created else {
            return Err(SessionError::EngineUnavailable("receiver"));
        };
        let lease = Arc::new(lease);
        session.advance(SessionPhase::Running);
        self.log(LogLevel::Info, format!("Receiver listening on port {port}"));

        let listener = {
            let lease = lease.clone();
            tokio::task::spawn_blocking(move || lease.listen())
        };

        let mut machine = ReceiverStateMachine {
            lease: lease.clone(),
            session: session.clone(),
            events: self.events.clone(),
            save_dir: save_dir.to_path_buf(),
            interval: self.settings.poll_interval(),
            verbose: self.settings.verbose,
            in_flight: None,
            last_state: None,
            summary: ReceiveSummary {
                port,
                ..Default::default()
            },
        };

        // 轮询体中的任何 panic 都在这里截住，句柄照常停止和销毁
        let run = AssertUnwindSafe(machine.run(token)).catch_unwind().await;

        // 先停止，进行中的接受调用随之返回，再等待它和监听线程退出
        lease.stop();
        machine
            .finish_accept(self.settings.listener_join_timeout())
            .await;
        self.join_listener(listener).await;

        let summary = machine.summary;
        drop(machine);
        drop(lease);

        run.map(|()| summary)
            .map_err(|payload| SessionError::Unexpected(payload_message(payload.as_ref())))
    }

    async fn join_listener(&self, listener: JoinHandle<()>) {
        let limit = self.settings.listener_join_timeout();
        match tokio::time::timeout(limit, listener).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.log(
                    LogLevel::Warn,
                    format!("Receiver listener failed: {}", panic_message(err)),
                );
            }
            Err(_) => {
                self.log(
                    LogLevel::Warn,
                    format!(
                        "Receiver listener did not exit within {} ms, abandoning it",
                        limit.as_millis()
                    ),
                );
            }
        }
    }
}

/// 已发出、尚未返回的接受调用
struct InFlightAccept {
    dest: PathBuf,
    task: JoinHandle<i32>,
}

/// 接收端状态机
///
/// 接受调用在阻塞线程池中执行，等待期间继续轮询状态和进度。
struct ReceiverStateMachine<E: TransferEngine> {
    lease: Arc<ReceiverLease<E>>,
    session: Arc<TransferSession>,
    events: Arc<EventChannel>,
    save_dir: PathBuf,
    interval: Duration,
    verbose: bool,
    in_flight: Option<InFlightAccept>,
    last_state: Option<ReceiverState>,
    summary: ReceiveSummary,
}

impl<E: TransferEngine> ReceiverStateMachine<E> {
    async fn run(&mut self, token: CancellationToken) {
        while !token.is_cancelled() {
            self.reap_accept().await;
            self.tick();

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// 等待停止前发出的接受调用返回并报告结果，超时则放弃
    async fn finish_accept(&mut self, limit: Duration) {
        let Some(mut accept) = self.in_flight.take() else {
            return;
        };

        match tokio::time::timeout(limit, &mut accept.task).await {
            Ok(joined) => self.report_accept(&accept.dest, joined),
            Err(_) => {
                self.summary.failed += 1;
                self.log(
                    LogLevel::Warn,
                    format!(
                        "Accept for {} did not return within {} ms, abandoning it",
                        accept.dest.display(),
                        limit.as_millis()
                    ),
                );
            }
        }
    }

    fn tick(&mut self) {
        let state = self.lease.state();
        let changed = self.last_state != Some(state);
        if changed && self.verbose {
            self.log(LogLevel::Debug, format!("Receiver state: {state:?}"));
        }
        self.last_state = Some(state);

        match state {
            ReceiverState::Idle => {}
            ReceiverState::AwaitingAccept => self.handle_pending(),
            ReceiverState::Receiving => {
                let progress = self.lease.progress();
                if let Some(value) = self.session.record_progress(progress) {
                    self.events.publish_progress(value);
                }
            }
            ReceiverState::Error => {
                // 持续处于错误状态时只报告一次
                if changed {
                    self.log(LogLevel::Error, "Receiver encountered an error");
                }
            }
        }
    }

    fn handle_pending(&mut self) {
        if self.in_flight.is_some() {
            return;
        }

        let Some(incoming) = self.lease.take_pending() else {
            debug!("Pending transfer descriptor is not valid, skipping");
            return;
        };

        self.log(
            LogLevel::Info,
            format!(
                "📥 Incoming: {} ({:.2} MB)",
                incoming.file_name,
                incoming.file_size as f64 / 1024.0 / 1024.0
            ),
        );

        let dest = self.save_dir.join(incoming.safe_file_name());
        self.session.reset_progress();

        let lease = self.lease.clone();
        let path = dest.clone();
        let task = tokio::task::spawn_blocking(move || lease.accept(&path));
        self.in_flight = Some(InFlightAccept { dest, task });
    }

    async fn reap_accept(&mut self) {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|accept| accept.task.is_finished());
        if !finished {
            return;
        }
        let Some(accept) = self.in_flight.take() else {
            return;
        };

        let joined = accept.task.await;
        self.report_accept(&accept.dest, joined);
    }

    fn report_accept(&mut self, dest: &Path, joined: Result<i32, JoinError>) {
        match joined {
            Ok(0) => {
                self.summary.accepted += 1;
                self.log(
                    LogLevel::Info,
                    format!("✓ File received: {}", dest.display()),
                );
            }
            Ok(code) => {
                self.summary.failed += 1;
                self.log(
                    LogLevel::Error,
                    format!(
                        "✗ Receive failed with result: {code} ({})",
                        OutcomeKind::from_code(code)
                    ),
                );
            }
            Err(err) => {
                self.summary.failed += 1;
                self.log(
                    LogLevel::Error,
                    format!("✗ Accept call failed: {}", panic_message(err)),
                );
            }
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        emit(&self.events, level, message);
    }
}
