//! 发送端工作流
//!
//! 1. 校验地址和文件（失败时不接触引擎）
//! 2. 在阻塞线程池中创建发送端句柄
//! 3. 同时运行进度监控和引擎的阻塞发送
//! 4. 发送返回后停止监控（最多等待 `monitor_join_timeout`），释放句柄
//! 5. 翻译结果码并发布结果

use crate::client::VoidWarpClient;
use crate::engine::{SenderLease, TransferEngine};
use crate::error::{SessionError, panic_message};
use crate::logging::LogLevel;
use crate::outcome::{OutcomeKind, TransferOutcome};
use crate::session::{Role, SessionPhase, TransferSession};
use crate::workflow::monitor::run_progress_monitor;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

impl<E: TransferEngine> VoidWarpClient<E> {
    /// 发送文件到指定地址，成功返回 `true`
    ///
    /// 取消 `cancel` 只会停止本地的进度轮询，不会中断引擎的传输。
    pub async fn send_file(
        &self,
        ip: &str,
        port: u16,
        file_path: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> bool {
        self.send_file_outcome(ip, port, file_path, cancel)
            .await
            .is_ok_and(|outcome| outcome.is_success())
    }

    /// 发送文件并返回完整结果
    pub async fn send_file_outcome(
        &self,
        ip: &str,
        port: u16,
        file_path: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<TransferOutcome, SessionError> {
        let ip = ip.trim();
        let file_path = file_path.as_ref();

        if ip.is_empty() {
            self.log(LogLevel::Error, "Error: IP address is required");
            return Err(SessionError::InvalidInput(
                "IP address is required".to_string(),
            ));
        }

        if !is_regular_file(file_path).await {
            self.log(
                LogLevel::Error,
                format!("Error: File not found: {}", file_path.display()),
            );
            return Err(SessionError::InvalidInput(format!(
                "file not found: {}",
                file_path.display()
            )));
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.display().to_string());
        self.log(
            LogLevel::Info,
            format!("Starting file send: {file_name} to {ip}:{port}"),
        );

        let session = self.begin_session(Role::Sender, file_path);
        let monitor_token = cancel.child_token();
        let registration = self.active.register(session.id(), monitor_token.clone());

        let result = self
            .drive_send(&session, ip, port, file_path, monitor_token)
            .await;

        // 走到这里时句柄已经释放（或交给仍在运行的后台任务最后释放）
        drop(registration);
        session.advance(SessionPhase::Terminal);

        match result {
            Ok(kind) => {
                if kind.is_success() {
                    let progress = session.record_progress(100.0).unwrap_or(100.0);
                    self.events.publish_progress(progress);
                    self.log(LogLevel::Info, kind.send_message(ip, port));
                } else {
                    self.log(LogLevel::Error, kind.send_message(ip, port));
                }
                Ok(TransferOutcome::new(session.id(), kind))
            }
            Err(err) => {
                match &err {
                    SessionError::EngineUnavailable(_) => {
                        self.log(LogLevel::Error, "Error: Failed to create TCP sender");
                    }
                    SessionError::Unexpected(msg) => {
                        self.log(LogLevel::Error, format!("Exception during send: {msg}"));
                    }
                    other => {
                        self.log(LogLevel::Error, format!("Send failed: {other}"));
                    }
                }
                Err(err)
            }
        }
    }

    async fn drive_send(
        &self,
        session: &Arc<TransferSession>,
        ip: &str,
        port: u16,
        file_path: &Path,
        monitor_token: CancellationToken,
    ) -> Result<OutcomeKind, SessionError> {
        let engine = self.engine.clone();
        let path = file_path.to_path_buf();
        let created = tokio::task::spawn_blocking(move || {
            let handle = engine.create_sender(&path)?;
            let lease = SenderLease::new(engine, handle);
            let file_size = lease.file_size();
            Some((lease, file_size))
        })
        .await?;

        let Some((lease, file_size)) = created else {
            return Err(SessionError::EngineUnavailable("TCP sender"));
        };
        let lease = Arc::new(lease);
        session.advance(SessionPhase::Running);

        self.log(
            LogLevel::Info,
            format!("File size: {:.2} MB", file_size as f64 / 1024.0 / 1024.0),
        );

        // 调用方丢弃这个 future 时也要停止监控
        let _stop_monitor = monitor_token.clone().drop_guard();

        let monitor = {
            let lease = lease.clone();
            let session = session.clone();
            let events = self.events.clone();
            let interval = self.settings.poll_interval();
            let token = monitor_token.clone();
            tokio::spawn(async move {
                run_progress_monitor(move || lease.progress(), &session, &events, interval, token)
                    .await;
            })
        };

        let worker = {
            let lease = lease.clone();
            let ip = ip.to_string();
            let sender_name = self.settings.display_name.clone();
            tokio::task::spawn_blocking(move || lease.start(&ip, port, &sender_name))
        };

        let code = worker.await;

        monitor_token.cancel();
        self.join_monitor(monitor).await;
        drop(lease);

        Ok(OutcomeKind::from_code(code?))
    }

    /// 等待监控退出，超时则放弃（任务会在下一次检查取消时自行结束）
    async fn join_monitor(&self, monitor: JoinHandle<()>) {
        let limit = self.settings.monitor_join_timeout();
        match tokio::time::timeout(limit, monitor).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.log(
                    LogLevel::Warn,
                    format!("Progress monitoring error: {}", panic_message(err)),
                );
            }
            Err(_) => {
                self.log(
                    LogLevel::Warn,
                    format!(
                        "Progress monitor did not stop within {} ms, abandoning it",
                        limit.as_millis()
                    ),
                );
            }
        }
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
