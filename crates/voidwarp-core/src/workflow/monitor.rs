//! 进度监控
//!
//! 按固定间隔采样进度并发布，直到被取消或进度到达 100。
//! 每次采样都在阻塞线程池中执行，采样卡住时取消仍然立即生效。
//! 循环不持有锁，也没有必须执行的收尾动作，随时可以被放弃。

use crate::events::EventChannel;
use crate::session::TransferSession;
use log::{trace, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 运行进度监控循环
///
/// `sample` 每个间隔在阻塞线程池中调用一次；发布的值经过
/// [`TransferSession::record_progress`]，所以订阅者看到的序列不会下降。
/// 取消时正在进行的采样会被放弃，它持有的引用在采样返回后释放。
pub async fn run_progress_monitor<F>(
    sample: F,
    session: &TransferSession,
    events: &EventChannel,
    interval: Duration,
    token: CancellationToken,
) where
    F: Fn() -> f32 + Clone + Send + 'static,
{
    while !token.is_cancelled() {
        let sampled = tokio::select! {
            () = token.cancelled() => break,
            sampled = tokio::task::spawn_blocking(sample.clone()) => sampled,
        };

        let progress = match sampled {
            Ok(progress) => progress,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!("Progress sample did not complete: {err}");
                break;
            }
        };
        trace!("Sampled progress {progress:.1}");

        if let Some(value) = session.record_progress(progress) {
            events.publish_progress(value);
        }

        if progress >= 100.0 {
            break;
        }

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
}
