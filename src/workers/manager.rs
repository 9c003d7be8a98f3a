// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 工作管理器
///
/// 启动后台工作器并在收到关闭信号后统一取消
pub struct WorkerManager {
    token: CancellationToken,
    handles: Vec<(String, JoinHandle<Result<(), WorkerError>>)>,
    shutdown_timeout: Duration,
}

impl WorkerManager {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
            shutdown_timeout,
        }
    }

    /// 关闭令牌，取消后所有工作器退出
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 启动一个工作器
    pub fn spawn<W: Worker + 'static>(&mut self, worker: W) {
        let worker = Arc::new(worker);
        let name = worker.name().to_string();
        let token = self.token.child_token();
        info!(worker = %name, "Starting worker");
        let handle = tokio::spawn(async move { worker.run(token).await });
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(self) {
        if self.is_empty() {
            warn!("No workers running, nothing to wait for");
            return;
        }
        tokio::select! {
            _ = shutdown_signal() => info!("Shutdown signal received"),
            _ = self.token.cancelled() => info!("Shutdown requested"),
        }
        self.shutdown().await;
    }

    /// 取消所有工作器并等待它们退出
    ///
    /// 超过 `shutdown_timeout` 仍未退出的工作器会被中止。
    pub async fn shutdown(self) {
        info!("Shutting down workers...");
        self.token.cancel();

        for (name, mut handle) in self.handles {
            match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                Ok(Ok(Ok(()))) => info!(worker = %name, "Worker stopped"),
                Ok(Ok(Err(e))) => error!(worker = %name, error = %e, "Worker exited with error"),
                Ok(Err(e)) => error!(worker = %name, error = %e, "Worker task failed"),
                Err(_) => {
                    warn!(worker = %name, "Worker did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        info!("Workers shut down successfully");
    }
}

/// 等待 Ctrl-C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
