use super::{AssistOrchestrator, ShutdownReason};
use crate::error::{AssistError, Result};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

impl AssistOrchestrator {
    /// Run until a signal or [`shutdown_token`](Self::shutdown_token) asks to
    /// stop, then shut down. Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Assistant is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| AssistError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| AssistError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let token = self.cancellation_token.clone();
        let reason = tokio::select! {
            received = shutdown_receiver => received
                .map_err(|_| AssistError::system("Shutdown channel closed unexpectedly"))?,
            _ = token.cancelled() => ShutdownReason::UserRequest,
        };

        info!("Shutdown initiated: {:?}", reason);

        let exit_code = self.shutdown().await?;
        let exit_code = match reason {
            ShutdownReason::Error(_) => exit_code.max(1),
            _ => exit_code,
        };

        info!("Assistant shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};

                let mut terminate = match signal(SignalKind::terminate()) {
                    Ok(terminate) => terminate,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if terminate.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = sender.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    if let Some(sender) = sender.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }
}
