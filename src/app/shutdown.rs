use super::{AssistOrchestrator, ComponentState, EVENT_LOGGER, GOLD_BOX, HEALTH_BAR};
use crate::error::{AssistError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// How long a monitor gets to finish its current poll
const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl AssistOrchestrator {
    /// Stop every component; returns 1 if any of them failed to stop cleanly
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        self.set_component_state(HEALTH_BAR, ComponentState::Stopping)
            .await;
        let result = timeout(MONITOR_STOP_TIMEOUT, self.health_bar.stop()).await;
        if self.finish_stop(HEALTH_BAR, result).await.is_err() {
            exit_code = 1;
        }

        self.set_component_state(GOLD_BOX, ComponentState::Stopping)
            .await;
        let result = timeout(MONITOR_STOP_TIMEOUT, self.gold_box.stop()).await;
        if self.finish_stop(GOLD_BOX, result).await.is_err() {
            exit_code = 1;
        }

        self.set_component_state(EVENT_LOGGER, ComponentState::Stopping)
            .await;
        let logger = self.event_logger.take();
        let result = timeout(MONITOR_STOP_TIMEOUT, join_logger(logger)).await;
        if self.finish_stop(EVENT_LOGGER, result).await.is_err() {
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn finish_stop(
        &self,
        component: &str,
        result: std::result::Result<Result<()>, tokio::time::error::Elapsed>,
    ) -> Result<()> {
        match result {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(AssistError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

fn join_logger(
    task: Option<tokio::task::JoinHandle<()>>,
) -> impl Future<Output = Result<()>> {
    async move {
        match task {
            Some(task) => task
                .await
                .map_err(|e| AssistError::component(EVENT_LOGGER, e.to_string())),
            None => Ok(()),
        }
    }
}
