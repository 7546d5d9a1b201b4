use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;

use super::loop_worker::{watch_loop, Collaborators, LoopConfig, RunStats};
use super::pipeline::Pipeline;

/// Owns the background watch task and its cancellation token.
pub struct WatchController {
    handle: Option<JoinHandle<Result<RunStats, WatchError>>>,
    cancel_token: Option<CancellationToken>,
}

impl WatchController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        pipeline: Pipeline,
        collaborators: Collaborators,
        config: LoopConfig,
    ) -> Result<CancellationToken> {
        if self.handle.is_some() {
            bail!("watch loop already active");
        }

        info!("Starting watch loop for window prefix '{}'", config.title_prefix);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(watch_loop(
            pipeline,
            collaborators,
            config,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token.clone());
        Ok(cancel_token)
    }

    /// Wait for the loop to end on its own (budget spent or fatal error).
    pub async fn wait(&mut self) -> Result<RunStats> {
        let handle = self
            .handle
            .take()
            .context("watch loop was never started")?;
        self.cancel_token = None;

        let stats = handle
            .await
            .context("watch loop task failed to join")??;
        Ok(stats)
    }

    /// Ask the loop to stop after the current cycle, then join it.
    pub async fn stop(&mut self) -> Result<Option<RunStats>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => {
                let stats = handle
                    .await
                    .context("watch loop task failed to join")??;
                Ok(Some(stats))
            }
            None => Ok(None),
        }
    }
}

impl Default for WatchController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationContext, TrimPolicy};
    use crate::models::Point;
    use crate::normalize::NormalizeConfig;
    use crate::sensing::loop_worker::tests::{
        fragment, frame, EchoCompletion, RecordingDispatcher, ScriptedCapture, ScriptedOcr,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            NormalizeConfig::new(["markerA"], 15.0),
            ConversationContext::new("persona", "m", 0.8, TrimPolicy::default()),
        )
    }

    fn config(poll_interval: Duration) -> LoopConfig {
        LoopConfig {
            title_prefix: "Chat".into(),
            input_box: Point::new(0.0, 0.0),
            poll_interval,
            run_budget: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn stop_cancels_a_sleeping_loop() {
        // The capture never signals completion; only `stop` ends the loop.
        let never = CancellationToken::new();
        let collaborators = Collaborators {
            capture: Arc::new(ScriptedCapture::new(vec![Some(frame(1)), Some(frame(1))], never)),
            ocr: Arc::new(ScriptedOcr::new(Vec::new())),
            completion: Arc::new(EchoCompletion::default()),
            dispatcher: Arc::new(RecordingDispatcher::default()),
        };

        let mut controller = WatchController::new();
        controller
            .start(pipeline(), collaborators, config(Duration::from_secs(3600)))
            .unwrap();
        assert!(controller.is_running());

        let stats = controller.stop().await.unwrap().unwrap();
        assert!(!controller.is_running());
        assert!(stats.cycles <= 1);
    }

    #[tokio::test]
    async fn wait_returns_stats_when_loop_finishes() {
        let done = CancellationToken::new();
        let completion = Arc::new(EchoCompletion::default());
        let collaborators = Collaborators {
            capture: Arc::new(ScriptedCapture::new(vec![Some(frame(1))], done.clone())),
            ocr: Arc::new(ScriptedOcr::new(vec![Ok(vec![fragment("markerA hi", 0.0, 8.0)])])),
            completion: completion.clone(),
            dispatcher: Arc::new(RecordingDispatcher::default()),
        };

        let mut controller = WatchController::new();
        let token = controller
            .start(pipeline(), collaborators, config(Duration::ZERO))
            .unwrap();
        // The scripted capture cancels its own token when exhausted; forward it.
        tokio::spawn(async move {
            done.cancelled().await;
            token.cancel();
        });

        let stats = controller.wait().await.unwrap();
        assert_eq!(stats.answered_count, 1);
        assert_eq!(*completion.prompts.lock().unwrap(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let collaborators = Collaborators {
            capture: Arc::new(ScriptedCapture::new(Vec::new(), CancellationToken::new())),
            ocr: Arc::new(ScriptedOcr::new(Vec::new())),
            completion: Arc::new(EchoCompletion::default()),
            dispatcher: Arc::new(RecordingDispatcher::default()),
        };

        let mut controller = WatchController::new();
        controller
            .start(pipeline(), collaborators.clone(), config(Duration::from_secs(3600)))
            .unwrap();
        assert!(controller
            .start(pipeline(), collaborators, config(Duration::from_secs(3600)))
            .is_err());
        controller.stop().await.unwrap();
    }
}
