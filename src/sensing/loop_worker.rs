use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::conversation::CompletionClient;
use crate::desktop_bridge::{OcrEngine, ReplyDispatcher, WindowCapture};
use crate::error::WatchError;
use crate::models::Point;

use super::pipeline::Pipeline;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// External collaborators used by each cycle.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn WindowCapture>,
    pub ocr: Arc<dyn OcrEngine>,
    pub completion: Arc<dyn CompletionClient>,
    pub dispatcher: Arc<dyn ReplyDispatcher>,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub title_prefix: String,
    pub input_box: Point,
    /// Sleep between cycles that found no new question.
    pub poll_interval: Duration,
    /// Checked once per cycle; never interrupts an in-flight call.
    pub run_budget: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    WindowHidden,
    Unchanged,
    NoQuestions,
    Answered(usize),
}

#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub cycles: u64,
    pub hidden_count: u64,
    pub unchanged_count: u64,
    pub ocr_count: u64,
    pub answered_count: u64,
}

impl RunStats {
    fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::WindowHidden => self.hidden_count += 1,
            CycleOutcome::Unchanged => self.unchanged_count += 1,
            CycleOutcome::NoQuestions => self.ocr_count += 1,
            CycleOutcome::Answered(count) => {
                self.ocr_count += 1;
                self.answered_count += count as u64;
            }
        }
    }
}

/// Poll until cancelled, the run budget is spent, or a fatal error occurs.
pub async fn watch_loop(
    mut pipeline: Pipeline,
    collaborators: Collaborators,
    config: LoopConfig,
    cancel_token: CancellationToken,
) -> Result<RunStats, WatchError> {
    let started = Instant::now();
    let mut stats = RunStats::default();

    loop {
        if cancel_token.is_cancelled() {
            log_info!("watch loop cancelled");
            break;
        }

        let outcome = run_cycle(&mut pipeline, &collaborators, &config).await?;
        stats.record(outcome);

        if !matches!(outcome, CycleOutcome::Answered(_)) {
            log_info!(
                "No new questions in window '{}', waiting {}s before next try",
                config.title_prefix,
                config.poll_interval.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = cancel_token.cancelled() => {
                    log_info!("watch loop cancelled");
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        log_info!(
            "Elapsed time: {:.2} of total limit of {:.2} seconds",
            elapsed.as_secs_f64(),
            config.run_budget.as_secs_f64()
        );
        if elapsed > config.run_budget {
            log_info!("Elapsed time exceeding limit, exiting");
            break;
        }
    }

    log_info!(
        "watch loop finished: {} cycles, {} unchanged, {} hidden, {} OCR runs, {} answers",
        stats.cycles,
        stats.unchanged_count,
        stats.hidden_count,
        stats.ocr_count,
        stats.answered_count
    );
    Ok(stats)
}

/// Capture, gate on change, recognize, and answer every new question in
/// detection order. Any error aborts the rest of the cycle.
pub async fn run_cycle(
    pipeline: &mut Pipeline,
    collaborators: &Collaborators,
    config: &LoopConfig,
) -> Result<CycleOutcome, WatchError> {
    let captured = tokio::task::spawn_blocking({
        let capture = Arc::clone(&collaborators.capture);
        let prefix = config.title_prefix.clone();
        move || capture.capture(&prefix)
    })
    .await
    .map_err(|err| WatchError::Capture(format!("capture worker join failed: {err}")))??;

    let Some(captured) = captured else {
        log_warn!("Chat window '{}' is not visible, skipping cycle", config.title_prefix);
        return Ok(CycleOutcome::WindowHidden);
    };

    let image = Arc::new(captured.image);
    if !pipeline.observe_capture(Arc::clone(&image)) {
        log_info!("The chat window screenshot is the same as the previous one. No new questions.");
        return Ok(CycleOutcome::Unchanged);
    }
    log_info!("The chat window screenshot changed. Detecting new questions...");

    let fragments = tokio::task::spawn_blocking({
        let ocr = Arc::clone(&collaborators.ocr);
        move || ocr.recognize(&image)
    })
    .await
    .map_err(|err| WatchError::OcrEngineFailure(format!("OCR worker join failed: {err}")))??;
    log_debug!("OCR returned {} fragments", fragments.len());

    let questions = pipeline.extract_questions(&fragments);
    if questions.is_empty() {
        return Ok(CycleOutcome::NoQuestions);
    }

    for question in &questions {
        log_info!("New message detected: {}", question.normalized_key);
        let reply = pipeline
            .answer(question, collaborators.completion.as_ref())
            .await?;
        log_info!("Reply: {}", reply);

        dispatch_reply(collaborators, reply, config.input_box).await;
    }

    Ok(CycleOutcome::Answered(questions.len()))
}

async fn dispatch_reply(collaborators: &Collaborators, reply: String, at: Point) {
    let dispatcher = Arc::clone(&collaborators.dispatcher);
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(&reply, at)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log_warn!("reply injection failed: {err:#}"),
        Err(err) => log_warn!("reply injection worker join failed: {err}"),
    }
}
