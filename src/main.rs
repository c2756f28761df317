use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use greenroom::capture::{
    CaptureSession, CpalMicBackend, NullVideoBackend, SyntheticAudioBackend,
    SyntheticVideoBackend,
};
use greenroom::posture::NullPoseEstimator;
use greenroom::prompt::{HttpPromptPlayer, NullPromptPlayer, PromptPlayer};
use greenroom::services::{HttpArtifactSink, HttpQuestionService};
use greenroom::{Config, SessionConfig, SessionOrchestrator, WsTranscriberConnector};

/// Unattended interview session runner.
#[derive(Debug, Parser)]
#[command(name = "greenroom", version)]
struct Args {
    /// Config profile to load
    #[arg(long, default_value = "config/greenroom")]
    config: String,

    /// Candidate email
    #[arg(long)]
    email: String,

    /// Question difficulty passed to the service
    #[arg(long)]
    difficulty: Option<String>,

    /// API token (falls back to GREENROOM_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Use synthetic capture backends instead of real devices
    #[arg(long)]
    synthetic: bool,

    /// Skip speaker playback of question prompts
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let token = args
        .token
        .or_else(|| std::env::var("GREENROOM_TOKEN").ok())
        .context("no API token: pass --token or set GREENROOM_TOKEN")?;

    let mut session_cfg = SessionConfig::new(&args.email);
    if let Some(difficulty) = args.difficulty {
        session_cfg.difficulty = difficulty;
    }
    session_cfg.sample_rate = cfg.audio.sample_rate;
    session_cfg.max_answer = Duration::from_secs(cfg.interview.max_answer_secs);
    session_cfg.question_settle = Duration::from_secs(cfg.interview.question_settle_secs);
    session_cfg.followup_audio_retry =
        Duration::from_secs(cfg.interview.followup_audio_retry_secs);
    session_cfg.tts_base = cfg.service.tts_base.clone();

    info!("Greenroom v{}", env!("CARGO_PKG_VERSION"));
    info!("Interview id: {}", session_cfg.interview_id);

    let capture = if args.synthetic {
        CaptureSession::new(
            Box::new(SyntheticAudioBackend::new(
                cfg.audio.sample_rate,
                cfg.audio.frame_samples,
            )),
            Box::new(SyntheticVideoBackend::new(Duration::from_millis(500))),
        )
    } else {
        CaptureSession::new(
            Box::new(CpalMicBackend::new(
                cfg.audio.sample_rate,
                cfg.audio.frame_samples,
            )),
            Box::new(NullVideoBackend::new()),
        )
    };

    let prompt: Arc<dyn PromptPlayer> = if args.quiet {
        Arc::new(NullPromptPlayer)
    } else {
        Arc::new(HttpPromptPlayer::new())
    };

    let (orchestrator, handle) = SessionOrchestrator::new(
        session_cfg,
        capture,
        Arc::new(HttpQuestionService::new(
            cfg.service.api_base.clone(),
            token.clone(),
        )),
        Arc::new(HttpArtifactSink::new(
            cfg.service.api_base.clone(),
            token.clone(),
        )),
        Arc::new(WsTranscriberConnector::new(
            cfg.service.ws_base.clone(),
            token,
        )),
        prompt,
        Arc::new(NullPoseEstimator),
    );

    // Ctrl-C ends the interview cleanly: the open turn is closed, its
    // artifacts uploaded, and the posture summary sent before exit.
    let interrupt_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, ending interview");
            interrupt_handle.end();
        }
    });

    let outcome = orchestrator.run().await?;

    info!(
        "Interview complete: {} questions answered",
        outcome.questions_asked
    );
    match &outcome.upload_id {
        Some(id) => info!("Upload id: {}", id),
        None => warn!("No upload id was assigned; analysis was skipped"),
    }
    println!("{}", serde_json::to_string_pretty(&outcome.analysis)?);

    Ok(())
}
