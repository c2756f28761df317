use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::question::{augment_questions, from_question_map, order_questions, Question};
use super::status::{InterviewOutcome, Phase, SessionStatus};
use crate::audio::AudioFramer;
use crate::capture::{CaptureSession, ClipRecorder};
use crate::error::{Error, Result};
use crate::posture::{clip_segments, PoseEstimator, PostureTracker};
use crate::prompt::PromptPlayer;
use crate::services::{ArtifactSink, FollowupRequest, QuestionService};
use crate::streaming::{TranscriberConnector, TurnContext, TurnTranscript};

/// External control commands for a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Advance past the given turn. Ignored when that turn is no longer
    /// the active one.
    Advance { turn: usize },
    /// End the interview early: stop the open recording window and skip
    /// directly to final analysis.
    End,
}

/// Handle for driving and observing a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn advance(&self, turn: usize) {
        let _ = self.commands.send(SessionCommand::Advance { turn });
    }

    pub fn end(&self) {
        let _ = self.commands.send(SessionCommand::End);
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch side of the status channel, for callers that want to await
    /// phase changes.
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

/// What one recording window produced.
struct RecordedTurn {
    question: Question,
    transcript: TurnTranscript,
    wav: Option<Vec<u8>>,
    clip: Option<Vec<u8>>,
    elapsed_secs: u64,
    /// Index into the tracker's segment list where this turn began
    segment_mark: usize,
    end_requested: bool,
}

/// The session orchestrator: owns the capture lifecycle and drives the
/// turn state machine
/// NotStarted → Prompting → Recording → Uploading → FollowupCheck →
/// { Prompting(next) | Ended }.
pub struct SessionOrchestrator {
    cfg: SessionConfig,
    capture: CaptureSession,
    question_service: Arc<dyn QuestionService>,
    sink: Arc<dyn ArtifactSink>,
    transcriber: Arc<dyn TranscriberConnector>,
    prompt: Arc<dyn PromptPlayer>,
    pose: Arc<dyn PoseEstimator>,

    questions: Vec<Question>,
    turn: usize,
    /// Turns that recorded and uploaded; a turn cut off during prompting
    /// does not count.
    turns_completed: usize,
    resume_text: String,
    upload_id: Option<String>,
    tracker: PostureTracker,
    started: Instant,

    /// Bumped at every turn start and at early end; async work tagged
    /// with an older generation is ignored when it resolves late.
    generation: Arc<AtomicU64>,

    commands: mpsc::UnboundedReceiver<SessionCommand>,
    commands_open: bool,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionOrchestrator {
    pub fn new(
        cfg: SessionConfig,
        capture: CaptureSession,
        question_service: Arc<dyn QuestionService>,
        sink: Arc<dyn ArtifactSink>,
        transcriber: Arc<dyn TranscriberConnector>,
        prompt: Arc<dyn PromptPlayer>,
        pose: Arc<dyn PoseEstimator>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let tracker = PostureTracker::new(cfg.posture.clone());

        let orchestrator = Self {
            cfg,
            capture,
            question_service,
            sink,
            transcriber,
            prompt,
            pose,
            questions: Vec::new(),
            turn: 0,
            turns_completed: 0,
            resume_text: String::new(),
            upload_id: None,
            tracker,
            started: Instant::now(),
            generation: Arc::new(AtomicU64::new(0)),
            commands: command_rx,
            commands_open: true,
            status_tx,
        };

        let handle = SessionHandle {
            commands: command_tx,
            status: status_rx,
        };

        (orchestrator, handle)
    }

    /// Run the whole interview to its terminal state.
    ///
    /// Device acquisition failure is the only error that aborts before
    /// the session produces an outcome; everything mid-session degrades
    /// to "skip this artifact, keep going". Capture devices are released
    /// on every exit path.
    pub async fn run(mut self) -> Result<InterviewOutcome> {
        info!("Starting interview session: {}", self.cfg.interview_id);

        self.capture.acquire().await?;

        let result = self.run_inner().await;

        if let Err(e) = self.capture.release().await {
            error!("Capture teardown failed: {}", e);
        }

        let tracker = std::mem::replace(
            &mut self.tracker,
            PostureTracker::new(self.cfg.posture.clone()),
        );
        let (segments, counts) = tracker.finalize();

        if let Err(e) = self
            .sink
            .upload_posture_summary(&self.cfg.interview_id, &counts, &segments)
            .await
        {
            error!("Posture summary upload failed: {}", e);
        }

        let analysis = result?;

        self.set_phase(Phase::Ended);
        info!("Interview session ended: {}", self.cfg.interview_id);

        Ok(InterviewOutcome {
            interview_id: self.cfg.interview_id.clone(),
            questions_asked: self.turns_completed,
            upload_id: self.upload_id.clone(),
            analysis,
            posture_counts: counts,
            posture_segments: segments,
        })
    }

    /// Everything between device acquisition and teardown. Returns the
    /// final analysis payload.
    async fn run_inner(&mut self) -> Result<serde_json::Value> {
        self.fetch_questions().await?;

        loop {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

            // Prompting: playback failure must never block the interview,
            // and an end command abandons playback instead of waiting it out.
            self.set_phase(Phase::Prompting);
            if self.prompt_question().await || self.drain_commands_for_end() {
                info!("End requested during prompting");
                break;
            }

            let turn = self.record_turn(generation).await?;

            self.set_phase(Phase::Uploading);
            self.upload_turn(&turn).await;
            self.turns_completed += 1;

            if turn.end_requested {
                info!("End requested during turn {}", self.turn);
                break;
            }

            self.set_phase(Phase::FollowupCheck);
            if self.followup_check(&turn.transcript.text).await {
                info!("End requested during follow-up check");
                break;
            }

            if self.drain_commands_for_end() {
                break;
            }

            if self.turn + 1 < self.questions.len() {
                self.turn += 1;
            } else {
                break;
            }
        }

        // Invalidate any still-running per-turn tasks.
        self.generation.fetch_add(1, Ordering::SeqCst);

        Ok(self.final_analysis().await)
    }

    /// NotStarted → Prompting: fetch and shape the question sequence.
    async fn fetch_questions(&mut self) -> Result<()> {
        self.question_service
            .generate_questions(&self.cfg.difficulty)
            .await?;

        // Give prompt rendering a moment to settle before the fetch.
        tokio::time::sleep(self.cfg.question_settle).await;

        let map = self.question_service.all_questions().await?;
        let mut questions =
            from_question_map(map, self.cfg.email_localpart(), &self.cfg.tts_base);

        order_questions(&mut questions, &self.cfg.intro_markers);
        augment_questions(&mut questions);

        if questions.is_empty() {
            return Err(Error::Service("no questions were generated".to_string()));
        }

        match self.question_service.resume_text().await {
            Ok(text) => self.resume_text = text,
            Err(e) => {
                // Without resume text follow-ups are disabled, nothing else.
                warn!("Resume text fetch failed: {}", e);
            }
        }

        info!(
            "Question sequence ready: {} questions",
            questions.len()
        );

        self.questions = questions;
        self.turn = 0;
        self.started = Instant::now();

        Ok(())
    }

    /// Play the current question's audio prompt, racing it against the
    /// command channel. Returns true when an end command arrived.
    async fn prompt_question(&mut self) -> bool {
        let Some(url) = self.questions[self.turn].audio_url.clone() else {
            return false;
        };

        let prompt = Arc::clone(&self.prompt);
        let play = prompt.play(&url);
        tokio::pin!(play);

        loop {
            tokio::select! {
                result = &mut play => {
                    if let Err(e) = result {
                        warn!("Question prompt playback failed, recording anyway: {}", e);
                    }
                    return false;
                }

                cmd = self.commands.recv(), if self.commands_open => {
                    match cmd {
                        Some(SessionCommand::End) => {
                            // Silence the prompt; the interview is over.
                            self.prompt.stop();
                            return true;
                        }
                        Some(SessionCommand::Advance { turn }) => {
                            warn!("Ignoring stale advance for turn {}", turn);
                        }
                        None => self.commands_open = false,
                    }
                }
            }
        }
    }

    /// Sleep for the given duration unless an end command arrives first.
    /// Returns true when an end command cut the wait short.
    async fn sleep_or_end(&mut self, duration: std::time::Duration) -> bool {
        let wait = tokio::time::sleep(duration);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                _ = &mut wait => return false,

                cmd = self.commands.recv(), if self.commands_open => {
                    match cmd {
                        Some(SessionCommand::End) => return true,
                        Some(SessionCommand::Advance { turn }) => {
                            warn!("Ignoring stale advance for turn {}", turn);
                        }
                        None => self.commands_open = false,
                    }
                }
            }
        }
    }

    /// One recording window: posture baseline reset, per-turn clip
    /// recorder and streaming connection, countdown capped at the answer
    /// maximum with automatic advance.
    async fn record_turn(&mut self, generation: u64) -> Result<RecordedTurn> {
        self.set_phase(Phase::Recording);

        let question = self.questions[self.turn].clone();
        let turn_idx = self.turn;
        let segment_mark = self.tracker.segments().len();

        info!(
            "Recording turn {} (question {})",
            turn_idx, question.id
        );

        self.tracker.reset_baseline(self.started.elapsed());

        let mut framer = AudioFramer::new(self.cfg.sample_rate);
        let mut clip = ClipRecorder::new();

        let ctx = TurnContext {
            email: self.cfg.email.clone(),
            question_id: question.id.clone(),
            generation,
            active_generation: Arc::clone(&self.generation),
        };

        let mut transcriber = match self.transcriber.connect(ctx).await {
            Ok(turn) => Some(turn),
            Err(e) => {
                // Local capture still feeds the fallback upload.
                warn!("Streaming connection failed, capturing locally: {}", e);
                None
            }
        };

        let max_secs = self.cfg.max_answer.as_secs();
        let mut elapsed: u64 = 0;
        let mut end_requested = false;
        let mut audio_open = true;
        let mut video_open = true;

        {
            let (audio_rx, video_rx) = self.capture.streams()?;

            let mut countdown = tokio::time::interval(std::time::Duration::from_secs(1));
            let mut posture_tick = tokio::time::interval(self.cfg.posture.sample_interval);
            // Both intervals fire immediately on the first tick; consume
            // those so the countdown starts at zero and the first posture
            // sample lands one full interval in.
            countdown.tick().await;
            posture_tick.tick().await;

            loop {
                tokio::select! {
                    _ = countdown.tick() => {
                        elapsed = (elapsed + 1).min(max_secs);
                        self.status_tx.send_modify(|s| s.recording_elapsed_secs = elapsed);
                        if elapsed >= max_secs {
                            info!("Maximum answer duration reached, advancing");
                            break;
                        }
                    }

                    frame = audio_rx.recv(), if audio_open => {
                        match frame {
                            Some(frame) => {
                                let pcm = framer.frame(&frame.samples);
                                if let Some(t) = transcriber.as_mut() {
                                    t.send_frame(pcm).await;
                                }
                            }
                            None => {
                                warn!("Audio capture stream closed mid-turn");
                                audio_open = false;
                            }
                        }
                    }

                    chunk = video_rx.recv(), if video_open => {
                        match chunk {
                            Some(chunk) => clip.push(&chunk),
                            None => video_open = false,
                        }
                    }

                    _ = posture_tick.tick() => {
                        let landmarks = self.pose.sample();
                        self.tracker.observe(landmarks.as_ref(), self.started.elapsed());
                    }

                    cmd = self.commands.recv(), if self.commands_open => {
                        match cmd {
                            Some(SessionCommand::Advance { turn }) if turn == turn_idx => {
                                info!("Manual advance for turn {}", turn_idx);
                                break;
                            }
                            Some(SessionCommand::Advance { turn }) => {
                                warn!("Ignoring stale advance for turn {}", turn);
                            }
                            Some(SessionCommand::End) => {
                                end_requested = true;
                                break;
                            }
                            None => self.commands_open = false,
                        }
                    }
                }
            }
        }

        let transcript = match transcriber.take() {
            Some(turn) => turn.finish().await,
            None => TurnTranscript::default(),
        };

        if self.upload_id.is_none() {
            if let Some(id) = &transcript.upload_id {
                info!("Session upload id assigned: {}", id);
                self.upload_id = Some(id.clone());
            }
        }

        let wav = match framer.finalize() {
            Ok(wav) => Some(wav),
            Err(e) => {
                error!("Waveform finalization failed: {}", e);
                None
            }
        };

        Ok(RecordedTurn {
            question,
            transcript,
            wav,
            clip: clip.finish(),
            elapsed_secs: elapsed,
            segment_mark,
            end_requested,
        })
    }

    /// Upload the turn's artifacts as independent requests; every failure
    /// is logged and the session proceeds.
    async fn upload_turn(&self, turn: &RecordedTurn) {
        if let Some(clip) = &turn.clip {
            if let Err(e) = self
                .sink
                .upload_clip(&self.cfg.interview_id, &turn.question.id, clip.clone())
                .await
            {
                error!("Video clip upload failed: {}", e);
            }
        }

        let turn_segments = &self.tracker.segments()[turn.segment_mark..];
        let clipped = clip_segments(turn_segments, turn.elapsed_secs as f64);
        if !clipped.is_empty() {
            if let Err(e) = self
                .sink
                .upload_segments(&self.cfg.interview_id, &turn.question.id, &clipped)
                .await
            {
                error!("Posture segment upload failed: {}", e);
            }
        }

        if let Some(wav) = &turn.wav {
            if let Err(e) = self
                .sink
                .upload_audio(
                    &self.cfg.email,
                    &turn.question.id,
                    wav.clone(),
                    &turn.transcript.text,
                    self.upload_id.as_deref(),
                )
                .await
            {
                error!("Answer audio upload failed: {}", e);
            }
        }
    }

    /// Ask the service whether the answer warrants a follow-up; insert it
    /// immediately after the current turn when it does. Service errors
    /// are treated as "no follow-up". Returns true when an end command
    /// arrived during the audio retry wait.
    async fn followup_check(&mut self, transcript: &str) -> bool {
        let refined = transcript.trim();

        // Degenerate transcripts never trigger a follow-up.
        if refined.is_empty()
            || refined.eq_ignore_ascii_case("blob")
            || refined.chars().count() <= 5
        {
            info!("Transcript too short for follow-up, skipping");
            return false;
        }

        if self.resume_text.is_empty() {
            return false;
        }

        let question = &self.questions[self.turn];
        let base_number = match question.numeric_id() {
            u64::MAX => 0,
            n => n,
        };

        let request = FollowupRequest {
            resume_text: self.resume_text.clone(),
            user_answer: refined.to_string(),
            base_question_number: base_number,
            interview_id: self.cfg.interview_id.clone(),
            existing_question_numbers: self.questions.iter().map(|q| q.id.clone()).collect(),
        };

        let decision = match self.question_service.followup_check(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Follow-up check failed, treated as no follow-up: {}", e);
                return false;
            }
        };

        if !decision.followup {
            return false;
        }

        // The prompt may still be rendering; wait once, then try the
        // secondary lookup. Failure leaves the follow-up text-only.
        let mut audio_url = decision.audio_url;
        if audio_url.is_none() {
            if let Some(number) = &decision.question_number {
                if self.sleep_or_end(self.cfg.followup_audio_retry).await {
                    return true;
                }

                match self.question_service.followup_audio(number).await {
                    Ok(url) => audio_url = Some(url),
                    Err(e) => {
                        warn!("Follow-up audio lookup failed, proceeding text-only: {}", e);
                    }
                }
            }
        }

        let (Some(text), Some(number)) = (decision.question, decision.question_number) else {
            warn!("Follow-up decision missing question body, ignoring");
            return false;
        };

        let followup = Question {
            id: number,
            text,
            kind: "behavioral".to_string(),
            difficulty: "medium".to_string(),
            audio_url,
        };

        info!(
            "Inserting follow-up question {} after turn {}",
            followup.id, self.turn
        );
        self.questions.insert(self.turn + 1, followup);
        self.status_tx
            .send_modify(|s| s.question_count = self.questions.len());
        false
    }

    /// Request final analysis. Without an upload id the request would be
    /// meaningless, so it is skipped outright; in every case the session
    /// terminates with a (possibly empty) analysis payload.
    async fn final_analysis(&self) -> serde_json::Value {
        let Some(upload_id) = &self.upload_id else {
            warn!("No upload id received, skipping final analysis");
            return serde_json::json!({});
        };

        match self
            .question_service
            .analyze(upload_id, self.tracker.counts())
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Final analysis failed, ending with empty result: {}", e);
                serde_json::json!({})
            }
        }
    }

    /// Pull queued commands without blocking; report whether an early end
    /// was requested. Stale advances are dropped here.
    fn drain_commands_for_end(&mut self) -> bool {
        let mut end = false;
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                SessionCommand::End => end = true,
                SessionCommand::Advance { turn } => {
                    warn!("Ignoring stale advance for turn {}", turn);
                }
            }
        }
        end
    }

    fn set_phase(&self, phase: Phase) {
        self.status_tx.send_modify(|s| {
            s.phase = phase;
            s.turn = self.turn;
            s.question_count = self.questions.len();
            if phase != Phase::Recording {
                s.recording_elapsed_secs = 0;
            }
        });
    }
}
