// End-to-end session flow against mocked collaborators.
//
// Capture runs on the synthetic backends; the question service, artifact
// sink, and transcriber are in-memory mocks so every path through the turn
// state machine can be exercised without devices or a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use greenroom::capture::{CaptureSession, SyntheticAudioBackend, SyntheticVideoBackend};
use greenroom::posture::{ClippedSegment, NullPoseEstimator, PostureCounts, PostureSegment};
use greenroom::prompt::{NullPromptPlayer, PromptPlayer};
use greenroom::services::{ArtifactSink, FollowupDecision, FollowupRequest, QuestionService};
use greenroom::session::{Phase, SessionConfig, SessionOrchestrator};
use greenroom::streaming::{TranscriberConnector, TranscriberTurn, TurnContext, TurnTranscript};
use greenroom::{Error, Result};

struct MockQuestionService {
    questions: HashMap<String, String>,
    resume: String,
    /// Taken on first use; later checks see "no follow-up".
    followup: Mutex<Option<FollowupDecision>>,
    followup_audio_url: Option<String>,
    followup_checks: AtomicUsize,
    analyze_calls: AtomicUsize,
}

impl MockQuestionService {
    fn new(question_count: usize) -> Self {
        Self {
            questions: question_map(question_count),
            resume: "Experienced platform engineer".to_string(),
            followup: Mutex::new(None),
            followup_audio_url: None,
            followup_checks: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl QuestionService for MockQuestionService {
    async fn generate_questions(&self, _difficulty: &str) -> Result<()> {
        Ok(())
    }

    async fn all_questions(&self) -> Result<HashMap<String, String>> {
        Ok(self.questions.clone())
    }

    async fn resume_text(&self) -> Result<String> {
        Ok(self.resume.clone())
    }

    async fn followup_check(&self, _request: &FollowupRequest) -> Result<FollowupDecision> {
        self.followup_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.followup.lock().await.take().unwrap_or_default())
    }

    async fn followup_audio(&self, question_number: &str) -> Result<String> {
        match &self.followup_audio_url {
            Some(base) => Ok(format!("{base}/questions{question_number}.wav")),
            None => Err(Error::Followup("prompt not rendered yet".to_string())),
        }
    }

    async fn analyze(
        &self,
        _upload_id: &str,
        _counts: &PostureCounts,
    ) -> Result<serde_json::Value> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "clarity": 4 }))
    }
}

#[derive(Default)]
struct RecordingSink {
    audio_question_ids: Mutex<Vec<String>>,
    clip_uploads: AtomicUsize,
    segment_uploads: AtomicUsize,
    summaries: AtomicUsize,
    fail_everything: bool,
}

impl RecordingSink {
    fn result(&self, artifact: &'static str) -> Result<()> {
        if self.fail_everything {
            Err(Error::Upload {
                artifact,
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ArtifactSink for RecordingSink {
    async fn upload_clip(
        &self,
        _interview_id: &str,
        _question_id: &str,
        _clip: Vec<u8>,
    ) -> Result<()> {
        self.clip_uploads.fetch_add(1, Ordering::SeqCst);
        self.result("video clip")
    }

    async fn upload_segments(
        &self,
        _interview_id: &str,
        _question_id: &str,
        _segments: &[ClippedSegment],
    ) -> Result<()> {
        self.segment_uploads.fetch_add(1, Ordering::SeqCst);
        self.result("posture segments")
    }

    async fn upload_audio(
        &self,
        _email: &str,
        question_id: &str,
        _wav: Vec<u8>,
        _transcript: &str,
        _upload_id: Option<&str>,
    ) -> Result<()> {
        self.audio_question_ids
            .lock()
            .await
            .push(question_id.to_string());
        self.result("answer audio")
    }

    async fn upload_posture_summary(
        &self,
        _interview_id: &str,
        _counts: &PostureCounts,
        _segments: &[PostureSegment],
    ) -> Result<()> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        self.result("posture summary")
    }
}

struct MockConnector {
    transcript: String,
    upload_id: Option<String>,
    frames: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl TranscriberConnector for MockConnector {
    async fn connect(&self, _ctx: TurnContext) -> Result<Box<dyn TranscriberTurn>> {
        Ok(Box::new(MockTurn {
            transcript: self.transcript.clone(),
            upload_id: self.upload_id.clone(),
            frames: Arc::clone(&self.frames),
        }))
    }
}

/// Player whose playback never finishes on its own; only `stop` can
/// silence it. Stands in for a long prompt still rendering to the speaker.
#[derive(Default)]
struct HangingPromptPlayer {
    stops: AtomicUsize,
}

#[async_trait::async_trait]
impl PromptPlayer for HangingPromptPlayer {
    async fn play(&self, _url: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockTurn {
    transcript: String,
    upload_id: Option<String>,
    frames: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl TranscriberTurn for MockTurn {
    async fn send_frame(&mut self, _pcm: Vec<u8>) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    async fn finish(self: Box<Self>) -> TurnTranscript {
        TurnTranscript {
            text: self.transcript,
            upload_id: self.upload_id,
        }
    }
}

fn question_map(n: usize) -> HashMap<String, String> {
    (1..=n)
        .map(|i| (i.to_string(), format!("Question {i}")))
        .collect()
}

fn test_config() -> SessionConfig {
    let mut cfg = SessionConfig::new("cand@example.com");
    cfg.max_answer = Duration::from_secs(1);
    cfg.question_settle = Duration::from_millis(10);
    cfg.followup_audio_retry = Duration::from_millis(10);
    cfg.tts_base = "http://localhost/tts".to_string();
    cfg
}

fn capture() -> CaptureSession {
    CaptureSession::new(
        Box::new(SyntheticAudioBackend::new(16000, 1600)),
        Box::new(SyntheticVideoBackend::new(Duration::from_millis(100))),
    )
}

fn connector(transcript: &str, upload_id: Option<&str>) -> (MockConnector, Arc<AtomicUsize>) {
    let frames = Arc::new(AtomicUsize::new(0));
    let connector = MockConnector {
        transcript: transcript.to_string(),
        upload_id: upload_id.map(|s| s.to_string()),
        frames: Arc::clone(&frames),
    };
    (connector, frames)
}

#[tokio::test]
async fn test_two_question_session_runs_to_completion() {
    let service = Arc::new(MockQuestionService::new(2));
    let sink = Arc::new(RecordingSink::default());
    let (connector, frames) = connector("I led a migration project across two teams", Some("u-42"));

    let (orchestrator, handle) = SessionOrchestrator::new(
        test_config(),
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.questions_asked, 2);
    assert_eq!(outcome.upload_id.as_deref(), Some("u-42"));
    assert_eq!(outcome.analysis, serde_json::json!({ "clarity": 4 }));
    assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.followup_checks.load(Ordering::SeqCst), 2);
    assert_eq!(handle.status().phase, Phase::Ended);

    let ids = sink.audio_question_ids.lock().await.clone();
    assert_eq!(ids, ["1", "2"], "One answer upload per turn, in question order");
    assert!(
        sink.clip_uploads.load(Ordering::SeqCst) >= 1,
        "Synthetic camera chunks materialized into clips"
    );
    assert_eq!(
        sink.segment_uploads.load(Ordering::SeqCst),
        0,
        "No pose model, no posture segments"
    );
    assert_eq!(sink.summaries.load(Ordering::SeqCst), 1);
    assert!(frames.load(Ordering::SeqCst) > 0, "PCM frames streamed during recording");
}

#[tokio::test]
async fn test_followup_is_inserted_after_the_current_turn() {
    let mut service = MockQuestionService::new(1);
    service.followup = Mutex::new(Some(FollowupDecision {
        followup: true,
        question: Some("Tell me more about the rollout".to_string()),
        question_number: Some("6".to_string()),
        audio_url: None,
    }));
    let service = Arc::new(service);

    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("We rolled it out gradually over a month", Some("u-1"));

    let (orchestrator, _handle) = SessionOrchestrator::new(
        test_config(),
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let outcome = orchestrator.run().await.unwrap();

    // The failed secondary audio lookup leaves the follow-up text-only,
    // but it is still asked.
    assert_eq!(outcome.questions_asked, 2);
    let ids = sink.audio_question_ids.lock().await.clone();
    assert_eq!(ids, ["1", "6"]);
    assert_eq!(
        service.followup_checks.load(Ordering::SeqCst),
        2,
        "The follow-up turn gets its own check"
    );
}

#[tokio::test]
async fn test_missing_upload_id_skips_analysis() {
    let service = Arc::new(MockQuestionService::new(1));
    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("A reasonably long answer about testing", None);

    let (orchestrator, _handle) = SessionOrchestrator::new(
        test_config(),
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.upload_id, None);
    assert_eq!(outcome.analysis, serde_json::json!({}));
    assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_degenerate_transcripts_never_ask_for_a_followup() {
    for transcript in ["ok", "BLOB", "   "] {
        let service = Arc::new(MockQuestionService::new(1));
        let sink = Arc::new(RecordingSink::default());
        let (connector, _frames) = connector(transcript, Some("u-1"));

        let (orchestrator, _handle) = SessionOrchestrator::new(
            test_config(),
            capture(),
            service.clone(),
            sink.clone(),
            Arc::new(connector),
            Arc::new(NullPromptPlayer),
            Arc::new(NullPoseEstimator),
        );

        orchestrator.run().await.unwrap();

        assert_eq!(
            service.followup_checks.load(Ordering::SeqCst),
            0,
            "Transcript {transcript:?} must not reach the follow-up service"
        );
    }
}

#[tokio::test]
async fn test_upload_failures_do_not_abort_the_session() {
    let service = Arc::new(MockQuestionService::new(1));
    let sink = Arc::new(RecordingSink {
        fail_everything: true,
        ..RecordingSink::default()
    });
    let (connector, _frames) = connector("Everything fails upstream but we keep going", Some("u-9"));

    let (orchestrator, handle) = SessionOrchestrator::new(
        test_config(),
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(handle.status().phase, Phase::Ended);
    assert_eq!(outcome.analysis, serde_json::json!({ "clarity": 4 }));
    assert_eq!(sink.summaries.load(Ordering::SeqCst), 1, "Summary upload was attempted");
}

#[tokio::test]
async fn test_end_during_prompting_silences_playback() {
    let service = Arc::new(MockQuestionService::new(2));
    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("unused", Some("u-5"));
    let player = Arc::new(HangingPromptPlayer::default());

    let (orchestrator, handle) = SessionOrchestrator::new(
        test_config(),
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        player.clone(),
        Arc::new(NullPoseEstimator),
    );

    let end_handle = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        end_handle.end();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("end command must cut the prompt short")
        .unwrap();

    assert_eq!(player.stops.load(Ordering::SeqCst), 1, "Playback was told to stop");
    assert_eq!(outcome.questions_asked, 0, "The interrupted turn never recorded");
    assert!(sink.audio_question_ids.lock().await.is_empty());
    assert_eq!(handle.status().phase, Phase::Ended);
}

#[tokio::test]
async fn test_end_during_followup_audio_wait_is_not_stalled() {
    let mut service = MockQuestionService::new(1);
    service.followup = Mutex::new(Some(FollowupDecision {
        followup: true,
        question: Some("Tell me more".to_string()),
        question_number: Some("6".to_string()),
        audio_url: None,
    }));
    let service = Arc::new(service);

    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("A long enough answer to warrant a follow-up", Some("u-8"));

    let mut cfg = test_config();
    cfg.followup_audio_retry = Duration::from_secs(3600);

    let (orchestrator, handle) = SessionOrchestrator::new(
        cfg,
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let end_handle = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        end_handle.end();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("end command must cut the audio retry wait short")
        .unwrap();

    assert_eq!(outcome.questions_asked, 1, "Only the recorded turn counts");
    let ids = sink.audio_question_ids.lock().await.clone();
    assert_eq!(ids, ["1"], "The follow-up was abandoned before insertion");
    assert_eq!(handle.status().phase, Phase::Ended);
}

#[tokio::test]
async fn test_manual_advance_closes_the_active_turn() {
    let service = Arc::new(MockQuestionService::new(2));
    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("A complete answer delivered quickly", Some("u-3"));

    let mut cfg = test_config();
    cfg.max_answer = Duration::from_secs(30);

    let (orchestrator, handle) = SessionOrchestrator::new(
        cfg,
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let advancer = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        advancer.advance(5); // stale: targets a turn that is not active
        advancer.advance(0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        advancer.advance(1);
    });

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.questions_asked, 2, "Both turns closed by manual advance");
    let ids = sink.audio_question_ids.lock().await.clone();
    assert_eq!(ids, ["1", "2"]);
    assert_eq!(handle.status().phase, Phase::Ended);
}

#[tokio::test]
async fn test_end_command_closes_the_open_turn() {
    let service = Arc::new(MockQuestionService::new(3));
    let sink = Arc::new(RecordingSink::default());
    let (connector, _frames) = connector("An answer interrupted by the end command", Some("u-7"));

    let mut cfg = test_config();
    cfg.max_answer = Duration::from_secs(30);

    let (orchestrator, handle) = SessionOrchestrator::new(
        cfg,
        capture(),
        service.clone(),
        sink.clone(),
        Arc::new(connector),
        Arc::new(NullPromptPlayer),
        Arc::new(NullPoseEstimator),
    );

    let end_handle = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        end_handle.end();
    });

    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome.questions_asked, 1, "Only the interrupted turn was asked");
    assert_eq!(handle.status().phase, Phase::Ended);

    let ids = sink.audio_question_ids.lock().await.clone();
    assert_eq!(ids, ["1"], "The open turn's artifacts were still uploaded");
    assert_eq!(
        service.followup_checks.load(Ordering::SeqCst),
        0,
        "Early end skips the follow-up check"
    );
    assert_eq!(service.analyze_calls.load(Ordering::SeqCst), 1);
}
