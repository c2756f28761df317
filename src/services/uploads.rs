use reqwest::multipart;
use tracing::info;

use crate::error::{Error, Result};
use crate::posture::{ClippedSegment, PostureCounts, PostureSegment};

/// Per-turn and end-of-session artifact uploads.
///
/// Every method is independent: a failure is reported to the caller, who
/// logs it and moves on. No upload blocks the session.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Upload one turn's video clip.
    async fn upload_clip(&self, interview_id: &str, question_id: &str, clip: Vec<u8>)
        -> Result<()>;

    /// Upload one turn's clipped posture segments with a parallel
    /// feedback-text list.
    async fn upload_segments(
        &self,
        interview_id: &str,
        question_id: &str,
        segments: &[ClippedSegment],
    ) -> Result<()>;

    /// Upload one turn's finalized waveform and transcript.
    async fn upload_audio(
        &self,
        email: &str,
        question_id: &str,
        wav: Vec<u8>,
        transcript: &str,
        upload_id: Option<&str>,
    ) -> Result<()>;

    /// Upload the whole-session posture summary at teardown.
    async fn upload_posture_summary(
        &self,
        interview_id: &str,
        counts: &PostureCounts,
        segments: &[PostureSegment],
    ) -> Result<()>;
}

/// HTTP multipart/JSON implementation of the upload endpoints.
pub struct HttpArtifactSink {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpArtifactSink {
    pub fn new(base: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            token,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(
        response: std::result::Result<reqwest::Response, reqwest::Error>,
        artifact: &'static str,
    ) -> Result<()> {
        let response = response.map_err(|e| Error::Upload {
            artifact,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload {
                artifact,
                message: format!("{status} {body}"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ArtifactSink for HttpArtifactSink {
    async fn upload_clip(
        &self,
        interview_id: &str,
        question_id: &str,
        clip: Vec<u8>,
    ) -> Result<()> {
        info!(
            "Uploading video clip for question {} ({} bytes)",
            question_id,
            clip.len()
        );

        let part = multipart::Part::bytes(clip)
            .file_name("clip.webm")
            .mime_str("video/webm")
            .map_err(|e| Error::Upload {
                artifact: "video clip",
                message: e.to_string(),
            })?;

        let form = multipart::Form::new()
            .part("video", part)
            .text("interview_id", interview_id.to_string())
            .text("question_id", question_id.to_string());

        let response = self
            .client
            .post(format!("{}/video/upload-question-clip/", self.base))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await;

        Self::check(response, "video clip").await
    }

    async fn upload_segments(
        &self,
        interview_id: &str,
        question_id: &str,
        segments: &[ClippedSegment],
    ) -> Result<()> {
        info!(
            "Uploading {} posture segments for question {}",
            segments.len(),
            question_id
        );

        let payload = serde_json::json!({
            "interview_id": interview_id,
            "question_id": question_id,
            "segments": segments,
            "feedbacks": vec![""; segments.len()],
        });

        let response = self
            .client
            .post(format!(
                "{}/video/extract-question-clip-segments/",
                self.base
            ))
            .header("Authorization", self.bearer())
            .json(&payload)
            .send()
            .await;

        Self::check(response, "posture segments").await
    }

    async fn upload_audio(
        &self,
        email: &str,
        question_id: &str,
        wav: Vec<u8>,
        transcript: &str,
        upload_id: Option<&str>,
    ) -> Result<()> {
        info!(
            "Uploading answer audio for question {} ({} bytes, transcript {} chars)",
            question_id,
            wav.len(),
            transcript.len()
        );

        let audio_part = multipart::Part::bytes(wav)
            .file_name("answer.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Upload {
                artifact: "answer audio",
                message: e.to_string(),
            })?;

        let mut form = multipart::Form::new()
            .part("audio", audio_part)
            .text("transcript", transcript.to_string())
            .text("email", email.to_string())
            .text("question_id", question_id.to_string());

        if let Some(id) = upload_id {
            form = form.text("upload_id", id.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/upload/", self.base))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await;

        Self::check(response, "answer audio").await
    }

    async fn upload_posture_summary(
        &self,
        interview_id: &str,
        counts: &PostureCounts,
        segments: &[PostureSegment],
    ) -> Result<()> {
        let payload = serde_json::json!({
            "videoId": interview_id,
            "count": counts,
            "segments": segments,
        });

        let response = self
            .client
            .post(format!("{}/posture/", self.base))
            .header("Authorization", self.bearer())
            .json(&payload)
            .send()
            .await;

        Self::check(response, "posture summary").await
    }
}
