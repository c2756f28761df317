use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::posture::PostureCounts;

/// Follow-up decision request payload.
#[derive(Debug, Clone, Serialize)]
pub struct FollowupRequest {
    pub resume_text: String,
    pub user_answer: String,
    pub base_question_number: u64,
    pub interview_id: String,
    pub existing_question_numbers: Vec<String>,
}

/// Follow-up decision from the Question/Analysis service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowupDecision {
    #[serde(default)]
    pub followup: bool,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub question_number: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Question/Analysis service contract.
#[async_trait::async_trait]
pub trait QuestionService: Send + Sync {
    /// Kick off question + prompt generation for this candidate.
    async fn generate_questions(&self, difficulty: &str) -> Result<()>;

    /// Fetch the generated question map (id → text). Loosely typed on the
    /// wire; the session layer converts it into `Question` values.
    async fn all_questions(&self) -> Result<HashMap<String, String>>;

    async fn resume_text(&self) -> Result<String>;

    async fn followup_check(&self, request: &FollowupRequest) -> Result<FollowupDecision>;

    /// Secondary lookup for a follow-up prompt that was not ready at
    /// decision time. Returns the audio URL.
    async fn followup_audio(&self, question_number: &str) -> Result<String>;

    /// Final analysis over the whole session.
    async fn analyze(&self, upload_id: &str, counts: &PostureCounts) -> Result<serde_json::Value>;
}

#[derive(Debug, Deserialize)]
struct QuestionMapResponse {
    questions: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ResumeTextResponse {
    #[serde(default)]
    resume_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowupAudioResponse {
    audio_url: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    analysis: serde_json::Value,
}

/// HTTP client for the Question/Analysis service.
pub struct HttpQuestionService {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpQuestionService {
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

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} failed: {} {}", what, status, body);
            return Err(Error::Service(format!("{what} failed: {status}")));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl QuestionService for HttpQuestionService {
    async fn generate_questions(&self, difficulty: &str) -> Result<()> {
        info!("Requesting question generation (difficulty: {})", difficulty);

        let response = self
            .client
            .post(format!("{}/generate-resume-questions/", self.base))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "difficulty": difficulty }))
            .send()
            .await?;

        Self::check(response, "question generation").await?;
        Ok(())
    }

    async fn all_questions(&self) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .get(format!("{}/get_all_questions/", self.base))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        let body: QuestionMapResponse =
            Self::check(response, "question fetch").await?.json().await?;

        info!("Fetched {} questions", body.questions.len());
        Ok(body.questions)
    }

    async fn resume_text(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/get-resume-text/", self.base))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        let body: ResumeTextResponse =
            Self::check(response, "resume fetch").await?.json().await?;

        Ok(body.resume_text.unwrap_or_default())
    }

    async fn followup_check(&self, request: &FollowupRequest) -> Result<FollowupDecision> {
        let response = self
            .client
            .post(format!("{}/followup/check/", self.base))
            .header("Authorization", self.bearer())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Followup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Followup(format!("follow-up check failed: {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Followup(e.to_string()))
    }

    async fn followup_audio(&self, question_number: &str) -> Result<String> {
        let response = self
            .client
            .get(format!(
                "{}/followup/audio/question{}/",
                self.base, question_number
            ))
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| Error::Followup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Followup(format!(
                "follow-up audio lookup failed: {status}"
            )));
        }

        let body: FollowupAudioResponse = response
            .json()
            .await
            .map_err(|e| Error::Followup(e.to_string()))?;

        Ok(body.audio_url)
    }

    async fn analyze(&self, upload_id: &str, counts: &PostureCounts) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/analyze-voice/", self.base))
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({
                "upload_id": upload_id,
                "posture_count": counts,
            }))
            .send()
            .await
            .map_err(|e| Error::Analysis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Analysis(format!("analysis failed: {status}")));
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| Error::Analysis(e.to_string()))?;

        Ok(body.analysis)
    }
}
