use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Text marker appended to the cloned supplementary question.
pub const SUPPLEMENTARY_SUFFIX: &str = " (보충 질문)";

/// Default substrings that mark a self-introduction question.
pub const DEFAULT_INTRO_MARKERS: &[&str] = &["자기소개", "introduce yourself"];

/// One interview question. Immutable once created; follow-up insertion
/// appends new `Question` values, it never mutates existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: String,
    pub difficulty: String,
    /// Pre-rendered audio prompt location, when one exists
    pub audio_url: Option<String>,
}

impl Question {
    /// Numeric component of the id (first decimal run). Questions without
    /// one sort last.
    pub fn numeric_id(&self) -> u64 {
        let digits: String = self
            .id
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(u64::MAX)
    }

    pub fn is_introduction(&self, markers: &[String]) -> bool {
        markers.iter().any(|m| self.text.contains(m.as_str()))
    }
}

/// Convert the service's loosely-typed question map into `Question`
/// values, deriving each prompt URL from the hosted TTS layout.
pub fn from_question_map(
    map: HashMap<String, String>,
    email_local: &str,
    tts_base: &str,
) -> Vec<Question> {
    map.into_iter()
        .map(|(id, text)| {
            let audio_url = format!("{tts_base}/{email_local}/questions{id}.wav");
            Question {
                id,
                text,
                kind: "behavioral".to_string(),
                difficulty: "medium".to_string(),
                audio_url: Some(audio_url),
            }
        })
        .collect()
}

/// Order primary questions: a self-introduction question is forced first,
/// the rest sort by embedded numeric id ascending. The sort is stable, so
/// questions with equal keys keep service order.
pub fn order_questions(questions: &mut [Question], intro_markers: &[String]) {
    questions.sort_by_key(|q| {
        let intro = if q.is_introduction(intro_markers) { 0u8 } else { 1 };
        (intro, q.numeric_id())
    });
}

/// Deterministic augmentation: a primary set of exactly five questions
/// gets a clone of the third question inserted at position four, with a
/// derived id and a supplementary text marker.
pub fn augment_questions(questions: &mut Vec<Question>) {
    if questions.len() != 5 {
        return;
    }

    let mut copied = questions[2].clone();
    copied.id = format!("{}_copy", copied.id);
    copied.text.push_str(SUPPLEMENTARY_SUFFIX);

    questions.insert(4, copied);
}
