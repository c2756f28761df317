use serde::Deserialize;

/// Inbound message from the transcription backend.
///
/// The wire format is loosely typed JSON: an `upload_id` announcement
/// carries `type: "upload_id"`, incremental transcripts carry only a
/// `transcript` field. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    UploadId(String),
    Transcript(String),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    upload_id: Option<String>,
    transcript: Option<String>,
}

/// Parse one inbound text frame. Returns `None` for malformed or
/// unrecognized messages, which are dropped rather than treated as fatal.
pub fn parse_server_message(text: &str) -> Option<ServerMessage> {
    let raw: RawMessage = serde_json::from_str(text).ok()?;

    if raw.kind.as_deref() == Some("upload_id") {
        return raw.upload_id.map(ServerMessage::UploadId);
    }
    raw.transcript.map(ServerMessage::Transcript)
}

/// Sentinel the client sends to mark end-of-turn.
pub const END_OF_TURN: &[u8] = b"END";
