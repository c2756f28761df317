use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};

use super::messages::{parse_server_message, ServerMessage, END_OF_TURN};
use crate::error::{Error, Result};

/// Identity of the question turn a streaming connection was opened for.
///
/// The reader task compares its issue generation against the shared active
/// generation and drops anything arriving for a superseded turn.
#[derive(Clone)]
pub struct TurnContext {
    pub email: String,
    pub question_id: String,
    pub generation: u64,
    pub active_generation: Arc<AtomicU64>,
}

/// What one streaming turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnTranscript {
    /// Newline-separated incremental transcript lines
    pub text: String,
    /// Upload identifier, announced at most once per session
    pub upload_id: Option<String>,
}

/// Opens one duplex connection per question turn.
#[async_trait::async_trait]
pub trait TranscriberConnector: Send + Sync {
    async fn connect(&self, ctx: TurnContext) -> Result<Box<dyn TranscriberTurn>>;
}

/// A live per-turn streaming connection.
///
/// Send failures are absorbed: audio keeps being captured locally for the
/// fallback upload even when the stream dies mid-turn.
#[async_trait::async_trait]
pub trait TranscriberTurn: Send {
    async fn send_frame(&mut self, pcm: Vec<u8>);

    /// Signal end-of-turn, flush in-flight frames for a bounded grace
    /// period, close the connection, and return the accumulated result.
    async fn finish(self: Box<Self>) -> TurnTranscript;
}

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// WebSocket transcriber client.
pub struct WsTranscriberConnector {
    ws_base: String,
    token: String,
    grace: Duration,
}

impl WsTranscriberConnector {
    pub fn new(ws_base: String, token: String) -> Self {
        Self {
            ws_base,
            token,
            grace: Duration::from_millis(300),
        }
    }
}

#[async_trait::async_trait]
impl TranscriberConnector for WsTranscriberConnector {
    async fn connect(&self, ctx: TurnContext) -> Result<Box<dyn TranscriberTurn>> {
        let url = format!(
            "{}/ws/transcribe?email={}&question_id={}&token={}",
            self.ws_base, ctx.email, ctx.question_id, self.token
        );

        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| Error::Streaming(e.to_string()))?;

        info!(
            "Transcriber connected for question {} (generation {})",
            ctx.question_id, ctx.generation
        );

        let (sink, mut stream) = ws.split();

        let transcript = Arc::new(Mutex::new(String::new()));
        let upload_id = Arc::new(Mutex::new(None::<String>));

        let transcript_task = Arc::clone(&transcript);
        let upload_task = Arc::clone(&upload_id);

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Transcriber stream error: {}", e);
                        break;
                    }
                };

                // Ignore anything that arrives for a superseded turn.
                if ctx.active_generation.load(Ordering::SeqCst) != ctx.generation {
                    continue;
                }

                match parse_server_message(&text) {
                    Some(ServerMessage::UploadId(id)) => {
                        info!("Received upload id: {}", id);
                        let mut upload = upload_task.lock().await;
                        if upload.is_none() {
                            *upload = Some(id);
                        }
                    }
                    Some(ServerMessage::Transcript(line)) => {
                        let mut acc = transcript_task.lock().await;
                        acc.push_str(&line);
                        acc.push('\n');
                    }
                    None => {
                        warn!("Ignoring malformed transcriber message");
                    }
                }
            }
        });

        Ok(Box::new(WsTurn {
            sink: Some(sink),
            reader: Some(reader),
            transcript,
            upload_id,
            grace: self.grace,
        }))
    }
}

struct WsTurn {
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    transcript: Arc<Mutex<String>>,
    upload_id: Arc<Mutex<Option<String>>>,
    grace: Duration,
}

#[async_trait::async_trait]
impl TranscriberTurn for WsTurn {
    async fn send_frame(&mut self, pcm: Vec<u8>) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        if let Err(e) = sink.send(Message::Binary(pcm)).await {
            // One warning, then stop trying; local capture carries the turn.
            warn!("Transcriber send failed, streaming disabled for turn: {}", e);
            self.sink = None;
        }
    }

    async fn finish(mut self: Box<Self>) -> TurnTranscript {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.send(Message::Binary(END_OF_TURN.to_vec())).await {
                warn!("Failed to send end-of-turn sentinel: {}", e);
            }

            // Bounded grace period for in-flight frames to flush server-side.
            tokio::time::sleep(self.grace).await;

            if let Err(e) = sink.send(Message::Close(None)).await {
                warn!("Failed to close transcriber connection: {}", e);
            }
        }

        if let Some(mut reader) = self.reader.take() {
            match tokio::time::timeout(Duration::from_secs(2), &mut reader).await {
                Ok(Err(e)) => error!("Transcriber reader task panicked: {}", e),
                Err(_) => {
                    warn!("Transcriber reader did not finish in time");
                    reader.abort();
                }
                Ok(Ok(())) => {}
            }
        }

        TurnTranscript {
            text: self.transcript.lock().await.clone(),
            upload_id: self.upload_id.lock().await.clone(),
        }
    }
}
