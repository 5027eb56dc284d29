use crate::application::ports::backend::RealtimeStream;
use crate::domain::entities::{RealtimeEvent, Record};
use crate::domain::value_objects::{AuthToken, RealtimeAction, SubscriptionTopic};
use crate::shared::error::AppError;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const CONNECT_EVENT: &str = "PB_CONNECT";

#[derive(Debug, Error)]
pub enum SseError {
    #[error("realtime stream is not valid UTF-8")]
    InvalidUtf8,
    #[error("realtime stream closed before {0}")]
    Closed(&'static str),
    #[error("realtime transport error: {0}")]
    Transport(String),
    #[error("malformed realtime payload: {0}")]
    Payload(String),
}

impl From<SseError> for AppError {
    fn from(err: SseError) -> Self {
        match err {
            SseError::Transport(msg) => AppError::Network(msg),
            other => AppError::Realtime(other.to_string()),
        }
    }
}

/// server-sent events の 1 イベント
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// チャンク境界をまたぐ SSE ストリームをイベント単位に切り出す
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseError> {
        self.buffer.extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self
            .buffer
            .windows(2)
            .position(|window| window == b"\n\n")
        {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = std::str::from_utf8(&block[..end]).map_err(|_| SseError::InvalidUtf8)?;
            if let Some(event) = parse_block(text) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event.event = value.to_string(),
            "data" => data_lines.push(value),
            "id" => event.id = Some(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    event.data = data_lines.join("\n");
    if event.event.is_empty() {
        event.event = "message".to_string();
    }
    Some(event)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectPayload {
    client_id: String,
}

#[derive(Deserialize)]
struct MessagePayload {
    action: String,
    record: Record,
}

/// トピック宛てのメッセージを `RealtimeEvent` に変換する
pub fn decode_message(topic: &SubscriptionTopic, data: &str) -> Result<RealtimeEvent, SseError> {
    let payload: MessagePayload =
        serde_json::from_str(data).map_err(|err| SseError::Payload(err.to_string()))?;
    let action = payload
        .action
        .parse::<RealtimeAction>()
        .map_err(SseError::Payload)?;
    Ok(RealtimeEvent::new(
        action,
        payload.record,
        topic.collection().clone(),
    ))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

struct SseReader {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<SseEvent>,
}

impl SseReader {
    fn new(response: reqwest::Response) -> Self {
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()));
        Self {
            bytes: Box::pin(bytes),
            decoder: SseDecoder::new(),
            pending: Default::default(),
        }
    }

    async fn next_event(&mut self) -> Result<Option<SseEvent>, SseError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.push(&chunk)?),
                Some(Err(err)) => return Err(SseError::Transport(err.to_string())),
                None => return Ok(None),
            }
        }
    }
}

/// SSE 接続を張り、トピックを登録して購読ストリームを返す
pub(crate) async fn open_subscription(
    http: &reqwest::Client,
    base_url: &str,
    token: Option<AuthToken>,
    topic: SubscriptionTopic,
    buffer: usize,
) -> Result<RealtimeStream, AppError> {
    let url = format!("{base_url}/api/realtime");
    let response = http
        .get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(AppError::from_status(
            response.status().as_u16(),
            "Failed to open realtime connection.",
        ));
    }

    let mut reader = SseReader::new(response);
    let client_id = loop {
        match reader.next_event().await? {
            Some(event) if event.event == CONNECT_EVENT => {
                let payload: ConnectPayload = serde_json::from_str(&event.data)
                    .map_err(|err| SseError::Payload(err.to_string()))?;
                break payload.client_id;
            }
            Some(_) => continue,
            None => return Err(SseError::Closed("connect").into()),
        }
    };
    debug!(client_id = %client_id, "realtime connected");

    let topic_name = topic.as_topic();
    let mut register = http
        .post(&url)
        .json(&json!({ "clientId": client_id, "subscriptions": [topic_name] }));
    if let Some(token) = token.as_ref() {
        register = register.bearer_auth(token.as_str());
    }
    let register_response = register.send().await?;
    if !register_response.status().is_success() {
        return Err(AppError::from_status(
            register_response.status().as_u16(),
            format!("Failed to subscribe to {topic_name}."),
        ));
    }
    info!(topic = %topic_name, "realtime subscribed");

    let (tx, rx) = mpsc::channel(buffer.max(1));
    let task_topic = topic.clone();
    let handle = tokio::spawn(async move {
        let topic_name = task_topic.as_topic();
        loop {
            match reader.next_event().await {
                Ok(Some(event)) if event.event == topic_name => {
                    match decode_message(&task_topic, &event.data) {
                        Ok(message) => {
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(topic = %topic_name, error = %err, "skipping realtime message"),
                    }
                }
                Ok(Some(_)) => continue,
                Ok(None) => {
                    info!(topic = %topic_name, "realtime connection closed by server");
                    break;
                }
                Err(err) => {
                    warn!(topic = %topic_name, error = %err, "realtime connection failed");
                    break;
                }
            }
        }
    });

    let abort = handle.abort_handle();
    Ok(RealtimeStream::new(topic, rx, move || abort.abort()))
}
