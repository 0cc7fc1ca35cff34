//! Streaming chat call: sends one user message and forwards the assistant's
//! reply payload by payload.
//!
//! A call is checked for a credential before any network I/O, then issues
//! `POST {base}/chat/messages`, feeds the response body through a
//! [`FrameDecoder`] and reports to a [`StreamHandler`]. Every call ends with
//! exactly one of `on_complete`, `on_error` or `on_cancelled`.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::client::error_message;
use crate::api::SendMessageRequest;
use crate::core::frame_decoder::{FrameDecoder, FrameError};
use crate::core::session::Session;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

pub const STREAM_ENDPOINT: &str = "chat/messages";
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

#[derive(Debug, Clone)]
pub enum StreamError {
    /// No bearer token in the session; nothing was sent.
    MissingCredential,
    Http {
        status: u16,
        message: String,
    },
    Network(String),
    Timeout(Duration),
    /// A single frame could not be decoded. Not fatal to the call.
    Decode(FrameError),
    Cancelled,
}

impl StreamError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    pub fn is_user_visible(&self) -> bool {
        !self.is_cancellation()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::MissingCredential => {
                write!(f, "No access token available, run `streamchat auth` first")
            }
            StreamError::Http { status, message } => write!(f, "{status} {message}"),
            StreamError::Network(detail) => write!(f, "Network error: {detail}"),
            StreamError::Timeout(limit) => {
                write!(f, "Stream timed out after {}s", limit.as_secs_f32())
            }
            StreamError::Decode(err) => write!(f, "Could not decode stream frame: {err}"),
            StreamError::Cancelled => write!(f, "Stream cancelled"),
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StreamError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

/// Receives the results of one streaming call.
pub trait StreamHandler {
    fn on_message(&mut self, payload: String);

    fn on_frame_error(&mut self, error: StreamError) {
        warn!(error = %error, "Skipping undecodable stream frame");
    }

    fn on_complete(&mut self);

    fn on_error(&mut self, error: StreamError);

    fn on_cancelled(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed,
    Cancelled,
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub chat_id: String,
    pub content: String,
    pub cancel_token: CancellationToken,
    pub timeout: Option<Duration>,
    pub stream_id: u64,
}

pub struct StreamCall {
    client: reqwest::Client,
    url: String,
    token: String,
    body: SendMessageRequest,
    cancel_token: CancellationToken,
    timeout: Option<Duration>,
    stream_id: u64,
}

impl StreamCall {
    pub fn new(params: StreamParams, session: &Session) -> Result<Self, StreamError> {
        let token = session
            .token()
            .ok_or(StreamError::MissingCredential)?
            .to_string();

        let StreamParams {
            client,
            base_url,
            chat_id,
            content,
            cancel_token,
            timeout,
            stream_id,
        } = params;

        Ok(Self {
            client,
            url: construct_api_url(&base_url, STREAM_ENDPOINT),
            token,
            body: SendMessageRequest::user(chat_id, content),
            cancel_token,
            timeout,
            stream_id,
        })
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub async fn run<H>(self, handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        // A limit too far out to represent is the same as none.
        let deadline = self
            .timeout
            .and_then(|limit| Instant::now().checked_add(limit));
        let limit = self.timeout.unwrap_or_default();

        let result = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(StreamError::Cancelled),
            _ = wait_for_deadline(deadline) => Err(StreamError::Timeout(limit)),
            result = self.execute(handler) => result,
        };

        match result {
            Ok(()) => {
                debug!(stream_id = self.stream_id, "Stream completed");
                handler.on_complete();
                StreamOutcome::Completed
            }
            Err(StreamError::Cancelled) => {
                debug!(stream_id = self.stream_id, "Stream cancelled");
                handler.on_cancelled();
                StreamOutcome::Cancelled
            }
            Err(err) => {
                warn!(stream_id = self.stream_id, error = %err, "Stream failed");
                handler.on_error(err);
                StreamOutcome::Failed
            }
        }
    }

    async fn execute<H>(&self, handler: &mut H) -> Result<(), StreamError>
    where
        H: StreamHandler + ?Sized,
    {
        debug!(stream_id = self.stream_id, url = %self.url, "Opening chat stream");

        let request = self
            .client
            .post(&self.url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(&self.body);
        let request = add_auth_headers(request, &self.token);

        let response = request
            .send()
            .await
            .map_err(|err| StreamError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are small; read them whole rather than as a stream.
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<serde_json::Value>(body.trim()).ok();
            return Err(StreamError::Http {
                status: status.as_u16(),
                message: error_message(parsed.as_ref()),
            });
        }

        drive_body(response.bytes_stream(), &self.cancel_token, handler).await
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn drive_body<S, B, E, H>(
    body: S,
    cancel_token: &CancellationToken,
    handler: &mut H,
) -> Result<(), StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    H: StreamHandler + ?Sized,
{
    let payloads = payload_stream(body);
    let mut payloads = std::pin::pin!(payloads);

    while let Some(item) = payloads.next().await {
        if cancel_token.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        match item {
            Ok(payload) => handler.on_message(payload),
            Err(err @ StreamError::Decode(_)) => handler.on_frame_error(err),
            Err(err) => return Err(err),
        }
    }
    // The handler may have cancelled while the last payload was delivered.
    if cancel_token.is_cancelled() {
        return Err(StreamError::Cancelled);
    }
    Ok(())
}

struct PayloadState<S> {
    body: Pin<Box<S>>,
    decoder: FrameDecoder,
    pending: VecDeque<Result<String, StreamError>>,
    finished: bool,
}

/// Turns a body of byte chunks into the ordered stream of data payloads.
///
/// The stream ends after the sentinel or after the body ends and the last
/// partial frame has been flushed. A transport error is yielded once, after
/// any payloads already decoded, and ends the stream.
pub fn payload_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String, StreamError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let state = PayloadState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.feed(chunk.as_ref());
                    state
                        .pending
                        .extend(frames.into_iter().map(|frame| frame.map_err(StreamError::Decode)));
                    state.finished = state.decoder.is_terminated();
                }
                Some(Err(err)) => {
                    state
                        .pending
                        .push_back(Err(StreamError::Network(err.to_string())));
                    state.finished = true;
                }
                None => {
                    let frames = state.decoder.finalize();
                    state
                        .pending
                        .extend(frames.into_iter().map(|frame| frame.map_err(StreamError::Decode)));
                    state.finished = true;
                }
            }
        }
    })
}

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    FrameError(StreamError),
    Error(StreamError),
    End,
    Cancelled,
}

impl StreamMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamMessage::Error(_) | StreamMessage::End | StreamMessage::Cancelled
        )
    }

    /// Replays a message received over the channel into a handler.
    pub fn deliver<H>(self, handler: &mut H)
    where
        H: StreamHandler + ?Sized,
    {
        match self {
            StreamMessage::Chunk(payload) => handler.on_message(payload),
            StreamMessage::FrameError(err) => handler.on_frame_error(err),
            StreamMessage::Error(err) => handler.on_error(err),
            StreamMessage::End => handler.on_complete(),
            StreamMessage::Cancelled => handler.on_cancelled(),
        }
    }
}

struct ChannelHandler {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
}

impl ChannelHandler {
    fn send(&self, message: StreamMessage) {
        let _ = self.tx.send((message, self.stream_id));
    }
}

impl StreamHandler for ChannelHandler {
    fn on_message(&mut self, payload: String) {
        self.send(StreamMessage::Chunk(payload));
    }

    fn on_frame_error(&mut self, error: StreamError) {
        self.send(StreamMessage::FrameError(error));
    }

    fn on_complete(&mut self) {
        self.send(StreamMessage::End);
    }

    fn on_error(&mut self, error: StreamError) {
        self.send(StreamMessage::Error(error));
    }

    fn on_cancelled(&mut self) {
        self.send(StreamMessage::Cancelled);
    }
}

/// Runs streaming calls on background tasks and reports over one channel,
/// tagging every message with the call's stream id.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(
        &self,
        params: StreamParams,
        session: &Session,
    ) -> Result<JoinHandle<StreamOutcome>, StreamError> {
        let call = StreamCall::new(params, session)?;
        let mut handler = ChannelHandler {
            tx: self.tx.clone(),
            stream_id: call.stream_id(),
        };
        Ok(tokio::spawn(async move { call.run(&mut handler).await }))
    }
}
