//! Non-interactive "say" command

use std::error::Error;
use std::io::{self, Write};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::CliContext;
use crate::core::chat_stream::{ChatStreamService, StreamError, StreamHandler, StreamParams};
use crate::core::conversation::TranscriptSink;
use crate::core::message::Message;

/// Prints a streamed reply while it is recorded in the transcript.
struct SayOutput<'a> {
    sink: TranscriptSink<'a>,
    reply: String,
    error: Option<StreamError>,
}

impl StreamHandler for SayOutput<'_> {
    fn on_message(&mut self, payload: String) {
        print!("{payload}");
        let _ = io::stdout().flush();
        self.reply.push_str(&payload);
        self.sink.on_message(payload);
    }

    fn on_frame_error(&mut self, error: StreamError) {
        self.sink.on_frame_error(error);
    }

    fn on_complete(&mut self) {
        println!();
        self.sink.on_complete();
    }

    fn on_error(&mut self, error: StreamError) {
        if !self.reply.is_empty() {
            println!();
        }
        self.error = Some(error.clone());
        self.sink.on_error(error);
    }

    fn on_cancelled(&mut self) {
        if !self.reply.is_empty() {
            println!();
        }
        self.error = Some(StreamError::Cancelled);
        self.sink.on_cancelled();
    }
}

pub async fn run_say(
    ctx: &mut CliContext,
    chat_id: &str,
    prompt: &str,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err("Usage: streamchat say <chat-id> <prompt>".into());
    }

    ctx.store.ensure_chat(chat_id);
    ctx.store.begin_send(chat_id, prompt)?;
    ctx.logging.log_message(&Message::user(prompt))?;

    let cancel_token = CancellationToken::new();
    let params = StreamParams {
        client: ctx.client.stream_http().clone(),
        base_url: ctx.client.base_url().to_string(),
        chat_id: chat_id.to_string(),
        content: prompt.to_string(),
        cancel_token: cancel_token.clone(),
        timeout: ctx.stream_timeout,
        stream_id: 1,
    };

    let (stream_service, mut rx) = ChatStreamService::new();
    let handle = match stream_service.spawn_stream(params, &ctx.session) {
        Ok(handle) => handle,
        Err(err) => {
            ctx.store.fail_send(chat_id, &err);
            return Err(err.into());
        }
    };
    drop(stream_service);

    let mut output = SayOutput {
        sink: ctx.store.sink(chat_id),
        reply: String::new(),
        error: None,
    };

    let mut interrupted = false;
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some((message, _)) = received else {
                    break;
                };
                let terminal = message.is_terminal();
                message.deliver(&mut output);
                if terminal {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                debug!(chat_id, "Interrupted; cancelling reply");
                interrupted = true;
                cancel_token.cancel();
            }
        }
    }

    let outcome = handle.await?;
    debug!(chat_id, ?outcome, "Stream finished");

    let SayOutput { reply, error, .. } = output;
    if !reply.is_empty() {
        ctx.logging.log_message(&Message::assistant(reply))?;
    }

    match error {
        Some(err) if err.is_user_visible() => {
            ctx.logging
                .log_message(&Message::app_error(err.to_string()))?;
            Err(err.into())
        }
        _ => Ok(()),
    }
}
