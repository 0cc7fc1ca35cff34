//! streamchat is a terminal client for a REST chat backend that streams
//! assistant replies as server-sent events.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the frame decoder, streaming orchestration, session and
//!   credential handling, the conversation store, and persisted config/state.
//! - [`api`] defines the backend's payloads and the request/response client
//!   that unwraps its JSON envelope.
//! - [`cli`] parses arguments and runs the non-interactive commands.
//! - [`utils`] holds URL validation, auth headers, and transcript logging.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
