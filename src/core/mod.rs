pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod frame_decoder;
pub mod keyring;
pub mod message;
pub mod session;
pub mod state;
