//! Chat runtime: prompt building, the model/tool step loop, UI stream
//! framing, resumable streams and per-user allowances.

pub mod entitlements;
pub mod hints;
pub mod prompts;
pub mod resumable;
pub mod title;
pub mod turn;
pub mod ui_stream;

pub use turn::{start_chat_turn, ChatTurnInput};
