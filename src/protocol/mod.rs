//! Protocol definitions for Lutron integration telegrams.
//!
//! This module contains the low-level protocol pieces:
//! - Telegram encoding/decoding
//! - Line splitting of the inbound byte stream

pub mod line;
pub mod telegram;

pub use line::{LineDecoder, MAX_LINE_LEN};
pub use telegram::{
    ACTION_LEVEL, OutputId, Telegram, TelegramKind, decode, encode_output, encode_query,
};
