//! taskmail — multi-protocol mail-retrieval gateway for the task board.
//!
//! Fetches the most recent mailbox messages over IMAP, falls back to POP3,
//! and degrades to a fixed placeholder set when both live paths fail.
//! Outbound notifications go through a thin SMTP submission client.

pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod imap;
pub mod message;
pub mod net;
pub mod pop3;
pub mod probe;
pub mod smtp;
