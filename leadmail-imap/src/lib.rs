//! Reply detection over IMAP.
//!
//! [`ImapReplyDetector`] logs into the operator's mailbox and searches the
//! inbox for mail from each address a campaign wrote to. Only the handful of
//! IMAP4rev1 commands that needs (LOGIN, SELECT, SEARCH, LOGOUT) is spoken.

mod client;
mod detector;
mod error;

pub use client::{ImapClient, TaggedResponse};
pub use detector::{ImapConfig, ImapReplyDetector, ReplyDetector};
pub use error::ImapError;
