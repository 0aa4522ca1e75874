//! leadmail: personalised cold email campaigns over your own SMTP relay.
//!
//! This crate ties the workspace together for the `leadmail` binary:
//! [`config`] loads `leadmail.config.ron`, [`app`] wires a
//! [`Campaign`](leadmail_campaign::Campaign) from it, [`replies`] syncs reply
//! status from the inbox and [`render`] formats everything for the terminal.

pub mod app;
pub mod config;
pub mod render;
pub mod replies;

pub use config::{ComposerConfig, Config, StoreConfig, find_config_file};
pub use replies::{SyncError, SyncReport, sync_replies};
