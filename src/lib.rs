//! Local-first mail reconciliation.
//!
//! Merges the remote mailbox listing, the user's archived copies and search
//! results into the one list a mail client shows. The merge itself lives in
//! [`reconcile`]; [`app::Controller`] keeps its inputs current.

pub mod actor;
pub mod app;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod mail;
pub mod provider;
pub mod reconcile;
pub mod search;
