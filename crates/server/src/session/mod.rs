// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session log observability: decode, filter, extract, aggregate, serve.
//!
//! A session log is an append-only JSONL file written by the agent. The
//! reader tails it incrementally; the registry owns one reader per active
//! workspace and exposes snapshot queries to the transports.

pub mod discover;
pub mod extract;
pub mod filter;
pub mod history;
pub mod model;
pub mod reader;
pub mod registry;
pub mod stats;
pub mod watch;

pub use discover::WorkspaceScanner;
pub use filter::MessageFilter;
pub use model::{MessageKind, SessionMessage};
pub use reader::SessionReader;
pub use registry::SessionRegistry;
pub use stats::SessionStats;
