//! Voxtask Gateway - Voice commands for tasks and personal finance
//!
//! This library provides the core functionality for the voxtask gateway:
//! - Speech capture with confidence gating and automatic restart
//! - Rule-based intent and entity extraction
//! - A sequential command queue with retries
//! - Dispatch of intents to task and financial storage
//! - Spoken feedback and an HTTP API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Client                           │
//! │   Recognizer  │  Capture  │  Extractor  │  Speaker   │
//! └────────────────────┬────────────────────────────────┘
//!                      │  command queue (one at a time)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Voxtask Gateway                      │
//! │   API  │  Dispatcher  │  Dedup  │  Feedback          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    SQLite                            │
//! │   Users  │  Tasks  │  Financial records  │  Log      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod command;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod queue;
pub mod session;
pub mod voice;

pub use client::HttpCommandExecutor;
pub use command::{CommandExtractor, Intent, RecognizedCommand};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use dispatch::{DispatchOutcome, Dispatcher, DomainMutationResult};
pub use error::{Error, Result};
pub use queue::{CommandQueue, QueueHandle};
pub use session::VoiceSession;
