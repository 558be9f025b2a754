//! Subflow - Automated Subtitle Production Pipeline
//!
//! Watches a folder for freshly recorded audio files and drives three
//! external tools in sequence (speech-to-subtitle transcription, format
//! conversion, translation), resuming partially finished jobs from a
//! persisted per-job record and re-running downstream steps when the
//! intermediate subtitle is edited by hand.

pub mod cli;
pub mod config;
pub mod error;
pub mod hashing;
pub mod metadata;
pub mod queue;
pub mod stability;
pub mod steps;
pub mod tools;
pub mod watcher;
pub mod workflow;
