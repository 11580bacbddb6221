//! Infrastructure implementations for the traverse workflow engine.
//!
//! This crate provides the concrete adapters behind the ports defined in
//! `traverse-core`:
//! - `script` -- JEXL-backed `ExpressionEngine` for conditions, templates,
//!   and state-mutating scripts
//! - `checkpoint` -- in-memory and filesystem `CheckpointStore`s
//! - `logger` -- append-only filesystem `ActivityLogger`
//! - `activity` -- built-in activities (http, shell, file, sleep, json,
//!   random, print, child workflows)

pub mod activity;
pub mod checkpoint;
pub mod logger;
pub mod script;

pub use checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
pub use logger::FileActivityLogger;
pub use script::JexlEngine;
