//! Request orchestration for an AI image studio
//!
//! Turns a prompt, optionally paired with a source image, into a call to a
//! generative image service. Each flow (generate, edit) runs through its own
//! state machine, and the result can be exported to disk.

pub mod ai;
pub mod app;
pub mod codec;
pub mod error;
pub mod export;
pub mod mime;
pub mod models;
pub mod orchestrator;

pub use error::{Error, ErrorKind, Result};
