//! Skipper Library
//!
//! Core modules for the Skipper deployment engine.

pub mod adapters;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod context;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod pipeline;
pub mod progress;
pub mod readiness;
pub mod secrets;
pub mod storage;
pub mod values;
