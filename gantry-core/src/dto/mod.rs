//! Data Transfer Objects for the orchestrator API
//!
//! Lightweight request/response shapes shared by the HTTP surface, the
//! client crate, and the CLI.

pub mod job;
