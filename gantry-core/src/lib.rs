//! Gantry Core
//!
//! Core types and abstractions shared across the Gantry job system.
//!
//! This crate contains:
//! - Domain types: the Job entity, its status state machine, and the
//!   typed per-kind input/result payloads
//! - DTOs: data transfer objects for the orchestrator API

pub mod domain;
pub mod dto;
