//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories, ledgers and views into use-case level APIs.
//! - Keep hosts (CLI, RPC adapters) decoupled from storage details.

pub mod conference_service;
