//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, stock adjustment and atomic recording of
//!   movements.
//! - Keep callers decoupled from storage details.

pub mod movement_service;
pub mod stock_adjuster;
