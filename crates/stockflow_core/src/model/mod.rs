//! Inventory domain model.
//!
//! # Responsibility
//! - Define master records that own stock (materials, product variations).
//! - Define movement requests, their validation, and persisted movements.
//!
//! # Invariants
//! - Stock never goes below zero through model arithmetic.
//! - A movement line targets exactly one material or one product variation.

pub mod material;
pub mod movement;
