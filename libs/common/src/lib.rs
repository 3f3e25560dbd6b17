//! Common library for the budget planner services
//!
//! This crate provides shared functionality used across the identity and
//! budget services: database connectivity, error handling, and the signed
//! token scheme both services verify against the shared secret.

pub mod database;
pub mod error;
pub mod token;
