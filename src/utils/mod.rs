//! Shared helpers for input validation and normalization.

pub mod validation;
