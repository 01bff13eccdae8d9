//! Integration test crate for CarScan.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the full pipeline stack to verify the pieces work
//! together.

#[cfg(test)]
mod cache;

#[cfg(test)]
mod pipeline;
