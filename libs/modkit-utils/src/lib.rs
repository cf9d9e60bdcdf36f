//! Small helpers shared across the runtime crates that don't warrant their
//! own crate.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[cfg(feature = "humantime-serde")]
pub mod humantime_serde;
