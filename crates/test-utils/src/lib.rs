//! Shared test utilities for Keystone options crates.
//!
//! This crate provides proptest strategies over the option-string
//! grammar so property tests across crates generate the same shapes of
//! input: keys, scalar tokens, raw string values needing escaping, and
//! arbitrarily nested option strings.

#![deny(unsafe_code)]

pub mod strategies;

pub use strategies::{decorate, render_option_string, OptionValue};
