//! Core domain types for the taskhub marketplace backend.
#![deny(warnings, clippy::all, clippy::pedantic)]
#![warn(missing_docs)]

pub mod identity;
pub mod types;
