//! taskhub account API library.
#![deny(warnings, clippy::all, clippy::pedantic)]
#![warn(missing_docs)]

/// Bearer-token extraction and session authentication.
pub mod middleware;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
