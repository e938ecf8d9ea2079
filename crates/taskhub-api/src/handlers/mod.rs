//! HTTP handlers for the account endpoints.

pub mod accounts;
pub mod auth;
