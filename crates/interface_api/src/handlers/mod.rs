//! Request handlers

pub mod claims;
pub mod dashboard;
pub mod data;
pub mod health;
