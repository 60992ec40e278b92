//! API handlers

pub mod extract;
pub mod frontend;
pub mod health;
