//! Command handlers

pub mod class;
pub mod config;
pub mod content;
