pub mod attributes;
pub mod capabilities;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod media;
pub mod orientation;
pub mod state;
