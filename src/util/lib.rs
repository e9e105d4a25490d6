#[macro_use]
extern crate tracing;

pub mod background;
pub mod config;
pub mod error;
pub mod time;
