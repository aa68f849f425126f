//! airlift CLI library.

pub mod commands;
pub mod plan;
