//! CLI subcommands

pub mod keygen;
pub mod serve;
