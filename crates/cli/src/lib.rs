//! fontflat CLI library.

pub mod cli;
