//! CLI subcommand modules.
//!
//! This module contains the implementations for all granary CLI subcommands.

pub(crate) mod compare;
pub(crate) mod components;
pub(crate) mod score;
pub(crate) mod validate;
