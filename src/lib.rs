#![allow(clippy::arithmetic_side_effects)]
#![warn(missing_docs)]
#![no_std]

//! Interest-accrual and solvency validation engine for a UTXO-based lending
//! protocol on Liquid-style asset networks.
//!
//! Reserve and debt records are immutable snapshots: every operation consumes
//! one version of the state and, if all invariants hold, produces exactly one
//! successor. All rates, indices and fractions are fixed-point values scaled
//! by RAY = 10^27.

pub mod error;
pub mod math;
pub mod oracle;
pub mod processor;
pub mod state;
pub mod transition;

extern crate alloc;
