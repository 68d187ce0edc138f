//! End-to-end settlement tests.
//!
//! Each test drives a [`Keeper`](cu_settlement::Keeper) through a month of
//! relay payments and the month-end timer against a
//! [`MemoryGateway`](cu_settlement::MemoryGateway), then checks balances,
//! stored state and emitted records.

mod harness;
mod scenario_tests;

pub use harness::{TestHarness, CHAIN, MODULE_FUNDS, P1, P2, SUB};
