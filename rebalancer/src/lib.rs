//! whackrock-rebalancer: signal-driven weight rebalancing for a WhackRock fund.
//!
//! Reads fractional target weights from a signal document, falls back to the
//! last processed signal (or equal weights) when there is nothing new,
//! normalizes them to basis points, decides whether the fund has drifted or
//! its target changed, and submits the new weights through a fund gateway
//! with pre-submit checks and an audit trail.

pub mod announce;
pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod fund;
pub mod mock;
pub mod risk;
pub mod signal;
pub mod store;
