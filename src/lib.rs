//! Ranking DNS resolver endpoints by measured query latency.
//!
//! This crate takes an ordered list of resolver descriptors, probes every
//! endpoint with the same fixed address lookup over a number of rounds,
//! and ranks the endpoints by the mean latency of their successful
//! probes.
//!
//! The pieces fit together as follows: [registry] loads and validates the
//! endpoint list, [probe] performs one bounded-time query attempt against
//! one endpoint, [round] fans the probes out concurrently and collects
//! per-endpoint totals, and [report] sorts the totals and renders the
//! final table. The actual DNS exchange happens through the client
//! transports of the [domain] crate.
#![warn(missing_docs)]

pub mod descriptor;
pub mod logging;
pub mod probe;
pub mod registry;
pub mod report;
pub mod round;
