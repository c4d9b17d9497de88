//! End-to-end tests: orchestrator, store, analysis and dashboard wired
//! together with deterministic in-memory fakes for the network and the
//! alert channel.

mod fakes;
mod simulation;
