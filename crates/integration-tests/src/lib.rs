//! # Integration Tests
//!
//! End-to-end swap scenarios: one hub session and a set of trader
//! sessions wired over an in-memory packet network, with a shared mock
//! chain per currency. These verify the full choreography (advert,
//! accept, hold, init, both deposits, both redeems, finish) plus the
//! failure paths: timeouts, bad deposits, double accepts and mid-flight
//! cancellation.

pub mod swap_net;

#[cfg(test)]
mod scenarios;
