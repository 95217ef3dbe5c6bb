//! rcss-agent - Soccer simulation client core
//!
//! Parses the server's s-expression protocol, keeps a decaying belief about
//! where everything is, localizes from landmark distances and drives a
//! fixed-rate decide/act loop against a pluggable policy.

pub mod core;
pub mod policy;
pub mod protocol;
pub mod scheduler;
pub mod spatial;
pub mod transport;
pub mod world;
