//! Deterministic simulation harness for session tests.
//!
//! Pairs a [`palaver_client::Session`] with a scripted in-memory gateway and
//! a virtual clock, so reconnect deadlines and echo windows can be tested
//! without sockets or real time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod gateway;

pub use driver::SimDriver;
pub use gateway::{SimGateway, message_frame};
pub use palaver_client::env::test_utils::MockEnv;
