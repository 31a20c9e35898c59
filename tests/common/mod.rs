#![allow(dead_code)]

pub mod fixtures;
pub mod wiremock_helpers;

/// Multi-threaded runtime for driving mock servers from synchronous tests.
///
/// The library's HTTP client is blocking, so tests stay plain `#[test]`
/// functions and only enter the runtime to start and inspect mocks.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("failed to build test runtime")
}
