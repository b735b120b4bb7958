//! Integration tests for the portfolio gateway
//! These drive the real reqwest transport against local mock servers

pub mod test_harness;

mod gateway_http_test;
mod session_flow_test;
mod token_store_test;
