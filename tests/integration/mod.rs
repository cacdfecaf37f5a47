//! Integration tests

pub mod config_test;
pub mod http_transport_test;
pub mod realtime_test;
