//! Diagnostics built on top of the driver's receive stream.
pub mod traffic_analyzer;
