/// Software Development Kit (SDK) for pcbook.
///
/// This module provides a typed gRPC client and a generator of random sample
/// laptops.
pub mod client;
/// Random laptop records.
pub mod sample;

pub use client::Client;
