/// gRPC server for the laptop catalog.
///
/// This module provides the [`LaptopService`] handler, the per-call
/// [`CallContext`] it uses for cancellation, and the [`LaptopServer`] host that
/// binds the service to an endpoint.
pub mod context;
pub mod host;
pub mod service;

pub use context::CallContext;
pub use host::LaptopServer;
pub use service::LaptopService;
