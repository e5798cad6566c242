//! pcbook is a laptop catalog served over gRPC.
//!
//! The service keeps three stores: laptops (in memory, unique by UUID), uploaded
//! images (one file per image on disk) and user ratings (in memory, one running
//! `(count, sum)` per laptop). Searches stream their results and honour the
//! caller's deadline or cancellation between every scanned entry.
//!
//! ## Core Components
//! - [`engine`]: The store implementations.
//! - [`server`]: The gRPC service and the server host.
//! - [`sdk`]: A typed client and a random sample generator.
//! - [`pb`]: Wire types and the generated service stubs.

pub mod config;
pub mod engine;
pub mod pb;
pub mod sdk;
pub mod serializer;
pub mod server;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pb::{Filter, Laptop};

/// Errors returned by the pcbook stores, service and client.
#[derive(Error, Debug)]
pub enum Error {
    /// A laptop ID that is not a well-formed UUID.
    #[error("Invalid UUID string: {0}")]
    InvalidUuid(String),
    /// The request is malformed.
    #[error("{0}")]
    InvalidArgument(String),
    /// An uploaded image went over the configured size limit.
    #[error("image too large: {size} > {max}")]
    ImageTooLarge { size: usize, max: usize },
    /// The referenced laptop does not exist.
    #[error("laptop ID {0} doesn't exist")]
    LaptopNotFound(String),
    /// A laptop with the same ID is already stored.
    #[error("laptop ID already exists")]
    AlreadyExists,
    /// The caller cancelled the request.
    #[error("request is cancelled")]
    Cancelled,
    /// The caller's deadline passed.
    #[error("deadline is exceeded")]
    DeadlineExceeded,
    /// Reading the next message of a request stream failed.
    #[error("cannot receive stream request: {}", .0.message())]
    Receive(tonic::Status),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// An I/O error occurred while writing an image or a data file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A protobuf payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    /// A protobuf payload could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] prost::EncodeError),
    /// The gRPC transport failed to bind, serve or connect.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    /// A remote call returned a non-OK status.
    #[error("rpc failed: {}", .0.message())]
    Rpc(#[from] tonic::Status),
}

/// A specialized Result type for pcbook operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        use tonic::Status;

        match err {
            Error::InvalidUuid(_) | Error::InvalidArgument(_) | Error::ImageTooLarge { .. } => {
                Status::invalid_argument(err.to_string())
            }
            Error::LaptopNotFound(_) => Status::not_found(err.to_string()),
            Error::AlreadyExists => Status::already_exists(err.to_string()),
            Error::Cancelled => Status::cancelled(err.to_string()),
            Error::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
            Error::Receive(_) => Status::unknown(err.to_string()),
            Error::Rpc(status) => status,
            Error::Internal(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Decode(_)
            | Error::Encode(_)
            | Error::Transport(_) => {
                log::error!("internal failure: {}", err);
                Status::internal("internal server error")
            }
        }
    }
}

/// A user rating accumulated for one laptop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rating {
    pub count: u32,
    pub sum: f64,
}

impl Rating {
    /// Mean score, or `None` before the first rating.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Stores laptop records keyed by their UUID.
///
/// Implementations hand out clones: nothing a caller does with a saved or found
/// laptop affects the stored record.
pub trait LaptopStore: Send + Sync {
    /// Saves a copy of the laptop. Fails with [`Error::AlreadyExists`] if the ID is taken.
    fn save(&self, laptop: &Laptop) -> Result<()>;

    /// Returns a copy of the laptop with the given ID.
    fn find(&self, id: &str) -> Option<Laptop>;

    /// Scans every stored laptop and passes the ones matching `filter` to `emit`.
    ///
    /// The token is checked before each entry is emitted; once it fires the scan
    /// stops with [`Error::Cancelled`]. An error from `emit` stops the scan and is
    /// returned as is.
    fn search(
        &self,
        token: &CancellationToken,
        filter: &Filter,
        emit: &mut dyn FnMut(Laptop) -> Result<()>,
    ) -> Result<()>;
}

/// Persists uploaded laptop images.
pub trait ImageStore: Send + Sync {
    /// Concatenates `chunks` into one image and stores it under a fresh image ID,
    /// which is returned.
    fn save(&self, laptop_id: &str, image_type: &str, chunks: &mut dyn Iterator<Item = Vec<u8>>) -> Result<String>;
}

/// Accumulates laptop ratings.
pub trait RatingStore: Send + Sync {
    /// Adds a score and returns the rating as it stands right after this update.
    fn add(&self, laptop_id: &str, score: f64) -> Result<Rating>;
}
