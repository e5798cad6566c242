//! Per-call cancellation.
//!
//! Every RPC gets a [`CallContext`] whose token fires when the caller's
//! `grpc-timeout` deadline passes or, for streamed responses, when the caller
//! drops the response stream. Handlers and stores poll the token; nothing is
//! interrupted forcibly.

use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::metadata::MetadataMap;

use crate::{Error, Result};

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    finished: CancellationToken,
}

impl CallContext {
    /// Creates a context that cancels itself once `timeout` has elapsed.
    ///
    /// Must be called from within a tokio runtime when a non-zero timeout is given.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_parent(&CancellationToken::new(), timeout)
    }

    /// Like [`new`](Self::new), but the context is also cancelled with `parent`.
    pub fn with_parent(parent: &CancellationToken, timeout: Option<Duration>) -> Self {
        let token = parent.child_token();
        let finished = CancellationToken::new();
        let deadline = timeout.map(|t| Instant::now() + t);

        match timeout {
            Some(t) if t.is_zero() => token.cancel(),
            Some(t) => {
                let token = token.clone();
                let finished = finished.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(t) => {
                            debug!("call deadline of {:?} reached", t);
                            token.cancel();
                        }
                        _ = token.cancelled() => {}
                        _ = finished.cancelled() => {}
                    }
                });
            }
            None => {}
        }

        Self {
            token,
            deadline,
            finished,
        }
    }

    /// Builds a context from the `grpc-timeout` header of an incoming call.
    pub fn from_metadata(parent: &CancellationToken, metadata: &MetadataMap) -> Self {
        let timeout = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);
        Self::with_parent(parent, timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The error describing why this call stopped: the deadline if it has
    /// passed, a plain cancellation otherwise.
    pub fn error(&self) -> Error {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Error::DeadlineExceeded,
            _ => Error::Cancelled,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(self.error());
        }
        Ok(())
    }

    /// Cancels this call when the receiving half of `tx` is dropped.
    ///
    /// The watch ends when the returned guard is dropped, releasing its clone of
    /// the sender so the response stream can complete.
    pub fn cancel_on_close<T: Send + 'static>(&self, tx: &mpsc::Sender<T>) -> DropGuard {
        let tx = tx.clone();
        let token = self.token.clone();
        let released = CancellationToken::new();
        let guard = released.clone().drop_guard();

        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("response stream closed by the client");
                    token.cancel();
                }
                _ = token.cancelled() => {}
                _ = released.cancelled() => {}
            }
        });

        guard
    }
}

impl Drop for CallContext {
    fn drop(&mut self) {
        self.finished.cancel();
    }
}

/// Parses a `grpc-timeout` header value: up to eight ASCII digits followed by
/// one of the units `H`, `M`, `S`, `m`, `u` or `n`.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("5000000u"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("0n"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_grpc_timeout_rejects_garbage() {
        assert_eq!(parse_grpc_timeout(""), None);
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
        assert_eq!(parse_grpc_timeout("1é"), None);
    }

    #[tokio::test]
    async fn test_no_timeout_never_fires() {
        let ctx = CallContext::new(None);
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline.is_none());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_already_expired() {
        let ctx = CallContext::new(Some(Duration::ZERO));
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_deadline_fires() {
        let ctx = CallContext::new(Some(Duration::from_millis(20)));
        assert!(!ctx.is_cancelled());
        tokio::time::timeout(Duration::from_secs(2), ctx.cancelled()).await.unwrap();
        assert!(matches!(ctx.error(), Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_explicit_cancel_is_not_a_deadline() {
        let ctx = CallContext::new(Some(Duration::from_secs(60)));
        ctx.token().cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_call() {
        let parent = CancellationToken::new();
        let ctx = CallContext::with_parent(&parent, Some(Duration::from_secs(60)));
        assert!(!ctx.is_cancelled());

        parent.cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_call_cancel_leaves_parent_alone() {
        let parent = CancellationToken::new();
        let first = CallContext::with_parent(&parent, None);
        let second = CallContext::with_parent(&parent, None);

        first.token().cancel();
        assert!(!parent.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let ctx = CallContext::new(None);
        let (tx, rx) = mpsc::channel::<u32>(1);
        let _guard = ctx.cancel_on_close(&tx);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), ctx.cancelled()).await.unwrap();
    }

    #[tokio::test]
    async fn test_released_watch_lets_stream_end() {
        let ctx = CallContext::new(None);
        let (tx, mut rx) = mpsc::channel::<u32>(1);
        let guard = ctx.cancel_on_close(&tx);

        tx.send(1).await.unwrap();
        drop(tx);
        drop(guard);

        assert_eq!(rx.recv().await, Some(1));
        let end = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(end, None);
        assert!(!ctx.is_cancelled());
    }
}
