use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::engine::{DiskImageStore, MemLaptopStore, MemRatingStore};
use crate::pb::LaptopServiceServer;
use crate::server::LaptopService;
use crate::{Error, ImageStore, LaptopStore, RatingStore, Result};

/// Hosts a [`LaptopService`] on a TCP endpoint.
///
/// Dropping a started server without calling [`stop`](Self::stop) still
/// triggers a graceful shutdown, but nothing waits for it to finish.
pub struct LaptopServer {
    config: ServerConfig,
    service: LaptopService,
    running: Option<Running>,
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    calls: CancellationToken,
    handle: JoinHandle<std::result::Result<(), tonic::transport::Error>>,
}

impl LaptopServer {
    pub fn new(
        config: ServerConfig,
        laptop_store: Arc<dyn LaptopStore>,
        image_store: Arc<dyn ImageStore>,
        rating_store: Arc<dyn RatingStore>,
    ) -> Self {
        let service = LaptopService::new(laptop_store, image_store, rating_store)
            .with_max_image_bytes(config.max_image_bytes);
        Self {
            config,
            service,
            running: None,
        }
    }

    /// Builds a server backed by the default stores. The image directory must exist.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let laptop_store = Arc::new(MemLaptopStore::with_search_delay(config.search_per_entry_delay));
        let image_store = Arc::new(DiskImageStore::with_max_size(&config.image_dir, config.max_image_bytes)?);
        let rating_store = Arc::new(MemRatingStore::new());
        Ok(Self::new(config, laptop_store, image_store, rating_store))
    }

    /// Address the server is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Binds the configured endpoint and starts serving in the background.
    ///
    /// Returns once the listener is bound, with the actual address (useful when
    /// the endpoint asks for port 0).
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Err(Error::Internal(format!("server already listening on {}", running.addr)));
        }

        let listener = TcpListener::bind(&self.config.endpoint).await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let calls = CancellationToken::new();
        let service = self.service.clone().with_shutdown_token(calls.clone());

        let router = tonic::transport::Server::builder()
            .concurrency_limit_per_connection(self.config.concurrency_limit)
            .add_service(LaptopServiceServer::new(service));
        let handle = tokio::spawn(router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = signal.await;
        }));

        info!("pcbook server listening on {}", addr);
        self.running = Some(Running {
            addr,
            shutdown,
            calls,
            handle,
        });
        Ok(addr)
    }

    /// Stops accepting calls and waits for in-flight calls to drain.
    ///
    /// Calls still running after the configured grace period are cancelled and
    /// given one more grace period to wind down before the server task is
    /// aborted.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        info!("shutting down server on {}", running.addr);

        let _ = running.shutdown.send(());
        let grace = self.config.shutdown_grace;
        let mut handle = running.handle;
        let joined = match tokio::time::timeout(grace, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("in-flight calls still running after {:?}, cancelling them", grace);
                running.calls.cancel();
                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("server did not wind down after cancellation, aborting");
                        handle.abort();
                        return Ok(());
                    }
                }
            }
        };
        joined.map_err(|e| Error::Internal(format!("server task failed: {}", e)))??;

        info!("server stopped");
        Ok(())
    }
}
