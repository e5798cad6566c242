use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status, Streaming};
use uuid::Uuid;

use crate::engine::image_store::DEFAULT_MAX_IMAGE_BYTES;
use crate::pb::laptop_service_server;
use crate::pb::upload_image_request::Data;
use crate::pb::{
    CreateLaptopRequest, CreateLaptopResponse, ImageInfo, Laptop, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, SearchLaptopResponse, UploadImageRequest, UploadImageResponse,
};
use crate::server::context::CallContext;
use crate::{Error, ImageStore, LaptopStore, RatingStore, Result};

/// Responses buffered per streaming call before the sender waits on the client.
const STREAM_BUFFER: usize = 16;

/// The `pcbook.LaptopService` implementation.
///
/// Validates requests, mints laptop IDs and turns store results into gRPC
/// replies. It is the only component that looks at deadlines; the laptop store
/// receives the call's cancellation token explicitly.
#[derive(Clone)]
pub struct LaptopService {
    laptop_store: Arc<dyn LaptopStore>,
    image_store: Arc<dyn ImageStore>,
    rating_store: Arc<dyn RatingStore>,
    max_image_bytes: usize,
    calls: CancellationToken,
}

impl LaptopService {
    pub fn new(
        laptop_store: Arc<dyn LaptopStore>,
        image_store: Arc<dyn ImageStore>,
        rating_store: Arc<dyn RatingStore>,
    ) -> Self {
        Self {
            laptop_store,
            image_store,
            rating_store,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            calls: CancellationToken::new(),
        }
    }

    /// Parents every call's cancellation on `token`: cancelling it stops all
    /// in-flight calls at their next check.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.calls = token;
        self
    }

    fn context(&self, metadata: &MetadataMap) -> CallContext {
        CallContext::from_metadata(&self.calls, metadata)
    }

    /// Overrides the largest image `UploadImage` accepts.
    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    fn create(&self, ctx: &CallContext, mut laptop: Laptop) -> Result<String> {
        info!("got a create-laptop request with ID: {}", laptop.id);

        let id = if laptop.id.is_empty() {
            Uuid::new_v4()
        } else {
            parse_laptop_id(&laptop.id)?
        };

        if let Err(e) = ctx.check() {
            info!("create-laptop request stopped: {}", e);
            return Err(e);
        }

        laptop.id = id.to_string();
        self.laptop_store.save(&laptop)?;

        info!("saved laptop with ID: {}", laptop.id);
        Ok(laptop.id)
    }

    async fn upload(&self, ctx: &CallContext, stream: &mut Streaming<UploadImageRequest>) -> Result<UploadImageResponse> {
        let info = match next_message(ctx, stream).await? {
            Some(UploadImageRequest { data: Some(Data::Info(info)) }) => info,
            Some(_) => return Err(Error::InvalidArgument("first message must carry the image info".to_string())),
            None => return Err(Error::InvalidArgument("missing image info".to_string())),
        };
        info!(
            "receive an upload-image request for laptop {} with image type {}",
            info.laptop_id, info.image_type
        );

        validate_image_type(&info.image_type)?;
        if self.laptop_store.find(&info.laptop_id).is_none() {
            return Err(Error::LaptopNotFound(info.laptop_id));
        }

        let mut chunks = Vec::new();
        let mut size = 0usize;
        while let Some(request) = next_message(ctx, stream).await? {
            match request.data {
                Some(Data::ChunkData(chunk)) => {
                    size += chunk.len();
                    if size > self.max_image_bytes {
                        return Err(Error::ImageTooLarge {
                            size,
                            max: self.max_image_bytes,
                        });
                    }
                    debug!("received a chunk with size: {}", chunk.len());
                    chunks.push(chunk);
                }
                Some(Data::Info(_)) => {
                    return Err(Error::InvalidArgument("image info may only be sent once".to_string()));
                }
                None => {}
            }
        }

        let size = u32::try_from(size).map_err(|_| Error::Internal(format!("image size {} overflows u32", size)))?;
        let ImageInfo { laptop_id, image_type } = info;
        let store = self.image_store.clone();
        let image_id = tokio::task::spawn_blocking(move || store.save(&laptop_id, &image_type, &mut chunks.into_iter()))
            .await
            .map_err(|e| Error::Internal(format!("image save task failed: {}", e)))??;

        info!("saved image with ID: {}, size: {}", image_id, size);
        Ok(UploadImageResponse { id: image_id, size })
    }
}

#[async_trait]
impl laptop_service_server::LaptopService for LaptopService {
    async fn create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> std::result::Result<Response<CreateLaptopResponse>, Status> {
        let ctx = self.context(request.metadata());
        let laptop = request.into_inner().laptop.unwrap_or_default();

        let id = self.create(&ctx, laptop)?;
        Ok(Response::new(CreateLaptopResponse { id }))
    }

    type SearchLaptopStream = ReceiverStream<std::result::Result<SearchLaptopResponse, Status>>;

    async fn search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> std::result::Result<Response<Self::SearchLaptopStream>, Status> {
        let ctx = self.context(request.metadata());
        let filter = request.into_inner().filter.unwrap_or_default();
        info!("receive a search-laptop request with filter: {:?}", filter);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let watch = ctx.cancel_on_close(&tx);
        let store = self.laptop_store.clone();

        tokio::task::spawn_blocking(move || {
            let _watch = watch;
            let res = store.search(ctx.token(), &filter, &mut |laptop| {
                let id = laptop.id.clone();
                tx.blocking_send(Ok(SearchLaptopResponse { laptop: Some(laptop) }))
                    .map_err(|_| Error::Cancelled)?;
                info!("sent laptop with ID: {}", id);
                Ok(())
            });

            match res {
                Ok(()) => info!("search completed"),
                Err(Error::Cancelled) => info!("search stopped early: {}", ctx.error()),
                Err(e) => {
                    error!("search failed: {}", e);
                    let _ = tx.blocking_send(Err(e.into()));
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> std::result::Result<Response<UploadImageResponse>, Status> {
        let ctx = self.context(request.metadata());
        let mut stream = request.into_inner();

        match self.upload(&ctx, &mut stream).await {
            Ok(response) => Ok(Response::new(response)),
            Err(e) => {
                warn!("upload-image request failed: {}", e);
                Err(e.into())
            }
        }
    }

    type RateLaptopStream = ReceiverStream<std::result::Result<RateLaptopResponse, Status>>;

    async fn rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> std::result::Result<Response<Self::RateLaptopStream>, Status> {
        let ctx = self.context(request.metadata());
        let mut stream = request.into_inner();

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let laptop_store = self.laptop_store.clone();
        let rating_store = self.rating_store.clone();

        tokio::spawn(async move {
            let _watch = ctx.cancel_on_close(&tx);
            match rate(&ctx, &mut stream, &*laptop_store, &*rating_store, &tx).await {
                Ok(()) => info!("no more data"),
                Err(e) => {
                    warn!("rate-laptop request failed: {}", e);
                    let _ = tx.send(Err(e.into())).await;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Answers each rating request in arrival order until the client half-closes.
async fn rate(
    ctx: &CallContext,
    stream: &mut Streaming<RateLaptopRequest>,
    laptop_store: &dyn LaptopStore,
    rating_store: &dyn RatingStore,
    tx: &mpsc::Sender<std::result::Result<RateLaptopResponse, Status>>,
) -> Result<()> {
    while let Some(request) = next_message(ctx, stream).await? {
        let RateLaptopRequest { laptop_id, score } = request;
        info!("received a rate-laptop request: id = {}, score = {:.2}", laptop_id, score);

        if laptop_id.is_empty() {
            return Err(Error::InvalidArgument("laptop ID must not be empty".to_string()));
        }
        if laptop_store.find(&laptop_id).is_none() {
            return Err(Error::LaptopNotFound(laptop_id));
        }

        let rating = rating_store.add(&laptop_id, score)?;
        let response = RateLaptopResponse {
            laptop_id,
            rated_count: rating.count,
            average_score: rating.sum / rating.count as f64,
        };
        tx.send(Ok(response)).await.map_err(|_| Error::Cancelled)?;
    }
    Ok(())
}

/// Waits for the next request message, giving up as soon as the call is cancelled.
async fn next_message<T>(ctx: &CallContext, stream: &mut Streaming<T>) -> Result<Option<T>> {
    if ctx.is_cancelled() {
        return Err(ctx.error());
    }
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ctx.error()),
        message = stream.message() => message.map_err(Error::Receive),
    }
}

/// Accepts only the 36-character hyphenated form; braced, URN and simple
/// spellings are rejected like any other malformed ID.
fn parse_laptop_id(id: &str) -> Result<Uuid> {
    let invalid = || Error::InvalidUuid(id.to_string());
    let uuid = Uuid::parse_str(id).map_err(|_| invalid())?;
    if id.len() != 36 || !uuid.hyphenated().to_string().eq_ignore_ascii_case(id) {
        return Err(invalid());
    }
    Ok(uuid)
}

/// Image types are file extensions: a leading dot and no path separators.
fn validate_image_type(image_type: &str) -> Result<()> {
    let valid = image_type.len() > 1
        && image_type.starts_with('.')
        && !image_type.contains(['/', '\\'])
        && image_type != "..";
    if !valid {
        return Err(Error::InvalidArgument(format!("invalid image type {:?}", image_type)));
    }
    Ok(())
}
