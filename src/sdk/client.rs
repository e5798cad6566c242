use std::path::Path;
use std::time::Duration;

use log::info;
use tonic::transport::Channel;
use tonic::Request;

use crate::pb::{
    CreateLaptopRequest, Filter, Laptop, LaptopServiceClient, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, UploadImageRequest, UploadImageResponse,
};
use crate::{Error, Result};

/// Deadline attached to every call unless overridden with [`Client::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const CHUNK_SIZE: usize = 1024;

/// A typed client for a remote `pcbook.LaptopService`.
///
/// Cloning is cheap; clones share the underlying channel.
#[derive(Clone)]
pub struct Client {
    inner: LaptopServiceClient<Channel>,
    timeout: Duration,
}

impl Client {
    /// Connects to `addr`, given either as `host:port` or as a full `http://` URI.
    pub async fn connect(addr: &str) -> Result<Self> {
        let endpoint = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let inner = LaptopServiceClient::connect(endpoint).await?;
        Ok(Self {
            inner,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.timeout);
        request
    }

    /// Stores a laptop and returns its ID (minted by the server if `laptop.id` is empty).
    pub async fn create_laptop(&self, laptop: Laptop) -> Result<String> {
        let mut client = self.inner.clone();
        let request = self.request(CreateLaptopRequest { laptop: Some(laptop) });
        let id = client.create_laptop(request).await?.into_inner().id;

        info!("laptop created with ID: {}", id);
        Ok(id)
    }

    /// Collects every laptop matching the filter.
    pub async fn search_laptop(&self, filter: Filter) -> Result<Vec<Laptop>> {
        info!("search started");
        let mut client = self.inner.clone();
        let request = self.request(SearchLaptopRequest { filter: Some(filter) });
        let mut stream = client.search_laptop(request).await?.into_inner();

        let mut found = Vec::new();
        while let Some(response) = stream.message().await? {
            if let Some(laptop) = response.laptop {
                info!("- found {}", laptop.id);
                found.push(laptop);
            }
        }

        info!("search completed");
        Ok(found)
    }

    /// Uploads the image at `path` for a laptop. The image type is the file extension.
    pub async fn upload_image(&self, laptop_id: &str, path: impl AsRef<Path>) -> Result<UploadImageResponse> {
        let path = path.as_ref();
        let image_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .ok_or_else(|| Error::InvalidArgument(format!("{:?} has no file extension", path)))?;
        let data = tokio::fs::read(path).await?;

        let mut messages = vec![UploadImageRequest::info(laptop_id, image_type)];
        messages.extend(data.chunks(CHUNK_SIZE).map(UploadImageRequest::chunk));
        info!("uploading {} bytes in {} chunks", data.len(), messages.len() - 1);

        let mut client = self.inner.clone();
        let request = self.request(tokio_stream::iter(messages));
        let response = client.upload_image(request).await?.into_inner();

        info!("image uploaded with ID: {}, size: {}", response.id, response.size);
        Ok(response)
    }

    /// Sends `(laptop_id, score)` pairs over one stream and returns the replies in order.
    pub async fn rate_laptop(&self, ratings: Vec<(String, f64)>) -> Result<Vec<RateLaptopResponse>> {
        let requests: Vec<RateLaptopRequest> = ratings
            .into_iter()
            .map(|(laptop_id, score)| RateLaptopRequest { laptop_id, score })
            .collect();

        let mut client = self.inner.clone();
        let request = self.request(tokio_stream::iter(requests));
        let mut stream = client.rate_laptop(request).await?.into_inner();

        let mut responses = Vec::new();
        while let Some(response) = stream.message().await? {
            info!(
                "received response: laptop {} rated {} times, average score {:.2}",
                response.laptop_id, response.rated_count, response.average_score
            );
            responses.push(response);
        }
        Ok(responses)
    }
}
