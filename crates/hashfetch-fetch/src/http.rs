use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use crate::error::Result;

/// A boxed stream of response body chunks.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Asynchronous HTTP client abstraction.
///
/// Implementations follow redirects themselves and map non-success statuses
/// to [`Error::Status`](crate::Error::Status) before any body bytes are
/// yielded.
pub trait HttpClient: Send + Sync {
    fn stream(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes>>>> + Send;
}

impl<C: HttpClient> HttpClient for std::sync::Arc<C> {
    fn stream(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes>>>> + Send {
        (**self).stream(url)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use futures_util::StreamExt;

    use super::*;
    use crate::error::Error;

    /// Production HTTP client backed by `reqwest`.
    #[derive(Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Self { Self::default() }

        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
    }

    impl HttpClient for ReqwestClient {
        async fn stream(&self, url: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Status {
                    url:    url.to_string(),
                    status: status.as_u16(),
                });
            }

            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| Error::Network(e.to_string())));
            Ok(Box::pin(stream))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
