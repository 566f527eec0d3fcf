//! Size-bounded streaming HTTP downloads.
//!
//! [`Downloader`] writes a response body straight to a staging path while
//! counting bytes. Once the running total passes the configured ceiling the
//! body stream is dropped, the partial file is removed and
//! [`Error::SizeExceeded`] is returned, so hostile or unbounded responses
//! never reach hash verification.
//!
//! The transport is abstracted behind [`HttpClient`]; [`ReqwestClient`] is the
//! production implementation.

mod downloader;
mod error;
mod http;

pub use downloader::{DownloadOptions, Downloader, MAX_DOWNLOAD_SIZE};
pub use error::{Error, Result};
pub use http::{BoxStream, HttpClient};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
