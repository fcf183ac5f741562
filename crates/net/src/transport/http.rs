//! HTTP(S) transfer with `Range` resume

use async_trait::async_trait;
use futures::StreamExt;
use pkgcore_errors::{Error, NetworkError};
use reqwest::StatusCode;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{FetchRequest, Transport};
use crate::client::NetClient;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: NetClient,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<u64, Error> {
        let offset = request.offset();
        let response = self
            .client
            .get_from(&request.url, request.resume_offset)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                message: status.to_string(),
            }
            .into());
        }

        // Servers that ignore Range answer 200 with the whole body
        let append = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let start = if append { offset } else { 0 };
        if offset > 0 && !append {
            tracing::debug!(url = %request.url, "server ignored range request, restarting");
        }

        if let Some(len) = response.content_length() {
            if start + len > request.expected_size {
                return Err(NetworkError::FileSizeExceeded {
                    size: start + len,
                    limit: request.expected_size,
                }
                .into());
            }
        }

        let mut file = open_dest(&request.dest, append).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
            written += chunk.len() as u64;
            if start + written > request.expected_size {
                return Err(NetworkError::FileSizeExceeded {
                    size: start + written,
                    limit: request.expected_size,
                }
                .into());
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, &request.dest))?;
        }

        file.flush()
            .await
            .map_err(|e| Error::io_with_path(&e, &request.dest))?;
        Ok(written)
    }
}

async fn open_dest(dest: &Path, append: bool) -> Result<File, Error> {
    let mut options = OpenOptions::new();
    if append {
        options.create(true).append(true);
    } else {
        options.create(true).write(true).truncate(true);
    }
    options
        .open(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))
}
