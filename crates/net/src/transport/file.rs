//! Local `file:` repository transfer

use async_trait::async_trait;
use pkgcore_errors::{Error, NetworkError};
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::{FetchRequest, Transport};
use crate::parse_url;

/// Copies from a `file:` URL, used when mirroring a local repository
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    fn source_path(url: &str) -> Result<PathBuf, Error> {
        parse_url(url)?
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(format!("{url} is not a local path")).into())
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<u64, Error> {
        let source = Self::source_path(&request.url)?;
        let size = fs::metadata(&source)
            .await
            .map_err(|e| Error::io_with_path(&e, &source))?
            .len();
        if size > request.expected_size {
            return Err(NetworkError::FileSizeExceeded {
                size,
                limit: request.expected_size,
            }
            .into());
        }

        let offset = request.offset().min(size);
        let mut reader = fs::File::open(&source)
            .await
            .map_err(|e| Error::io_with_path(&e, &source))?;
        let mut writer = if offset > 0 {
            reader.seek(SeekFrom::Start(offset)).await?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&request.dest)
                .await
        } else {
            fs::File::create(&request.dest).await
        }
        .map_err(|e| Error::io_with_path(&e, &request.dest))?;

        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| Error::io_with_path(&e, &request.dest))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::io_with_path(&e, &request.dest))?;
        Ok(copied)
    }
}
