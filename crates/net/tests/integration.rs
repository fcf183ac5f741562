//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use pkgcore_errors::{Error, NetworkError};
    use pkgcore_net::*;
    use std::path::Path;
    use tempfile::tempdir;
    use url::Url;

    fn transport() -> RepoTransport {
        let config = NetConfig {
            retry_count: 0,
            ..NetConfig::default()
        };
        RepoTransport::from_config(config).unwrap()
    }

    fn request(url: String, dest: &Path, resume_offset: Option<u64>, size: u64) -> FetchRequest {
        FetchRequest {
            url,
            remote_path: "foo-1.2.pkg".to_string(),
            dest: dest.to_path_buf(),
            resume_offset,
            expected_size: size,
        }
    }

    #[tokio::test]
    async fn test_full_http_fetch() {
        let server = MockServer::start_async().await;
        let content = b"test file content";
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/foo-1.2.pkg").matches(|req| {
                    !req.headers
                        .iter()
                        .flatten()
                        .any(|(name, _)| name.eq_ignore_ascii_case("range"))
                });
                then.status(200).body(content);
            })
            .await;

        let temp = tempdir().unwrap();
        let dest = temp.path().join("foo.pkg");
        let written = transport()
            .fetch(&request(
                server.url("/foo-1.2.pkg"),
                &dest,
                None,
                content.len() as u64,
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, content.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_partial_content_is_appended() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/foo-1.2.pkg")
                    .header("range", "bytes=6-");
                then.status(206).body("world");
            })
            .await;

        let temp = tempdir().unwrap();
        let dest = temp.path().join("foo.pkg");
        tokio::fs::write(&dest, b"hello ").await.unwrap();

        let written = transport()
            .fetch(&request(server.url("/foo-1.2.pkg"), &dest, Some(6), 11))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 5);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_range_ignored_rewrites_file() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/foo-1.2.pkg")
                    .header_exists("range");
                then.status(200).body("hello world");
            })
            .await;

        let temp = tempdir().unwrap();
        let dest = temp.path().join("foo.pkg");
        tokio::fs::write(&dest, b"HELLO ").await.unwrap();

        let written = transport()
            .fetch(&request(server.url("/foo-1.2.pkg"), &dest, Some(6), 11))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 11);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.pkg");
                then.status(404).body("Not Found");
            })
            .await;

        let temp = tempdir().unwrap();
        let dest = temp.path().join("missing.pkg");
        let error = transport()
            .fetch(&request(server.url("/missing.pkg"), &dest, None, 10))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Network(NetworkError::HttpError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.pkg");
                then.status(200).body("0123456789");
            })
            .await;

        let temp = tempdir().unwrap();
        let dest = temp.path().join("big.pkg");
        let error = transport()
            .fetch(&request(server.url("/big.pkg"), &dest, None, 3))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Network(NetworkError::FileSizeExceeded { limit: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_file_url_resume() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("repo").join("foo-1.2.pkg");
        tokio::fs::create_dir_all(source.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&source, b"hello world").await.unwrap();

        let dest = temp.path().join("out.pkg");
        tokio::fs::write(&dest, b"hello").await.unwrap();

        let url = Url::from_file_path(&source).unwrap().to_string();
        let written = transport()
            .fetch(&request(url, &dest, Some(5), 11))
            .await
            .unwrap();

        assert_eq!(written, 6);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("foo.pkg");
        let error = transport()
            .fetch(&request(
                "ftp://example.com/foo-1.2.pkg".to_string(),
                &dest,
                None,
                1,
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Network(NetworkError::UnsupportedProtocol { ref protocol }) if protocol == "ftp"
        ));
    }
}
