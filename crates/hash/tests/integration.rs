//! Integration tests for hash crate

#[cfg(test)]
mod tests {
    use pkgcore_hash::*;
    use tempfile::tempdir;
    use tokio::fs;

    #[tokio::test]
    async fn test_validate_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("foo-1.2.pkg");

        let data = b"verify this content";
        fs::write(&file_path, data).await.unwrap();

        let expected = Checksum::of_bytes(ChecksumAlgorithm::Sha256, data);
        let validator = FileValidator;
        assert_eq!(
            validator.validate_file(&file_path, &expected).await.unwrap(),
            Validation::Match
        );

        let wrong = Checksum::of_bytes(ChecksumAlgorithm::Sha256, b"different content");
        assert!(matches!(
            validator.validate_file(&file_path, &wrong).await.unwrap(),
            Validation::Mismatch { actual } if actual == expected
        ));
    }

    #[tokio::test]
    async fn test_validate_missing_file_is_distinguished() {
        let dir = tempdir().unwrap();
        let expected = Checksum::parse("sha256:abc123").unwrap();
        let outcome = FileValidator
            .validate_file(&dir.path().join("gone.pkg"), &expected)
            .await
            .unwrap();
        assert_eq!(outcome, Validation::NotFound);
    }

    #[tokio::test]
    async fn test_validate_uses_expected_algorithm() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bar.pkg");
        fs::write(&file_path, b"blake3 content").await.unwrap();

        let expected = Checksum::of_bytes(ChecksumAlgorithm::Blake3, b"blake3 content");
        assert_eq!(
            FileValidator
                .validate_file(&file_path, &expected)
                .await
                .unwrap(),
            Validation::Match
        );
    }
}
