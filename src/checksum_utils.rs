/*
 * Provides utility functions for calculating checksums of files.
 * Currently, it supports SHA256 checksum calculation. This module is used to
 * detect file content changes efficiently, so cached token counts are only
 * reused while the content they were computed from is still current.
 */
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/*
 * Calculates the SHA256 checksum of a file and returns it as a hex-encoded
 * string.
 *
 * Reads the file in chunks to handle potentially large files efficiently. If
 * any I/O error occurs during file reading or if the path does not point to a
 * file, an `io::Error` is returned.
 */
pub fn calculate_sha256_checksum(file_path: &Path) -> io::Result<String> {
    log::trace!(
        "ChecksumUtils: Calculating SHA256 checksum for: {:?}",
        file_path
    );
    if !file_path.is_file() {
        let err_msg = format!(
            "Path {:?} is not a file, cannot calculate checksum.",
            file_path
        );
        log::warn!("ChecksumUtils: {}", err_msg);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, err_msg));
    }

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0; 1024 * 4]; // 4KB buffer

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let hash_bytes = hasher.finalize();
    Ok(format!("{:x}", hash_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_calculate_sha256_checksum_known_content() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.as_file_mut().write_all(b"hello world").unwrap();

        let checksum = calculate_sha256_checksum(temp_file.path()).unwrap();
        assert_eq!(
            checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_calculate_sha256_checksum_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let checksum = calculate_sha256_checksum(temp_file.path()).unwrap();
        // SHA256 of zero bytes.
        assert_eq!(
            checksum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_sha256_checksum_changes_with_content() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.as_file_mut().write_all(b"first").unwrap();
        let before = calculate_sha256_checksum(temp_file.path()).unwrap();

        temp_file.as_file_mut().write_all(b" second").unwrap();
        temp_file.as_file_mut().flush().unwrap();
        let after = calculate_sha256_checksum(temp_file.path()).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_calculate_sha256_checksum_non_existing_file() {
        let path = Path::new("this_file_should_not_exist_for_checksum_test.txt");
        assert!(!path.exists());

        let err = calculate_sha256_checksum(path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_calculate_sha256_checksum_for_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = calculate_sha256_checksum(temp_dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
