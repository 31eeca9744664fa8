//! Bundle archive inspection and bundle id formatting.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ConductError, ConductResult};

/// Name of the descriptor every bundle carries.
pub const BUNDLE_CONF: &str = "bundle.conf";

/// Length of each part of a shortened bundle id.
const SHORT_ID_LEN: usize = 7;

/// Contents of the first entry named `file_name` (at any depth), if any.
///
/// Fails with `MalformedBundle` when the file is not a readable zip.
pub async fn zip_entry(path: &Path, file_name: &str) -> ConductResult<Option<String>> {
    let owned_path = path.to_path_buf();
    let owned_name = file_name.to_string();
    tokio::task::spawn_blocking(move || read_entry(&owned_path, &owned_name))
        .await
        .map_err(|e| malformed(path, format!("archive reader failed: {}", e)))?
}

/// `bundle.conf` of a bundle or configuration archive.
pub async fn bundle_conf(path: &Path) -> ConductResult<String> {
    zip_entry(path, BUNDLE_CONF)
        .await?
        .ok_or_else(|| malformed(path, "unable to find bundle.conf within the bundle file"))
}

fn read_entry(path: &Path, file_name: &str) -> ConductResult<Option<String>> {
    let file = File::open(path).map_err(|e| malformed(path, e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| malformed(path, e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| malformed(path, e.to_string()))?;
        let matches = entry.is_file()
            && entry.name().rsplit('/').next() == Some(file_name);
        if !matches {
            continue;
        }

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| malformed(path, format!("unreadable {}: {}", file_name, e)))?;
        return Ok(Some(content));
    }

    Ok(None)
}

fn malformed(path: &Path, reason: impl Into<String>) -> ConductError {
    ConductError::MalformedBundle {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Shortened bundle id for display: each `-`-separated part is cut to
/// seven characters.
///
/// ```
/// use conduct_core::bundle::short_id;
///
/// assert_eq!(
///     short_id("45e0c477d3e5ea92aa8d85c0d8f3e25c-c52e3f8d0c58d8aa29ae5e3d774c0e54"),
///     "45e0c47-c52e3f8"
/// );
/// ```
pub fn short_id(bundle_id: &str) -> String {
    bundle_id
        .split('-')
        .map(|part| part.chars().take(SHORT_ID_LEN).collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_zip(dir: &TempDir, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.path().join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (entry, content) in entries {
            writer.start_file(*entry, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[tokio::test]
    async fn test_bundle_conf_nested() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            &dir,
            "visualizer.zip",
            &[
                ("visualizer-1.1/lib/app.jar", "jar"),
                ("visualizer-1.1/bundle.conf", "name = \"visualizer\""),
            ],
        );

        let conf = bundle_conf(&path).await.unwrap();
        assert_eq!(conf, "name = \"visualizer\"");
    }

    #[tokio::test]
    async fn test_bundle_conf_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, "empty.zip", &[("readme.txt", "hi")]);

        let err = bundle_conf(&path).await.unwrap_err();
        assert!(matches!(err, ConductError::MalformedBundle { .. }));
        assert_eq!(zip_entry(&path, BUNDLE_CONF).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bundle.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let err = bundle_conf(&path).await.unwrap_err();
        assert!(matches!(err, ConductError::MalformedBundle { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_similar_names_not_matched() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, "b.zip", &[("x/my-bundle.conf", "nope")]);
        assert_eq!(zip_entry(&path, BUNDLE_CONF).await.unwrap(), None);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("45e0c477d3e5ea92aa8d85c0d8f3e25c"), "45e0c47");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("abcdefghij-xyz"), "abcdefg-xyz");
    }
}
