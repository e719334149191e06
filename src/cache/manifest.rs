//! Manifest written next to every cache artifact.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::key::CacheKey;
use crate::error::{MailclassError, Result};

/// Current manifest layout.
pub const MANIFEST_VERSION: u32 = 2;

/// Describes what a cache artifact holds and how to verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Layout version.
    pub version: u32,
    /// Key the artifact was stored under.
    pub key: CacheKey,
    /// Examples a reader should find in the data file.
    pub rows: usize,
    /// CRC32 of the data file.
    pub data_checksum: u32,
    /// CRC32 of the label-name file.
    pub info_checksum: u32,
    /// CRC32 of the vocabulary file, for artifacts that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_checksum: Option<u32>,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
}

impl CacheManifest {
    /// Describe freshly written files.
    pub fn new(
        key: CacheKey,
        rows: usize,
        data_path: &Path,
        info_path: &Path,
        vocabulary_path: Option<&Path>,
    ) -> Result<Self> {
        Ok(CacheManifest {
            version: MANIFEST_VERSION,
            key,
            rows,
            data_checksum: checksum_file(data_path)?,
            info_checksum: checksum_file(info_path)?,
            vocabulary_checksum: vocabulary_path.map(checksum_file).transpose()?,
            created_at: Utc::now(),
        })
    }

    /// Write as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a manifest.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            MailclassError::cache_format(format!("{}: invalid manifest: {e}", path.display()))
        })
    }

    /// Check that this manifest describes `key` and that the files on disk
    /// still match it.
    pub fn verify(
        &self,
        key: &CacheKey,
        data_path: &Path,
        info_path: &Path,
        vocabulary_path: Option<&Path>,
    ) -> Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(MailclassError::cache_format(format!(
                "manifest version {} is not supported (expected {MANIFEST_VERSION})",
                self.version
            )));
        }
        if &self.key != key {
            return Err(MailclassError::cache_format(format!(
                "manifest belongs to '{}', not '{key}'",
                self.key
            )));
        }
        let mut files = vec![(data_path, self.data_checksum), (info_path, self.info_checksum)];
        match (vocabulary_path, self.vocabulary_checksum) {
            (Some(path), Some(expected)) => files.push((path, expected)),
            (None, None) => {}
            (Some(path), None) => {
                return Err(MailclassError::cache_format(format!(
                    "manifest records no checksum for {}",
                    path.display()
                )));
            }
            (None, Some(_)) => {
                return Err(MailclassError::cache_format(format!(
                    "manifest for '{key}' records a vocabulary this artifact kind does not have"
                )));
            }
        }
        for (path, expected) in files {
            let actual = checksum_file(path)?;
            if actual != expected {
                return Err(MailclassError::cache_format(format!(
                    "{}: checksum {actual:08x} does not match manifest {expected:08x}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// CRC32 of a file's contents.
pub fn checksum_file(path: &Path) -> Result<u32> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CacheKey, std::path::PathBuf, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data.txt");
        let info = dir.path().join("info.txt");
        fs::write(&data, "1,2;;;0\n").unwrap();
        fs::write(&info, "work").unwrap();
        let key = CacheKey::new("emails", 2, FeatureKind::Sequences).unwrap();
        (dir, key, data, info)
    }

    #[test]
    fn test_manifest_round_trip_and_verify() {
        let (dir, key, data, info) = setup();
        let manifest = CacheManifest::new(key.clone(), 1, &data, &info, None).unwrap();
        let path = dir.path().join("m.json");
        manifest.write(&path).unwrap();

        let loaded = CacheManifest::read(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.verify(&key, &data, &info, None).is_ok());
    }

    #[test]
    fn test_verify_detects_changed_data() {
        let (_dir, key, data, info) = setup();
        let manifest = CacheManifest::new(key.clone(), 1, &data, &info, None).unwrap();
        fs::write(&data, "1,3;;;0\n").unwrap();

        assert!(matches!(
            manifest.verify(&key, &data, &info, None),
            Err(MailclassError::CacheFormat(_))
        ));
    }

    #[test]
    fn test_verify_detects_other_key() {
        let (_dir, key, data, info) = setup();
        let manifest = CacheManifest::new(key, 1, &data, &info, None).unwrap();
        let other = CacheKey::new("emails", 3, FeatureKind::Sequences).unwrap();

        let err = manifest.verify(&other, &data, &info, None).unwrap_err();
        assert!(err.to_string().contains("emails_2_sequence"));
    }

    #[test]
    fn test_verify_detects_changed_vocabulary() {
        let (dir, key, data, info) = setup();
        let vocab = dir.path().join("vocab.txt");
        fs::write(&vocab, "budget\nmeeting\n").unwrap();
        let manifest = CacheManifest::new(key.clone(), 1, &data, &info, Some(&vocab)).unwrap();
        assert!(manifest.verify(&key, &data, &info, Some(&vocab)).is_ok());

        fs::write(&vocab, "meeting\nbudget\n").unwrap();
        let err = manifest.verify(&key, &data, &info, Some(&vocab)).unwrap_err();
        assert!(matches!(err, MailclassError::CacheFormat(_)));
        assert!(err.to_string().contains("vocab.txt"));
    }

    #[test]
    fn test_verify_requires_vocabulary_checksum() {
        let (dir, key, data, info) = setup();
        let vocab = dir.path().join("vocab.txt");
        fs::write(&vocab, "budget\n").unwrap();
        let manifest = CacheManifest::new(key.clone(), 1, &data, &info, None).unwrap();

        assert!(matches!(
            manifest.verify(&key, &data, &info, Some(&vocab)),
            Err(MailclassError::CacheFormat(_))
        ));
    }

    #[test]
    fn test_checksum_is_crc32() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"123456789").unwrap();
        assert_eq!(checksum_file(&path).unwrap(), 0xCBF4_3926);
    }

    #[test]
    fn test_garbage_manifest_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            CacheManifest::read(&path),
            Err(MailclassError::CacheFormat(_))
        ));
    }
}
