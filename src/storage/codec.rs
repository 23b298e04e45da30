//! JSON document codec.
//!
//! Documents are written to a sibling temporary file and renamed over the
//! target, so a reader never observes a partially written file.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Permissions for every document the storage layer writes (owner read/write).
#[cfg(unix)]
pub const DOCUMENT_FILE_MODE: u32 = 0o600;

/// Read and parse a JSON document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingDocument(path.to_path_buf()));
        }
        Err(e) => {
            return Err(Error::IoAt {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    serde_json::from_slice(&bytes).map_err(|source| Error::Corrupted {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let io_err = |source: io::Error| Error::IoAt {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(DOCUMENT_FILE_MODE))
            .map_err(io_err)?;
    }
    tmp.write_all(&content).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;

    // On failure the returned handle is dropped here, which deletes the temp file.
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serializer};
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        values: Vec<u32>,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        let doc = Doc {
            name: "demo".into(),
            values: vec![1, 2, 3],
        };

        write_document(&path, &doc).unwrap();
        let loaded: Doc = read_document(&path).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(entries(temp.path()), vec!["doc.json"]);
    }

    #[test]
    fn test_read_missing_document() {
        let temp = TempDir::new().unwrap();
        let err = read_document::<Doc>(&temp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::MissingDocument(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_corrupted_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, b"{\"name\": \"demo\", \"values\": [1, 2").unwrap();

        let err = read_document::<Doc>(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }));
    }

    #[test]
    fn test_wrong_schema_is_corrupted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, b"{\"title\": 7}").unwrap();

        assert!(matches!(
            read_document::<Doc>(&path),
            Err(Error::Corrupted { .. })
        ));
    }

    #[test]
    fn test_serialize_failure_leaves_original_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        let original = json!({"name": "demo", "values": [1]});
        write_document(&path, &original).unwrap();

        assert!(write_document(&path, &Unserializable).is_err());

        let loaded: serde_json::Value = read_document(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(entries(temp.path()), vec!["doc.json"]);
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        // A non-empty directory at the target path makes the final rename fail.
        let target = temp.path().join("doc.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"original").unwrap();

        let err = write_document(&target, &json!({"name": "new"})).unwrap_err();
        assert!(matches!(err, Error::IoAt { .. }));

        assert_eq!(entries(temp.path()), vec!["doc.json"]);
        assert_eq!(fs::read(target.join("keep")).unwrap(), b"original");
    }

    #[test]
    fn test_write_replaces_previous_content_completely() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        write_document(&path, &json!({"name": "a much longer original name", "values": [1, 2, 3, 4]}))
            .unwrap();
        write_document(&path, &json!({"name": "b"})).unwrap();

        let loaded: serde_json::Value = read_document(&path).unwrap();
        assert_eq!(loaded, json!({"name": "b"}));
    }

    #[cfg(unix)]
    #[test]
    fn test_written_document_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        write_document(&path, &json!({})).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, DOCUMENT_FILE_MODE);
    }
}
