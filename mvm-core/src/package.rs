//! Application package loading.
//!
//! The application to embed is a dual-fork payload. It can be supplied
//! as a ZIP package holding a `*.data`/`*.rsrc` entry pair and an
//! optional `manifest.json` with type/creator overrides, or as a plain
//! data-fork file with an optional `.rsrc` sidecar next to it.

use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{LaunchError, LaunchResult};
use crate::volume::FourCC;

/// Default application file type.
pub const TYPE_APPLICATION: FourCC = FourCC::new(b"APPL");
/// Wildcard creator code.
pub const CREATOR_ANY: FourCC = FourCC::new(b"????");

/// Optional package manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppManifest {
    #[serde(rename = "type")]
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
}

/// The application payload to embed in the assembled volume.
#[derive(Debug, Clone)]
pub struct AppPackage {
    pub data: Vec<u8>,
    pub rsrc: Vec<u8>,
    pub type_code: FourCC,
    pub creator: FourCC,
}

impl AppPackage {
    pub fn new(data: Vec<u8>, rsrc: Vec<u8>) -> Self {
        Self {
            data,
            rsrc,
            type_code: TYPE_APPLICATION,
            creator: CREATOR_ANY,
        }
    }

    /// Load from a ZIP package.
    pub fn from_zip<R: Read + Seek>(reader: R) -> LaunchResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut data: Option<Vec<u8>> = None;
        let mut rsrc: Option<Vec<u8>> = None;
        let mut manifest = AppManifest::default();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_lowercase();
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;

            if name == "manifest.json" || name.ends_with("/manifest.json") {
                manifest = serde_json::from_slice(&content)?;
            } else if name.ends_with(".data") {
                data = Some(content);
            } else if name.ends_with(".rsrc") {
                rsrc = Some(content);
            }
        }

        let data = data.ok_or_else(|| {
            LaunchError::Package("no *.data entry in application package".to_string())
        })?;

        let mut app = Self::new(data, rsrc.unwrap_or_default());
        if let Some(t) = &manifest.file_type {
            app.type_code = fourcc(t)?;
        }
        if let Some(c) = &manifest.creator {
            app.creator = fourcc(c)?;
        }
        Ok(app)
    }

    /// Load from a raw data-fork file plus an optional resource-fork
    /// sidecar. A missing sidecar means an empty resource fork.
    pub fn from_paths(data_path: &Path, rsrc_path: Option<&Path>) -> LaunchResult<Self> {
        let data = std::fs::read(data_path)?;
        let rsrc = match rsrc_path {
            Some(p) => std::fs::read(p)?,
            None => Vec::new(),
        };
        Ok(Self::new(data, rsrc))
    }
}

fn fourcc(s: &str) -> LaunchResult<FourCC> {
    let bytes = s.as_bytes();
    if bytes.len() != 4 {
        return Err(LaunchError::Package(format!(
            "'{}' is not a 4-byte type/creator code",
            s
        )));
    }
    Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn create_test_zip(with_manifest: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);

            if with_manifest {
                let manifest = r#"{ "type": "APPL", "creator": "TeSt" }"#;
                zip.start_file::<_, ()>("manifest.json", Default::default())
                    .unwrap();
                zip.write_all(manifest.as_bytes()).unwrap();
            }

            zip.start_file::<_, ()>("app.data", Default::default()).unwrap();
            zip.write_all(b"CODE").unwrap();

            zip.start_file::<_, ()>("app.rsrc", Default::default()).unwrap();
            zip.write_all(&[1u8, 2, 3]).unwrap();

            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_from_zip() {
        let app = AppPackage::from_zip(Cursor::new(create_test_zip(true))).unwrap();
        assert_eq!(app.data, b"CODE");
        assert_eq!(app.rsrc, [1, 2, 3]);
        assert_eq!(app.type_code, TYPE_APPLICATION);
        assert_eq!(app.creator, FourCC::new(b"TeSt"));
    }

    #[test]
    fn test_from_zip_defaults() {
        let app = AppPackage::from_zip(Cursor::new(create_test_zip(false))).unwrap();
        assert_eq!(app.creator, CREATOR_ANY);
    }

    #[test]
    fn test_zip_without_data_fork_rejected() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file::<_, ()>("readme.txt", Default::default()).unwrap();
            zip.write_all(b"nothing here").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(
            AppPackage::from_zip(Cursor::new(buf)),
            Err(LaunchError::Package(_))
        ));
    }

    #[test]
    fn test_bad_fourcc_rejected() {
        assert!(fourcc("TOOLONG").is_err());
        assert!(fourcc("ok").is_err());
        assert_eq!(fourcc("MPS ").unwrap(), FourCC::new(b"MPS "));
    }

    #[test]
    fn test_from_paths() {
        let dir = std::env::temp_dir().join(format!("mvm-package-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let data_path = dir.join("app.bin");
        std::fs::write(&data_path, b"payload").unwrap();

        let app = AppPackage::from_paths(&data_path, None).unwrap();
        assert_eq!(app.data, b"payload");
        assert!(app.rsrc.is_empty());
    }
}
