//! Volume access boundary.
//!
//! The assembly pipeline never touches on-disk filesystem structures
//! directly; it talks to a [`Volume`] mounted through a [`VolumeStore`].
//! The crate ships one store, [`ImageVolume`]/[`ImageStore`], which keeps
//! a flat catalog inside a fixed-capacity image file. A provider for the
//! real legacy filesystem would implement the same two traits.

pub mod image;

pub use image::{ImageStore, ImageVolume};

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LaunchError, LaunchResult};

/// Seconds between the Mac epoch (1904-01-01) and the Unix epoch.
const MAC_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Four-byte type/creator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// Which fork of a dual-fork file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    Data,
    Rsrc,
}

/// Mount mode for a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

/// Catalog id of a folder. The volume root is always [`ROOT_FOLDER`].
pub type FolderId = u32;

/// Catalog id of the root folder.
pub const ROOT_FOLDER: FolderId = 2;

/// Metadata for a single dual-fork file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub id: u32,
    pub parent: FolderId,
    pub type_code: FourCC,
    pub creator: FourCC,
    /// Creation date in seconds since the Mac epoch.
    pub created: u32,
    pub data_len: u64,
    pub rsrc_len: u64,
}

/// Volume-level metadata.
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub name: String,
    /// Creation date in seconds since the Mac epoch.
    pub created: u32,
    /// The designated bootable folder.
    pub blessed: FolderId,
}

/// A mounted volume. Name-based operations resolve within the current
/// folder, matching the path-less lookup style of the legacy filesystem
/// API this abstracts.
pub trait Volume {
    fn info(&self) -> VolumeInfo;

    fn set_blessed(&mut self, folder: FolderId) -> LaunchResult<()>;

    fn current_folder(&self) -> FolderId;

    fn set_current_folder(&mut self, folder: FolderId) -> LaunchResult<()>;

    /// Look up a file in the current folder. `None` if absent.
    fn stat(&self, name: &str) -> Option<FileInfo>;

    /// Read one fork of a file in the current folder, byte-exact.
    fn read_fork(&self, name: &str, fork: Fork) -> LaunchResult<Vec<u8>>;

    /// Create an empty dual-fork file in the current folder.
    fn create(&mut self, name: &str, type_code: FourCC, creator: FourCC) -> LaunchResult<()>;

    /// Replace one fork of a file in the current folder.
    fn write_fork(&mut self, name: &str, fork: Fork, data: &[u8]) -> LaunchResult<()>;

    /// Create a folder under the current folder.
    fn mkdir(&mut self, name: &str) -> LaunchResult<FolderId>;

    /// Find a folder by name under the current folder.
    fn find_folder(&self, name: &str) -> Option<FolderId>;

    /// Move a file from the current folder into a sibling folder.
    fn move_into(&mut self, name: &str, folder: &str) -> LaunchResult<()>;

    /// Write catalog and fork contents back to the backing image.
    /// No-op for read-only mounts.
    fn flush(&mut self) -> LaunchResult<()>;
}

/// Factory for mounted volumes.
pub trait VolumeStore {
    type Vol: Volume;

    fn mount(&self, path: &std::path::Path, mode: MountMode) -> LaunchResult<Mounted<Self::Vol>>;

    /// Create a zero-filled image of `capacity` bytes holding a freshly
    /// formatted empty volume named `name`.
    fn format(&self, path: &std::path::Path, capacity: u64, name: &str) -> LaunchResult<()>;
}

/// Scoped mount handle. Dropping it flushes best-effort; call
/// [`Mounted::unmount`] to surface flush errors. Either way, no mount
/// survives an early return from the pipeline.
pub struct Mounted<V: Volume> {
    vol: Option<V>,
}

impl<V: Volume> Mounted<V> {
    pub fn new(vol: V) -> Self {
        Self { vol: Some(vol) }
    }

    /// Flush and release the volume.
    pub fn unmount(mut self) -> LaunchResult<()> {
        if let Some(mut vol) = self.vol.take() {
            vol.flush()?;
        }
        Ok(())
    }
}

impl<V: Volume> std::ops::Deref for Mounted<V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.vol.as_ref().expect("volume already unmounted")
    }
}

impl<V: Volume> std::ops::DerefMut for Mounted<V> {
    fn deref_mut(&mut self) -> &mut V {
        self.vol.as_mut().expect("volume already unmounted")
    }
}

impl<V: Volume> Drop for Mounted<V> {
    fn drop(&mut self) {
        if let Some(mut vol) = self.vol.take() {
            if let Err(e) = vol.flush() {
                log::warn!("flush on unmount failed: {}", e);
            }
        }
    }
}

/// Current time in seconds since the Mac epoch.
pub fn mac_now() -> u32 {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (unix + MAC_EPOCH_OFFSET) as u32
}

/// Validate a file or volume name against a fixed-size slot.
pub fn check_name(what: &'static str, name: &str, max: usize) -> LaunchResult<()> {
    if name.len() > max {
        return Err(LaunchError::NameTooLong {
            what,
            len: name.len(),
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::new(b"APPL").to_string(), "APPL");
        assert_eq!(FourCC::new(b"MPS ").to_string(), "MPS ");
        assert_eq!(FourCC::new(&[0, b'a', b'b', b'c']).to_string(), "\\x00abc");
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("file name", "AutQuit7 alias", 63).is_ok());
        let err = check_name("volume name", "a volume name that is much too long", 27);
        assert!(matches!(err, Err(LaunchError::NameTooLong { max: 27, .. })));
    }
}
