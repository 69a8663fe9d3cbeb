//! Boot block parsing and patching.
//!
//! The first 1024 bytes of a bootable volume carry the startup metadata:
//! a two-byte signature, the system file's name, and a set of fixed
//! Pascal-string slots naming the shell and the startup application.
//! Every field is read and written at an explicit byte offset; nothing
//! here depends on in-memory struct layout.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{LaunchError, LaunchResult};

/// Boot block length in bytes.
pub const BOOT_BLOCK_LEN: usize = 1024;

/// Boot block signature, `LK`.
const SIGNATURE: [u8; 2] = [b'L', b'K'];

/// Offset of the system file name (length byte, then up to 15 bytes).
const SYSTEM_NAME_OFFSET: usize = 0x0A;
/// Offset of the shell (Finder) name slot.
const SHELL_NAME_OFFSET: usize = 0x1A;
/// Offset of the startup application name slot.
const STARTUP_APP_OFFSET: usize = 0x5A;
/// All three name slots hold a Pascal string of at most 15 bytes.
const NAME_SLOT_MAX: usize = 15;

/// A boot block held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootBlock {
    bytes: [u8; BOOT_BLOCK_LEN],
}

impl BootBlock {
    /// An empty boot block carrying only the signature. Useful when
    /// constructing donor images.
    pub fn new() -> Self {
        let mut bytes = [0u8; BOOT_BLOCK_LEN];
        bytes[0..2].copy_from_slice(&SIGNATURE);
        Self { bytes }
    }

    /// Validate and take ownership of the first 1024 bytes of `image`.
    /// Rejects a missing signature or an over-long system file name, the
    /// two invariants a bootable donor must satisfy.
    pub fn parse(image: &[u8], origin: &Path) -> LaunchResult<Self> {
        if image.len() < BOOT_BLOCK_LEN {
            return Err(LaunchError::NotBootable(origin.to_path_buf()));
        }
        if image[0..2] != SIGNATURE || image[SYSTEM_NAME_OFFSET] as usize > NAME_SLOT_MAX {
            return Err(LaunchError::NotBootable(origin.to_path_buf()));
        }
        let mut bytes = [0u8; BOOT_BLOCK_LEN];
        bytes.copy_from_slice(&image[..BOOT_BLOCK_LEN]);
        Ok(Self { bytes })
    }

    /// The system file name from its Pascal-string slot.
    pub fn system_file_name(&self) -> String {
        self.read_slot(SYSTEM_NAME_OFFSET)
    }

    pub fn set_system_file_name(&mut self, name: &str) -> LaunchResult<()> {
        self.write_slot(SYSTEM_NAME_OFFSET, "system file name", name)
    }

    /// The shell name from its slot.
    pub fn shell_name(&self) -> String {
        self.read_slot(SHELL_NAME_OFFSET)
    }

    /// Patch the shell slot; the legacy strategy points it at the
    /// auto-quit utility so it boots in place of the desktop shell.
    pub fn set_shell_name(&mut self, name: &str) -> LaunchResult<()> {
        self.write_slot(SHELL_NAME_OFFSET, "shell name", name)
    }

    /// The startup application name from its slot.
    pub fn startup_app_name(&self) -> String {
        self.read_slot(STARTUP_APP_OFFSET)
    }

    pub fn set_startup_app_name(&mut self, name: &str) -> LaunchResult<()> {
        self.write_slot(STARTUP_APP_OFFSET, "startup application name", name)
    }

    pub fn as_bytes(&self) -> &[u8; BOOT_BLOCK_LEN] {
        &self.bytes
    }

    fn read_slot(&self, offset: usize) -> String {
        let len = (self.bytes[offset] as usize).min(NAME_SLOT_MAX);
        String::from_utf8_lossy(&self.bytes[offset + 1..offset + 1 + len]).into_owned()
    }

    fn write_slot(&mut self, offset: usize, what: &'static str, name: &str) -> LaunchResult<()> {
        let raw = name.as_bytes();
        if raw.len() > NAME_SLOT_MAX {
            return Err(LaunchError::NameTooLong {
                what,
                len: raw.len(),
                max: NAME_SLOT_MAX,
            });
        }
        self.bytes[offset] = raw.len() as u8;
        self.bytes[offset + 1..offset + 1 + NAME_SLOT_MAX].fill(0);
        self.bytes[offset + 1..offset + 1 + raw.len()].copy_from_slice(raw);
        Ok(())
    }
}

impl Default for BootBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Commit a boot block as the first 1024 bytes of an image file.
pub fn write_boot_block(path: &Path, block: &BootBlock) -> LaunchResult<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(block.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("donor.img")
    }

    #[test]
    fn test_parse_valid() {
        let mut bb = BootBlock::new();
        bb.set_system_file_name("System").unwrap();
        let parsed = BootBlock::parse(bb.as_bytes(), &origin()).unwrap();
        assert_eq!(parsed.system_file_name(), "System");
    }

    #[test]
    fn test_bad_signature_rejected() {
        let image = [0u8; BOOT_BLOCK_LEN];
        assert!(matches!(
            BootBlock::parse(&image, &origin()),
            Err(LaunchError::NotBootable(_))
        ));
    }

    #[test]
    fn test_overlong_name_length_rejected() {
        let mut bb = BootBlock::new();
        bb.bytes[SYSTEM_NAME_OFFSET] = 16;
        assert!(matches!(
            BootBlock::parse(bb.as_bytes(), &origin()),
            Err(LaunchError::NotBootable(_))
        ));
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(BootBlock::parse(&[b'L', b'K', 0, 0], &origin()).is_err());
    }

    #[test]
    fn test_patch_slots() {
        let mut bb = BootBlock::new();
        bb.set_shell_name("AutoQuit").unwrap();
        bb.set_startup_app_name("App").unwrap();

        assert_eq!(bb.as_bytes()[SHELL_NAME_OFFSET], 8);
        assert_eq!(&bb.as_bytes()[SHELL_NAME_OFFSET + 1..SHELL_NAME_OFFSET + 9], b"AutoQuit");
        assert_eq!(bb.as_bytes()[STARTUP_APP_OFFSET], 3);
        assert_eq!(&bb.as_bytes()[STARTUP_APP_OFFSET + 1..STARTUP_APP_OFFSET + 4], b"App");
        assert_eq!(bb.shell_name(), "AutoQuit");
        assert_eq!(bb.startup_app_name(), "App");
    }

    #[test]
    fn test_slot_bounds_checked() {
        let mut bb = BootBlock::new();
        let err = bb.set_shell_name("a name past fifteen bytes");
        assert!(matches!(err, Err(LaunchError::NameTooLong { max: 15, .. })));
    }
}
