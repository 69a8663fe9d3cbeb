//! System version probing.
//!
//! The donor's system file carries a `vers` #1 resource whose first two
//! bytes are the binary-coded version (major version in the high byte).
//! That value decides the auto-quit strategy, so a donor without it is
//! unusable.

use crate::error::{LaunchError, LaunchResult};
use crate::resource::ResourceFork;
use crate::volume::{Fork, FourCC, Volume};

/// Resource type holding version info.
pub const VERS: FourCC = FourCC::new(b"vers");

/// Read the system version from `file_name` on a mounted donor volume.
/// Returns the version as a big-endian u16, e.g. 0x0700 for System 7.0.
pub fn probe_system_version(vol: &impl Volume, file_name: &str) -> LaunchResult<u16> {
    if vol.stat(file_name).is_none() {
        return Err(LaunchError::FileNotFound(file_name.to_string()));
    }
    let rsrc = vol.read_fork(file_name, Fork::Rsrc)?;
    let fork = ResourceFork::parse(&rsrc)?;
    let vers = fork
        .get(VERS, 1)
        .ok_or(LaunchError::ResourceNotFound { kind: VERS, id: 1 })?;
    if vers.len() < 2 {
        return Err(LaunchError::ResourceFork(format!(
            "vers #1 is {} bytes, need at least 2",
            vers.len()
        )));
    }
    Ok(u16::from_be_bytes([vers[0], vers[1]]))
}

/// Render a BCD-coded version as dotted digits, e.g. 0x0608 as "6.0.8".
pub fn format_version(version: u16) -> String {
    format!(
        "{}.{}.{}",
        version >> 8,
        (version >> 4) & 0xF,
        version & 0xF
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{ImageStore, MountMode, VolumeStore};
    use std::fs;
    use std::path::PathBuf;

    fn temp_image(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mvm-version-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn donor_with_vers(path: &PathBuf, vers: Option<&[u8]>) {
        let store = ImageStore::new();
        store.format(path, 64 * 1024, "Donor").unwrap();
        let mut vol = store.mount(path, MountMode::ReadWrite).unwrap();
        vol.create("System", FourCC::new(b"zsys"), FourCC::new(b"MACS"))
            .unwrap();
        if let Some(v) = vers {
            let mut fork = ResourceFork::new();
            fork.add(VERS, 1, v.to_vec());
            vol.write_fork("System", Fork::Rsrc, &fork.encode()).unwrap();
        }
        vol.unmount().unwrap();
    }

    #[test]
    fn test_probe_version() {
        let path = temp_image("sys608.img");
        donor_with_vers(&path, Some(&[0x06, 0x08, 0x80, 0x00]));

        let store = ImageStore::new();
        let vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        assert_eq!(probe_system_version(&*vol, "System").unwrap(), 0x0608);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = temp_image("nosys.img");
        let store = ImageStore::new();
        store.format(&path, 64 * 1024, "Donor").unwrap();
        let vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        assert!(matches!(
            probe_system_version(&*vol, "System"),
            Err(LaunchError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_resource_is_fatal() {
        let path = temp_image("novers.img");
        donor_with_vers(&path, None);

        let store = ImageStore::new();
        let vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        assert!(matches!(
            probe_system_version(&*vol, "System"),
            Err(LaunchError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_format_version_keeps_all_digits() {
        assert_eq!(format_version(0x0608), "6.0.8");
        assert_eq!(format_version(0x0700), "7.0.0");
        assert_eq!(format_version(0x0755), "7.5.5");
    }
}
