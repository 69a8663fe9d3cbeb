//! Alias records.
//!
//! An alias is the legacy filesystem's symbolic link: a fixed-layout
//! binary record naming a file, its parent folder and its owning volume,
//! stored as the sole `alis` resource in a dedicated file's resource
//! fork. All fields are encoded big-endian at explicit offsets.

use crate::error::LaunchResult;
use crate::resource::ResourceFork;
use crate::volume::{check_name, FileInfo, Fork, FourCC, Volume, VolumeInfo};

/// Resource type of an alias record.
pub const ALIS: FourCC = FourCC::new(b"alis");

/// File type of an alias file ("alias provider").
pub const ALIAS_FILE_TYPE: FourCC = FourCC::new(b"adrp");

/// Encoded record length.
pub const ALIAS_RECORD_LEN: usize = 150;

const VOLUME_NAME_MAX: usize = 27;
const FILE_NAME_MAX: usize = 63;

/// An alias record, built from file and volume metadata. Timestamps are
/// copied from that metadata, never generated, so building twice against
/// the same volume state yields identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    pub volume_name: String,
    pub volume_created: u32,
    pub parent_id: u32,
    pub file_name: String,
    pub file_id: u32,
    pub file_created: u32,
    pub type_code: FourCC,
    pub creator: FourCC,
}

impl AliasRecord {
    /// Populate a record from source-file and volume metadata. Fails if
    /// either name overflows its fixed slot rather than truncating into
    /// the adjacent fields.
    pub fn from_metadata(file: &FileInfo, volume: &VolumeInfo) -> LaunchResult<Self> {
        check_name("volume name", &volume.name, VOLUME_NAME_MAX)?;
        check_name("file name", &file.name, FILE_NAME_MAX)?;
        Ok(Self {
            volume_name: volume.name.clone(),
            volume_created: volume.created,
            parent_id: file.parent,
            file_name: file.name.clone(),
            file_id: file.id,
            file_created: file.created,
            type_code: file.type_code,
            creator: file.creator,
        })
    }

    /// Encode the 150-byte record.
    pub fn encode(&self) -> [u8; ALIAS_RECORD_LEN] {
        let mut out = [0u8; ALIAS_RECORD_LEN];
        // 0..4   user type, zero
        out[4..6].copy_from_slice(&(ALIAS_RECORD_LEN as u16).to_be_bytes());
        out[6..8].copy_from_slice(&2i16.to_be_bytes()); // record version
        out[8..10].copy_from_slice(&0i16.to_be_bytes()); // kind: file
        out[10] = self.volume_name.len() as u8;
        out[11..11 + self.volume_name.len()].copy_from_slice(self.volume_name.as_bytes());
        out[38..42].copy_from_slice(&self.volume_created.to_be_bytes());
        out[42..44].copy_from_slice(&0x4244u16.to_be_bytes()); // volume signature
        out[44..46].copy_from_slice(&5i16.to_be_bytes()); // volume kind: other ejectable
        out[46..50].copy_from_slice(&self.parent_id.to_be_bytes());
        out[50] = self.file_name.len() as u8;
        out[51..51 + self.file_name.len()].copy_from_slice(self.file_name.as_bytes());
        out[114..118].copy_from_slice(&self.file_id.to_be_bytes());
        out[118..122].copy_from_slice(&self.file_created.to_be_bytes());
        out[122..126].copy_from_slice(self.type_code.as_bytes());
        out[126..130].copy_from_slice(self.creator.as_bytes());
        // 130..134 nlvl from/to, 134..138 volume attributes,
        // 138..140 filesystem id, 140..150 reserved: all zero
        out
    }
}

/// Build an alias to `src` and store it on the same volume as a new file
/// `dest`, with the record as the sole resource-fork payload and an
/// empty data fork.
pub fn make_alias(vol: &mut impl Volume, dest: &str, src: &str) -> LaunchResult<()> {
    let file = vol
        .stat(src)
        .ok_or_else(|| crate::error::LaunchError::FileNotFound(src.to_string()))?;
    let info = vol.info();

    let record = AliasRecord::from_metadata(&file, &info)?;
    let mut fork = ResourceFork::new();
    fork.add(ALIS, 0, record.encode().to_vec());

    vol.create(dest, ALIAS_FILE_TYPE, file.creator)?;
    vol.write_fork(dest, Fork::Rsrc, &fork.encode())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaunchError;
    use crate::volume::FolderId;

    fn sample_file() -> FileInfo {
        FileInfo {
            name: "AutQuit7".to_string(),
            id: 42,
            parent: 2 as FolderId,
            type_code: FourCC::new(b"APPL"),
            creator: FourCC::new(b"AqT7"),
            created: 0x1234_5678,
            data_len: 10,
            rsrc_len: 20,
        }
    }

    fn sample_volume() -> VolumeInfo {
        VolumeInfo {
            name: "SysAndApp".to_string(),
            created: 0x0BAD_CAFE,
            blessed: 2,
        }
    }

    #[test]
    fn test_encoded_layout() {
        let rec = AliasRecord::from_metadata(&sample_file(), &sample_volume()).unwrap();
        let bytes = rec.encode();

        assert_eq!(bytes.len(), ALIAS_RECORD_LEN);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 150);
        assert_eq!(i16::from_be_bytes([bytes[6], bytes[7]]), 2);
        assert_eq!(bytes[10] as usize, "SysAndApp".len());
        assert_eq!(&bytes[11..20], b"SysAndApp");
        assert_eq!(&bytes[38..42], &0x0BAD_CAFEu32.to_be_bytes());
        assert_eq!(u16::from_be_bytes([bytes[42], bytes[43]]), 0x4244);
        assert_eq!(i16::from_be_bytes([bytes[44], bytes[45]]), 5);
        assert_eq!(&bytes[46..50], &2u32.to_be_bytes());
        assert_eq!(bytes[50] as usize, "AutQuit7".len());
        assert_eq!(&bytes[51..59], b"AutQuit7");
        assert_eq!(&bytes[114..118], &42u32.to_be_bytes());
        assert_eq!(&bytes[118..122], &0x1234_5678u32.to_be_bytes());
        assert_eq!(&bytes[122..126], b"APPL");
        assert_eq!(&bytes[126..130], b"AqT7");
        assert!(bytes[130..150].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_determinism() {
        let a = AliasRecord::from_metadata(&sample_file(), &sample_volume()).unwrap();
        let b = AliasRecord::from_metadata(&sample_file(), &sample_volume()).unwrap();
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn test_overlong_volume_name_fails() {
        let mut vol = sample_volume();
        vol.name = "a volume name well past the slot".to_string();
        assert!(matches!(
            AliasRecord::from_metadata(&sample_file(), &vol),
            Err(LaunchError::NameTooLong { max: 27, .. })
        ));
    }

    #[test]
    fn test_overlong_file_name_fails() {
        let mut file = sample_file();
        file.name = "x".repeat(64);
        assert!(matches!(
            AliasRecord::from_metadata(&file, &sample_volume()),
            Err(LaunchError::NameTooLong { max: 63, .. })
        ));
    }
}
