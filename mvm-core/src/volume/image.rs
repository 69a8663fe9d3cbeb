//! Flat-file volume images.
//!
//! The image layout keeps the externally visible properties of a real
//! boot volume without any catalog B-trees: the first 1024 bytes are the boot
//! block verbatim, and the 16-bit volume signature `0x4244` sits at
//! offset 1024, exactly where a mounted legacy volume carries it. After
//! the signature comes a container tag, a JSON catalog and a heap of
//! fork contents; the file is zero-filled out to its fixed capacity.
//!
//! ```text
//! 0     .. 1024   boot block
//! 1024  .. 1026   volume signature 0x4244, big-endian
//! 1026  .. 1030   container tag "MVM1"
//! 1030  .. 1034   catalog length, big-endian u32
//! 1034  .. +len   catalog (JSON)
//! ...             fork heap (extents relative to heap start)
//! ...             zero fill to capacity
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LaunchError, LaunchResult};
use crate::volume::{
    mac_now, FileInfo, FolderId, Fork, FourCC, MountMode, Mounted, Volume, VolumeInfo,
    VolumeStore, ROOT_FOLDER,
};

/// Volume signature at offset 1024.
pub const VOLUME_SIG: u16 = 0x4244;

const CONTAINER_TAG: &[u8; 4] = b"MVM1";
const HEADER_LEN: usize = 1034;
const BOOT_BLOCK_LEN: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Extent {
    off: u64,
    len: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    id: u32,
    name: String,
    parent: FolderId,
    type_code: FourCC,
    creator: FourCC,
    created: u32,
    data: Extent,
    rsrc: Extent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFolder {
    id: FolderId,
    name: String,
    parent: FolderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Catalog {
    name: String,
    created: u32,
    blessed: FolderId,
    next_id: u32,
    folders: Vec<CatalogFolder>,
    files: Vec<CatalogFile>,
}

struct ImageFile {
    id: u32,
    name: String,
    parent: FolderId,
    type_code: FourCC,
    creator: FourCC,
    created: u32,
    data: Vec<u8>,
    rsrc: Vec<u8>,
}

/// A mounted flat-file volume. Catalog and fork contents live in memory
/// until [`Volume::flush`] writes them back.
pub struct ImageVolume {
    path: PathBuf,
    mode: MountMode,
    capacity: u64,
    boot_block: [u8; BOOT_BLOCK_LEN],
    name: String,
    created: u32,
    blessed: FolderId,
    next_id: u32,
    folders: Vec<CatalogFolder>,
    files: Vec<ImageFile>,
    cwd: FolderId,
}

impl ImageVolume {
    fn open(path: &Path, mode: MountMode) -> LaunchResult<Self> {
        let bytes = fs::read(path).map_err(|_| LaunchError::Mount(path.to_path_buf()))?;
        if bytes.len() < HEADER_LEN {
            return Err(LaunchError::Mount(path.to_path_buf()));
        }
        let sig = u16::from_be_bytes([bytes[1024], bytes[1025]]);
        if sig != VOLUME_SIG || &bytes[1026..1030] != CONTAINER_TAG {
            return Err(LaunchError::Mount(path.to_path_buf()));
        }
        let cat_len =
            u32::from_be_bytes([bytes[1030], bytes[1031], bytes[1032], bytes[1033]]) as usize;
        let cat_end = HEADER_LEN + cat_len;
        if cat_end > bytes.len() {
            return Err(LaunchError::BadImage(format!(
                "catalog extends past end of {}",
                path.display()
            )));
        }
        let catalog: Catalog = serde_json::from_slice(&bytes[HEADER_LEN..cat_end])?;

        let heap = &bytes[cat_end..];
        let read_extent = |e: &Extent| -> LaunchResult<Vec<u8>> {
            let start = e.off as usize;
            let end = start + e.len as usize;
            if end > heap.len() {
                return Err(LaunchError::BadImage(format!(
                    "fork extent out of bounds in {}",
                    path.display()
                )));
            }
            Ok(heap[start..end].to_vec())
        };

        let mut files = Vec::with_capacity(catalog.files.len());
        for f in &catalog.files {
            files.push(ImageFile {
                id: f.id,
                name: f.name.clone(),
                parent: f.parent,
                type_code: f.type_code,
                creator: f.creator,
                created: f.created,
                data: read_extent(&f.data)?,
                rsrc: read_extent(&f.rsrc)?,
            });
        }

        let mut boot_block = [0u8; BOOT_BLOCK_LEN];
        boot_block.copy_from_slice(&bytes[..BOOT_BLOCK_LEN]);

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            capacity: bytes.len() as u64,
            boot_block,
            name: catalog.name,
            created: catalog.created,
            blessed: catalog.blessed,
            next_id: catalog.next_id,
            folders: catalog.folders,
            files,
            cwd: ROOT_FOLDER,
        })
    }

    fn write_out(&self) -> LaunchResult<()> {
        // Extents are relative to the heap, which starts right after the
        // catalog, so offsets do not depend on the catalog's own length.
        let mut heap: Vec<u8> = Vec::new();
        let mut cat_files = Vec::with_capacity(self.files.len());
        for f in &self.files {
            let data = Extent {
                off: heap.len() as u64,
                len: f.data.len() as u64,
            };
            heap.extend_from_slice(&f.data);
            let rsrc = Extent {
                off: heap.len() as u64,
                len: f.rsrc.len() as u64,
            };
            heap.extend_from_slice(&f.rsrc);
            cat_files.push(CatalogFile {
                id: f.id,
                name: f.name.clone(),
                parent: f.parent,
                type_code: f.type_code,
                creator: f.creator,
                created: f.created,
                data,
                rsrc,
            });
        }

        let catalog = Catalog {
            name: self.name.clone(),
            created: self.created,
            blessed: self.blessed,
            next_id: self.next_id,
            folders: self.folders.clone(),
            files: cat_files,
        };
        let cat_json = serde_json::to_vec(&catalog)?;

        let used = HEADER_LEN as u64 + cat_json.len() as u64 + heap.len() as u64;
        if used > self.capacity {
            return Err(LaunchError::VolumeFull);
        }

        let mut out = Vec::with_capacity(self.capacity as usize);
        out.extend_from_slice(&self.boot_block);
        out.extend_from_slice(&VOLUME_SIG.to_be_bytes());
        out.extend_from_slice(CONTAINER_TAG);
        out.extend_from_slice(&(cat_json.len() as u32).to_be_bytes());
        out.extend_from_slice(&cat_json);
        out.extend_from_slice(&heap);
        out.resize(self.capacity as usize, 0);
        fs::write(&self.path, out)?;
        Ok(())
    }

    fn file(&self, name: &str) -> Option<&ImageFile> {
        self.files
            .iter()
            .find(|f| f.parent == self.cwd && f.name == name)
    }

    fn file_mut(&mut self, name: &str) -> LaunchResult<&mut ImageFile> {
        let cwd = self.cwd;
        self.files
            .iter_mut()
            .find(|f| f.parent == cwd && f.name == name)
            .ok_or_else(|| LaunchError::FileNotFound(name.to_string()))
    }

    fn check_writable(&self) -> LaunchResult<()> {
        match self.mode {
            MountMode::ReadWrite => Ok(()),
            MountMode::ReadOnly => Err(LaunchError::ReadOnly),
        }
    }

    fn folder_exists(&self, id: FolderId) -> bool {
        id == ROOT_FOLDER || self.folders.iter().any(|f| f.id == id)
    }
}

impl Volume for ImageVolume {
    fn info(&self) -> VolumeInfo {
        VolumeInfo {
            name: self.name.clone(),
            created: self.created,
            blessed: self.blessed,
        }
    }

    fn set_blessed(&mut self, folder: FolderId) -> LaunchResult<()> {
        self.check_writable()?;
        if !self.folder_exists(folder) {
            return Err(LaunchError::BadImage(format!("no folder #{}", folder)));
        }
        self.blessed = folder;
        Ok(())
    }

    fn current_folder(&self) -> FolderId {
        self.cwd
    }

    fn set_current_folder(&mut self, folder: FolderId) -> LaunchResult<()> {
        if !self.folder_exists(folder) {
            return Err(LaunchError::BadImage(format!("no folder #{}", folder)));
        }
        self.cwd = folder;
        Ok(())
    }

    fn stat(&self, name: &str) -> Option<FileInfo> {
        self.file(name).map(|f| FileInfo {
            name: f.name.clone(),
            id: f.id,
            parent: f.parent,
            type_code: f.type_code,
            creator: f.creator,
            created: f.created,
            data_len: f.data.len() as u64,
            rsrc_len: f.rsrc.len() as u64,
        })
    }

    fn read_fork(&self, name: &str, fork: Fork) -> LaunchResult<Vec<u8>> {
        let f = self
            .file(name)
            .ok_or_else(|| LaunchError::FileNotFound(name.to_string()))?;
        Ok(match fork {
            Fork::Data => f.data.clone(),
            Fork::Rsrc => f.rsrc.clone(),
        })
    }

    fn create(&mut self, name: &str, type_code: FourCC, creator: FourCC) -> LaunchResult<()> {
        self.check_writable()?;
        if self.file(name).is_some() {
            return Err(LaunchError::FileExists(name.to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.files.push(ImageFile {
            id,
            name: name.to_string(),
            parent: self.cwd,
            type_code,
            creator,
            created: mac_now(),
            data: Vec::new(),
            rsrc: Vec::new(),
        });
        Ok(())
    }

    fn write_fork(&mut self, name: &str, fork: Fork, data: &[u8]) -> LaunchResult<()> {
        self.check_writable()?;
        let f = self.file_mut(name)?;
        match fork {
            Fork::Data => f.data = data.to_vec(),
            Fork::Rsrc => f.rsrc = data.to_vec(),
        }
        Ok(())
    }

    fn mkdir(&mut self, name: &str) -> LaunchResult<FolderId> {
        self.check_writable()?;
        if self.find_folder(name).is_some() {
            return Err(LaunchError::FileExists(name.to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.folders.push(CatalogFolder {
            id,
            name: name.to_string(),
            parent: self.cwd,
        });
        Ok(id)
    }

    fn find_folder(&self, name: &str) -> Option<FolderId> {
        self.folders
            .iter()
            .find(|f| f.parent == self.cwd && f.name == name)
            .map(|f| f.id)
    }

    fn move_into(&mut self, name: &str, folder: &str) -> LaunchResult<()> {
        self.check_writable()?;
        let target = self
            .find_folder(folder)
            .ok_or_else(|| LaunchError::FileNotFound(folder.to_string()))?;
        let f = self.file_mut(name)?;
        f.parent = target;
        Ok(())
    }

    fn flush(&mut self) -> LaunchResult<()> {
        match self.mode {
            MountMode::ReadOnly => Ok(()),
            MountMode::ReadWrite => self.write_out(),
        }
    }
}

/// Store for flat-file volume images.
#[derive(Debug, Clone, Default)]
pub struct ImageStore;

impl ImageStore {
    pub fn new() -> Self {
        Self
    }
}

impl VolumeStore for ImageStore {
    type Vol = ImageVolume;

    fn mount(&self, path: &Path, mode: MountMode) -> LaunchResult<Mounted<ImageVolume>> {
        Ok(Mounted::new(ImageVolume::open(path, mode)?))
    }

    fn format(&self, path: &Path, capacity: u64, name: &str) -> LaunchResult<()> {
        if (capacity as usize) < HEADER_LEN + 256 {
            return Err(LaunchError::BadImage(format!(
                "capacity {} too small for a volume",
                capacity
            )));
        }
        let vol = ImageVolume {
            path: path.to_path_buf(),
            mode: MountMode::ReadWrite,
            capacity,
            boot_block: [0u8; BOOT_BLOCK_LEN],
            name: name.to_string(),
            created: mac_now(),
            blessed: ROOT_FOLDER,
            next_id: 16,
            folders: Vec::new(),
            files: Vec::new(),
            cwd: ROOT_FOLDER,
        };
        vol.write_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_image(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mvm-image-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_format_and_mount() {
        let store = ImageStore::new();
        let path = temp_image("fresh.img");
        store.format(&path, 64 * 1024, "SysAndApp").unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 64 * 1024);

        let vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        let info = vol.info();
        assert_eq!(info.name, "SysAndApp");
        assert_eq!(info.blessed, ROOT_FOLDER);
        assert_eq!(vol.current_folder(), ROOT_FOLDER);
        vol.unmount().unwrap();
    }

    #[test]
    fn test_fork_contents_round_trip() {
        let store = ImageStore::new();
        let path = temp_image("forks.img");
        store.format(&path, 64 * 1024, "Test").unwrap();

        {
            let mut vol = store.mount(&path, MountMode::ReadWrite).unwrap();
            vol.create("App", FourCC::new(b"APPL"), FourCC::new(b"????"))
                .unwrap();
            vol.write_fork("App", Fork::Data, b"data fork bytes").unwrap();
            vol.write_fork("App", Fork::Rsrc, &[0u8, 1, 2, 3, 255]).unwrap();
            vol.unmount().unwrap();
        }

        let vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        let info = vol.stat("App").unwrap();
        assert_eq!(info.data_len, 15);
        assert_eq!(info.rsrc_len, 5);
        assert_eq!(info.type_code, FourCC::new(b"APPL"));
        assert_eq!(vol.read_fork("App", Fork::Data).unwrap(), b"data fork bytes");
        assert_eq!(vol.read_fork("App", Fork::Rsrc).unwrap(), [0u8, 1, 2, 3, 255]);
    }

    #[test]
    fn test_read_only_mount_rejects_writes() {
        let store = ImageStore::new();
        let path = temp_image("readonly.img");
        store.format(&path, 64 * 1024, "Test").unwrap();

        let mut vol = store.mount(&path, MountMode::ReadOnly).unwrap();
        let err = vol.create("X", FourCC::new(b"TEXT"), FourCC::new(b"MPS "));
        assert!(matches!(err, Err(LaunchError::ReadOnly)));
    }

    #[test]
    fn test_folders_and_move() {
        let store = ImageStore::new();
        let path = temp_image("folders.img");
        store.format(&path, 64 * 1024, "Test").unwrap();

        let mut vol = store.mount(&path, MountMode::ReadWrite).unwrap();
        vol.create("alias", FourCC::new(b"adrp"), FourCC::new(b"MACS"))
            .unwrap();
        let folder = vol.mkdir("Startup Items").unwrap();
        vol.move_into("alias", "Startup Items").unwrap();

        // Gone from the root, present in the folder.
        assert!(vol.stat("alias").is_none());
        vol.set_current_folder(folder).unwrap();
        assert!(vol.stat("alias").is_some());
    }

    #[test]
    fn test_mount_rejects_garbage() {
        let store = ImageStore::new();
        let path = temp_image("garbage.img");
        fs::write(&path, vec![0u8; 4096]).unwrap();
        assert!(matches!(
            store.mount(&path, MountMode::ReadOnly),
            Err(LaunchError::Mount(_))
        ));
    }

    #[test]
    fn test_volume_full() {
        let store = ImageStore::new();
        let path = temp_image("full.img");
        store.format(&path, 2048, "Tiny").unwrap();

        let mut vol = store.mount(&path, MountMode::ReadWrite).unwrap();
        vol.create("big", FourCC::new(b"TEXT"), FourCC::new(b"MPS "))
            .unwrap();
        vol.write_fork("big", Fork::Data, &vec![0xAAu8; 4096]).unwrap();
        assert!(matches!(vol.unmount(), Err(LaunchError::VolumeFull)));
    }
}
