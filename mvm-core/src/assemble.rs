//! Boot volume assembly.
//!
//! Builds a ready-to-boot volume from a donor system image, the target
//! application and an auto-quit utility image, then stages the emulator
//! runtime next to it. The auto-quit utility makes the emulated system
//! shut itself down once the application exits; how it is installed
//! depends on the donor's system version.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::alias::make_alias;
use crate::bootblock::{write_boot_block, BootBlock, BOOT_BLOCK_LEN};
use crate::bundle::{stage_emulator, stage_rom};
use crate::diskcopy::normalize_image;
use crate::error::{LaunchError, LaunchResult};
use crate::package::AppPackage;
use crate::version::{format_version, probe_system_version};
use crate::volume::{Fork, MountMode, Volume, VolumeStore};

/// Name of the assembled volume.
pub const VOLUME_NAME: &str = "SysAndApp";

/// Fixed capacity of the assembled volume: 5,000 KiB.
pub const VOLUME_CAPACITY: u64 = 5000 * 1024;

/// File name of the assembled image, where the emulator looks for it.
pub const IMAGE_FILE_NAME: &str = "disk1.dsk";

/// Name of the embedded application file.
pub const APP_FILE_NAME: &str = "App";

const DEBUGGER_FILE: &str = "MacsBug";
const SHELL_FILE: &str = "Finder";
const AUTOQUIT_FILE: &str = "AutoQuit";
const AUTQUIT7_FILE: &str = "AutQuit7";
const AUTQUIT7_ALIAS: &str = "AutQuit7 alias";
const STARTUP_FOLDER: &str = "Startup Items";

/// First system version with a 7-capable auto-quit utility.
const MODERN_VERSION: u16 = 0x0700;

/// How the auto-quit utility gets installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitStrategy {
    /// Pre-7 systems: patch the boot block so the utility boots as the
    /// shell, and copy it under its canonical name.
    Legacy,
    /// System 7 and later: keep the real shell, place an alias to the
    /// utility in the startup folder.
    Modern,
}

impl QuitStrategy {
    pub fn for_version(version: u16) -> Self {
        if version >= MODERN_VERSION {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    /// Configuration option that supplies this strategy's utility image.
    pub fn option_name(self) -> &'static str {
        match self {
            Self::Legacy => "autoquit-image",
            Self::Modern => "autquit7-image",
        }
    }
}

/// Inputs to an assembly run.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Donor system disk image, raw or DiskCopy-wrapped.
    pub system_image: PathBuf,
    /// Utility image for the legacy strategy.
    pub autoquit_image: Option<PathBuf>,
    /// Utility image for the modern strategy.
    pub autquit7_image: Option<PathBuf>,
    /// The application to embed.
    pub app: AppPackage,
    /// Target volume capacity in bytes.
    pub capacity: u64,
    /// Session working directory; the assembled image and any normalized
    /// image copies land here.
    pub work_dir: PathBuf,
}

impl AssembleOptions {
    pub fn new(system_image: PathBuf, app: AppPackage, work_dir: PathBuf) -> Self {
        Self {
            system_image,
            autoquit_image: None,
            autquit7_image: None,
            app,
            capacity: VOLUME_CAPACITY,
            work_dir,
        }
    }
}

/// A finished assembly.
#[derive(Debug, Clone)]
pub struct AssembledVolume {
    pub image_path: PathBuf,
    pub strategy: QuitStrategy,
    pub system_version: u16,
}

/// Copy a dual-fork file between mounted volumes, byte-exact. Optional
/// files degrade to a logged skip when absent.
fn copy_file(
    src: &impl Volume,
    dst: &mut impl Volume,
    name: &str,
    required: bool,
) -> LaunchResult<()> {
    let info = match src.stat(name) {
        Some(info) => info,
        None if required => return Err(LaunchError::FileNotFound(name.to_string())),
        None => {
            info!("optional file {} not present, skipping", name);
            return Ok(());
        }
    };

    let data = src.read_fork(name, Fork::Data)?;
    let rsrc = src.read_fork(name, Fork::Rsrc)?;
    if data.len() as u64 != info.data_len || rsrc.len() as u64 != info.rsrc_len {
        return Err(LaunchError::BadImage(format!(
            "short fork read for {}: got {}/{}, stat says {}/{}",
            name,
            data.len(),
            rsrc.len(),
            info.data_len,
            info.rsrc_len
        )));
    }

    dst.create(name, info.type_code, info.creator)?;
    dst.write_fork(name, Fork::Data, &data)?;
    dst.write_fork(name, Fork::Rsrc, &rsrc)?;
    debug!("copied {} ({} + {} bytes)", name, info.data_len, info.rsrc_len);
    Ok(())
}

fn read_boot_block(path: &Path) -> LaunchResult<BootBlock> {
    let mut buf = vec![0u8; BOOT_BLOCK_LEN];
    let mut file = fs::File::open(path)?;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    BootBlock::parse(&buf[..filled], path)
}

/// Assemble a ready-to-boot volume in `opts.work_dir`.
///
/// Both donor volumes and the target are released on every exit path;
/// a failed assembly never leaves a mount behind, and the returned path
/// only exists on success.
pub fn assemble<S: VolumeStore>(store: &S, opts: &AssembleOptions) -> LaunchResult<AssembledVolume> {
    let system_image = normalize_image(&opts.system_image, &opts.work_dir)?;
    let mut boot_block = read_boot_block(&system_image)?;

    let mut sysvol = store.mount(&system_image, MountMode::ReadOnly)?;
    let blessed = sysvol.info().blessed;
    sysvol.set_current_folder(blessed)?;

    let system_file = boot_block.system_file_name();
    let version = probe_system_version(&*sysvol, &system_file)?;
    let strategy = QuitStrategy::for_version(version);
    info!(
        "donor system {}, {} strategy",
        format_version(version),
        match strategy {
            QuitStrategy::Legacy => "legacy",
            QuitStrategy::Modern => "modern",
        }
    );

    let quit_image = match strategy {
        QuitStrategy::Legacy => opts.autoquit_image.as_ref(),
        QuitStrategy::Modern => opts.autquit7_image.as_ref(),
    }
    .ok_or(LaunchError::MissingOption {
        option: strategy.option_name(),
        version,
    })?;
    let quit_image = normalize_image(quit_image, &opts.work_dir)?;

    let image_path = opts.work_dir.join(IMAGE_FILE_NAME);
    store.format(&image_path, opts.capacity, VOLUME_NAME)?;

    if strategy == QuitStrategy::Legacy {
        boot_block.set_shell_name(AUTOQUIT_FILE)?;
        boot_block.set_startup_app_name(APP_FILE_NAME)?;
    }
    write_boot_block(&image_path, &boot_block)?;

    let mut vol = store.mount(&image_path, MountMode::ReadWrite)?;
    let root = vol.current_folder();
    vol.set_blessed(root)?;

    copy_file(&*sysvol, &mut *vol, &system_file, true)?;
    copy_file(&*sysvol, &mut *vol, DEBUGGER_FILE, false)?;
    if strategy == QuitStrategy::Modern {
        copy_file(&*sysvol, &mut *vol, SHELL_FILE, true)?;
    }

    vol.create(APP_FILE_NAME, opts.app.type_code, opts.app.creator)?;
    vol.write_fork(APP_FILE_NAME, Fork::Data, &opts.app.data)?;
    vol.write_fork(APP_FILE_NAME, Fork::Rsrc, &opts.app.rsrc)?;

    // Swap donors: the system volume is done, the utility volume is next.
    sysvol.unmount()?;
    let quitvol = store.mount(&quit_image, MountMode::ReadOnly)?;

    match strategy {
        QuitStrategy::Modern => {
            copy_file(&*quitvol, &mut *vol, AUTQUIT7_FILE, true)?;
            make_alias(&mut *vol, AUTQUIT7_ALIAS, AUTQUIT7_FILE)?;
            vol.mkdir(STARTUP_FOLDER)?;
            vol.move_into(AUTQUIT7_ALIAS, STARTUP_FOLDER)?;
        }
        QuitStrategy::Legacy => {
            copy_file(&*quitvol, &mut *vol, AUTOQUIT_FILE, true)?;
        }
    }

    vol.create(
        crate::run::OUTPUT_FILE,
        crate::volume::FourCC::new(b"TEXT"),
        crate::volume::FourCC::new(b"MPS "),
    )?;

    quitvol.unmount()?;
    vol.unmount()?;

    Ok(AssembledVolume {
        image_path,
        strategy,
        system_version: version,
    })
}

/// Stage the emulator runtime (ROM links and a private emulator copy)
/// into the working directory. Returns the executable to invoke.
pub fn stage_runtime(rom: &Path, emulator: &Path, work_dir: &Path) -> LaunchResult<PathBuf> {
    stage_rom(rom, work_dir)?;
    stage_emulator(emulator, work_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_boundary() {
        assert_eq!(QuitStrategy::for_version(0x0608), QuitStrategy::Legacy);
        assert_eq!(QuitStrategy::for_version(0x06FF), QuitStrategy::Legacy);
        // 7.0.0 exactly is already modern.
        assert_eq!(QuitStrategy::for_version(0x0700), QuitStrategy::Modern);
        assert_eq!(QuitStrategy::for_version(0x0710), QuitStrategy::Modern);
    }

    #[test]
    fn test_option_names() {
        assert_eq!(QuitStrategy::Legacy.option_name(), "autoquit-image");
        assert_eq!(QuitStrategy::Modern.option_name(), "autquit7-image");
    }
}
