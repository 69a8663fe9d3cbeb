//! Emulator and ROM staging.
//!
//! The emulator resolves its ROM and disk images relative to its own
//! binary, so the launcher stages a private copy of everything into the
//! session's working directory. Bundle layouts (`.app` directories) are
//! handled here so the pipeline itself stays platform-agnostic.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{LaunchError, LaunchResult};

/// Canonical ROM file name the emulator looks for.
pub const ROM_NAME: &str = "vMac.ROM";

/// Staged name of a plain emulator binary.
const EMULATOR_NAME: &str = "minivmac";

/// Link the ROM into `work_dir` under its own name and, when that name
/// differs, under the canonical name as well. The user may have kept a
/// model-specific ROM name on purpose, so both names are provided.
pub fn stage_rom(rom: &Path, work_dir: &Path) -> LaunchResult<()> {
    let file_name = rom
        .file_name()
        .ok_or_else(|| LaunchError::Stage(format!("ROM path {} has no file name", rom.display())))?;
    link_or_copy(rom, &work_dir.join(file_name))?;
    if file_name != ROM_NAME {
        link_or_copy(rom, &work_dir.join(ROM_NAME))?;
    }
    Ok(())
}

/// Stage a private copy of the emulator into `work_dir` and return the
/// path of the executable to invoke. A plain binary is copied as-is; an
/// application bundle is copied whole and its executable resolved under
/// `Contents/MacOS`.
pub fn stage_emulator(emulator: &Path, work_dir: &Path) -> LaunchResult<PathBuf> {
    if emulator.is_dir() && emulator.extension().map_or(false, |e| e == "app") {
        let bundle = work_dir.join("minivmac.app");
        copy_dir_recursive(emulator, &bundle)?;
        return bundle_executable(&bundle);
    }

    let staged = work_dir.join(EMULATOR_NAME);
    fs::copy(emulator, &staged)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&staged)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(&staged, perms)?;
    }
    Ok(staged)
}

/// Resolve the executable inside a copied bundle. Single-executable
/// `Contents/MacOS` layouts only; anything else is rejected rather than
/// guessed at.
fn bundle_executable(bundle: &Path) -> LaunchResult<PathBuf> {
    let macos = bundle.join("Contents").join("MacOS");
    let mut entries: Vec<PathBuf> = fs::read_dir(&macos)
        .map_err(|_| {
            LaunchError::Stage(format!("{} has no Contents/MacOS directory", bundle.display()))
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    match entries.as_slice() {
        [exe] => Ok(exe.clone()),
        [] => Err(LaunchError::Stage(format!(
            "no executable in {}",
            macos.display()
        ))),
        _ => {
            // Prefer an executable named after the bundle.
            let stem = bundle.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            entries
                .iter()
                .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(stem))
                .cloned()
                .ok_or_else(|| {
                    LaunchError::Stage(format!(
                        "ambiguous executables in {}",
                        macos.display()
                    ))
                })
        }
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> LaunchResult<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn link_or_copy(src: &Path, dst: &Path) -> LaunchResult<()> {
    if dst.exists() {
        return Ok(());
    }
    info!("linking {} -> {}", dst.display(), src.display());
    std::os::unix::fs::symlink(src, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_or_copy(src: &Path, dst: &Path) -> LaunchResult<()> {
    if dst.exists() {
        return Ok(());
    }
    info!("copying {} -> {}", src.display(), dst.display());
    fs::copy(src, dst)?;
    Ok(())
}
