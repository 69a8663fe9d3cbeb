//! DiskCopy 4.2 image normalization.
//!
//! Donor images come either as raw volumes or wrapped in a DiskCopy 4.2
//! container: an 84-byte header followed by the raw volume bytes.
//! [`normalize_image`] strips the wrapper when it is present and passes
//! anything else through untouched.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::LaunchResult;
use crate::volume::image::VOLUME_SIG;

/// Size of the DiskCopy 4.2 header.
const HEADER_SIZE: u64 = 0x54;

/// Offset of the big-endian data-fork length field.
const LENGTH_OFFSET: u64 = 0x40;

/// Offset of the format signature word.
const SIG_OFFSET: u64 = 0x52;

/// "Version 1" format signature.
const DISKCOPY_SIG: u16 = 0x0100;

fn read_u32_at(f: &mut fs::File, offset: u64) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    f.seek(SeekFrom::Start(offset))?;
    f.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u16_at(f: &mut fs::File, offset: u64) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    f.seek(SeekFrom::Start(offset))?;
    f.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Detect whether `path` is a wrapped disk image and, if so, copy the
/// embedded raw volume into `scratch_dir` and return the copy's path.
/// Anything that does not look like a wrapper — wrong signature, size
/// mismatch, file too short — falls through to the original path. The
/// input file is never modified.
pub fn normalize_image(path: &Path, scratch_dir: &Path) -> LaunchResult<PathBuf> {
    let mut file = fs::File::open(path)?;
    let actual_size = file.metadata()?.len();

    if actual_size < HEADER_SIZE + 1026 {
        return Ok(path.to_path_buf());
    }

    let embedded_len = read_u32_at(&mut file, LENGTH_OFFSET)? as u64;
    let sig = read_u16_at(&mut file, SIG_OFFSET)?;
    // Volume signature of the wrapped payload, at 1024 past the header.
    let embedded_sig = read_u16_at(&mut file, HEADER_SIZE + 1024)?;

    let wrapped = sig == DISKCOPY_SIG
        && embedded_sig == VOLUME_SIG
        && embedded_len % 512 == 0
        && actual_size == HEADER_SIZE + embedded_len;

    if !wrapped {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let out_path = unique_scratch_path(scratch_dir, stem);
    debug!(
        "stripping DiskCopy wrapper: {} -> {}",
        path.display(),
        out_path.display()
    );

    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut out = fs::File::create(&out_path)?;
    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    out.flush()?;

    Ok(out_path)
}

/// Pick a scratch path that does not collide with an earlier normalized
/// image. Donors in different directories may share a file stem.
fn unique_scratch_path(scratch_dir: &Path, stem: &str) -> PathBuf {
    let mut out = scratch_dir.join(format!("{}.raw", stem));
    let mut n = 1u32;
    while out.exists() {
        out = scratch_dir.join(format!("{}-{}.raw", stem, n));
        n += 1;
    }
    out
}

/// Wrap a raw volume image in a DiskCopy 4.2 container. Only used by
/// tests, but kept here so the header layout lives in one place.
#[cfg(test)]
pub fn wrap_image(raw: &[u8]) -> Vec<u8> {
    assert_eq!(raw.len() % 512, 0);
    let mut out = vec![0u8; HEADER_SIZE as usize];
    out[LENGTH_OFFSET as usize..LENGTH_OFFSET as usize + 4]
        .copy_from_slice(&(raw.len() as u32).to_be_bytes());
    out[SIG_OFFSET as usize..SIG_OFFSET as usize + 2]
        .copy_from_slice(&DISKCOPY_SIG.to_be_bytes());
    out.extend_from_slice(raw);
    out
}
