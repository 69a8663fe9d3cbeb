//! Mini vMac launcher CLI.
//!
//! Usage:
//!   mvm --system-image sys608.dsk --rom vMac.ROM --autoquit-image autoquit.dsk app.zip
//!   mvm --system-image sys7.dsk --rom MacII.ROM --autquit7-image autquit7.dsk app.bin
//!
//! Assembles a bootable volume around the application, runs the emulator
//! against it, and streams the application's output file to stdout.

use std::error::Error;
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::warn;

use mvm_core::{
    assemble, collect_output, run_emulator, stage_runtime, AppPackage, AssembleOptions, ImageStore,
};

/// Run a classic Mac application under Mini vMac
#[derive(Parser, Debug)]
#[command(name = "mvm")]
#[command(about = "Assemble a boot volume, run Mini vMac, collect output")]
struct Args {
    /// Application to run: a ZIP package or a raw data-fork file
    app: PathBuf,

    /// Resource fork sidecar for a raw application file
    #[arg(long)]
    rsrc: Option<PathBuf>,

    /// Donor system disk image (raw or DiskCopy 4.2)
    #[arg(long)]
    system_image: PathBuf,

    /// Mini vMac ROM file
    #[arg(long)]
    rom: PathBuf,

    /// Mini vMac executable or application bundle
    #[arg(long, default_value = "./minivmac")]
    emulator: PathBuf,

    /// AutoQuit disk image, for pre-System 7 donors
    #[arg(long)]
    autoquit_image: Option<PathBuf>,

    /// AutQuit7 disk image, for System 7 donors
    #[arg(long)]
    autquit7_image: Option<PathBuf>,

    /// Emulator timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

/// Session working directory, removed on drop.
struct SessionDir {
    path: PathBuf,
}

impl SessionDir {
    fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("mvm-session-{}", std::process::id()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }
}

impl Drop for SessionDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("could not remove {}: {}", self.path.display(), e);
        }
    }
}

fn load_app(path: &Path, rsrc: Option<&Path>) -> Result<AppPackage, Box<dyn Error>> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if is_zip {
        let file = fs::File::open(path)?;
        return Ok(AppPackage::from_zip(BufReader::new(file))?);
    }

    // Raw data fork with an optional sidecar; an unnamed sidecar is
    // picked up from next to the data file.
    let sidecar = path.with_extension("rsrc");
    let rsrc = match rsrc {
        Some(p) => Some(p.to_path_buf()),
        None if sidecar.exists() => Some(sidecar),
        None => None,
    };
    Ok(AppPackage::from_paths(path, rsrc.as_deref())?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let session = SessionDir::create()?;
    let app = load_app(&args.app, args.rsrc.as_deref())?;

    let store = ImageStore::new();
    let mut opts = AssembleOptions::new(
        args.system_image.clone(),
        app,
        session.path.clone(),
    );
    opts.autoquit_image = args.autoquit_image.clone();
    opts.autquit7_image = args.autquit7_image.clone();

    let assembled = assemble(&store, &opts)?;
    let exe = stage_runtime(&args.rom, &args.emulator, &session.path)?;

    let timeout = args.timeout.map(Duration::from_secs);
    let work_dir = session.path.clone();
    let ok =
        tokio::task::spawn_blocking(move || run_emulator(&exe, &work_dir, timeout)).await??;
    if !ok {
        eprintln!("emulator exited with failure; collecting output anyway");
    }

    let bytes = collect_output(&store, &assembled.image_path)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;

    Ok(())
}
