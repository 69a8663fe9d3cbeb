//! Running the emulator and collecting its output.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::LaunchResult;
use crate::volume::{Fork, MountMode, Volume, VolumeStore};

/// Name of the output file the emulated application writes into.
pub const OUTPUT_FILE: &str = "out";

/// How often to poll a child process when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the staged emulator with `work_dir` as its working directory and
/// no arguments. Returns whether it exited successfully; a timeout kills
/// the child and counts as failure. Spawn errors still surface as
/// errors, only the run outcome is a boolean.
pub fn run_emulator(exe: &Path, work_dir: &Path, timeout: Option<Duration>) -> LaunchResult<bool> {
    info!("running {}", exe.display());
    let mut child = Command::new(exe).current_dir(work_dir).spawn()?;

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let deadline = Instant::now() + limit;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    warn!("emulator timed out after {:?}, killing", limit);
                    child.kill()?;
                    child.wait()?;
                    return Ok(false);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    Ok(status.success())
}

/// Read the output file's data fork from an assembled volume. An absent
/// file is not an error — the application may not have run or written
/// anything — and yields empty output.
pub fn collect_output<S: VolumeStore>(store: &S, image_path: &Path) -> LaunchResult<Vec<u8>> {
    let vol = store.mount(image_path, MountMode::ReadOnly)?;
    let bytes = match vol.stat(OUTPUT_FILE) {
        None => Vec::new(),
        Some(_) => vol.read_fork(OUTPUT_FILE, Fork::Data)?,
    };
    vol.unmount()?;
    Ok(bytes)
}
