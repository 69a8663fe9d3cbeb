//! Mini vMac Launcher Core
//!
//! This crate assembles a bootable volume image for a classic Mac OS
//! guest, hands it to the Mini vMac emulator, and collects the output
//! the emulated application wrote back:
//! - DiskCopy wrapper normalization for donor images
//! - Boot block validation and legacy auto-quit patching
//! - System version probing via the `vers` resource
//! - Alias record construction for System 7 startup items
//! - Emulator runtime staging, run and output collection
//!
//! # Architecture
//!
//! The pipeline is generic over a volume provider:
//! - `Volume`/`VolumeStore` traits: dual-fork volume access
//! - `ImageStore`: flat-file provider shipped with the crate
//! - `ResourceFork`: typed, numbered resource codec
//! - `assemble`/`run_emulator`/`collect_output`: the three phases

pub mod alias;
pub mod assemble;
pub mod bootblock;
pub mod bundle;
pub mod diskcopy;
pub mod error;
pub mod package;
pub mod resource;
pub mod run;
pub mod version;
pub mod volume;

pub use alias::{make_alias, AliasRecord};
pub use assemble::{assemble, stage_runtime, AssembleOptions, AssembledVolume, QuitStrategy};
pub use bootblock::{write_boot_block, BootBlock};
pub use diskcopy::normalize_image;
pub use error::{LaunchError, LaunchResult};
pub use package::AppPackage;
pub use resource::ResourceFork;
pub use run::{collect_output, run_emulator};
pub use version::probe_system_version;
pub use volume::{
    Fork, FourCC, ImageStore, ImageVolume, MountMode, Mounted, Volume, VolumeStore,
};
