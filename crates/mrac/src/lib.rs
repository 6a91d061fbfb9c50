//! MRA compiler for FPGA arcade cores
//!
//! This library compiles a declarative description of an arcade core's ROM
//! composition (a machine inventory plus a per-core TOML configuration) into
//! an MRA recipe document, and optionally executes that recipe against MAME
//! zip archives to produce the flat ROM binary.
//!
//! ## Architecture
//!
//! The compiler is organized into:
//! - **Machine** (`machine/`): the machine inventory records (ROM entries,
//!   devices, clone relations)
//! - **Config** (`config/`): the per-core configuration (region records,
//!   header rules, patches, blanks, splits)
//! - **Recipe** (`recipe/`): the recipe node tree and its XML writer
//! - **Layout** (`layout/`): the ROM layout engine (region resolution,
//!   sorting, interleaving, fractional packing, header synthesis)
//! - **Assemble** (`assemble/`): recipe execution against zip archives
//! - **Driver** (`driver/`): per-machine pipeline orchestration
//! - **Common** (`common/`): shared infrastructure (errors, hex helpers)

pub mod assemble;
pub mod common;
pub mod config;
pub mod driver;
pub mod layout;
pub mod machine;
pub mod recipe;

// Re-exports for convenience
pub use common::{BuildError, BuildResult};
pub use config::GlobalConfig;
pub use layout::{LayoutArgs, LayoutEngine, LayoutState};
pub use machine::{MachineRecord, MachineSet};
pub use recipe::{Element, RecipeNode};
