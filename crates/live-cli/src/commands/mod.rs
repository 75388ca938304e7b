//! CLI 명령 구현.

pub mod directory;
pub mod run;

pub use directory::{load_directory, print_directory};
pub use run::{run, RunOptions};
