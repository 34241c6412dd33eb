pub mod cli_interface;
pub mod copy;
mod fs;
pub mod image_file;
pub mod mkfs;
pub mod utils;
pub use fs::*;
