//! command line interface of the `vfs` tool
mod cli_struct;
pub use cli_struct::*;
