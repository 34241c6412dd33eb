use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    #[default]
    RegularFile,
    /// a directory
    Directory,
}
