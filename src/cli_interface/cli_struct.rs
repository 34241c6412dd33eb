use byte_unit::Byte;
use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum VfsCli {
    /// create a new file system image
    Mkfs(MkfsArgs),
    /// list directories inside an image
    Ls(LsArgs),
    /// create directories inside an image
    Mkdir(MkdirArgs),
    /// move or rename a path inside an image
    Mv(MvArgs),
    /// remove files or empty directories from an image
    Rm(RmArgs),
    /// copy files into, out of, or inside an image
    Cp(CpArgs),
    /// show inode and block usage of an image
    Df(DfArgs),
}

/// parse human readable sizes like `16MiB` or `4096`
fn parse_size(s: &str) -> Result<u64, String> {
    let bytes = Byte::from_str(s).map_err(|e| e.to_string())?.get_bytes();
    u64::try_from(bytes).map_err(|_| format!("{s} is too large"))
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "make a new file system")]
pub struct MkfsArgs {
    /// the size of the file system, such as `64MiB`
    #[clap(short, long, value_parser = parse_size)]
    pub size: u64,
    /// the path of the file system image file
    pub image_file_path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct LsArgs {
    /// the path of the file system image file
    pub image_file_path: String,
    /// directories to list
    #[clap(default_value = "/")]
    pub paths: Vec<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MkdirArgs {
    /// the path of the file system image file
    pub image_file_path: String,
    /// directories to create, parents first
    #[clap(required = true)]
    pub paths: Vec<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct MvArgs {
    /// the path of the file system image file
    pub image_file_path: String,
    pub source: String,
    pub destination: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct RmArgs {
    /// the path of the file system image file
    pub image_file_path: String,
    #[clap(required = true)]
    pub paths: Vec<String>,
}

/// which side of the image a copy reads from and writes to
#[derive(clap::Args, Debug, PartialEq)]
#[group(required = true, multiple = false)]
pub struct CopyDirection {
    /// upload host files into the image
    #[clap(short, long)]
    pub up: bool,
    /// download files from the image to the host
    #[clap(short, long)]
    pub down: bool,
    /// copy files inside the image
    #[clap(short, long)]
    pub internal: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct CpArgs {
    /// the path of the file system image file
    pub image_file_path: String,
    #[command(flatten)]
    pub direction: CopyDirection,
    /// files to copy
    #[clap(required = true)]
    pub sources: Vec<String>,
    /// destination file, or directory when copying several files
    pub destination: String,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct DfArgs {
    /// the path of the file system image file
    pub image_file_path: String,
}

/// test the `VfsCli` struct
/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = VfsCli::parse_from(["vfs", "mkfs", "-s", "30", "test"]);
        assert_eq!(
            args,
            VfsCli::Mkfs(MkfsArgs {
                size: 30,
                image_file_path: "test".to_string(),
            })
        );
    }
    /// test long parameter form with a unit
    #[test]
    fn test_long_parameter_form() {
        let args = VfsCli::parse_from(["vfs", "mkfs", "--size", "16MiB", "test"]);
        assert_eq!(
            args,
            VfsCli::Mkfs(MkfsArgs {
                size: 16 * 1024 * 1024,
                image_file_path: "test".to_string(),
            })
        );
    }

    #[test]
    fn test_bad_size() {
        assert!(VfsCli::try_parse_from(["vfs", "mkfs", "--size", "lots", "test"]).is_err());
        assert!(VfsCli::try_parse_from(["vfs", "mkfs", "test"]).is_err());
    }
}
