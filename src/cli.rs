use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::media::Facing;

#[derive(Parser, Debug)]
#[command(name = "qrshield", version, about = "Scan QR codes and screen what they carry")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, global = true, help = "Settings file (defaults to the user config dir)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Never prompt for result actions")]
    pub no_interactive: bool,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "More logging (-v debug, -vv trace)")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan with the camera until a QR code is found
    Scan {
        #[arg(long, help = "Camera device index (overrides settings)")]
        device: Option<u32>,
        #[arg(long, value_enum, help = "Preferred camera direction")]
        facing: Option<FacingArg>,
        #[arg(long, help = "Write the cropped symbol to this PNG file")]
        save_snapshot: Option<PathBuf>,
    },
    /// Scan still image files
    Image {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Write the cropped symbol to this PNG file")]
        save_snapshot: Option<PathBuf>,
    },
    /// Classify and screen text without scanning
    Check { text: String },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Write default settings to the settings file
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the settings file location
    Path,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FacingArg {
    User,
    Environment,
}

impl From<FacingArg> for Facing {
    fn from(value: FacingArg) -> Self {
        match value {
            FacingArg::User => Facing::User,
            FacingArg::Environment => Facing::Environment,
        }
    }
}
