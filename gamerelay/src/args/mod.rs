use std::{net::SocketAddr, path::PathBuf, time::Duration};

use gamerelay::config::DEFAULT_SESSION_TIMEOUT;
use gamerelay_proto::version::GameVersion;

mod listen;
mod parser;

pub use listen::*;
pub use parser::*;

/// Gets a small string with this program's name and version.
pub fn get_version_string() -> String {
    format!(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), " ({} {})"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Gets a string with this program's help documentation.
pub fn get_help_string() -> &'static str {
    concat!(
        "Usage: relay [options] --listen PORT:VERSION[:DESTINATION]...\n",
        "\n",
        "Options:\n",
        "  -l, --listen PORT:VERSION[:DEST]  Accept clients of VERSION (dc, pc, gc, bb) on PORT. New\n",
        "                                    sessions connect to DEST, or to the address the client\n",
        "                                    asks for when DEST is omitted.\n",
        "  -t, --timeout SECONDS             How long a session waits for a reconnection before it's\n",
        "                                    closed (default: 300).\n",
        "      --save-files DIR              Save files sent to clients into DIR.\n",
        "  -v, --verbose                     Log more.\n",
        "  -s, --silent                      Only log errors.\n",
        "  -h, --help                        Print this help and exit.\n",
        "  -V, --version                     Print the version and exit.\n",
        "\n",
        "The RUST_LOG environment variable overrides --verbose and --silent."
    )
}

/// The result of parsing the program's arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentsRequest {
    /// Print the help menu to stdout and exit.
    Help,

    /// Print this program's version to stdout and exit.
    Version,

    /// Run with the provided arguments.
    Run(StartupArguments),
}

/// Specifies the information on how the program should run.
#[derive(Debug, PartialEq)]
pub struct StartupArguments {
    /// Whether to print additional information to stdout.
    pub verbose: bool,

    /// Whether to not print any information to stdout.
    pub silent: bool,

    /// The ports to accept clients on.
    pub listeners: Vec<ListenSpec>,

    pub session_timeout: Duration,

    pub save_files_dir: Option<PathBuf>,
}

impl StartupArguments {
    pub fn new(verbose: bool, silent: bool, listeners: Vec<ListenSpec>) -> Self {
        Self {
            verbose,
            silent,
            listeners,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            save_files_dir: None,
        }
    }
}

/// One `--listen` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSpec {
    pub port: u16,
    pub version: GameVersion,
    pub default_destination: Option<SocketAddr>,
}

impl ListenSpec {
    pub const fn new(port: u16, version: GameVersion, default_destination: Option<SocketAddr>) -> Self {
        Self {
            port,
            version,
            default_destination,
        }
    }
}
