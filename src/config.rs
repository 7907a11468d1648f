use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use clap::Parser;

/// Files served in place of a listing when present in a directory.
pub const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Appended to an upload's file name until the name is free.
pub const COLLISION_SUFFIX: char = '_';

// --- Command line ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Share a directory over HTTP and accept uploads into it")]
pub struct Args {
    /// The root directory to serve files from
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub root_dir: PathBuf,

    /// Specify alternate bind address
    #[arg(short, long, value_name = "ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Specify alternate port
    #[arg(value_name = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Report failed uploads with a 4xx/5xx status instead of 200
    #[arg(long)]
    pub strict_upload_status: bool,
}

impl Args {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Immutable settings shared by every request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute, canonical served root.
    pub root: PathBuf,
    pub index_files: Vec<String>,
    pub collision_suffix: char,
    pub strict_upload_status: bool,
}

impl Config {
    /// Builds a config for an already canonical root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_files: INDEX_FILES.iter().map(|s| s.to_string()).collect(),
            collision_suffix: COLLISION_SUFFIX,
            strict_upload_status: false,
        }
    }

    pub fn with_strict_upload_status(mut self, strict: bool) -> Self {
        self.strict_upload_status = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
