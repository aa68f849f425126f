//! Copy modes and per-run options.

use std::path::PathBuf;

use airlift_core::{MirrorError, Result};

/// Images dispatched concurrently within one batch.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Operating mode of a mirroring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Upstream registry to local content store.
    MirrorToDisk,
    /// Local content store to destination registry.
    DiskToMirror,
    /// Upstream registry straight to destination registry.
    MirrorToMirror,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::MirrorToDisk => "mirrorToDisk",
            Mode::DiskToMirror => "diskToMirror",
            Mode::MirrorToMirror => "mirrorToMirror",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mirrorToDisk" => Ok(Mode::MirrorToDisk),
            "diskToMirror" => Ok(Mode::DiskToMirror),
            "mirrorToMirror" => Ok(Mode::MirrorToMirror),
            _ => Err(MirrorError::Config(format!("unknown mode: '{s}'"))),
        }
    }
}

/// What the dispatch machinery does with each image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Function {
    #[default]
    Copy,
    Delete,
}

impl Function {
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Copy => "copy",
            Function::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options governing one worker invocation.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub mode: Mode,
    pub function: Function,

    /// Host:port of the local content store registry.
    pub local_store_fqdn: String,

    /// Destination registry base (`docker://host/base`) for runs that push
    /// to a destination.
    pub destination: String,

    /// Working directory holding staged content such as the update graph
    /// layout.
    pub workspace_dir: PathBuf,

    /// Tag applied to release content at the destination, for example
    /// `4.16.0-x86_64`. Falls back to each image's own tag when empty.
    pub release_tag: String,

    pub batch_size: usize,

    /// UPDATE_URL_OVERRIDE, injected by the caller. Never read from the
    /// process environment here.
    pub update_url_override: Option<String>,

    pub src_tls_verify: bool,
    pub dest_tls_verify: bool,
}

impl CopyOptions {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            function: Function::Copy,
            local_store_fqdn: "localhost:55000".to_string(),
            destination: String::new(),
            workspace_dir: PathBuf::from("working-dir"),
            release_tag: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            update_url_override: None,
            src_tls_verify: true,
            dest_tls_verify: true,
        }
    }
}
