use std::fmt;

use anyhow::Result;
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

pub mod inode;
pub mod transcript;

pub use inode::{Inode, InodeId, Tree, TreeError};
pub use transcript::{parse_transcript, CdTarget, Filesystem, Interpreter, Line, TranscriptError};

pub const TOTAL_CAPACITY: u64 = 70000000;
pub const SPACE_NEEDED: u64 = 30000000;
pub const SMALL_DIR_LIMIT: u64 = 100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub capacity: u64,
    pub required: u64,
    pub limit: u64,
    pub list_dirs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capacity: TOTAL_CAPACITY,
            required: SPACE_NEEDED,
            limit: SMALL_DIR_LIMIT,
            list_dirs: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Nothing to delete: {free} free already covers the {required} required")]
    NothingToDelete { free: u64, required: u64 },

    #[error("No directory is big enough to free {to_delete}")]
    NoCandidate { to_delete: u64 },
}

/// Sum of the sizes of all directories no bigger than `limit`. Nested
/// directories are counted once each, so files may contribute several times.
pub fn total_small_dirs(fs: &Filesystem, limit: u64) -> u64 {
    fs.dir_sizes()
        .filter_map(|(_, size)| (size <= limit).then_some(size))
        .sum()
}

pub fn space_to_free(fs: &Filesystem, capacity: u64, required: u64) -> Result<u64, QueryError> {
    let used = fs.used_space();

    if let Some(free) = capacity.checked_sub(used) {
        if free >= required {
            return Err(QueryError::NothingToDelete { free, required });
        }
    }

    let to_delete = used.saturating_add(required) - capacity;
    debug!(used, capacity, required, to_delete, "disk usage");

    Ok(to_delete)
}

pub fn smallest_dir_to_delete(fs: &Filesystem, to_delete: u64) -> Result<u64, QueryError> {
    fs.dir_sizes()
        .map(|(_, size)| size)
        .filter(|&size| size >= to_delete)
        .min()
        .ok_or(QueryError::NoCandidate { to_delete })
}

pub fn dir_listing(fs: &Filesystem) -> String {
    fs.dir_sizes()
        .map(|(path, size)| format!("{path} - {size}"))
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub tree: String,
    pub dir_listing: Option<String>,
    pub part1: u64,
    pub part2: u64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)?;
        if let Some(listing) = &self.dir_listing {
            writeln!(f, "{listing}")?;
        }
        writeln!(f, "part 1 result: {}", self.part1)?;
        write!(f, "part 2 result: {}", self.part2)
    }
}

pub fn analyze(input: impl Iterator<Item = impl Into<String>>, settings: &Settings) -> Result<Report> {
    let fs = parse_transcript(input)?;
    let to_delete = space_to_free(&fs, settings.capacity, settings.required)?;

    Ok(Report {
        tree: fs.tree().to_string(),
        dir_listing: settings.list_dirs.then(|| dir_listing(&fs)),
        part1: total_small_dirs(&fs, settings.limit),
        part2: smallest_dir_to_delete(&fs, to_delete)?,
    })
}

pub fn size_smallest(input: impl Iterator<Item = impl Into<String>>, biggest: u64) -> Result<u64> {
    let fs = parse_transcript(input)?;

    Ok(total_small_dirs(&fs, biggest))
}

pub fn size_to_delete(
    input: impl Iterator<Item = impl Into<String>>,
    total: u64,
    needed: u64,
) -> Result<u64> {
    let fs = parse_transcript(input)?;
    let to_delete = space_to_free(&fs, total, needed)?;

    Ok(smallest_dir_to_delete(&fs, to_delete)?)
}
