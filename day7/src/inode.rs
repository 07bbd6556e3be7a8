use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inode {
    File { name: String, size: u64 },
    Dir { name: String, contents: Vec<InodeId> },
}

impl Inode {
    pub fn new_dir(name: impl Into<String>) -> Self {
        Self::Dir {
            name: name.into(),
            contents: vec![],
        }
    }

    pub fn new_file(name: impl Into<String>, size: u64) -> Self {
        Self::File {
            name: name.into(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Inode::File { name, .. } | Inode::Dir { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Inode::Dir { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Unable to go up from root directory")]
    CdAboveRoot,

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{dir} already contains an entry named {name}")]
    DuplicateName { dir: String, name: String },

    #[error("Directory name {0:?} must be a single path segment")]
    InvalidName(String),

    /// The working directory is missing from the index. `cd` registers every
    /// directory before entering it, so a consistent interpreter never sees this.
    #[error("No directory registered at {0}")]
    UnknownDirectory(String),

    #[error("Adding {name} (size={size}) overflows the total size of /")]
    SizeOverflow { name: String, size: u64 },
}

/// Arena of inodes. The root directory `/` always lives at index 0 and every
/// other inode is reachable from it.
#[derive(Debug, Clone)]
pub struct Tree {
    inodes: Vec<Inode>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            inodes: vec![Inode::new_dir("/")],
        }
    }

    pub fn root(&self) -> InodeId {
        InodeId(0)
    }

    pub fn get(&self, id: InodeId) -> &Inode {
        &self.inodes[id.0]
    }

    /// Recomputed on every call; directories do not cache their totals.
    /// `insert` keeps the total of `/` within `u64`, so no sum here overflows.
    pub fn size(&self, id: InodeId) -> u64 {
        match self.get(id) {
            Inode::File { size, .. } => *size,
            Inode::Dir { contents, .. } => contents.iter().map(|&c| self.size(c)).sum(),
        }
    }

    pub fn child(&self, dir: InodeId, name: &str) -> Option<InodeId> {
        match self.get(dir) {
            Inode::Dir { contents, .. } => contents
                .iter()
                .copied()
                .find(|&c| self.get(c).name() == name),
            Inode::File { .. } => None,
        }
    }

    pub fn contains(&self, dir: InodeId, name: &str) -> bool {
        self.child(dir, name).is_some()
    }

    pub fn insert(&mut self, dir: InodeId, inode: Inode) -> Result<InodeId, TreeError> {
        let dir_name = self.get(dir).name().to_string();
        if !self.get(dir).is_dir() {
            return Err(TreeError::NotADirectory(dir_name));
        }
        if self.contains(dir, inode.name()) {
            return Err(TreeError::DuplicateName {
                dir: dir_name,
                name: inode.name().to_string(),
            });
        }
        if let Inode::File { name, size } = &inode {
            if self.size(self.root()).checked_add(*size).is_none() {
                return Err(TreeError::SizeOverflow {
                    name: name.clone(),
                    size: *size,
                });
            }
        }

        let id = InodeId(self.inodes.len());
        self.inodes.push(inode);
        if let Inode::Dir { contents, .. } = &mut self.inodes[dir.0] {
            contents.push(id);
        }

        Ok(id)
    }

    pub fn render(&self, id: InodeId, indent: usize) -> String {
        let mut s = String::new();
        self.render_into(&mut s, id, indent);
        s
    }

    fn render_into(&self, s: &mut String, id: InodeId, indent: usize) {
        let size = self.size(id);
        match self.get(id) {
            Inode::File { name, .. } => {
                s.push_str(&format!("{:indent$}{name} (file, size={size})\n", ""));
            }
            Inode::Dir { name, contents } => {
                s.push_str(&format!("{:indent$}{name} (dir, size={size})\n", ""));
                for &c in contents {
                    self.render_into(s, c, indent + 2);
                }
            }
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(self.root(), 0))
    }
}
