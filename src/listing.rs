use std::{
    fs::Metadata,
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified_at: Option<DateTime<Local>>,
    /// True for directories and for symlinks that resolve to one.
    pub leads_to_dir: bool,
}

impl DirectoryEntry {
    /// Name as shown to users, with a trailing `/` for anything that leads to a directory.
    pub fn display_name(&self) -> String {
        if self.leads_to_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Relative link target, percent-encoded.
    pub fn href(&self) -> String {
        let encoded = urlencoding::encode(&self.name);
        if self.leads_to_dir {
            format!("{encoded}/")
        } else {
            encoded.into_owned()
        }
    }
}

/// Children of a directory split in two groups, each in enumeration order.
#[derive(Debug, Default)]
pub struct Listing {
    /// Directories and symlinks.
    pub dirs: Vec<DirectoryEntry>,
    /// Everything else.
    pub files: Vec<DirectoryEntry>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("no permission to list directory {}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Lists the immediate children of `dir`, keeping only names that contain `filter`
/// (case-insensitive) when a non-empty filter is given.
pub async fn list(dir: &Path, filter: Option<&str>) -> Result<Listing, ListingError> {
    let unreadable = |source| ListingError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let needle = filter
        .filter(|f| !f.is_empty())
        .map(|f| f.to_lowercase());

    let mut entries = fs::read_dir(dir).await.map_err(unreadable)?;
    let mut listing = Listing::default();

    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(raw) => {
                warn!(
                    "Skipping entry with non-UTF8 filename {:?} in {}",
                    raw,
                    dir.display()
                );
                continue;
            }
        };

        if let Some(needle) = &needle {
            if !name.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }

        let entry_path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to get file type for {}: {}", entry_path.display(), e);
                continue;
            }
        };

        let (kind, metadata) = if file_type.is_symlink() {
            // Dangling links still get listed, described by the link itself.
            let metadata = match fs::metadata(&entry_path).await {
                Ok(m) => Ok(m),
                Err(_) => fs::symlink_metadata(&entry_path).await,
            };
            (EntryKind::Symlink, metadata)
        } else if file_type.is_dir() {
            (EntryKind::Directory, entry.metadata().await)
        } else {
            (EntryKind::File, entry.metadata().await)
        };

        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", entry_path.display(), e);
                continue;
            }
        };

        let item = to_entry(name, kind, &metadata);
        match kind {
            EntryKind::Directory | EntryKind::Symlink => listing.dirs.push(item),
            EntryKind::File => listing.files.push(item),
        }
    }

    debug!(
        dir = %dir.display(),
        dirs = listing.dirs.len(),
        files = listing.files.len(),
        "listed directory"
    );
    Ok(listing)
}

fn to_entry(name: String, kind: EntryKind, metadata: &Metadata) -> DirectoryEntry {
    DirectoryEntry {
        name,
        kind,
        size: metadata.len(),
        modified_at: metadata.modified().ok().map(DateTime::<Local>::from),
        leads_to_dir: metadata.is_dir(),
    }
}
