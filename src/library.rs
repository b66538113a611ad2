// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! File-type taxonomy and the per-title file index.
//!
//! Every title in the library can carry images in several roles (cover,
//! splash page, censorship fix, ...). The index discovers the files for a
//! title on first access, tags edited variants, and caches the result for
//! the rest of the run. The underlying lookups go through [`FileResolver`]
//! so tests and alternative storage layouts can swap them out.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Image role within a title. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    Cover,
    Splash,
    Silhouette,
    CensorshipFix,
    Favourite,
    OriginalArt,
    NonTitle,
    Inset,
}

impl FileType {
    pub const ALL: [FileType; 8] = [
        FileType::Cover,
        FileType::Splash,
        FileType::Silhouette,
        FileType::CensorshipFix,
        FileType::Favourite,
        FileType::OriginalArt,
        FileType::NonTitle,
        FileType::Inset,
    ];

    /// Directory name for this role under the library root.
    pub fn dir_name(self) -> &'static str {
        match self {
            FileType::Cover => "covers",
            FileType::Splash => "splashes",
            FileType::Silhouette => "silhouettes",
            FileType::CensorshipFix => "censorship-fixes",
            FileType::Favourite => "favourites",
            FileType::OriginalArt => "original-art",
            FileType::NonTitle => "non-titles",
            FileType::Inset => "insets",
        }
    }

    /// Short label for the status line.
    pub fn label(self) -> &'static str {
        match self {
            FileType::Cover => "cover",
            FileType::Splash => "splash",
            FileType::Silhouette => "silhouette",
            FileType::CensorshipFix => "censorship-fix",
            FileType::Favourite => "favourite",
            FileType::OriginalArt => "original-art",
            FileType::NonTitle => "non-title",
            FileType::Inset => "inset",
        }
    }
}

/// One discoverable image for a title. Immutable once discovered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub file_type: FileType,
    pub is_edited: bool,
}

/// Path lookup for one file role.
///
/// `edited_only = true` returns only manually touched-up variants; `false`
/// returns every file including those variants. A missing title yields an
/// empty list, not an error.
pub trait FileResolver {
    fn resolve(&self, title_id: &str, edited_only: bool) -> Result<Vec<PathBuf>>;
}

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Filesystem-backed resolver over the standard library layout:
/// `<library>/<type-dir>/<title-id>/*.png` with edited variants in an
/// `edited/` subdirectory.
pub struct DirResolver {
    dir: PathBuf,
}

impl DirResolver {
    pub fn new(library_root: &Path, file_type: FileType) -> Self {
        Self {
            dir: library_root.join(file_type.dir_name()),
        }
    }
}

impl FileResolver for DirResolver {
    fn resolve(&self, title_id: &str, edited_only: bool) -> Result<Vec<PathBuf>> {
        let base = self.dir.join(title_id);
        let mut out = Vec::new();
        if !edited_only {
            list_images(&base, &mut out)?;
        }
        list_images(&base.join("edited"), &mut out)?;
        // Sorted so index contents are stable across runs on the same tree.
        out.sort();
        Ok(out)
    }
}

fn list_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Memoized `title_id -> FileType -> candidate files` mapping.
///
/// A title is discovered on first access and never re-scanned for the rest
/// of the run; the library is treated as immutable while the app is open.
pub struct TitleFileIndex {
    resolvers: HashMap<FileType, Box<dyn FileResolver>>,
    cache: HashMap<String, HashMap<FileType, Vec<CandidateFile>>>,
}

impl TitleFileIndex {
    pub fn new(resolvers: HashMap<FileType, Box<dyn FileResolver>>) -> Self {
        Self {
            resolvers,
            cache: HashMap::new(),
        }
    }

    /// Index backed by `DirResolver`s for every role under `library_root`.
    pub fn for_library(library_root: &Path) -> Self {
        let mut resolvers: HashMap<FileType, Box<dyn FileResolver>> = HashMap::new();
        for file_type in FileType::ALL {
            resolvers.insert(file_type, Box::new(DirResolver::new(library_root, file_type)));
        }
        Self::new(resolvers)
    }

    /// Candidate files for `title_id`, grouped by role.
    ///
    /// Resolver failures propagate and leave the title unpopulated; there is
    /// no partial cache entry to clean up.
    pub fn files(&mut self, title_id: &str) -> Result<&HashMap<FileType, Vec<CandidateFile>>> {
        if !self.cache.contains_key(title_id) {
            let discovered = self.discover(title_id)?;
            log::debug!(
                "indexed {}: {} file(s)",
                title_id,
                discovered.values().map(Vec::len).sum::<usize>()
            );
            self.cache.insert(title_id.to_string(), discovered);
        }
        Ok(&self.cache[title_id])
    }

    fn discover(&self, title_id: &str) -> Result<HashMap<FileType, Vec<CandidateFile>>> {
        let mut by_type = HashMap::with_capacity(FileType::ALL.len());
        for file_type in FileType::ALL {
            let Some(resolver) = self.resolvers.get(&file_type) else {
                by_type.insert(file_type, Vec::new());
                continue;
            };
            let edited: HashSet<PathBuf> = resolver.resolve(title_id, true)?.into_iter().collect();
            let mut paths = resolver.resolve(title_id, false)?;
            if file_type == FileType::Cover {
                // A title has at most one cover.
                paths.truncate(1);
            }
            let files = paths
                .into_iter()
                .map(|path| CandidateFile {
                    is_edited: edited.contains(&path),
                    path,
                    file_type,
                })
                .collect();
            by_type.insert(file_type, files);
        }
        Ok(by_type)
    }
}
