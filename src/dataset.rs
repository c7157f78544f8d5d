//! Folder layout of an annotation job.
//!
//! ```text
//! <root>/
//!   group/    photos to annotate
//!   single/   one subdirectory per child
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

pub const GROUP_DIR: &str = "group";
pub const SINGLE_DIR: &str = "single";

/// Matched case-sensitively against the end of the file name.
pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpeg", ".jpg", ".png"];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Missing folder: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("No child folders in {}", .0.display())]
    EmptyRoster(PathBuf),

    #[error("No .jpeg/.jpg/.png images in {}", .0.display())]
    NoImages(PathBuf),

    #[error("Failed to list {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub child_id: u32,
    pub name: String,
}

/// Roster and image list derived from one root folder, fixed for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub root: PathBuf,
    pub children: Vec<Child>,
    /// canonical order, `image_id` is the 1-based position
    pub image_files: Vec<String>,
}

impl Dataset {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();

        let group = root.join(GROUP_DIR);
        let single = root.join(SINGLE_DIR);

        for dir in [&group, &single] {
            if !dir.is_dir() {
                return Err(DatasetError::MissingFolder(dir.clone()));
            }
        }

        let children = load_children(&single)?;
        if children.is_empty() {
            return Err(DatasetError::EmptyRoster(single));
        }

        let image_files = load_image_files(&group)?;
        if image_files.is_empty() {
            return Err(DatasetError::NoImages(group));
        }

        info!(
            "Opened {}: {} children, {} images",
            root.display(),
            children.len(),
            image_files.len()
        );

        Ok(Self {
            root,
            children,
            image_files,
        })
    }

    pub fn group_dir(&self) -> PathBuf {
        self.root.join(GROUP_DIR)
    }

    pub fn image_path(&self, index: usize) -> Option<PathBuf> {
        self.image_files.get(index).map(|f| self.group_dir().join(f))
    }

    pub fn image_count(&self) -> usize {
        self.image_files.len()
    }

    pub fn child_name(&self, child_id: u32) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.child_id == child_id)
            .map(|c| c.name.as_str())
    }

    /// `(image_id, file_name)` pairs, the join key used by annotations.
    pub fn numbered_images(&self) -> impl Iterator<Item = (u32, &str)> {
        self.image_files
            .iter()
            .enumerate()
            .map(|(i, f)| (i as u32 + 1, f.as_str()))
    }
}

fn read_dir_names(dir: &Path) -> Result<Vec<(String, bool)>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut out = vec![];
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 entry in {}", dir.display());
            continue;
        };
        let is_dir = entry.path().is_dir();
        out.push((name, is_dir));
    }
    Ok(out)
}

/// Subdirectories of `single/`, numbered 1..N by name.
pub fn load_children(dir: &Path) -> Result<Vec<Child>, DatasetError> {
    let mut names = read_dir_names(dir)?
        .into_iter()
        .filter_map(|(name, is_dir)| is_dir.then_some(name))
        .collect::<Vec<_>>();
    names.sort();

    let children = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Child {
            child_id: i as u32 + 1,
            name,
        })
        .collect::<Vec<_>>();

    debug!("Loaded {} children from {}", children.len(), dir.display());
    Ok(children)
}

pub fn is_supported_image(file_name: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
}

/// The one ordering used both for display and for numbering `image_id`.
pub fn canonical_image_order<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out = names
        .into_iter()
        .map(Into::into)
        .filter(|n: &String| is_supported_image(n))
        .collect::<Vec<_>>();
    out.sort();
    out
}

pub fn load_image_files(dir: &Path) -> Result<Vec<String>, DatasetError> {
    let names = read_dir_names(dir)?
        .into_iter()
        .filter_map(|(name, is_dir)| (!is_dir).then_some(name));
    let files = canonical_image_order(names);

    debug!("Loaded {} images from {}", files.len(), dir.display());
    Ok(files)
}
