//! Wildcard file sets
//!
//! A [`FileSet`] such as `Release\*.dll` is expanded at compile time into
//! [`File`] entities of the directory that owns it. Recursive sets mirror the
//! source subdirectories as nested [`Dir`]s.

use crate::attributes::Entity;
use crate::error::{Result, WixError};
use crate::model::dir::{Dir, File};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// Files matched by a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSet {
    /// `dir\mask`, relative to the project source directory unless rooted
    pub pattern: String,

    /// File name patterns to leave out
    pub exclude: Vec<String>,

    /// Descend into subdirectories
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Features and attributes applied to every produced file
    #[serde(flatten)]
    pub entity: Entity,
}

impl Default for FileSet {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            exclude: Vec::new(),
            recursive: true,
            entity: Entity::default(),
        }
    }
}

impl FileSet {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    /// Matching files of the source directory only
    pub fn flat(pattern: impl Into<String>) -> Self {
        Self {
            recursive: false,
            ..Self::new(pattern)
        }
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.entity.features.push(feature.into());
        self
    }

    /// Source directory and file mask
    pub fn split(&self) -> (String, String) {
        let normalized = self.pattern.replace('\\', "/");
        match normalized.rsplit_once('/') {
            Some((dir, mask)) => (dir.to_string(), normalize_mask(mask)),
            None => (String::new(), normalize_mask(&normalized)),
        }
    }
}

/// `*.*` matches every file, extension or not
fn normalize_mask(mask: &str) -> String {
    if mask.is_empty() || mask == "*.*" {
        "*".to_string()
    } else {
        mask.to_string()
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expands file sets into files and directories
#[derive(Debug, Clone)]
pub struct WildcardResolver {
    base_dir: PathBuf,
    ignore_empty_directories: bool,
}

impl WildcardResolver {
    pub fn new(base_dir: impl Into<PathBuf>, ignore_empty_directories: bool) -> Self {
        Self {
            base_dir: base_dir.into(),
            ignore_empty_directories,
        }
    }

    /// Resolve every file set of `dir` and its subdirectories, in place
    pub fn resolve(&self, dir: &mut Dir) -> Result<()> {
        for sub in &mut dir.dirs {
            self.resolve(sub)?;
        }

        for set in std::mem::take(&mut dir.file_sets) {
            let (source, _) = set.split();
            let root = if Path::new(&source).is_absolute() {
                PathBuf::from(&source)
            } else {
                self.base_dir.join(&source)
            };

            if !root.is_dir() {
                return Err(WixError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Wildcard source directory not found: {}", root.display()),
                )));
            }

            log::debug!("Resolving '{}' in {}", set.pattern, root.display());
            self.collect(&set, &root, dir)?;
        }
        Ok(())
    }

    fn collect(&self, set: &FileSet, source: &Path, target: &mut Dir) -> Result<()> {
        let (_, mask) = set.split();
        let mask = Pattern::new(&mask)?;
        let excludes = set
            .exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let search = format!("{}/*", Pattern::escape(&source.to_string_lossy()));
        let mut files: Vec<PathBuf> = glob::glob_with(&search, MATCH_OPTIONS)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !mask.matches_with(name, MATCH_OPTIONS)
                || excludes.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
            {
                continue;
            }

            let mut file = File::new(self.source_name(&path));
            file.entity.features = set.entity.features.clone();
            file.entity.attributes = set.entity.attributes.clone();
            file.entity.attributes_definition = set.entity.attributes_definition.clone();
            target.files.push(file);
        }

        if !set.recursive {
            return Ok(());
        }

        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(source)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        subdirs.sort();

        for sub_path in subdirs {
            let Some(name) = sub_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let existing = target
                .dirs
                .iter()
                .position(|d| d.entity.name.eq_ignore_ascii_case(name));

            let mut sub = match existing {
                Some(index) => target.dirs.remove(index),
                None => Dir::new(name),
            };
            for feature in &set.entity.features {
                if !sub.entity.features.contains(feature) {
                    sub.entity.features.push(feature.clone());
                }
            }

            self.collect(set, &sub_path, &mut sub)?;

            if existing.is_none() && self.ignore_empty_directories && sub.is_empty() {
                log::debug!("Skipping empty directory {}", sub_path.display());
                continue;
            }

            match existing {
                Some(index) => target.dirs.insert(index, sub),
                None => target.dirs.push(sub),
            }
        }
        Ok(())
    }

    /// Path relative to the base directory with `\` separators, or the full
    /// path when the file lies outside it
    fn source_name(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base_dir) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("\\"),
            Err(_) => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let temp = TempDir::new().unwrap();
        let release = temp.path().join("Release");
        fs::create_dir_all(release.join("docs")).unwrap();
        fs::create_dir_all(release.join("empty")).unwrap();
        fs::write(release.join("app.exe"), "").unwrap();
        fs::write(release.join("app.pdb"), "").unwrap();
        fs::write(release.join("LICENSE"), "").unwrap();
        fs::write(release.join("docs").join("readme.txt"), "").unwrap();
        temp
    }

    fn file_names(dir: &Dir) -> Vec<&str> {
        dir.files.iter().map(|f| f.entity.name.as_str()).collect()
    }

    #[test]
    fn test_split() {
        assert_eq!(
            FileSet::new(r"Release\*.*").split(),
            ("Release".to_string(), "*".to_string())
        );
        assert_eq!(
            FileSet::new("*.dll").split(),
            (String::new(), "*.dll".to_string())
        );
    }

    #[test]
    fn test_resolve_recursive() {
        let temp = setup();
        let mut dir = Dir::new("INSTALLDIR").file_set(
            FileSet::new(r"Release\*.*")
                .exclude("*.pdb")
                .feature("Binaries"),
        );

        WildcardResolver::new(temp.path(), false)
            .resolve(&mut dir)
            .unwrap();

        assert!(dir.file_sets.is_empty());
        assert_eq!(
            file_names(&dir),
            vec![r"Release\LICENSE", r"Release\app.exe"]
        );
        assert_eq!(dir.files[0].entity.features, vec!["Binaries".to_string()]);

        let names: Vec<&str> = dir.dirs.iter().map(|d| d.entity.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "empty"]);
        assert_eq!(file_names(&dir.dirs[0]), vec![r"Release\docs\readme.txt"]);
    }

    #[test]
    fn test_ignore_empty_directories() {
        let temp = setup();
        let mut dir = Dir::new("INSTALLDIR").file_set(FileSet::new(r"Release\*.txt"));

        WildcardResolver::new(temp.path(), true)
            .resolve(&mut dir)
            .unwrap();

        assert!(dir.files.is_empty());
        assert_eq!(dir.dirs.len(), 1);
        assert_eq!(dir.dirs[0].entity.name, "docs");
    }

    #[test]
    fn test_flat_set_merges_into_existing_dir() {
        let temp = setup();
        let mut dir = Dir::new("INSTALLDIR")
            .dir(Dir::new("Docs").file_set(FileSet::flat(r"Release\docs\*.txt")));

        WildcardResolver::new(temp.path(), false)
            .resolve(&mut dir)
            .unwrap();

        assert_eq!(dir.dirs.len(), 1);
        assert_eq!(file_names(&dir.dirs[0]), vec![r"Release\docs\readme.txt"]);
    }

    #[test]
    fn test_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let mut dir = Dir::new("INSTALLDIR").file_set(FileSet::new(r"Missing\*.*"));
        let result = WildcardResolver::new(temp.path(), false).resolve(&mut dir);
        assert!(result.is_err());
    }
}
