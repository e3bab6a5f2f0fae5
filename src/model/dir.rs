//! Directories, files and shortcuts

use crate::attributes::Entity;
use crate::env_consts::is_path_rooted;
use crate::generic::{CustomItems, GenericItem};
use crate::model::condition::Condition;
use crate::wildcard::FileSet;
use serde::{Deserialize, Serialize};

/// Properties shared by file and directory shortcuts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutOptions {
    pub arguments: String,
    pub working_directory: Option<String>,
    pub icon_file: Option<String>,
    pub icon_index: i32,
    pub advertise: bool,
    pub description: Option<String>,
    pub condition: Option<Condition>,
}

/// Shortcut to the file that owns it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileShortcut {
    #[serde(flatten)]
    pub entity: Entity,

    /// Directory path (`%Desktop%`) or id the shortcut is placed in.
    /// Empty places it next to the file.
    pub location: String,

    #[serde(flatten)]
    pub options: ShortcutOptions,
}

impl FileShortcut {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            location: location.into(),
            options: ShortcutOptions::default(),
        }
    }

    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.options.arguments = arguments.into();
        self
    }
}

/// Shortcut to an arbitrary target, owned by a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExeFileShortcut {
    #[serde(flatten)]
    pub entity: Entity,

    /// Target path, e.g. `[INSTALLDIR]app.exe` or `%INSTALLDIR%\app.exe`
    pub target: String,

    #[serde(flatten)]
    pub options: ShortcutOptions,
}

impl ExeFileShortcut {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            target: target.into(),
            options: ShortcutOptions::default(),
        }
    }

    pub fn arguments(mut self, arguments: impl Into<String>) -> Self {
        self.options.arguments = arguments.into();
        self
    }
}

/// File to install. `name` is the source path relative to the project's
/// source directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    #[serde(flatten)]
    pub entity: Entity,

    pub shortcuts: Vec<FileShortcut>,

    /// Condition of the file's component
    pub condition: Option<Condition>,

    /// Remove any existing copy before installing
    pub overwrite_on_install: bool,

    pub generic_items: Vec<GenericItem>,

    #[serde(skip)]
    pub custom_items: CustomItems,
}

impl File {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(source),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entity.id = Some(id.into());
        self
    }

    pub fn shortcut(mut self, shortcut: FileShortcut) -> Self {
        self.shortcuts.push(shortcut);
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.entity.features.push(feature.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn generic(mut self, item: GenericItem) -> Self {
        self.generic_items.push(item);
        self
    }
}

/// Directory to create on the target system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dir {
    #[serde(flatten)]
    pub entity: Entity,

    /// Marks the product installation directory
    pub is_install_dir: bool,

    pub files: Vec<File>,

    /// Wildcard file sets resolved at compile time
    pub file_sets: Vec<FileSet>,

    pub dirs: Vec<Dir>,

    pub shortcuts: Vec<ExeFileShortcut>,

    pub generic_items: Vec<GenericItem>,

    #[serde(skip)]
    pub custom_items: CustomItems,

    /// Levels of the split path below this directory
    #[serde(skip)]
    path_depth: usize,
}

impl Dir {
    /// Create a directory. A relative path such as `%ProgramFiles%\Acme\App`
    /// becomes a chain of nested directories; builder calls then apply to
    /// the deepest one.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let mut dir = Self {
            entity: Entity::named(path),
            ..Default::default()
        };
        dir.split_path();
        dir
    }

    /// Split a `A\B\C` name into nested directories, moving all content to
    /// the deepest one. Rooted paths are left alone.
    pub fn split_path(&mut self) {
        for sub in &mut self.dirs {
            sub.split_path();
        }

        if is_path_rooted(&self.entity.name) {
            return;
        }

        let segments: Vec<String> = self
            .entity
            .name
            .split(['\\', '/'])
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.len() < 2 {
            return;
        }

        let mut leaf = std::mem::take(self);
        leaf.entity.name = segments[segments.len() - 1].clone();

        let mut current = leaf;
        for name in segments[1..segments.len() - 1].iter().rev() {
            current = Dir {
                entity: Entity::named(name.clone()),
                dirs: vec![current],
                ..Default::default()
            };
        }

        self.entity.name = segments[0].clone();
        self.dirs = vec![current];
        self.path_depth = segments.len() - 1;
    }

    /// Leaf of the path this directory was created from. Subdirectories
    /// added later are never descended into.
    pub fn deepest_mut(&mut self) -> &mut Dir {
        let depth = self.path_depth;
        descend(self, depth)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.deepest_mut().entity.id = Some(id.into());
        self
    }

    pub fn install_dir(mut self) -> Self {
        self.deepest_mut().is_install_dir = true;
        self
    }

    pub fn file(mut self, file: File) -> Self {
        self.deepest_mut().files.push(file);
        self
    }

    pub fn file_set(mut self, set: FileSet) -> Self {
        self.deepest_mut().file_sets.push(set);
        self
    }

    pub fn dir(mut self, dir: Dir) -> Self {
        self.deepest_mut().dirs.push(dir);
        self
    }

    pub fn shortcut(mut self, shortcut: ExeFileShortcut) -> Self {
        self.deepest_mut().shortcuts.push(shortcut);
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.deepest_mut().entity.features.push(feature.into());
        self
    }

    pub fn generic(mut self, item: GenericItem) -> Self {
        self.deepest_mut().generic_items.push(item);
        self
    }

    /// Nothing to install in or below this directory
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.file_sets.is_empty()
            && self.shortcuts.is_empty()
            && self.dirs.is_empty()
            && self.generic_items.is_empty()
            && self.custom_items.is_empty()
    }

    /// Whether this directory itself holds installable items
    pub fn has_items(&self) -> bool {
        !self.files.is_empty()
            || !self.shortcuts.is_empty()
            || !self.generic_items.is_empty()
            || !self.custom_items.is_empty()
    }

    /// Whether the subtree installs any files
    pub fn has_files(&self) -> bool {
        !self.files.is_empty() || self.dirs.iter().any(Dir::has_files)
    }

    /// This directory and all subdirectories, depth-first
    pub fn all_dirs(&self) -> Vec<&Dir> {
        let mut result = vec![self];
        for sub in &self.dirs {
            result.extend(sub.all_dirs());
        }
        result
    }
}

fn descend(dir: &mut Dir, depth: usize) -> &mut Dir {
    if depth == 0 || dir.dirs.is_empty() {
        return dir;
    }
    descend(&mut dir.dirs[0], depth - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_path() {
        let dir = Dir::new(r"%ProgramFiles%\My Company\My Product").file(File::new("app.exe"));

        assert_eq!(dir.entity.name, "%ProgramFiles%");
        assert!(dir.files.is_empty());
        let company = &dir.dirs[0];
        assert_eq!(company.entity.name, "My Company");
        let product = &company.dirs[0];
        assert_eq!(product.entity.name, "My Product");
        assert_eq!(product.files.len(), 1);
    }

    #[test]
    fn test_rooted_path_is_not_split() {
        let dir = Dir::new(r"C:\Tools\Acme");
        assert_eq!(dir.entity.name, r"C:\Tools\Acme");
        assert!(dir.dirs.is_empty());
    }

    #[test]
    fn test_split_moves_content_to_leaf() {
        let mut dir = Dir {
            entity: Entity::named(r"AppData\Acme"),
            files: vec![File::new("a.txt")],
            is_install_dir: true,
            ..Default::default()
        };
        dir.split_path();

        assert!(!dir.is_install_dir);
        assert_eq!(dir.dirs[0].entity.name, "Acme");
        assert!(dir.dirs[0].is_install_dir);
        assert_eq!(dir.dirs[0].files.len(), 1);
    }

    #[test]
    fn test_builder_stops_at_items() {
        let dir = Dir::new(r"%ProgramFiles%\Acme")
            .file(File::new("a.txt"))
            .dir(Dir::new("Docs"));

        let acme = &dir.dirs[0];
        assert_eq!(acme.files.len(), 1);
        assert_eq!(acme.dirs[0].entity.name, "Docs");
        assert_eq!(dir.all_dirs().len(), 3);
        assert!(dir.has_files());
    }

    #[test]
    fn test_sibling_dirs_stay_siblings() {
        let dir = Dir::new("Acme")
            .dir(Dir::new("Docs"))
            .dir(Dir::new("Logs"))
            .file(File::new("app.exe"));

        let names: Vec<&str> = dir.dirs.iter().map(|d| d.entity.name.as_str()).collect();
        assert_eq!(names, vec!["Docs", "Logs"]);
        assert!(dir.dirs[0].dirs.is_empty());
        assert_eq!(dir.files.len(), 1);
        assert!(dir.dirs[0].files.is_empty());
    }

    #[test]
    fn test_split_path_leaf_keeps_siblings() {
        let dir = Dir::new(r"%ProgramFiles%\Acme")
            .dir(Dir::new("Docs"))
            .dir(Dir::new(r"Data\Cache"))
            .file(File::new("app.exe"));

        let acme = &dir.dirs[0];
        assert_eq!(acme.files.len(), 1);
        let names: Vec<&str> = acme.dirs.iter().map(|d| d.entity.name.as_str()).collect();
        assert_eq!(names, vec!["Docs", "Data"]);
        assert_eq!(acme.dirs[1].dirs[0].entity.name, "Cache");
    }

    #[test]
    fn test_empty_dir() {
        let dir = Dir::new("Logs");
        assert!(dir.is_empty());
        assert!(!dir.has_items());
    }
}
