//! Entity id allocation
//!
//! Every model entity without an explicit id receives one here. Ids are
//! derived from the entity name and made unique per entity kind with an
//! index suffix (`index.html`, `index.html.1`, ...). The allocator is owned
//! by the [`Compiler`](crate::compiler::Compiler) and reset before each build
//! so repeated builds of the same project produce the same ids.

use crate::env_consts::{escape_illegal_characters, expand, is_path_rooted, path_file_name};
use crate::guid::get_hash_code32;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Longest raw name kept before truncation
const MAX_RAW_NAME_LEN: usize = 30;

/// Kind of entity an id is allocated for. Counters are kept per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKind {
    Dir,
    File,
    FileShortcut,
    ExeFileShortcut,
    Feature,
    RegValue,
    Action,
    Binary,
    Property,
    EnvironmentVariable,
    FirewallException,
    Certificate,
    Generic,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Dir => "Dir",
            IdKind::File => "File",
            IdKind::FileShortcut => "FileShortcut",
            IdKind::ExeFileShortcut => "ExeFileShortcut",
            IdKind::Feature => "Feature",
            IdKind::RegValue => "RegValue",
            IdKind::Action => "Action",
            IdKind::Binary => "Binary",
            IdKind::Property => "Property",
            IdKind::EnvironmentVariable => "EnvironmentVariable",
            IdKind::FirewallException => "FirewallException",
            IdKind::Certificate => "Certificate",
            IdKind::Generic => "Generic",
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, IdKind::Dir)
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity asking for an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRequest {
    pub kind: IdKind,
    pub name: String,
    /// Install path of files (`dir\dir\file`), used by the hashed algorithm
    pub target_path: Option<String>,
}

impl IdRequest {
    pub fn new(kind: IdKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            target_path: None,
        }
    }

    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }
}

/// User supplied id hook. Returning `None` falls back to the built-in algorithms.
pub type IdAlgorithm = Arc<dyn Fn(&IdRequest) -> Option<String> + Send + Sync>;

/// [`IdAlgorithm`] that can live in a model struct
#[derive(Clone)]
pub struct IdHook(pub IdAlgorithm);

impl IdHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&IdRequest) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }
}

impl fmt::Debug for IdHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdHook(..)")
    }
}

/// One allocated id, as reported by id previews
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IdAssignment {
    pub kind: String,
    pub name: String,
    pub id: String,
}

/// Incremental per-kind id allocator
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    counters: HashMap<IdKind, HashMap<String, usize>>,
    taken: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all allocations
    pub fn reset(&mut self) {
        self.counters.clear();
        self.taken.clear();
    }

    /// Whether anything was allocated since the last reset
    pub fn has_allocations(&self) -> bool {
        !self.counters.is_empty() || !self.taken.is_empty()
    }

    /// Whether `id` is already in use
    pub fn is_taken(&self, id: &str) -> bool {
        self.taken.contains(id)
    }

    /// Mark an explicitly assigned id as used
    pub fn reserve(&mut self, id: &str) {
        self.taken.insert(id.to_string());
    }

    /// Allocate an id: the custom hook first, then the incremental algorithm.
    pub fn allocate(&mut self, request: &IdRequest, custom: Option<&IdAlgorithm>) -> String {
        if let Some(id) = custom.and_then(|hook| hook(request)) {
            return self.claim(id);
        }
        self.incremental_id(request)
    }

    /// Name based id with a per-kind index for repeated names
    pub fn incremental_id(&mut self, request: &IdRequest) -> String {
        let mut raw_name = expand(&request.name, true);
        if raw_name.is_empty() {
            raw_name = request.kind.as_str().to_string();
        }

        let use_file_name = is_path_rooted(&request.name)
            || (!request.kind.is_dir() && !request.name.is_empty());
        if use_file_name {
            raw_name = expand(path_file_name(&request.name), true);
        }

        let char_count = raw_name.chars().count();
        if char_count > MAX_RAW_NAME_LEN {
            let tail: String = raw_name.chars().skip(char_count - MAX_RAW_NAME_LEN).collect();
            raw_name = format!("_...{}", tail);
        }

        let key = raw_name.to_lowercase();
        let names = self.counters.entry(request.kind).or_default();

        let mut id = match names.get_mut(&key) {
            Some(index) => {
                *index += 1;
                format!("{}.{}", raw_name, index)
            }
            None => {
                names.insert(key, 0);
                if raw_name.ends_with(|c: char| c.is_ascii_digit()) {
                    format!("{}_", raw_name)
                } else {
                    raw_name.clone()
                }
            }
        };

        if raw_name.starts_with(|c: char| c.is_ascii_digit()) {
            id = format!("_{}", id);
        }

        self.claim(id)
    }

    /// Take `id`, appending `_` until it is unused
    pub fn claim(&mut self, mut id: String) -> String {
        while self.taken.contains(&id) {
            id.push('_');
        }
        self.taken.insert(id.clone());
        id
    }
}

/// File id from the file name and a hash of its install path.
///
/// Returns `None` for anything that is not a file with a known target path.
pub fn hashed_target_path_id(request: &IdRequest, mask: &str) -> Option<String> {
    if request.kind != IdKind::File {
        return None;
    }
    let target_path = request.target_path.as_deref()?;

    let dir_hash = get_hash_code32(target_path).unsigned_abs();
    let file_name = escape_illegal_characters(path_file_name(target_path), true);

    Some(
        mask.replace("{file_name}", &file_name)
            .replace("{dir_hash}", &dir_hash.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> IdRequest {
        IdRequest::new(IdKind::File, name)
    }

    #[test]
    fn test_repeated_names_get_index() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.incremental_id(&file("index.html")), "index.html");
        assert_eq!(gen.incremental_id(&file(r"docs\index.html")), "index.html.1");
        assert_eq!(gen.incremental_id(&file("INDEX.html")), "INDEX.html.2");
    }

    #[test]
    fn test_counters_are_per_kind() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.incremental_id(&file("setup")), "setup");
        // same raw name, other kind: index restarts, but the id is taken
        let id = gen.incremental_id(&IdRequest::new(IdKind::Binary, "setup"));
        assert_eq!(id, "setup_");
    }

    #[test]
    fn test_trailing_and_leading_digits() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.incremental_id(&file("app2")), "app2_");
        assert_eq!(gen.incremental_id(&file("app2")), "app2.1");
        assert_eq!(
            gen.incremental_id(&IdRequest::new(IdKind::Dir, "7zip")),
            "_7zip"
        );
    }

    #[test]
    fn test_empty_name_uses_kind() {
        let mut gen = IdGenerator::new();
        let request = IdRequest::new(IdKind::Feature, "");
        assert_eq!(gen.incremental_id(&request), "Feature");
        assert_eq!(gen.incremental_id(&request), "Feature.1");
    }

    #[test]
    fn test_dirs_keep_full_name() {
        let mut gen = IdGenerator::new();
        let request = IdRequest::new(IdKind::Dir, r"%ProgramFiles%\Acme");
        assert_eq!(gen.incremental_id(&request), "ProgramFilesFolder.Acme");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let mut gen = IdGenerator::new();
        let name = "a_very_long_file_name_that_keeps_going_on.txt";
        let id = gen.incremental_id(&file(name));
        assert_eq!(id, format!("_...{}", &name[name.len() - 30..]));
    }

    #[test]
    fn test_custom_hook_first() {
        let mut gen = IdGenerator::new();
        let hook: IdAlgorithm = Arc::new(|r: &IdRequest| {
            (r.kind == IdKind::File).then(|| "Custom".to_string())
        });
        assert_eq!(gen.allocate(&file("a.txt"), Some(&hook)), "Custom");
        assert_eq!(gen.allocate(&file("b.txt"), Some(&hook)), "Custom_");
        let binary = IdRequest::new(IdKind::Binary, "x.dll");
        assert_eq!(gen.allocate(&binary, Some(&hook)), "x.dll");
    }

    #[test]
    fn test_reset() {
        let mut gen = IdGenerator::new();
        assert!(!gen.has_allocations());
        gen.incremental_id(&file("a.txt"));
        assert!(gen.has_allocations());
        gen.reset();
        assert!(!gen.has_allocations());
        assert_eq!(gen.incremental_id(&file("a.txt")), "a.txt");
    }

    #[test]
    fn test_hashed_target_path_id() {
        let request = file(r"bin\MyApp.exe")
            .with_target_path(r"%ProgramFiles%\My Company\My Product\MyApp.exe");
        assert_eq!(
            hashed_target_path_id(&request, "{file_name}_{dir_hash}").as_deref(),
            Some("MyApp.exe_835642909")
        );

        let dir = IdRequest::new(IdKind::Dir, "x").with_target_path("x");
        assert_eq!(hashed_target_path_id(&dir, "{file_name}"), None);
    }
}
