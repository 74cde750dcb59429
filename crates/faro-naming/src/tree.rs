//! The namespace tree.
//!
//! A [`Namespace`] is the authoritative in-memory directory structure: a tree
//! of [`DirectoryNode`]s plus two flat indexes, the set of all known paths and
//! the per-path stub lists. The three are mutated together so that after any
//! operation every known path has all ancestors present as directories and a
//! non-empty stub set.

use std::collections::{HashMap, HashSet};

use faro_core::Path;
use faro_proto::StubAddr;

use crate::NamingError;

/// Kind of namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// An interior node of the namespace tree.
///
/// Within a node the file-name set and the sub-directory map are disjoint.
#[derive(Debug, Default)]
struct DirectoryNode {
    files: HashSet<String>,
    dirs: HashMap<String, DirectoryNode>,
}

/// The stub lists recorded for one path.
///
/// The storage and command lists are parallel; the same index identifies the
/// same storage server. A (storage, command) pair appears at most once.
#[derive(Debug, Clone, Default)]
pub struct StubSet {
    storage: Vec<StubAddr>,
    command: Vec<StubAddr>,
}

impl StubSet {
    /// Returns the storage (data) stubs.
    pub fn storage(&self) -> &[StubAddr] {
        &self.storage
    }

    /// Returns the command stubs.
    pub fn command(&self) -> &[StubAddr] {
        &self.command
    }

    /// Returns true if no server is recorded.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn record(&mut self, storage: &StubAddr, command: &StubAddr) {
        let known = self
            .storage
            .iter()
            .zip(&self.command)
            .any(|(s, c)| s == storage && c == command);
        if !known {
            self.storage.push(storage.clone());
            self.command.push(command.clone());
        }
    }
}

/// The whole directory tree plus its auxiliary indexes.
#[derive(Debug, Default)]
pub struct Namespace {
    root: DirectoryNode,
    server_files: HashSet<Path>,
    stubs: HashMap<Path, StubSet>,
}

impl Namespace {
    /// Creates an empty namespace containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the path is known (root is not tracked here).
    pub fn contains(&self, path: &Path) -> bool {
        self.server_files.contains(path)
    }

    /// Returns the number of known paths.
    pub fn len(&self) -> usize {
        self.server_files.len()
    }

    /// Returns true if no paths are known.
    pub fn is_empty(&self) -> bool {
        self.server_files.is_empty()
    }

    /// Returns the stub set recorded for a path.
    pub fn stub_set(&self, path: &Path) -> Option<&StubSet> {
        self.stubs.get(path)
    }

    /// Determines whether the path names a directory.
    ///
    /// Walks from the root one component at a time. A component matching a
    /// file name resolves to `false`; a missing component fails `NotFound`.
    /// The root is always a directory.
    pub fn is_directory(&self, path: &Path) -> Result<bool, NamingError> {
        let mut node = &self.root;
        for component in path.components() {
            if node.files.contains(component) {
                return Ok(false);
            }
            match node.dirs.get(component) {
                Some(child) => node = child,
                None => return Err(NamingError::NotFound(path.clone())),
            }
        }
        Ok(true)
    }

    /// Lists the child names of a directory.
    ///
    /// Fails `NotFound` if the path is unknown or names a file.
    pub fn list(&self, path: &Path) -> Result<Vec<String>, NamingError> {
        let node = self
            .dir_node(path)
            .ok_or_else(|| NamingError::NotFound(path.clone()))?;

        let mut names: Vec<String> = node.files.iter().cloned().collect();
        names.extend(node.dirs.keys().cloned());
        Ok(names)
    }

    /// Inserts a new leaf, creating missing ancestor directories.
    ///
    /// The registering server's stub pair is recorded on the leaf and on
    /// every ancestor this call creates. The caller must have established
    /// that the path is absent and does not collide with the tree.
    pub fn insert(
        &mut self,
        path: &Path,
        kind: EntryKind,
        storage: &StubAddr,
        command: &StubAddr,
    ) {
        debug_assert!(!path.is_root());
        debug_assert!(!self.contains(path));

        let mut node = &mut self.root;
        let mut prefix = Path::root();
        let last_index = path.depth() - 1;

        for (i, component) in path.components().enumerate() {
            prefix = match prefix.join(component) {
                Ok(p) => p,
                // Components inside a Path are already validated.
                Err(_) => return,
            };

            if i == last_index {
                match kind {
                    EntryKind::File => {
                        node.files.insert(component.to_string());
                    }
                    EntryKind::Directory => {
                        node.dirs.entry(component.to_string()).or_default();
                    }
                }
                self.server_files.insert(prefix.clone());
                self.stubs
                    .entry(prefix.clone())
                    .or_default()
                    .record(storage, command);
                return;
            }

            let created = !node.dirs.contains_key(component);
            node = node.dirs.entry(component.to_string()).or_default();
            if created {
                self.server_files.insert(prefix.clone());
                self.stubs
                    .entry(prefix.clone())
                    .or_default()
                    .record(storage, command);
            }
        }
    }

    /// Removes a path and everything beneath it from the tree and indexes.
    pub fn remove(&mut self, path: &Path) {
        debug_assert!(!path.is_root());

        if let Ok(parent) = path.parent() {
            if let Ok(name) = path.last() {
                if let Some(node) = self.dir_node_mut(&parent) {
                    if !node.files.remove(name) {
                        node.dirs.remove(name);
                    }
                }
            }
        }

        self.server_files.retain(|p| !p.starts_with(path));
        self.stubs.retain(|p, _| !p.starts_with(path));
    }

    /// Returns true if inserting `path` as a leaf would collide with the
    /// tree: the final component already names a directory, or some earlier
    /// component names a file.
    pub fn collides(&self, path: &Path) -> bool {
        let mut node = &self.root;
        let last_index = match path.depth() {
            0 => return true,
            d => d - 1,
        };

        for (i, component) in path.components().enumerate() {
            if node.files.contains(component) {
                return true;
            }
            match node.dirs.get(component) {
                // An existing directory at the final component means known
                // paths extend this one; inserting it would shadow them.
                Some(_) if i == last_index => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    fn dir_node(&self, path: &Path) -> Option<&DirectoryNode> {
        let mut node = &self.root;
        for component in path.components() {
            node = node.dirs.get(component)?;
        }
        Some(node)
    }

    fn dir_node_mut(&mut self, path: &Path) -> Option<&mut DirectoryNode> {
        let mut node = &mut self.root;
        for component in path.components() {
            node = node.dirs.get_mut(component)?;
        }
        Some(node)
    }
}
