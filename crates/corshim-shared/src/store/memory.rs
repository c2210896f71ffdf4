//! In-memory key store.

use super::{Hive, KeyStore, PATH_SEPARATOR};
use crate::status::{Hresult, win32};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// One key: default value, named values and children.
///
/// Names are matched case-insensitively but stored as first written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, Node>,
}

impl Node {
    fn find_name<'a, V>(map: &'a BTreeMap<String, V>, name: &str) -> Option<&'a String> {
        map.keys().find(|k| k.eq_ignore_ascii_case(name))
    }

    fn child(&self, name: &str) -> Option<&Node> {
        Self::find_name(&self.children, name).and_then(|k| self.children.get(k))
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        let key = Self::find_name(&self.children, name)?.clone();
        self.children.get_mut(&key)
    }

    fn child_or_insert(&mut self, name: &str) -> &mut Node {
        let key = Self::find_name(&self.children, name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.children.entry(key).or_default()
    }

    fn remove_child(&mut self, name: &str) -> Option<Node> {
        let key = Self::find_name(&self.children, name)?.clone();
        self.children.remove(&key)
    }

    fn set_value(&mut self, name: &str, value: &str) {
        let key = Self::find_name(&self.values, name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.values.insert(key, value.to_string());
    }

    fn value(&self, name: &str) -> Option<&String> {
        Self::find_name(&self.values, name).and_then(|k| self.values.get(k))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct Tree {
    roots: BTreeMap<String, Node>,
}

impl Tree {
    fn resolve(&self, key: &MemoryKey) -> Option<&Node> {
        let mut node = self.roots.get(key.hive.name())?;
        for component in &key.path {
            node = node.child(component)?;
        }
        Some(node)
    }

    fn resolve_mut(&mut self, key: &MemoryKey) -> Option<&mut Node> {
        let mut node = self.roots.get_mut(key.hive.name())?;
        for component in &key.path {
            node = node.child_mut(component)?;
        }
        Some(node)
    }
}

/// Handle to a key in a [`MemoryKeyStore`].
///
/// The handle is a path; it goes stale when the key is deleted, and later
/// writes through it fail with `ERROR_KEY_DELETED` like a registry handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryKey {
    hive: Hive,
    path: Vec<String>,
}

impl MemoryKey {
    fn join(&self, components: &[&str]) -> MemoryKey {
        let mut path = self.path.clone();
        path.extend(components.iter().map(|c| c.to_string()));
        MemoryKey {
            hive: self.hive,
            path,
        }
    }
}

/// A registry-shaped tree held in memory.
///
/// Clones share the same tree, so a test double can observe the store that
/// the code under test mutates.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    tree: Arc<Mutex<Tree>>,
}

fn split(name: &str) -> Vec<&str> {
    name.split(PATH_SEPARATOR).filter(|c| !c.is_empty()).collect()
}

fn deleted() -> Hresult {
    Hresult::from_win32(win32::ERROR_KEY_DELETED)
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a store from a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let tree: Tree = serde_json::from_str(json)?;
        Ok(Self {
            tree: Arc::new(Mutex::new(tree)),
        })
    }

    /// Serialize the whole tree as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.tree())?)
    }

    /// Load a snapshot file, or start empty when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Snapshot not found, starting empty");
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the snapshot file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Whether the key at `path` below `hive` exists.
    pub fn contains_key(&self, hive: Hive, path: &str) -> bool {
        let key = MemoryKey {
            hive,
            path: Vec::new(),
        }
        .join(&split(path));
        self.tree().resolve(&key).is_some()
    }

    /// Names of the direct subkeys of `path` below `hive`.
    pub fn subkey_names(&self, hive: Hive, path: &str) -> Vec<String> {
        let key = MemoryKey {
            hive,
            path: Vec::new(),
        }
        .join(&split(path));
        self.tree()
            .resolve(&key)
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl KeyStore for MemoryKeyStore {
    type Key = MemoryKey;

    fn open_root(&self, hive: Hive) -> Result<MemoryKey> {
        self.tree()
            .roots
            .entry(hive.name().to_string())
            .or_default();
        Ok(MemoryKey {
            hive,
            path: Vec::new(),
        })
    }

    fn create_key(&self, parent: &MemoryKey, name: &str) -> Result<MemoryKey> {
        let components = split(name);
        let mut tree = self.tree();
        let mut node = tree.resolve_mut(parent).ok_or_else(|| Error::KeyOpen {
            path: self.key_path(parent),
            status: deleted(),
        })?;
        for component in &components {
            node = node.child_or_insert(component);
        }
        Ok(parent.join(&components))
    }

    fn open_key(&self, parent: &MemoryKey, name: &str) -> Result<Option<MemoryKey>> {
        let components = split(name);
        let tree = self.tree();
        let mut node = tree.resolve(parent).ok_or_else(|| Error::KeyOpen {
            path: self.key_path(parent),
            status: deleted(),
        })?;
        for component in &components {
            match node.child(component) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(parent.join(&components)))
    }

    fn set_default_value(&self, key: &MemoryKey, value: &str) -> Result<()> {
        let mut tree = self.tree();
        let node = tree.resolve_mut(key).ok_or_else(|| Error::KeyWrite {
            path: self.key_path(key),
            status: deleted(),
        })?;
        node.default = Some(value.to_string());
        Ok(())
    }

    fn set_named_value(&self, key: &MemoryKey, name: &str, value: &str) -> Result<()> {
        let mut tree = self.tree();
        let node = tree.resolve_mut(key).ok_or_else(|| Error::KeyWrite {
            path: self.key_path(key),
            status: deleted(),
        })?;
        node.set_value(name, value);
        Ok(())
    }

    fn query_value(&self, key: &MemoryKey, name: Option<&str>) -> Result<Option<String>> {
        let tree = self.tree();
        let node = tree.resolve(key).ok_or_else(|| Error::KeyOpen {
            path: self.key_path(key),
            status: deleted(),
        })?;
        Ok(match name {
            None => node.default.clone(),
            Some(name) => node.value(name).cloned(),
        })
    }

    fn delete_tree(&self, parent: &MemoryKey, name: &str) -> Result<()> {
        let components = split(name);
        let Some((last, intermediate)) = components.split_last() else {
            return Err(Error::SubtreeDelete {
                path: self.key_path(parent),
                status: Hresult::from_win32(win32::ERROR_INVALID_PARAMETER),
            });
        };
        let mut tree = self.tree();
        let mut node = tree.resolve_mut(parent).ok_or_else(|| Error::SubtreeDelete {
            path: self.key_path(parent),
            status: deleted(),
        })?;
        for component in intermediate {
            match node.child_mut(component) {
                Some(child) => node = child,
                None => return Ok(()),
            }
        }
        node.remove_child(last);
        Ok(())
    }

    fn key_path(&self, key: &MemoryKey) -> String {
        let mut path = key.hive.name().to_string();
        for component in &key.path {
            path.push(PATH_SEPARATOR);
            path.push_str(component);
        }
        path
    }
}
