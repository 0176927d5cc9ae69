// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Object registry: the GUID table and the parent/child lifecycle graph.
//!
//! The registry is the single source of truth for which protocol objects
//! are alive. Registration is strict: a duplicate GUID or an unknown
//! parent is a wire-contract violation and surfaces as a protocol error,
//! which the connection treats as fatal. Removal cascades through the
//! subtree, children before parents, so no child ever outlives its parent
//! in the table.

use crate::error::{Error, Result};
use crate::rpc::remote_object::RemoteObject;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Node {
    object: Arc<dyn RemoteObject>,
    parent: Option<Arc<str>>,
    children: Vec<Arc<str>>,
}

/// Mutated only by the connection's dispatch loop; read from any task.
#[derive(Default)]
pub struct Registry {
    nodes: Mutex<HashMap<Arc<str>, Node>>,
}

impl Registry {
    /// Insert a new object under `parent`. `parent` is `None` only for the
    /// bootstrap root; every driver-created object names a live parent.
    pub fn register(
        &self,
        guid: Arc<str>,
        object: Arc<dyn RemoteObject>,
        parent: Option<Arc<str>>,
    ) -> Result<()> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(&guid) {
            return Err(Error::Protocol(format!("Duplicate object guid: {:?}", guid)));
        }
        if let Some(parent_guid) = &parent {
            match nodes.get_mut(parent_guid) {
                Some(parent_node) => parent_node.children.push(Arc::clone(&guid)),
                None => {
                    return Err(Error::Protocol(format!(
                        "Object {:?} references unknown parent {:?}",
                        guid, parent_guid
                    )));
                }
            }
        }
        nodes.insert(
            guid,
            Node {
                object,
                parent,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, guid: &str) -> Option<Arc<dyn RemoteObject>> {
        self.nodes.lock().get(guid).map(|node| Arc::clone(&node.object))
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.nodes.lock().contains_key(guid)
    }

    /// Remove `guid` and every descendant, returning them children-first.
    /// Unknown GUIDs yield an empty vec; driver and client may race on
    /// teardown and a second dispose must be a no-op.
    pub fn remove_subtree(&self, guid: &str) -> Vec<Arc<dyn RemoteObject>> {
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(guid) {
            return Vec::new();
        }
        if let Some(parent_guid) = nodes.get(guid).and_then(|node| node.parent.clone()) {
            if let Some(parent) = nodes.get_mut(&parent_guid) {
                parent.children.retain(|child| child.as_ref() != guid);
            }
        }
        let mut order = Vec::new();
        collect_post_order(&nodes, guid, &mut order);
        order
            .into_iter()
            .filter_map(|g| nodes.remove(&g))
            .map(|node| node.object)
            .collect()
    }

    /// Remove everything, children-first. Used at connection teardown.
    pub fn take_all(&self) -> Vec<Arc<dyn RemoteObject>> {
        let mut nodes = self.nodes.lock();
        let roots: Vec<Arc<str>> = nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(guid, _)| Arc::clone(guid))
            .collect();
        let mut order = Vec::new();
        for root in &roots {
            collect_post_order(&nodes, root, &mut order);
        }
        order
            .into_iter()
            .filter_map(|g| nodes.remove(&g))
            .map(|node| node.object)
            .collect()
    }

    /// Move `child` (and implicitly its subtree) under a new parent.
    pub fn adopt(&self, child_guid: &str, new_parent_guid: &str) -> Result<()> {
        let mut nodes = self.nodes.lock();
        let (child_key, old_parent) = match nodes.get_key_value(child_guid) {
            Some((key, node)) => (Arc::clone(key), node.parent.clone()),
            None => {
                return Err(Error::Protocol(format!(
                    "Cannot adopt unknown object: {:?}",
                    child_guid
                )));
            }
        };
        let new_parent_key = match nodes.get_key_value(new_parent_guid) {
            Some((key, _)) => Arc::clone(key),
            None => {
                return Err(Error::Protocol(format!(
                    "Cannot adopt {:?} into unknown parent: {:?}",
                    child_guid, new_parent_guid
                )));
            }
        };
        if let Some(old_parent_guid) = old_parent {
            if let Some(old_parent_node) = nodes.get_mut(&old_parent_guid) {
                old_parent_node
                    .children
                    .retain(|child| child.as_ref() != child_guid);
            }
        }
        if let Some(new_parent_node) = nodes.get_mut(&new_parent_key) {
            new_parent_node.children.push(Arc::clone(&child_key));
        }
        if let Some(child_node) = nodes.get_mut(&child_key) {
            child_node.parent = Some(new_parent_key);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect_post_order(nodes: &HashMap<Arc<str>, Node>, guid: &str, out: &mut Vec<Arc<str>>) {
    let Some((key, node)) = nodes.get_key_value(guid) else {
        return;
    };
    for child in &node.children {
        collect_post_order(nodes, child, out);
    }
    out.push(Arc::clone(key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::test_support::StubObject;

    fn registry_with_tree() -> Registry {
        let registry = Registry::default();
        registry
            .register(Arc::from(""), StubObject::create("Root", ""), None)
            .unwrap();
        registry
            .register(
                Arc::from("browser@1"),
                StubObject::create("Browser", "browser@1"),
                Some(Arc::from("")),
            )
            .unwrap();
        registry
            .register(
                Arc::from("context@1"),
                StubObject::create("BrowserContext", "context@1"),
                Some(Arc::from("browser@1")),
            )
            .unwrap();
        registry
            .register(
                Arc::from("page@1"),
                StubObject::create("Page", "page@1"),
                Some(Arc::from("context@1")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_guid_is_rejected() {
        let registry = registry_with_tree();
        let status = registry.register(
            Arc::from("page@1"),
            StubObject::create("Page", "page@1"),
            Some(Arc::from("context@1")),
        );
        assert!(matches!(status, Err(Error::Protocol(_))));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let registry = Registry::default();
        let status = registry.register(
            Arc::from("page@1"),
            StubObject::create("Page", "page@1"),
            Some(Arc::from("context@404")),
        );
        assert!(matches!(status, Err(Error::Protocol(_))));
        assert!(!registry.contains("page@1"));
    }

    #[test]
    fn remove_subtree_returns_children_first() {
        let registry = registry_with_tree();
        let removed = registry.remove_subtree("browser@1");

        let guids: Vec<&str> = removed.iter().map(|o| o.core().guid().as_ref()).collect();
        assert_eq!(guids, vec!["page@1", "context@1", "browser@1"]);
        assert!(registry.contains(""));
        assert!(!registry.contains("page@1"));
    }

    #[test]
    fn remove_subtree_detaches_from_parent() {
        let registry = registry_with_tree();
        registry.remove_subtree("page@1");

        // Parent must not remember the removed child.
        let removed = registry.remove_subtree("context@1");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].core().guid().as_ref(), "context@1");
    }

    #[test]
    fn removing_unknown_guid_is_a_noop() {
        let registry = registry_with_tree();
        assert!(registry.remove_subtree("nope@1").is_empty());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn adopt_moves_a_subtree() {
        let registry = registry_with_tree();
        registry
            .register(
                Arc::from("context@2"),
                StubObject::create("BrowserContext", "context@2"),
                Some(Arc::from("browser@1")),
            )
            .unwrap();
        registry.adopt("page@1", "context@2").unwrap();

        // The old parent no longer owns the page.
        let removed = registry.remove_subtree("context@1");
        assert_eq!(removed.len(), 1);
        assert!(registry.contains("page@1"));

        // The new parent does.
        let removed = registry.remove_subtree("context@2");
        let guids: Vec<&str> = removed.iter().map(|o| o.core().guid().as_ref()).collect();
        assert_eq!(guids, vec!["page@1", "context@2"]);
    }

    #[test]
    fn adopt_requires_both_ends() {
        let registry = registry_with_tree();
        assert!(registry.adopt("nope@1", "context@1").is_err());
        assert!(registry.adopt("page@1", "nope@1").is_err());
    }

    #[test]
    fn take_all_empties_the_registry() {
        let registry = registry_with_tree();
        let all = registry.take_all();
        assert_eq!(all.len(), 4);
        assert!(registry.is_empty());
        // Children always precede their parents.
        let guids: Vec<&str> = all.iter().map(|o| o.core().guid().as_ref()).collect();
        let page = guids.iter().position(|g| *g == "page@1").unwrap();
        let context = guids.iter().position(|g| *g == "context@1").unwrap();
        let browser = guids.iter().position(|g| *g == "browser@1").unwrap();
        assert!(page < context && context < browser);
    }
}
