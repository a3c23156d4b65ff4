//! Full-path reconstruction over the flat id → parent mapping of a snapshot.

use crate::error::{AuditError, Result};
use crate::model::Snapshot;
use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

pub const PATH_SEPARATOR: char = '/';

/// Prefix marking a parent id that is not part of the snapshot.
pub const UNRESOLVED_PARENT_MARKER: char = '$';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link<'a> {
    Root,
    Node(usize),
    Missing(&'a str),
}

#[derive(Debug)]
struct Node<'a> {
    id: &'a str,
    name: &'a str,
    parent: Link<'a>,
}

/// Files of a snapshot indexed by id, with lazily memoized paths.
pub struct FileGraph<'a> {
    nodes: Vec<Node<'a>>,
    index: HashMap<&'a str, usize>,
    paths: Vec<OnceCell<String>>,
}

impl<'a> FileGraph<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let index: HashMap<&str, usize> = snapshot
            .files()
            .enumerate()
            .map(|(i, f)| (f.id.as_str(), i))
            .collect();
        let nodes: Vec<Node> = snapshot
            .files()
            .map(|f| {
                let parent = if f.parent_id.is_empty() {
                    Link::Root
                } else if let Some(&i) = index.get(f.parent_id.as_str()) {
                    Link::Node(i)
                } else {
                    Link::Missing(f.parent_id.as_str())
                };
                Node {
                    id: f.id.as_str(),
                    name: f.name.as_str(),
                    parent,
                }
            })
            .collect();
        let paths = nodes.iter().map(|_| OnceCell::new()).collect();
        Self {
            nodes,
            index,
            paths,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Full path of `file_id`, or `None` when the id is not in the snapshot.
    pub fn resolve(&self, file_id: &str) -> Option<Result<&str>> {
        self.index.get(file_id).map(|&i| self.resolve_index(i))
    }

    /// Every file id with its path, in snapshot order. Each call starts a
    /// fresh pass; paths computed earlier are reused.
    pub fn paths(&self) -> impl Iterator<Item = (&'a str, Result<&str>)> + '_ {
        (0..self.nodes.len()).map(move |i| (self.nodes[i].id, self.resolve_index(i)))
    }

    fn resolve_index(&self, start: usize) -> Result<&str> {
        if let Some(path) = self.paths[start].get() {
            return Ok(path);
        }

        // Climb until a root, a missing parent or an already resolved
        // ancestor; `chain` holds the unresolved nodes bottom-up.
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start;
        let mut prefix: Option<String> = loop {
            if !visited.insert(current) {
                return Err(AuditError::CyclicParent {
                    file_id: self.nodes[start].id.to_string(),
                    repeated_id: self.nodes[current].id.to_string(),
                });
            }
            chain.push(current);
            match self.nodes[current].parent {
                Link::Root => break None,
                Link::Missing(parent_id) => {
                    tracing::warn!(
                        file = self.nodes[current].id,
                        parent = parent_id,
                        "parent not found in snapshot"
                    );
                    break Some(format!("{UNRESOLVED_PARENT_MARKER}{parent_id}"));
                }
                Link::Node(parent) => {
                    if let Some(path) = self.paths[parent].get() {
                        break Some(path.clone());
                    }
                    current = parent;
                }
            }
        };

        let mut resolved: &str = "";
        for &i in chain.iter().rev() {
            let name = self.nodes[i].name;
            let path = match prefix.take() {
                Some(p) => format!("{p}{PATH_SEPARATOR}{name}"),
                None => name.to_string(),
            };
            resolved = self.paths[i].get_or_init(|| path).as_str();
            prefix = Some(resolved.to_string());
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;

    fn file(id: &str, name: &str, parent: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: parent.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn three_level_path() {
        let snapshot = Snapshot::from_files(vec![
            file("root", "Drive", ""),
            file("mid", "Sub", "root"),
            file("leaf", "File", "mid"),
        ]);
        let graph = FileGraph::new(&snapshot);
        assert_eq!(graph.resolve("leaf").unwrap().unwrap(), "Drive/Sub/File");
        assert_eq!(graph.resolve("mid").unwrap().unwrap(), "Drive/Sub");
        assert_eq!(graph.resolve("root").unwrap().unwrap(), "Drive");
    }

    #[test]
    fn dangling_parent_is_marked() {
        let snapshot = Snapshot::from_files(vec![file("A", "A", "B")]);
        let graph = FileGraph::new(&snapshot);
        assert_eq!(graph.resolve("A").unwrap().unwrap(), "$B/A");
    }

    #[test]
    fn dangling_parent_propagates_to_descendants() {
        let snapshot = Snapshot::from_files(vec![
            file("a", "Docs", "gone"),
            file("b", "report.pdf", "a"),
        ]);
        let graph = FileGraph::new(&snapshot);
        assert_eq!(graph.resolve("b").unwrap().unwrap(), "$gone/Docs/report.pdf");
    }

    #[test]
    fn unknown_id_is_none() {
        let snapshot = Snapshot::from_files(vec![file("a", "A", "")]);
        let graph = FileGraph::new(&snapshot);
        assert!(graph.resolve("zzz").is_none());
    }

    #[test]
    fn resolution_is_deterministic() {
        let snapshot = Snapshot::from_files(vec![
            file("r", "Root", ""),
            file("x", "x", "r"),
            file("y", "y", "x"),
            file("z", "z", "missing"),
        ]);
        let first: Vec<(String, String)> = FileGraph::new(&snapshot)
            .paths()
            .map(|(id, p)| (id.to_string(), p.unwrap().to_string()))
            .collect();
        let graph = FileGraph::new(&snapshot);
        let warm: Vec<(String, String)> = graph
            .paths()
            .map(|(id, p)| (id.to_string(), p.unwrap().to_string()))
            .collect();
        let again: Vec<(String, String)> = graph
            .paths()
            .map(|(id, p)| (id.to_string(), p.unwrap().to_string()))
            .collect();
        assert_eq!(first, warm);
        assert_eq!(warm, again);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn cycle_is_reported() {
        let snapshot = Snapshot::from_files(vec![
            file("a", "A", "b"),
            file("b", "B", "a"),
            file("c", "C", "a"),
        ]);
        let graph = FileGraph::new(&snapshot);
        match graph.resolve("c").unwrap() {
            Err(AuditError::CyclicParent { file_id, repeated_id }) => {
                assert_eq!(file_id, "c");
                assert_eq!(repeated_id, "a");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let snapshot = Snapshot::from_files(vec![file("a", "A", "a")]);
        let graph = FileGraph::new(&snapshot);
        assert!(matches!(
            graph.resolve("a").unwrap(),
            Err(AuditError::CyclicParent { .. })
        ));
    }
}
