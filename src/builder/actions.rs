//! Actions - the build steps handed to an executor.
//!
//! Every action names the files it consumes and produces. Edges between
//! actions are implied by those files, and are only materialized when the
//! graph is finalized to check that each output has a single producer and
//! that the steps can be ordered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::trace;

use crate::builder::toolchain::CommandSpec;
use crate::resolver::errors::GraphError;
use crate::util::hash::Fingerprint;

/// What an action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Compile,
    CreatePch,
    Archive,
    Link,
    ImportLibrary,
    Copy,
}

/// A single build step.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub id: usize,
    pub kind: ActionKind,
    /// Hash of the command line and produced items
    pub fingerprint: String,
    pub command_path: PathBuf,
    pub arguments: Vec<String>,
    pub prerequisites: Vec<PathBuf>,
    pub produced: Vec<PathBuf>,
    /// Short description shown while the action runs
    pub status: String,
}

/// A generated file whose contents are known at graph construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntermediateFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Actions and intermediate files of one target, in creation order.
#[derive(Debug, Default)]
pub struct ActionGraph {
    actions: Vec<Action>,
    intermediate_files: IndexMap<PathBuf, String>,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action running `command`.
    pub fn add(
        &mut self,
        kind: ActionKind,
        command: CommandSpec,
        prerequisites: Vec<PathBuf>,
        produced: Vec<PathBuf>,
        status: impl Into<String>,
    ) -> usize {
        let mut fingerprint = Fingerprint::new();
        fingerprint
            .update_path(&command.program)
            .update_strs(command.args.iter().map(String::as_str));
        for item in &produced {
            fingerprint.update_path(item);
        }

        let id = self.actions.len();
        let status = status.into();
        trace!("action {}: {}", id, status);
        self.actions.push(Action {
            id,
            kind,
            fingerprint: fingerprint.finish_short(),
            command_path: command.program,
            arguments: command.args,
            prerequisites,
            produced,
            status,
        });
        id
    }

    /// Record a generated file. A later write to the same path replaces the
    /// earlier contents.
    pub fn add_intermediate_file(&mut self, path: PathBuf, contents: String) -> PathBuf {
        self.intermediate_files.insert(path.clone(), contents);
        path
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn intermediate_file(&self, path: &Path) -> Option<&str> {
        self.intermediate_files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Validate the graph and return its actions in dependency order.
    ///
    /// Fails when two actions produce the same item, or when the actions
    /// cannot be ordered.
    pub fn finalize(self) -> Result<(Vec<Action>, Vec<IntermediateFile>), GraphError> {
        let mut producers: HashMap<&Path, usize> = HashMap::new();
        for action in &self.actions {
            for item in &action.produced {
                if let Some(&first) = producers.get(item.as_path()) {
                    return Err(GraphError::ConflictingProducedItem {
                        item: item.clone(),
                        first: self.actions[first].status.clone(),
                        second: action.status.clone(),
                    });
                }
                producers.insert(item, action.id);
            }
        }

        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.actions.len(), 0);
        let nodes: Vec<NodeIndex> = self
            .actions
            .iter()
            .map(|action| graph.add_node(action.id))
            .collect();
        for action in &self.actions {
            for item in &action.prerequisites {
                if let Some(&producer) = producers.get(item.as_path()) {
                    graph.update_edge(nodes[producer], nodes[action.id], ());
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| GraphError::ActionGraphCycle {
            item: self.actions[graph[cycle.node_id()]].status.clone(),
        })?;

        let mut slots: Vec<Option<Action>> = self.actions.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        for node in order {
            if let Some(mut action) = slots[graph[node]].take() {
                action.id = ordered.len();
                ordered.push(action);
            }
        }

        let files = self
            .intermediate_files
            .into_iter()
            .map(|(path, contents)| IntermediateFile { path, contents })
            .collect();
        Ok((ordered, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(program: &str) -> CommandSpec {
        CommandSpec::new(program)
    }

    #[test]
    fn test_finalize_orders_producers_first() {
        let mut graph = ActionGraph::new();
        graph.add(
            ActionKind::Link,
            cmd("ld"),
            vec![PathBuf::from("a.o")],
            vec![PathBuf::from("app")],
            "app",
        );
        graph.add(
            ActionKind::Compile,
            cmd("cc"),
            vec![PathBuf::from("a.cpp")],
            vec![PathBuf::from("a.o")],
            "a.cpp",
        );

        let (actions, _) = graph.finalize().unwrap();
        let statuses: Vec<&str> = actions.iter().map(|a| a.status.as_str()).collect();
        assert_eq!(statuses, vec!["a.cpp", "app"]);
        assert_eq!(actions[0].id, 0);
        assert_eq!(actions[1].id, 1);
    }

    #[test]
    fn test_conflicting_outputs_fail() {
        let mut graph = ActionGraph::new();
        graph.add(ActionKind::Compile, cmd("cc"), vec![], vec![PathBuf::from("a.o")], "first");
        graph.add(ActionKind::Compile, cmd("cc"), vec![], vec![PathBuf::from("a.o")], "second");

        let err = graph.finalize().unwrap_err();
        match err {
            GraphError::ConflictingProducedItem { first, second, .. } => {
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_fails() {
        let mut graph = ActionGraph::new();
        graph.add(
            ActionKind::Compile,
            cmd("cc"),
            vec![PathBuf::from("b")],
            vec![PathBuf::from("a")],
            "a",
        );
        graph.add(
            ActionKind::Compile,
            cmd("cc"),
            vec![PathBuf::from("a")],
            vec![PathBuf::from("b")],
            "b",
        );

        assert!(matches!(
            graph.finalize().unwrap_err(),
            GraphError::ActionGraphCycle { .. }
        ));
    }

    #[test]
    fn test_fingerprint_tracks_command_line() {
        let mut graph = ActionGraph::new();
        graph.add(ActionKind::Compile, cmd("cc").arg("-O2"), vec![], vec![PathBuf::from("a.o")], "a");
        graph.add(ActionKind::Compile, cmd("cc").arg("-O0"), vec![], vec![PathBuf::from("b.o")], "b");
        let actions = graph.actions();
        assert_ne!(actions[0].fingerprint, actions[1].fingerprint);
    }

    #[test]
    fn test_intermediate_files_keep_latest_contents() {
        let mut graph = ActionGraph::new();
        graph.add_intermediate_file(PathBuf::from("Definitions.h"), "old".to_string());
        graph.add_intermediate_file(PathBuf::from("Definitions.h"), "new".to_string());
        assert_eq!(graph.intermediate_file(Path::new("Definitions.h")), Some("new"));

        let (_, files) = graph.finalize().unwrap();
        assert_eq!(files.len(), 1);
    }
}
