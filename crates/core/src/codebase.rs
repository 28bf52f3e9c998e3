//! Directory driver
//!
//! Orchestrates the two passes over a source tree: pass 1 parses every file
//! into the shared graph while recording first-pass facts, then the scoped
//! symbol tables are cleared and pass 2 resolves uses to definitions per
//! module root. All deferred edges are committed once at the end.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery;
use crate::graph::Graph;
use crate::parser::python::{FileParser, LabelCounter};
use crate::parser::Parser;
use crate::resolver::{commit_pending, Resolver};
use crate::symbols::{PendingEdges, SymbolTables};

/// Builds the dependence graph of a directory of Python sources.
pub struct CodebaseParser {
    parser: Parser,
    /// Absolute paths of the scanned files, walk order.
    paths: Vec<PathBuf>,
    /// Root-relative keys matching `paths`, used in vertex ids and tables.
    keys: Vec<String>,
    graph: Graph,
    tables: SymbolTables,
    pending: PendingEdges,
    labels: LabelCounter,
    module_roots: Vec<String>,
}

impl CodebaseParser {
    /// Discover the Python files under `dir` and set up a parser.
    pub fn new(dir: &Path) -> anyhow::Result<Self> {
        let files = discovery::discover_python_files(dir)?;
        let keys = files.relative_keys();
        Ok(Self {
            parser: Parser::new()?,
            paths: files.paths,
            keys,
            graph: Graph::new(),
            tables: SymbolTables::new(),
            pending: PendingEdges::new(),
            labels: LabelCounter::new(),
            module_roots: Vec::new(),
        })
    }

    /// Run both passes and commit all edges.
    pub fn parse(&mut self) -> anyhow::Result<()> {
        // pass 1: one syntactic tree per file into the shared graph
        let paths = self.paths.clone();
        let keys = self.keys.clone();
        for (path, key) in paths.iter().zip(keys.iter()) {
            let source = fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let tree = self.parser.syntax_tree(&source, path)?;
            let mut file_parser = FileParser::new(
                &mut self.graph,
                &mut self.tables,
                &mut self.pending,
                &mut self.labels,
                key,
                source.as_bytes(),
            );
            let root_id = file_parser.run(tree.root_node())?;
            self.module_roots.push(root_id);
        }

        // pass 2 rebuilds these lexically; imports stay file-global
        self.tables.clear_scoped();

        let roots = self.module_roots.clone();
        for root_id in &roots {
            let file = root_id
                .strip_prefix("module | ")
                .unwrap_or(root_id)
                .to_string();
            let mut resolver = Resolver {
                graph: &self.graph,
                files: &self.keys,
                tables: &mut self.tables,
                pending: &mut self.pending,
            };
            resolver.resolve_module(root_id, &file);
        }

        let pending = std::mem::take(&mut self.pending);
        commit_pending(&mut self.graph, &self.tables, pending)?;
        Ok(())
    }

    /// The finished graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Consume the driver, keeping only the graph.
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Relative keys of the scanned files, walk order.
    pub fn files(&self) -> &[String] {
        &self.keys
    }

    /// Module root vertex ids, one per scanned file.
    pub fn module_roots(&self) -> &[String] {
        &self.module_roots
    }

    /// The symbol tables as left by pass 2 (top-level bindings per file).
    pub fn tables(&self) -> &SymbolTables {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_module_roots_one_per_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();

        let mut parser = CodebaseParser::new(dir.path()).unwrap();
        parser.parse().unwrap();

        assert_eq!(parser.module_roots().len(), 2);
        for root in parser.module_roots() {
            assert!(root.starts_with("module | "));
            assert!(parser.graph().contains(root));
            assert!(parser.graph().get_vertex(root).unwrap().parent.is_none());
        }
    }

    #[test]
    fn test_empty_directory_builds_empty_graph() {
        let dir = TempDir::new().unwrap();
        let mut parser = CodebaseParser::new(dir.path()).unwrap();
        parser.parse().unwrap();
        assert_eq!(parser.graph().vertex_count(), 0);
    }

    #[test]
    fn test_labels_unique_across_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        fs::write(dir.path().join("b.py"), "def g():\n    pass\n").unwrap();

        let mut parser = CodebaseParser::new(dir.path()).unwrap();
        parser.parse().unwrap();

        let ids = parser.graph().vertex_ids();
        let defs: Vec<&&str> = ids
            .iter()
            .filter(|id| id.starts_with("function_definition"))
            .collect();
        assert_eq!(defs.len(), 2);
        assert!(ids.contains(&"function_definition_0"));
        assert!(ids.contains(&"function_definition_1"));
    }

    #[test]
    fn test_scoped_tables_hold_top_level_state_after_parse() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.py"),
            "def outer():\n    inner = 1\n    return inner\nx = 2\n",
        )
        .unwrap();

        let mut parser = CodebaseParser::new(dir.path()).unwrap();
        parser.parse().unwrap();

        let assignments = &parser.tables().assignments["a.py"];
        assert!(assignments.contains_key("x"));
        // scope restoration dropped the function-local binding
        assert!(!assignments.contains_key("inner"));
    }
}
