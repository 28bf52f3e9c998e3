//! Parser module for turning source files into graph vertices
//!
//! Wraps the tree-sitter Python grammar and exposes the single-file entry
//! point. Directory-wide parsing, which shares label counters and symbol
//! tables across files, lives in [`crate::codebase`].

use anyhow::Context;
use std::fs;
use std::path::Path;
use tree_sitter::Tree;

use crate::graph::Graph;
use crate::symbols::{PendingEdges, SymbolTables};

pub(crate) mod python;

/// Supported source languages.
pub enum Language {
    Python,
}

/// Parser holding the configured tree-sitter instance.
pub struct Parser {
    inner: tree_sitter::Parser,
}

impl Parser {
    /// Create a parser configured for the Python grammar.
    pub fn new() -> anyhow::Result<Self> {
        let mut inner = tree_sitter::Parser::new();
        inner
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .context("failed to load the Python grammar")?;
        Ok(Self { inner })
    }

    /// Produce the concrete syntax tree for a source buffer.
    pub(crate) fn syntax_tree(&mut self, source: &str, origin: &Path) -> anyhow::Result<Tree> {
        self.inner
            .parse(source, None)
            .with_context(|| format!("tree-sitter produced no tree for {}", origin.display()))
    }

    /// Parse a single source file into its own graph.
    ///
    /// Standalone mode: the file's syntactic tree is built, calls are
    /// resolved against definitions of the same file, and call→import edges
    /// are committed. Cross-file resolution requires a directory run.
    pub fn parse_file(&mut self, path: &Path, lang: &Language) -> anyhow::Result<Graph> {
        match lang {
            Language::Python => self.parse_python_file(path),
        }
    }

    fn parse_python_file(&mut self, path: &Path) -> anyhow::Result<Graph> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let tree = self.syntax_tree(&source, path)?;

        let file_key = path.to_string_lossy().replace('\\', "/");
        let mut graph = Graph::new();
        let mut tables = SymbolTables::new();
        let mut pending = PendingEdges::new();
        let mut labels = python::LabelCounter::new();

        let mut file_parser = python::FileParser::new(
            &mut graph,
            &mut tables,
            &mut pending,
            &mut labels,
            &file_key,
            source.as_bytes(),
        );
        file_parser.run(tree.root_node())?;

        python::resolve_local_calls(&tables, &file_key, &mut pending);
        for (from, to) in pending.direct {
            graph.add_edge(&from, &to, 1.0, false)?;
        }

        Ok(graph)
    }
}
