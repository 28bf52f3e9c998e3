//! Pass 1: per-file syntactic walk
//!
//! Walks one concrete syntax tree in pre-order, allocating a graph vertex
//! per named node and threading parent→child edges. During the same walk,
//! first-pass facts are recorded into the symbol tables: function calls,
//! import bindings, and function/class definitions.

use anyhow::Result;
use petgraph::stable_graph::NodeIndex;
use std::collections::HashMap;
use tree_sitter::Node;

use crate::builtins::is_builtin;
use crate::graph::{Graph, Vertex, VertexKind};
use crate::symbols::{ImportBinding, PendingEdges, SymbolTables};

/// Per-label monotonic counters behind the `<label>_<seq>` id scheme.
///
/// Counters are keyed on the full label string (kind plus surface text),
/// start at 0, and are shared across all files of a run so that ids stay
/// globally unique.
#[derive(Debug, Default)]
pub(crate) struct LabelCounter {
    counts: HashMap<String, u64>,
}

impl LabelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `<base>_<seq>` and bumps the counter for `base`.
    pub fn assign(&mut self, base: &str) -> String {
        let count = self
            .counts
            .entry(base.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(0);
        format!("{}_{}", base, count)
    }
}

/// Walks one file's tree into the shared graph and symbol tables.
pub(crate) struct FileParser<'a> {
    graph: &'a mut Graph,
    tables: &'a mut SymbolTables,
    pending: &'a mut PendingEdges,
    labels: &'a mut LabelCounter,
    file: &'a str,
    source: &'a [u8],
}

impl<'a> FileParser<'a> {
    pub fn new(
        graph: &'a mut Graph,
        tables: &'a mut SymbolTables,
        pending: &'a mut PendingEdges,
        labels: &'a mut LabelCounter,
        file: &'a str,
        source: &'a [u8],
    ) -> Self {
        Self {
            graph,
            tables,
            pending,
            labels,
            file,
            source,
        }
    }

    /// Walk the tree rooted at `root`; returns the module vertex id.
    pub fn run(&mut self, root: Node) -> Result<String> {
        let index = self.visit(root, None)?;
        let id = self
            .graph
            .vertex(index)
            .map(|v| v.id.clone())
            .unwrap_or_default();
        Ok(id)
    }

    fn visit(&mut self, node: Node, parent: Option<NodeIndex>) -> Result<NodeIndex> {
        let kind = node.kind();
        let text = self.vertex_text(node)?;

        // Module roots carry the file path instead of a counter suffix.
        let id = if kind == "module" {
            format!("module | {}", self.file)
        } else {
            let base = match &text {
                Some(t) => format!("{} | {}", kind, t),
                None => kind.to_string(),
            };
            self.labels.assign(&base)
        };

        let mut vertex = Vertex::new(
            id.clone(),
            VertexKind::from_grammar(kind),
            node.start_position().into(),
            node.end_position().into(),
        );
        if kind == "identifier" {
            vertex.var_name = text.clone();
        }
        vertex.text = text;
        vertex.parent = parent;
        let index = self.graph.add_vertex(vertex)?;

        match kind {
            "call" => self.record_call(node, &id)?,
            "aliased_import" => self.record_import(node, &id)?,
            "dotted_name" => {
                if node.parent().is_some_and(|p| p.kind().starts_with("import")) {
                    self.record_import(node, &id)?;
                }
            }
            "function_definition" | "class_definition" => self.record_definition(node, &id)?,
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            let child_index = self.visit(child, Some(index))?;
            self.graph.add_edge_indices(index, child_index, 1.0)?;
        }

        Ok(index)
    }

    /// Surface text of a node: named leaves verbatim, the operator token for
    /// `binary_operator`, the full dotted surface for `attribute`.
    fn vertex_text(&self, node: Node) -> Result<Option<String>> {
        match node.kind() {
            "module" => Ok(None),
            "binary_operator" => {
                let operator = node
                    .child(1)
                    .map(|op| op.utf8_text(self.source))
                    .transpose()?;
                Ok(operator.map(str::to_string))
            }
            "attribute" => Ok(Some(node.utf8_text(self.source)?.to_string())),
            _ if node.is_named() && node.child_count() == 0 => {
                Ok(Some(node.utf8_text(self.source)?.to_string()))
            }
            _ => Ok(None),
        }
    }

    /// Record a call whose callee is not a built-in, and queue a deferred
    /// edge from the call vertex to the import binding its callee prefix
    /// refers to, if any.
    fn record_call(&mut self, node: Node, id: &str) -> Result<()> {
        let Some(callee) = node.child_by_field_name("function") else {
            return Ok(());
        };
        let callee_text = callee.utf8_text(self.source)?;
        if is_builtin(callee_text) {
            return Ok(());
        }
        self.tables
            .record_call(self.file, callee_text.to_string(), id.to_string());

        if let Some(bindings) = self.tables.imports.get(self.file) {
            // Strip trailing dotted segments until a binding matches.
            let mut prefix = callee_text;
            loop {
                if let Some(binding) = bindings.get(prefix) {
                    self.pending.push_direct(id, &binding.vertex_id);
                    break;
                }
                match prefix.rfind('.') {
                    Some(cut) => prefix = &prefix[..cut],
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Record an import binding. Key and stored path per import form:
    ///
    /// | form                  | key | path  |
    /// |-----------------------|-----|-------|
    /// | `from P import N`     | `N` | `P`   |
    /// | `from P import N as A`| `A` | `P.N` |
    /// | `import P`            | `P` | `""`  |
    /// | `import P as A`       | `A` | `P`   |
    fn record_import(&mut self, node: Node, id: &str) -> Result<()> {
        let Some(parent) = node.parent() else {
            return Ok(());
        };
        match node.kind() {
            "aliased_import" => {
                let (Some(name), Some(alias)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("alias"),
                ) else {
                    return Ok(());
                };
                let name_text = name.utf8_text(self.source)?;
                let alias_text = alias.utf8_text(self.source)?;
                let path = if parent.kind() == "import_from_statement" {
                    match self.module_name_text(parent)? {
                        Some(module) => format!("{}.{}", module, name_text),
                        None => name_text.to_string(),
                    }
                } else {
                    name_text.to_string()
                };
                self.tables.record_import(
                    self.file,
                    alias_text.to_string(),
                    ImportBinding {
                        vertex_id: id.to_string(),
                        path,
                    },
                );
            }
            "dotted_name" => {
                let key = node.utf8_text(self.source)?;
                if parent.kind() == "import_from_statement" {
                    // Skip the module path of `from X import ...`.
                    if parent
                        .child_by_field_name("module_name")
                        .is_some_and(|m| m == node)
                    {
                        return Ok(());
                    }
                    let path = self.module_name_text(parent)?.unwrap_or_default();
                    self.tables.record_import(
                        self.file,
                        key.to_string(),
                        ImportBinding {
                            vertex_id: id.to_string(),
                            path,
                        },
                    );
                } else {
                    self.tables.record_import(
                        self.file,
                        key.to_string(),
                        ImportBinding {
                            vertex_id: id.to_string(),
                            path: String::new(),
                        },
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn module_name_text(&self, import_from: Node) -> Result<Option<String>> {
        let module = import_from
            .child_by_field_name("module_name")
            .map(|m| m.utf8_text(self.source))
            .transpose()?;
        Ok(module.filter(|m| !m.is_empty()).map(str::to_string))
    }

    /// Record a function or class definition under its name.
    fn record_definition(&mut self, node: Node, id: &str) -> Result<()> {
        if let Some(name) = node.child_by_field_name("name") {
            let name_text = name.utf8_text(self.source)?;
            self.tables
                .record_definition(self.file, name_text.to_string(), id.to_string());
        }
        Ok(())
    }
}

/// Connect recorded calls to same-file definitions (standalone file mode).
pub(crate) fn resolve_local_calls(tables: &SymbolTables, file: &str, pending: &mut PendingEdges) {
    let (Some(calls), Some(defs)) = (
        tables.function_calls.get(file),
        tables.function_definitions.get(file),
    ) else {
        return;
    };
    for (callee, call_id) in calls {
        if let Some(def_id) = defs.get(callee) {
            pending.push_direct_bi(call_id, def_id);
        }
    }
}
