//! Pass 2: cross-file resolution
//!
//! A second, scope-aware traversal over each module root. The scoped symbol
//! tables are rebuilt lexically while every use site is checked against
//! definitions, assignments, class members, and import bindings; matching
//! edges go into the deferred buffers and are committed once, after every
//! module has been traversed.

use crate::graph::{Graph, GraphError, Vertex, VertexKind};
use crate::symbols::{AssignmentRecord, PendingEdges, SymbolTables};
use std::collections::HashMap;

/// An import binding that matched a use site, with owned copies of the
/// pieces the emit paths need.
struct MatchedBinding {
    key: String,
    vertex_id: String,
    /// The dotted path the binding effectively refers to: the stored path
    /// for aliased bindings, else the stored path joined with the key.
    effective_path: String,
    aliased: bool,
}

/// Scope-aware use/definition resolver for one run.
///
/// The graph is read-only here: all edges are deferred so that traversal
/// order cannot perturb the symbol tables mid-walk.
pub(crate) struct Resolver<'a> {
    pub graph: &'a Graph,
    /// Relative paths of every scanned file, in walk order.
    pub files: &'a [String],
    pub tables: &'a mut SymbolTables,
    pub pending: &'a mut PendingEdges,
}

impl<'a> Resolver<'a> {
    /// Traverse one module root.
    pub fn resolve_module(&mut self, root_id: &str, file: &str) {
        self.walk(root_id, file);
    }

    fn walk(&mut self, id: &str, file: &str) {
        let graph = self.graph;
        let Some(vertex) = graph.get_vertex(id) else {
            return;
        };
        let parent = graph.get_parent(id);

        self.record_definition(vertex, file);
        self.record_assignment(vertex, file);
        self.record_class_members(vertex, file);
        self.link_imported_identifier(vertex, parent, file);
        self.link_local_call(vertex, parent, file);
        self.link_imported_call(vertex, parent, file);
        self.link_attribute_call(vertex, parent, file);
        self.link_assignment_use(vertex, parent, file);

        // Function, class, lambda, and comprehension bodies see the outer
        // tables but must not leak their own entries back out.
        let frame = vertex.kind.opens_scope().then(|| self.tables.snapshot());

        let child_ids: Vec<String> = graph
            .neighbors(id)
            .iter()
            .map(|v| v.id.clone())
            .collect();
        for child_id in child_ids {
            self.walk(&child_id, file);
        }

        if let Some(frame) = frame {
            self.tables.restore(frame);
        }
    }

    /// (a) Function and class definitions, keyed by the name child.
    fn record_definition(&mut self, vertex: &Vertex, file: &str) {
        if !matches!(
            vertex.kind,
            VertexKind::FunctionDefinition | VertexKind::ClassDefinition
        ) {
            return;
        }
        if let Some(name_vertex) = self.graph.neighbors(&vertex.id).first() {
            let name = name_vertex.text().to_string();
            self.tables.record_definition(file, name, vertex.id.clone());
        }
    }

    /// (b) Assignments: first identifier descendant is the binding, second
    /// child is the right-hand side. A call RHS is tagged with its callee
    /// surface text, anything else with its syntactic kind.
    fn record_assignment(&mut self, vertex: &Vertex, file: &str) {
        if vertex.kind != VertexKind::Assignment {
            return;
        }
        let graph = self.graph;
        let descendants = graph.descendants(&vertex.id);
        let Some(lhs) = descendants.iter().find(|v| v.kind == VertexKind::Identifier) else {
            return;
        };
        let children = graph.neighbors(&vertex.id);
        let Some(rhs) = children.get(1) else {
            return;
        };
        let type_tag = if rhs.kind == VertexKind::Call {
            graph
                .neighbors(&rhs.id)
                .first()
                .map(|callee| callee.text().to_string())
                .unwrap_or_default()
        } else {
            rhs.kind.as_str().to_string()
        };
        self.tables.record_assignment(
            file,
            lhs.var_name().to_string(),
            AssignmentRecord {
                type_tag,
                vertex_id: lhs.id.clone(),
            },
        );
    }

    /// (c) Class members: every function definition nested under a class
    /// body, keyed by class and method name.
    fn record_class_members(&mut self, vertex: &Vertex, file: &str) {
        if vertex.kind != VertexKind::ClassDefinition {
            return;
        }
        let neighbors = self.graph.neighbors(&vertex.id);
        let Some(name_vertex) = neighbors.first() else {
            return;
        };
        let class_name = name_vertex.text().to_string();
        self.tables
            .classes
            .entry(file.to_string())
            .or_default()
            .insert(class_name.clone(), HashMap::new());
        self.collect_class_members(file, &class_name, &vertex.id);
    }

    fn collect_class_members(&mut self, file: &str, class_name: &str, node_id: &str) {
        let graph = self.graph;
        for child in graph.neighbors(node_id) {
            if child.kind == VertexKind::FunctionDefinition {
                if let Some(method_name) = graph.neighbors(&child.id).first() {
                    if let Some(members) = self
                        .tables
                        .classes
                        .get_mut(file)
                        .and_then(|c| c.get_mut(class_name))
                    {
                        members.insert(method_name.text().to_string(), child.id.clone());
                    }
                }
            }
            self.collect_class_members(file, class_name, &child.id);
        }
    }

    /// (d) Identifiers referring to an import binding: link the use to the
    /// binding vertex, then to the assignment it names in the target file
    /// (directly when the target's table is ready, else deferred).
    fn link_imported_identifier(&mut self, vertex: &Vertex, parent: Option<&Vertex>, file: &str) {
        if vertex.kind != VertexKind::Identifier {
            return;
        }
        let Some(parent) = parent else {
            return;
        };
        if matches!(parent.kind, VertexKind::AliasedImport | VertexKind::DottedName) {
            return;
        }

        // Attribute uses match on the full dotted surface.
        let txt = if parent.kind == VertexKind::Attribute {
            parent.text()
        } else {
            vertex.text()
        };
        let Some(binding) = self.match_binding(file, txt) else {
            return;
        };

        self.pending.push_direct(&vertex.id, &binding.vertex_id);

        let (member, module_path) =
            member_and_module(txt, &binding.key, &binding.effective_path, binding.aliased);
        let Some(target) = self.find_target_file(&module_path) else {
            return;
        };

        match self
            .tables
            .assignments
            .get(&target)
            .and_then(|a| a.get(&member))
        {
            Some(record) => {
                let to = record.vertex_id.clone();
                self.pending.push_direct_bi(&vertex.id, &to);
            }
            None => self
                .pending
                .assignments
                .push((vertex.id.clone(), target, member)),
        }
    }

    /// (e) Call of a name defined in the current file.
    fn link_local_call(&mut self, vertex: &Vertex, parent: Option<&Vertex>, file: &str) {
        let Some(parent) = parent else {
            return;
        };
        if parent.kind != VertexKind::Call {
            return;
        }
        if let Some(def_id) = self
            .tables
            .function_definitions
            .get(file)
            .and_then(|d| d.get(vertex.text()))
            .cloned()
        {
            self.pending.push_direct_bi(&vertex.id, &def_id);
        }
    }

    /// (f) Call of an imported name: resolve against the target file's
    /// definitions, deferring when that file has not been traversed yet.
    fn link_imported_call(&mut self, vertex: &Vertex, parent: Option<&Vertex>, file: &str) {
        let Some(parent) = parent else {
            return;
        };
        if parent.kind != VertexKind::Call {
            return;
        }
        let txt = vertex.text();
        let Some(binding) = self.match_binding(file, txt) else {
            return;
        };
        let (member, module_path) =
            member_and_module(txt, &binding.key, &binding.effective_path, binding.aliased);
        let Some(target) = self.find_target_file(&module_path) else {
            return;
        };

        match self
            .tables
            .function_definitions
            .get(&target)
            .and_then(|d| d.get(&member))
            .cloned()
        {
            Some(def_id) => self.pending.push_direct_bi(&vertex.id, &def_id),
            None => self.pending.calls.push((vertex.id.clone(), target, member)),
        }
    }

    /// (g) Attribute call on a typed object or through an import: resolve
    /// `<prefix>.<member>()` to the member method, falling back to the class
    /// definition or the assignment itself.
    fn link_attribute_call(&mut self, vertex: &Vertex, parent: Option<&Vertex>, file: &str) {
        let Some(parent) = parent else {
            return;
        };
        if parent.kind != VertexKind::Attribute {
            return;
        }
        let Some(grandparent) = self.graph.get_parent(&parent.id) else {
            return;
        };
        if grandparent.kind != VertexKind::Call {
            return;
        }

        let member = vertex.text();
        let long = parent.text();
        if member.is_empty() || !long.ends_with(member) {
            return;
        }
        let cut = long.rfind(member).unwrap_or(0);
        let prefix = if cut == 0 { "" } else { &long[..cut - 1] };

        // 1. prefix is a typed local object
        if let Some(record) = self
            .tables
            .assignments
            .get(file)
            .and_then(|a| a.get(prefix))
            .cloned()
        {
            let type_tag = record.type_tag.clone();

            let method_id = self
                .tables
                .classes
                .get(file)
                .and_then(|c| c.get(&type_tag))
                .and_then(|m| m.get(member))
                .cloned();
            if let Some(method_id) = method_id {
                self.pending.push_direct_bi(&vertex.id, &method_id);
            } else if let Some(class_id) = self
                .tables
                .function_definitions
                .get(file)
                .and_then(|d| d.get(&type_tag))
                .cloned()
            {
                self.pending.push_direct_bi(&vertex.id, &class_id);
            } else {
                self.pending.push_direct_bi(&vertex.id, &record.vertex_id);
            }

            // 2. dotted type tag: the class was imported, chase its module
            if let Some(dot) = type_tag.rfind('.') {
                let type_name = type_tag[dot + 1..].to_string();
                let object_import = &type_tag[..dot];
                let target_path = self
                    .tables
                    .imports
                    .get(file)
                    .and_then(|m| m.get(object_import))
                    .map(|b| {
                        if b.path.is_empty() {
                            object_import.to_string()
                        } else {
                            b.path.clone()
                        }
                    });
                if let Some(target_path) = target_path {
                    if let Some(target) = self.find_target_file(&target_path) {
                        self.link_member_in_file(&vertex.id, &target, &type_name, member);
                    }
                }
            }
        }

        // 3. prefix chopped against import bindings (inline constructor
        // calls like `mod.Class().method()`)
        let mut t = prefix.to_string();
        while t.contains('.') {
            if let Some(binding) = self.match_binding(file, &t) {
                let rest = t.get(binding.key.len() + 1..).unwrap_or("").to_string();
                if !rest.is_empty() {
                    let class_name = match rest.find('(') {
                        Some(p) => rest[..p].to_string(),
                        None => rest,
                    };
                    if let Some(target) = self.find_target_file(&binding.effective_path) {
                        self.link_member_in_file(&vertex.id, &target, &class_name, member);
                    }
                }
                break;
            }
            match t.rfind('.') {
                Some(cut) => t.truncate(cut),
                None => break,
            }
        }
    }

    /// Link `from_id` to `classes[target][class][member]`, falling back to
    /// the class definition when the member is unknown, deferring when the
    /// target file has no class table yet.
    fn link_member_in_file(&mut self, from_id: &str, target: &str, class_name: &str, member: &str) {
        match self.tables.classes.get(target) {
            Some(classes) => {
                if let Some(members) = classes.get(class_name) {
                    if let Some(method_id) = members.get(member).cloned() {
                        self.pending.push_direct_bi(from_id, &method_id);
                    } else if let Some(class_id) = self
                        .tables
                        .function_definitions
                        .get(target)
                        .and_then(|d| d.get(class_name))
                        .cloned()
                    {
                        self.pending.push_direct_bi(from_id, &class_id);
                    }
                }
            }
            None => self.pending.attributes.push((
                from_id.to_string(),
                target.to_string(),
                class_name.to_string(),
                member.to_string(),
            )),
        }
    }

    /// (h) Any use of an assigned name links one-way to its binding.
    fn link_assignment_use(&mut self, vertex: &Vertex, parent: Option<&Vertex>, file: &str) {
        let Some(parent) = parent else {
            return;
        };
        if parent.kind == VertexKind::Assignment {
            return;
        }
        let txt = vertex.text();
        if txt.is_empty() {
            return;
        }
        if let Some(binding_id) = self
            .tables
            .assignments
            .get(file)
            .and_then(|a| a.get(txt))
            .map(|r| r.vertex_id.clone())
        {
            self.pending.push_direct(&vertex.id, &binding_id);
        }
    }

    /// First binding of `file` whose key matches `txt` exactly or as a
    /// dotted prefix (`^key(\.|$)`).
    fn match_binding(&self, file: &str, txt: &str) -> Option<MatchedBinding> {
        let bindings = self.tables.imports.get(file)?;
        for (key, binding) in bindings.iter() {
            let dotted = txt.len() > key.len()
                && txt.starts_with(key)
                && txt.as_bytes()[key.len()] == b'.';
            if txt == key || dotted {
                let aliased = binding.is_aliased();
                let effective_path = if aliased {
                    binding.path.clone()
                } else if binding.path.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", binding.path, key)
                };
                return Some(MatchedBinding {
                    key: key.to_string(),
                    vertex_id: binding.vertex_id.clone(),
                    effective_path,
                    aliased,
                });
            }
        }
        None
    }

    /// First scanned file whose path contains the dotted module path with
    /// dots translated to path separators.
    fn find_target_file(&self, dotted: &str) -> Option<String> {
        let needle = dotted.replace('.', "/");
        self.files
            .iter()
            .find(|f| f.contains(&needle))
            .map(|f| f.to_string())
    }
}

/// Split a matched use text into the member being referenced and the dotted
/// module path of the file it lives in.
fn member_and_module(txt: &str, key: &str, path: &str, aliased: bool) -> (String, String) {
    if aliased {
        let member = if txt == key {
            // bare alias use: the member is the last segment of the target
            path.rsplit('.').next().unwrap_or(path).to_string()
        } else {
            txt.get(key.len() + 1..).unwrap_or("").to_string()
        };
        let module = match path.rfind('.') {
            Some(cut) => path[..cut].to_string(),
            None => path.to_string(),
        };
        (member, module)
    } else {
        let member = match txt.find(path) {
            Some(at) => txt.get(at + path.len() + 1..).unwrap_or("").to_string(),
            None => txt.to_string(),
        };
        let module = match path.rfind(txt) {
            // txt is a suffix of the path: drop it and the joining dot
            Some(at) if path.len() - at == txt.len() => {
                if at == 0 {
                    path[..path.len().saturating_sub(1)].to_string()
                } else {
                    path[..at - 1].to_string()
                }
            }
            _ => path.to_string(),
        };
        (member, module)
    }
}

/// Edge finalizer: drain the deferred buffers into the graph.
///
/// Direct edges are committed one direction each; delayed edges resolve
/// against the now-complete tables, insert both directions, and are dropped
/// silently when still unresolved.
pub(crate) fn commit_pending(
    graph: &mut Graph,
    tables: &SymbolTables,
    pending: PendingEdges,
) -> Result<(), GraphError> {
    for (from, to) in pending.direct {
        graph.add_edge(&from, &to, 1.0, false)?;
    }
    for (from, file, name) in pending.assignments {
        if let Some(record) = tables.assignments.get(&file).and_then(|a| a.get(&name)) {
            graph.add_edge(&from, &record.vertex_id, 1.0, true)?;
        }
    }
    for (from, file, name) in pending.calls {
        if let Some(def_id) = tables.function_definitions.get(&file).and_then(|d| d.get(&name)) {
            graph.add_edge(&from, def_id, 1.0, true)?;
        }
    }
    for (from, file, class_name, member) in pending.attributes {
        let target = tables
            .classes
            .get(&file)
            .and_then(|c| c.get(&class_name))
            .and_then(|m| m.get(&member))
            .or_else(|| {
                tables
                    .function_definitions
                    .get(&file)
                    .and_then(|d| d.get(&class_name))
            });
        if let Some(to) = target {
            graph.add_edge(&from, to, 1.0, true)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // `from m import K`, use `K`
    #[test]
    fn test_split_plain_from_import() {
        let (member, module) = member_and_module("K", "K", "m.K", false);
        assert_eq!(member, "K");
        assert_eq!(module, "m");
    }

    // `import m`, use `m.K`
    #[test]
    fn test_split_plain_import_with_member() {
        let (member, module) = member_and_module("m.K", "m", "m", false);
        assert_eq!(member, "K");
        assert_eq!(module, "m");
    }

    // `from m import g as h`, bare use `h`
    #[test]
    fn test_split_aliased_from_import() {
        let (member, module) = member_and_module("h", "h", "m.g", true);
        assert_eq!(member, "g");
        assert_eq!(module, "m");
    }

    // `import numpy as np`, use `np.array`
    #[test]
    fn test_split_aliased_import_with_member() {
        let (member, module) = member_and_module("np.array", "np", "numpy", true);
        assert_eq!(member, "array");
        assert_eq!(module, "numpy");
    }

    // `import pkg.mod`, use `pkg.mod.f`
    #[test]
    fn test_split_dotted_plain_import() {
        let (member, module) = member_and_module("pkg.mod.f", "pkg.mod", "pkg.mod", false);
        assert_eq!(member, "f");
        assert_eq!(module, "pkg.mod");
    }

    // bare use of `import m` leaves no member to look up
    #[test]
    fn test_split_bare_module_use() {
        let (member, module) = member_and_module("m", "m", "m", false);
        assert_eq!(member, "");
        assert_eq!(module, "");
    }
}
