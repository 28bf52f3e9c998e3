//! Symbol tables and deferred edge buffers
//!
//! Pass 1 fills `function_calls`, `imports`, and `function_definitions` per
//! file. Before pass 2, the driver clears everything except `imports`; the
//! resolver then rebuilds `function_definitions`, `assignments`, and
//! `classes` under lexical scoping while queuing edges into [`PendingEdges`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative source-file path with `/` separators; key of every per-file table.
pub type FileKey = String;

/// One import binding of a file: the vertex that introduced it and the
/// dotted module path it refers to.
///
/// The stored path follows the import form:
/// `from P import N` → `P`, `from P import N as A` → `P.N`,
/// `import P` → `""`, `import P as A` → `P`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Id of the `aliased_import` or `dotted_name` vertex.
    pub vertex_id: String,
    /// Dotted module path (see above).
    pub path: String,
}

impl ImportBinding {
    /// Whether the binding came from an `as` alias. Aliased bindings encode
    /// the full target in `path`, which changes how use text is split.
    pub fn is_aliased(&self) -> bool {
        self.vertex_id.starts_with("aliased_import")
    }
}

/// Import bindings of one file, in recording order.
///
/// Matching walks bindings in the order they appeared in the source, so this
/// is a small association list rather than a hash map. Re-binding a key
/// overwrites in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportMap {
    entries: Vec<(String, ImportBinding)>,
}

impl ImportMap {
    pub fn insert(&mut self, key: String, binding: ImportBinding) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = binding;
        } else {
            self.entries.push((key, binding));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ImportBinding> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, b)| b)
    }

    /// `(key, binding)` pairs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImportBinding)> {
        self.entries.iter().map(|(k, b)| (k.as_str(), b))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an assignment bound: the declared type tag and the vertex id of the
/// left-hand-side identifier.
///
/// The type tag is the callee surface text when the right-hand side is a
/// call (the likely class name), else the right-hand side's syntactic kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub type_tag: String,
    pub vertex_id: String,
}

/// All per-file symbol tables of a run.
#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    /// file → callee surface text → call vertex id (last write wins).
    pub function_calls: HashMap<FileKey, HashMap<String, String>>,
    /// file → binding key → import binding. Never cleared between passes.
    pub imports: HashMap<FileKey, ImportMap>,
    /// file → defined name → defining vertex id.
    pub function_definitions: HashMap<FileKey, HashMap<String, String>>,
    /// file → variable name → assignment record.
    pub assignments: HashMap<FileKey, HashMap<String, AssignmentRecord>>,
    /// file → class name → member name → method vertex id.
    pub classes: HashMap<FileKey, HashMap<String, HashMap<String, String>>>,
}

impl SymbolTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the tables the resolver rebuilds lexically, keeping `imports`
    /// and `function_calls`.
    pub fn clear_scoped(&mut self) {
        self.function_definitions.clear();
        self.assignments.clear();
        self.classes.clear();
    }

    pub fn record_call(&mut self, file: &str, callee: String, vertex_id: String) {
        self.function_calls
            .entry(file.to_string())
            .or_default()
            .insert(callee, vertex_id);
    }

    pub fn record_import(&mut self, file: &str, key: String, binding: ImportBinding) {
        self.imports.entry(file.to_string()).or_default().insert(key, binding);
    }

    pub fn record_definition(&mut self, file: &str, name: String, vertex_id: String) {
        self.function_definitions
            .entry(file.to_string())
            .or_default()
            .insert(name, vertex_id);
    }

    pub fn record_assignment(&mut self, file: &str, name: String, record: AssignmentRecord) {
        self.assignments.entry(file.to_string()).or_default().insert(name, record);
    }

    /// Snapshot of the scoped tables, taken on scope entry.
    pub fn snapshot(&self) -> ScopeFrame {
        ScopeFrame {
            function_definitions: self.function_definitions.clone(),
            assignments: self.assignments.clone(),
            classes: self.classes.clone(),
        }
    }

    /// Restores a snapshot taken by [`SymbolTables::snapshot`] on scope exit.
    pub fn restore(&mut self, frame: ScopeFrame) {
        self.function_definitions = frame.function_definitions;
        self.assignments = frame.assignments;
        self.classes = frame.classes;
    }
}

/// Deep copy of the lexically scoped tables. `imports` is file-global and
/// never snapshotted.
#[derive(Debug)]
pub struct ScopeFrame {
    function_definitions: HashMap<FileKey, HashMap<String, String>>,
    assignments: HashMap<FileKey, HashMap<String, AssignmentRecord>>,
    classes: HashMap<FileKey, HashMap<String, HashMap<String, String>>>,
}

/// Edges emitted during pass 2 but written to the graph only after every
/// module has been traversed.
#[derive(Debug, Clone, Default)]
pub struct PendingEdges {
    /// `(from, to)` pairs, committed one direction each.
    pub direct: Vec<(String, String)>,
    /// `(from, target file, name)`, resolved against `assignments`.
    pub assignments: Vec<(String, FileKey, String)>,
    /// `(from, target file, name)`, resolved against `function_definitions`.
    pub calls: Vec<(String, FileKey, String)>,
    /// `(from, target file, class, member)`, resolved against `classes`
    /// with a fallback to the class definition.
    pub attributes: Vec<(String, FileKey, String, String)>,
}

impl PendingEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-way edge.
    pub fn push_direct(&mut self, from: &str, to: &str) {
        self.direct.push((from.to_string(), to.to_string()));
    }

    /// Queue both directions of a use↔definition link.
    pub fn push_direct_bi(&mut self, from: &str, to: &str) {
        self.push_direct(from, to);
        self.push_direct(to, from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_map_order_and_overwrite() {
        let mut map = ImportMap::default();
        map.insert(
            "np".to_string(),
            ImportBinding { vertex_id: "aliased_import_0".to_string(), path: "numpy".to_string() },
        );
        map.insert(
            "os".to_string(),
            ImportBinding { vertex_id: "dotted_name_0".to_string(), path: String::new() },
        );
        map.insert(
            "np".to_string(),
            ImportBinding { vertex_id: "aliased_import_1".to_string(), path: "numpy2".to_string() },
        );

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["np", "os"]);
        assert_eq!(map.get("np").unwrap().vertex_id, "aliased_import_1");
        assert!(map.get("np").unwrap().is_aliased());
        assert!(!map.get("os").unwrap().is_aliased());
    }

    #[test]
    fn test_clear_scoped_keeps_imports() {
        let mut tables = SymbolTables::new();
        tables.record_import(
            "a.py",
            "m".to_string(),
            ImportBinding { vertex_id: "dotted_name_0".to_string(), path: String::new() },
        );
        tables.record_definition("a.py", "f".to_string(), "function_definition_0".to_string());
        tables.record_call("a.py", "f".to_string(), "call_0".to_string());

        tables.clear_scoped();

        assert!(tables.function_definitions.is_empty());
        assert!(!tables.imports.is_empty());
        assert!(!tables.function_calls.is_empty());
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut tables = SymbolTables::new();
        tables.record_definition("a.py", "outer".to_string(), "function_definition_0".to_string());

        let frame = tables.snapshot();
        tables.record_definition("a.py", "inner".to_string(), "function_definition_1".to_string());
        tables.record_assignment(
            "a.py",
            "x".to_string(),
            AssignmentRecord { type_tag: "integer".to_string(), vertex_id: "identifier | x_0".to_string() },
        );
        tables.restore(frame);

        let defs = &tables.function_definitions["a.py"];
        assert_eq!(defs.len(), 1);
        assert!(defs.contains_key("outer"));
        assert!(tables.assignments.is_empty());
    }

    #[test]
    fn test_assignment_record_serde() {
        let record = AssignmentRecord {
            type_tag: "C".to_string(),
            vertex_id: "identifier | c_0".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: AssignmentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
