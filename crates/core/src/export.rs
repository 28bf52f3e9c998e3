//! Read-only graph exporters
//!
//! Renders the finished graph as a graph-description file, as node-feature
//! and adjacency CSV tables, or as a k-bounded neighborhood subgraph. All
//! walkers iterate vertices in insertion order and never mutate the graph.

use anyhow::Context;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::graph::{Graph, GraphError};

/// Graph-description text: `strict digraph tree` with one line per edge and
/// one `xlabel` line per vertex carrying its source span.
pub fn gv_string(graph: &Graph) -> Result<String, GraphError> {
    ensure_nonempty(graph)?;

    let mut out = String::from("strict digraph tree {\n");
    for id in graph.vertex_ids() {
        for neighbor in graph.neighbors(id) {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", id, neighbor.id));
        }
    }
    for vertex in graph.vertices() {
        out.push_str(&format!(
            "    \"{}\" [xlabel=\"{}->{}\"];\n",
            vertex.id, vertex.start, vertex.end
        ));
    }
    out.push_str("}\n");
    Ok(out)
}

/// Write the graph-description file to `path`.
pub fn write_gv(graph: &Graph, path: &Path) -> anyhow::Result<()> {
    let text = gv_string(graph)?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Node-feature CSV: header `node,feat`, one row per vertex, the feature
/// being the `"<start>-><end>"` span string.
pub fn node_features_csv(graph: &Graph) -> Result<String, GraphError> {
    ensure_nonempty(graph)?;

    let mut out = String::from("node,feat\n");
    for vertex in graph.vertices() {
        let feat = format!("{}->{}", vertex.start, vertex.end);
        out.push_str(&format!("{},{}\n", csv_field(&vertex.id), csv_field(&feat)));
    }
    Ok(out)
}

/// Write the node-feature CSV to `path`.
pub fn write_node_features(graph: &Graph, path: &Path) -> anyhow::Result<()> {
    let text = node_features_csv(graph)?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Dense 0/1 adjacency matrix in vertex-insertion order, comma separated.
pub fn adjacency_csv(graph: &Graph) -> Result<String, GraphError> {
    ensure_nonempty(graph)?;

    let ids = graph.vertex_ids();
    let columns: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut out = String::new();
    for id in &ids {
        let mut row = vec![false; ids.len()];
        for neighbor in graph.neighbors(id) {
            if let Some(&col) = columns.get(neighbor.id.as_str()) {
                row[col] = true;
            }
        }
        let line: Vec<&str> = row.iter().map(|set| if *set { "1" } else { "0" }).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    Ok(out)
}

/// Write the adjacency CSV to `path`.
pub fn write_adjacency(graph: &Graph, path: &Path) -> anyhow::Result<()> {
    let text = adjacency_csv(graph)?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Edges reachable from `root_id` in at most `k` steps, breadth first,
/// following stored adjacency (semantic edges included).
pub fn neighborhood(
    graph: &Graph,
    root_id: &str,
    k: usize,
) -> Result<Vec<(String, String)>, GraphError> {
    ensure_nonempty(graph)?;
    if !graph.contains(root_id) {
        return Err(GraphError::MissingEndpoint(root_id.to_string()));
    }

    let mut edges = Vec::new();
    let mut seen_edges = HashSet::new();
    let mut depth: HashMap<String, usize> = HashMap::from([(root_id.to_string(), 0)]);
    let mut queue = VecDeque::from([root_id.to_string()]);

    while let Some(id) = queue.pop_front() {
        let d = depth[&id];
        if d >= k {
            continue;
        }
        for neighbor in graph.neighbors(&id) {
            let edge = (id.clone(), neighbor.id.clone());
            if seen_edges.insert(edge.clone()) {
                edges.push(edge);
            }
            if !depth.contains_key(&neighbor.id) {
                depth.insert(neighbor.id.clone(), d + 1);
                queue.push_back(neighbor.id.clone());
            }
        }
    }
    Ok(edges)
}

/// The k-neighborhood as graph-description text.
pub fn neighborhood_gv(graph: &Graph, root_id: &str, k: usize) -> Result<String, GraphError> {
    let edges = neighborhood(graph, root_id, k)?;

    let mut out = String::from("strict digraph tree {\n");
    if edges.is_empty() {
        out.push_str(&format!("    \"{}\";\n", root_id));
    }
    for (from, to) in edges {
        out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
    }
    out.push_str("}\n");
    Ok(out)
}

/// Re-parse graph-description text into its vertex-id list and edge list.
///
/// Understands exactly the shape [`gv_string`] produces; used to round-trip
/// exports in tests and by downstream CSV tooling.
pub fn parse_gv(text: &str) -> (Vec<String>, Vec<(String, String)>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some((from, to)) = split_edge_line(line) {
            edges.push((from, to));
        } else if line.contains("[xlabel=") {
            if let Some(id) = quoted_prefix(line) {
                nodes.push(id);
            }
        }
    }
    (nodes, edges)
}

fn split_edge_line(line: &str) -> Option<(String, String)> {
    let (left, right) = line.split_once("\" -> \"")?;
    let from = left.strip_prefix('"')?;
    let to = right.strip_suffix("\";")?;
    Some((from.to_string(), to.to_string()))
}

fn quoted_prefix(line: &str) -> Option<String> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Minimal CSV quoting: fields containing separators or quotes are wrapped
/// and inner quotes doubled.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn ensure_nonempty(graph: &Graph) -> Result<(), GraphError> {
    if graph.vertex_count() == 0 {
        return Err(GraphError::EmptyGraph);
    }
    Ok(())
}
