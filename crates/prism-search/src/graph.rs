//! Knowledge graph of the relationships in a local search context.

use std::collections::{HashMap, HashSet};

use prism_core::Frame;
use prism_core::entities::Attributes;
use rustworkx_core::petgraph::graph::{NodeIndex, UnGraph};
use rustworkx_core::petgraph::visit::EdgeRef;

use crate::context::cell_text;
use crate::error::SearchError;

/// Undirected graph: entity names as nodes, one edge per related pair.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: UnGraph<String, Attributes>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// One edge per row between `source` and `target`; every other column
    /// becomes an edge attribute. A repeated pair keeps the last row's
    /// attributes.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Core`] if `source` or `target` is missing.
    pub fn from_relationships(frame: &Frame) -> Result<Self, SearchError> {
        let source_col = frame.require_column("relationships", "source")?;
        let target_col = frame.require_column("relationships", "target")?;

        let mut kg = Self::default();
        for row in frame.rows() {
            let source = kg.node(cell_text(&row[source_col]));
            let target = kg.node(cell_text(&row[target_col]));
            let attributes: Attributes = frame
                .columns()
                .iter()
                .zip(row)
                .enumerate()
                .filter(|(i, _)| *i != source_col && *i != target_col)
                .map(|(_, (name, value))| (name.clone(), value.clone()))
                .collect();
            kg.graph.update_edge(source, target, attributes);
        }
        tracing::debug!(
            nodes = kg.graph.node_count(),
            edges = kg.graph.edge_count(),
            "built knowledge graph"
        );
        Ok(kg)
    }

    fn node(&mut self, name: String) -> NodeIndex {
        if let Some(idx) = self.index.get(&name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.clone());
        self.index.insert(name, idx);
        idx
    }

    #[must_use]
    pub const fn graph(&self) -> &UnGraph<String, Attributes> {
        &self.graph
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in insertion order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|i| self.graph[i].as_str())
    }

    /// Number of distinct neighbours of `name`; 0 for unknown names.
    #[must_use]
    pub fn degree(&self, name: &str) -> usize {
        self.index.get(name).map_or(0, |idx| self.degree_of(*idx))
    }

    pub(crate) fn degree_of(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors(idx).collect::<HashSet<_>>().len()
    }

    /// `(source index, target index, attributes)` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &Attributes)> {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Attribute `key` of the edge between `a` and `b`, in either direction.
    #[must_use]
    pub fn edge_attribute(&self, a: &str, b: &str, key: &str) -> Option<&serde_json::Value> {
        let (ia, ib) = (self.index.get(a)?, self.index.get(b)?);
        let edge = self.graph.find_edge(*ia, *ib)?;
        self.graph[edge].get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn relationships(rows: Vec<Vec<serde_json::Value>>) -> Frame {
        Frame::new(
            vec!["id".into(), "source".into(), "target".into(), "description".into()],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn builds_undirected_graph_with_attributes() {
        let kg = KnowledgeGraph::from_relationships(&relationships(vec![
            vec![json!("1"), json!("ACME"), json!("HARBOUR"), json!("ships via")],
            vec![json!("2"), json!("HARBOUR"), json!("CITY"), json!("located in")],
        ]))
        .unwrap();

        assert_eq!(kg.node_names().collect::<Vec<_>>(), vec!["ACME", "HARBOUR", "CITY"]);
        assert_eq!(kg.edge_count(), 2);
        assert_eq!(kg.degree("HARBOUR"), 2);
        assert_eq!(kg.degree("ACME"), 1);
        assert_eq!(
            kg.edge_attribute("HARBOUR", "ACME", "description"),
            Some(&json!("ships via"))
        );
        assert_eq!(kg.edge_attribute("ACME", "HARBOUR", "id"), Some(&json!("1")));
        assert_eq!(kg.edge_attribute("ACME", "HARBOUR", "source"), None);
    }

    #[test]
    fn repeated_pair_overwrites_attributes() {
        let kg = KnowledgeGraph::from_relationships(&relationships(vec![
            vec![json!("1"), json!("A"), json!("B"), json!("first")],
            vec![json!("2"), json!("B"), json!("A"), json!("second")],
        ]))
        .unwrap();
        assert_eq!(kg.edge_count(), 1);
        assert_eq!(kg.edge_attribute("A", "B", "description"), Some(&json!("second")));
    }

    #[test]
    fn missing_target_column_is_an_error() {
        let frame = Frame::new(vec!["source".into()], vec![vec![json!("A")]]).unwrap();
        let err = KnowledgeGraph::from_relationships(&frame).unwrap_err();
        assert_eq!(err.to_string(), "Missing column 'target' in relationships");
    }
}
