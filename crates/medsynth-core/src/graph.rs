use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::schema::TableSchema;

/// Parent-to-child edge induced by one foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub parent: String,
    pub child: String,
    /// Child field holding the reference.
    pub foreign_key: String,
}

/// Summary of graph structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub roots: usize,
    pub depth: usize,
}

/// Directed acyclic graph of foreign-key dependencies between tables.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    edges: Vec<RelationshipEdge>,
    order: Vec<String>,
    depth: HashMap<String, usize>,
}

impl RelationshipGraph {
    /// Build the graph for `tables`, failing with [`SchemaError::Cycle`] when
    /// the foreign keys are not acyclic.
    ///
    /// Ties in the topological order are broken by position in `tables`.
    pub fn build(tables: &[TableSchema]) -> Result<Self> {
        let position: HashMap<&str, usize> = tables
            .iter()
            .enumerate()
            .map(|(idx, table)| (table.name.as_str(), idx))
            .collect();

        let mut edges = Vec::new();
        let mut indegree = vec![0_usize; tables.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

        for (child_idx, table) in tables.iter().enumerate() {
            for fk in &table.foreign_keys {
                let parent_idx = position
                    .get(fk.references_table.as_str())
                    .copied()
                    .ok_or_else(|| SchemaError::UnknownTable(fk.references_table.clone()))?;
                edges.push(RelationshipEdge {
                    parent: fk.references_table.clone(),
                    child: table.name.clone(),
                    foreign_key: fk.field.clone(),
                });
                indegree[child_idx] += 1;
                children[parent_idx].push(child_idx);
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, count)| if *count == 0 { Some(idx) } else { None })
            .collect();
        let mut order_idx = Vec::with_capacity(tables.len());

        while let Some(idx) = ready.pop_first() {
            order_idx.push(idx);
            for child in &children[idx] {
                indegree[*child] = indegree[*child].saturating_sub(1);
                if indegree[*child] == 0 {
                    ready.insert(*child);
                }
            }
        }

        if order_idx.len() != tables.len() {
            let cycle = indegree
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(idx, _)| tables[idx].name.clone())
                .collect();
            return Err(SchemaError::Cycle(cycle));
        }

        let mut depth: HashMap<String, usize> = HashMap::new();
        for idx in &order_idx {
            let table = &tables[*idx];
            let level = table
                .foreign_keys
                .iter()
                .filter_map(|fk| depth.get(&fk.references_table))
                .map(|parent| parent + 1)
                .max()
                .unwrap_or(0);
            depth.insert(table.name.clone(), level);
        }

        Ok(Self {
            edges,
            order: order_idx
                .into_iter()
                .map(|idx| tables[idx].name.clone())
                .collect(),
            depth,
        })
    }

    /// Tables ordered so every parent precedes its children.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    pub fn children_of(&self, table: &str) -> Vec<&RelationshipEdge> {
        self.edges.iter().filter(|edge| edge.parent == table).collect()
    }

    pub fn parents_of(&self, table: &str) -> Vec<&RelationshipEdge> {
        self.edges.iter().filter(|edge| edge.child == table).collect()
    }

    /// Parent table referenced by `foreign_key` of `table`.
    pub fn parent_of(&self, table: &str, foreign_key: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|edge| edge.child == table && edge.foreign_key == foreign_key)
            .map(|edge| edge.parent.as_str())
    }

    pub fn is_root(&self, table: &str) -> bool {
        !self.edges.iter().any(|edge| edge.child == table)
    }

    /// Tables grouped by dependency depth; tables in one level share no edge.
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut levels: Vec<Vec<String>> = Vec::new();
        for table in &self.order {
            let level = self.depth.get(table).copied().unwrap_or(0);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(table.clone());
        }
        levels
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            nodes: self.order.len(),
            edges: self.edges.len(),
            roots: self.order.iter().filter(|table| self.is_root(table)).count(),
            depth: self.depth.values().copied().max().map(|d| d + 1).unwrap_or(0),
        }
    }
}
