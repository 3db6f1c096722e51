//! Bulk writes into the graph store.

use crate::config::Neo4jConfig;
use crate::models::{NodeKey, NodeLabel, NodeRecord, PropertyValue, RelTuple};
use anyhow::{Context, Result};
use neo4rs::{query, BoltType, Graph};
use std::collections::HashMap;
use tracing::{debug, info};

/// Full-refresh deletes: relationships first, then each node label.
pub const CYPHER_DELETE: [&str; 3] = [
    "MATCH ()-[r]->() DELETE r",
    "MATCH (n:Artist) DETACH DELETE n",
    "MATCH (n:Film) DETACH DELETE n",
];

#[allow(async_fn_in_trait)]
pub trait GraphSink {
    /// Removes every relationship and every `Film` and `Artist` node.
    async fn clear(&mut self) -> Result<()>;

    /// Creates an index on the label's key property if it does not exist yet.
    async fn ensure_key_index(&mut self, label: NodeLabel) -> Result<()>;

    /// Creates all `nodes` with `label` in one bulk call.
    async fn create_nodes(&mut self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<()>;

    /// Creates one `rel_type` relationship per tuple in one bulk call, matching
    /// endpoints on already existing nodes by key property.
    async fn create_relationships(
        &mut self,
        rel_type: &str,
        start: NodeKey,
        end: NodeKey,
        rels: &[RelTuple],
    ) -> Result<()>;
}

pub fn create_nodes_cypher(label: NodeLabel) -> String {
    format!("UNWIND $rows AS row CREATE (n:{label}) SET n = row")
}

pub fn create_relationships_cypher(rel_type: &str, start: NodeKey, end: NodeKey) -> String {
    format!(
        "UNWIND $rows AS row \
         MATCH (a:{} {{{}: row.start}}) \
         MATCH (b:{} {{{}: row.end}}) \
         CREATE (a)-[:{rel_type}]->(b)",
        start.label, start.property, end.label, end.property
    )
}

pub fn key_index_cypher(label: NodeLabel) -> String {
    format!(
        "CREATE INDEX {}_id_index IF NOT EXISTS FOR (n:{label}) ON (n.{})",
        label.as_str().to_lowercase(),
        label.key_property()
    )
}

fn node_row(label: NodeLabel, node: &NodeRecord) -> HashMap<String, BoltType> {
    let mut row: HashMap<String, BoltType> = HashMap::with_capacity(node.properties.len() + 1);
    row.insert(label.key_property().to_string(), node.key.clone().into());
    for (name, value) in &node.properties {
        let value: BoltType = match value {
            PropertyValue::Text(s) => s.clone().into(),
            PropertyValue::Int(i) => (*i).into(),
        };
        row.insert((*name).to_string(), value);
    }
    row
}

fn rel_row(rel: &RelTuple) -> HashMap<String, BoltType> {
    let mut row: HashMap<String, BoltType> = HashMap::with_capacity(2);
    row.insert("start".to_string(), rel.start.clone().into());
    row.insert("end".to_string(), rel.end.clone().into());
    row
}

pub struct Neo4jSink {
    graph: Graph,
}

impl Neo4jSink {
    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .with_context(|| format!("Cannot connect to Neo4j at {}", config.uri))?;
        graph
            .run(query("RETURN 1;"))
            .await
            .with_context(|| format!("Cannot connect to Neo4j at {}", config.uri))?;
        info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn run_cypher(&self, cypher: &str) -> Result<()> {
        self.graph
            .run(query(cypher))
            .await
            .with_context(|| format!("Failed to execute: {cypher}"))?;
        Ok(())
    }
}

impl GraphSink for Neo4jSink {
    async fn clear(&mut self) -> Result<()> {
        for cypher in CYPHER_DELETE {
            self.run_cypher(cypher).await?;
        }
        Ok(())
    }

    async fn ensure_key_index(&mut self, label: NodeLabel) -> Result<()> {
        self.run_cypher(&key_index_cypher(label)).await
    }

    async fn create_nodes(&mut self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let rows: Vec<HashMap<String, BoltType>> =
            nodes.iter().map(|node| node_row(label, node)).collect();
        self.graph
            .run(query(&create_nodes_cypher(label)).param("rows", rows))
            .await
            .with_context(|| format!("Bulk create of {} {label} nodes failed", nodes.len()))?;
        debug!(%label, count = nodes.len(), "Created nodes");
        Ok(())
    }

    async fn create_relationships(
        &mut self,
        rel_type: &str,
        start: NodeKey,
        end: NodeKey,
        rels: &[RelTuple],
    ) -> Result<()> {
        if rels.is_empty() {
            return Ok(());
        }
        let rows: Vec<HashMap<String, BoltType>> = rels.iter().map(rel_row).collect();
        self.graph
            .run(query(&create_relationships_cypher(rel_type, start, end)).param("rows", rows))
            .await
            .with_context(|| {
                format!("Bulk create of {} {rel_type} relationships failed", rels.len())
            })?;
        debug!(rel_type, count = rels.len(), "Created relationships");
        Ok(())
    }
}
