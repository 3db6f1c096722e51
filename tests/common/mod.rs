//! In-memory stand-ins for SQL Server and Neo4j.
//!
//! `MemoryGraph` follows Cypher `MATCH` semantics for relationships: a tuple
//! only produces a relationship when both endpoints exist.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use cinegraph::graph::GraphSink;
use cinegraph::models::{NodeKey, NodeLabel, NodeRecord, RelTuple, SourceRow, SqlValue};
use cinegraph::source::{PageReader, RelationalSource, Table};
use std::collections::{HashMap, HashSet};

pub fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

pub fn film(id: &str, title: &str, year: Option<i64>) -> SourceRow {
    vec![text(id), text(title), year.map_or(SqlValue::Null, SqlValue::Int)]
}

pub fn artist(id: &str, name: &str, birth: Option<i64>) -> SourceRow {
    vec![text(id), text(name), birth.map_or(SqlValue::Null, SqlValue::Int)]
}

pub fn credit(artist: &str, category: &str, film: &str) -> SourceRow {
    vec![text(artist), text(category), text(film)]
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<Table, Vec<SourceRow>>,
    /// Size of every page handed out, per table
    pub pages: Vec<(Table, usize)>,
    pub fail_count: Option<Table>,
}

impl MemorySource {
    pub fn new(films: Vec<SourceRow>, artists: Vec<SourceRow>, credits: Vec<SourceRow>) -> Self {
        let mut tables = HashMap::new();
        tables.insert(Table::Films, films);
        tables.insert(Table::Artists, artists);
        tables.insert(Table::Credits, credits);
        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn page_sizes(&self, table: Table) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, size)| *size)
            .collect()
    }
}

pub struct MemoryPages<'a> {
    rows: &'a [SourceRow],
    page_size: usize,
    log: &'a mut Vec<(Table, usize)>,
    table: Table,
}

impl PageReader for MemoryPages<'_> {
    async fn next_page(&mut self) -> Result<Option<Vec<SourceRow>>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = self.page_size.min(self.rows.len());
        let (page, rest) = self.rows.split_at(take);
        self.rows = rest;
        self.log.push((self.table, page.len()));
        Ok(Some(page.to_vec()))
    }
}

impl RelationalSource for MemorySource {
    type Pages<'a>
        = MemoryPages<'a>
    where
        Self: 'a;

    async fn count(&mut self, table: Table) -> Result<u64> {
        if self.fail_count == Some(table) {
            bail!("login timeout expired");
        }
        Ok(self.tables.get(&table).map_or(0, Vec::len) as u64)
    }

    async fn open(&mut self, table: Table, page_size: usize) -> Result<Self::Pages<'_>> {
        let Self { tables, pages, .. } = self;
        Ok(MemoryPages {
            rows: tables.get(&table).map(Vec::as_slice).unwrap_or_default(),
            page_size: page_size.max(1),
            log: pages,
            table,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub rel_type: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    pub nodes: Vec<(NodeLabel, NodeRecord)>,
    pub rels: Vec<Relationship>,
    pub indexes: HashSet<NodeLabel>,
    pub clears: usize,
    /// Number of bulk calls received so far
    pub bulk_calls: usize,
    /// 1-based bulk call numbers that fail
    pub failing_calls: HashSet<usize>,
    /// Relationship types whose bulk calls always fail
    pub failing_rel_types: HashSet<String>,
}

impl MemoryGraph {
    pub fn count(&self, label: NodeLabel) -> usize {
        self.nodes.iter().filter(|(l, _)| *l == label).count()
    }

    pub fn rels_of(&self, rel_type: &str) -> Vec<&Relationship> {
        self.rels.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    pub fn keys(&self, label: NodeLabel) -> Vec<String> {
        let mut keys: Vec<_> = self
            .nodes
            .iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, n)| n.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Order-independent rendering of the whole graph.
    pub fn snapshot(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .nodes
            .iter()
            .map(|(label, node)| format!("({label} {} {:?})", node.key, node.properties))
            .chain(
                self.rels
                    .iter()
                    .map(|r| format!("({})-[{}]->({})", r.start, r.rel_type, r.end)),
            )
            .collect();
        lines.sort();
        lines
    }

    fn next_call(&mut self) -> Result<()> {
        self.bulk_calls += 1;
        if self.failing_calls.contains(&self.bulk_calls) {
            return Err(anyhow!("bulk call {} rejected", self.bulk_calls));
        }
        Ok(())
    }

    fn matching(&self, key: NodeKey, value: &str) -> usize {
        self.nodes
            .iter()
            .filter(|(label, node)| *label == key.label && node.key == value)
            .count()
    }
}

impl GraphSink for MemoryGraph {
    async fn clear(&mut self) -> Result<()> {
        self.clears += 1;
        self.rels.clear();
        self.nodes
            .retain(|(label, _)| !matches!(label, NodeLabel::Artist | NodeLabel::Film));
        Ok(())
    }

    async fn ensure_key_index(&mut self, label: NodeLabel) -> Result<()> {
        self.indexes.insert(label);
        Ok(())
    }

    async fn create_nodes(&mut self, label: NodeLabel, nodes: &[NodeRecord]) -> Result<()> {
        self.next_call()?;
        self.nodes
            .extend(nodes.iter().cloned().map(|node| (label, node)));
        Ok(())
    }

    async fn create_relationships(
        &mut self,
        rel_type: &str,
        start: NodeKey,
        end: NodeKey,
        rels: &[RelTuple],
    ) -> Result<()> {
        self.next_call()?;
        if self.failing_rel_types.contains(rel_type) {
            bail!("{rel_type} write rejected");
        }
        let mut created = Vec::new();
        for rel in rels {
            let pairs = self.matching(start, &rel.start) * self.matching(end, &rel.end);
            for _ in 0..pairs {
                created.push(Relationship {
                    rel_type: rel_type.to_string(),
                    start: rel.start.clone(),
                    end: rel.end.clone(),
                });
            }
        }
        self.rels.extend(created);
        Ok(())
    }
}
