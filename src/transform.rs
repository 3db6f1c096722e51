use crate::models::{Artist, Credit, CreditKind, Film, NodeRecord, RelTuple, SourceRow};
use anyhow::Result;
use tracing::warn;

/// Node records decoded from one page, plus the rows that could not be decoded.
#[derive(Debug, Default)]
pub struct NodeBatch {
    pub records: Vec<NodeRecord>,
    pub skipped: u64,
}

pub fn film_nodes(rows: &[SourceRow]) -> NodeBatch {
    node_batch(rows, |row| Film::from_row(row).map(Film::into_node))
}

pub fn artist_nodes(rows: &[SourceRow]) -> NodeBatch {
    node_batch(rows, |row| Artist::from_row(row).map(Artist::into_node))
}

fn node_batch<F>(rows: &[SourceRow], decode: F) -> NodeBatch
where
    F: Fn(&SourceRow) -> Result<NodeRecord>,
{
    let mut batch = NodeBatch {
        records: Vec::with_capacity(rows.len()),
        skipped: 0,
    };
    for row in rows {
        match decode(row) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                batch.skipped += 1;
                warn!(error = %format!("{e:#}"), "Skipping undecodable row");
            }
        }
    }
    batch
}

/// Credit rows of one page grouped by relationship type.
#[derive(Debug)]
pub struct RelationshipBuckets {
    buckets: [(CreditKind, Vec<RelTuple>); 4],
    pub dropped: u64,
    pub skipped: u64,
}

impl Default for RelationshipBuckets {
    fn default() -> Self {
        Self {
            buckets: CreditKind::ALL.map(|kind| (kind, Vec::new())),
            dropped: 0,
            skipped: 0,
        }
    }
}

impl RelationshipBuckets {
    fn push(&mut self, kind: CreditKind, tuple: RelTuple) {
        if let Some((_, bucket)) = self.buckets.iter_mut().find(|(k, _)| *k == kind) {
            bucket.push(tuple);
        }
    }

    #[cfg(test)]
    fn get(&self, kind: CreditKind) -> &[RelTuple] {
        self.buckets
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, bucket)| bucket.as_slice())
            .unwrap_or_default()
    }

    /// Buckets with at least one tuple, in vocabulary order.
    pub fn non_empty(&self) -> impl Iterator<Item = (CreditKind, &[RelTuple])> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(kind, bucket)| (*kind, bucket.as_slice()))
    }

    #[cfg(test)]
    fn total(&self) -> usize {
        self.buckets.iter().map(|(_, bucket)| bucket.len()).sum()
    }
}

pub fn group_credits(rows: &[SourceRow]) -> RelationshipBuckets {
    let mut grouped = RelationshipBuckets::default();
    for row in rows {
        let credit = match Credit::from_row(row) {
            Ok(credit) => credit,
            Err(e) => {
                grouped.skipped += 1;
                warn!(error = %format!("{e:#}"), "Skipping undecodable credit row");
                continue;
            }
        };
        match credit.kind() {
            Some(kind) => grouped.push(
                kind,
                RelTuple {
                    start: credit.artist_id,
                    end: credit.film_id,
                },
            ),
            None => grouped.dropped += 1,
        }
    }
    grouped
}
