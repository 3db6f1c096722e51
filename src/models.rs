use anyhow::{bail, Context, Result};
use std::fmt;

/// A single column value read from the relational source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    /// A column type the pipeline has no mapping for, kept as its debug rendering.
    Unsupported(String),
}

impl SqlValue {
    /// Identifier columns may be text (`tt0000001`) or integers; both become text keys.
    /// Empty text is still an id; only NULL and unmapped columns have no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Result<Option<String>> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            SqlValue::Int(i) => Ok(Some(i.to_string())),
            SqlValue::Unsupported(raw) => bail!("expected text, found {raw}"),
        }
    }

    pub fn as_int(&self) -> Result<Option<i64>> {
        match self {
            SqlValue::Null => Ok(None),
            SqlValue::Int(i) => Ok(Some(*i)),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .with_context(|| format!("expected integer, found {s:?}")),
            SqlValue::Unsupported(raw) => bail!("expected integer, found {raw}"),
        }
    }
}

pub type SourceRow = Vec<SqlValue>;

fn column<'r>(row: &'r SourceRow, index: usize, name: &str) -> Result<&'r SqlValue> {
    row.get(index)
        .with_context(|| format!("row has {} columns, missing {name}", row.len()))
}

fn key_column(row: &SourceRow, index: usize, name: &str) -> Result<String> {
    let value = column(row, index, name)?;
    value
        .as_key()
        .with_context(|| format!("{name} is not a usable key: {value:?}"))
}

/// Row of `TFilm`: `idFilm, primaryTitle, startYear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Film {
    pub id: String,
    pub title: Option<String>,
    pub start_year: Option<i64>,
}

impl Film {
    pub fn from_row(row: &SourceRow) -> Result<Self> {
        Ok(Self {
            id: key_column(row, 0, "idFilm")?,
            title: column(row, 1, "primaryTitle")?
                .as_text()
                .context("primaryTitle")?,
            start_year: column(row, 2, "startYear")?
                .as_int()
                .context("startYear")?,
        })
    }

    pub fn into_node(self) -> NodeRecord {
        let mut properties = Vec::with_capacity(2);
        if let Some(title) = self.title {
            properties.push(("primaryTitle", PropertyValue::Text(title)));
        }
        if let Some(year) = self.start_year {
            properties.push(("startYear", PropertyValue::Int(year)));
        }
        NodeRecord {
            key: self.id,
            properties,
        }
    }
}

/// Row of `tArtist`: `idArtist, primaryName, birthYear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: Option<String>,
    pub birth_year: Option<i64>,
}

impl Artist {
    pub fn from_row(row: &SourceRow) -> Result<Self> {
        Ok(Self {
            id: key_column(row, 0, "idArtist")?,
            name: column(row, 1, "primaryName")?
                .as_text()
                .context("primaryName")?,
            birth_year: column(row, 2, "birthYear")?
                .as_int()
                .context("birthYear")?,
        })
    }

    pub fn into_node(self) -> NodeRecord {
        let mut properties = Vec::with_capacity(2);
        if let Some(name) = self.name {
            properties.push(("primaryName", PropertyValue::Text(name)));
        }
        if let Some(year) = self.birth_year {
            properties.push(("birthYear", PropertyValue::Int(year)));
        }
        NodeRecord {
            key: self.id,
            properties,
        }
    }
}

/// Row of `tJob`: `idArtist, category, idFilm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub artist_id: String,
    pub category: Option<String>,
    pub film_id: String,
}

impl Credit {
    pub fn from_row(row: &SourceRow) -> Result<Self> {
        Ok(Self {
            artist_id: key_column(row, 0, "idArtist")?,
            category: column(row, 1, "category")?.as_text().context("category")?,
            film_id: key_column(row, 2, "idFilm")?,
        })
    }

    pub fn kind(&self) -> Option<CreditKind> {
        self.category.as_deref().and_then(CreditKind::from_category)
    }
}

/// The credit categories that become relationships. Anything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreditKind {
    ActedIn,
    Directed,
    Produced,
    Composed,
}

impl CreditKind {
    pub const ALL: [CreditKind; 4] = [
        CreditKind::ActedIn,
        CreditKind::Directed,
        CreditKind::Produced,
        CreditKind::Composed,
    ];

    /// Exact, case-sensitive match on the source category text.
    pub fn from_category(category: &str) -> Option<Self> {
        match category {
            "acted in" => Some(CreditKind::ActedIn),
            "directed" => Some(CreditKind::Directed),
            "produced" => Some(CreditKind::Produced),
            "composed" => Some(CreditKind::Composed),
            _ => None,
        }
    }

    pub fn rel_type(self) -> &'static str {
        match self {
            CreditKind::ActedIn => "ACTED_IN",
            CreditKind::Directed => "DIRECTED",
            CreditKind::Produced => "PRODUCED",
            CreditKind::Composed => "COMPOSED",
        }
    }
}

impl fmt::Display for CreditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Film,
    Artist,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Film => "Film",
            NodeLabel::Artist => "Artist",
        }
    }

    pub fn key_property(self) -> &'static str {
        match self {
            NodeLabel::Film => "idFilm",
            NodeLabel::Artist => "idArtist",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Int(i64),
}

/// A node ready for bulk creation. `key` is stored under the label's key property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub key: String,
    pub properties: Vec<(&'static str, PropertyValue)>,
}

/// Identifies relationship endpoints by `(label, key property)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub property: &'static str,
}

impl NodeKey {
    pub fn of(label: NodeLabel) -> Self {
        Self {
            label,
            property: label.key_property(),
        }
    }
}

/// Start and end key values of a property-less relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelTuple {
    pub start: String,
    pub end: String,
}
