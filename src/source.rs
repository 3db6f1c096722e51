//! Paginated extraction from the relational store.
//!
//! [`RelationalSource`] hides the driver: the pipeline asks for a row count and
//! a [`PageReader`] that hands back fixed-size pages until the result set is
//! exhausted. [`SqlServerSource`] is the production implementation over TDS.

use crate::config::SqlServerConfig;
use crate::models::{SourceRow, SqlValue};
use anyhow::{Context, Result};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::fmt;
use tiberius::{AuthMethod, Client, ColumnData, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// Source tables read by the export, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Films,
    Artists,
    Credits,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Films => "TFilm",
            Table::Artists => "tArtist",
            Table::Credits => "tJob",
        }
    }

    pub fn count_sql(self) -> String {
        format!("SELECT COUNT(1) FROM {}", self.name())
    }

    pub fn select_sql(self) -> &'static str {
        match self {
            Table::Films => "SELECT idFilm, primaryTitle, startYear FROM TFilm",
            Table::Artists => "SELECT idArtist, primaryName, birthYear FROM tArtist",
            Table::Credits => "SELECT idArtist, category, idFilm FROM tJob",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lazy, finite, non-restartable sequence of row pages.
#[allow(async_fn_in_trait)]
pub trait PageReader {
    /// Next page of at most the configured page size, `None` once exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<SourceRow>>>;
}

#[allow(async_fn_in_trait)]
pub trait RelationalSource {
    type Pages<'a>: PageReader
    where
        Self: 'a;

    /// Total row count, used for progress display only.
    async fn count(&mut self, table: Table) -> Result<u64>;

    async fn open(&mut self, table: Table, page_size: usize) -> Result<Self::Pages<'_>>;
}

pub struct SqlServerSource {
    client: Client<Compat<TcpStream>>,
}

impl SqlServerSource {
    pub async fn connect(config: &SqlServerConfig) -> Result<Self> {
        let mut tds = Config::new();
        tds.host(&config.host);
        tds.port(config.port);
        tds.database(&config.database);
        tds.authentication(AuthMethod::sql_server(&config.user, &config.password));
        if config.trust_cert {
            tds.trust_cert();
        }

        let client = match open_client(tds.clone(), &config.host, config.port).await {
            Ok(client) => client,
            // Azure SQL gateways answer the login with a redirect to the real node.
            Err(ConnectError::Routing { host, port }) => {
                info!(%host, port, "SQL Server redirected connection");
                tds.host(&host);
                tds.port(port);
                open_client(tds, &host, port)
                    .await
                    .map_err(ConnectError::into_anyhow)?
            }
            Err(e) => return Err(e.into_anyhow()),
        };

        info!(
            server = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to SQL Server"
        );
        Ok(Self { client })
    }
}

enum ConnectError {
    Routing { host: String, port: u16 },
    Other(anyhow::Error),
}

impl ConnectError {
    fn into_anyhow(self) -> anyhow::Error {
        match self {
            ConnectError::Routing { host, port } => {
                anyhow::anyhow!("SQL Server redirected more than once (last: {host}:{port})")
            }
            ConnectError::Other(e) => e,
        }
    }
}

async fn open_client(
    config: Config,
    host: &str,
    port: u16,
) -> std::result::Result<Client<Compat<TcpStream>>, ConnectError> {
    // `Config::get_addr` drops the brackets an IPv6 literal needs.
    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("Cannot reach SQL Server at {addr}"))
        .map_err(ConnectError::Other)?;
    tcp.set_nodelay(true)
        .context("Failed to set TCP_NODELAY")
        .map_err(ConnectError::Other)?;

    match Client::connect(config, tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            Err(ConnectError::Routing { host, port })
        }
        Err(e) => Err(ConnectError::Other(
            anyhow::Error::new(e).context(format!("SQL Server login failed at {addr}")),
        )),
    }
}

impl RelationalSource for SqlServerSource {
    type Pages<'a>
        = TdsPages<'a>
    where
        Self: 'a;

    async fn count(&mut self, table: Table) -> Result<u64> {
        let sql = table.count_sql();
        let row = self
            .client
            .query(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to execute: {sql}"))?
            .into_row()
            .await
            .with_context(|| format!("Failed to read result of: {sql}"))?;

        let count = match row {
            Some(row) => row
                .into_iter()
                .next()
                .map(sql_value)
                .unwrap_or(SqlValue::Null)
                .as_int()?
                .unwrap_or(0),
            None => 0,
        };
        debug!(%table, count, "Counted source rows");
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn open(&mut self, table: Table, page_size: usize) -> Result<Self::Pages<'_>> {
        let sql = table.select_sql();
        let rows = self
            .client
            .query(sql, &[])
            .await
            .with_context(|| format!("Failed to execute: {sql}"))?
            .into_row_stream()
            .map_ok(|row| row.into_iter().map(sql_value).collect())
            .boxed();
        Ok(TdsPages::new(rows, page_size, table))
    }
}

/// Chunks a decoded row stream into pages of `page_size` rows.
pub struct TdsPages<'a> {
    rows: BoxStream<'a, tiberius::Result<SourceRow>>,
    page_size: usize,
    table: Table,
}

impl<'a> TdsPages<'a> {
    fn new(rows: BoxStream<'a, tiberius::Result<SourceRow>>, page_size: usize, table: Table) -> Self {
        Self {
            rows,
            page_size: page_size.max(1),
            table,
        }
    }
}

impl PageReader for TdsPages<'_> {
    async fn next_page(&mut self) -> Result<Option<Vec<SourceRow>>> {
        let mut page = Vec::with_capacity(self.page_size);
        while page.len() < self.page_size {
            match self
                .rows
                .try_next()
                .await
                .with_context(|| format!("Failed to fetch rows from {}", self.table))?
            {
                Some(row) => page.push(row),
                None => break,
            }
        }
        Ok((!page.is_empty()).then_some(page))
    }
}

fn sql_value(data: ColumnData<'static>) -> SqlValue {
    fn int<T: Into<i64>>(v: Option<T>) -> SqlValue {
        v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into()))
    }

    match data {
        ColumnData::U8(v) => int(v),
        ColumnData::I16(v) => int(v),
        ColumnData::I32(v) => int(v),
        ColumnData::I64(v) => int(v),
        ColumnData::String(v) => v.map_or(SqlValue::Null, |s| SqlValue::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, |g| SqlValue::Text(g.to_string())),
        other => SqlValue::Unsupported(format!("{other:?}")),
    }
}
