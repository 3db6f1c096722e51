use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

/// Rows fetched from the source and written to the graph per bulk call
pub const BATCH_SIZE: usize = 10_000;

/// Default SQL Server TCP port
pub const DEFAULT_SQL_PORT: u16 = 1433;

/// Connection parameters. Every value can come from the environment (or `.env`) or a flag.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// SQL Server host (`host`, `host:port`, `host,port`, optional `tcp:` prefix)
    #[arg(long, env = "TPBDD_SERVER")]
    pub sql_server: String,

    /// SQL Server database name
    #[arg(long, env = "TPBDD_DB")]
    pub sql_database: String,

    /// SQL Server login
    #[arg(long, env = "TPBDD_USERNAME")]
    pub sql_user: String,

    /// SQL Server password
    #[arg(long, env = "TPBDD_PASSWORD", hide_env_values = true)]
    pub sql_password: String,

    /// ODBC driver name (accepted for compatibility, unused by the native client)
    #[arg(long, env = "ODBC_DRIVER")]
    pub odbc_driver: Option<String>,

    /// Trust the SQL Server TLS certificate without validation
    #[arg(long, env = "TPBDD_TRUST_CERT")]
    pub trust_cert: bool,

    /// Neo4j Bolt URI
    #[arg(long, env = "TPBDD_NEO4J_SERVER")]
    pub neo4j_uri: String,

    /// Neo4j user
    #[arg(long, env = "TPBDD_NEO4J_USER")]
    pub neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "TPBDD_NEO4J_PASSWORD", hide_env_values = true)]
    pub neo4j_password: String,
}

#[derive(Debug, Clone)]
pub struct SqlServerConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub trust_cert: bool,
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sql: SqlServerConfig,
    pub neo4j: Neo4jConfig,
    pub odbc_driver: Option<String>,
}

impl TryFrom<ConnectionArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: ConnectionArgs) -> Result<Self> {
        let (host, port) = parse_server_address(&args.sql_server)?;
        Ok(Self {
            sql: SqlServerConfig {
                host,
                port,
                database: non_empty(args.sql_database, "TPBDD_DB")?,
                user: non_empty(args.sql_user, "TPBDD_USERNAME")?,
                password: args.sql_password,
                trust_cert: args.trust_cert,
            },
            neo4j: Neo4jConfig {
                uri: non_empty(args.neo4j_uri, "TPBDD_NEO4J_SERVER")?,
                user: args.neo4j_user,
                password: args.neo4j_password,
            },
            odbc_driver: args.odbc_driver.filter(|d| !d.trim().is_empty()),
        })
    }
}

fn non_empty(value: String, var: &str) -> Result<String> {
    if value.trim().is_empty() {
        bail!("{var} must not be empty");
    }
    Ok(value)
}

/// Splits a server address into host and port, accepting the ODBC forms
/// `tcp:host`, `host,port` as well as `host:port`. IPv6 literals need brackets
/// to carry a colon port (`[::1]:1434`); a bare literal uses the default port.
pub fn parse_server_address(raw: &str) -> Result<(String, u16)> {
    let trimmed = raw.trim();
    let address = trimmed.strip_prefix("tcp:").unwrap_or(trimmed);
    if address.is_empty() {
        bail!("TPBDD_SERVER must not be empty");
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .with_context(|| format!("Unclosed '[' in SQL Server address {raw:?}"))?;
        if host.is_empty() {
            bail!("Missing SQL Server host in {raw:?}");
        }
        let port = match tail {
            "" => DEFAULT_SQL_PORT,
            _ => match tail.strip_prefix([':', ',']) {
                Some(port) => parse_port(port, raw)?,
                None => bail!("Unexpected {tail:?} after SQL Server host in {raw:?}"),
            },
        };
        return Ok((host.to_string(), port));
    }

    let split = match address.rsplit_once(',') {
        Some(split) => Some(split),
        // More than one colon is an unbracketed IPv6 literal, not `host:port`.
        None => address
            .rsplit_once(':')
            .filter(|(host, _)| !host.contains(':')),
    };
    match split {
        Some((host, port)) if !host.trim().is_empty() => {
            Ok((host.trim().to_string(), parse_port(port, raw)?))
        }
        Some(_) => bail!("Missing SQL Server host in {raw:?}"),
        None => Ok((address.to_string(), DEFAULT_SQL_PORT)),
    }
}

fn parse_port(port: &str, raw: &str) -> Result<u16> {
    port.trim()
        .parse::<u16>()
        .with_context(|| format!("Invalid SQL Server port in {raw:?}"))
}

/// Loads `.env` from the working directory, overriding already-set variables.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv_override() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context("Failed to load .env file"),
    }
}
