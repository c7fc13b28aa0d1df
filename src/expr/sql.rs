//! Optional SQL syntax check for entity expressions using sqlparser-rs.
//!
//! The expression is wrapped in `SELECT ...` and parsed with the configured
//! dialect. This is a syntax check only; names are never resolved against
//! any schema. Dialects sqlparser cannot parse (MDX, Tableau calculations)
//! are skipped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    AnsiDialect, DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SnowflakeDialect,
};
use sqlparser::parser::Parser;

/// Expression dialects a model may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Ansi,
    Snowflake,
    Databricks,
    Postgres,
    Redshift,
    MySql,
    DuckDb,
    BigQuery,
    TSql,
    Mdx,
    Tableau,
}

impl SqlDialect {
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Ansi => "ansi",
            SqlDialect::Snowflake => "snowflake",
            SqlDialect::Databricks => "databricks",
            SqlDialect::Postgres => "postgres",
            SqlDialect::Redshift => "redshift",
            SqlDialect::MySql => "mysql",
            SqlDialect::DuckDb => "duckdb",
            SqlDialect::BigQuery => "bigquery",
            SqlDialect::TSql => "tsql",
            SqlDialect::Mdx => "mdx",
            SqlDialect::Tableau => "tableau",
        }
    }

    /// False for expression languages sqlparser cannot check.
    pub fn is_sql(self) -> bool {
        !matches!(self, SqlDialect::Mdx | SqlDialect::Tableau)
    }

    /// The sqlparser dialect, or `None` for dialects that are not SQL.
    fn parser_dialect(self) -> Option<Box<dyn sqlparser::dialect::Dialect>> {
        let dialect: Box<dyn sqlparser::dialect::Dialect> = match self {
            SqlDialect::Ansi => Box::new(AnsiDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SqlDialect::Databricks => Box::new(GenericDialect {}),
            SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SqlDialect::Redshift => Box::new(PostgreSqlDialect {}), // Redshift is Postgres-like
            SqlDialect::MySql => Box::new(MySqlDialect {}),
            SqlDialect::DuckDb => Box::new(DuckDbDialect {}),
            SqlDialect::BigQuery => Box::new(GenericDialect {}),
            SqlDialect::TSql => Box::new(MsSqlDialect {}),
            SqlDialect::Mdx | SqlDialect::Tableau => return None,
        };
        Some(dialect)
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dialect = match s.trim().to_ascii_lowercase().as_str() {
            "ansi" | "ansi_sql" | "generic" | "sql" => SqlDialect::Ansi,
            "snowflake" => SqlDialect::Snowflake,
            "databricks" | "spark" => SqlDialect::Databricks,
            "postgres" | "postgresql" => SqlDialect::Postgres,
            "redshift" => SqlDialect::Redshift,
            "mysql" => SqlDialect::MySql,
            "duckdb" => SqlDialect::DuckDb,
            "bigquery" => SqlDialect::BigQuery,
            "tsql" | "mssql" | "sqlserver" => SqlDialect::TSql,
            "mdx" => SqlDialect::Mdx,
            "tableau" => SqlDialect::Tableau,
            other => return Err(format!("unknown SQL dialect '{}'", other)),
        };
        Ok(dialect)
    }
}

/// Check that `SELECT <expr>` parses in `dialect`.
pub fn check_sql(expr: &str, dialect: SqlDialect) -> Result<(), String> {
    let Some(parser_dialect) = dialect.parser_dialect() else {
        tracing::debug!(%dialect, "skipping SQL check for non-SQL dialect");
        return Ok(());
    };

    // Wrap the expression in SELECT to make it a complete statement
    let sql = format!("SELECT {}", expr);
    Parser::parse_sql(parser_dialect.as_ref(), &sql)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
