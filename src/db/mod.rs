//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The driver
//! is chosen from configuration and hidden behind the `DatabasePool` trait.
//!
//! # Usage
//!
//! ```ignore
//! use youthbridge::config::DatabaseConfig;
//! use youthbridge::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```
//!
//! Repositories write each query once and run it through [`with_pool!`],
//! which expands the body for the concrete SQLite and MySQL pool types.
//! Both dialects accept `?` placeholders, so the SQL text is shared except
//! where a statement genuinely differs.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Run a query body against the concrete pool behind a `DynDatabasePool`.
///
/// The closure-like body is expanded once per driver with the identifier
/// bound to `&SqlitePool` or `&MySqlPool`, so rows and query results are
/// concrete types inside it. The enclosing function must return
/// `anyhow::Result`.
#[macro_export]
macro_rules! with_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $p = $pool
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $p = $pool
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

/// Bind a slice of [`SqlArg`] values to a query, in order.
#[macro_export]
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args.iter() {
            q = match arg {
                $crate::db::SqlArg::Int(v) => q.bind(*v),
                $crate::db::SqlArg::Text(v) => q.bind(v.clone()),
                $crate::db::SqlArg::Bool(v) => q.bind(*v),
                $crate::db::SqlArg::Time(v) => q.bind(*v),
            };
        }
        q
    }};
}

/// A bind value for queries whose WHERE clause is assembled at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
    Bool(bool),
    Time(chrono::DateTime<chrono::Utc>),
}

/// Accumulates `AND`-joined conditions and their bind values.
#[derive(Debug, Default)]
pub struct Filter {
    clauses: Vec<String>,
    args: Vec<SqlArg>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition with its bind values
    pub fn push(&mut self, clause: impl Into<String>, args: impl IntoIterator<Item = SqlArg>) {
        self.clauses.push(clause.into());
        self.args.extend(args);
    }

    /// Substring match against a folded search column
    pub fn push_search(&mut self, column: &str, needle: &str) {
        self.clauses.push(format!("{} LIKE ? ESCAPE '!'", column));
        self.args
            .push(SqlArg::Text(format!("%{}%", escape_like(&fold_key(needle)))));
    }

    /// Exact match against a folded key column
    pub fn push_key(&mut self, column: &str, value: &str) {
        self.clauses.push(format!("{} = ?", column));
        self.args.push(SqlArg::Text(fold_key(value)));
    }

    /// Match one entry of a folded JSON string array column
    pub fn push_json_term(&mut self, column: &str, term: &str) {
        let encoded = serde_json::to_string(&fold_key(term)).unwrap_or_default();
        self.clauses.push(format!("{} LIKE ? ESCAPE '!'", column));
        self.args
            .push(SqlArg::Text(format!("%{}%", escape_like(&encoded))));
    }

    /// ` WHERE a AND b`, or an empty string
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }
}

fn escape_like(s: &str) -> String {
    s.replace('!', "!!").replace('%', "!%").replace('_', "!_")
}

/// Uniform access to the id generated by an INSERT
pub trait InsertId {
    fn inserted_id(&self) -> i64;
}

impl InsertId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Encode a list of terms for a JSON TEXT column
pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Case-folded form of a filterable value.
///
/// SQLite's `LOWER` and `LIKE` only fold ASCII, so every filterable column
/// has a companion written with this function and queries compare against
/// folded values only.
pub fn fold_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Folded free-text document over several fields, one per line
pub fn search_document(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Folded JSON list of terms, matched by [`Filter::push_json_term`]
pub fn encode_keys(items: &[String]) -> String {
    let folded: Vec<String> = items.iter().map(|item| fold_key(item)).collect();
    encode_list(&folded)
}

/// Decode a JSON TEXT column; malformed content reads as empty
pub fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Parse an enum column, naming the column on failure
pub fn parse_column<T>(value: &str, column: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value
        .parse()
        .map_err(|e: anyhow::Error| e.context(format!("Invalid value in column {}", column)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_where_sql() {
        let mut filter = Filter::new();
        assert_eq!(filter.where_sql(), "");

        filter.push("status = ?", [SqlArg::Text("open".into())]);
        filter.push("remote = ?", [SqlArg::Bool(true)]);
        assert_eq!(filter.where_sql(), " WHERE status = ? AND remote = ?");
        assert_eq!(filter.args().len(), 2);
    }

    #[test]
    fn test_filter_search_escapes_wildcards() {
        let mut filter = Filter::new();
        filter.push_search("search_text", "100%_Rust");
        assert_eq!(filter.args().len(), 1);
        assert_eq!(filter.args()[0], SqlArg::Text("%100!%!_rust%".into()));
        assert_eq!(filter.where_sql(), " WHERE search_text LIKE ? ESCAPE '!'");
    }

    #[test]
    fn test_json_term_pattern() {
        let mut filter = Filter::new();
        filter.push_json_term("tags", " Rust ");
        assert_eq!(filter.args()[0], SqlArg::Text("%\"rust\"%".into()));
    }

    #[test]
    fn test_folding_handles_accents() {
        assert_eq!(fold_key("  ÉTICA "), "ética");
        assert_eq!(search_document(&["ÉTICA Digital", "Ñandú"]), "ética digital\nñandú");
        let keys = encode_keys(&["Álgebra".to_string(), "Diseño".to_string()]);
        assert_eq!(keys, r#"["álgebra","diseño"]"#);

        let mut filter = Filter::new();
        filter.push_json_term("tag_keys", "ÁLGEBRA");
        filter.push_key("category_key", " Educación ");
        assert_eq!(filter.args()[0], SqlArg::Text("%\"álgebra\"%".into()));
        assert_eq!(filter.args()[1], SqlArg::Text("educación".into()));
    }

    #[test]
    fn test_list_encoding() {
        let items = vec!["rust".to_string(), "web \"dev\"".to_string()];
        let raw = encode_list(&items);
        assert_eq!(decode_list(&raw), items);
        assert!(decode_list("not json").is_empty());
        assert_eq!(encode_list(&[]), "[]");
    }
}
