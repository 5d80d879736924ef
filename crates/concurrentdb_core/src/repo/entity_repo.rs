//! Entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the primitive store operations the CRUD engine is built from:
//!   read all / filter / sort, primary-key lookup, insert or upsert, delete.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Queries are validated before SQL is built; field names never reach SQL
//!   text, only bound JSON paths do.
//! - Natural order is insertion order (`rowid`), used as the final tie-break.
//! - The repository never opens transactions; callers wrap write sequences.

use crate::db::DbError;
use crate::model::entity::{Entity, PrimaryKey};
use crate::model::query::{
    json_path, CompareOp, FetchQuery, FieldValue, Filter, QueryError, SortDirection,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidData(String),
    InvalidQuery(QueryError),
    DuplicateKey {
        entity_type: &'static str,
        primary_key: PrimaryKey,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "entity serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
            Self::InvalidQuery(err) => write!(f, "{err}"),
            Self::DuplicateKey {
                entity_type,
                primary_key,
            } => write!(f, "{entity_type} with primary key `{primary_key}` already exists"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidQuery(err) => Some(err),
            Self::InvalidData(_) | Self::DuplicateKey { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::InvalidQuery(value)
    }
}

/// Primitive store operations over one open handle.
pub trait EntityRepository {
    /// Returns every entity of type `T` in natural order.
    fn all<T: Entity>(&self) -> RepoResult<Vec<T>> {
        self.query(&FetchQuery::default())
    }
    /// Returns entities of type `T` matching `query`, filtered then sorted.
    fn query<T: Entity>(&self, query: &FetchQuery) -> RepoResult<Vec<T>>;
    fn find<T: Entity>(&self, primary_key: &str) -> RepoResult<Option<T>>;
    /// Writes `entities`; with `upsert == false` an existing key is an error.
    fn insert<T: Entity>(&self, entities: &[T], upsert: bool) -> RepoResult<usize>;
    /// Deletes one entity; returns whether a row existed.
    fn delete<T: Entity>(&self, primary_key: &str) -> RepoResult<bool>;
    /// Deletes every entity of every type.
    fn delete_all(&self) -> RepoResult<usize>;
    fn count<T: Entity>(&self) -> RepoResult<u64>;
}

/// SQLite-backed entity repository.
///
/// Works on a plain connection or, through deref, on an open transaction.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn query<T: Entity>(&self, query: &FetchQuery) -> RepoResult<Vec<T>> {
        query.validate()?;

        let mut sql = String::from("SELECT body FROM entities WHERE entity_type = ?");
        let mut bind_values = vec![Value::Text(T::ENTITY_TYPE.to_string())];

        if let Some(filter) = &query.filter {
            sql.push_str(" AND ");
            push_filter_sql(filter, &mut sql, &mut bind_values);
        }

        sql.push_str(" ORDER BY ");
        for term in &query.sort {
            sql.push_str("json_extract(body, ?) ");
            sql.push_str(direction_sql(term.direction));
            sql.push_str(", ");
            bind_values.push(Value::Text(json_path(&term.field)));
        }
        let tie_break = query
            .sort
            .last()
            .map_or(SortDirection::Ascending, |term| term.direction);
        sql.push_str("rowid ");
        sql.push_str(direction_sql(tie_break));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            entities.push(parse_body::<T>(&body)?);
        }

        Ok(entities)
    }

    fn find<T: Entity>(&self, primary_key: &str) -> RepoResult<Option<T>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM entities
             WHERE entity_type = ?1
               AND primary_key = ?2;",
        )?;

        let mut rows = stmt.query(params![T::ENTITY_TYPE, primary_key])?;
        if let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            return Ok(Some(parse_body::<T>(&body)?));
        }

        Ok(None)
    }

    fn insert<T: Entity>(&self, entities: &[T], upsert: bool) -> RepoResult<usize> {
        let sql = if upsert {
            "INSERT INTO entities (entity_type, primary_key, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (entity_type, primary_key) DO UPDATE SET
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);"
        } else {
            "INSERT INTO entities (entity_type, primary_key, body)
             VALUES (?1, ?2, ?3);"
        };
        let mut stmt = self.conn.prepare(sql)?;

        for entity in entities {
            let primary_key = entity.primary_key();
            if primary_key.is_empty() {
                return Err(RepoError::InvalidData(format!(
                    "{} has an empty primary key",
                    T::ENTITY_TYPE
                )));
            }
            let body = serialize_body(entity)?;

            match stmt.execute(params![T::ENTITY_TYPE, primary_key.as_str(), body]) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation && !upsert =>
                {
                    return Err(RepoError::DuplicateKey {
                        entity_type: T::ENTITY_TYPE,
                        primary_key,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(entities.len())
    }

    fn delete<T: Entity>(&self, primary_key: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM entities
             WHERE entity_type = ?1
               AND primary_key = ?2;",
            params![T::ENTITY_TYPE, primary_key],
        )?;

        Ok(changed > 0)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM entities;", [])?)
    }

    fn count<T: Entity>(&self) -> RepoResult<u64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?1;",
            [T::ENTITY_TYPE],
            |row| row.get::<_, i64>(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }
}

fn push_filter_sql(filter: &Filter, sql: &mut String, bind_values: &mut Vec<Value>) {
    match filter {
        Filter::Compare { field, op, value } => {
            bind_values.push(Value::Text(json_path(field)));
            match (op, value) {
                (CompareOp::Eq, FieldValue::Null) => {
                    sql.push_str("json_extract(body, ?) IS NULL");
                }
                (CompareOp::Ne, FieldValue::Null) => {
                    sql.push_str("json_extract(body, ?) IS NOT NULL");
                }
                (op, value) => {
                    match comparison_sql(*op) {
                        Some(symbol) => {
                            sql.push_str("json_extract(body, ?) ");
                            sql.push_str(symbol);
                            sql.push_str(" ?");
                        }
                        None => sql.push_str("instr(json_extract(body, ?), ?) > 0"),
                    }
                    bind_values.push(to_sql_value(value));
                }
            }
        }
        Filter::IsNull(field) => {
            sql.push_str("json_extract(body, ?) IS NULL");
            bind_values.push(Value::Text(json_path(field)));
        }
        Filter::And(terms) => push_joined_sql(terms, " AND ", "1", sql, bind_values),
        Filter::Or(terms) => push_joined_sql(terms, " OR ", "0", sql, bind_values),
        // Unknown (NULL) inner results count as false, so `Not` is the exact complement.
        Filter::Not(inner) => {
            sql.push_str("NOT COALESCE(");
            push_filter_sql(inner, sql, bind_values);
            sql.push_str(", 0)");
        }
    }
}

fn push_joined_sql(
    terms: &[Filter],
    separator: &str,
    empty: &str,
    sql: &mut String,
    bind_values: &mut Vec<Value>,
) {
    if terms.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        push_filter_sql(term, sql, bind_values);
    }
    sql.push(')');
}

/// Binary SQL operator for `op`; `None` for operators compiled to a function.
fn comparison_sql(op: CompareOp) -> Option<&'static str> {
    match op {
        CompareOp::Eq => Some("="),
        // Null-safe: an absent field differs from any concrete value.
        CompareOp::Ne => Some("IS NOT"),
        CompareOp::Lt => Some("<"),
        CompareOp::Le => Some("<="),
        CompareOp::Gt => Some(">"),
        CompareOp::Ge => Some(">="),
        CompareOp::Contains => None,
    }
}

fn direction_sql(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        // json_extract yields 1/0 for JSON booleans.
        FieldValue::Bool(value) => Value::Integer(i64::from(*value)),
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Real(value) => Value::Real(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
    }
}

fn serialize_body<T: Entity>(entity: &T) -> RepoResult<String> {
    let value = serde_json::to_value(entity)?;
    if !value.is_object() {
        return Err(RepoError::InvalidData(format!(
            "{} must serialize to a JSON object",
            T::ENTITY_TYPE
        )));
    }
    Ok(value.to_string())
}

fn parse_body<T: Entity>(body: &str) -> RepoResult<T> {
    serde_json::from_str(body).map_err(|err| {
        RepoError::InvalidData(format!(
            "stored {} body does not match its type: {err}",
            T::ENTITY_TYPE
        ))
    })
}
