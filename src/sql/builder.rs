//! Builds parameterized SELECT, INSERT, UPDATE, DELETE statements.

use crate::repo::query::{Conditions, Projection};
use serde_json::Value;

/// Quote an identifier for PostgreSQL (safe: only from repository config).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a string literal for interpolation into a raw clause.
pub(crate) fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub(crate) fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

pub(crate) fn projection_sql(fields: &Projection) -> String {
    match fields {
        Projection::All => "*".into(),
        Projection::Columns(cols) => cols
            .iter()
            .map(|c| quoted(c))
            .collect::<Vec<_>>()
            .join(", "),
        Projection::Raw(raw) => raw.clone(),
    }
}

/// Render equality conditions into WHERE clauses. NULL values render as
/// `col IS NULL`; everything else binds a parameter. Raw clauses pass
/// through verbatim.
pub(crate) fn condition_clauses(q: &mut QueryBuf, conditions: &Conditions) -> Vec<String> {
    match conditions {
        Conditions::None => Vec::new(),
        Conditions::Raw(raw) => vec![raw.clone()],
        Conditions::Equals(pairs) => pairs
            .iter()
            .map(|(col, val)| {
                if val.is_null() {
                    format!("{} IS NULL", quoted(col))
                } else {
                    let n = q.push_param(val.clone());
                    format!("{} = ${}", quoted(col), n)
                }
            })
            .collect(),
    }
}

/// SELECT with optional conditions, sort, limit and offset. `table` is the
/// already-prefixed table name.
pub fn select(
    table: &str,
    fields: &Projection,
    conditions: &Conditions,
    sort: Option<&str>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sql = format!("SELECT {} FROM {}", projection_sql(fields), quoted(table));
    let clauses = condition_clauses(&mut q, conditions);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    if let Some(sort) = sort {
        sql.push_str(" ORDER BY ");
        sql.push_str(sort);
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    q.sql = sql;
    q
}

/// INSERT from scalar fields, returning the generated primary key. An empty
/// field list inserts defaults only.
pub fn insert(table: &str, fields: &[(String, Value)], primary_key: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    if fields.is_empty() {
        q.sql = format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quoted(table),
            quoted(primary_key)
        );
        return q;
    }
    let mut cols = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    for (col, val) in fields {
        let n = q.push_param(val.clone());
        cols.push(quoted(col));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(table),
        cols.join(", "),
        placeholders.join(", "),
        quoted(primary_key)
    );
    q
}

/// UPDATE keyed on the primary key; SET only the given scalar fields.
pub fn update(table: &str, fields: &[(String, Value)], primary_key: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(fields.len());
    for (col, val) in fields {
        let n = q.push_param(val.clone());
        sets.push(format!("{} = ${}", quoted(col), n));
    }
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        quoted(table),
        sets.join(", "),
        quoted(primary_key),
        id_param
    );
    q
}

/// DELETE keyed on the primary key.
pub fn delete(table: &str, primary_key: &str, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        quoted(table),
        quoted(primary_key),
        id_param
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_all_without_conditions() {
        let q = select("vellum_post", &Projection::All, &Conditions::None, None, None, None);
        assert_eq!(q.sql, "SELECT * FROM \"vellum_post\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn select_binds_equality_and_renders_null() {
        let conds = Conditions::Equals(vec![
            ("status".into(), json!("online")),
            ("deleted_at".into(), Value::Null),
        ]);
        let q = select(
            "vellum_post",
            &Projection::Columns(vec!["id".into(), "title".into()]),
            &conds,
            Some("id DESC"),
            Some(10),
            Some(20),
        );
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"title\" FROM \"vellum_post\" WHERE \"status\" = $1 AND \"deleted_at\" IS NULL ORDER BY id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!("online")]);
    }

    #[test]
    fn raw_conditions_pass_through() {
        let q = select(
            "vellum_post",
            &Projection::Raw("COUNT(\"id\") AS count".into()),
            &Conditions::Raw("views_total > 10".into()),
            None,
            None,
            None,
        );
        assert_eq!(
            q.sql,
            "SELECT COUNT(\"id\") AS count FROM \"vellum_post\" WHERE views_total > 10"
        );
    }

    #[test]
    fn insert_returns_generated_key() {
        let fields = vec![
            ("title".into(), json!("hello")),
            ("views_total".into(), json!(0)),
        ];
        let q = insert("vellum_post", &fields, "id");
        assert_eq!(
            q.sql,
            "INSERT INTO \"vellum_post\" (\"title\", \"views_total\") VALUES ($1, $2) RETURNING \"id\""
        );
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn insert_without_fields_uses_defaults() {
        let q = insert("vellum_post", &[], "id");
        assert_eq!(q.sql, "INSERT INTO \"vellum_post\" DEFAULT VALUES RETURNING \"id\"");
    }

    #[test]
    fn update_keys_on_primary_key_last() {
        let fields = vec![("title".into(), json!("hi"))];
        let q = update("vellum_post", &fields, "id", &json!(7));
        assert_eq!(
            q.sql,
            "UPDATE \"vellum_post\" SET \"title\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(q.params, vec![json!("hi"), json!(7)]);
    }

    #[test]
    fn delete_binds_id() {
        let q = delete("vellum_post", "id", &json!(3));
        assert_eq!(q.sql, "DELETE FROM \"vellum_post\" WHERE \"id\" = $1");
        assert_eq!(q.params, vec![json!(3)]);
    }
}
