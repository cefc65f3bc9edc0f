//! Shared extras side table: sparse key-value facts attached to any entity.
//!
//! One row per `(class_name, class_row_id, field_key)`; saves upsert, never
//! duplicate. Insert and update each stamp their own timestamp and acting
//! member columns.

use crate::error::AppError;
use crate::sql::{quoted, QueryBuf};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

/// Unprefixed name of the side table.
pub const EXTRA_TABLE: &str = "extra";

/// Create the extras side table if missing. The unique constraint backs the
/// upsert invariant.
pub async fn ensure_extra_table(pool: &PgPool, prefix: &str) -> Result<(), AppError> {
    let table = quoted(&format!("{}{}", prefix, EXTRA_TABLE));
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            class_name TEXT NOT NULL,
            class_row_id BIGINT NOT NULL,
            field_key TEXT NOT NULL,
            field_value TEXT,
            date_insert TIMESTAMPTZ,
            date_update TIMESTAMPTZ,
            member_id_insert BIGINT,
            member_id_update BIGINT,
            UNIQUE (class_name, class_row_id, field_key)
        )
        "#,
        table
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// All extra rows for one entity row, merged as top-level fields by the
/// caller.
pub(crate) fn select_extras(prefix: &str, class_name: &str, row_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let p1 = q.push_param(Value::String(class_name.to_string()));
    let p2 = q.push_param(row_id.into());
    q.sql = format!(
        "SELECT field_key, field_value FROM {} WHERE class_name = ${} AND class_row_id = ${}",
        quoted(&format!("{}{}", prefix, EXTRA_TABLE)),
        p1,
        p2
    );
    q
}

/// Existing row id for one key, deciding insert vs. update.
pub(crate) fn select_extra_row(prefix: &str, class_name: &str, row_id: i64, key: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let p1 = q.push_param(Value::String(class_name.to_string()));
    let p2 = q.push_param(row_id.into());
    let p3 = q.push_param(Value::String(key.to_string()));
    q.sql = format!(
        "SELECT id FROM {} WHERE class_name = ${} AND class_row_id = ${} AND field_key = ${}",
        quoted(&format!("{}{}", prefix, EXTRA_TABLE)),
        p1,
        p2,
        p3
    );
    q
}

pub(crate) fn insert_extra(
    prefix: &str,
    class_name: &str,
    row_id: i64,
    key: &str,
    value: &str,
    now: DateTime<Utc>,
    member_id: Option<i64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = vec!["class_name", "class_row_id", "field_key", "field_value"];
    let mut placeholders = vec![
        format!("${}", q.push_param(Value::String(class_name.to_string()))),
        format!("${}", q.push_param(row_id.into())),
        format!("${}", q.push_param(Value::String(key.to_string()))),
        format!("${}", q.push_param(Value::String(value.to_string()))),
    ];
    cols.push("date_insert");
    placeholders.push(format!(
        "${}::timestamptz",
        q.push_param(Value::String(now.to_rfc3339()))
    ));
    if let Some(member_id) = member_id {
        cols.push("member_id_insert");
        placeholders.push(format!("${}", q.push_param(member_id.into())));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(&format!("{}{}", prefix, EXTRA_TABLE)),
        cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", ")
    );
    q
}

pub(crate) fn update_extra(
    prefix: &str,
    extra_id: i64,
    value: &str,
    now: DateTime<Utc>,
    member_id: Option<i64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = vec![
        format!(
            "{} = ${}",
            quoted("field_value"),
            q.push_param(Value::String(value.to_string()))
        ),
        format!(
            "{} = ${}::timestamptz",
            quoted("date_update"),
            q.push_param(Value::String(now.to_rfc3339()))
        ),
    ];
    if let Some(member_id) = member_id {
        sets.push(format!(
            "{} = ${}",
            quoted("member_id_update"),
            q.push_param(member_id.into())
        ));
    }
    let id_param = q.push_param(extra_id.into());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        quoted(&format!("{}{}", prefix, EXTRA_TABLE)),
        sets.join(", "),
        quoted("id"),
        id_param
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_extras_keys_on_class_and_row() {
        let q = select_extras("vellum_", "post", 42);
        assert_eq!(
            q.sql,
            "SELECT field_key, field_value FROM \"vellum_extra\" WHERE class_name = $1 AND class_row_id = $2"
        );
        assert_eq!(q.params, vec![json!("post"), json!(42)]);
    }

    #[test]
    fn insert_stamps_insert_columns() {
        let now = Utc::now();
        let q = insert_extra("vellum_", "post", 42, "subtitle", "hello", now, Some(7));
        assert_eq!(
            q.sql,
            "INSERT INTO \"vellum_extra\" (\"class_name\", \"class_row_id\", \"field_key\", \"field_value\", \"date_insert\", \"member_id_insert\") VALUES ($1, $2, $3, $4, $5::timestamptz, $6)"
        );
        assert_eq!(q.params.len(), 6);
        assert_eq!(q.params[5], json!(7));
    }

    #[test]
    fn insert_without_member_skips_actor_column() {
        let q = insert_extra("vellum_", "post", 42, "subtitle", "hello", Utc::now(), None);
        assert!(!q.sql.contains("member_id_insert"));
        assert_eq!(q.params.len(), 5);
    }

    #[test]
    fn update_stamps_update_columns_and_keys_on_row_id() {
        let q = update_extra("vellum_", 9, "world", Utc::now(), Some(7));
        assert_eq!(
            q.sql,
            "UPDATE \"vellum_extra\" SET \"field_value\" = $1, \"date_update\" = $2::timestamptz, \"member_id_update\" = $3 WHERE \"id\" = $4"
        );
        assert_eq!(q.params[0], json!("world"));
        assert_eq!(q.params[3], json!(9));
    }
}
