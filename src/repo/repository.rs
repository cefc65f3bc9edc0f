//! Generic CRUD execution against PostgreSQL, one repository instance per
//! entity type.
//!
//! A repository owns its table name, primary-key field, the table prefix of
//! its database profile, and a cloned handle of that profile's shared pool.
//! Relations and post-processing callables are registered explicitly at
//! construction; there is no reflective dispatch.

use crate::error::AppError;
use crate::inflect;
use crate::pool::PoolRegistry;
use crate::repo::extras;
use crate::repo::query::{Conditions, Projection, QuerySpec};
use crate::repo::record::{is_empty_key, is_empty_value, value_to_text, Record};
use crate::repo::relations::{relation_query, RelationDescriptor};
use crate::sql::{self, quoted, PgBindValue, QueryBuf};
use crate::validate::{validate_record, ValidationReport, ValidationRule};
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

/// Post-processing hook applied to fetched records, registered by name.
pub type Callable = Box<dyn Fn(&mut Record) + Send + Sync>;

/// Who is looking at a record, for view tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Viewer {
    pub member_id: Option<i64>,
    pub guest_id: Option<i64>,
}

pub struct EntityRepository {
    table: String,
    primary_key: String,
    prefix: String,
    pool: PgPool,
    extra_fields: Vec<String>,
    relatives: HashMap<String, RelationDescriptor>,
    callables: HashMap<String, Callable>,
    rules: HashMap<String, ValidationRule>,
}

impl EntityRepository {
    /// Repository over `table` on the given database profile. The profile's
    /// pool handle is cloned, so repeated construction within one request
    /// reuses the same connections.
    pub fn new(pools: &PoolRegistry, profile: &str, table: &str) -> Result<Self, AppError> {
        let (pool, config) = pools.get(profile)?;
        Ok(EntityRepository {
            table: table.to_string(),
            primary_key: "id".into(),
            prefix: config.prefix.clone(),
            pool: pool.clone(),
            extra_fields: Vec::new(),
            relatives: HashMap::new(),
            callables: HashMap::new(),
            rules: HashMap::new(),
        })
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Declare field names that persist through the extras side table
    /// instead of entity columns.
    pub fn with_extra_fields(mut self, fields: &[&str]) -> Self {
        self.extra_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, descriptor: RelationDescriptor) -> Self {
        self.relatives.insert(name.into(), descriptor);
        self
    }

    pub fn with_callable(
        mut self,
        name: impl Into<String>,
        callable: impl Fn(&mut Record) + Send + Sync + 'static,
    ) -> Self {
        self.callables.insert(name.into(), Box::new(callable));
        self
    }

    pub fn with_rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.insert(field.into(), rule);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn prefixed(&self, table: &str) -> String {
        format!("{}{}", self.prefix, table)
    }

    fn entity_table(&self) -> String {
        self.prefixed(&self.table)
    }

    /// Start an explicit transaction on the underlying pool. Commit and
    /// rollback are caller-driven on the returned guard.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// SELECT rows per the query spec. Password fields are stripped from
    /// every returned record; extras, relations and callables are applied
    /// when requested. Returns an empty vec when nothing matches.
    pub async fn find(&self, spec: &QuerySpec) -> Result<Vec<Record>, AppError> {
        let q = sql::select(
            &self.entity_table(),
            &spec.fields,
            &spec.conditions,
            spec.sort.as_deref(),
            spec.limit,
            spec.offset,
        );
        let mut records = self.query_many(&q).await?;

        for record in &mut records {
            record.remove("password");
        }
        if spec.extras {
            for record in &mut records {
                self.find_extras(record).await?;
            }
        }
        if !spec.relations.is_empty() && !self.relatives.is_empty() {
            for record in &mut records {
                if record.row_id(&self.primary_key).is_some() {
                    self.find_relatives(record, &spec.relations).await?;
                }
            }
        }
        if !spec.call.is_empty() {
            self.apply_callables(&spec.call, &mut records);
        }
        Ok(records)
    }

    /// First matching record, or `None` when nothing matches.
    pub async fn find_first(&self, spec: &QuerySpec) -> Result<Option<Record>, AppError> {
        Ok(self.find(spec).await?.into_iter().next())
    }

    /// Number of rows matching `conditions`.
    pub async fn find_count(&self, conditions: Conditions) -> Result<i64, AppError> {
        let spec = QuerySpec {
            fields: Projection::Raw(format!("COUNT({}) AS count", quoted(&self.primary_key))),
            conditions,
            ..Default::default()
        };
        Ok(self
            .find_first(&spec)
            .await?
            .and_then(|r| r.get_i64("count"))
            .unwrap_or(0))
    }

    /// Fetch the tree level whose `parent_id` equals `parent_id`, nesting
    /// each record's own children under the pluralized table-name field.
    /// Recursion ends at levels returning no rows.
    pub fn find_by_levels<'a>(
        &'a self,
        spec: &'a QuerySpec,
        parent_id: Option<i64>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, AppError>> + Send + 'a>> {
        Box::pin(async move {
            let parent = parent_id.map(Value::from).unwrap_or(Value::Null);
            let mut level_spec = spec.clone();
            level_spec.conditions = spec.conditions.with_equal("parent_id", parent);
            let mut rows = self.find(&level_spec).await?;

            let child_field = inflect::pluralize(&self.table);
            for row in &mut rows {
                if let Some(id) = row.row_id(&self.primary_key) {
                    let children = self.find_by_levels(spec, Some(id)).await?;
                    row.insert(
                        child_field.clone(),
                        Value::Array(children.into_iter().map(Record::into_value).collect()),
                    );
                }
            }
            Ok(rows)
        })
    }

    /// Fetch the record for `id` and walk upward through `parent_id`,
    /// nesting each ancestor under `field`, until a record without a parent
    /// is reached.
    pub async fn find_by_parents(
        &self,
        id: i64,
        spec: &QuerySpec,
        field: &str,
    ) -> Result<Option<Record>, AppError> {
        let mut chain: Vec<Record> = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let mut level_spec = spec.clone();
            level_spec.conditions = spec.conditions.with_equal(&self.primary_key, current.into());
            let Some(record) = self.find_first(&level_spec).await? else {
                break;
            };
            next = record.get_i64("parent_id").filter(|p| *p != 0);
            chain.push(record);
        }

        let mut ancestors = chain.into_iter().rev();
        let Some(mut nested) = ancestors.next() else {
            return Ok(None);
        };
        for mut record in ancestors {
            record.insert(field, nested.into_value());
            nested = record;
        }
        Ok(Some(nested))
    }

    /// Flatten the ancestor chain of `id` into an ordered sequence.
    /// `reverse = true` yields root-to-leaf order, `false` leaf-to-root.
    pub async fn find_by_parents_sorted(
        &self,
        id: i64,
        spec: &QuerySpec,
        field: &str,
        reverse: bool,
    ) -> Result<Vec<Record>, AppError> {
        let mut chain = Vec::new();
        let mut current = self.find_by_parents(id, spec, field).await?;
        while let Some(mut record) = current {
            current = record.remove(field).and_then(Record::from_value);
            chain.push(record);
        }
        if reverse {
            chain.reverse();
        }
        Ok(chain)
    }

    /// Persist one record: UPDATE when its primary key is non-empty, INSERT
    /// otherwise (populating the key from the generated identifier).
    /// Extra-declared fields upsert through the side table; object- and
    /// collection-valued fields are excluded from the statement and
    /// reattached unchanged. Statement failure reports `false`, it does not
    /// error.
    pub async fn save(&self, record: &mut Record) -> Result<bool, AppError> {
        let nullable = self.nullable_columns().await?;
        coerce_empty_to_null(record, &nullable);
        let buckets = partition_record(record, &self.primary_key, &self.extra_fields);

        let row_id = if let Some(id) = &buckets.pk_value {
            if !buckets.fields.is_empty() {
                let q = sql::update(&self.entity_table(), &buckets.fields, &self.primary_key, id);
                if let Err(e) = self.execute(&q).await {
                    tracing::warn!(table = %self.table, error = %e, "update failed");
                    return Ok(false);
                }
            }
            value_to_i64(id)
        } else {
            let q = sql::insert(&self.entity_table(), &buckets.fields, &self.primary_key);
            match self.fetch_optional(&q).await {
                Ok(row) => {
                    let id = row
                        .and_then(|r| r.get(&self.primary_key).cloned())
                        .unwrap_or(Value::Null);
                    record.insert(self.primary_key.clone(), id.clone());
                    value_to_i64(&id)
                }
                Err(e) => {
                    tracing::warn!(table = %self.table, error = %e, "insert failed");
                    return Ok(false);
                }
            }
        };

        if !buckets.extras.is_empty() {
            if let Some(row_id) = row_id {
                self.save_extras(row_id, &buckets.extras, buckets.member_id)
                    .await?;
            }
            record.insert("extra", Value::Object(buckets.extras));
        }
        for (key, value) in buckets.relatives {
            record.insert(key, value);
        }
        Ok(true)
    }

    /// DELETE one row by primary key. No cascading.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let q = sql::delete(&self.entity_table(), &self.primary_key, &id.into());
        self.execute(&q).await.map_err(AppError::Db)
    }

    /// Validate `record` against the repository's declared rules.
    pub fn validates(&self, record: &Record) -> ValidationReport {
        validate_record(&self.rules, record)
    }

    /// Merge all extra-attribute rows of `record` as top-level fields.
    pub async fn find_extras(&self, record: &mut Record) -> Result<(), AppError> {
        let Some(row_id) = record.row_id(&self.primary_key) else {
            return Ok(());
        };
        let q = extras::select_extras(&self.prefix, &self.table, row_id);
        for row in self.query_many(&q).await? {
            if let Some(key) = row.get_str("field_key").map(str::to_string) {
                let value = row.get("field_value").cloned().unwrap_or(Value::Null);
                record.insert(key, value);
            }
        }
        Ok(())
    }

    /// Upsert extras for one row. Existing `(class, row, key)` rows update,
    /// others insert; each path stamps its own timestamp and acting-member
    /// columns. Empty values are skipped, never written.
    async fn save_extras(
        &self,
        row_id: i64,
        extras: &Map<String, Value>,
        member_id: Option<i64>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        for (key, value) in extras {
            if is_empty_value(value) {
                continue;
            }
            let text = value_to_text(value);
            let existing = self
                .fetch_optional(&extras::select_extra_row(
                    &self.prefix,
                    &self.table,
                    row_id,
                    key,
                ))
                .await
                .map_err(AppError::Db)?;
            let q = match existing.and_then(|r| r.get_i64("id")) {
                Some(extra_id) => extras::update_extra(&self.prefix, extra_id, &text, now, member_id),
                None => extras::insert_extra(
                    &self.prefix,
                    &self.table,
                    row_id,
                    key,
                    &text,
                    now,
                    member_id,
                ),
            };
            self.execute(&q).await.map_err(AppError::Db)?;
        }
        Ok(())
    }

    /// Resolve the requested relations of `record` and attach each under its
    /// relation name. Undeclared names and empty link values are silently
    /// skipped; singular kinds collapse a one-row result to a bare record.
    pub async fn find_relatives(
        &self,
        record: &mut Record,
        relations: &[String],
    ) -> Result<(), AppError> {
        for name in relations {
            let name = name.trim();
            let Some(descriptor) = self.relatives.get(name) else {
                continue;
            };
            let Some(q) = relation_query(&self.prefix, descriptor, record, &self.primary_key)
            else {
                continue;
            };
            let mut rows = self.query_many(&q).await?;
            if rows.is_empty() {
                continue;
            }
            for callable in &descriptor.call {
                if let Some(f) = self.callables.get(callable.trim()) {
                    for row in &mut rows {
                        f(row);
                    }
                }
            }
            let value = if !descriptor.kind.is_plural() && rows.len() == 1 {
                rows.remove(0).into_value()
            } else {
                Value::Array(rows.into_iter().map(Record::into_value).collect())
            };
            record.insert(name, value);
        }
        Ok(())
    }

    /// Record one view of row `id` in the `{table}_views` table, at most
    /// once per viewer per 30-minute window, and bump the row's
    /// `views_total` column when it exists. A missing views table makes
    /// this a no-op.
    pub async fn add_view(&self, id: i64, viewer: &Viewer) -> Result<(), AppError> {
        let views_table = format!("{}_views", self.table);
        if !self.table_exists(&views_table).await? {
            return Ok(());
        }
        let fk = format!("{}_id", self.table);
        let window_start = Utc::now() - Duration::minutes(30);

        let mut q = QueryBuf::new();
        let p_id = q.push_param(id.into());
        let p_date = q.push_param(Value::String(window_start.to_rfc3339()));
        let mut sql_text = format!(
            "SELECT id FROM {} WHERE {} = ${} AND date >= ${}::timestamptz",
            quoted(&self.prefixed(&views_table)),
            quoted(&fk),
            p_id,
            p_date
        );
        if let Some(member_id) = viewer.member_id {
            let n = q.push_param(member_id.into());
            sql_text.push_str(&format!(" AND {} = ${}", quoted("member_id"), n));
        }
        if let Some(guest_id) = viewer.guest_id {
            let n = q.push_param(guest_id.into());
            sql_text.push_str(&format!(" AND {} = ${}", quoted("guest_id"), n));
        }
        q.sql = sql_text;
        let seen = self.fetch_optional(&q).await.map_err(AppError::Db)?;

        if seen.is_none() {
            let mut q = QueryBuf::new();
            let mut cols = vec![quoted(&fk), quoted("date")];
            let mut values = vec![
                format!("${}", q.push_param(id.into())),
                format!(
                    "${}::timestamptz",
                    q.push_param(Value::String(Utc::now().to_rfc3339()))
                ),
            ];
            if let Some(member_id) = viewer.member_id {
                cols.push(quoted("member_id"));
                values.push(format!("${}", q.push_param(member_id.into())));
            }
            if let Some(guest_id) = viewer.guest_id {
                cols.push(quoted("guest_id"));
                values.push(format!("${}", q.push_param(guest_id.into())));
            }
            q.sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quoted(&self.prefixed(&views_table)),
                cols.join(", "),
                values.join(", ")
            );
            self.execute(&q).await.map_err(AppError::Db)?;
        }

        if self.column_exists("views_total", None).await? {
            let mut q = QueryBuf::new();
            let n = q.push_param(id.into());
            q.sql = format!(
                "UPDATE {} SET {} = {} + 1 WHERE {} = ${}",
                quoted(&self.entity_table()),
                quoted("views_total"),
                quoted("views_total"),
                quoted(&self.primary_key),
                n
            );
            self.execute(&q).await.map_err(AppError::Db)?;
        }
        Ok(())
    }

    /// Whether the (prefixed) table exists in the database.
    pub async fn table_exists(&self, table: &str) -> Result<bool, AppError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(self.prefixed(table))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Whether `column` exists on the given table (defaults to the entity
    /// table).
    pub async fn column_exists(&self, column: &str, table: Option<&str>) -> Result<bool, AppError> {
        let table = self.prefixed(table.unwrap_or(&self.table));
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = $2)",
        )
        .bind(table)
        .bind(column)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn nullable_columns(&self) -> Result<HashSet<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT column_name FROM information_schema.columns WHERE table_name = $1 AND is_nullable = 'YES'",
        )
        .bind(self.entity_table())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    fn apply_callables(&self, names: &[String], records: &mut [Record]) {
        for name in names {
            if let Some(callable) = self.callables.get(name.trim()) {
                for record in records.iter_mut() {
                    callable(record);
                }
            }
        }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Record>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn execute(&self, q: &QueryBuf) -> Result<(), sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query.execute(&self.pool).await?;
        Ok(())
    }
}

/// Buckets a record splits into on save.
#[derive(Debug, Default)]
pub(crate) struct SaveBuckets {
    /// Scalar columns for the SQL statement, primary key excluded.
    pub fields: Vec<(String, Value)>,
    /// Extra-declared fields, persisted through the side table.
    pub extras: Map<String, Value>,
    /// Object- and collection-valued fields, reattached after the save.
    pub relatives: Vec<(String, Value)>,
    /// Primary-key value when present and non-empty.
    pub pk_value: Option<Value>,
    /// Acting member id when a scalar field named the insert/update actor.
    pub member_id: Option<i64>,
}

/// Split a record into save buckets, removing extras and relatives from it
/// (they are reattached after persistence).
pub(crate) fn partition_record(
    record: &mut Record,
    primary_key: &str,
    extra_fields: &[String],
) -> SaveBuckets {
    let mut buckets = SaveBuckets::default();
    for key in record.keys().cloned().collect::<Vec<_>>() {
        let value = record.get(&key).cloned().unwrap_or(Value::Null);
        if key == "extra" && value.is_object() {
            if let Some(Value::Object(map)) = record.remove(&key) {
                buckets.extras.extend(map);
            }
        } else if extra_fields.iter().any(|f| *f == key) {
            record.remove(&key);
            buckets.extras.insert(key, value);
        } else if value.is_object() || value.is_array() {
            record.remove(&key);
            buckets.relatives.push((key, value));
        } else if key != primary_key {
            if key == "member_id_insert" || key == "member_id_update" {
                buckets.member_id = value.as_i64().or(buckets.member_id);
            }
            buckets.fields.push((key, value));
        } else if !is_empty_key(&value) {
            buckets.pk_value = Some(value);
        }
    }
    buckets
}

/// Coerce empty values on nullable columns to NULL. `0` and `false` are
/// values, never coerced.
pub(crate) fn coerce_empty_to_null(record: &mut Record, nullable: &HashSet<String>) {
    for key in record.keys().cloned().collect::<Vec<_>>() {
        if !nullable.contains(&key) {
            continue;
        }
        if let Some(value) = record.get_mut(&key) {
            let empty = matches!(&*value, Value::String(s) if s.is_empty());
            if empty {
                *value = Value::Null;
            }
        }
    }
}

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Record::from(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
