//! Query specification value objects.

use crate::sql::quote_literal;
use serde_json::Value;

/// Field projection: everything, a column list, or a raw clause.
#[derive(Clone, Debug, Default)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
    Raw(String),
}

/// Row filter: a NULL-aware set of equality constraints, or a raw clause the
/// caller owns.
#[derive(Clone, Debug, Default)]
pub enum Conditions {
    #[default]
    None,
    Equals(Vec<(String, Value)>),
    Raw(String),
}

impl Conditions {
    pub fn equals<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Conditions::Equals(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Merge one more equality constraint. Raw clauses grow an `AND` term
    /// with the value rendered inline.
    pub(crate) fn with_equal(&self, column: &str, value: Value) -> Conditions {
        match self {
            Conditions::None => Conditions::Equals(vec![(column.to_string(), value)]),
            Conditions::Equals(pairs) => {
                let mut pairs: Vec<(String, Value)> = pairs
                    .iter()
                    .filter(|(k, _)| k != column)
                    .cloned()
                    .collect();
                pairs.push((column.to_string(), value));
                Conditions::Equals(pairs)
            }
            Conditions::Raw(raw) => {
                let term = match &value {
                    Value::Null => format!("{} IS NULL", column),
                    Value::Number(n) => format!("{} = {}", column, n),
                    other => format!(
                        "{} = {}",
                        column,
                        quote_literal(&crate::repo::record::value_to_text(other))
                    ),
                };
                Conditions::Raw(format!("{} AND {}", raw, term))
            }
        }
    }
}

/// Parameters of a `find`-family query.
#[derive(Clone, Debug, Default)]
pub struct QuerySpec {
    pub fields: Projection,
    pub conditions: Conditions,
    pub sort: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Merge extra-attribute rows into each returned record.
    pub extras: bool,
    /// Declared relation names to resolve and attach.
    pub relations: Vec<String>,
    /// Registered post-processing callables to run on each record.
    pub call: Vec<String>,
}

impl QuerySpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_conditions(conditions: Conditions) -> Self {
        QuerySpec {
            conditions,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_equal_extends_equality_sets() {
        let conds = Conditions::equals([("status", json!("online"))]).with_equal("parent_id", json!(3));
        match conds {
            Conditions::Equals(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[1], ("parent_id".to_string(), json!(3)));
            }
            _ => panic!("expected equality conditions"),
        }
    }

    #[test]
    fn with_equal_overrides_existing_column() {
        let conds = Conditions::equals([("id", json!(1))]).with_equal("id", json!(2));
        match conds {
            Conditions::Equals(pairs) => assert_eq!(pairs, vec![("id".to_string(), json!(2))]),
            _ => panic!("expected equality conditions"),
        }
    }

    #[test]
    fn with_equal_appends_to_raw_clause() {
        let conds = Conditions::Raw("views_total > 10".into()).with_equal("parent_id", Value::Null);
        match conds {
            Conditions::Raw(raw) => assert_eq!(raw, "views_total > 10 AND parent_id IS NULL"),
            _ => panic!("expected raw conditions"),
        }
    }
}
