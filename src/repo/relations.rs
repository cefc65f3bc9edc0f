//! Declarative relation descriptors and their SELECT construction.

use crate::repo::query::{Conditions, Projection};
use crate::repo::record::{is_empty_value, Record};
use crate::sql::{condition_clauses, projection_sql, quoted, QueryBuf};

/// Target primary-key column of relation queries.
const TARGET_KEY: &str = "id";

/// Direction and cardinality of a relation. Singular kinds (`Parent`,
/// `Child`) collapse a one-row result to a bare record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    Parent,
    Parents,
    Child,
    Children,
}

impl RelationKind {
    pub fn is_plural(self) -> bool {
        matches!(self, RelationKind::Parents | RelationKind::Children)
    }

    fn is_parent_side(self) -> bool {
        matches!(self, RelationKind::Parent | RelationKind::Parents)
    }
}

/// How the two tables are linked: a direct foreign-key column, or a join
/// table for many-to-many relations (`ours` references this repository's
/// rows, `theirs` the target's).
#[derive(Clone, Debug)]
pub enum RelationLink {
    Column(String),
    Via {
        table: String,
        ours: String,
        theirs: String,
    },
}

/// One declared relation, registered per repository under a relation name.
#[derive(Clone, Debug)]
pub struct RelationDescriptor {
    /// Target table (unprefixed).
    pub class: String,
    pub kind: RelationKind,
    pub link: RelationLink,
    pub conditions: Conditions,
    pub fields: Projection,
    /// Registered callables applied to the fetched relatives.
    pub call: Vec<String>,
}

impl RelationDescriptor {
    pub fn new(class: impl Into<String>, kind: RelationKind, link: RelationLink) -> Self {
        RelationDescriptor {
            class: class.into(),
            kind,
            link,
            conditions: Conditions::None,
            fields: Projection::All,
            call: Vec::new(),
        }
    }
}

/// Build the SELECT for one relation of `record`. Returns `None` when the
/// linking value is empty or absent: no relation, not an error, not a query.
pub(crate) fn relation_query(
    prefix: &str,
    descriptor: &RelationDescriptor,
    record: &Record,
    primary_key: &str,
) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let mut clauses = condition_clauses(&mut q, &descriptor.conditions);

    let link_clause = match &descriptor.link {
        RelationLink::Column(column) => {
            if descriptor.kind.is_parent_side() {
                let fk = record.get(column).filter(|v| !is_empty_value(v))?;
                let n = q.push_param(fk.clone());
                format!("{} = ${}", quoted(TARGET_KEY), n)
            } else {
                let id = record.row_id(primary_key)?;
                let n = q.push_param(id.into());
                format!("{} = ${}", quoted(column), n)
            }
        }
        RelationLink::Via {
            table,
            ours,
            theirs,
        } => {
            let id = record.row_id(primary_key)?;
            let n = q.push_param(id.into());
            format!(
                "{} IN (SELECT {} FROM {} WHERE {} = ${})",
                quoted(TARGET_KEY),
                quoted(theirs),
                quoted(&format!("{}{}", prefix, table)),
                quoted(ours),
                n
            )
        }
    };
    clauses.push(link_clause);

    let fields = projection_sql(&descriptor.fields);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        fields,
        quoted(&format!("{}{}", prefix, descriptor.class)),
        clauses.join(" AND ")
    );
    Some(q)
}
