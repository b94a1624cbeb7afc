// src/pipeline.rs
//! Typed aggregation pipelines.
//!
//! Statistics queries are described as a list of [`Stage`]s. The MongoDB
//! adapter renders them with [`Pipeline::to_documents`]; the in-memory store
//! evaluates the same stages itself, so both backends share one definition of
//! every query.

use std::cmp::Ordering;

use mongodb::bson::{doc, Bson, Document};

use crate::store::CollectionName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    /// Orients an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// A computed value inside a `$project` or `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Value at a dotted path.
    Field(String),
    /// Length of the array at a dotted path; missing or null counts as 0.
    Size(String),
}

impl Expr {
    pub fn field(path: &str) -> Self {
        Expr::Field(path.to_string())
    }

    pub fn size(path: &str) -> Self {
        Expr::Size(path.to_string())
    }

    fn to_bson(&self) -> Bson {
        match self {
            Expr::Field(path) => Bson::String(format!("${path}")),
            Expr::Size(path) => Bson::Document(doc! {
                "$size": { "$ifNull": [format!("${path}"), []] }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: String, value: Bson },
    /// Inclusive integer range; `max: None` is unbounded.
    Range { field: String, min: i64, max: Option<i64> },
}

impl Predicate {
    fn to_document(&self) -> Document {
        match self {
            Predicate::Eq { field, value } => {
                let mut filter = Document::new();
                filter.insert(field.as_str(), value.clone());
                filter
            }
            Predicate::Range { field, min, max } => {
                let mut bounds = doc! { "$gte": *min };
                if let Some(max) = max {
                    bounds.insert("$lte", *max);
                }
                let mut filter = Document::new();
                filter.insert(field.as_str(), bounds);
                filter
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Predicate),
    /// Emits one row per element of the array at `path`. Rows where the
    /// array is missing, null or empty are dropped.
    Unwind(String),
    /// Replaces each row with the listed computed fields.
    Project(Vec<(String, Expr)>),
    /// Sets `as_field` to the array of `from` documents whose
    /// `foreign_field` equals the row's `local_field`.
    Lookup {
        from: CollectionName,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// Groups rows by the given key expressions into
    /// `{ _id: { key.. }, <count_field>: n }`.
    Group {
        keys: Vec<(String, Expr)>,
        count_field: String,
    },
    Sort(Vec<(String, SortOrder)>),
    Skip(u64),
    Limit(u64),
}

impl Stage {
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Match(predicate) => doc! { "$match": predicate.to_document() },
            Stage::Unwind(path) => doc! { "$unwind": format!("${path}") },
            Stage::Project(fields) => {
                let mut spec = Document::new();
                if !fields.iter().any(|(name, _)| name == "_id") {
                    spec.insert("_id", 0);
                }
                for (name, expr) in fields {
                    spec.insert(name.as_str(), expr.to_bson());
                }
                doc! { "$project": spec }
            }
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.as_str(),
                    "localField": local_field.as_str(),
                    "foreignField": foreign_field.as_str(),
                    "as": as_field.as_str(),
                }
            },
            Stage::Group { keys, count_field } => {
                let mut key = Document::new();
                for (name, expr) in keys {
                    key.insert(name.as_str(), expr.to_bson());
                }
                let mut spec = doc! { "_id": key };
                spec.insert(count_field.as_str(), doc! { "$sum": 1 });
                doc! { "$group": spec }
            }
            Stage::Sort(keys) => {
                let mut spec = Document::new();
                for (field, order) in keys {
                    spec.insert(field.as_str(), order.as_i32());
                }
                doc! { "$sort": spec }
            }
            Stage::Skip(n) => doc! { "$skip": i64::try_from(*n).unwrap_or(i64::MAX) },
            Stage::Limit(n) => doc! { "$limit": i64::try_from(*n).unwrap_or(i64::MAX) },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn match_eq(self, field: &str, value: impl Into<Bson>) -> Self {
        self.push(Stage::Match(Predicate::Eq {
            field: field.to_string(),
            value: value.into(),
        }))
    }

    pub fn match_range(self, field: &str, min: i64, max: Option<i64>) -> Self {
        self.push(Stage::Match(Predicate::Range {
            field: field.to_string(),
            min,
            max,
        }))
    }

    pub fn unwind(self, path: &str) -> Self {
        self.push(Stage::Unwind(path.to_string()))
    }

    pub fn project(self, fields: &[(&str, Expr)]) -> Self {
        self.push(Stage::Project(
            fields
                .iter()
                .map(|(name, expr)| (name.to_string(), expr.clone()))
                .collect(),
        ))
    }

    pub fn lookup(
        self,
        from: CollectionName,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
    ) -> Self {
        self.push(Stage::Lookup {
            from,
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        })
    }

    pub fn group_count(self, keys: &[(&str, Expr)], count_field: &str) -> Self {
        self.push(Stage::Group {
            keys: keys
                .iter()
                .map(|(name, expr)| (name.to_string(), expr.clone()))
                .collect(),
            count_field: count_field.to_string(),
        })
    }

    pub fn sort(self, keys: &[(&str, SortOrder)]) -> Self {
        self.push(Stage::Sort(
            keys.iter()
                .map(|(field, order)| (field.to_string(), *order))
                .collect(),
        ))
    }

    pub fn skip(self, n: u64) -> Self {
        self.push(Stage::Skip(n))
    }

    pub fn limit(self, n: u64) -> Self {
        self.push(Stage::Limit(n))
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_stage_hides_id_unless_listed() {
        let stage = Stage::Project(vec![("total".into(), Expr::size("tasks"))]);
        assert_eq!(
            stage.to_document(),
            doc! { "$project": { "_id": 0, "total": { "$size": { "$ifNull": ["$tasks", []] } } } }
        );

        let stage = Stage::Project(vec![("_id".into(), Expr::field("name"))]);
        assert_eq!(stage.to_document(), doc! { "$project": { "_id": "$name" } });
    }

    #[test]
    fn unbounded_range_omits_upper_bound() {
        let pipeline = Pipeline::new().match_range("count", 2, None);
        assert_eq!(
            pipeline.to_documents(),
            vec![doc! { "$match": { "count": { "$gte": 2_i64 } } }]
        );

        let pipeline = Pipeline::new().match_range("count", 2, Some(5));
        assert_eq!(
            pipeline.to_documents(),
            vec![doc! { "$match": { "count": { "$gte": 2_i64, "$lte": 5_i64 } } }]
        );
    }

    #[test]
    fn lookup_and_group_render_driver_stages() {
        let pipeline = Pipeline::new()
            .lookup(CollectionName::Collaborators, "tasks.collaborators", "_id", "member")
            .group_count(&[("email", Expr::field("member.email"))], "n")
            .sort(&[("n", SortOrder::Descending), ("_id.email", SortOrder::Ascending)]);

        assert_eq!(
            pipeline.to_documents(),
            vec![
                doc! { "$lookup": {
                    "from": "collaborators",
                    "localField": "tasks.collaborators",
                    "foreignField": "_id",
                    "as": "member",
                } },
                doc! { "$group": { "_id": { "email": "$member.email" }, "n": { "$sum": 1 } } },
                doc! { "$sort": { "n": -1, "_id.email": 1 } },
            ]
        );
    }
}
