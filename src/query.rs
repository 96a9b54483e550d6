// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// PostgREST query description
//
// A `Query` renders to PostgREST query-string pairs for the HTTP backend and
// can also be evaluated in-process against JSON rows, so both backends agree
// on filter and ordering semantics.

use crate::model::Collection;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
        }
    }
}

/// Column predicate, `column=op.value` on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    /// Evaluate against a row. Missing or null columns never match.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(&self.column) else {
            return false;
        };
        let ordering = compare_to_literal(field, &self.value);
        match self.op {
            FilterOp::Eq => ordering == Some(Ordering::Equal),
            FilterOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }

    fn to_pair(&self) -> (String, String) {
        (
            self.column.clone(),
            format!("{}.{}", self.op.as_str(), self.value),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Read request against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub count_exact: bool,
}

impl Query {
    pub fn from(collection: Collection) -> Self {
        Self {
            collection,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
            count_exact: false,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Filter::gte(column, value))
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Order by the collection's timestamp column, newest first
    pub fn newest_first(self) -> Self {
        let column = self.collection.timestamp_column();
        self.order_by(column, false)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn count_exact(mut self) -> Self {
        self.count_exact = true;
        self
    }

    /// PostgREST query-string pairs
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filters.iter().map(Filter::to_pair));
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Evaluate the query over in-memory rows.
    ///
    /// Returns the projected page and the number of rows that matched the
    /// filters before the limit was applied.
    pub fn apply<'a, I>(&self, rows: I) -> (Vec<Value>, u64)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut matched: Vec<&Value> = rows
            .into_iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .collect();
        let total = matched.len() as u64;

        if let Some(order) = &self.order {
            matched.sort_by(|a, b| {
                match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                        let ordering = compare_values(x, y);
                        if order.ascending {
                            ordering
                        } else {
                            ordering.reverse()
                        }
                    }
                    // Rows without a value go last in either direction
                    (Some(x), _) if !x.is_null() => Ordering::Less,
                    (_, Some(y)) if !y.is_null() => Ordering::Greater,
                    _ => Ordering::Equal,
                }
            });
        }

        let page = matched
            .into_iter()
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|row| self.project(row))
            .collect();
        (page, total)
    }

    fn project(&self, row: &Value) -> Value {
        if self.columns.trim() == "*" {
            return row.clone();
        }
        let mut projected = Map::new();
        for column in self.columns.split(',').map(str::trim) {
            if let Some(value) = row.get(column) {
                projected.insert(column.to_string(), value.clone());
            }
        }
        Value::Object(projected)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn compare_to_literal(field: &Value, literal: &str) -> Option<Ordering> {
    match field {
        Value::Number(n) => {
            let lhs = n.as_f64()?;
            let rhs: f64 = literal.parse().ok()?;
            lhs.partial_cmp(&rhs)
        }
        Value::String(s) => Some(compare_text(s, literal)),
        Value::Bool(b) => literal.parse::<bool>().ok().map(|rhs| b.cmp(&rhs)),
        _ => None,
    }
}

/// Total order used when sorting rows on a column
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => compare_text(x, y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
