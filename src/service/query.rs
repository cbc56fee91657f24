//! 模型生成的表查询 (工具调用参数) 及其执行
//!
//! 执行顺序: filters -> distinct_by -> group_by/aggregate (或 select) -> order_by -> limit

use crate::models::{parse_decimal, Column, Dataset};
use bigdecimal::{BigDecimal, Zero};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("coluna desconhecida: {0}")]
    UnknownColumn(String),

    #[error("a agregação {0} exige uma coluna")]
    MissingColumn(&'static str),

    #[error("valor não numérico em {column}: {value}")]
    NotNumeric { column: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableQuery {
    pub filters: Vec<Filter>,
    pub distinct_by: Option<String>,
    pub group_by: Vec<String>,
    pub aggregate: Option<Aggregate>,
    pub select: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub op: AggregateOp,
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Count,
    CountDistinct,
    Sum,
    Mean,
    Min,
    Max,
}

impl AggregateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::CountDistinct => "count_distinct",
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

/// 查询结果 (序列化后作为 tool 消息回传给模型)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub truncated: bool,
}

impl QueryResult {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// 首列等于 key 的行的末列值 (分组结果查找)
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.first().map(String::as_str) == Some(key))
            .and_then(|row| row.last())
            .map(String::as_str)
    }
}

pub fn execute(table: &Dataset, query: &TableQuery) -> Result<QueryResult, QueryError> {
    let filters = query
        .filters
        .iter()
        .map(|f| -> Result<_, QueryError> { Ok((resolve(table, &f.column)?, f)) })
        .collect::<Result<Vec<_>, QueryError>>()?;

    let mut rows: Vec<usize> = Vec::new();
    'rows: for row in 0..table.row_count() {
        for (idx, filter) in &filters {
            let column = table.columns()[*idx];
            if !matches(column, table.cell(*idx, row), filter)? {
                continue 'rows;
            }
        }
        rows.push(row);
    }

    if let Some(name) = &query.distinct_by {
        let idx = resolve(table, name)?;
        let mut seen = IndexSet::new();
        rows.retain(|&r| seen.insert(table.cell(idx, r)));
    }

    let (columns, mut out) = if query.aggregate.is_some() || !query.group_by.is_empty() {
        aggregate_rows(table, &rows, query)?
    } else {
        project(table, &rows, &query.select)?
    };

    if let Some(order) = &query.order_by {
        let pos = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(order.column.trim()))
            .ok_or_else(|| QueryError::UnknownColumn(order.column.clone()))?;
        out.sort_by(|a, b| {
            let ord = compare_text(&a[pos], &b[pos]);
            if order.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let total_rows = out.len();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    out.truncate(limit);

    Ok(QueryResult {
        columns,
        rows: out,
        total_rows,
        truncated: total_rows > limit,
    })
}

fn resolve(table: &Dataset, name: &str) -> Result<usize, QueryError> {
    Column::from_name(name)
        .and_then(|c| table.column_index(c))
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_eq(column: Column, a: &str, b: &str) -> bool {
    if !column.is_identifier() {
        if let (Some(x), Some(y)) = (parse_decimal(a), parse_decimal(b)) {
            return x == y;
        }
    }
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// 全序: 数值在前 (按数值), 非数值在后 (按字典序)
fn compare_text(a: &str, b: &str) -> Ordering {
    match (parse_decimal(a), parse_decimal(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn matches(column: Column, cell: Option<&str>, filter: &Filter) -> Result<bool, QueryError> {
    let expected = value_text(&filter.value);
    // 空值只满足 ne
    let Some(actual) = cell else {
        return Ok(filter.op == FilterOp::Ne);
    };
    let hit = match filter.op {
        FilterOp::Eq => text_eq(column, actual, &expected),
        FilterOp::Ne => !text_eq(column, actual, &expected),
        FilterOp::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
        op => {
            let target = parse_decimal(&expected).ok_or_else(|| QueryError::NotNumeric {
                column: filter.column.clone(),
                value: expected.clone(),
            })?;
            match parse_decimal(actual) {
                Some(v) => match op {
                    FilterOp::Gt => v > target,
                    FilterOp::Gte => v >= target,
                    FilterOp::Lt => v < target,
                    _ => v <= target,
                },
                None => false,
            }
        }
    };
    Ok(hit)
}

type Rows = (Vec<String>, Vec<Vec<String>>);

fn project(table: &Dataset, rows: &[usize], select: &[String]) -> Result<Rows, QueryError> {
    let idxs: Vec<usize> = if select.is_empty() {
        (0..table.columns().len()).collect()
    } else {
        select
            .iter()
            .map(|n| resolve(table, n))
            .collect::<Result<_, _>>()?
    };
    let columns = idxs
        .iter()
        .map(|&i| table.columns()[i].name().to_string())
        .collect();
    let out = rows
        .iter()
        .map(|&r| {
            idxs.iter()
                .map(|&i| table.cell(i, r).unwrap_or("").to_string())
                .collect()
        })
        .collect();
    Ok((columns, out))
}

fn aggregate_rows(table: &Dataset, rows: &[usize], query: &TableQuery) -> Result<Rows, QueryError> {
    let keys: Vec<usize> = query
        .group_by
        .iter()
        .map(|n| resolve(table, n))
        .collect::<Result<_, _>>()?;
    let op = query
        .aggregate
        .as_ref()
        .map(|a| a.op)
        .unwrap_or(AggregateOp::Count);
    let target = match query.aggregate.as_ref().and_then(|a| a.column.as_deref()) {
        Some(name) => Some(resolve(table, name)?),
        None => None,
    };

    // 保序分组
    let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
    if keys.is_empty() {
        groups.insert(Vec::new(), rows.to_vec());
    } else {
        for &row in rows {
            let key = keys
                .iter()
                .map(|&k| table.cell(k, row).unwrap_or("").to_string())
                .collect();
            groups.entry(key).or_default().push(row);
        }
    }

    let mut columns: Vec<String> = keys
        .iter()
        .map(|&k| table.columns()[k].name().to_string())
        .collect();
    columns.push(match target {
        Some(idx) => format!("{}({})", op.as_str(), table.columns()[idx].name()),
        None => op.as_str().to_string(),
    });

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let value = compute(table, &members, op, target)?;
        let mut row = key;
        row.push(value);
        out.push(row);
    }
    Ok((columns, out))
}

fn compute(
    table: &Dataset,
    members: &[usize],
    op: AggregateOp,
    target: Option<usize>,
) -> Result<String, QueryError> {
    let Some(idx) = target else {
        return match op {
            AggregateOp::Count => Ok(members.len().to_string()),
            other => Err(QueryError::MissingColumn(other.as_str())),
        };
    };
    let values = members.iter().filter_map(|&r| table.cell(idx, r));

    match op {
        AggregateOp::Count => Ok(values.count().to_string()),
        AggregateOp::CountDistinct => Ok(values.collect::<IndexSet<_>>().len().to_string()),
        AggregateOp::Sum | AggregateOp::Mean => {
            let mut total = BigDecimal::zero();
            let mut n: i64 = 0;
            for v in values {
                let d = parse_decimal(v).ok_or_else(|| QueryError::NotNumeric {
                    column: table.columns()[idx].name().to_string(),
                    value: v.to_string(),
                })?;
                total += d;
                n += 1;
            }
            if op == AggregateOp::Sum {
                Ok(total.to_string())
            } else if n == 0 {
                Ok(String::new())
            } else {
                Ok((total / BigDecimal::from(n)).with_scale(2).to_string())
            }
        }
        AggregateOp::Min | AggregateOp::Max => {
            let want = if op == AggregateOp::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let best = values.fold(None, |best: Option<&str>, v| match best {
                Some(b) if compare_text(v, b) != want => Some(b),
                _ => Some(v),
            });
            Ok(best.unwrap_or("").to_string())
        }
    }
}
