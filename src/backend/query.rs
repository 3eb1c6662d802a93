//! Select queries and their PostgREST encoding

use serde_json::Value;

use super::value_to_param;

/// A row predicate
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Case-insensitive substring match
    ILike(String, String),
    In(String, Vec<Value>),
    NotNull(String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::ILike(c, _) | Filter::In(c, _) | Filter::NotNull(c) => c,
        }
    }

    /// `column=operator.value` as PostgREST expects it in the query string
    pub fn to_param(&self) -> (String, String) {
        let value = match self {
            Filter::Eq(_, v) => format!("eq.{}", value_to_param(v)),
            Filter::ILike(_, needle) => format!("ilike.*{}*", needle),
            Filter::In(_, values) => {
                let items: Vec<String> = values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                        other => value_to_param(other),
                    })
                    .collect();
                format!("in.({})", items.join(","))
            }
            Filter::NotNull(_) => "not.is.null".to_string(),
        };
        (self.column().to_string(), value)
    }

    /// Evaluate the predicate against a JSON row
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column());
        match self {
            Filter::Eq(_, v) => field == Some(v),
            Filter::ILike(_, needle) => field
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Filter::In(_, values) => field.map(|f| values.contains(f)).unwrap_or(false),
            Filter::NotNull(_) => field.map(|f| !f.is_null()).unwrap_or(false),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Inclusive row range, zero-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<RowRange>,
    pub count_exact: bool,
}

impl Query {
    pub fn select(columns: &str) -> Self {
        Self {
            columns: columns.to_string(),
            filters: Vec::new(),
            order: None,
            range: None,
            count_exact: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn ilike(self, column: &str, needle: &str) -> Self {
        self.filter(Filter::ILike(column.to_string(), needle.to_string()))
    }

    pub fn is_in(self, column: &str, values: Vec<Value>) -> Self {
        self.filter(Filter::In(column.to_string(), values))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(Filter::NotNull(column.to_string()))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some(RowRange { from, to });
        self
    }

    pub fn exact_count(mut self) -> Self {
        self.count_exact = true;
        self
    }

    /// Query string parameters; the exact count travels as a `Prefer` header instead
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(range) = self.range {
            params.push(("offset".to_string(), range.from.to_string()));
            params.push(("limit".to_string(), range.len().to_string()));
        }
        params
    }
}

/// Total row count from a `Content-Range` header such as `0-12/27` or `*/0`
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}
