//! Keyword search shared by every finder.
//!
//! A search with keywords returns rows whose `ts` column matches the
//! keywords under the English or the Russian dictionary, together with rows
//! whose keyword column (tags, or a name) matches one of the keywords
//! case-insensitively. Without keywords every row is returned.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// `upvotes - downvotes`, descending.
    HighestRated,
    /// Last update, newest first.
    NewestUpdated,
    /// View count, descending.
    MostViews,
    /// Insertion order.
    #[default]
    Default,
}

impl SortOrder {
    /// Parse a query-string value. Unknown values select the default order.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "highest-rated" => SortOrder::HighestRated,
            "newest-updated" => SortOrder::NewestUpdated,
            "most-views" => SortOrder::MostViews,
            _ => SortOrder::Default,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::HighestRated => "highest-rated",
            SortOrder::NewestUpdated => "newest-updated",
            SortOrder::MostViews => "most-views",
            SortOrder::Default => "default",
        }
    }
}

/// Parameters of a `find` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Keywords; empty means "everything".
    pub keywords: Vec<String>,
    /// Maximum number of rows; 0 means unlimited.
    pub limit: u64,
    /// Result ordering.
    pub order: SortOrder,
}

impl SearchQuery {
    /// Query returning every row in default order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from raw `q`, `l` and `o` query-string values.
    pub fn from_params(q: Option<&str>, limit: Option<u64>, order: Option<&str>) -> Self {
        Self {
            keywords: q.map(Self::split_keywords).unwrap_or_default(),
            limit: limit.unwrap_or(0),
            order: order.map(SortOrder::parse).unwrap_or_default(),
        }
    }

    /// Set the keywords.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the order.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Split a raw `q` value on whitespace and commas, dropping duplicates.
    pub fn split_keywords(raw: &str) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for word in raw.split(|c: char| c.is_whitespace() || c == ',') {
            let word = word.trim();
            if !word.is_empty() && !keywords.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                keywords.push(word.to_string());
            }
        }
        keywords
    }

    /// True when the query filters rows.
    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }

    /// Keywords as a `websearch_to_tsquery` expression matching any of them.
    pub fn websearch_text(&self) -> String {
        self.keywords.join(" or ")
    }

    /// Limit as a SQL bind value, `None` when unlimited.
    pub fn sql_limit(&self) -> Option<i64> {
        (self.limit > 0).then(|| i64::try_from(self.limit).unwrap_or(i64::MAX))
    }
}

/// How keywords select rows.
#[derive(Debug, Clone, Copy)]
pub enum KeywordMatch {
    /// Full-text match, or a `TEXT[]` column overlapping the keywords.
    Tags(&'static str),
    /// Full-text match, or a text column equal to one of the keywords.
    AnyOf(&'static str),
    /// A text column equal to one of the keywords, for tables without `ts`.
    Exact(&'static str),
}

/// Columns behind each [`SortOrder`] for one table.
#[derive(Debug, Clone, Copy)]
pub struct SortColumns {
    /// Column for `HighestRated`, if the table is rated.
    pub rated: Option<&'static str>,
    /// Column for `NewestUpdated`, if the table tracks updates.
    pub updated: Option<&'static str>,
    /// Column for `MostViews`, if the table counts views.
    pub views: Option<&'static str>,
    /// Column for the default order.
    pub default: &'static str,
}

impl SortColumns {
    /// Columns shared by demos, threads, messages and assets.
    pub const COUNTED: SortColumns = SortColumns {
        rated: Some("rating"),
        updated: Some("updated_at"),
        views: Some("views"),
        default: "id",
    };

    /// Users: karma stands in for rating, creation for updates.
    pub const USERS: SortColumns = SortColumns {
        rated: Some("karma"),
        updated: Some("created_at"),
        views: None,
        default: "username",
    };

    /// Tables that only support the default order.
    pub const fn plain(default: &'static str) -> SortColumns {
        SortColumns {
            rated: None,
            updated: None,
            views: None,
            default,
        }
    }

    /// `ORDER BY` clause for `order`.
    pub fn order_by(&self, order: SortOrder) -> String {
        let primary = match order {
            SortOrder::HighestRated => self.rated,
            SortOrder::NewestUpdated => self.updated,
            SortOrder::MostViews => self.views,
            SortOrder::Default => None,
        };
        match primary {
            Some(column) => format!(" ORDER BY {column} DESC, {} ASC", self.default),
            None => format!(" ORDER BY {} ASC", self.default),
        }
    }
}

/// Append the search filter, ordering and limit to a `SELECT ... FROM table`.
///
/// `extra_filter` is an additional condition already pushed by the caller
/// (for example `thread_id = $1`); when `true` the keyword filter is joined
/// with `AND` instead of starting a `WHERE`.
pub fn push_search<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    query: &'a SearchQuery,
    keyword_match: KeywordMatch,
    columns: &SortColumns,
    extra_filter: bool,
) {
    if query.has_keywords() {
        builder.push(if extra_filter { " AND (" } else { " WHERE (" });

        let column = match keyword_match {
            KeywordMatch::Tags(column) | KeywordMatch::AnyOf(column) => {
                builder.push("ts @@ (websearch_to_tsquery('english', ");
                builder.push_bind(query.websearch_text());
                builder.push(") || websearch_to_tsquery('russian', ");
                builder.push_bind(query.websearch_text());
                builder.push(")) OR ");
                column
            }
            KeywordMatch::Exact(column) => column,
        };

        builder.push(column);
        match keyword_match {
            KeywordMatch::Tags(_) => builder.push(" && ("),
            KeywordMatch::AnyOf(_) | KeywordMatch::Exact(_) => builder.push(" = ANY("),
        };
        builder.push_bind(&query.keywords);
        builder.push("::text[] COLLATE case_insensitive)");
        builder.push(")");
    }

    builder.push(columns.order_by(query.order));

    if let Some(limit) = query.sql_limit() {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
}
