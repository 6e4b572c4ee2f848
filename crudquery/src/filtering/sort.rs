use sea_orm::sea_query::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::path::FieldPath;
use crate::validation::CompileReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Any token other than `ASC` (in any case) means descending.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("ASC") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<String> for SortDirection {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl From<SortDirection> for String {
    fn from(direction: SortDirection) -> Self {
        direction.as_str().to_string()
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ORDER BY entry. `path` may cross relations (`author.name`), in which
/// case the execution layer sorts on the joined column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: FieldPath,
    pub direction: SortDirection,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.direction)
    }
}

/// Parses `sortBy=a,b.c&sortOrder=ASC,DESC` into an ordered key list.
pub struct SortCompiler {
    default_direction: SortDirection,
}

impl SortCompiler {
    #[must_use]
    pub fn new(default_direction: SortDirection) -> Self {
        Self { default_direction }
    }

    /// The i-th direction token pairs with the i-th field. When directions
    /// run out, the last direction seen carries over, and with no direction
    /// at all the configured default applies.
    ///
    /// A field listed twice keeps its first position and takes the later direction.
    pub fn compile(
        &self,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        report: &mut CompileReport,
    ) -> Vec<SortKey> {
        let Some(sort_by) = sort_by else {
            return Vec::new();
        };
        let orders: Vec<&str> = sort_order.map(|o| o.split(',').collect()).unwrap_or_default();

        let mut keys: Vec<SortKey> = Vec::new();
        let mut current = self.default_direction;
        for (index, token) in sort_by.split(',').enumerate() {
            if let Some(order) = orders.get(index).map(|o| o.trim())
                && !order.is_empty()
            {
                current = SortDirection::parse(order);
            }

            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let path = match FieldPath::parse(token) {
                Ok(path) => path,
                Err(reason) => {
                    report.drop("sortBy", reason);
                    continue;
                }
            };

            if let Some(existing) = keys.iter_mut().find(|k| k.path == path) {
                existing.direction = current;
            } else {
                keys.push(SortKey {
                    path,
                    direction: current,
                });
            }
        }
        keys
    }
}
