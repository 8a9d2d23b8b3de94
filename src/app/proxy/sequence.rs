//! Proxy for remote sequences (tabular variables)

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::app::dap::{self, DapValue, DdsNode, NodeKind};
use crate::app::proxy::constraint::{Atom, CompareOp, ConstraintExpression};
use crate::app::proxy::slice::{self, Index, Slice};
use crate::app::proxy::{data_url, split_url, with_query, DapRequester, Sliceable};
use crate::errors::{DapError, DapResult, Result};

/// What a sequence can be indexed with
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceKey {
    /// Server-side row filter
    Filter(ConstraintExpression),
    /// Descend into one column
    Column(String),
    /// Keep these columns, in this order
    Columns(Vec<String>),
    /// Row selection
    Rows(Index),
}

impl From<ConstraintExpression> for SequenceKey {
    fn from(expression: ConstraintExpression) -> Self {
        SequenceKey::Filter(expression)
    }
}

impl From<&str> for SequenceKey {
    fn from(column: &str) -> Self {
        SequenceKey::Column(column.to_string())
    }
}

impl From<String> for SequenceKey {
    fn from(column: String) -> Self {
        SequenceKey::Column(column)
    }
}

impl From<&[&str]> for SequenceKey {
    fn from(columns: &[&str]) -> Self {
        SequenceKey::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SequenceKey {
    fn from(columns: [&str; N]) -> Self {
        SequenceKey::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl From<Index> for SequenceKey {
    fn from(index: Index) -> Self {
        SequenceKey::Rows(index)
    }
}

impl From<i64> for SequenceKey {
    fn from(row: i64) -> Self {
        SequenceKey::Rows(Index::At(row))
    }
}

impl From<Range<i64>> for SequenceKey {
    fn from(rows: Range<i64>) -> Self {
        SequenceKey::Rows(Index::from(rows))
    }
}

/// Lazy view over a remote sequence or one of its columns
///
/// Nothing is requested until [`rows`](Self::rows) (or [`len`](Self::len))
/// is awaited. The row count is unknown up front, so row selections are
/// composed against an unbounded dimension.
#[derive(Clone)]
pub struct SequenceProxy {
    id: String,
    url: String,
    selection: Vec<Slice>,
    children: Vec<String>,
    requester: Arc<dyn DapRequester>,
}

impl fmt::Debug for SequenceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceProxy")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("selection", &self.selection)
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Display for SequenceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<SequenceProxy pointing to variable \"{}{}\" at \"{}\">",
            self.projection(),
            self.hyperslab(),
            self.url
        )
    }
}

impl SequenceProxy {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        requester: Arc<dyn DapRequester>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            selection: vec![Slice::FULL],
            children: Vec::new(),
            requester,
        }
    }

    /// Projected columns, empty when every column is kept
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// `id`, or `id.child` for every projected column
    fn projection(&self) -> String {
        if self.children.is_empty() {
            return self.id.clone();
        }
        self.children
            .iter()
            .map(|child| format!("{}.{}", self.id, child))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Derive a new proxy from `key`
    pub fn get_item(&self, key: impl Into<SequenceKey>) -> DapResult<Self> {
        match key.into() {
            SequenceKey::Filter(expression) => Ok(self.filter(&expression)),
            SequenceKey::Column(name) => Ok(self.column(&name)),
            SequenceKey::Columns(names) => Ok(self.project(names)),
            SequenceKey::Rows(index) => self.slice(&[index]),
        }
    }

    /// Rows matching `expression`, ANDed with any filter already present
    pub fn filter(&self, expression: &ConstraintExpression) -> Self {
        let query = split_url(&self.url).query;
        let combined = expression.and(query);

        if self.selection.iter().any(|slice| !slice.is_full()) {
            warn!(
                "Selection {} will be applied before projection \"{}\".",
                expression,
                self.hyperslab()
            );
        }

        Self {
            url: with_query(&self.url, combined.as_str()),
            ..self.clone()
        }
    }

    /// One column, with the pending row selection folded into the path
    pub fn column(&self, name: &str) -> Self {
        Self {
            id: format!("{}{}.{}", self.id, self.hyperslab(), name),
            selection: vec![Slice::FULL],
            children: Vec::new(),
            ..self.clone()
        }
    }

    /// Restrict and reorder the columns returned by [`rows`](Self::rows)
    pub fn project<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            children: columns.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    /// Predicate comparing this variable with `rhs`; nothing is fetched
    pub fn compare(&self, op: CompareOp, rhs: impl Into<Atom>) -> ConstraintExpression {
        ConstraintExpression::comparison(&self.id, op, &rhs.into())
    }

    pub fn eq(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl Into<Atom>) -> ConstraintExpression {
        self.compare(CompareOp::Ge, rhs)
    }

    /// Fetch the selected rows
    ///
    /// Whole-sequence proxies yield one [`DapValue::Structure`] per row with
    /// fields in the projected order; column proxies yield one value per row.
    pub async fn rows(&self) -> Result<Vec<DapValue>> {
        slice::ensure_non_empty(&self.selection, &[None])?;
        let url = data_url(&self.url, &format!("{}{}", self.projection(), self.hyperslab()))?;
        debug!("Requesting rows of {} from {}", self.id, url);

        let response = self.requester.request(&url).await?;
        let decoded = dap::parse_response(&response.body)?;
        drop(response);

        let lookup = strip_hyperslabs(&self.id);
        let node = decoded
            .dds
            .walk()
            .into_iter()
            .find(|node| node.id == lookup)
            .ok_or_else(|| DapError::MissingVariable {
                name: lookup.clone(),
                path: self.url.clone(),
            })?;

        let mut data = decoded.extract(node).ok_or_else(|| DapError::UnexpectedKind {
            id: lookup.clone(),
            expected: "a sequence",
        })?;

        if node.kind == NodeKind::Sequence && !self.children.is_empty() {
            let order = self.column_order(node)?;
            data = reorder(&order, data, decoded.nesting_level(node));
        }

        match data {
            DapValue::Sequence(items) => Ok(items),
            _ => Err(DapError::UnexpectedKind {
                id: lookup,
                expected: "a sequence",
            }
            .into()),
        }
    }

    /// Number of rows, by fetching all of them
    pub async fn len(&self) -> Result<usize> {
        Ok(self.rows().await?.len())
    }

    fn column_order(&self, node: &DdsNode) -> DapResult<Vec<usize>> {
        let names = node.child_names();
        self.children
            .iter()
            .map(|child| {
                names
                    .iter()
                    .position(|name| name == child)
                    .ok_or_else(|| DapError::MissingVariable {
                        name: child.clone(),
                        path: node.id.clone(),
                    })
            })
            .collect()
    }
}

impl Sliceable for SequenceProxy {
    fn id(&self) -> &str {
        &self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn selection(&self) -> &[Slice] {
        &self.selection
    }

    fn slice(&self, index: &[Index]) -> DapResult<Self> {
        let normalized = slice::normalize(index, &[None])?;
        Ok(Self {
            selection: slice::compose(&self.selection, &normalized),
            ..self.clone()
        })
    }
}

/// `s[0:1:0].x` → `s.x`
fn strip_hyperslabs(id: &str) -> String {
    let mut stripped = String::with_capacity(id.len());
    let mut rest = id;
    while let Some(open) = rest.find('[') {
        stripped.push_str(&rest[..open]);
        match rest[open..].find(']') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    stripped.push_str(rest);
    stripped
}

/// Reorder row fields at the innermost sequence level
fn reorder(order: &[usize], data: DapValue, level: usize) -> DapValue {
    match (level, data) {
        (0, DapValue::Structure(fields)) => DapValue::Structure(
            order
                .iter()
                .filter_map(|index| fields.get(*index).cloned())
                .collect(),
        ),
        (level, DapValue::Sequence(items)) if level > 0 => DapValue::Sequence(
            items
                .into_iter()
                .map(|item| reorder(order, item, level - 1))
                .collect(),
        ),
        (_, other) => other,
    }
}
