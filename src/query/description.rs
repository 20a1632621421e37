use super::predicate::{FieldPath, Predicate};
use crate::config::NestedFetch;
use crate::core::Value;
use crate::projection::ProjectionSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn is_descending(&self) -> bool {
        matches!(self, Direction::Desc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub path: FieldPath,
    pub direction: Direction,
}

impl Order {
    pub fn asc(path: impl Into<FieldPath>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(path: impl Into<FieldPath>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Desc,
        }
    }
}

/// Ordered sequence of field + direction pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort(Vec<Order>);

impl Sort {
    pub fn unsorted() -> Self {
        Self(Vec::new())
    }

    pub fn by(orders: impl IntoIterator<Item = Order>) -> Self {
        Self(orders.into_iter().collect())
    }

    pub fn asc(path: impl Into<FieldPath>) -> Self {
        Self(vec![Order::asc(path)])
    }

    pub fn desc(path: impl Into<FieldPath>) -> Self {
        Self(vec![Order::desc(path)])
    }

    /// Appends the orders of `other` after this one's.
    pub fn and(mut self, other: Sort) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_sorted(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.0
    }

    pub(crate) fn or_else(self, fallback: &Sort) -> Sort {
        if self.is_sorted() {
            self
        } else {
            fallback.clone()
        }
    }
}

/// Row window applied after filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    OffsetLimit { offset: u64, limit: u64 },
    Page { index: u64, size: u64 },
}

impl Window {
    pub fn offset(&self) -> u64 {
        match self {
            Window::OffsetLimit { offset, .. } => *offset,
            Window::Page { index, size } => index.saturating_mul(*size),
        }
    }

    pub fn limit(&self) -> u64 {
        match self {
            Window::OffsetLimit { limit, .. } => *limit,
            Window::Page { size, .. } => *size,
        }
    }

    /// Same window reading one extra row past the end.
    pub(crate) fn with_lookahead(&self) -> Window {
        Window::OffsetLimit {
            offset: self.offset(),
            limit: self.limit().saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    None,
    PessimisticRead,
    PessimisticWrite,
}

/// What a fetch returns for every matching row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    /// Every storage column of the root entity, labelled by property.
    Entity,
    /// Columns bound positionally to a constructor-style DTO.
    Dto { columns: Vec<FieldPath> },
    /// Declared fields of a projection.
    Projection {
        spec: ProjectionSpec,
        nested: NestedFetch,
    },
    /// Plain columns, one value per selected path.
    Scalar { columns: Vec<FieldPath> },
}

impl ResultShape {
    pub fn scalar(columns: &[&str]) -> Self {
        ResultShape::Scalar {
            columns: columns.iter().map(|c| FieldPath::new(*c)).collect(),
        }
    }

    pub fn dto(columns: &[&str]) -> Self {
        ResultShape::Dto {
            columns: columns.iter().map(|c| FieldPath::new(*c)).collect(),
        }
    }

    /// Selected paths, or `None` when the entity's own columns are selected.
    pub fn selected_paths(&self) -> Option<Vec<FieldPath>> {
        match self {
            ResultShape::Entity => None,
            ResultShape::Dto { columns } | ResultShape::Scalar { columns } => Some(columns.clone()),
            ResultShape::Projection { spec, nested } => Some(spec.select_paths(*nested)),
        }
    }
}

/// Bulk update assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set { path: FieldPath, value: Value },
    Increment { path: FieldPath, delta: i64 },
}

impl Assignment {
    pub fn set(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Assignment::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn increment(path: impl Into<FieldPath>, delta: i64) -> Self {
        Assignment::Increment {
            path: path.into(),
            delta,
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            Assignment::Set { path, .. } | Assignment::Increment { path, .. } => path,
        }
    }
}

/// Canonical, immutable description of a query against one root entity.
///
/// Built by the method resolver, by specifications and examples, or by hand,
/// and handed unchanged to a [`QueryExecutor`](crate::executor::QueryExecutor).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescription {
    pub entity: String,
    pub predicate: Predicate,
    pub sort: Sort,
    pub window: Option<Window>,
    pub distinct: bool,
    pub shape: ResultShape,
    pub lock: LockMode,
    pub read_only: bool,
    /// Associations to resolve while materializing entities.
    pub fetch: Vec<String>,
    /// Row cap from `Top<N>` / `First<N>`, applied after the window.
    pub max_results: Option<u64>,
}

impl QueryDescription {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Predicate::True,
            sort: Sort::unsorted(),
            window: None,
            distinct: false,
            shape: ResultShape::Entity,
            lock: LockMode::None,
            read_only: false,
            fetch: Vec::new(),
            max_results: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = self.predicate.and(predicate);
        self
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = mode;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn fetch(mut self, association: impl Into<String>) -> Self {
        let association = association.into();
        if !self.fetch.contains(&association) {
            self.fetch.push(association);
        }
        self
    }

    pub fn max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    /// The count query over the same predicate: no window, sort or row cap.
    pub fn count_query(&self) -> QueryDescription {
        QueryDescription {
            entity: self.entity.clone(),
            predicate: self.predicate.clone(),
            sort: Sort::unsorted(),
            window: None,
            distinct: self.distinct,
            shape: self.shape.clone(),
            lock: LockMode::None,
            read_only: true,
            fetch: Vec::new(),
            max_results: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_offsets() {
        let page = Window::Page { index: 2, size: 3 };
        assert_eq!(page.offset(), 6);
        assert_eq!(page.limit(), 3);
        assert_eq!(
            page.with_lookahead(),
            Window::OffsetLimit {
                offset: 6,
                limit: 4
            }
        );
    }

    #[test]
    fn test_count_query_drops_window_and_sort() {
        let query = QueryDescription::new("Member")
            .filter(Predicate::eq("age", 10i64))
            .sorted(Sort::desc("username"))
            .window(Window::Page { index: 1, size: 3 })
            .max_results(3);
        let count = query.count_query();
        assert_eq!(count.predicate, query.predicate);
        assert!(!count.sort.is_sorted());
        assert!(count.window.is_none());
        assert!(count.max_results.is_none());
    }

    #[test]
    fn test_filter_composes() {
        let query = QueryDescription::new("Member")
            .filter(Predicate::eq("username", "m1"))
            .filter(Predicate::eq("team.name", "teamA"));
        assert!(matches!(query.predicate, Predicate::And(ref items) if items.len() == 2));
    }

    #[test]
    fn test_sort_fallback() {
        let default = Sort::asc("id");
        assert_eq!(Sort::unsorted().or_else(&default), default);
        assert_eq!(Sort::desc("age").or_else(&default), Sort::desc("age"));
    }
}
