// ============================================================================
// Row sorting
// ============================================================================
//
// - Multi-key sorting, stable for equal keys
// - NULLS LAST for ascending keys, NULLS FIRST for descending keys
// - Key values are computed once per row before sorting
//
// ============================================================================

use crate::core::{RepoError, Result, Value};
use crate::query::Sort;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

impl NullOrdering {
    /// ASC → NULLS LAST, DESC → NULLS FIRST.
    pub fn default_for_direction(descending: bool) -> Self {
        if descending {
            Self::NullsFirst
        } else {
            Self::NullsLast
        }
    }
}

/// One position of an ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub descending: bool,
    pub null_ordering: NullOrdering,
}

impl SortKey {
    pub fn new(descending: bool) -> Self {
        Self {
            descending,
            null_ordering: NullOrdering::default_for_direction(descending),
        }
    }

    pub fn from_sort(sort: &Sort) -> Vec<SortKey> {
        sort.orders()
            .iter()
            .map(|order| SortKey::new(order.direction.is_descending()))
            .collect()
    }
}

/// Compares precomputed key tuples position by position.
pub struct RowComparator<'a> {
    sort_keys: &'a [SortKey],
}

impl<'a> RowComparator<'a> {
    pub fn new(sort_keys: &'a [SortKey]) -> Self {
        Self { sort_keys }
    }

    pub fn compare(&self, left: &[Value], right: &[Value]) -> Result<Ordering> {
        for (idx, key) in self.sort_keys.iter().enumerate() {
            let (Some(a), Some(b)) = (left.get(idx), right.get(idx)) else {
                return Err(RepoError::Execution(format!(
                    "Sort key {} is missing from the compared rows",
                    idx
                )));
            };

            let ordering = self.compare_values(a, b, key)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }

        Ok(Ordering::Equal)
    }

    fn compare_values(&self, a: &Value, b: &Value, key: &SortKey) -> Result<Ordering> {
        // Null placement is absolute; direction only applies between non-null values
        let ordering = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match key.null_ordering {
                NullOrdering::NullsFirst => Ordering::Less,
                NullOrdering::NullsLast => Ordering::Greater,
            },
            (false, true) => match key.null_ordering {
                NullOrdering::NullsFirst => Ordering::Greater,
                NullOrdering::NullsLast => Ordering::Less,
            },
            (false, false) => {
                let ordering = a.compare(b)?;
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        };

        Ok(ordering)
    }
}

pub struct SortExecutor;

impl SortExecutor {
    /// Stable sort of `(key values, item)` pairs. The first comparison error aborts the sort.
    pub fn sort<T>(rows: &mut [(Vec<Value>, T)], sort_keys: &[SortKey]) -> Result<()> {
        if rows.len() < 2 || sort_keys.is_empty() {
            return Ok(());
        }

        let comparator = RowComparator::new(sort_keys);
        let mut failure = None;

        rows.sort_by(|(a, _), (b, _)| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            comparator.compare(a, b).unwrap_or_else(|err| {
                failure = Some(err);
                Ordering::Equal
            })
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
