//! Page and slice results, and the windowing that produces them.

use crate::core::{RepoError, Result};
use crate::query::{Sort, Window};
use serde::Serialize;
use std::future::Future;

/// Zero-based page index and size, with an optional sort that replaces the
/// query's own ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    index: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    /// Fails with a configuration error on a negative index or a size below 1.
    pub fn of(index: i64, size: i64) -> Result<Self> {
        if index < 0 {
            return Err(RepoError::Configuration(format!(
                "Page index must not be negative, got {}",
                index
            )));
        }
        if size < 1 {
            return Err(RepoError::Configuration(format!(
                "Page size must be at least 1, got {}",
                size
            )));
        }
        Ok(Self {
            index: index as u64,
            size: size as u64,
            sort: Sort::unsorted(),
        })
    }

    pub fn sorted_by(index: i64, size: i64, sort: Sort) -> Result<Self> {
        Ok(Self::of(index, size)?.with_sort(sort))
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.index.saturating_mul(self.size)
    }

    pub fn window(&self) -> Window {
        Window::Page {
            index: self.index,
            size: self.size,
        }
    }

    pub fn next(&self) -> Self {
        Self {
            index: self.index + 1,
            ..self.clone()
        }
    }

    pub(crate) fn check_max(&self, max_page_size: Option<u64>) -> Result<()> {
        match max_page_size {
            Some(max) if self.size > max => Err(RepoError::Configuration(format!(
                "Page size {} exceeds the configured maximum of {}",
                self.size, max
            ))),
            _ => Ok(()),
        }
    }
}

/// One page of results plus the totals of the whole query.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    index: u64,
    size: u64,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            index: request.index,
            size: request.size,
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.size.max(1))
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        (self.index + 1).saturating_mul(self.size) < self.total_elements
    }

    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

/// A window of results that only knows whether more rows follow.
#[derive(Debug, Clone, Serialize)]
pub struct Slice<T> {
    content: Vec<T>,
    index: u64,
    size: u64,
    has_next: bool,
}

impl<T> Slice<T> {
    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            has_next: self.has_next,
        }
    }
}

/// Total implied by a windowed fetch alone, if any.
///
/// A partial page (or an empty first page) ends the result, so its total is
/// `offset + rows`. A full page or an empty page past the first needs a
/// count.
pub fn derived_total(request: &PageRequest, fetched: usize) -> Option<u64> {
    let fetched = fetched as u64;
    if fetched == 0 {
        return (request.index == 0).then_some(0);
    }
    (fetched < request.size).then(|| request.offset() + fetched)
}

/// Fetches one page through `fetch` and counts through `count` only when
/// the fetched rows do not settle the total.
pub async fn paginate<T, F, FFut, C, CFut>(request: &PageRequest, fetch: F, count: C) -> Result<Page<T>>
where
    F: FnOnce(Window) -> FFut,
    FFut: Future<Output = Result<Vec<T>>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<u64>>,
{
    let content = fetch(request.window()).await?;
    let total = match derived_total(request, content.len()) {
        Some(total) => {
            log::trace!("Page {} total derived as {}, count skipped", request.index, total);
            total
        }
        None => count().await?,
    };
    Ok(Page::new(content, request, total))
}

/// Fetches `size + 1` rows to learn whether another slice follows. Never
/// counts.
pub async fn slice<T, F, FFut>(request: &PageRequest, fetch: F) -> Result<Slice<T>>
where
    F: FnOnce(Window) -> FFut,
    FFut: Future<Output = Result<Vec<T>>>,
{
    let mut content = fetch(request.window().with_lookahead()).await?;
    let size = usize::try_from(request.size).unwrap_or(usize::MAX);
    let has_next = content.len() > size;
    content.truncate(size);
    Ok(Slice {
        content,
        index: request.index,
        size: request.size,
        has_next,
    })
}
