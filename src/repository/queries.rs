use super::{Repository, single};
use crate::core::{RepoError, Result};
use crate::entity::Entity;
use crate::materialize::{FromColumns, materialize_dtos};
use crate::paging::{Page, PageRequest, Slice, paginate, slice};
use crate::projection::{ClosedView, Projection, ProjectionSpec, fetch_views};
use crate::query::{
    Arg, Assignment, Example, MethodKind, QueryDescription, ResultShape, Specification,
};
use crate::result::ResultSet;
use crate::session::{EntityRef, UnitOfWork};

impl<E: Entity> Repository<E> {
    /// Applies a page request to a bound query: the request's sort wins over
    /// the query's own, and the configured maximum size is enforced.
    fn paged(&self, desc: QueryDescription, request: &PageRequest) -> Result<QueryDescription> {
        request.check_max(self.config.max_page_size)?;
        let sort = request.sort().clone().or_else(&desc.sort);
        Ok(desc.sorted(sort))
    }

    async fn page_of_entities(
        &self,
        uow: &UnitOfWork,
        desc: QueryDescription,
        request: &PageRequest,
    ) -> Result<Page<EntityRef<E>>> {
        let desc = self.paged(desc, request)?;
        let cap = desc.max_results;
        let count_query = desc.count_query();
        let page = paginate(
            request,
            |window| uow.query::<E>(desc.window(window)),
            || uow.count(&count_query),
        )
        .await?;
        Ok(capped(page, request, cap))
    }

    /// One page of a declared `find...` method.
    pub async fn find_page(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
        request: &PageRequest,
    ) -> Result<Page<EntityRef<E>>> {
        let desc = self.describe(method, MethodKind::Find, args)?;
        self.page_of_entities(uow, desc, request).await
    }

    /// One slice of a declared `find...` method, without a count query.
    pub async fn find_slice(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
        request: &PageRequest,
    ) -> Result<Slice<EntityRef<E>>> {
        let desc = self.paged(self.describe(method, MethodKind::Find, args)?, request)?;
        slice(request, |window| uow.query::<E>(desc.window(window))).await
    }

    /// Runs a `find...` method with projection `P`, chosen by the caller.
    pub async fn find_projected<P: Projection>(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
    ) -> Result<Vec<P>> {
        let views = self.find_views(uow, method, args, &P::spec()).await?;
        views.iter().map(P::from_view).collect()
    }

    /// Untyped variant of [`Repository::find_projected`].
    pub async fn find_views(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
        spec: &ProjectionSpec,
    ) -> Result<Vec<ClosedView>> {
        spec.validate(&self.registry, E::NAME)?;
        let desc = self.describe(method, MethodKind::Find, args)?;
        fetch_views(uow, desc, spec, uow.config().nested_fetch).await
    }

    pub async fn find_projected_page<P: Projection>(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
        request: &PageRequest,
    ) -> Result<Page<P>> {
        let spec = P::spec();
        spec.validate(&self.registry, E::NAME)?;
        let desc = self.paged(self.describe(method, MethodKind::Find, args)?, request)?;
        let cap = desc.max_results;
        let count_query = desc.count_query();
        let strategy = uow.config().nested_fetch;

        let page = paginate(
            request,
            |window| {
                let desc = desc.window(window);
                let spec = &spec;
                async move {
                    let views = fetch_views(uow, desc, spec, strategy).await?;
                    views.iter().map(P::from_view).collect::<Result<Vec<P>>>()
                }
            },
            || uow.count(&count_query),
        )
        .await?;
        Ok(capped(page, request, cap))
    }

    /// Runs a `find...` method selecting the constructor columns of `D`.
    pub async fn find_dtos<D: FromColumns>(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
    ) -> Result<Vec<D>> {
        for path in D::columns() {
            self.registry.resolve_path(E::NAME, path)?;
        }
        let desc = self
            .describe(method, MethodKind::Find, args)?
            .shape(ResultShape::dto(D::columns()));
        let rows = uow.fetch_rows(&desc).await?;
        materialize_dtos(&rows)
    }

    /// Runs a `find...` method selecting the given property paths as plain
    /// rows.
    pub async fn find_scalars(
        &self,
        uow: &UnitOfWork,
        method: &str,
        args: &[Arg],
        columns: &[&str],
    ) -> Result<ResultSet> {
        if columns.is_empty() {
            return Err(RepoError::Configuration(format!(
                "Method '{}' needs at least one selected column",
                method
            )));
        }
        for path in columns {
            self.registry.resolve_path(E::NAME, path)?;
        }
        let desc = self
            .describe(method, MethodKind::Find, args)?
            .shape(ResultShape::scalar(columns));
        uow.fetch_rows(&desc).await
    }

    fn spec_query(&self, spec: &Specification<E>) -> Result<QueryDescription> {
        for path in spec.predicate().paths() {
            self.registry.resolve_path(E::NAME, path.as_str())?;
        }
        Ok(self.base_query().filter(spec.predicate().clone()))
    }

    pub async fn find_all_by_spec(
        &self,
        uow: &UnitOfWork,
        spec: &Specification<E>,
    ) -> Result<Vec<EntityRef<E>>> {
        uow.query::<E>(self.spec_query(spec)?).await
    }

    pub async fn count_by_spec(&self, uow: &UnitOfWork, spec: &Specification<E>) -> Result<u64> {
        uow.count(&self.spec_query(spec)?.count_query()).await
    }

    pub async fn find_page_by_spec(
        &self,
        uow: &UnitOfWork,
        spec: &Specification<E>,
        request: &PageRequest,
    ) -> Result<Page<EntityRef<E>>> {
        let desc = self.spec_query(spec)?;
        self.page_of_entities(uow, desc, request).await
    }

    fn example_query(&self, example: &Example<E>) -> Result<QueryDescription> {
        Ok(self.base_query().filter(example.to_predicate(&self.registry)?))
    }

    pub async fn find_all_by_example(
        &self,
        uow: &UnitOfWork,
        example: &Example<E>,
    ) -> Result<Vec<EntityRef<E>>> {
        uow.query::<E>(self.example_query(example)?).await
    }

    pub async fn find_one_by_example(
        &self,
        uow: &UnitOfWork,
        example: &Example<E>,
    ) -> Result<Option<EntityRef<E>>> {
        single(self.find_all_by_example(uow, example).await?)
    }

    pub async fn count_by_example(&self, uow: &UnitOfWork, example: &Example<E>) -> Result<u64> {
        uow.count(&self.example_query(example)?.count_query()).await
    }

    /// Updates every row matching `spec` directly in storage. Managed
    /// instances keep their old state unless the identity map is cleared,
    /// either here (`auto_clear`, defaulting to the configuration) or by the
    /// caller.
    pub async fn bulk_update(
        &self,
        uow: &UnitOfWork,
        spec: &Specification<E>,
        assignments: &[Assignment],
        auto_clear: Option<bool>,
    ) -> Result<u64> {
        if assignments.is_empty() {
            return Err(RepoError::Configuration(format!(
                "Bulk update of {} needs at least one assignment",
                E::NAME
            )));
        }
        let query = self.spec_query(spec)?;
        uow.bulk_update(&query, assignments, auto_clear.or(Some(self.config.auto_clear_after_bulk)))
            .await
    }

    pub async fn bulk_delete(
        &self,
        uow: &UnitOfWork,
        spec: &Specification<E>,
        auto_clear: Option<bool>,
    ) -> Result<u64> {
        let query = self.spec_query(spec)?;
        uow.bulk_delete(&query, auto_clear.or(Some(self.config.auto_clear_after_bulk)))
            .await
    }
}

/// `Top<N>` caps the whole result, so the total never exceeds the cap.
fn capped<T>(page: Page<T>, request: &PageRequest, cap: Option<u64>) -> Page<T> {
    match cap {
        Some(cap) if page.total_elements() > cap => Page::new(page.into_content(), request, cap),
        _ => page,
    }
}
