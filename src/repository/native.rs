use super::{NativeDeclaration, Repository};
use crate::core::{Record, RepoError, Result};
use crate::entity::Entity;
use crate::mapping::EntityMapping;
use crate::materialize::records_by_property;
use crate::paging::{Page, PageRequest, paginate};
use crate::projection::{Projection, SecondaryViews, build_view};
use crate::query::{NativeQuery, Params};
use crate::result::ResultSet;
use crate::session::{EntityRef, UnitOfWork};

impl<E: Entity> Repository<E> {
    fn native_declaration(&self, name: &str) -> Result<&NativeDeclaration> {
        self.natives.get(name).ok_or_else(|| {
            RepoError::Configuration(format!(
                "Native query '{}' is not declared on the {} repository",
                name,
                E::NAME
            ))
        })
    }

    /// Rows of a declared native query, labelled as the query selects them.
    pub async fn native_rows(&self, uow: &UnitOfWork, name: &str, params: Params) -> Result<ResultSet> {
        let native = self.native_declaration(name)?;
        uow.native(&NativeQuery::with_params(native.sql.as_str(), params), None)
            .await
    }

    /// Managed entities from a native query selecting every mapped column
    /// (typically `alias.*`).
    pub async fn native_entities(
        &self,
        uow: &UnitOfWork,
        name: &str,
        params: Params,
    ) -> Result<Vec<EntityRef<E>>> {
        let mapping = self.registry.get(E::NAME)?;
        let rows = self.native_rows(uow, name, params).await?;
        let records = records_by_property(mapping, &rows);
        uow.materialize_records::<E>(&records, false)
    }

    /// One page of a native query projected onto `P`. The declaration must
    /// carry a count query; it runs with the same parameters.
    ///
    /// Labels matching a mapped column of `E` are read under the property
    /// name; any other label (an `AS` alias) is used verbatim.
    pub async fn native_projected_page<P: Projection>(
        &self,
        uow: &UnitOfWork,
        name: &str,
        params: Params,
        request: &PageRequest,
    ) -> Result<Page<P>> {
        request.check_max(self.config.max_page_size)?;
        let native = self.native_declaration(name)?;
        let count_sql = native.count_sql.as_deref().ok_or_else(|| {
            RepoError::Configuration(format!(
                "Native query '{}' cannot be paged without a count query",
                name
            ))
        })?;
        let mapping = self.registry.get(E::NAME)?;
        let spec = P::spec();
        let query = NativeQuery::with_params(native.sql.as_str(), params.clone());
        let count = NativeQuery::with_params(count_sql, params);

        paginate(
            request,
            |window| {
                let (query, spec) = (&query, &spec);
                async move {
                    let rows = uow.native(query, Some(window)).await?;
                    let secondary = SecondaryViews::new();
                    projection_records(mapping, &rows)
                        .iter()
                        .map(|record| P::from_view(&build_view(spec, record, "", &secondary)?))
                        .collect::<Result<Vec<P>>>()
                }
            },
            || async {
                let total = uow.native(&count, None).await?;
                total.scalar()?.as_i64().map(|n| n.max(0) as u64).ok_or_else(|| {
                    RepoError::TypeMismatch(format!(
                        "Count query of '{}' must return one integer",
                        name
                    ))
                })
            },
        )
        .await
    }
}

fn projection_records(mapping: &EntityMapping, rows: &ResultSet) -> Vec<Record> {
    let labels: Vec<String> = rows
        .columns
        .iter()
        .map(|label| {
            let column = label.rsplit('.').next().unwrap_or(label);
            mapping
                .property_for_column(column)
                .unwrap_or_else(|| label.clone())
        })
        .collect();

    rows.rows()
        .iter()
        .map(|row| labels.iter().cloned().zip(row.iter().cloned()).collect())
        .collect()
}
