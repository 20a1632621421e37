use super::{MethodOptions, NativeDeclaration, Repository};
use crate::config::RepositoryConfig;
use crate::core::{RepoError, Result};
use crate::entity::Entity;
use crate::mapping::MappingRegistry;
use crate::query::{DerivedQuery, LockMode, Sort, native::validate_syntax};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Collects the declarations of a repository and resolves all of them at
/// [`build`](RepositoryBuilder::build).
///
/// ```ignore
/// let members = store
///     .repository::<Member>()
///     .default_sort(Sort::asc("username"))
///     .method("findByTeamName")
///     .method_with("findByAge", MethodOptions::new().fetch("team"))
///     .native_query_with_count(
///         "membersOfTeam",
///         "select m.* from member m join team t on m.team_id = t.id where t.name = :team",
///         "select count(*) from member m join team t on m.team_id = t.id where t.name = :team",
///     )
///     .build()?;
/// ```
pub struct RepositoryBuilder<E> {
    registry: Arc<MappingRegistry>,
    config: RepositoryConfig,
    default_sort: Sort,
    methods: Vec<(String, MethodOptions)>,
    natives: Vec<NativeDeclaration>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> RepositoryBuilder<E> {
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self {
            registry,
            config: RepositoryConfig::default(),
            default_sort: Sort::unsorted(),
            methods: Vec::new(),
            natives: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Ordering used when neither the method nor the call supplies one.
    pub fn default_sort(mut self, sort: Sort) -> Self {
        self.default_sort = sort;
        self
    }

    /// Declares a derived query method with default options.
    pub fn method(self, name: &str) -> Self {
        self.method_with(name, MethodOptions::new())
    }

    pub fn method_with(mut self, name: &str, options: MethodOptions) -> Self {
        self.methods.push((name.to_string(), options));
        self
    }

    /// Declares a native query. Paging it additionally needs a count query.
    pub fn native_query(mut self, name: &str, sql: &str) -> Self {
        self.natives.push(NativeDeclaration {
            name: name.to_string(),
            sql: sql.to_string(),
            count_sql: None,
        });
        self
    }

    pub fn native_query_with_count(mut self, name: &str, sql: &str, count_sql: &str) -> Self {
        self.natives.push(NativeDeclaration {
            name: name.to_string(),
            sql: sql.to_string(),
            count_sql: Some(count_sql.to_string()),
        });
        self
    }

    /// Resolves every declaration against the mapping. Unknown properties,
    /// grammar errors, `Top<N>` without any ordering, bad fetch paths and
    /// unparsable native text all fail here.
    pub fn build(self) -> Result<Repository<E>> {
        self.config.validate()?;
        let mapping = self.registry.get(E::NAME)?;
        for order in self.default_sort.orders() {
            self.registry.resolve_path(E::NAME, order.path.as_str())?;
        }

        let mut methods = HashMap::with_capacity(self.methods.len());
        for (name, options) in self.methods {
            let query = DerivedQuery::parse(&name, E::NAME, &self.registry, &self.default_sort)?;

            for association in &options.fetch {
                let fetchable = mapping
                    .association(association)
                    .is_some_and(|a| a.is_owning());
                if !fetchable {
                    return Err(RepoError::unresolvable(
                        &name,
                        format!("'{}' is not a to-one association of {}", association, E::NAME),
                    ));
                }
            }
            if options.lock != LockMode::None && options.read_only {
                return Err(RepoError::unresolvable(
                    &name,
                    "a read-only method cannot request a pessimistic lock",
                ));
            }

            if methods.insert(name.clone(), (query, options)).is_some() {
                return Err(RepoError::Configuration(format!(
                    "Method '{}' is declared twice on the {} repository",
                    name,
                    E::NAME
                )));
            }
        }

        let mut natives = HashMap::with_capacity(self.natives.len());
        for native in self.natives {
            validate_syntax(&native.sql)
                .map_err(|e| RepoError::unresolvable(&native.name, e.to_string()))?;
            if let Some(count_sql) = &native.count_sql {
                validate_syntax(count_sql)
                    .map_err(|e| RepoError::unresolvable(&native.name, e.to_string()))?;
            }
            let name = native.name.clone();
            if natives.insert(name.clone(), native).is_some() {
                return Err(RepoError::Configuration(format!(
                    "Native query '{}' is declared twice on the {} repository",
                    name,
                    E::NAME
                )));
            }
        }

        log::debug!(
            "Built {} repository with {} derived method(s) and {} native quer(ies)",
            E::NAME,
            methods.len(),
            natives.len()
        );

        Ok(Repository {
            registry: self.registry,
            config: self.config,
            default_sort: self.default_sort,
            methods,
            natives,
            _marker: PhantomData,
        })
    }
}
