use super::predicate::{ComparisonOp, FieldPath, Predicate};
use crate::core::{Result, Value};
use crate::expression::escape_like;
use crate::entity::Entity;
use crate::mapping::MappingRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringMatcher {
    #[default]
    Exact,
    Contains,
    Starting,
    Ending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// How the set fields of a sample turn into conditions.
#[derive(Debug, Clone, Default)]
pub struct ExampleMatcher {
    ignored_paths: Vec<String>,
    string_matcher: StringMatcher,
    mode: MatchMode,
}

impl ExampleMatcher {
    /// Every set field must match.
    pub fn matching() -> Self {
        Self::default()
    }

    /// At least one set field must match.
    pub fn matching_any() -> Self {
        Self {
            mode: MatchMode::Any,
            ..Self::default()
        }
    }

    /// Paths excluded regardless of their value, e.g. `age` or `team.name`.
    pub fn with_ignore_paths(mut self, paths: &[&str]) -> Self {
        self.ignored_paths
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_string_matcher(mut self, matcher: StringMatcher) -> Self {
        self.string_matcher = matcher;
        self
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored_paths.iter().any(|p| p == path)
    }

    fn condition(&self, path: FieldPath, value: &Value) -> Predicate {
        match (value, self.string_matcher) {
            (Value::Text(text), StringMatcher::Contains) => {
                Predicate::compare(path, ComparisonOp::Like, format!("%{}%", escape_like(text)))
            }
            (Value::Text(text), StringMatcher::Starting) => {
                Predicate::compare(path, ComparisonOp::Like, format!("{}%", escape_like(text)))
            }
            (Value::Text(text), StringMatcher::Ending) => {
                Predicate::compare(path, ComparisonOp::Like, format!("%{}", escape_like(text)))
            }
            _ => Predicate::compare(path, ComparisonOp::Eq, value.clone()),
        }
    }
}

/// An entity-shaped sample: only its non-null fields participate.
#[derive(Debug, Clone)]
pub struct Example<E> {
    sample: E,
    matcher: ExampleMatcher,
}

impl<E: Entity> Example<E> {
    pub fn of(sample: E) -> Self {
        Self::with_matcher(sample, ExampleMatcher::matching())
    }

    pub fn with_matcher(sample: E, matcher: ExampleMatcher) -> Self {
        Self { sample, matcher }
    }

    pub fn sample(&self) -> &E {
        &self.sample
    }

    pub fn matcher(&self) -> &ExampleMatcher {
        &self.matcher
    }

    /// Conditions for every set, non-ignored field of the sample and of the
    /// associated samples it holds in memory (`team.name = ...`).
    pub fn to_predicate(&self, registry: &MappingRegistry) -> Result<Predicate> {
        let mapping = registry.get(E::NAME)?;
        let associated = self.sample.associated_records()?;
        let mut conditions = Vec::new();

        for (name, value) in self.sample.to_record().iter() {
            if value.is_null() || self.matcher.is_ignored(name) {
                continue;
            }
            if associated.iter().any(|(assoc, _)| *assoc == name) {
                continue;
            }
            let mapped = mapping.field_mapping(name).is_some()
                || mapping.association(name).is_some_and(|a| a.is_owning());
            if mapped {
                conditions.push(self.matcher.condition(FieldPath::new(name), value));
            }
        }

        for (assoc_name, record) in &associated {
            if self.matcher.is_ignored(assoc_name) {
                continue;
            }
            let Some(assoc) = mapping.association(assoc_name) else {
                continue;
            };
            let target = registry.get(&assoc.target)?;
            for (name, value) in record.iter() {
                let path = FieldPath::new(*assoc_name).child(name);
                if value.is_null()
                    || self.matcher.is_ignored(path.as_str())
                    || target.field_mapping(name).is_none()
                {
                    continue;
                }
                conditions.push(self.matcher.condition(path, value));
            }
        }

        Ok(match self.matcher.mode {
            MatchMode::All => Predicate::all(conditions),
            MatchMode::Any => Predicate::any(conditions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{self, Member, Team};
    use crate::session::EntityRef;

    #[test]
    fn test_sample_with_ignored_field_and_association() {
        let registry = sample::mapping().unwrap();
        let member = EntityRef::new(Member::new("m1", 0));
        let team = EntityRef::new(Team::new("teamA"));
        Member::change_team(&member, Some(&team)).unwrap();

        let sample = member.read().unwrap().clone();
        let example = Example::with_matcher(
            sample,
            ExampleMatcher::matching().with_ignore_paths(&["age"]),
        );
        let predicate = example.to_predicate(&registry).unwrap();
        assert_eq!(
            predicate.to_string(),
            "(username = 'm1' AND team.name = 'teamA')"
        );
    }

    #[test]
    fn test_string_matcher_and_any_mode() {
        let registry = sample::mapping().unwrap();
        let example = Example::with_matcher(
            Member::new("m", 10),
            ExampleMatcher::matching_any().with_string_matcher(StringMatcher::Starting),
        );
        let predicate = example.to_predicate(&registry).unwrap();
        assert_eq!(predicate.to_string(), "(username LIKE 'm%' OR age = 10)");
    }
}
