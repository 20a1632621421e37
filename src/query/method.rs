//! Derived query methods: `findByUsernameAndAgeGreaterThan`, `countByAge`,
//! `findTop3ByOrderByAgeDesc`, `findByTeamName`, ...
//!
//! Method names are parsed and every property path is resolved against the
//! mapping when the repository is built, so a misspelt method fails before
//! its first call. Binding arguments later only produces a
//! [`QueryDescription`].

use super::description::{Direction, Order, QueryDescription, Sort};
use super::predicate::{ComparisonOp, FieldPath, Predicate};
use crate::core::{RepoError, Result, Value};
use crate::expression::escape_like;
use crate::mapping::MappingRegistry;
use regex::Regex;
use std::cmp::Reverse;

const PREFIXES: &[(&str, MethodKind)] = &[
    ("find", MethodKind::Find),
    ("read", MethodKind::Find),
    ("get", MethodKind::Find),
    ("query", MethodKind::Find),
    ("search", MethodKind::Find),
    ("stream", MethodKind::Find),
    ("count", MethodKind::Count),
    ("exists", MethodKind::Exists),
    ("delete", MethodKind::Delete),
    ("remove", MethodKind::Delete),
];

const KEYWORDS: &[(&str, ClauseKind)] = &[
    ("IsNotNull", ClauseKind::IsNotNull),
    ("NotNull", ClauseKind::IsNotNull),
    ("IsNull", ClauseKind::IsNull),
    ("Null", ClauseKind::IsNull),
    ("IsGreaterThanEqual", ClauseKind::GreaterThanEqual),
    ("GreaterThanEqual", ClauseKind::GreaterThanEqual),
    ("IsGreaterThan", ClauseKind::GreaterThan),
    ("GreaterThan", ClauseKind::GreaterThan),
    ("IsLessThanEqual", ClauseKind::LessThanEqual),
    ("LessThanEqual", ClauseKind::LessThanEqual),
    ("IsLessThan", ClauseKind::LessThan),
    ("LessThan", ClauseKind::LessThan),
    ("IsBefore", ClauseKind::LessThan),
    ("Before", ClauseKind::LessThan),
    ("IsAfter", ClauseKind::GreaterThan),
    ("After", ClauseKind::GreaterThan),
    ("IsBetween", ClauseKind::Between),
    ("Between", ClauseKind::Between),
    ("IsNotLike", ClauseKind::NotLike),
    ("NotLike", ClauseKind::NotLike),
    ("IsLike", ClauseKind::Like),
    ("Like", ClauseKind::Like),
    ("IsContaining", ClauseKind::Containing),
    ("Containing", ClauseKind::Containing),
    ("Contains", ClauseKind::Containing),
    ("IsStartingWith", ClauseKind::StartingWith),
    ("StartingWith", ClauseKind::StartingWith),
    ("StartsWith", ClauseKind::StartingWith),
    ("IsEndingWith", ClauseKind::EndingWith),
    ("EndingWith", ClauseKind::EndingWith),
    ("EndsWith", ClauseKind::EndingWith),
    ("IsNotIn", ClauseKind::NotIn),
    ("NotIn", ClauseKind::NotIn),
    ("IsIn", ClauseKind::In),
    ("In", ClauseKind::In),
    ("IsTrue", ClauseKind::True),
    ("True", ClauseKind::True),
    ("IsFalse", ClauseKind::False),
    ("False", ClauseKind::False),
    ("IsNot", ClauseKind::NotEquals),
    ("Not", ClauseKind::NotEquals),
    ("Is", ClauseKind::Equals),
    ("Equals", ClauseKind::Equals),
];

lazy_static::lazy_static! {
    // Leads the subject, optionally after Distinct, and ends at a word boundary.
    static ref LIMITING: Regex =
        Regex::new(r"^(?:Distinct)?(?:First|Top)(\d*)(?:[A-Z]|$)").expect("static regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Find,
    Count,
    Exists,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    Like,
    NotLike,
    Containing,
    StartingWith,
    EndingWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    True,
    False,
}

impl ClauseKind {
    /// Number of call arguments the clause consumes.
    pub fn arity(&self) -> usize {
        match self {
            ClauseKind::IsNull | ClauseKind::IsNotNull | ClauseKind::True | ClauseKind::False => 0,
            ClauseKind::Between => 2,
            _ => 1,
        }
    }

    fn takes_list(&self) -> bool {
        matches!(self, ClauseKind::In | ClauseKind::NotIn)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub path: FieldPath,
    pub kind: ClauseKind,
}

/// Call-site argument of a derived method.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    List(Vec<Value>),
}

impl Arg {
    pub fn value(value: impl Into<Value>) -> Self {
        Arg::Value(value.into())
    }

    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

/// A parsed and validated derived query method.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedQuery {
    method: String,
    entity: String,
    kind: MethodKind,
    distinct: bool,
    max_results: Option<u64>,
    /// OR of AND groups.
    groups: Vec<Vec<Clause>>,
    sort: Sort,
}

impl DerivedQuery {
    pub fn parse(
        method: &str,
        entity: &str,
        registry: &MappingRegistry,
        default_sort: &Sort,
    ) -> Result<Self> {
        registry
            .get(entity)
            .map_err(|e| RepoError::unresolvable(method, e.to_string()))?;

        let (prefix, kind) = PREFIXES
            .iter()
            .find(|(prefix, _)| {
                method.starts_with(prefix)
                    && method[prefix.len()..]
                        .chars()
                        .next()
                        .is_none_or(|c| c.is_ascii_uppercase())
            })
            .ok_or_else(|| {
                RepoError::unresolvable(
                    method,
                    "must start with find, read, get, query, search, stream, count, exists, delete or remove",
                )
            })?;

        let rest = &method[prefix.len()..];
        let (subject, criteria) = match find_keyword(rest, "By", true) {
            Some(at) => (&rest[..at], Some(&rest[at + 2..])),
            None => (rest, None),
        };

        let distinct = subject.contains("Distinct");
        let max_results = match LIMITING.captures(subject) {
            Some(caps) => {
                let digits = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let n = if digits.is_empty() {
                    1
                } else {
                    digits.parse::<u64>().map_err(|_| {
                        RepoError::unresolvable(method, format!("invalid row limit '{}'", digits))
                    })?
                };
                if n == 0 {
                    return Err(RepoError::unresolvable(method, "row limit must be positive"));
                }
                Some(n)
            }
            None => None,
        };

        let (predicate_part, order_part) = match criteria {
            None => ("", None),
            Some(criteria) => match find_keyword(criteria, "OrderBy", false) {
                Some(at) => (&criteria[..at], Some(&criteria[at + 7..])),
                None => (criteria, None),
            },
        };

        if criteria.is_some() && predicate_part.is_empty() && order_part.is_none() {
            return Err(RepoError::unresolvable(method, "missing criteria after 'By'"));
        }

        let mut groups = Vec::new();
        if !predicate_part.is_empty() {
            for or_part in split_keyword(predicate_part, "Or") {
                let mut group = Vec::new();
                for and_part in split_keyword(or_part, "And") {
                    if and_part.is_empty() {
                        return Err(RepoError::unresolvable(method, "empty clause between And/Or"));
                    }
                    group.push(parse_clause(method, and_part, entity, registry)?);
                }
                groups.push(group);
            }
        }

        let sort = match order_part {
            Some(order) => parse_order(method, order, entity, registry)?,
            None => Sort::unsorted(),
        };

        if max_results.is_some() && !sort.is_sorted() && !default_sort.is_sorted() {
            return Err(RepoError::unresolvable(
                method,
                "Top/First needs an OrderBy clause or a repository default sort",
            ));
        }

        Ok(Self {
            method: method.to_string(),
            entity: entity.to_string(),
            kind: *kind,
            distinct,
            max_results,
            groups,
            sort: sort.or_else(default_sort),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.groups.iter().flatten()
    }

    pub fn arity(&self) -> usize {
        self.clauses().map(|c| c.kind.arity()).sum()
    }

    /// Binds call arguments positionally and produces the query description.
    pub fn bind(&self, args: &[Arg]) -> Result<QueryDescription> {
        if args.len() != self.arity() {
            return Err(RepoError::Configuration(format!(
                "Method '{}' expects {} argument(s), got {}",
                self.method,
                self.arity(),
                args.len()
            )));
        }

        let mut args = args.iter();
        let mut disjuncts = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut conjuncts = Vec::with_capacity(group.len());
            for clause in group {
                let taken: Vec<&Arg> = args.by_ref().take(clause.kind.arity()).collect();
                conjuncts.push(self.bind_clause(clause, &taken)?);
            }
            disjuncts.push(Predicate::all(conjuncts));
        }

        let mut query = QueryDescription::new(self.entity.clone())
            .filter(Predicate::any(disjuncts))
            .sorted(self.sort.clone())
            .distinct(self.distinct);
        if let Some(max) = self.max_results {
            query = query.max_results(max);
        }
        Ok(query)
    }

    fn bind_clause(&self, clause: &Clause, args: &[&Arg]) -> Result<Predicate> {
        let path = clause.path.clone();

        if clause.kind.takes_list() {
            let Some(Arg::List(values)) = args.first() else {
                return Err(RepoError::TypeMismatch(format!(
                    "Method '{}': '{}' expects a list argument",
                    self.method, path
                )));
            };
            return Ok(Predicate::In {
                path,
                values: values.clone(),
                negated: clause.kind == ClauseKind::NotIn,
            });
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Value(value) => values.push(value.clone()),
                Arg::List(_) => {
                    return Err(RepoError::TypeMismatch(format!(
                        "Method '{}': '{}' expects a single value, got a list",
                        self.method, path
                    )));
                }
            }
        }

        let text = |value: &Value| -> Result<String> {
            value.as_str().map(str::to_string).ok_or_else(|| {
                RepoError::TypeMismatch(format!(
                    "Method '{}': '{}' expects text, got {}",
                    self.method,
                    clause.path,
                    value.type_name()
                ))
            })
        };

        let predicate = match (clause.kind, values.as_slice()) {
            (ClauseKind::Equals, [Value::Null]) => Predicate::is_null(path),
            (ClauseKind::NotEquals, [Value::Null]) => Predicate::is_not_null(path),
            (ClauseKind::Equals, [v]) => Predicate::compare(path, ComparisonOp::Eq, v.clone()),
            (ClauseKind::NotEquals, [v]) => Predicate::compare(path, ComparisonOp::NotEq, v.clone()),
            (ClauseKind::GreaterThan, [v]) => Predicate::compare(path, ComparisonOp::Gt, v.clone()),
            (ClauseKind::GreaterThanEqual, [v]) => {
                Predicate::compare(path, ComparisonOp::GtEq, v.clone())
            }
            (ClauseKind::LessThan, [v]) => Predicate::compare(path, ComparisonOp::Lt, v.clone()),
            (ClauseKind::LessThanEqual, [v]) => {
                Predicate::compare(path, ComparisonOp::LtEq, v.clone())
            }
            (ClauseKind::Between, [low, high]) => {
                Predicate::compare(path.clone(), ComparisonOp::GtEq, low.clone())
                    .and(Predicate::compare(path, ComparisonOp::LtEq, high.clone()))
            }
            (ClauseKind::Like, [v]) => Predicate::compare(path, ComparisonOp::Like, v.clone()),
            (ClauseKind::NotLike, [v]) => Predicate::compare(path, ComparisonOp::NotLike, v.clone()),
            (ClauseKind::Containing, [v]) => {
                Predicate::compare(
                    path.clone(),
                    ComparisonOp::Like,
                    format!("%{}%", escape_like(&text(v)?)),
                )
            }
            (ClauseKind::StartingWith, [v]) => {
                Predicate::compare(
                    path.clone(),
                    ComparisonOp::Like,
                    format!("{}%", escape_like(&text(v)?)),
                )
            }
            (ClauseKind::EndingWith, [v]) => {
                Predicate::compare(
                    path.clone(),
                    ComparisonOp::Like,
                    format!("%{}", escape_like(&text(v)?)),
                )
            }
            (ClauseKind::IsNull, []) => Predicate::is_null(path),
            (ClauseKind::IsNotNull, []) => Predicate::is_not_null(path),
            (ClauseKind::True, []) => Predicate::eq(path, true),
            (ClauseKind::False, []) => Predicate::eq(path, false),
            (kind, values) => {
                return Err(RepoError::Configuration(format!(
                    "Method '{}': {:?} on '{}' cannot take {} argument(s)",
                    self.method,
                    kind,
                    path,
                    values.len()
                )));
            }
        };
        Ok(predicate)
    }
}

/// Position of `keyword` where it starts a new camel-case word and is itself
/// followed by an upper-case letter (or, with `allow_end`, the end of input).
fn find_keyword(s: &str, keyword: &str, allow_end: bool) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..s.len()).find(|&i| {
        if !s.is_char_boundary(i) || !s[i..].starts_with(keyword) {
            return false;
        }
        let starts_word = i == 0 || !bytes[i - 1].is_ascii_uppercase();
        let end = i + keyword.len();
        let ends_word = match bytes.get(end) {
            Some(b) => b.is_ascii_uppercase(),
            None => allow_end,
        };
        starts_word && ends_word
    })
}

/// Splits on `keyword` only between a lower-case letter (or digit) and an
/// upper-case one, so `UsernameOrAge` splits but `OrderDate` does not.
fn split_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 1;
    while i < s.len() {
        let prev = bytes[i - 1];
        let boundary = (prev.is_ascii_lowercase() || prev.is_ascii_digit())
            && s[i..].starts_with(keyword)
            && bytes
                .get(i + keyword.len())
                .is_some_and(|b| b.is_ascii_uppercase());
        if boundary {
            parts.push(&s[start..i]);
            start = i + keyword.len();
            i = start + 1;
        } else {
            i += 1;
        }
    }
    parts.push(&s[start..]);
    parts
}

fn uncapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_clause(
    method: &str,
    part: &str,
    entity: &str,
    registry: &MappingRegistry,
) -> Result<Clause> {
    let mut keywords: Vec<&(&str, ClauseKind)> = KEYWORDS
        .iter()
        .filter(|(kw, _)| part.len() > kw.len() && part.ends_with(kw))
        .collect();
    keywords.sort_by_key(|(kw, _)| Reverse(kw.len()));

    for (keyword, kind) in keywords {
        let property = &part[..part.len() - keyword.len()];
        if let Some(path) = resolve_property(registry, entity, property) {
            return Ok(Clause {
                path: FieldPath::new(path),
                kind: *kind,
            });
        }
    }

    resolve_property(registry, entity, part)
        .map(|path| Clause {
            path: FieldPath::new(path),
            kind: ClauseKind::Equals,
        })
        .ok_or_else(|| {
            RepoError::unresolvable(
                method,
                format!("no property '{}' found on {}", uncapitalize(part), entity),
            )
        })
}

fn parse_order(
    method: &str,
    order: &str,
    entity: &str,
    registry: &MappingRegistry,
) -> Result<Sort> {
    let bytes = order.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 1;

    'scan: while i < order.len() {
        for (keyword, direction) in [("Desc", Direction::Desc), ("Asc", Direction::Asc)] {
            let end = i + keyword.len();
            if order[i..].starts_with(keyword)
                && bytes.get(end).is_none_or(|b| b.is_ascii_uppercase())
            {
                segments.push((&order[start..i], direction));
                start = end;
                i = end + 1;
                continue 'scan;
            }
        }
        i += 1;
    }
    if start < order.len() {
        segments.push((&order[start..], Direction::Asc));
    }

    if segments.is_empty() {
        return Err(RepoError::unresolvable(method, "missing property after 'OrderBy'"));
    }

    let mut orders = Vec::with_capacity(segments.len());
    for (property, direction) in segments {
        let path = resolve_property(registry, entity, property).ok_or_else(|| {
            RepoError::unresolvable(
                method,
                format!("no sort property '{}' found on {}", uncapitalize(property), entity),
            )
        })?;
        orders.push(Order {
            path: FieldPath::new(path),
            direction,
        });
    }
    Ok(Sort::by(orders))
}

/// Resolves a capitalized property expression (`TeamName`, `Team_Name`) to a
/// dotted path, preferring the longest association prefix.
fn resolve_property(registry: &MappingRegistry, entity: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    if name.contains('_') {
        let path = name
            .split('_')
            .map(uncapitalize)
            .collect::<Vec<_>>()
            .join(".");
        return registry.resolve_path(entity, &path).ok().map(|_| path);
    }

    let mapping = registry.get(entity).ok()?;
    let property = uncapitalize(name);
    if mapping.field_mapping(&property).is_some()
        || mapping.association(&property).is_some_and(|a| a.is_owning())
    {
        return Some(property);
    }

    let bounds: Vec<usize> = name
        .char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, _)| i)
        .collect();

    for &at in bounds.iter().rev() {
        let head = uncapitalize(&name[..at]);
        if let Some(assoc) = mapping.association(&head)
            && assoc.is_owning()
            && let Some(rest) = resolve_property(registry, &assoc.target, &name[at..])
        {
            return Some(format!("{}.{}", head, rest));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::mapping::{EntityMapping, FetchType};

    fn registry() -> MappingRegistry {
        MappingRegistry::from_mappings([
            EntityMapping::new("Member", "member")
                .id("id", "member_id")
                .field("username", DataType::Text)
                .field("age", DataType::Integer)
                .many_to_one("team", "Team", "team_id", FetchType::Lazy),
            EntityMapping::new("Team", "team")
                .id("id", "team_id")
                .field("name", DataType::Text)
                .one_to_many("members", "Member", "team"),
        ])
        .unwrap()
    }

    fn parse(method: &str) -> Result<DerivedQuery> {
        DerivedQuery::parse(method, "Member", &registry(), &Sort::unsorted())
    }

    #[test]
    fn test_and_with_keyword_suffix() {
        let query = parse("findByUsernameAndAgeGreaterThan").unwrap();
        let clauses: Vec<_> = query.clauses().cloned().collect();
        assert_eq!(
            clauses,
            vec![
                Clause {
                    path: FieldPath::new("username"),
                    kind: ClauseKind::Equals
                },
                Clause {
                    path: FieldPath::new("age"),
                    kind: ClauseKind::GreaterThan
                },
            ]
        );
        assert_eq!(query.kind(), MethodKind::Find);

        let bound = query
            .bind(&[Arg::value("AAA"), Arg::value(15)])
            .unwrap();
        assert_eq!(
            bound.predicate.to_string(),
            "(username = 'AAA' AND age > 15)"
        );
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let query = parse("findByUsernameAndAgeOrAgeLessThan").unwrap();
        let bound = query
            .bind(&[Arg::value("m1"), Arg::value(10), Arg::value(5)])
            .unwrap();
        assert_eq!(
            bound.predicate.to_string(),
            "((username = 'm1' AND age = 10) OR age < 5)"
        );
    }

    #[test]
    fn test_association_traversal() {
        let query = parse("findByTeamName").unwrap();
        assert_eq!(query.clauses().next().unwrap().path.as_str(), "team.name");

        let query = parse("findByTeam_Name").unwrap();
        assert_eq!(query.clauses().next().unwrap().path.as_str(), "team.name");

        let query = parse("findByTeamIsNull").unwrap();
        assert_eq!(query.arity(), 0);
    }

    #[test]
    fn test_unknown_property_fails_eagerly() {
        let err = parse("findByNickname").unwrap_err();
        assert!(matches!(err, RepoError::UnresolvableQuery { .. }));
        assert!(parse("fetchByUsername").is_err());
        assert!(parse("findBy").is_err());
        assert!(parse("findByUsernameOrderByShoeSize").is_err());
    }

    #[test]
    fn test_top_requires_ordering() {
        let err = parse("findTop3HelloBy").unwrap_err();
        assert!(matches!(err, RepoError::UnresolvableQuery { .. }));

        let query = parse("findTop3ByOrderByAgeDesc").unwrap();
        assert_eq!(query.max_results(), Some(3));
        assert_eq!(query.sort(), &Sort::desc("age"));

        let with_default =
            DerivedQuery::parse("findTop3HelloBy", "Member", &registry(), &Sort::asc("id"))
                .unwrap();
        assert_eq!(with_default.sort(), &Sort::asc("id"));
        assert_eq!(with_default.bind(&[]).unwrap().max_results, Some(3));
    }

    #[test]
    fn test_subject_modifiers_and_prefixes() {
        let query = parse("findDistinctMemberByUsername").unwrap();
        assert!(query.is_distinct());

        assert_eq!(parse("countByAge").unwrap().kind(), MethodKind::Count);
        assert_eq!(parse("existsByUsername").unwrap().kind(), MethodKind::Exists);
        assert_eq!(parse("deleteByAgeLessThan").unwrap().kind(), MethodKind::Delete);
        assert_eq!(parse("findFirstByOrderByUsernameAsc").unwrap().max_results(), Some(1));
    }

    #[test]
    fn test_limit_keyword_must_lead_the_subject() {
        assert_eq!(parse("findFirstnamesByAge").unwrap().max_results(), None);
        assert_eq!(parse("findMemberTop3ByAge").unwrap().max_results(), None);

        let query = parse("findDistinctTop2ByOrderByAgeDesc").unwrap();
        assert!(query.is_distinct());
        assert_eq!(query.max_results(), Some(2));
    }

    #[test]
    fn test_multi_order() {
        let query = parse("findByAgeOrderByAgeDescUsername").unwrap();
        assert_eq!(
            query.sort(),
            &Sort::by([Order::desc("age"), Order::asc("username")])
        );
    }

    #[test]
    fn test_bind_checks_arity_and_shape() {
        let between = parse("findByAgeBetween").unwrap();
        assert_eq!(between.arity(), 2);
        assert!(between.bind(&[Arg::value(1)]).is_err());

        let in_list = parse("findByUsernameIn").unwrap();
        assert!(in_list.bind(&[Arg::value("AAA")]).is_err());
        let bound = in_list.bind(&[Arg::list(["AAA", "BBB"])]).unwrap();
        assert_eq!(bound.predicate.to_string(), "username IN ('AAA', 'BBB')");

        let containing = parse("findByUsernameContaining").unwrap();
        let bound = containing.bind(&[Arg::value("em")]).unwrap();
        assert_eq!(bound.predicate.to_string(), "username LIKE '%em%'");
    }

    #[test]
    fn test_null_argument_becomes_null_check() {
        let query = parse("findByUsername").unwrap();
        let bound = query.bind(&[Arg::Value(Value::Null)]).unwrap();
        assert_eq!(bound.predicate, Predicate::is_null("username"));
    }

    #[test]
    fn test_split_keyword_boundaries() {
        assert_eq!(split_keyword("UsernameOrAge", "Or"), vec!["Username", "Age"]);
        assert_eq!(split_keyword("OrderDate", "Or"), vec!["OrderDate"]);
        assert_eq!(find_keyword("Top3HelloBy", "By", true), Some(9));
    }
}
