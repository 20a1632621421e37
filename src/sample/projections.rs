use crate::core::{Result, Value};
use crate::entity::FromValue;
use crate::materialize::FromColumns;
use crate::projection::{ClosedView, DerivedPart, Projection, ProjectionSpec};
use crate::query::FieldPath;
use serde::Serialize;

/// Closed projection exposing only the username.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsernameOnly {
    pub username: String,
}

impl Projection for UsernameOnly {
    fn spec() -> ProjectionSpec {
        ProjectionSpec::new("UsernameOnly").column("username")
    }

    fn from_view(view: &ClosedView) -> Result<Self> {
        Ok(Self {
            username: view.read("username")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamInfo {
    pub name: String,
}

impl Projection for TeamInfo {
    fn spec() -> ProjectionSpec {
        ProjectionSpec::new("TeamInfo").column("name")
    }

    fn from_view(view: &ClosedView) -> Result<Self> {
        Ok(Self {
            name: view.read("name")?,
        })
    }
}

/// Username plus the member's team, itself projected onto [`TeamInfo`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedClosedProjection {
    pub username: String,
    pub team: Option<TeamInfo>,
}

impl Projection for NestedClosedProjection {
    fn spec() -> ProjectionSpec {
        ProjectionSpec::new("NestedClosedProjection")
            .column("username")
            .nested("team", "team", TeamInfo::spec())
    }

    fn from_view(view: &ClosedView) -> Result<Self> {
        Ok(Self {
            username: view.read("username")?,
            team: view.nested("team")?.map(TeamInfo::from_view).transpose()?,
        })
    }
}

/// Open projection: `summary` is computed as `username + ' ' + age`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSummary {
    pub username: String,
    pub summary: String,
}

impl Projection for MemberSummary {
    fn spec() -> ProjectionSpec {
        ProjectionSpec::new("MemberSummary").column("username").derived(
            "summary",
            vec![
                DerivedPart::Field(FieldPath::new("username")),
                DerivedPart::Literal(" ".into()),
                DerivedPart::Field(FieldPath::new("age")),
            ],
        )
    }

    fn from_view(view: &ClosedView) -> Result<Self> {
        Ok(Self {
            username: view.read("username")?,
            summary: view.read("summary")?,
        })
    }
}

/// Constructor-bound DTO over a joined column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDto {
    pub username: String,
    pub team_name: Option<String>,
}

impl FromColumns for MemberDto {
    fn columns() -> &'static [&'static str] {
        &["username", "team.name"]
    }

    fn from_row(row: &[Value]) -> Result<Self> {
        Ok(Self {
            username: String::from_value(&row[0])?,
            team_name: Option::<String>::from_value(&row[1])?,
        })
    }
}
