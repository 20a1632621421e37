//! A small member/team domain used by the demo runner and the test suites.

mod item;
mod member;
mod projections;
mod team;

pub use item::Item;
pub use member::{AGE, Member, TEAM_NAME, USERNAME};
pub use projections::{MemberDto, MemberSummary, NestedClosedProjection, TeamInfo, UsernameOnly};
pub use team::Team;

use crate::core::{DataType, Result};
use crate::mapping::{EntityMapping, FetchType, MappingRegistry};

/// Mapping of the sample domain. `Member.team` is lazy; repositories ask for
/// it eagerly per method.
pub fn mapping() -> Result<MappingRegistry> {
    MappingRegistry::from_mappings([
        EntityMapping::new("Team", "team")
            .field("name", DataType::Text)
            .not_null()
            .one_to_many("members", "Member", "team"),
        EntityMapping::new("Member", "member")
            .id("id", "member_id")
            .field("username", DataType::Text)
            .not_null()
            .field("age", DataType::Integer)
            .many_to_one("team", "Team", "team_id", FetchType::Lazy),
        EntityMapping::new("Item", "item")
            .id("code", "item_code")
            .assigned_keys()
            .field("label", DataType::Text)
            .column("created_at", "created_at", DataType::Timestamp),
    ])
}
