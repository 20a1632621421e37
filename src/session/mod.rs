//! Unit of work, identity map and lazily resolved associations.

mod entity_ref;
mod identity_map;
mod lazy;
mod load;
mod unit_of_work;

pub use entity_ref::EntityRef;
pub use identity_map::EntityId;
pub use lazy::{Lazy, LazyList};
pub use load::{FetchPlan, LoadContext};
pub use unit_of_work::UnitOfWork;
