pub mod pattern;

pub use pattern::{escape_like, eval_like};
