//! Database models split into domain-specific modules.

pub mod estimate;
pub mod lead;
pub mod project;
pub mod team;
pub mod user;

pub use estimate::*;
pub use lead::*;
pub use project::*;
pub use team::*;
pub use user::*;
