//! Domain logic - pure branch and release rules independent of git operations

pub mod branch;
pub mod release;
pub mod rule;
pub mod target;

pub use branch::RemoteInfo;
pub use release::ReleaseLine;
pub use rule::{BranchFamily, BranchRule, CompiledRule};
pub use target::{compose_build_target, Freedom, ResolvedTarget};
