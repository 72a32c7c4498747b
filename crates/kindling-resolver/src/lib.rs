mod compat;
mod resolve;

pub use compat::{caret_requirement, parse_version};
pub use resolve::{compatible_versions, resolve_latest_compatible};
