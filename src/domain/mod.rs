pub mod battery;
pub mod decision;
pub mod plan;
pub mod snapshot;
pub mod types;
pub mod usage_profile;

pub use battery::*;
pub use decision::*;
pub use plan::*;
pub use snapshot::*;
pub use types::*;
pub use usage_profile::*;
