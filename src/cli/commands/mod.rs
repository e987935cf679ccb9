//! CLI command implementations

pub mod load;
pub mod save;

pub use load::execute as load;
pub use save::execute as save;
