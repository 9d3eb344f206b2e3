pub mod join_spec;
pub mod registry;
pub mod loader;

pub use join_spec::*;
pub use registry::*;
pub use loader::*;
