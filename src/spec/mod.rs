//! Year-indexed column-width specifications: loading, caching and resolution.

pub mod interpolate;
pub mod registry;
pub mod table;

pub use interpolate::{resolve, ResolvedWidths};
pub use registry::SpecRegistry;
pub use table::SpecTable;
