pub mod file;
pub mod group;
pub mod query;
pub mod result;

pub use file::*;
pub use group::*;
pub use query::*;
pub use result::*;
