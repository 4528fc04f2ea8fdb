pub mod collection;
pub mod common;
pub mod meta_schema;

pub use collection::*;
pub use common::*;
pub use meta_schema::*;
