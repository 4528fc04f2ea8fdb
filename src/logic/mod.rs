pub mod casting;
pub mod document;
pub mod field_resolver;
pub mod operators;
pub mod path_walker;
pub mod query_translator;
pub mod schema_generator;
pub mod text_search;

pub use casting::*;
pub use document::*;
pub use field_resolver::*;
pub use operators::*;
pub use path_walker::*;
pub use query_translator::*;
pub use schema_generator::*;
pub use text_search::*;
