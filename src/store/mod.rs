pub mod object_id;
pub mod registry;
pub mod traits;

pub use object_id::*;
pub use registry::*;
pub use traits::*;
