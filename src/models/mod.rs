pub mod database_family;
pub mod pageable;
pub mod sequence;

pub use database_family::*;
pub use pageable::*;
pub use sequence::*;
