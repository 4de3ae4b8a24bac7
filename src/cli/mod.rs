pub mod list;
pub mod read;
pub mod write;

pub use list::*;
pub use read::*;
pub use write::*;
