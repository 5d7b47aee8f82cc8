pub mod result;
pub mod script;

pub use result::*;
pub use script::*;
