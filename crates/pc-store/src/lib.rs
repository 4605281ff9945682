pub mod dataset;
pub mod session;

pub use dataset::*;
pub use session::*;
