mod error;
mod pairing;
mod ports;
mod session;
mod types;
mod view;

pub use error::*;
pub use pairing::*;
pub use ports::*;
pub use session::*;
pub use types::*;
pub use view::*;
