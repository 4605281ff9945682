mod core_domain;

pub mod core {
    pub use crate::core_domain::*;
}
