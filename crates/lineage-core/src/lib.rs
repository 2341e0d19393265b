pub mod config;
pub mod entity;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use entity::*;
pub use error::*;
pub use traits::*;
pub use types::*;
