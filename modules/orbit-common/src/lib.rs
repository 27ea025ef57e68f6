pub mod config;
pub mod error;
pub mod paths;
pub mod slug;
pub mod types;

pub use config::Config;
pub use error::OrbitError;
pub use paths::*;
pub use slug::slugify;
pub use types::*;
