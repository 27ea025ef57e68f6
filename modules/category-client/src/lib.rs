pub mod claude;
pub mod stub;
pub mod traits;

pub use claude::ClaudeOracle;
pub use stub::StubOracle;
pub use traits::{CategoryOracle, OracleError, OracleRequest, OracleResponse};
