pub mod cache;
pub mod mime;
pub mod orchestrator;
pub mod parser;
pub mod types;
pub mod validator;


pub use cache::{CacheKey, CacheStats, ScanCache};
pub use orchestrator::{PoolStats, ScanOrchestrator};
pub use parser::parse_scan_report;
pub use types::*;
pub use validator::ScanPolicy;
