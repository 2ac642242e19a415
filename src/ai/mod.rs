pub mod classifier;
pub mod gemini;
pub mod http_client;
pub mod prompts;
pub mod provider;

pub use classifier::{ClassifierConfig, HttpClassifier};
pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{ScanAnalyst, TumorClassifier};
