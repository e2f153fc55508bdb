pub mod catalog;
pub mod openai_compat;
pub mod pricing;
pub mod registry;
pub mod traits;
pub(crate) mod sse;
pub mod util;

pub use catalog::{ModelCatalog, ResolvedModel};
pub use pricing::PricingCatalog;
pub use registry::ProviderRegistry;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
