//! Remote collaborators: OCR and LLM services.
//!
//! The extractor only sees the [`OcrGateway`] and [`LlmGateway`] traits, so
//! tests and alternative deployments plug in their own implementations.

pub mod http;
pub mod llm;
pub mod ocr;

pub use http::GatewayClient;
pub use llm::{build_llm_gateway, describe_table, HttpLlmGateway, LlmGateway, ProviderLlmGateway};
pub use ocr::{HttpOcrGateway, OcrGateway, OcrInput};
