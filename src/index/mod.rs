//! Indexing: processors, stores and retrieval.
//!
//! ```text
//! IndexProcessorFactory ─▶ IndexProcessor { Paragraph | QuestionAnswer | ParentChild | External }
//!                              │ extract / transform
//!                              ▼
//!                          StoreCoordinator ─▶ VectorStore  (dense datasets)
//!                                           ─▶ KeywordStore (when requested)
//!                                           ◀─ RetrievalService (score > threshold)
//! ```

pub mod coordinator;
pub mod external;
pub mod factory;
pub mod processor;
pub mod retrieval;
pub mod store;
pub mod text;
pub mod transform;
pub mod types;

pub use coordinator::StoreCoordinator;
pub use external::{parse_external_response, ExternalIndexClient};
pub use factory::{IndexComponents, IndexProcessorFactory};
pub use processor::IndexProcessor;
pub use retrieval::{
    RerankingModel, RetrievalMethod, RetrievalRequest, RetrievalService, StoreRetrievalService,
};
pub use store::{KeywordStore, MemoryKeywordStore, MemoryVectorStore, VectorStore};
pub use transform::TextSplitter;
pub use types::{Dataset, IndexType, IndexingTechnique, ScoredDocument};
