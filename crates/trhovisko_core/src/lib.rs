pub mod cache_key;
pub mod domain;
pub mod ports;
pub mod prompt;
pub mod structured;

pub use domain::{
    AdData, AdSummary, CacheEntry, ChatContextType, ChatRole, ChatTurn, ComparisonResult,
    FeatureType, GenerationConfig, ImageSource, InvocationErrorKind, ModelInvocation, ProductInfo,
    QualityBreakdown, QualityEvaluation, SearchAnalysis,
};
pub use ports::{
    ComparisonCache, MarketplaceStore, ModelClient, ModelError, ModelReply, ModelResult,
    StoreError, StoreResult, UsageLedger,
};
pub use structured::{DecodeError, RetryPolicy, Structured, StructuredError};
