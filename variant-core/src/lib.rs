pub mod config;
pub mod error;
pub mod facade;
pub mod key;
pub mod parser;
pub mod processor;
pub mod registry;
pub mod scorer;

pub use config::BatchConfig;
pub use error::{BatchFailure, FailureReason, SubmitError};
pub use facade::{Facade, SubmitOutcome};
pub use key::{InvalidVariant, VariantKey, VariantRequest};
pub use processor::BatchProcessor;
pub use registry::{PendingEntry, PendingRegistry, PendingState, RegistryCounts};
pub use scorer::{LinearBlendScorer, NullScorer, PathogenicityScorer};
