pub mod engine;
pub mod guard;
pub mod pipeline;

pub use engine::{Extraction, ExtractionEngine};
pub use guard::{GuardOutcome, RunGuard, RunPermit};
pub use pipeline::{ExtractionPipeline, RunReport, RunStatus, SaveFailure};
