pub mod debounce;
pub use debounce::Debouncer;

pub mod search;
pub use search::{FailureKind, SearchFailure, SearchOrchestrator, SearchRun, UiState};

pub mod session;
pub use session::{PageSession, SessionOptions, SessionRegistry};

pub mod usage;
pub use usage::{UsageError, UsageRecorder, UsageStore};
