pub mod states;

pub use states::{DiagnosisStage, RequestFlow, StageTransitionError};
