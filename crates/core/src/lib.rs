pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::diagnosis::{
    AudioTherapy, ClinicalItem, ClinicalKind, Diagnosis, DiagnosisOutcome, DiagnosisResult,
    FiveTone, MeridianAnalysis, RawFallback, StructuredDiagnosis, TreatmentRecommendations,
};
pub use domain::record::{DiagnosisRequest, MedicalRecord, TimeInfo};
pub use domain::time_branch::{TimeBranch, UnknownTimeBranch};
pub use errors::{DiagnosisError, FailureKind, InterfaceError, ModelError, RuleError};
pub use flows::{DiagnosisStage, RequestFlow, StageTransitionError};
