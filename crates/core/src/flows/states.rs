use thiserror::Error;

use crate::errors::FailureKind;

/// Lifecycle of a single diagnosis request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosisStage {
    Validating,
    RuleLoading,
    Prompting,
    Calling,
    Parsing,
    Done,
    Failed(FailureKind),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid diagnosis stage transition from {from:?} to {to:?}")]
pub struct StageTransitionError {
    pub from: DiagnosisStage,
    pub to: DiagnosisStage,
}

impl DiagnosisStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::RuleLoading => "rule_loading",
            Self::Prompting => "prompting",
            Self::Calling => "calling",
            Self::Parsing => "parsing",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn can_transition_to(self, next: DiagnosisStage) -> bool {
        matches!(
            (self, next),
            (Self::Validating, Self::RuleLoading)
                | (Self::RuleLoading, Self::Prompting)
                | (Self::Prompting, Self::Calling)
                | (Self::Calling, Self::Parsing)
                | (Self::Parsing, Self::Done)
        ) || (!self.is_terminal() && matches!(next, Self::Failed(_)))
    }

    pub fn advance(self, next: DiagnosisStage) -> Result<DiagnosisStage, StageTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StageTransitionError { from: self, to: next })
        }
    }
}

/// Stage cursor for one request, keeping the trail of visited stages.
#[derive(Clone, Debug)]
pub struct RequestFlow {
    current: DiagnosisStage,
    trail: Vec<DiagnosisStage>,
}

impl Default for RequestFlow {
    fn default() -> Self {
        Self { current: DiagnosisStage::Validating, trail: vec![DiagnosisStage::Validating] }
    }
}

impl RequestFlow {
    pub fn current(&self) -> DiagnosisStage {
        self.current
    }

    pub fn trail(&self) -> &[DiagnosisStage] {
        &self.trail
    }

    pub fn enter(&mut self, next: DiagnosisStage) -> Result<(), StageTransitionError> {
        self.current = self.current.advance(next)?;
        self.trail.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosisStage, RequestFlow};
    use crate::errors::FailureKind;

    #[test]
    fn happy_path_visits_every_stage_in_order() {
        let mut flow = RequestFlow::default();
        for stage in [
            DiagnosisStage::RuleLoading,
            DiagnosisStage::Prompting,
            DiagnosisStage::Calling,
            DiagnosisStage::Parsing,
            DiagnosisStage::Done,
        ] {
            flow.enter(stage).expect("legal transition");
        }

        assert_eq!(flow.current(), DiagnosisStage::Done);
        assert_eq!(flow.trail().len(), 6);
        assert!(flow.current().is_terminal());
    }

    #[test]
    fn any_live_stage_can_fail() {
        for stage in [
            DiagnosisStage::Validating,
            DiagnosisStage::RuleLoading,
            DiagnosisStage::Prompting,
            DiagnosisStage::Calling,
            DiagnosisStage::Parsing,
        ] {
            assert!(stage.can_transition_to(DiagnosisStage::Failed(FailureKind::Model)));
        }
    }

    #[test]
    fn terminal_stages_reject_further_transitions() {
        let failed = DiagnosisStage::Failed(FailureKind::Validation);
        assert!(failed.advance(DiagnosisStage::RuleLoading).is_err());
        assert!(failed.advance(DiagnosisStage::Failed(FailureKind::Model)).is_err());
        assert!(DiagnosisStage::Done.advance(DiagnosisStage::Parsing).is_err());
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let error = DiagnosisStage::Validating
            .advance(DiagnosisStage::Calling)
            .expect_err("skipping rule load must fail");
        assert_eq!(error.from, DiagnosisStage::Validating);
        assert_eq!(error.to, DiagnosisStage::Calling);
    }
}
