use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use ziwu_core::{
    DiagnosisError, DiagnosisOutcome, DiagnosisRequest, DiagnosisStage, FailureKind, RequestFlow,
    TimeInfo,
};

use crate::llm::LlmClient;
use crate::parse::parse_model_output;
use crate::prompt;
use crate::rules::RuleSource;

pub const MISSING_RECORDS: &str = "Missing medicalRecord or timeInfo";
pub const BLANK_COMPLAINT: &str = "medicalRecord.complaint must not be empty";
pub const INFERRED_MERIDIAN_LABEL: &str = "（据时辰推断）";

/// Wire envelope returned for every request, successful or not.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DiagnosisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(data: DiagnosisOutcome) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }
}

#[derive(Clone, Debug)]
pub struct DiagnosisReply {
    pub status_code: u16,
    pub correlation_id: String,
    pub envelope: Envelope,
    pub stages: Vec<DiagnosisStage>,
}

impl DiagnosisReply {
    pub fn final_stage(&self) -> Option<DiagnosisStage> {
        self.stages.last().copied()
    }
}

/// Runs one diagnosis request end to end: rules, prompt, one model call, parse.
pub struct DiagnosisRuntime {
    rules: Arc<dyn RuleSource>,
    llm: Arc<dyn LlmClient>,
}

impl DiagnosisRuntime {
    pub fn new(rules: Arc<dyn RuleSource>, llm: Arc<dyn LlmClient>) -> Self {
        Self { rules, llm }
    }

    /// Entry point for an undecoded request body.
    pub async fn handle(&self, body: &Value) -> DiagnosisReply {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let mut flow = RequestFlow::default();

        let result = match decode_request(body) {
            Ok(request) => self.run(&request, &mut flow, &correlation_id).await,
            Err(error) => Err(error),
        };
        finish(result, flow, correlation_id, started)
    }

    pub async fn diagnose(&self, request: &DiagnosisRequest) -> DiagnosisReply {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let mut flow = RequestFlow::default();

        let result = match validate_request(request) {
            Ok(()) => self.run(request, &mut flow, &correlation_id).await,
            Err(error) => Err(error),
        };
        finish(result, flow, correlation_id, started)
    }

    async fn run(
        &self,
        request: &DiagnosisRequest,
        flow: &mut RequestFlow,
        correlation_id: &str,
    ) -> Result<DiagnosisOutcome, DiagnosisError> {
        record_stage(flow, DiagnosisStage::RuleLoading, correlation_id);
        let rule = self.rules.get().await?;

        record_stage(flow, DiagnosisStage::Prompting, correlation_id);
        let prompt = prompt::build(&request.medical_record, &request.time_info, &rule);
        debug!(
            event_name = "diagnosis.prompt.built",
            correlation_id = %correlation_id,
            schema_version = prompt::PROMPT_SCHEMA_VERSION,
            system_chars = prompt.system.chars().count(),
            user_chars = prompt.user.chars().count(),
            "prompt pair composed"
        );

        record_stage(flow, DiagnosisStage::Calling, correlation_id);
        let raw = self.llm.complete(&prompt.system, &prompt.user).await?;

        record_stage(flow, DiagnosisStage::Parsing, correlation_id);
        let mut outcome = parse_model_output(&raw);
        if outcome.is_degraded() {
            warn!(
                event_name = "diagnosis.response.degraded",
                correlation_id = %correlation_id,
                response_chars = raw.chars().count(),
                "model response did not follow the declared schema"
            );
        }
        fill_inferred_meridian(&mut outcome, &request.time_info);

        record_stage(flow, DiagnosisStage::Done, correlation_id);
        Ok(outcome)
    }
}

fn decode_request(body: &Value) -> Result<DiagnosisRequest, DiagnosisError> {
    let present = |key: &str| body.get(key).is_some_and(|value| !value.is_null());
    if !present("medicalRecord") || !present("timeInfo") {
        return Err(DiagnosisError::Validation(MISSING_RECORDS.to_string()));
    }

    let request = DiagnosisRequest::deserialize(body).map_err(|error| {
        DiagnosisError::Validation(format!("Invalid medicalRecord or timeInfo: {error}"))
    })?;
    validate_request(&request)?;
    Ok(request)
}

fn validate_request(request: &DiagnosisRequest) -> Result<(), DiagnosisError> {
    if request.medical_record.has_complaint() {
        Ok(())
    } else {
        Err(DiagnosisError::Validation(BLANK_COMPLAINT.to_string()))
    }
}

/// Without a visit time there is no anchor for the model, so a blank main
/// meridian is filled from the dominant branch and labeled as inferred.
fn fill_inferred_meridian(outcome: &mut DiagnosisOutcome, time: &TimeInfo) {
    if time.visit_time.is_some() {
        return;
    }
    let DiagnosisOutcome::Structured(structured) = outcome else {
        return;
    };
    if !structured.result().meridian_analysis.main_meridian.trim().is_empty() {
        return;
    }
    if let Some(branch) = time.dominant_branch() {
        structured.set_main_meridian(format!("{}{}", branch.meridian(), INFERRED_MERIDIAN_LABEL));
    }
}

fn record_stage(flow: &mut RequestFlow, next: DiagnosisStage, correlation_id: &str) {
    match flow.enter(next) {
        Ok(()) => debug!(
            event_name = "diagnosis.stage.entered",
            correlation_id = %correlation_id,
            stage = next.as_str(),
            "diagnosis stage entered"
        ),
        Err(error) => warn!(
            event_name = "diagnosis.stage.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "diagnosis stage transition rejected"
        ),
    }
}

fn finish(
    result: Result<DiagnosisOutcome, DiagnosisError>,
    mut flow: RequestFlow,
    correlation_id: String,
    started: Instant,
) -> DiagnosisReply {
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let (status_code, envelope) = match result {
        Ok(outcome) => {
            info!(
                event_name = "diagnosis.request.completed",
                correlation_id = %correlation_id,
                elapsed_ms,
                degraded = outcome.is_degraded(),
                "diagnosis request completed"
            );
            (200, Envelope::ok(outcome))
        }
        Err(failure) => {
            let kind = failure.kind();
            record_stage(&mut flow, DiagnosisStage::Failed(kind), &correlation_id);
            match kind {
                FailureKind::Validation => warn!(
                    event_name = "diagnosis.request.rejected",
                    correlation_id = %correlation_id,
                    elapsed_ms,
                    error = %failure,
                    "diagnosis request rejected"
                ),
                FailureKind::RuleUnavailable | FailureKind::Model => error!(
                    event_name = "diagnosis.request.failed",
                    correlation_id = %correlation_id,
                    elapsed_ms,
                    error = %failure,
                    source = ?std::error::Error::source(&failure).map(ToString::to_string),
                    "diagnosis request failed"
                ),
            }
            let interface = failure.into_interface(correlation_id.clone());
            (interface.status_code(), Envelope::failure(interface.message()))
        }
    };

    DiagnosisReply { status_code, correlation_id, envelope, stages: flow.trail().to_vec() }
}
