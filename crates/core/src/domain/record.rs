use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::time_branch::TimeBranch;

/// Clinical record captured by the intake form for a single consultation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub complaint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tongue_pulse: Option<String>,
}

impl MedicalRecord {
    pub fn new(complaint: impl Into<String>) -> Self {
        Self { complaint: complaint.into(), history: None, tongue_pulse: None }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.history = Some(history.into());
        self
    }

    pub fn with_tongue_pulse(mut self, tongue_pulse: impl Into<String>) -> Self {
        self.tongue_pulse = Some(tongue_pulse.into());
        self
    }

    pub fn has_complaint(&self) -> bool {
        !self.complaint.trim().is_empty()
    }
}

/// Temporal markers of a consultation, expressed as time branches.
///
/// An absent branch travels as an empty string, matching what the intake
/// form submits when nothing is selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    #[serde(default, with = "optional_branch")]
    pub visit_time: Option<TimeBranch>,
    #[serde(default, with = "optional_branch")]
    pub onset_time: Option<TimeBranch>,
    #[serde(default, deserialize_with = "branch_set")]
    pub worse_time: BTreeSet<TimeBranch>,
}

impl TimeInfo {
    /// Branch whose meridian best represents the complaint when no visit
    /// time anchors the consultation: onset first, then the earliest
    /// aggravation period, then the visit itself.
    pub fn dominant_branch(&self) -> Option<TimeBranch> {
        self.onset_time.or_else(|| self.worse_time.iter().next().copied()).or(self.visit_time)
    }
}

mod optional_branch {
    use super::*;

    pub fn serialize<S>(value: &Option<TimeBranch>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.map(TimeBranch::code).unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<TimeBranch>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(code) => code.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

fn branch_set<'de, D>(deserializer: D) -> Result<BTreeSet<TimeBranch>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    raw.iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .map(|code| code.parse::<TimeBranch>().map_err(serde::de::Error::custom))
        .collect()
}

/// Inbound body of a diagnosis request once both top-level records are present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    pub medical_record: MedicalRecord,
    pub time_info: TimeInfo,
}
