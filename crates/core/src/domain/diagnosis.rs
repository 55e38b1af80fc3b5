use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Structured recommendation produced by the model.
///
/// Field names follow the output schema declared in the system prompt. Keys
/// the schema does not name are kept in `extra` so a conforming response is
/// handed back to the caller without losing anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub diagnosis: Diagnosis,
    #[serde(rename = "midnight_noon_ebb_flow_analysis")]
    pub meridian_analysis: MeridianAnalysis,
    pub treatment_recommendations: TreatmentRecommendations,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub summary: String,
    pub analysis: String,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeridianAnalysis {
    pub main_meridian: String,
    pub reasoning: String,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreatmentRecommendations {
    pub clinical: Vec<ClinicalItem>,
    pub lifestyle: Vec<String>,
    pub exercise: Vec<String>,
    pub audio_therapy: AudioTherapy,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub apply_time: String,
    pub reason: String,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioTherapy {
    pub tone: String,
    pub tracks: Vec<String>,
    pub schedule: Vec<String>,
    pub reason: String,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClinicalKind {
    Acupoint,
    Formula,
}

impl ClinicalItem {
    /// Recognised prescription category. The model may use either the
    /// Chinese label or the English one; anything else is left unclassified.
    pub fn category(&self) -> Option<ClinicalKind> {
        match self.kind.trim() {
            "穴位" | "acupoint" => Some(ClinicalKind::Acupoint),
            "方剂" | "formula" => Some(ClinicalKind::Formula),
            _ => None,
        }
    }
}

/// The five classical tones used for tonal therapy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiveTone {
    Jue,
    Zhi,
    Gong,
    Shang,
    Yu,
}

impl FiveTone {
    pub fn label(self) -> &'static str {
        match self {
            Self::Jue => "角",
            Self::Zhi => "徵",
            Self::Gong => "宫",
            Self::Shang => "商",
            Self::Yu => "羽",
        }
    }

    /// Organ system the tone is traditionally paired with.
    pub fn organ(self) -> &'static str {
        match self {
            Self::Jue => "肝",
            Self::Zhi => "心",
            Self::Gong => "脾",
            Self::Shang => "肺",
            Self::Yu => "肾",
        }
    }
}

impl AudioTherapy {
    /// First of the five tones named in `tone`, if any. Models often answer
    /// with phrases like `角音` or `角调`, so a prefix match is enough.
    pub fn five_tone(&self) -> Option<FiveTone> {
        let first = self.tone.trim().chars().next()?;
        [FiveTone::Jue, FiveTone::Zhi, FiveTone::Gong, FiveTone::Shang, FiveTone::Yu]
            .into_iter()
            .find(|tone| tone.label().starts_with(first))
    }
}

/// Model output kept verbatim because it was not valid JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFallback {
    pub raw: String,
}

/// A schema-conforming model response.
///
/// The typed `DiagnosisResult` is a read view only. Serialisation always
/// emits the JSON the model produced, so explicit `null`s and key layout
/// survive untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredDiagnosis {
    result: DiagnosisResult,
    original: Value,
}

impl StructuredDiagnosis {
    /// Typed view over `original`, or the value back when it does not conform.
    pub fn from_value(original: Value) -> Result<Self, Value> {
        match DiagnosisResult::deserialize(&original) {
            Ok(result) => Ok(Self { result, original }),
            Err(_) => Err(original),
        }
    }

    pub fn result(&self) -> &DiagnosisResult {
        &self.result
    }

    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Replaces `main_meridian` in both the typed view and the emitted JSON.
    pub fn set_main_meridian(&mut self, meridian: String) {
        if let Some(slot) = self
            .original
            .get_mut("midnight_noon_ebb_flow_analysis")
            .and_then(|analysis| analysis.get_mut("main_meridian"))
        {
            *slot = Value::String(meridian.clone());
        }
        self.result.meridian_analysis.main_meridian = meridian;
    }
}

impl Serialize for StructuredDiagnosis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.original.serialize(serializer)
    }
}

/// Everything the parser can make of a model response.
///
/// Serialised without a tag: `data` on the wire is the bare result object,
/// the bare pass-through JSON, or `{ "raw": ... }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiagnosisOutcome {
    Structured(Box<StructuredDiagnosis>),
    /// Valid JSON that does not follow the declared schema.
    Passthrough(Value),
    Raw(RawFallback),
}

impl DiagnosisOutcome {
    pub fn as_structured(&self) -> Option<&DiagnosisResult> {
        match self {
            Self::Structured(structured) => Some(structured.result()),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Structured(_))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::{
        AudioTherapy, ClinicalItem, ClinicalKind, DiagnosisOutcome, FiveTone, RawFallback,
        StructuredDiagnosis,
    };

    fn clinical(kind: &str) -> ClinicalItem {
        ClinicalItem {
            kind: kind.to_string(),
            name: "神门".to_string(),
            method: None,
            instruction: None,
            apply_time: "就诊时（子时）".to_string(),
            reason: "宁心安神".to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn clinical_kind_accepts_both_label_languages() {
        assert_eq!(clinical("穴位").category(), Some(ClinicalKind::Acupoint));
        assert_eq!(clinical("formula").category(), Some(ClinicalKind::Formula));
        assert_eq!(clinical("艾灸").category(), None);
    }

    #[test]
    fn five_tone_matches_on_leading_character() {
        let therapy = |tone: &str| AudioTherapy {
            tone: tone.to_string(),
            tracks: vec![],
            schedule: vec![],
            reason: String::new(),
            extra: Map::new(),
        };

        assert_eq!(therapy("角音").five_tone(), Some(FiveTone::Jue));
        assert_eq!(therapy("羽").five_tone(), Some(FiveTone::Yu));
        assert_eq!(therapy("五音（角/徵/宫/商/羽）").five_tone(), None);
        assert_eq!(FiveTone::Shang.organ(), "肺");
    }

    #[test]
    fn raw_outcome_serializes_as_bare_raw_object() {
        let outcome = DiagnosisOutcome::Raw(RawFallback { raw: "not json".to_string() });
        assert!(outcome.is_degraded());
        assert_eq!(serde_json::to_value(&outcome).expect("encode"), json!({ "raw": "not json" }));
    }

    #[test]
    fn clinical_item_omits_absent_optional_fields() {
        let encoded = serde_json::to_value(clinical("穴位")).expect("encode");
        assert_eq!(
            encoded,
            json!({
                "type": "穴位",
                "name": "神门",
                "apply_time": "就诊时（子时）",
                "reason": "宁心安神"
            })
        );
    }

    fn conforming_value() -> serde_json::Value {
        json!({
            "diagnosis": { "summary": "肝郁", "analysis": "脉弦" },
            "midnight_noon_ebb_flow_analysis": { "main_meridian": "", "reasoning": "丑时加重" },
            "treatment_recommendations": {
                "clinical": [{
                    "type": "方剂", "name": "逍遥散", "method": null, "instruction": "温服",
                    "apply_time": "就诊后卯时", "reason": "疏肝"
                }],
                "lifestyle": [],
                "exercise": [],
                "audio_therapy": { "tone": "角", "tracks": [], "schedule": [], "reason": "入肝" }
            }
        })
    }

    #[test]
    fn structured_outcome_emits_explicit_nulls_unchanged() {
        let original = conforming_value();
        let structured = StructuredDiagnosis::from_value(original.clone()).expect("conforming");

        assert_eq!(structured.result().treatment_recommendations.clinical[0].method, None);
        let outcome = DiagnosisOutcome::Structured(Box::new(structured));
        assert_eq!(serde_json::to_value(&outcome).expect("encode"), original);
    }

    #[test]
    fn set_main_meridian_updates_view_and_emitted_json() {
        let mut structured = StructuredDiagnosis::from_value(conforming_value()).expect("conforming");

        structured.set_main_meridian("足厥阴肝经".to_string());

        assert_eq!(structured.result().meridian_analysis.main_meridian, "足厥阴肝经");
        let encoded = serde_json::to_value(&structured).expect("encode");
        assert_eq!(encoded["midnight_noon_ebb_flow_analysis"]["main_meridian"], "足厥阴肝经");
        assert_eq!(encoded["treatment_recommendations"]["clinical"][0]["method"], json!(null));
    }

    #[test]
    fn non_conforming_value_is_handed_back() {
        let value = json!({ "diagnosis": "肝郁" });
        assert_eq!(StructuredDiagnosis::from_value(value.clone()), Err(value));
    }
}
