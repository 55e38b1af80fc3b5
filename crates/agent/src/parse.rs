use serde_json::Value;
use ziwu_core::{DiagnosisOutcome, RawFallback, StructuredDiagnosis};

/// Turn raw model output into the caller-facing outcome.
///
/// Never fails: text that is not JSON comes back verbatim as a raw fallback
/// so an operator can see what the model actually said. Field values are
/// not checked against any vocabulary.
pub fn parse_model_output(raw: &str) -> DiagnosisOutcome {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(_) => return DiagnosisOutcome::Raw(RawFallback { raw: raw.to_string() }),
    };

    match StructuredDiagnosis::from_value(value) {
        Ok(structured) => DiagnosisOutcome::Structured(Box::new(structured)),
        Err(value) => DiagnosisOutcome::Passthrough(value),
    }
}

/// Body of a single surrounding markdown code fence, if there is one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use ziwu_core::{ClinicalKind, DiagnosisOutcome, RawFallback};

    use super::parse_model_output;
    use crate::prompt::OUTPUT_SCHEMA;

    fn insomnia_response() -> Value {
        json!({
            "diagnosis": {
                "summary": "心肝火旺，扰动心神证",
                "analysis": "舌红苔黄，脉弦数，为肝火上炎、热扰心神之象。"
            },
            "midnight_noon_ebb_flow_analysis": {
                "main_meridian": "足少阳胆经、足厥阴肝经",
                "reasoning": "子丑时胆肝当令，症状于此时加重，提示肝胆郁热。"
            },
            "treatment_recommendations": {
                "clinical": [
                    {
                        "type": "穴位",
                        "name": "太冲",
                        "method": "泻法",
                        "apply_time": "就诊子时即刻施针",
                        "reason": "疏肝泻火"
                    },
                    {
                        "type": "方剂",
                        "name": "龙胆泻肝汤",
                        "instruction": "加酸枣仁",
                        "apply_time": "就诊后每日亥时前服用",
                        "reason": "清泻肝胆实火"
                    }
                ],
                "lifestyle": ["亥时前入睡"],
                "exercise": ["八段锦"],
                "audio_therapy": {
                    "tone": "角",
                    "tracks": ["胡笳十八拍"],
                    "schedule": ["亥时"],
                    "reason": "角音入肝，疏泄条达"
                },
                "confidence_note": "仅供参考"
            }
        })
    }

    #[test]
    fn conforming_json_is_structured_and_preserved() {
        let original = insomnia_response();
        let outcome = parse_model_output(&original.to_string());

        let result = outcome.as_structured().expect("structured");
        assert_eq!(result.diagnosis.summary, "心肝火旺，扰动心神证");
        assert_eq!(
            result.treatment_recommendations.clinical[0].category(),
            Some(ClinicalKind::Acupoint)
        );
        assert_eq!(serde_json::to_value(&outcome).expect("encode"), original);
    }

    #[test]
    fn explicit_null_optionals_round_trip_unchanged() {
        let mut original = insomnia_response();
        original["treatment_recommendations"]["clinical"][0]["method"] = Value::Null;
        original["treatment_recommendations"]["clinical"][1]["method"] = Value::Null;

        let outcome = parse_model_output(&original.to_string());

        assert!(outcome.as_structured().is_some());
        assert_eq!(serde_json::to_value(&outcome).expect("encode"), original);
    }

    #[test]
    fn declared_schema_is_itself_parseable() {
        let outcome = parse_model_output(OUTPUT_SCHEMA);
        let result = outcome.as_structured().expect("prompt schema must match result type");
        assert_eq!(result.treatment_recommendations.clinical.len(), 2);
        assert!(result.extra.is_empty());
    }

    #[test]
    fn non_json_text_becomes_raw_fallback_verbatim() {
        let raw = "抱歉，我无法给出诊断。\n请补充舌脉信息。";
        assert_eq!(
            parse_model_output(raw),
            DiagnosisOutcome::Raw(RawFallback { raw: raw.to_string() })
        );
    }

    #[test]
    fn truncated_json_becomes_raw_fallback() {
        let raw = r#"{"diagnosis": {"summary": "肝郁"#;
        assert!(matches!(parse_model_output(raw), DiagnosisOutcome::Raw(ref fallback) if fallback.raw == raw));
    }

    #[test]
    fn off_schema_json_passes_through_unchanged() {
        let value = json!({ "diagnosis": "肝郁气滞", "tone": "不存在的音" });
        assert_eq!(
            parse_model_output(&value.to_string()),
            DiagnosisOutcome::Passthrough(value)
        );
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", insomnia_response());
        assert!(parse_model_output(&fenced).as_structured().is_some());
    }

    #[test]
    fn unknown_enumeration_values_are_not_rejected() {
        let mut response = insomnia_response();
        response["treatment_recommendations"]["audio_therapy"]["tone"] = json!("摇滚");
        response["treatment_recommendations"]["clinical"][0]["type"] = json!("艾灸");

        let outcome = parse_model_output(&response.to_string());
        let result = outcome.as_structured().expect("still structured");
        assert_eq!(result.treatment_recommendations.audio_therapy.five_tone(), None);
        assert_eq!(result.treatment_recommendations.clinical[0].category(), None);
    }
}
