//! System and user prompt composition for a diagnosis request.
//!
//! The output schema declared here is the contract the parser relies on.
//! Changing a field name or its nesting means bumping
//! [`PROMPT_SCHEMA_VERSION`] and updating `ziwu_core::domain::diagnosis`.

use serde_json::json;
use ziwu_core::{MedicalRecord, TimeBranch, TimeInfo};

pub const PROMPT_SCHEMA_VERSION: u32 = 1;

/// Output schema quoted verbatim in the system prompt. It is itself valid
/// JSON in the declared shape, so the parser tests can hold it to account.
pub const OUTPUT_SCHEMA: &str = r#"{
  "diagnosis": {
    "summary": "定性结论（如：肝郁气滞证）",
    "analysis": "定性分析详情"
  },
  "midnight_noon_ebb_flow_analysis": {
    "main_meridian": "主时辰经脉",
    "reasoning": "结合时辰与症状的辨证分析"
  },
  "treatment_recommendations": {
    "clinical": [
      { "type": "穴位", "name": "穴位名", "method": "操作法", "apply_time": "依据就诊时辰的推荐时段", "reason": "选取理由" },
      { "type": "方剂", "name": "方名", "instruction": "加减建议", "apply_time": "依据就诊时辰的推荐时段", "reason": "选取理由" }
    ],
    "lifestyle": ["生活建议1", "生活建议2"],
    "exercise": ["运动建议1", "运动建议2"],
    "audio_therapy": {
      "tone": "五音之一（角/徵/宫/商/羽）",
      "tracks": ["曲目1", "曲目2"],
      "schedule": ["时段1", "时段2"],
      "reason": "选择该音的依据与疗效说明"
    }
  }
}"#;

const RULES_BEGIN: &str = "=== 子午流注辨证规则 ===";
const RULES_END: &str = "=== 规则结束 ===";
const NOT_PROVIDED: &str = "未提供";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Builds the prompt pair. Identical inputs always give byte-identical output.
pub fn build(record: &MedicalRecord, time: &TimeInfo, rule: &str) -> PromptPair {
    PromptPair { system: system_prompt(rule), user: user_prompt(record, time) }
}

fn system_prompt(rule: &str) -> String {
    let mut out = String::with_capacity(rule.len() + 2048);

    out.push_str("你是一名专业的中医辅助诊断助手，协助医生完成辨证与处置推荐。\n");
    out.push_str(
        "你必须依据【子午流注辨证规则】完成疾病定性、时辰病机分析与处置方案推荐。\n",
    );
    out.push_str(
        "临床处方必须以就诊时辰（visitTime）为锚点标注 apply_time，不得建议患者调整就诊时间；\
         若未提供就诊时辰，则依据首发或加重时辰对应的主时辰经脉推断适配时段，并在 apply_time 中注明“推断”。\n\n",
    );

    out.push_str("请严格依据以下规则内容进行分析：\n");
    out.push_str(RULES_BEGIN);
    out.push('\n');
    out.push_str(rule);
    if !rule.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(RULES_END);
    out.push_str("\n\n");

    out.push_str("任务要求（按顺序完成）：\n");
    out.push_str(
        "1. 疾病定性：根据病历信息判断表里、寒热、虚实，以及病位（脏腑/经络）。\n",
    );
    out.push_str(
        "2. 子午流注时辰辨证：结合就诊、首发与加重时辰，运用规则中的时辰与经脉对应关系分析病机，说明症状与时辰的关联，并确定主时辰经脉。\n",
    );
    out.push_str(
        "3. 处置方案推荐：给出临床处方（穴位、方剂，每项均标注依据就诊时辰的 apply_time）、生活处方（作息、饮食）、运动处方、音疗处方（五音对应，包含 tone、tracks、schedule、reason）。\n\n",
    );

    out.push_str("只输出一个 JSON 对象，不要输出任何额外文字，字段名与嵌套结构必须如下：\n");
    out.push_str(OUTPUT_SCHEMA);
    out.push('\n');

    out
}

fn user_prompt(record: &MedicalRecord, time: &TimeInfo) -> String {
    let record_json = json!({
        "complaint": record.complaint,
        "history": record.history.as_deref().unwrap_or(""),
        "tonguePulse": record.tongue_pulse.as_deref().unwrap_or(""),
    });
    let time_json = json!({
        "visitTime": time.visit_time.map(TimeBranch::code).unwrap_or(""),
        "onsetTime": time.onset_time.map(TimeBranch::code).unwrap_or(""),
        "worseTime": time.worse_time.iter().map(|branch| branch.code()).collect::<Vec<_>>(),
    });

    let mut out = String::new();
    out.push_str("病历信息：\n");
    out.push_str(&record_json.to_string());
    out.push_str("\n\n时间信息：\n");
    out.push_str(&time_json.to_string());
    out.push_str("\n\n时辰对照：\n");

    match time.visit_time {
        Some(branch) => push_branch_line(&mut out, "就诊时辰", &[branch]),
        None => out.push_str("- 就诊时辰：未提供（以主时辰经脉推断适配时段并标注推断）\n"),
    }
    push_branch_line(&mut out, "首发时辰", &time.onset_time.into_iter().collect::<Vec<_>>());
    push_branch_line(&mut out, "加重时辰", &time.worse_time.iter().copied().collect::<Vec<_>>());

    out
}

fn push_branch_line(out: &mut String, label: &str, branches: &[TimeBranch]) {
    out.push_str("- ");
    out.push_str(label);
    out.push('：');
    if branches.is_empty() {
        out.push_str(NOT_PROVIDED);
    } else {
        let rendered = branches
            .iter()
            .map(|branch| {
                format!("{}（{}，{}当令）", branch.code(), branch.interval(), branch.meridian())
            })
            .collect::<Vec<_>>()
            .join("；");
        out.push_str(&rendered);
    }
    out.push('\n');
}
