use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the twelve two-hour periods of the traditional day.
///
/// Declaration order follows the day starting at 23:00, so the derived `Ord`
/// gives the canonical display order used for sets of branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBranch {
    #[serde(rename = "子")]
    Zi,
    #[serde(rename = "丑")]
    Chou,
    #[serde(rename = "寅")]
    Yin,
    #[serde(rename = "卯")]
    Mao,
    #[serde(rename = "辰")]
    Chen,
    #[serde(rename = "巳")]
    Si,
    #[serde(rename = "午")]
    Wu,
    #[serde(rename = "未")]
    Wei,
    #[serde(rename = "申")]
    Shen,
    #[serde(rename = "酉")]
    You,
    #[serde(rename = "戌")]
    Xu,
    #[serde(rename = "亥")]
    Hai,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown time branch `{0}` (expected one of 子丑寅卯辰巳午未申酉戌亥)")]
pub struct UnknownTimeBranch(pub String);

impl TimeBranch {
    pub const ALL: [TimeBranch; 12] = [
        TimeBranch::Zi,
        TimeBranch::Chou,
        TimeBranch::Yin,
        TimeBranch::Mao,
        TimeBranch::Chen,
        TimeBranch::Si,
        TimeBranch::Wu,
        TimeBranch::Wei,
        TimeBranch::Shen,
        TimeBranch::You,
        TimeBranch::Xu,
        TimeBranch::Hai,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Zi => "子",
            Self::Chou => "丑",
            Self::Yin => "寅",
            Self::Mao => "卯",
            Self::Chen => "辰",
            Self::Si => "巳",
            Self::Wu => "午",
            Self::Wei => "未",
            Self::Shen => "申",
            Self::You => "酉",
            Self::Xu => "戌",
            Self::Hai => "亥",
        }
    }

    /// Canonical wall-clock interval, e.g. `23:00-01:00` for 子.
    pub fn interval(self) -> &'static str {
        match self {
            Self::Zi => "23:00-01:00",
            Self::Chou => "01:00-03:00",
            Self::Yin => "03:00-05:00",
            Self::Mao => "05:00-07:00",
            Self::Chen => "07:00-09:00",
            Self::Si => "09:00-11:00",
            Self::Wu => "11:00-13:00",
            Self::Wei => "13:00-15:00",
            Self::Shen => "15:00-17:00",
            Self::You => "17:00-19:00",
            Self::Xu => "19:00-21:00",
            Self::Hai => "21:00-23:00",
        }
    }

    /// Meridian whose qi flow peaks during this branch.
    pub fn meridian(self) -> &'static str {
        match self {
            Self::Zi => "足少阳胆经",
            Self::Chou => "足厥阴肝经",
            Self::Yin => "手太阴肺经",
            Self::Mao => "手阳明大肠经",
            Self::Chen => "足阳明胃经",
            Self::Si => "足太阴脾经",
            Self::Wu => "手少阴心经",
            Self::Wei => "手太阳小肠经",
            Self::Shen => "足太阳膀胱经",
            Self::You => "足少阴肾经",
            Self::Xu => "手厥阴心包经",
            Self::Hai => "手少阳三焦经",
        }
    }

    /// Branch covering the given hour of day. Hours past 23 wrap.
    pub fn containing(hour: u32) -> Self {
        let slot = ((hour % 24 + 1) / 2) % 12;
        Self::ALL[slot as usize]
    }
}

impl fmt::Display for TimeBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TimeBranch {
    type Err = UnknownTimeBranch;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        // Accept both the bare code and the colloquial `子时` form.
        let code = trimmed.strip_suffix('时').unwrap_or(trimmed);
        Self::ALL
            .into_iter()
            .find(|branch| branch.code() == code)
            .ok_or_else(|| UnknownTimeBranch(value.to_string()))
    }
}
