//! Verdict lists returned by the judge and the scores derived from them.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::models::JudgeSchema;

/// A single yes/no/idk judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum VerdictKind {
    Yes,
    No,
    Idk,
}

impl TryFrom<String> for VerdictKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "idk" | "unknown" => Ok(Self::Idk),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictKind,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Judge output shared by every LLM-as-judge metric.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VerdictList {
    pub verdicts: Vec<Verdict>,
    #[serde(default)]
    pub reason: String,
}

impl JudgeSchema for VerdictList {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "verdicts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "verdict": {"type": "string", "enum": ["yes", "no", "idk"]},
                            "reason": {"type": "string"}
                        },
                        "required": ["verdict"]
                    }
                },
                "reason": {"type": "string"}
            },
            "required": ["verdicts", "reason"]
        })
    }
}

impl VerdictList {
    fn count(&self, kind: VerdictKind) -> usize {
        self.verdicts.iter().filter(|v| v.verdict == kind).count()
    }

    /// Share of verdicts that are not "no". Empty lists score 1.0.
    pub fn share_not_no(&self) -> f64 {
        if self.verdicts.is_empty() {
            return 1.0;
        }
        (self.verdicts.len() - self.count(VerdictKind::No)) as f64 / self.verdicts.len() as f64
    }

    /// Share of verdicts that are "yes". Empty lists score 1.0.
    pub fn share_yes(&self) -> f64 {
        if self.verdicts.is_empty() {
            return 1.0;
        }
        self.count(VerdictKind::Yes) as f64 / self.verdicts.len() as f64
    }

    /// Rank-weighted precision: the mean of precision@k over every position k
    /// holding a "yes". Zero when nothing is relevant.
    pub fn weighted_precision(&self) -> f64 {
        let mut relevant_so_far = 0usize;
        let mut total = 0.0;
        for (k, v) in self.verdicts.iter().enumerate() {
            if v.verdict == VerdictKind::Yes {
                relevant_so_far += 1;
                total += relevant_so_far as f64 / (k + 1) as f64;
            }
        }
        if relevant_so_far == 0 {
            0.0
        } else {
            total / relevant_so_far as f64
        }
    }

    /// The judge's reason, or a count summary when it gave none.
    pub fn reason_or_summary(&self, noun: &str) -> String {
        let reason = self.reason.trim();
        if !reason.is_empty() {
            return reason.to_string();
        }
        format!(
            "{} of {} {} judged yes, {} no, {} unknown",
            self.count(VerdictKind::Yes),
            self.verdicts.len(),
            noun,
            self.count(VerdictKind::No),
            self.count(VerdictKind::Idk)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(kinds: &[VerdictKind]) -> VerdictList {
        VerdictList {
            verdicts: kinds
                .iter()
                .map(|k| Verdict {
                    verdict: *k,
                    reason: None,
                })
                .collect(),
            reason: String::new(),
        }
    }

    use VerdictKind::{Idk, No, Yes};

    #[test]
    fn test_parse_case_insensitive() {
        let parsed: VerdictList = serde_json::from_str(
            r#"{"verdicts": [{"verdict": "Yes"}, {"verdict": " NO ", "reason": "off topic"}, {"verdict": "idk"}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.verdicts.iter().map(|v| v.verdict).collect::<Vec<_>>(),
            vec![Yes, No, Idk]
        );
        assert_eq!(parsed.verdicts[1].reason.as_deref(), Some("off topic"));
        assert!(parsed.reason.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_verdict() {
        let parsed = serde_json::from_str::<VerdictList>(r#"{"verdicts": [{"verdict": "maybe"}]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_shares() {
        let l = list(&[Yes, No, Idk, Yes]);
        assert_eq!(l.share_not_no(), 0.75);
        assert_eq!(l.share_yes(), 0.5);
        assert_eq!(list(&[]).share_not_no(), 1.0);
        assert_eq!(list(&[]).share_yes(), 1.0);
    }

    #[test]
    fn test_weighted_precision() {
        // Relevant at ranks 1 and 3: (1/1 + 2/3) / 2
        let score = list(&[Yes, No, Yes]).weighted_precision();
        assert!((score - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-9);
        assert_eq!(list(&[No, Yes]).weighted_precision(), 0.5);
        assert_eq!(list(&[No, No]).weighted_precision(), 0.0);
        assert_eq!(list(&[]).weighted_precision(), 0.0);
    }

    #[test]
    fn test_reason_or_summary() {
        let mut l = list(&[Yes, No]);
        assert_eq!(
            l.reason_or_summary("statements"),
            "1 of 2 statements judged yes, 1 no, 0 unknown"
        );
        l.reason = "  The answer stays on topic. ".into();
        assert_eq!(l.reason_or_summary("statements"), "The answer stays on topic.");
    }
}
