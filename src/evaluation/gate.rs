use super::*;

pub const PREFILTER_MIN_MICRO: f64 = 0.80;
pub const PREFILTER_MIN_TAG: f64 = 0.75;
pub const PREFILTER_MAX_REGRESSION: f64 = 0.02;

pub const GATE_MIN_MICRO_ENV: &str = "DOCRANK_GATE_MIN_MICRO";
pub const GATE_MIN_TAG_ENV: &str = "DOCRANK_GATE_MIN_TAG";
pub const GATE_MAX_REGRESSION_ENV: &str = "DOCRANK_GATE_MAX_REGRESSION";

const RATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateFloors {
    pub min_micro: f64,
    pub min_tag: f64,
    pub max_regression: f64,
}

impl Default for GateFloors {
    fn default() -> Self {
        Self {
            min_micro: PREFILTER_MIN_MICRO,
            min_tag: PREFILTER_MIN_TAG,
            max_regression: PREFILTER_MAX_REGRESSION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    MicroFloor,
    TagFloor,
    Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateReason {
    pub rule: GateRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub observed: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateVerdict {
    pub pass: bool,
    pub reasons: Vec<GateReason>,
}

/// Checks `result` against the absolute floors and, when a baseline is
/// given, the allowed micro regression. Every violated rule is reported.
pub fn gate(result: &EvaluationResult, floors: &GateFloors, baseline: Option<&EvaluationResult>) -> GateVerdict {
    let mut reasons = Vec::<GateReason>::new();

    if result.micro + RATE_EPSILON < floors.min_micro {
        reasons.push(GateReason {
            rule: GateRule::MicroFloor,
            tag: None,
            observed: result.micro,
            threshold: floors.min_micro,
            message: format!(
                "micro hit rate {:.4} is below floor {:.4}",
                result.micro, floors.min_micro
            ),
        });
    }

    for (tag, rate) in &result.per_tag {
        if rate + RATE_EPSILON < floors.min_tag {
            reasons.push(GateReason {
                rule: GateRule::TagFloor,
                tag: Some(tag.clone()),
                observed: *rate,
                threshold: floors.min_tag,
                message: format!(
                    "tag `{tag}` hit rate {rate:.4} is below floor {:.4}",
                    floors.min_tag
                ),
            });
        }
    }

    if let Some(baseline) = baseline {
        let drop = baseline.micro - result.micro;
        if drop > floors.max_regression + RATE_EPSILON {
            reasons.push(GateReason {
                rule: GateRule::Regression,
                tag: None,
                observed: drop,
                threshold: floors.max_regression,
                message: format!(
                    "micro dropped {drop:.4} from baseline {:.4} (allowed {:.4})",
                    baseline.micro, floors.max_regression
                ),
            });
        }
    }

    GateVerdict {
        pass: reasons.is_empty(),
        reasons,
    }
}

/// Floors from the environment, falling back to the built-in defaults.
pub fn resolve_gate_floors() -> GateFloors {
    GateFloors {
        min_micro: parse_rate(std::env::var(GATE_MIN_MICRO_ENV).ok().as_deref(), PREFILTER_MIN_MICRO),
        min_tag: parse_rate(std::env::var(GATE_MIN_TAG_ENV).ok().as_deref(), PREFILTER_MIN_TAG),
        max_regression: parse_rate(
            std::env::var(GATE_MAX_REGRESSION_ENV).ok().as_deref(),
            PREFILTER_MAX_REGRESSION,
        ),
    }
}

pub fn parse_rate(value: Option<&str>, default: f64) -> f64 {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|rate| rate.is_finite() && (0.0..=1.0).contains(rate))
        .unwrap_or(default)
}
