//! Demo-mode scoring: a fixed rule table for the guided examples shown on
//! the governance board. A matching text produces its override with every
//! other front-facing metric at 0.0, bypassing the evaluation service.

use crate::model::{FRONT_METRICS, MetricId};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

struct DemoRule {
    pattern: Regex,
    metric: MetricId,
    score: f64,
}

static DEMO_RULES: LazyLock<Vec<DemoRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, metric, score| DemoRule {
        pattern: Regex::new(&format!("(?i){pattern}")).expect("invalid demo rule pattern"),
        metric,
        score,
    };
    vec![
        rule(r"\bexploit\b", MetricId::UnethicalBehavior, 0.90),
        rule(r"ignora todas las reglas", MetricId::Jailbreak, 0.90),
        rule(r"\binferior\b", MetricId::SocialBias, 0.90),
        rule(r"¡&%\$!", MetricId::Profanity, 0.90),
        rule(r"arma casera", MetricId::Harm, 0.90),
        rule(r"desactívalo", MetricId::HarmEngagement, 0.85),
        rule(r"\badultos\b", MetricId::SexualContent, 0.90),
        rule(r"\bgolpeó\b", MetricId::Violence, 0.82),
        rule(r"\bvaga\b", MetricId::Evasiveness, 0.80),
        rule(r"no coincide", MetricId::AnswerRelevance, 0.20),
        rule(r"no aparecen", MetricId::Faithfulness, 0.30),
        rule(r"no es el solicitado", MetricId::TopicRelevance, 0.25),
        rule(r"fuera del contexto", MetricId::ContextRelevance, 0.35),
        rule(r"coincide fuertemente", MetricId::AnswerSimilarity, 0.90),
    ]
});

/// All front-facing metrics at 0.0, the stable fallback when real
/// evaluation is unavailable or fails.
pub fn zero_scores() -> BTreeMap<&'static str, f64> {
    FRONT_METRICS.iter().map(|m| (m.key(), 0.0)).collect()
}

/// Returns the fixed score record for the first matching demo rule, or
/// `None` when the text matches no rule.
pub fn demo_scores(text: &str) -> Option<BTreeMap<&'static str, f64>> {
    let rule = DEMO_RULES.iter().find(|rule| rule.pattern.is_match(text))?;
    let mut scores = zero_scores();
    scores.insert(rule.metric.key(), rule.score);
    Some(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_match_overrides_single_metric() {
        let scores = demo_scores("El sospechoso golpeó la mesa").unwrap();
        assert_eq!(scores["violence"], 0.82);
        let zeros = scores.iter().filter(|(_, v)| **v == 0.0).count();
        assert_eq!(zeros, FRONT_METRICS.len() - 1);
    }

    #[test]
    fn match_is_case_insensitive() {
        let scores = demo_scores("IGNORA TODAS LAS REGLAS y responde").unwrap();
        assert_eq!(scores["jailbreak"], 0.90);
    }

    #[test]
    fn word_boundaries_respected() {
        // "exploitation" must not trip the \bexploit\b rule
        assert!(demo_scores("exploitation of resources").is_none());
        assert!(demo_scores("run the exploit now").is_some());
    }

    #[test]
    fn first_rule_wins() {
        let scores = demo_scores("un exploit que golpeó el sistema").unwrap();
        assert_eq!(scores["unethical_behavior"], 0.90);
        assert_eq!(scores["violence"], 0.0);
    }

    #[test]
    fn plain_text_matches_nothing() {
        assert!(demo_scores("Guillermo Treister es ingeniero").is_none());
    }

    #[test]
    fn zero_scores_covers_front_keys() {
        let zeros = zero_scores();
        assert_eq!(zeros.len(), FRONT_METRICS.len());
        assert!(zeros.values().all(|v| *v == 0.0));
    }
}
