use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Eres un asistente útil y seguro. Responde con precisión y sin divulgar datos sensibles.";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct QuizItem {
    pub question: String,
    pub ideal_answer: String,
}

/// Verdict rendered by the language model for a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Verdict {
    Correcta,
    Mejorable,
    Incorrecta,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Correcta => "Correcta",
            Verdict::Mejorable => "Mejorable",
            Verdict::Incorrecta => "Incorrecta",
        }
    }

    /// Lenient parse of whatever the model put in the "verdict" key.
    pub fn parse(s: &str) -> Option<Verdict> {
        match s.trim().to_lowercase().as_str() {
            "correcta" => Some(Verdict::Correcta),
            "mejorable" => Some(Verdict::Mejorable),
            "incorrecta" => Some(Verdict::Incorrecta),
            _ => None,
        }
    }
}

/// The fixed set of governance metrics this service knows how to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricId {
    AnswerSimilarity,
    AnswerRelevance,
    ContextRelevance,
    Faithfulness,
    Evasiveness,
    TopicRelevance,
    PromptSafetyRisk,
    Hap,
    Pii,
    Profanity,
    SexualContent,
    Violence,
    SocialBias,
    Harm,
    HarmEngagement,
    Jailbreak,
    UnethicalBehavior,
    TextReadingEase,
    TextGradeLevel,
}

pub const SIMILARITY_METRICS: &[MetricId] = &[MetricId::AnswerSimilarity];

/// Groundedness metrics that only need the evaluation rows.
pub const GROUNDEDNESS_METRICS: &[MetricId] = &[
    MetricId::AnswerRelevance,
    MetricId::ContextRelevance,
    MetricId::Faithfulness,
    MetricId::Evasiveness,
];

/// Metrics whose evaluators require the effective system prompt.
pub const SYSTEM_PROMPT_METRICS: &[MetricId] =
    &[MetricId::TopicRelevance, MetricId::PromptSafetyRisk];

pub const SAFETY_METRICS: &[MetricId] = &[
    MetricId::Hap,
    MetricId::Pii,
    MetricId::Profanity,
    MetricId::SexualContent,
    MetricId::Violence,
    MetricId::SocialBias,
    MetricId::Harm,
    MetricId::HarmEngagement,
    MetricId::Jailbreak,
    MetricId::UnethicalBehavior,
];

pub const READABILITY_METRICS: &[MetricId] =
    &[MetricId::TextReadingEase, MetricId::TextGradeLevel];

/// Evaluation order for /api/evaluate: similarity, groundedness,
/// system-prompt metrics, safety detectors, readability.
pub const METRIC_GROUPS: &[&[MetricId]] = &[
    SIMILARITY_METRICS,
    GROUNDEDNESS_METRICS,
    SYSTEM_PROMPT_METRICS,
    SAFETY_METRICS,
    READABILITY_METRICS,
];

/// Every metric this service knows, in group order.
pub const ALL_METRICS: &[MetricId] = &[
    MetricId::AnswerSimilarity,
    MetricId::AnswerRelevance,
    MetricId::ContextRelevance,
    MetricId::Faithfulness,
    MetricId::Evasiveness,
    MetricId::TopicRelevance,
    MetricId::PromptSafetyRisk,
    MetricId::Hap,
    MetricId::Pii,
    MetricId::Profanity,
    MetricId::SexualContent,
    MetricId::Violence,
    MetricId::SocialBias,
    MetricId::Harm,
    MetricId::HarmEngagement,
    MetricId::Jailbreak,
    MetricId::UnethicalBehavior,
    MetricId::TextReadingEase,
    MetricId::TextGradeLevel,
];

/// Keys the governance score board expects from /api/governance/score.
pub const FRONT_METRICS: &[MetricId] = &[
    MetricId::UnethicalBehavior,
    MetricId::Jailbreak,
    MetricId::SocialBias,
    MetricId::Profanity,
    MetricId::Harm,
    MetricId::HarmEngagement,
    MetricId::SexualContent,
    MetricId::Violence,
    MetricId::Evasiveness,
    MetricId::AnswerRelevance,
    MetricId::Faithfulness,
    MetricId::TopicRelevance,
    MetricId::ContextRelevance,
    MetricId::AnswerSimilarity,
];

impl MetricId {
    pub fn key(self) -> &'static str {
        match self {
            MetricId::AnswerSimilarity => "answer_similarity",
            MetricId::AnswerRelevance => "answer_relevance",
            MetricId::ContextRelevance => "context_relevance",
            MetricId::Faithfulness => "faithfulness",
            MetricId::Evasiveness => "evasiveness",
            MetricId::TopicRelevance => "topic_relevance",
            MetricId::PromptSafetyRisk => "prompt_safety_risk",
            MetricId::Hap => "hap",
            MetricId::Pii => "pii",
            MetricId::Profanity => "profanity",
            MetricId::SexualContent => "sexual_content",
            MetricId::Violence => "violence",
            MetricId::SocialBias => "social_bias",
            MetricId::Harm => "harm",
            MetricId::HarmEngagement => "harm_engagement",
            MetricId::Jailbreak => "jailbreak",
            MetricId::UnethicalBehavior => "unethical_behavior",
            MetricId::TextReadingEase => "text_reading_ease",
            MetricId::TextGradeLevel => "text_grade_level",
        }
    }

    pub fn from_key(key: &str) -> Option<MetricId> {
        ALL_METRICS.iter().copied().find(|m| m.key() == key)
    }

    /// Resolves the metric name as reported by the evaluation service.
    /// Some versions report detector names with a `_detection` suffix.
    pub fn from_reported_name(name: &str) -> Option<MetricId> {
        let name = name.trim().to_lowercase().replace(' ', "_");
        match name.as_str() {
            "violence_detection" => Some(MetricId::Violence),
            "harm_engagement_detection" => Some(MetricId::HarmEngagement),
            other => MetricId::from_key(other),
        }
    }

    pub fn requires_system_prompt(self) -> bool {
        SYSTEM_PROMPT_METRICS.contains(&self)
    }
}

/// One flat numeric record per quiz item. Absent means the metric could not
/// be computed for that row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MetricScores {
    pub answer_similarity: Option<f64>,
    pub answer_relevance: Option<f64>,
    pub context_relevance: Option<f64>,
    pub faithfulness: Option<f64>,
    pub evasiveness: Option<f64>,
    pub topic_relevance: Option<f64>,
    pub prompt_safety_risk: Option<f64>,
    pub hap: Option<f64>,
    pub pii: Option<f64>,
    pub profanity: Option<f64>,
    pub sexual_content: Option<f64>,
    pub violence: Option<f64>,
    pub social_bias: Option<f64>,
    pub harm: Option<f64>,
    pub harm_engagement: Option<f64>,
    pub jailbreak: Option<f64>,
    pub unethical_behavior: Option<f64>,
    pub text_reading_ease: Option<f64>,
    pub text_grade_level: Option<f64>,
}

impl MetricScores {
    pub fn set(&mut self, metric: MetricId, value: Option<f64>) {
        *self.slot(metric) = value;
    }

    pub fn get(&self, metric: MetricId) -> Option<f64> {
        match metric {
            MetricId::AnswerSimilarity => self.answer_similarity,
            MetricId::AnswerRelevance => self.answer_relevance,
            MetricId::ContextRelevance => self.context_relevance,
            MetricId::Faithfulness => self.faithfulness,
            MetricId::Evasiveness => self.evasiveness,
            MetricId::TopicRelevance => self.topic_relevance,
            MetricId::PromptSafetyRisk => self.prompt_safety_risk,
            MetricId::Hap => self.hap,
            MetricId::Pii => self.pii,
            MetricId::Profanity => self.profanity,
            MetricId::SexualContent => self.sexual_content,
            MetricId::Violence => self.violence,
            MetricId::SocialBias => self.social_bias,
            MetricId::Harm => self.harm,
            MetricId::HarmEngagement => self.harm_engagement,
            MetricId::Jailbreak => self.jailbreak,
            MetricId::UnethicalBehavior => self.unethical_behavior,
            MetricId::TextReadingEase => self.text_reading_ease,
            MetricId::TextGradeLevel => self.text_grade_level,
        }
    }

    fn slot(&mut self, metric: MetricId) -> &mut Option<f64> {
        match metric {
            MetricId::AnswerSimilarity => &mut self.answer_similarity,
            MetricId::AnswerRelevance => &mut self.answer_relevance,
            MetricId::ContextRelevance => &mut self.context_relevance,
            MetricId::Faithfulness => &mut self.faithfulness,
            MetricId::Evasiveness => &mut self.evasiveness,
            MetricId::TopicRelevance => &mut self.topic_relevance,
            MetricId::PromptSafetyRisk => &mut self.prompt_safety_risk,
            MetricId::Hap => &mut self.hap,
            MetricId::Pii => &mut self.pii,
            MetricId::Profanity => &mut self.profanity,
            MetricId::SexualContent => &mut self.sexual_content,
            MetricId::Violence => &mut self.violence,
            MetricId::SocialBias => &mut self.social_bias,
            MetricId::Harm => &mut self.harm,
            MetricId::HarmEngagement => &mut self.harm_engagement,
            MetricId::Jailbreak => &mut self.jailbreak,
            MetricId::UnethicalBehavior => &mut self.unethical_behavior,
            MetricId::TextReadingEase => &mut self.text_reading_ease,
            MetricId::TextGradeLevel => &mut self.text_grade_level,
        }
    }
}

/// Verdict fields produced by the model, merged into each result row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct VerdictRecord {
    pub wx_verdict: Option<Verdict>,
    pub wx_explanation: Option<String>,
    pub wx_improved_answer: Option<String>,
    #[serde(default)]
    pub wx_raw: String,
}

impl VerdictRecord {
    /// Null verdict carrying a description of why the model was skipped.
    pub fn unavailable(reason: impl Into<String>) -> VerdictRecord {
        VerdictRecord {
            wx_verdict: None,
            wx_explanation: None,
            wx_improved_answer: None,
            wx_raw: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EvaluationResult {
    #[serde(flatten)]
    pub metrics: MetricScores,
    #[serde(flatten)]
    pub verdict: VerdictRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_keys_round_trip() {
        for metric in ALL_METRICS {
            assert_eq!(MetricId::from_key(metric.key()), Some(*metric));
        }
    }

    #[test]
    fn metric_groups_cover_all_metrics_in_order() {
        let from_groups: Vec<MetricId> =
            METRIC_GROUPS.iter().copied().flatten().copied().collect();
        assert_eq!(from_groups, ALL_METRICS);
    }

    #[test]
    fn reported_name_aliases() {
        assert_eq!(
            MetricId::from_reported_name("Violence Detection"),
            Some(MetricId::Violence)
        );
        assert_eq!(
            MetricId::from_reported_name("harm_engagement_detection"),
            Some(MetricId::HarmEngagement)
        );
        assert_eq!(MetricId::from_reported_name("faithfulness"), Some(MetricId::Faithfulness));
        assert_eq!(MetricId::from_reported_name("unknown_metric"), None);
    }

    #[test]
    fn verdict_parse_is_lenient() {
        assert_eq!(Verdict::parse(" CORRECTA "), Some(Verdict::Correcta));
        assert_eq!(Verdict::parse("mejorable"), Some(Verdict::Mejorable));
        assert_eq!(Verdict::parse("wrong"), None);
    }

    #[test]
    fn scores_set_and_serialize() {
        let mut scores = MetricScores::default();
        scores.set(MetricId::Faithfulness, Some(0.3));
        assert_eq!(scores.get(MetricId::Faithfulness), Some(0.3));
        assert_eq!(scores.get(MetricId::Hap), None);

        let json = serde_json::to_value(&scores).unwrap();
        assert_eq!(json["faithfulness"], serde_json::json!(0.3));
        assert!(json["hap"].is_null());
    }
}
