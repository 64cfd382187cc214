use serde::Serialize;

use super::{
    analytics::{
        action_cards, advice, compliance_report, health_risks, parameter_contribution,
        quality_index, ActionCard, ComplianceReport, Contribution, HealthRisk, QualityIndex,
    },
    classifier::ClassifierOutput,
    validator::Reading,
};

/// Everything shown for one classified reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub reading: Reading,
    pub classification: ClassifierOutput,
    pub advice: &'static str,
    pub quality_index: QualityIndex,
    pub contribution: Contribution,
    pub compliance: ComplianceReport,
    pub health_risks: Vec<HealthRisk>,
    pub actions: Vec<ActionCard>,
}

impl PredictionResponse {
    pub fn assemble(reading: Reading, classification: ClassifierOutput) -> Self {
        let Reading { ph, tds } = reading;
        let label = &classification.label;

        Self {
            advice: advice(label),
            quality_index: quality_index(ph, tds),
            contribution: parameter_contribution(ph, tds),
            compliance: compliance_report(ph, tds),
            health_risks: health_risks(ph, tds),
            actions: action_cards(label, ph, tds),
            reading,
            classification,
        }
    }
}
