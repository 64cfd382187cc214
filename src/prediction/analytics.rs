//! Derived water-quality analytics.
//!
//! Every function here is a pure function of the reading (and, for action
//! cards, the predicted label).

use serde::Serialize;

use super::classifier::QualityLabel;

const PH_SAFE_MIN: f64 = 6.5;
const PH_SAFE_MAX: f64 = 8.5;
const PH_NEUTRAL: f64 = 7.5;
const TDS_COMPLIANCE_MAX: f64 = 500.0;
const TDS_HIGH_RISK: f64 = 900.0;

/// Closed upper bounds of the TDS buckets (mg/L), ascending.
const TDS_TIER_BOUNDS: [f64; 4] = [300.0, 600.0, 900.0, 1200.0];

const PH_LIMIT_TEXT: &str = "6.5 - 8.5";
const TDS_LIMIT_TEXT: &str = "<= 500 mg/L";

fn ph_in_safe_range(ph: f64) -> bool {
    (PH_SAFE_MIN..=PH_SAFE_MAX).contains(&ph)
}

/// TDS bucket from 1 (cleanest) to 5. First matching bound wins.
pub fn tds_tier(tds: f64) -> u8 {
    TDS_TIER_BOUNDS
        .iter()
        .position(|bound| tds <= *bound)
        .map(|idx| idx as u8 + 1)
        .unwrap_or(5)
}

pub fn ph_sub_score(ph: f64) -> f64 {
    if ph_in_safe_range(ph) {
        100.0
    } else {
        (100.0 - 20.0 * (ph - PH_NEUTRAL).abs()).max(0.0)
    }
}

pub fn tds_sub_score(tds: f64) -> f64 {
    match tds_tier(tds) {
        1 => 100.0,
        2 => 80.0,
        3 => 60.0,
        4 => 40.0,
        _ => 20.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIndex {
    pub value: u8,
    pub ph_score: f64,
    pub tds_score: f64,
}

pub fn quality_index(ph: f64, tds: f64) -> QualityIndex {
    let ph_score = ph_sub_score(ph);
    let tds_score = tds_sub_score(tds);
    let blended = (0.5 * ph_score + 0.5 * tds_score).floor();

    QualityIndex {
        value: blended.clamp(0.0, 100.0) as u8,
        ph_score,
        tds_score,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub ph: u8,
    pub tds: u8,
}

/// Share of the overall deviation attributable to each parameter.
///
/// Each percentage is rounded on its own, so the pair may sum to 99 or 101.
pub fn parameter_contribution(ph: f64, tds: f64) -> Contribution {
    // Both weights share a x10 scale that cancels in the ratio. Leaving it
    // out keeps extreme finite readings from overflowing to infinity.
    let ph_weight = (ph - PH_NEUTRAL).abs();
    let tds_weight = f64::from(tds_tier(tds));
    let total = ph_weight + tds_weight;

    if total == 0.0 {
        return Contribution { ph: 50, tds: 50 };
    }
    if !total.is_finite() {
        return Contribution { ph: 100, tds: 0 };
    }

    let percent = |weight: f64| (weight / total * 100.0).round().clamp(0.0, 100.0) as u8;
    Contribution {
        ph: percent(ph_weight),
        tds: percent(tds_weight),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplianceStatus {
    Compliant,
    NotCompliant,
}

impl ComplianceStatus {
    fn from_bool(compliant: bool) -> Self {
        if compliant {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NotCompliant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub ph_status: ComplianceStatus,
    pub tds_status: ComplianceStatus,
    pub ph_limit: &'static str,
    pub tds_limit: &'static str,
}

pub fn compliance_report(ph: f64, tds: f64) -> ComplianceReport {
    ComplianceReport {
        ph_status: ComplianceStatus::from_bool(ph_in_safe_range(ph)),
        tds_status: ComplianceStatus::from_bool(tds <= TDS_COMPLIANCE_MAX),
        ph_limit: PH_LIMIT_TEXT,
        tds_limit: TDS_LIMIT_TEXT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskKind {
    Acidic,
    Alkaline,
    HighTds,
    NoMajorRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRisk {
    pub kind: RiskKind,
    pub message: &'static str,
}

impl HealthRisk {
    fn new(kind: RiskKind) -> Self {
        let message = match kind {
            RiskKind::Acidic => {
                "Acidic water can corrode pipes, leach metals such as lead and copper, and irritate the digestive tract."
            }
            RiskKind::Alkaline => {
                "Alkaline water can taste bitter, cause scaling, and irritate skin and eyes with prolonged use."
            }
            RiskKind::HighTds => {
                "High dissolved solids may indicate salts or heavy metals and can affect taste and kidney health over time."
            }
            RiskKind::NoMajorRisk => "No major health risk detected for the measured parameters.",
        };
        Self { kind, message }
    }
}

/// Between one and three entries, in the order acidity, alkalinity, TDS.
pub fn health_risks(ph: f64, tds: f64) -> Vec<HealthRisk> {
    let mut risks = Vec::with_capacity(3);

    if ph < PH_SAFE_MIN {
        risks.push(HealthRisk::new(RiskKind::Acidic));
    }
    if ph > PH_SAFE_MAX {
        risks.push(HealthRisk::new(RiskKind::Alkaline));
    }
    if tds > TDS_HIGH_RISK {
        risks.push(HealthRisk::new(RiskKind::HighTds));
    }

    if risks.is_empty() {
        risks.push(HealthRisk::new(RiskKind::NoMajorRisk));
    }
    risks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    NoAction,
    Filtration,
    UrgentRemediation,
    RaisePh,
    LowerPh,
    ReduceTds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCard {
    pub kind: ActionKind,
    pub title: &'static str,
    pub detail: &'static str,
}

impl ActionCard {
    fn new(kind: ActionKind) -> Self {
        let (title, detail) = match kind {
            ActionKind::NoAction => (
                "No action needed",
                "Water is within safe limits. Keep testing periodically.",
            ),
            ActionKind::Filtration => (
                "Filter before drinking",
                "Use a certified filter (RO or activated carbon) or boil before consumption.",
            ),
            ActionKind::UrgentRemediation => (
                "Do not drink",
                "Switch to an alternative source and have the water professionally tested and treated.",
            ),
            ActionKind::RaisePh => (
                "Raise pH",
                "Use a calcite or soda-ash neutralizing filter to correct acidity.",
            ),
            ActionKind::LowerPh => (
                "Lower pH",
                "Use an acid-injection system or white-vinegar dosing to correct alkalinity.",
            ),
            ActionKind::ReduceTds => (
                "Reduce dissolved solids",
                "Install reverse osmosis or distillation to bring TDS down.",
            ),
        };
        Self {
            kind,
            title,
            detail,
        }
    }
}

/// Recommended actions: the label action first, then pH, then TDS.
pub fn action_cards(label: &QualityLabel, ph: f64, tds: f64) -> Vec<ActionCard> {
    let mut cards = Vec::with_capacity(3);

    cards.push(ActionCard::new(match label {
        QualityLabel::Safe => ActionKind::NoAction,
        QualityLabel::Moderate => ActionKind::Filtration,
        _ => ActionKind::UrgentRemediation,
    }));

    if ph < PH_SAFE_MIN {
        cards.push(ActionCard::new(ActionKind::RaisePh));
    } else if ph > PH_SAFE_MAX {
        cards.push(ActionCard::new(ActionKind::LowerPh));
    }

    if tds > TDS_HIGH_RISK {
        cards.push(ActionCard::new(ActionKind::ReduceTds));
    }

    cards
}

/// One-line summary shown next to the label.
pub fn advice(label: &QualityLabel) -> &'static str {
    match label {
        QualityLabel::Safe => "Water is safe for drinking.",
        QualityLabel::Moderate => "Filtration recommended before drinking.",
        QualityLabel::Contaminated => "Danger! Water is contaminated.",
        QualityLabel::Unknown(_) => "Result could not be interpreted. Please retest the sample.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PH_GRID: [f64; 9] = [6.5, 6.8, 7.0, 7.2, 7.5, 7.8, 8.0, 8.3, 8.5];
    const TDS_GRID: [f64; 7] = [-50.0, 0.0, 50.0, 150.0, 250.0, 299.9, 300.0];

    #[test]
    fn quality_index_is_perfect_inside_safe_ranges() {
        for ph in PH_GRID {
            for tds in TDS_GRID {
                assert_eq!(quality_index(ph, tds).value, 100, "ph={ph} tds={tds}");
            }
        }
    }

    #[test]
    fn tds_buckets_use_closed_upper_bounds() {
        assert_eq!(tds_tier(300.0), 1);
        assert_eq!(tds_tier(300.01), 2);
        assert_eq!(tds_tier(600.0), 2);
        assert_eq!(tds_tier(900.0), 3);
        assert_eq!(tds_tier(1200.0), 4);
        assert_eq!(tds_tier(1200.5), 5);
    }

    #[test]
    fn quality_index_blends_and_floors() {
        // ph 6.4 -> 100 - 20 * 1.1 = 78, tds 310 -> 80
        let qi = quality_index(6.4, 310.0);
        assert!((qi.ph_score - 78.0).abs() < 1e-9);
        assert_eq!(qi.tds_score, 80.0);
        assert_eq!(qi.value, 79);

        // ph 5.45 -> 59, tds 1300 -> 20; (59 + 20) / 2 = 39.5 floors to 39
        assert_eq!(quality_index(5.45, 1300.0).value, 39);

        // far outside the scale the pH score bottoms out at zero
        let qi = quality_index(14.0, 5000.0);
        assert_eq!(qi.ph_score, 0.0);
        assert_eq!(qi.value, 10);
    }

    #[test]
    fn quality_index_never_improves_with_distance_from_neutral() {
        let tds = 450.0;
        let mut previous = u8::MAX;
        for step in 0..=80 {
            let ph = 7.5 + step as f64 * 0.1;
            let value = quality_index(ph, tds).value;
            assert!(value <= previous, "ph={ph}");
            previous = value;
        }

        let mut previous = u8::MAX;
        for step in 0..=80 {
            let ph = 7.5 - step as f64 * 0.1;
            let value = quality_index(ph, tds).value;
            assert!(value <= previous, "ph={ph}");
            previous = value;
        }
    }

    #[test]
    fn quality_index_never_improves_with_tds_tier() {
        for ph in [4.0, 6.0, 7.5, 9.2] {
            let mut previous = u8::MAX;
            for tds in [100.0, 300.0, 450.0, 600.0, 750.0, 900.0, 1100.0, 1200.0, 5000.0] {
                let value = quality_index(ph, tds).value;
                assert!(value <= previous, "ph={ph} tds={tds}");
                previous = value;
            }
        }
    }

    #[test]
    fn contribution_percentages_stay_in_bounds() {
        for ph in [0.0, 3.3, 6.1, 7.0, 7.5, 8.9, 11.7, 14.0] {
            for tds in [-10.0, 120.0, 450.0, 800.0, 1000.0, 4000.0] {
                let c = parameter_contribution(ph, tds);
                assert!(c.ph <= 100 && c.tds <= 100);
                let sum = u16::from(c.ph) + u16::from(c.tds);
                assert!((99..=101).contains(&sum), "ph={ph} tds={tds} sum={sum}");
            }
        }
    }

    #[test]
    fn contribution_at_neutral_ph_is_all_tds() {
        assert_eq!(
            parameter_contribution(7.5, 100.0),
            Contribution { ph: 0, tds: 100 }
        );
    }

    #[test]
    fn contribution_splits_weights() {
        // ph deviation 1.5 against tds tier 2 -> 43% / 57%
        assert_eq!(
            parameter_contribution(6.0, 500.0),
            Contribution { ph: 43, tds: 57 }
        );
    }

    #[test]
    fn contribution_survives_extreme_finite_readings() {
        for (ph, tds) in [(1e308, 100.0), (-f64::MAX, 2000.0), (f64::MAX, f64::MAX)] {
            let c = parameter_contribution(ph, tds);
            let sum = u16::from(c.ph) + u16::from(c.tds);
            assert!((99..=101).contains(&sum), "ph={ph} tds={tds} sum={sum}");
        }
        assert_eq!(
            parameter_contribution(1e308, 100.0),
            Contribution { ph: 100, tds: 0 }
        );
    }

    #[test]
    fn compliance_examples() {
        let ok = compliance_report(7.0, 100.0);
        assert_eq!(ok.ph_status, ComplianceStatus::Compliant);
        assert_eq!(ok.tds_status, ComplianceStatus::Compliant);

        let bad = compliance_report(9.0, 1200.0);
        assert_eq!(bad.ph_status, ComplianceStatus::NotCompliant);
        assert_eq!(bad.tds_status, ComplianceStatus::NotCompliant);

        let edge = compliance_report(8.5, 500.0);
        assert_eq!(edge.ph_status, ComplianceStatus::Compliant);
        assert_eq!(edge.tds_status, ComplianceStatus::Compliant);
        assert_eq!(edge.ph_limit, "6.5 - 8.5");
    }

    #[test]
    fn neutral_reading_has_single_no_risk_entry() {
        let risks = health_risks(7.5, 200.0);
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].kind, RiskKind::NoMajorRisk);
    }

    #[test]
    fn risks_are_listed_in_fixed_order() {
        let kinds: Vec<RiskKind> = health_risks(5.0, 1500.0).iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RiskKind::Acidic, RiskKind::HighTds]);

        let kinds: Vec<RiskKind> = health_risks(9.1, 900.0).iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RiskKind::Alkaline]);
    }

    #[test]
    fn contaminated_acidic_high_tds_gets_three_cards_in_order() {
        let kinds: Vec<ActionKind> = action_cards(&QualityLabel::Contaminated, 5.0, 1000.0)
            .iter()
            .map(|card| card.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::UrgentRemediation,
                ActionKind::RaisePh,
                ActionKind::ReduceTds
            ]
        );
    }

    #[test]
    fn label_action_depends_only_on_label() {
        let first = |label: QualityLabel| action_cards(&label, 7.5, 100.0)[0].kind;
        assert_eq!(first(QualityLabel::Safe), ActionKind::NoAction);
        assert_eq!(first(QualityLabel::Moderate), ActionKind::Filtration);
        assert_eq!(first(QualityLabel::Unknown("4".into())), ActionKind::UrgentRemediation);

        let cards = action_cards(&QualityLabel::Moderate, 9.0, 400.0);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].kind, ActionKind::LowerPh);
    }
}
