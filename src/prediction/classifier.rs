//! Classifier seam and the adapter that turns raw class ids into labels.
//!
//! The model is opaque to the rest of the pipeline: anything implementing
//! [`Classifier`] can be served. [`ForestClassifier`] reads the JSON forest
//! export produced by the offline training script.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::validator::Reading;

/// Number of input features per sample: `[ph, tds]`.
pub const FEATURE_COUNT: usize = 2;

pub type Sample = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Error, PartialEq)]
#[error("model inference failed: {0}")]
pub struct InferenceError(pub String);

/// Black-box model interface.
pub trait Classifier: Send + Sync {
    fn predict(&self, samples: &[Sample]) -> Result<Vec<i64>, InferenceError>;

    /// Per-class probabilities, when the model exposes them.
    fn predict_proba(&self, _samples: &[Sample]) -> Option<Result<Vec<Vec<f64>>, InferenceError>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QualityLabel {
    Safe,
    Moderate,
    Contaminated,
    /// Class id outside the label table, kept in its string form.
    Unknown(String),
}

impl QualityLabel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Safe" => Some(QualityLabel::Safe),
            "Moderate" => Some(QualityLabel::Moderate),
            "Contaminated" => Some(QualityLabel::Contaminated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QualityLabel::Safe => "Safe",
            QualityLabel::Moderate => "Moderate",
            QualityLabel::Contaminated => "Contaminated",
            QualityLabel::Unknown(_) => "Unknown",
        }
    }

    /// Value written to the `result` column: the name, or the raw id for
    /// unmapped classes.
    pub fn storage_value(&self) -> &str {
        match self {
            QualityLabel::Unknown(raw) => raw,
            known => known.as_str(),
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for QualityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QualityLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(QualityLabel::from_name(&raw).unwrap_or(QualityLabel::Unknown(raw)))
    }
}

/// Class id to label table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    entries: BTreeMap<i64, QualityLabel>,
}

impl Default for LabelMap {
    fn default() -> Self {
        let entries = BTreeMap::from([
            (0, QualityLabel::Safe),
            (1, QualityLabel::Moderate),
            (2, QualityLabel::Contaminated),
        ]);
        Self { entries }
    }
}

impl LabelMap {
    /// Build a table from configured names; every name must be a known label.
    pub fn from_names(names: &BTreeMap<i64, String>) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        for (id, name) in names {
            let label = QualityLabel::from_name(name.trim())
                .ok_or_else(|| anyhow::anyhow!("label_map entry {id} has unknown label '{name}'"))?;
            entries.insert(*id, label);
        }
        Ok(Self { entries })
    }

    pub fn label_for(&self, class_id: i64) -> QualityLabel {
        self.entries
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| QualityLabel::Unknown(class_id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    /// Highest class probability as a percentage, two decimals.
    Percent(f64),
    Unavailable,
}

impl Confidence {
    fn from_probabilities(probabilities: &[f64]) -> Self {
        let max = probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Confidence::Unavailable;
        }
        Confidence::Percent((max * 100.0 * 100.0).round() / 100.0)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Confidence::Percent(value) => serializer.serialize_f64(*value),
            Confidence::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierOutput {
    pub class_id: i64,
    pub label: QualityLabel,
    pub confidence: Confidence,
}

/// Run the model on a single reading and map the result to a label.
pub fn classify(
    model: &dyn Classifier,
    labels: &LabelMap,
    reading: &Reading,
) -> Result<ClassifierOutput, InferenceError> {
    let samples = [reading.as_sample()];

    let class_id = model
        .predict(&samples)?
        .first()
        .copied()
        .ok_or_else(|| InferenceError("model returned no prediction".into()))?;

    let confidence = match model.predict_proba(&samples) {
        Some(result) => {
            let rows = result?;
            let row = rows
                .first()
                .ok_or_else(|| InferenceError("model returned no probabilities".into()))?;
            Confidence::from_probabilities(row)
        }
        None => Confidence::Unavailable,
    };

    Ok(ClassifierOutput {
        class_id,
        label: labels.label_for(class_id),
        confidence,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct ForestExport {
    n_classes: usize,
    #[serde(default)]
    classes: Option<Vec<i64>>,
    trees: Vec<DecisionTree>,
}

/// Random forest loaded from its JSON export.
///
/// Split nodes send a sample left when `x[feature] <= threshold`. Leaf values
/// are per-class weights; each tree votes with its normalized leaf and the
/// forest averages the votes.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let export: ForestExport = serde_json::from_str(raw)?;
        Self::from_export(export)
    }

    fn from_export(export: ForestExport) -> anyhow::Result<Self> {
        use anyhow::bail;

        if export.n_classes == 0 {
            bail!("forest declares zero classes");
        }
        if export.trees.is_empty() {
            bail!("forest has no trees");
        }

        let classes = match export.classes {
            Some(classes) if classes.len() != export.n_classes => bail!(
                "forest lists {} classes but declares n_classes = {}",
                classes.len(),
                export.n_classes
            ),
            Some(classes) => classes,
            None => (0..export.n_classes as i64).collect(),
        };

        for (tree_idx, tree) in export.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                bail!("tree {tree_idx} has no nodes");
            }
            for (node_idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= FEATURE_COUNT {
                            bail!("tree {tree_idx} node {node_idx} splits on feature {feature}");
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            bail!("tree {tree_idx} node {node_idx} points outside the tree");
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.len() != export.n_classes {
                            bail!(
                                "tree {tree_idx} leaf {node_idx} has {} weights, expected {}",
                                value.len(),
                                export.n_classes
                            );
                        }
                    }
                }
            }
        }

        Ok(Self {
            classes,
            trees: export.trees,
        })
    }

    fn tree_vote(&self, tree: &DecisionTree, sample: &Sample) -> Result<Vec<f64>, InferenceError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=tree.nodes.len() {
            match &tree.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    if total <= 0.0 {
                        return Ok(vec![1.0 / value.len() as f64; value.len()]);
                    }
                    return Ok(value.iter().map(|weight| weight / total).collect());
                }
            }
        }
        Err(InferenceError("decision tree contains a cycle".into()))
    }

    fn probabilities(&self, sample: &Sample) -> Result<Vec<f64>, InferenceError> {
        let mut sums = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (sum, vote) in sums.iter_mut().zip(self.tree_vote(tree, sample)?) {
                *sum += vote;
            }
        }
        let count = self.trees.len() as f64;
        Ok(sums.into_iter().map(|sum| sum / count).collect())
    }
}

impl Classifier for ForestClassifier {
    fn predict(&self, samples: &[Sample]) -> Result<Vec<i64>, InferenceError> {
        samples
            .iter()
            .map(|sample| {
                let probabilities = self.probabilities(sample)?;
                // First maximum wins on ties.
                let mut best = 0;
                for (idx, p) in probabilities.iter().enumerate() {
                    if *p > probabilities[best] {
                        best = idx;
                    }
                }
                Ok(self.classes[best])
            })
            .collect()
    }

    fn predict_proba(&self, samples: &[Sample]) -> Option<Result<Vec<Vec<f64>>, InferenceError>> {
        Some(samples.iter().map(|sample| self.probabilities(sample)).collect())
    }
}
