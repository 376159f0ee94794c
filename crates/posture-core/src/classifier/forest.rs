//! Decision-forest classifier loaded from a JSON artifact.
//!
//! Artifact layout:
//!
//! ```json
//! {
//!   "features": ["hip_y", "shoulder_y"],
//!   "classes": ["lying", "sitting", "standing"],
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 0.45, "left": 1, "right": 2 },
//!         { "class": 2 },
//!         { "class": 1 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! A split sends `value <= threshold` left and everything else (including
//! NaN) right. Node 0 is the root and children must have a larger index than
//! their parent, so every walk ends at a leaf.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{Classification, Confidence, PostureClassifier, PostureLabel};
use crate::errors::ModelError;
use crate::landmarks::PostureFeatures;

/// Features a model may split on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    /// [`PostureFeatures::hip_y`]
    HipY,
    /// [`PostureFeatures::shoulder_y`]
    ShoulderY,
    /// [`PostureFeatures::torso_length`]
    TorsoLength,
    /// [`PostureFeatures::nose_y`]
    NoseY,
}

impl FeatureName {
    fn read(self, features: &PostureFeatures) -> f64 {
        match self {
            Self::HipY => features.hip_y,
            Self::ShoulderY => features.shoulder_y,
            Self::TorsoLength => features.torso_length,
            Self::NoseY => features.nose_y,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: usize,
    },
}

#[derive(Clone, Debug, Deserialize)]
struct Tree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    features: Vec<FeatureName>,
    classes: Vec<PostureLabel>,
    trees: Vec<Tree>,
}

/// Majority-vote decision forest.
#[derive(Clone, Debug)]
pub struct ForestClassifier {
    features: Vec<FeatureName>,
    classes: Vec<PostureLabel>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let forest = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            trees = forest.trees.len(),
            classes = forest.classes.len(),
            "loaded forest model"
        );
        Ok(forest)
    }

    /// Parse and validate an artifact from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: ForestArtifact = serde_json::from_str(json)?;
        validate(&artifact)?;
        Ok(Self {
            features: artifact.features,
            classes: artifact.classes,
            trees: artifact.trees,
        })
    }

    /// Number of trees in the forest.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn predict_tree(&self, tree: &Tree, features: &PostureFeatures) -> usize {
        let mut index = 0;
        loop {
            match &tree.nodes[index] {
                TreeNode::Leaf { class } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = self.features[*feature].read(features);
                    index = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn validate(artifact: &ForestArtifact) -> Result<(), ModelError> {
    if artifact.features.is_empty() {
        return Err(ModelError::Invalid("no features declared".into()));
    }
    if artifact.classes.is_empty() {
        return Err(ModelError::Invalid("no classes declared".into()));
    }
    if artifact.trees.is_empty() {
        return Err(ModelError::Invalid("forest has no trees".into()));
    }
    for (t, tree) in artifact.trees.iter().enumerate() {
        if tree.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {t} has no nodes")));
        }
        for (n, node) in tree.nodes.iter().enumerate() {
            match *node {
                TreeNode::Leaf { class } => {
                    if class >= artifact.classes.len() {
                        return Err(ModelError::Invalid(format!(
                            "tree {t} node {n}: class {class} out of range"
                        )));
                    }
                }
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if feature >= artifact.features.len() {
                        return Err(ModelError::Invalid(format!(
                            "tree {t} node {n}: feature {feature} out of range"
                        )));
                    }
                    for child in [left, right] {
                        if child <= n || child >= tree.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "tree {t} node {n}: child {child} must point forward within the tree"
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

impl PostureClassifier for ForestClassifier {
    fn name(&self) -> &str {
        "forest"
    }

    #[allow(clippy::cast_precision_loss)]
    fn classify(&self, features: &PostureFeatures) -> Classification {
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[self.predict_tree(tree, features)] += 1;
        }

        // Ties resolve to the class listed first.
        let (winner, count) = votes
            .iter()
            .enumerate()
            .fold((0, 0), |best, (i, &v)| if v > best.1 { (i, v) } else { best });

        Classification {
            label: self.classes[winner],
            confidence: Confidence::from_share(count as f64 / self.trees.len() as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const STUMP: &str = r#"{
        "features": ["hip_y"],
        "classes": ["standing", "sitting"],
        "trees": [
            { "nodes": [
                { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                { "class": 0 },
                { "class": 1 }
            ] }
        ]
    }"#;

    fn split_forest() -> ForestClassifier {
        // Three trees: two say sitting above 0.5, one always says lying.
        ForestClassifier::from_json(
            r#"{
                "features": ["hip_y", "torso_length"],
                "classes": ["lying", "sitting", "standing"],
                "trees": [
                    { "nodes": [
                        { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                        { "class": 2 },
                        { "class": 1 }
                    ] },
                    { "nodes": [
                        { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                        { "class": 2 },
                        { "class": 1 }
                    ] },
                    { "nodes": [ { "class": 0 } ] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn stump_splits_on_threshold() {
        let forest = ForestClassifier::from_json(STUMP).unwrap();
        let low = forest.classify(&PostureFeatures::from_heights(0.1, 0.3));
        let high = forest.classify(&PostureFeatures::from_heights(0.1, 0.7));
        assert_eq!(low.label, PostureLabel::Standing);
        assert_eq!(high.label, PostureLabel::Sitting);
        assert_eq!(low.confidence, Confidence::High);
    }

    #[test]
    fn majority_vote_with_partial_confidence() {
        let forest = split_forest();
        let result = forest.classify(&PostureFeatures::from_heights(0.2, 0.7));
        assert_eq!(result.label, PostureLabel::Sitting);
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(forest.tree_count(), 3);
    }

    #[test]
    fn tie_goes_to_first_class() {
        let forest = ForestClassifier::from_json(
            r#"{
                "features": ["hip_y"],
                "classes": ["standing", "lying"],
                "trees": [
                    { "nodes": [ { "class": 1 } ] },
                    { "nodes": [ { "class": 0 } ] }
                ]
            }"#,
        )
        .unwrap();
        let result = forest.classify(&PostureFeatures::from_heights(0.1, 0.2));
        assert_eq!(result.label, PostureLabel::Standing);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn nan_feature_goes_right() {
        let forest = ForestClassifier::from_json(STUMP).unwrap();
        let result = forest.classify(&PostureFeatures::from_heights(0.1, f64::NAN));
        assert_eq!(result.label, PostureLabel::Sitting);
    }

    #[test]
    fn rejects_backward_child() {
        let err = ForestClassifier::from_json(
            r#"{
                "features": ["hip_y"],
                "classes": ["sitting"],
                "trees": [ { "nodes": [
                    { "feature": 0, "threshold": 0.5, "left": 0, "right": 1 },
                    { "class": 0 }
                ] } ]
            }"#,
        )
        .unwrap_err();
        assert_matches!(err, ModelError::Invalid(msg) if msg.contains("point forward"));
    }

    #[test]
    fn rejects_out_of_range_class() {
        let err = ForestClassifier::from_json(
            r#"{"features": ["hip_y"], "classes": ["sitting"], "trees": [ { "nodes": [ { "class": 3 } ] } ]}"#,
        )
        .unwrap_err();
        assert_matches!(err, ModelError::Invalid(msg) if msg.contains("class 3"));
    }

    #[test]
    fn rejects_out_of_range_feature() {
        let err = ForestClassifier::from_json(
            r#"{
                "features": ["hip_y"],
                "classes": ["sitting", "standing"],
                "trees": [ { "nodes": [
                    { "feature": 4, "threshold": 0.5, "left": 1, "right": 2 },
                    { "class": 0 },
                    { "class": 1 }
                ] } ]
            }"#,
        )
        .unwrap_err();
        assert_matches!(err, ModelError::Invalid(msg) if msg.contains("feature 4"));
    }

    #[test]
    fn rejects_empty_forest() {
        let err = ForestClassifier::from_json(
            r#"{"features": ["hip_y"], "classes": ["sitting"], "trees": []}"#,
        )
        .unwrap_err();
        assert_matches!(err, ModelError::Invalid(_));
    }

    #[test]
    fn rejects_unknown_feature_name() {
        let err = ForestClassifier::from_json(
            r#"{"features": ["knee_angle"], "classes": ["sitting"], "trees": [ { "nodes": [ { "class": 0 } ] } ]}"#,
        )
        .unwrap_err();
        assert_matches!(err, ModelError::Json(_));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STUMP.as_bytes()).unwrap();
        let forest = ForestClassifier::load(file.path()).unwrap();
        assert_eq!(forest.name(), "forest");
        assert_eq!(forest.tree_count(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ForestClassifier::load(Path::new("/nonexistent/posture-model.json")).unwrap_err();
        assert_matches!(err, ModelError::Io(_));
    }
}
