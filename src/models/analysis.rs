use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Risk tier for a single ingredient. The closed set is a data contract with
/// the inference service: any other value in a response is rejected, never
/// coerced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskClass {
    HighRisk,
    ModerateRisk,
    Healthy,
}

/// Literature citation supporting an ingredient's classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperRef {
    pub title: String,
    pub url: String,
}

/// One ingredient as reported and classified by the inference service.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Ingredient {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(skip)]
    pub classification: RiskClass,

    #[garde(length(min = 1, max = 1000))]
    pub explanation: String,

    #[garde(skip)]
    #[serde(default)]
    pub papers: Vec<PaperRef>,
}

/// Full analysis payload for one label image. Ingredient order is whatever
/// the inference service produced; display layers may re-sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ingredients: Vec<Ingredient>,
}
