//! 结构化信号：配料解读器的输出，也是决策引擎的唯一输入

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweetenerType {
    None,
    Natural,
    Added,
    Mixed,
}

/// 纤维 / 蛋白 / 脂肪含量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutrientLevel {
    None,
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiberProteinSupport {
    None,
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyRelease {
    Rapid,
    Mixed,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatietySupport {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulationComplexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCompleteness {
    High,
    Medium,
    Low,
}

/// 配料概况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSummary {
    #[serde(default)]
    pub primary_components: Vec<String>,
    pub added_sugars_present: bool,
    pub sweetener_type: SweetenerType,
    pub fiber_level: NutrientLevel,
    pub protein_level: NutrientLevel,
    pub fat_level: NutrientLevel,
    pub processing_level: ProcessingLevel,
    #[serde(default)]
    pub ultra_processed_markers: Vec<String>,
    pub ingredient_count: u32,
}

/// 食品属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodProperties {
    pub sugar_dominant: bool,
    pub fiber_protein_support: FiberProteinSupport,
    pub energy_release_pattern: EnergyRelease,
    pub satiety_support: SatietySupport,
    pub formulation_complexity: FormulationComplexity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceNotes {
    pub data_completeness: DataCompleteness,
    #[serde(default)]
    pub ambiguity_flags: Vec<String>,
}

/// 结构化配料分析（每个请求新建，不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub ingredient_summary: IngredientSummary,
    pub food_properties: FoodProperties,
    pub confidence_notes: ConfidenceNotes,
}

/// 决策结果：至多 3 条信号，按规则求值顺序排列；内部分数不对外暴露
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub key_signals: Vec<String>,
}
