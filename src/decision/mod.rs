//! 决策层：结构化信号数据模型与规则引擎

pub mod engine;
pub mod signals;

pub use engine::{DecisionEngine, MAX_KEY_SIGNALS};
pub use signals::{
    ConfidenceNotes, DataCompleteness, Decision, EnergyRelease, FiberProteinSupport,
    FoodProperties, FormulationComplexity, IngredientSummary, NutrientLevel, ProcessingLevel,
    SatietySupport, StructuredAnalysis, SweetenerType,
};
