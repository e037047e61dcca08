//! 规则决策引擎
//!
//! 纯函数：同一输入永远得到同一输出。规则按固定顺序逐条求值，互不短路；
//! 每条规则可调整分数并追加一条信号描述。输出只取前 3 条信号，顺序优先于分值大小。

use crate::decision::signals::{
    Decision, EnergyRelease, FiberProteinSupport, ProcessingLevel, SatietySupport,
    StructuredAnalysis,
};

/// 对外暴露的信号条数上限
pub const MAX_KEY_SIGNALS: usize = 3;

/// 单条规则的求值结果
#[derive(Debug, Clone, PartialEq)]
struct RuleOutcome {
    delta: f64,
    signal: Option<String>,
}

impl RuleOutcome {
    fn silent(delta: f64) -> Self {
        Self { delta, signal: None }
    }

    fn emit(delta: f64, signal: impl Into<String>) -> Self {
        Self {
            delta,
            signal: Some(signal.into()),
        }
    }
}

type Rule = fn(&StructuredAnalysis) -> RuleOutcome;

/// 求值顺序即信号优先级
const RULES: &[Rule] = &[
    processing_level,
    ultra_processed_markers,
    sugar_dominance,
    added_sugars,
    fiber_protein_support,
    energy_release,
    satiety_support,
    ingredient_count,
];

fn processing_level(a: &StructuredAnalysis) -> RuleOutcome {
    match a.ingredient_summary.processing_level {
        ProcessingLevel::Low => RuleOutcome::emit(3.0, "Minimally processed"),
        ProcessingLevel::Moderate => RuleOutcome::emit(1.0, "Moderately processed"),
        ProcessingLevel::High => RuleOutcome::emit(-2.0, "Highly processed"),
    }
}

fn ultra_processed_markers(a: &StructuredAnalysis) -> RuleOutcome {
    let count = a.ingredient_summary.ultra_processed_markers.len();
    if count == 0 {
        return RuleOutcome::silent(0.0);
    }
    RuleOutcome::emit(
        -0.5 * count as f64,
        format!("Contains {count} ultra-processed marker(s)"),
    )
}

fn sugar_dominance(a: &StructuredAnalysis) -> RuleOutcome {
    if a.food_properties.sugar_dominant {
        RuleOutcome::emit(-2.0, "Sugar-dominant formulation")
    } else {
        RuleOutcome::silent(1.0)
    }
}

fn added_sugars(a: &StructuredAnalysis) -> RuleOutcome {
    if a.ingredient_summary.added_sugars_present {
        RuleOutcome::emit(-1.5, "Contains added sugars")
    } else {
        RuleOutcome::silent(0.0)
    }
}

fn fiber_protein_support(a: &StructuredAnalysis) -> RuleOutcome {
    match a.food_properties.fiber_protein_support {
        FiberProteinSupport::Strong => RuleOutcome::emit(2.0, "Strong fiber/protein support"),
        FiberProteinSupport::Moderate => RuleOutcome::emit(1.0, "Moderate fiber/protein support"),
        FiberProteinSupport::Weak => RuleOutcome::emit(-0.5, "Weak fiber/protein support"),
        FiberProteinSupport::None => RuleOutcome::emit(-1.0, "No fiber/protein support"),
    }
}

fn energy_release(a: &StructuredAnalysis) -> RuleOutcome {
    match a.food_properties.energy_release_pattern {
        EnergyRelease::Slow => RuleOutcome::emit(1.5, "Slow energy release"),
        EnergyRelease::Mixed => RuleOutcome::silent(0.5),
        EnergyRelease::Rapid => RuleOutcome::emit(-1.0, "Rapid energy release"),
    }
}

fn satiety_support(a: &StructuredAnalysis) -> RuleOutcome {
    match a.food_properties.satiety_support {
        SatietySupport::High => RuleOutcome::emit(1.5, "High satiety support"),
        SatietySupport::Moderate => RuleOutcome::silent(0.5),
        SatietySupport::Low => RuleOutcome::emit(-0.5, "Low satiety support"),
    }
}

fn ingredient_count(a: &StructuredAnalysis) -> RuleOutcome {
    match a.ingredient_summary.ingredient_count {
        n if n <= 5 => RuleOutcome::silent(0.5),
        n if n > 15 => RuleOutcome::emit(-0.5, "High ingredient count"),
        _ => RuleOutcome::silent(0.0),
    }
}

/// 全部规则的求值结果：分数 + 所有触发的信号
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluation {
    pub score: f64,
    pub signals: Vec<String>,
}

/// 决策引擎（无状态）
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn evaluate(&self, analysis: &StructuredAnalysis) -> Evaluation {
        let mut score = 0.0;
        let mut signals = Vec::new();
        for rule in RULES {
            let outcome = rule(analysis);
            score += outcome.delta;
            signals.extend(outcome.signal);
        }
        Evaluation { score, signals }
    }

    /// 结构化信号 → 决策（前 3 条信号）
    pub fn decide(&self, analysis: &StructuredAnalysis) -> Decision {
        let Evaluation { score, mut signals } = self.evaluate(analysis);
        tracing::debug!(score, triggered = signals.len(), "Decision evaluated");
        signals.truncate(MAX_KEY_SIGNALS);
        Decision {
            key_signals: signals,
        }
    }
}
