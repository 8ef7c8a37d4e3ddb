//! Aggregation of simulation runs into reports.
//!
//! [`aggregate`] is a pure function of its inputs: the same runs always give
//! the same [`MonteCarloResults`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::monte_carlo::{DecisionRecord, SimulationRun};
use crate::combat::{ActionKind, Build};
use crate::engine::RingBuffer;
use crate::stats::{self, DistributionSummary};

/// Coefficient of variation above which damage counts as volatile.
pub const HIGH_VARIANCE_CV: f64 = 0.5;
/// Hit rate below which accuracy is flagged.
pub const LOW_HIT_RATE: f64 = 0.5;
/// Fraction of a resource spent that counts as exhaustion.
pub const EXHAUSTION_FRACTION: f64 = 0.9;
/// Downed rate above which survival is flagged.
pub const FREQUENT_DOWNED_RATE: f64 = 0.1;
/// Interval width relative to the mean above which the estimate is flagged.
pub const WIDE_INTERVAL_RATIO: f64 = 0.1;

/// Resources available per run, for utilization fractions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Spell slots per level.
    pub spell_slots: [u32; 9],
    /// Class resource uses.
    pub class_resources: IndexMap<String, u32>,
    /// Potions.
    pub potions: u32,
}

impl ResourceBudget {
    /// Budget of a fully rested build.
    ///
    /// Short rests can restore class resources, so their fraction may exceed 1.
    #[must_use]
    pub fn from_build(build: &Build) -> Self {
        Self {
            spell_slots: build.spell_slots,
            class_resources: build
                .class_resources
                .iter()
                .map(|(name, r)| (name.clone(), r.uses))
                .collect(),
            potions: build.potions,
        }
    }
}

/// Inputs to [`aggregate`] beyond the runs themselves.
#[derive(Debug, Clone)]
pub struct AggregateContext<'a> {
    /// Seed the runs were produced with.
    pub seed: u32,
    /// Rounds per encounter.
    pub rounds_per_encounter: u32,
    /// Target hit points per encounter.
    pub target_hit_points: u32,
    /// Percentiles to report.
    pub percentiles: &'a [f64],
    /// Confidence level for intervals.
    pub confidence: f64,
    /// Resources available per run.
    pub budget: ResourceBudget,
    /// Free-form caveats (environment etc).
    pub notes: Vec<String>,
}

/// Damage statistics for one round index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round index across the run (1-based).
    pub round: usize,
    /// Encounter the round belongs to (1-based).
    pub encounter: u32,
    /// Round within its encounter (1-based).
    pub encounter_round: u32,
    /// Mean damage.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Median damage.
    pub median: f64,
    /// Minimum damage.
    pub min: f64,
    /// Maximum damage.
    pub max: f64,
}

/// Usage of one class resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUse {
    /// Mean uses per run.
    pub mean_used: f64,
    /// Mean uses over uses available (0 when none are available).
    pub fraction: f64,
}

/// Mean resource consumption per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    /// Mean spell slots spent per level.
    pub spell_slots: [f64; 9],
    /// Total slots spent over total slots available.
    pub spell_slot_fraction: f64,
    /// Class resources.
    pub class_resources: IndexMap<String, ResourceUse>,
    /// Mean potions drunk.
    pub potions: f64,
    /// Mean reactions taken.
    pub reactions: f64,
    /// Mean target legendary resistances burned.
    pub legendary_resistances: f64,
    /// Mean failed concentration checks.
    pub concentration_broken: f64,
}

/// Heuristic warning about a build's performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskFactor {
    /// Damage is volatile.
    HighVariance {
        /// Coefficient of variation of total damage.
        coefficient_of_variation: f64,
    },
    /// Attacks miss often.
    LowHitRate {
        /// Mean hit rate.
        hit_rate: f64,
    },
    /// A resource runs dry.
    ResourceExhaustion {
        /// Resource name.
        resource: String,
        /// Fraction used.
        fraction: f64,
    },
    /// The build drops often.
    FrequentlyDowned {
        /// Fraction of runs downed.
        rate: f64,
    },
    /// The estimate is imprecise.
    WideConfidenceInterval {
        /// Interval width over the mean.
        relative_width: f64,
    },
}

/// Tactical observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TacticalInsights {
    /// Round index with the highest mean damage.
    pub best_round: Option<usize>,
    /// Round index with the lowest mean damage.
    pub worst_round: Option<usize>,
    /// Warnings.
    pub risk_factors: Vec<RiskFactor>,
    /// Caveats.
    pub notes: Vec<String>,
}

/// Aggregated report of one simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResults {
    /// Runs aggregated.
    pub iterations: usize,
    /// Seed used.
    pub seed: u32,
    /// Total damage per run.
    pub total_damage: DistributionSummary,
    /// Mean damage per round per run.
    pub damage_per_round: DistributionSummary,
    /// Per-round-index statistics.
    pub rounds: Vec<RoundSummary>,
    /// Mean per-run hit rate over runs that attacked.
    pub hit_rate: f64,
    /// Mean per-run crit rate over runs that attacked.
    pub crit_rate: f64,
    /// Resource consumption.
    pub resource_utilization: ResourceUtilization,
    /// Fraction of encounters whose damage reached the target's hit points.
    pub kill_probability: f64,
    /// Fraction of runs where the build dropped.
    pub downed_rate: f64,
    /// Mean damage taken per run.
    pub mean_damage_taken: f64,
    /// Share of recorded decisions by action kind.
    pub action_mix: IndexMap<ActionKind, f64>,
    /// Decisions kept in the history.
    pub decisions_recorded: usize,
    /// Decisions made in total.
    pub decisions_total: u64,
    /// Heuristic insights.
    pub insights: TacticalInsights,
}

/// Aggregate runs into a report.
#[must_use]
pub fn aggregate(
    runs: &[SimulationRun],
    history: &RingBuffer<DecisionRecord>,
    context: &AggregateContext<'_>,
) -> MonteCarloResults {
    let totals: Vec<f64> = runs.iter().map(|r| r.total_damage).collect();
    let per_round: Vec<f64> = runs.iter().map(SimulationRun::damage_per_round).collect();
    let total_damage = stats::summarize(&totals, context.percentiles, context.confidence);
    let damage_per_round = stats::summarize(&per_round, context.percentiles, context.confidence);

    let rounds = round_summaries(runs, context.rounds_per_encounter);

    let attacked: Vec<&SimulationRun> = runs.iter().filter(|r| r.attacks > 0).collect();
    let hit_rates: Vec<f64> = attacked.iter().map(|r| r.hit_rate()).collect();
    let crit_rates: Vec<f64> = attacked.iter().map(|r| r.crit_rate()).collect();
    let hit_rate = stats::mean(&hit_rates);
    let crit_rate = stats::mean(&crit_rates);

    let resource_utilization = utilization(runs, &context.budget);

    let encounters: Vec<f64> = runs
        .iter()
        .flat_map(|r| r.damage_by_encounter.iter().copied())
        .collect();
    let target_hp = f64::from(context.target_hit_points);
    let kill_probability = fraction(encounters.iter().filter(|&&d| d >= target_hp).count(), encounters.len());
    let downed_rate = fraction(runs.iter().filter(|r| r.downed).count(), runs.len());
    let taken: Vec<f64> = runs.iter().map(|r| r.damage_taken).collect();

    let action_mix = action_mix(history);

    let insights = insights(
        &total_damage,
        &rounds,
        hit_rate,
        attacked.is_empty(),
        &resource_utilization,
        downed_rate,
        context.notes.clone(),
    );

    MonteCarloResults {
        iterations: runs.len(),
        seed: context.seed,
        total_damage,
        damage_per_round,
        rounds,
        hit_rate,
        crit_rate,
        resource_utilization,
        kill_probability,
        downed_rate,
        mean_damage_taken: stats::mean(&taken),
        action_mix,
        decisions_recorded: history.len(),
        decisions_total: history.total_pushed(),
        insights,
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn round_summaries(runs: &[SimulationRun], rounds_per_encounter: u32) -> Vec<RoundSummary> {
    let len = runs.iter().map(|r| r.damage_by_round.len()).max().unwrap_or(0);
    let per_encounter = rounds_per_encounter.max(1) as usize;

    (0..len)
        .map(|i| {
            let values: Vec<f64> = runs
                .iter()
                .filter_map(|r| r.damage_by_round.get(i).copied())
                .collect();
            let sorted = stats::sorted(&values);
            RoundSummary {
                round: i + 1,
                encounter: (i / per_encounter) as u32 + 1,
                encounter_round: (i % per_encounter) as u32 + 1,
                mean: stats::mean(&values),
                std_dev: stats::standard_deviation(&values),
                median: stats::percentile_sorted(&sorted, 50.0),
                min: sorted.first().copied().unwrap_or(0.0),
                max: sorted.last().copied().unwrap_or(0.0),
            }
        })
        .collect()
}

fn mean_by(runs: &[SimulationRun], f: impl Fn(&SimulationRun) -> f64) -> f64 {
    let values: Vec<f64> = runs.iter().map(f).collect();
    stats::mean(&values)
}

fn utilization(runs: &[SimulationRun], budget: &ResourceBudget) -> ResourceUtilization {
    let mut spell_slots = [0.0; 9];
    for (level, slot) in spell_slots.iter_mut().enumerate() {
        *slot = mean_by(runs, |r| f64::from(r.resource_usage.spell_slots[level]));
    }
    let available: f64 = budget.spell_slots.iter().copied().map(f64::from).sum();
    let used: f64 = spell_slots.iter().sum();
    let spell_slot_fraction = if available > 0.0 {
        used / available
    } else {
        0.0
    };

    let mut names: Vec<&String> = budget.class_resources.keys().collect();
    for run in runs {
        for name in run.resource_usage.class_resources.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    let class_resources = names
        .into_iter()
        .map(|name| {
            let mean_used = mean_by(runs, |r| {
                f64::from(r.resource_usage.class_resources.get(name).copied().unwrap_or(0))
            });
            let uses = budget.class_resources.get(name).copied().unwrap_or(0);
            let fraction = if uses == 0 {
                0.0
            } else {
                mean_used / f64::from(uses)
            };
            (name.clone(), ResourceUse { mean_used, fraction })
        })
        .collect();

    ResourceUtilization {
        spell_slots,
        spell_slot_fraction,
        class_resources,
        potions: mean_by(runs, |r| f64::from(r.resource_usage.potions)),
        reactions: mean_by(runs, |r| f64::from(r.resource_usage.reactions)),
        legendary_resistances: mean_by(runs, |r| f64::from(r.resource_usage.legendary_resistances)),
        concentration_broken: mean_by(runs, |r| f64::from(r.resource_usage.concentration_broken)),
    }
}

fn action_mix(history: &RingBuffer<DecisionRecord>) -> IndexMap<ActionKind, f64> {
    let mut counts: IndexMap<ActionKind, usize> = IndexMap::new();
    for decision in history.iter() {
        *counts.entry(decision.kind()).or_insert(0) += 1;
    }
    counts.sort_keys();
    let total = history.len();
    counts
        .into_iter()
        .map(|(kind, count)| (kind, fraction(count, total)))
        .collect()
}

fn insights(
    total_damage: &DistributionSummary,
    rounds: &[RoundSummary],
    hit_rate: f64,
    no_attacks: bool,
    utilization: &ResourceUtilization,
    downed_rate: f64,
    notes: Vec<String>,
) -> TacticalInsights {
    let best_round = rounds
        .iter()
        .max_by(|a, b| a.mean.total_cmp(&b.mean))
        .map(|r| r.round);
    let worst_round = rounds
        .iter()
        .min_by(|a, b| a.mean.total_cmp(&b.mean))
        .map(|r| r.round);

    let mut risk_factors = Vec::new();

    let cv = total_damage.coefficient_of_variation();
    if cv > HIGH_VARIANCE_CV {
        risk_factors.push(RiskFactor::HighVariance {
            coefficient_of_variation: cv,
        });
    }
    if !no_attacks && hit_rate < LOW_HIT_RATE {
        risk_factors.push(RiskFactor::LowHitRate { hit_rate });
    }
    if utilization.spell_slot_fraction >= EXHAUSTION_FRACTION {
        risk_factors.push(RiskFactor::ResourceExhaustion {
            resource: "spell_slots".to_string(),
            fraction: utilization.spell_slot_fraction,
        });
    }
    for (name, usage) in &utilization.class_resources {
        if usage.fraction >= EXHAUSTION_FRACTION {
            risk_factors.push(RiskFactor::ResourceExhaustion {
                resource: name.clone(),
                fraction: usage.fraction,
            });
        }
    }
    if downed_rate > FREQUENT_DOWNED_RATE {
        risk_factors.push(RiskFactor::FrequentlyDowned { rate: downed_rate });
    }
    if total_damage.mean > 0.0 {
        let relative_width = total_damage.confidence_interval.width() / total_damage.mean;
        if relative_width > WIDE_INTERVAL_RATIO {
            risk_factors.push(RiskFactor::WideConfidenceInterval { relative_width });
        }
    }

    TacticalInsights {
        best_round,
        worst_round,
        risk_factors,
        notes,
    }
}
