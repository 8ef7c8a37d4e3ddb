//! Reproducibility and consistency checks across the public API.
//!
//! Each test states a null hypothesis and the experiment that would falsify it.

use dprsim::combat::{
    AbilityScores, ActionPolicy, CharacterClass, ClassLevel, FeatureFlags, Weapon,
};
use dprsim::probability::AttackOdds;
use dprsim::prelude::*;
use indexmap::IndexMap;

const SEED: u32 = 42;
const ITERATIONS: usize = 5000;
const ROUNDS: u32 = 3;

fn longsword_fighter() -> Build {
    Build {
        name: "Longsword Fighter".to_string(),
        abilities: AbilityScores {
            strength: 16,
            constitution: 14,
            ..AbilityScores::default()
        },
        class_levels: vec![ClassLevel::new(CharacterClass::Fighter, 5)],
        attack_bonus: 6,
        attacks_per_action: 2,
        weapon: Some(Weapon::new("Longsword", DiceExpr::dice(1, 8), 3)),
        once_per_turn: Vec::new(),
        resource_damage: Vec::new(),
        bonus_attack: None,
        spells: Vec::new(),
        spell_attack_bonus: 0,
        spell_save_dc: 0,
        spell_slots: [0; 9],
        class_resources: IndexMap::new(),
        hit_points: 44,
        potions: 0,
        speed: 30,
        features: FeatureFlags::default(),
        advantage: Advantage::Normal,
        policy: ActionPolicy {
            use_action_surge: false,
            ..ActionPolicy::default()
        },
    }
}

fn simulate(seed: u32, build: &Build) -> MonteCarloResults {
    MonteCarloSimulator::with_seed(seed)
        .simulate(build, &Target::new(15, 200), &CombatScenario::rounds(ROUNDS), ITERATIONS)
        .unwrap()
}

// H0: Different seeds produce identical outputs
// Falsification: Simulate with seeds 42, 43, 44; compare serialized reports
#[test]
fn h0_1_different_seeds_produce_different_outputs() {
    let build = longsword_fighter();
    let outputs: Vec<String> = [42, 43, 44]
        .into_iter()
        .map(|seed| serde_json::to_string(&simulate(seed, &build)).unwrap())
        .collect();

    assert_ne!(outputs[0], outputs[1], "Seed 42 and 43 produced identical output");
    assert_ne!(outputs[1], outputs[2], "Seed 43 and 44 produced identical output");
    assert_ne!(outputs[0], outputs[2], "Seed 42 and 44 produced identical output");
}

// H0: The same seed produces different outputs across calls
// Falsification: Simulate twice with seed=42 on one simulator and once on a
// fresh one; compare serialized reports
#[test]
fn h0_2_same_seed_produces_identical_outputs() {
    let build = longsword_fighter();
    let target = Target::new(15, 200);
    let scenario = CombatScenario::rounds(ROUNDS);
    let simulator = MonteCarloSimulator::with_seed(SEED);

    let first = simulator.simulate(&build, &target, &scenario, ITERATIONS).unwrap();
    let second = simulator.simulate(&build, &target, &scenario, ITERATIONS).unwrap();
    let fresh = simulate(SEED, &build);

    let first = serde_json::to_string(&first).unwrap();
    assert_eq!(first, serde_json::to_string(&second).unwrap());
    assert_eq!(first, serde_json::to_string(&fresh).unwrap());
}

// H0: Rejected inputs perturb later results
// Falsification: Submit an invalid build, then a valid one; compare with a
// simulator that never saw the invalid build
#[test]
fn h0_3_rejected_inputs_consume_no_randomness() {
    let simulator = MonteCarloSimulator::with_seed(SEED);
    let mut broken = longsword_fighter();
    broken.class_levels.clear();

    let err = simulator
        .simulate(&broken, &Target::new(15, 200), &CombatScenario::rounds(ROUNDS), 10)
        .unwrap_err();
    assert!(err.is_input_error());

    let after = simulator
        .simulate(
            &longsword_fighter(),
            &Target::new(15, 200),
            &CombatScenario::rounds(ROUNDS),
            ITERATIONS,
        )
        .unwrap();
    assert_eq!(
        serde_json::to_string(&after).unwrap(),
        serde_json::to_string(&simulate(SEED, &longsword_fighter())).unwrap()
    );
}

// H0: The generator sequence depends on more than its seed
// Falsification: Draw 1000 values, reset, draw again
#[test]
fn h0_4_rng_reset_replays_sequence() {
    let mut rng = SimRng::new(SEED);
    let first: Vec<f64> = (0..1000).map(|_| rng.next_f64()).collect();
    rng.reset();
    let second: Vec<f64> = (0..1000).map(|_| rng.next_f64()).collect();
    assert_eq!(first, second);
    assert!(first.iter().all(|x| (0.0..1.0).contains(x)));
}

// H0: Sampled DPR disagrees with the closed form
// Falsification: Compare the Monte Carlo DPR mean against the closed-form
// expectation; the closed form must lie inside a wide band around the mean
#[test]
fn h0_5_monte_carlo_matches_closed_form() {
    let build = longsword_fighter();
    let results = simulate(SEED, &build);

    // +6 vs AC 15: hit 0.60, crit 0.05; 0.55 * 7.5 + 0.05 * 12 per attack
    let sequence = AttackSequence::from_build(&build).unwrap();
    let expected = sequence.expected_damage(15.0);
    assert!((expected - 2.0 * (0.55 * 7.5 + 0.05 * 12.0)).abs() < 1e-9);

    let sampled = results.damage_per_round.mean;
    assert!(
        (sampled - expected).abs() < 0.5,
        "sampled {sampled} vs closed form {expected}"
    );
    assert!((results.hit_rate - 0.60).abs() < 0.03);
    assert!((results.crit_rate - 0.05).abs() < 0.015);
}

// H0: Report statistics are internally inconsistent
// Falsification: Check ordering of summary statistics and the interval
#[test]
fn h0_6_summary_is_consistent() {
    let results = simulate(SEED, &longsword_fighter());
    let total = &results.total_damage;

    assert_eq!(results.iterations, ITERATIONS);
    assert_eq!(total.count, ITERATIONS);
    assert!(total.min <= total.median && total.median <= total.max);
    assert!(total.confidence_interval.contains(total.mean));
    assert_eq!(results.rounds.len(), ROUNDS as usize);

    let values: Vec<f64> = total.percentiles.iter().map(|p| p.value).collect();
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    let mix: f64 = results.action_mix.values().sum();
    assert!((mix - 1.0).abs() < 1e-9);
}

// H0: Deterministic analyses depend on hidden state
// Falsification: Run the optimizer and progression analyzer twice
#[test]
fn h0_7_deterministic_analyses_repeat() {
    let build = longsword_fighter();
    let sequence = AttackSequence::from_build(&build).unwrap();
    let optimizer = PowerAttackOptimizer::default();
    assert_eq!(optimizer.analyze(&sequence, 16.0), optimizer.analyze(&sequence, 16.0));

    let analyzer = ProgressionAnalyzer::default();
    let a = analyzer.analyze(&build).unwrap();
    let b = analyzer.analyze(&build).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 20);
    assert!(a.windows(2).all(|w| w[1].average_hit_points >= w[0].average_hit_points));
}

fn sampled_rates(build: &Build, armor_class: u32) -> (f64, f64) {
    let results = MonteCarloSimulator::with_seed(SEED)
        .simulate(
            build,
            &Target::new(armor_class, 100_000),
            &CombatScenario::rounds(ROUNDS),
            4000,
        )
        .unwrap();
    (results.hit_rate, results.crit_rate)
}

// H0: Closed-form odds disagree with sampled odds under some roll state
// Falsification: For every roll state with Halfling Luck (and Elven Accuracy
// under advantage), compare sampled hit/crit rates with the closed form
#[test]
fn h0_8_closed_form_odds_match_sampler_per_roll_state() {
    let cases = [
        (Advantage::Normal, false),
        (Advantage::Advantage, false),
        (Advantage::Disadvantage, false),
        (Advantage::Advantage, true),
    ];
    for (advantage, elven) in cases {
        let mut build = longsword_fighter();
        build.attack_bonus = 7;
        build.advantage = advantage;
        build.features = FeatureFlags {
            elven_accuracy: elven,
            halfling_luck: true,
        };

        let odds = AttackSequence::from_build(&build)
            .unwrap()
            .odds(17.0, advantage);
        let exact = AttackOdds::roll(7.0, 17.0, 20, advantage, elven, true);
        assert!((odds.hit - exact.hit).abs() < 1e-12);

        let (hit_rate, crit_rate) = sampled_rates(&build, 17);
        assert!(
            (hit_rate - odds.hit).abs() < 0.015,
            "{advantage:?} elven={elven}: sampled {hit_rate} vs closed form {}",
            odds.hit
        );
        assert!(
            (crit_rate - odds.crit).abs() < 0.01,
            "{advantage:?} elven={elven}: sampled {crit_rate} vs closed form {}",
            odds.crit
        );
    }
}

// H0: Expanded crit ranges hit differently in the closed form and the sampler
// Falsification: +0 vs AC 30 with crits on 18-20; every hit is a crit-range face
#[test]
fn h0_9_expanded_crit_range_matches_sampler() {
    let mut build = longsword_fighter();
    build.attack_bonus = 0;
    if let Some(weapon) = build.weapon.as_mut() {
        weapon.crit_range = 18;
    }

    let odds = AttackSequence::from_build(&build)
        .unwrap()
        .odds(30.0, Advantage::Normal);
    assert!((odds.hit - 0.15).abs() < 1e-12);
    assert!((odds.crit - 0.15).abs() < 1e-12);

    let (hit_rate, crit_rate) = sampled_rates(&build, 30);
    assert!((hit_rate - 0.15).abs() < 0.015, "sampled hit {hit_rate}");
    assert!((crit_rate - hit_rate).abs() < 1e-12, "every hit should crit");
}
