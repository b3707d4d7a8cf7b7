//! Integration Tests for Greedo
//!
//! This module tests the full selection pipeline:
//! - Usage snapshots → interaction matrix
//! - Interaction matrix → replanner selection
//! - Two-point anchoring across iterations
//! - Failure modes and configuration errors

use greedo_common::{
    AgentId, ConfigError, GapMap, GreedoError, ProtocolError, ResourceCapacities, UsageSnapshot,
};
use greedo_distance::{InteractionMatrix, KernelDistanceConfig, KernelPopulationDistance};
use greedo_selector::selector::two_point::CoupledBudget;
use greedo_selector::{
    DistanceTransform, Greedo, GreedoConfig, IndexedPopulation, ObjectiveState, PreviousIteration,
    ReplannerSelector, SelectionContext, SelectorKind,
};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

fn gaps(entries: &[(&str, f64)]) -> GapMap {
    entries.iter().map(|(a, g)| (AgentId::from(*a), *g)).collect()
}

fn ids(names: &[&str]) -> BTreeSet<AgentId> {
    names.iter().map(|s| AgentId::from(*s)).collect()
}

fn exact_distance() -> KernelPopulationDistance {
    KernelPopulationDistance::new(&KernelDistanceConfig {
        threshold: 0.0,
        ..Default::default()
    })
    .unwrap()
}

/// Random population: usage before and after replanning, capacities and gaps
#[derive(Debug, Clone)]
struct Scenario {
    old: UsageSnapshot,
    new: UsageSnapshot,
    capacities: ResourceCapacities,
    gaps: GapMap,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    let event = (0usize..3, 0.0f64..3600.0);
    let agent = (
        prop::collection::vec(event.clone(), 0..4),
        prop::collection::vec(event, 0..4),
        0.0f64..5.0,
    );
    (
        prop::collection::vec(agent, 2..10),
        prop::collection::vec(1.0f64..10.0, 3),
    )
        .prop_map(|(agents, caps)| {
            let mut old = UsageSnapshot::new();
            let mut new = UsageSnapshot::new();
            let mut gaps = GapMap::new();
            for (i, (before, after, gap)) in agents.into_iter().enumerate() {
                let id = AgentId::new(format!("agent-{i}"));
                for (r, t) in before {
                    old.push_event(id.clone(), format!("link-{r}"), t);
                }
                for (r, t) in after {
                    new.push_event(id.clone(), format!("link-{r}"), t);
                }
                gaps.insert(id, gap);
            }
            let capacities = caps
                .into_iter()
                .enumerate()
                .map(|(r, c)| (format!("link-{r}"), c))
                .collect();
            Scenario {
                old,
                new,
                capacities,
                gaps,
            }
        })
}

fn selector(kind: SelectorKind) -> ReplannerSelector {
    ReplannerSelector::from_config(&GreedoConfig {
        selector: kind,
        check_consistency: true,
        ..Default::default()
    })
    .unwrap()
}

#[cfg(test)]
mod distance_tests {
    use super::*;

    /// Test: kernel numeric example through the public pipeline
    #[test]
    fn test_kernel_numeric_example() {
        let old = UsageSnapshot::new().with_event("a", "link", 0.0);
        let new = UsageSnapshot::new().with_event("b", "link", 300.0);
        let caps = ResourceCapacities::new().with("link", 1.0);

        let greedo = Greedo::new(GreedoConfig::default()).unwrap();
        let matrix = greedo.interaction_matrix(&old, &new, &caps).unwrap();

        let mu = std::f64::consts::LN_2 / 300.0;
        let kernel = (-std::f64::consts::LN_2).exp() * (1.0 + std::f64::consts::LN_2);
        assert!((kernel - 0.8466).abs() < 1e-4);
        assert!((mu * kernel - 0.001956).abs() < 1e-6);

        let a = AgentId::from("a");
        let b = AgentId::from("b");
        assert!((matrix.coefficient(&a, &b) - (-2.0 * mu * kernel)).abs() < 1e-15);
        assert!((matrix.self_term(&a) - mu).abs() < 1e-15);
        assert!((matrix.self_term(&b) - mu).abs() < 1e-15);
    }

    /// Test: agents sharing no resource do not interact
    #[test]
    fn test_disjoint_resources_give_block_diagonal_matrix() {
        let old = UsageSnapshot::new()
            .with_event("a", "north", 0.0)
            .with_event("b", "south", 0.0);
        let new = UsageSnapshot::new()
            .with_event("a", "north", 60.0)
            .with_event("b", "south", 60.0);
        let caps = ResourceCapacities::new().with("north", 1.0).with("south", 1.0);

        let matrix = exact_distance().compute(&old, &new, &caps).unwrap();
        let a = AgentId::from("a");
        let b = AgentId::from("b");
        assert_eq!(matrix.symmetric(&a, &b), 0.0);
        assert!(matrix.self_term(&a) > 0.0);
    }
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    /// Test: no shared resources selects exactly the positive gaps
    #[test]
    fn test_zero_matrix_selects_positive_gaps() {
        let g = gaps(&[("a", 1.0), ("b", -1.0), ("c", 0.0), ("d", 4.0), ("e", 0.1)]);
        let matrix = InteractionMatrix::empty();
        for eta in [0.0, 0.25, 0.75, 1.0] {
            let outcome = selector(SelectorKind::UpperBound)
                .select_replanners(&g, eta, 5, &SelectionContext::new(&matrix))
                .unwrap();
            assert_eq!(outcome.replanners, ids(&["a", "d", "e"]));
        }
    }

    /// Test: no positive gap means nobody replans
    #[test]
    fn test_no_positive_gap() {
        let g = gaps(&[("a", 0.0), ("b", -3.0)]);
        let matrix = InteractionMatrix::from_entries(vec![("a", "a", 1.0)]);
        let outcome = selector(SelectorKind::UpperBound)
            .select_replanners(&g, 0.5, 5, &SelectionContext::new(&matrix))
            .unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.objective.is_finite());
    }

    /// Test: congested agents are thinned out, isolated ones always replan
    #[test]
    fn test_congestion_thins_out_replanners() {
        let mut old = UsageSnapshot::new();
        let mut new = UsageSnapshot::new();
        let mut g = GapMap::new();
        for i in 0..6 {
            let id = format!("commuter-{i}");
            old.push_event(id.as_str(), "bridge", 10.0 * i as f64);
            new.push_event(id.as_str(), "tunnel", 10.0 * i as f64);
            g.insert(id.as_str(), 1.0);
        }
        old.push_event("loner", "ferry", 0.0);
        new.push_event("loner", "ferry", 1800.0);
        g.insert("loner", 1.0);
        let caps = ResourceCapacities::new()
            .with("bridge", 1.0)
            .with("tunnel", 1.0)
            .with("ferry", 1.0);

        let matrix = exact_distance().compute(&old, &new, &caps).unwrap();
        let outcome = selector(SelectorKind::UpperBound)
            .select_replanners(&g, 0.0, 13, &SelectionContext::new(&matrix))
            .unwrap();

        assert!(outcome.converged);
        assert!(outcome.replanners.contains(&AgentId::from("loner")));
        assert!(outcome.len() < 7);
    }

    /// Test: baselines share the outcome shape
    #[test]
    fn test_baselines() {
        let g = gaps(&[("a", 3.0), ("b", 2.0), ("c", 1.0), ("d", -1.0)]);
        let matrix = InteractionMatrix::empty();
        let ctx = SelectionContext::new(&matrix);

        let sbayti = selector(SelectorKind::Sbayti2007)
            .select_replanners(&g, 0.5, 1, &ctx)
            .unwrap();
        assert_eq!(sbayti.replanners, ids(&["a", "b"]));

        let nothing = selector(SelectorKind::DoNothing)
            .select_replanners(&g, 0.5, 1, &ctx)
            .unwrap();
        assert!(nothing.is_empty());

        let iid = selector(SelectorKind::Iid)
            .select_replanners(&g, 1.0, 1, &ctx)
            .unwrap();
        assert_eq!(iid.len(), 4);
    }
}

#[cfg(test)]
mod two_point_tests {
    use super::*;

    /// Test: previous replanners survive unchanged gaps and usage
    #[test]
    fn test_no_churn_with_unchanged_snapshots() {
        let snapshot = UsageSnapshot::new()
            .with_event("A", "link", 0.0)
            .with_event("B", "link", 30.0)
            .with_event("C", "link", 60.0);
        let caps = ResourceCapacities::new().with("link", 2.0);
        let matrix = exact_distance().compute(&snapshot, &snapshot, &caps).unwrap();
        let g = gaps(&[("A", 2.0), ("B", 1.0), ("C", -0.5)]);
        let previous = ids(&["A", "B"]);

        let ctx = SelectionContext::new(&matrix).with_previous(PreviousIteration {
            replanners: &previous,
            gaps: &g,
            matrix: &matrix,
        });
        let outcome = selector(SelectorKind::TwoPoint)
            .select_replanners(&g, 0.4, 21, &ctx)
            .unwrap();
        assert_eq!(outcome.replanners, previous);
    }

    /// Test: the engine carries the anchor from one iteration to the next
    #[test]
    fn test_engine_anchors_two_point_search() {
        let mut greedo = Greedo::new(GreedoConfig {
            selector: SelectorKind::TwoPoint,
            ..Default::default()
        })
        .unwrap();
        let snapshot = UsageSnapshot::new()
            .with_event("a", "link", 0.0)
            .with_event("b", "other", 0.0);
        let caps = ResourceCapacities::new().with("link", 1.0).with("other", 1.0);
        let g = gaps(&[("a", 1.0), ("b", 2.0)]);

        let first = greedo.replan(g.clone(), &snapshot, &snapshot, &caps).unwrap();
        let second = greedo.replan(g, &snapshot, &snapshot, &caps).unwrap();
        assert_eq!(second.outcome.replanners, first.outcome.replanners);
        assert_eq!(greedo.iteration(), 2);
    }

    /// Test: a two-point selection fed back as its own anchor is left alone
    #[test]
    fn test_two_point_selection_is_a_fixed_point() {
        let g = gaps(&[("a", 2.0), ("b", 1.0), ("c", -1.0)]);
        let matrix = InteractionMatrix::from_entries(vec![("a", "a", 1.0), ("b", "b", 1.0)]);
        let selector = selector(SelectorKind::TwoPoint);

        for eta in [0.0, 0.3] {
            let first = selector
                .select_replanners(&g, eta, 8, &SelectionContext::new(&matrix))
                .unwrap();
            assert_eq!(first.replanners, ids(&["a", "b"]));

            let ctx = SelectionContext::new(&matrix).with_previous(PreviousIteration {
                replanners: &first.replanners,
                gaps: &g,
                matrix: &matrix,
            });
            let again = selector.select_replanners(&g, eta, 9, &ctx).unwrap();
            assert_eq!(again.accepted_flips, 0);
            assert_eq!(again.replanners, first.replanners);
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    /// Test: invalid configuration fails at construction
    #[test]
    fn test_invalid_configuration() {
        let cases = [
            GreedoConfig {
                kernel_half_life_s: -1.0,
                ..Default::default()
            },
            GreedoConfig {
                kernel_threshold: -0.5,
                ..Default::default()
            },
            GreedoConfig {
                use_linear_distance: false,
                use_quadratic_distance: false,
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(matches!(Greedo::new(config), Err(GreedoError::Config(_))));
        }
    }

    /// Test: a second open candidate is a protocol violation
    #[test]
    fn test_double_open_candidate() {
        let g = gaps(&[("a", 1.0), ("b", 1.0)]);
        let population = IndexedPopulation::new(&g, &InteractionMatrix::empty());
        let mut state = ObjectiveState::empty(&population);
        state.begin_candidate_for(&AgentId::from("a"), false, 1.0).unwrap();

        let err: GreedoError = state
            .begin_candidate_for(&AgentId::from("b"), false, 1.0)
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            GreedoError::Protocol(ProtocolError::CandidateAlreadyOpen { .. })
        ));
    }

    /// Test: rates outside [0, 1] are rejected
    #[test]
    fn test_rate_out_of_range() {
        let matrix = InteractionMatrix::empty();
        let err = selector(SelectorKind::UpperBound)
            .select_replanners(&gaps(&[("a", 1.0)]), -0.1, 0, &SelectionContext::new(&matrix))
            .unwrap_err();
        assert!(matches!(err, GreedoError::Config(ConfigError::RateOutOfRange(_))));
    }

    /// Test: missing usage data is not fatal
    #[test]
    fn test_agent_without_usage() {
        let old = UsageSnapshot::new().with_event("a", "link", 0.0);
        let new = UsageSnapshot::new().with_event("a", "link", 100.0);
        let caps = ResourceCapacities::new().with("link", 1.0);
        let mut greedo = Greedo::new(GreedoConfig::default()).unwrap();

        let report = greedo
            .replan(gaps(&[("a", 1.0), ("ghost", 2.0)]), &old, &new, &caps)
            .unwrap();
        assert!(report.outcome.replanners.contains(&AgentId::from("ghost")));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Identical inputs and seed give identical matrices and selections
    #[test]
    fn test_determinism(s in scenario(), eta in 0.0f64..=1.0, seed in any::<u64>()) {
        let distance = exact_distance();
        let m1 = distance.compute(&s.old, &s.new, &s.capacities).unwrap();
        let m2 = distance.compute(&s.old, &s.new, &s.capacities).unwrap();
        prop_assert_eq!(m1.len(), m2.len());
        for (from, to, value) in m1.iter() {
            prop_assert_eq!(value, m2.coefficient(from, to));
        }

        let selector = selector(SelectorKind::UpperBound);
        let a = selector.select_replanners(&s.gaps, eta, seed, &SelectionContext::new(&m1)).unwrap();
        let b = selector.select_replanners(&s.gaps, eta, seed, &SelectionContext::new(&m2)).unwrap();
        prop_assert_eq!(a, b);
    }

    /// The selection is a local optimum: no single flip improves Q
    #[test]
    fn test_idempotence(s in scenario(), eta in 0.0f64..=1.0, seed in any::<u64>()) {
        let matrix = exact_distance().compute(&s.old, &s.new, &s.capacities).unwrap();
        let outcome = selector(SelectorKind::UpperBound)
            .select_replanners(&s.gaps, eta, seed, &SelectionContext::new(&matrix))
            .unwrap();
        prop_assume!(!outcome.is_empty());

        let population = IndexedPopulation::new(&s.gaps, &matrix);
        let (members, _) = population.membership(outcome.replanners.iter());
        let mut state = ObjectiveState::new(&population, members);
        let transform = DistanceTransform::linear();
        let gamma = eta * population.total_positive_gap();
        for agent in 0..population.len() {
            state.begin_flip(agent).unwrap();
            let dq = state.evaluate_delta_q(gamma, &transform).unwrap();
            state.commit(false).unwrap();
            prop_assert!(dq <= 1e-9 * state.q(gamma, &transform).abs().max(1.0));
        }
    }

    /// The coupled objective max(Q1, Q2) never decreases across an accepted commit
    #[test]
    fn test_coupled_objective_never_decreases_per_commit(
        s1 in scenario(),
        s2 in scenario(),
        eta in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let distance = exact_distance();
        let m1 = distance.compute(&s1.old, &s1.new, &s1.capacities).unwrap();
        let m2 = distance.compute(&s2.old, &s2.new, &s2.capacities).unwrap();
        let universe: BTreeSet<AgentId> = s1.gaps.agents().chain(s2.gaps.agents()).cloned().collect();
        let first = IndexedPopulation::with_universe(universe.iter().cloned(), &s1.gaps, &m1);
        let second = IndexedPopulation::with_universe(universe, &s2.gaps, &m2);

        let transform = DistanceTransform::default();
        let budget = CoupledBudget::new(eta, first.total_positive_gap(), second.total_positive_gap());
        let (initial, _) = first.membership(s1.gaps.positive_agents().iter());
        let mut state1 = ObjectiveState::new(&first, initial);
        let mut state2 = ObjectiveState::empty(&second);
        let coupled = |a: &ObjectiveState<'_>, b: &ObjectiveState<'_>| {
            a.q(budget.gamma1, &transform).max(b.q(budget.gamma2, &transform))
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..first.len()).collect();
        let mut q = coupled(&state1, &state2);
        for _ in 0..50 {
            order.shuffle(&mut rng);
            let mut improved = false;
            for &agent in &order {
                state1.begin_flip(agent).unwrap();
                state2.begin_flip(agent).unwrap();
                let dq1 = state1.evaluate_delta_q(budget.gamma1, &transform).unwrap();
                let dq2 = state2.evaluate_delta_q(budget.gamma2, &transform).unwrap();
                let q1 = state1.q(budget.gamma1, &transform);
                let q2 = state2.q(budget.gamma2, &transform);
                let accept = (q1 + dq1).max(q2 + dq2) - q1.max(q2) > 0.0;
                state1.commit(accept).unwrap();
                state2.commit(accept).unwrap();

                if accept {
                    improved = true;
                    let after = coupled(&state1, &state2);
                    prop_assert!(after >= q - 1e-9 * q.abs().max(1.0));
                    q = after;
                }
            }
            if !improved {
                break;
            }
        }
    }

    /// Q never decreases from one sweep to the next
    #[test]
    fn test_monotonicity(s in scenario(), eta in 0.0f64..=1.0, seed in any::<u64>()) {
        let matrix = exact_distance().compute(&s.old, &s.new, &s.capacities).unwrap();
        for kind in [SelectorKind::UpperBound, SelectorKind::TwoPoint] {
            let outcome = selector(kind)
                .select_replanners(&s.gaps, eta, seed, &SelectionContext::new(&matrix))
                .unwrap();
            prop_assert!(outcome.converged);
            for pair in outcome.sweep_objectives.windows(2) {
                prop_assert!(pair[1] >= pair[0] - 1e-9 * pair[0].abs().max(1.0));
            }
        }
    }
}
