// tests/scheduler_frontier.rs

mod common;
use crate::common::{StepBuilder, WorkflowBuilder};

use std::collections::BTreeMap;

use chrono::Utc;
use flowgate::config::WorkflowDefinition;
use flowgate::dag::{DagGraph, Scheduler, SchedulerStep, UnreachableStep};
use flowgate::execution::{StepRuntimeState, StepTransition};
use flowgate::types::{Params, StepType};

/// A -> {B, C} -> D
fn diamond() -> WorkflowDefinition {
    WorkflowBuilder::new("diamond")
        .step(StepBuilder::new("A", StepType::Ingestion))
        .step(StepBuilder::new("B", StepType::Training).after("A"))
        .step(StepBuilder::new("C", StepType::Validation).after("A"))
        .step(StepBuilder::new("D", StepType::Reporting).after("B").after("C"))
        .build()
}

fn pending_states(def: &WorkflowDefinition) -> BTreeMap<String, StepRuntimeState> {
    def.steps()
        .iter()
        .map(|s| (s.id.clone(), StepRuntimeState::new(s.id.clone())))
        .collect()
}

fn apply(states: &mut BTreeMap<String, StepRuntimeState>, step: &str, t: StepTransition) {
    states
        .get_mut(step)
        .unwrap()
        .apply(&t, Utc::now())
        .unwrap();
}

fn complete(states: &mut BTreeMap<String, StepRuntimeState>, step: &str) {
    apply(states, step, StepTransition::Start);
    apply(states, step, StepTransition::Complete(Params::new()));
}

fn fail(states: &mut BTreeMap<String, StepRuntimeState>, step: &str) {
    apply(states, step, StepTransition::Start);
    apply(states, step, StepTransition::Fail("boom".into()));
}

#[test]
fn graph_exposes_roots_dependents_and_levels() {
    let def = diamond();
    let graph = DagGraph::from_definition(&def);

    assert_eq!(graph.len(), 4);
    assert_eq!(graph.roots(), vec!["A"]);
    assert_eq!(graph.dependents_of("A"), &["B".to_string(), "C".to_string()]);
    assert_eq!(graph.dependencies_of("D"), &["B".to_string(), "C".to_string()]);
    assert_eq!(
        graph.levels(),
        vec![
            vec!["A".to_string()],
            vec!["B".to_string(), "C".to_string()],
            vec!["D".to_string()],
        ]
    );
}

#[test]
fn frontier_follows_completed_dependencies_in_definition_order() {
    let def = diamond();
    let scheduler = Scheduler::from_definition(&def);
    let mut states = pending_states(&def);

    assert_eq!(scheduler.plan(&states), SchedulerStep::Dispatch(vec!["A".into()]));

    complete(&mut states, "A");
    assert_eq!(scheduler.ready_frontier(&states), vec!["B", "C"]);

    apply(&mut states, "B", StepTransition::Start);
    apply(&mut states, "C", StepTransition::Start);
    assert_eq!(scheduler.plan(&states), SchedulerStep::Waiting);

    apply(&mut states, "B", StepTransition::Complete(Params::new()));
    // C still running: D must not be ready.
    assert_eq!(scheduler.deps_satisfied("D", &states), Some(false));
    assert_eq!(scheduler.plan(&states), SchedulerStep::Waiting);

    apply(&mut states, "C", StepTransition::Complete(Params::new()));
    assert_eq!(scheduler.plan(&states), SchedulerStep::Dispatch(vec!["D".into()]));

    complete(&mut states, "D");
    assert_eq!(scheduler.plan(&states), SchedulerStep::Finished);
}

#[test]
fn failed_dependency_makes_descendants_unreachable_transitively() {
    let def = diamond();
    let scheduler = Scheduler::from_definition(&def);
    let mut states = pending_states(&def);

    fail(&mut states, "A");

    match scheduler.plan(&states) {
        SchedulerStep::Skip(unreachable) => {
            assert_eq!(
                unreachable,
                vec![
                    UnreachableStep {
                        step_id: "B".into(),
                        blocked_by: vec!["A".into()],
                    },
                    UnreachableStep {
                        step_id: "C".into(),
                        blocked_by: vec!["A".into()],
                    },
                    UnreachableStep {
                        step_id: "D".into(),
                        blocked_by: vec!["B".into(), "C".into()],
                    },
                ]
            );
        }
        other => panic!("expected skip, got {other:?}"),
    }
}

#[test]
fn skipped_dependency_blocks_like_a_failure() {
    let def = diamond();
    let scheduler = Scheduler::from_definition(&def);
    let mut states = pending_states(&def);

    complete(&mut states, "A");
    complete(&mut states, "B");
    apply(&mut states, "C", StepTransition::Skip("manual".into()));

    assert_eq!(scheduler.ready_frontier(&states), Vec::<String>::new());
    let unreachable = scheduler.unreachable_steps(&states);
    assert_eq!(unreachable.len(), 1);
    assert_eq!(unreachable[0].step_id, "D");
    assert_eq!(unreachable[0].blocked_by, vec!["C"]);
}

#[test]
fn unknown_step_has_no_dependency_answer() {
    let def = diamond();
    let scheduler = Scheduler::from_definition(&def);
    let states = pending_states(&def);
    assert_eq!(scheduler.deps_satisfied("nope", &states), None);
}

#[test]
fn independent_roots_are_ready_together() {
    let def = WorkflowBuilder::new("fan-in")
        .step(StepBuilder::new("x", StepType::Ingestion))
        .step(StepBuilder::new("y", StepType::Ingestion))
        .step(StepBuilder::new("z", StepType::Training).after("x").after("y"))
        .build();
    let scheduler = Scheduler::from_definition(&def);
    let states = pending_states(&def);

    assert_eq!(scheduler.ready_frontier(&states), vec!["x", "y"]);
}
