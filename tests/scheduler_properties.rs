// tests/scheduler_properties.rs

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use flowgate::config::WorkflowDefinition;
use flowgate::dag::{Scheduler, SchedulerStep};
use flowgate::execution::{StepRuntimeState, StepStatus, StepTransition};
use flowgate::types::{Params, StepType};
use flowgate_test_utils::builders::{StepBuilder, WorkflowBuilder};
use proptest::prelude::*;

// Acyclic by construction: step N may only depend on steps 0..N-1.
fn dag_strategy(max_steps: usize) -> impl Strategy<Value = WorkflowDefinition> {
    (1..=max_steps).prop_flat_map(|num_steps| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_steps),
            num_steps,
        )
        .prop_map(move |raw_deps| {
            let mut builder = WorkflowBuilder::new("prop");
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let mut step = StepBuilder::new(&format!("s{i}"), StepType::Prediction);
                if i > 0 {
                    let deps: HashSet<usize> = potential.into_iter().map(|d| d % i).collect();
                    for d in deps {
                        step = step.after(&format!("s{d}"));
                    }
                }
                builder = builder.step(step);
            }
            builder.build()
        })
    })
}

fn apply(states: &mut BTreeMap<String, StepRuntimeState>, step: &str, t: StepTransition) {
    states
        .get_mut(step)
        .unwrap()
        .apply(&t, Utc::now())
        .unwrap();
}

proptest! {
    #[test]
    fn every_run_settles_and_respects_dependencies(
        def in dag_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
    ) {
        let scheduler = Scheduler::from_definition(&def);
        let failing: HashSet<String> = failing.into_iter().map(|i| format!("s{i}")).collect();
        let mut states: BTreeMap<String, StepRuntimeState> = def
            .steps()
            .iter()
            .map(|s| (s.id.clone(), StepRuntimeState::new(s.id.clone())))
            .collect();

        let mut rounds = 0;
        loop {
            rounds += 1;
            prop_assert!(rounds <= def.steps().len() * 2 + 2, "scheduler did not settle");

            match scheduler.plan(&states) {
                SchedulerStep::Dispatch(ready) => {
                    for id in &ready {
                        for dep in scheduler.graph().dependencies_of(id) {
                            prop_assert_eq!(states[dep].status(), StepStatus::Completed);
                        }
                    }
                    for id in &ready {
                        apply(&mut states, id, StepTransition::Start);
                        if failing.contains(id) {
                            apply(&mut states, id, StepTransition::Fail("boom".into()));
                        } else {
                            apply(&mut states, id, StepTransition::Complete(Params::new()));
                        }
                    }
                }
                SchedulerStep::Skip(unreachable) => {
                    prop_assert!(!unreachable.is_empty());
                    for u in unreachable {
                        prop_assert!(!u.blocked_by.is_empty());
                        apply(&mut states, &u.step_id, StepTransition::Skip("blocked".into()));
                    }
                }
                SchedulerStep::Finished => break,
                other => prop_assert!(false, "unexpected scheduler step {:?}", other),
            }
        }

        // A step completes iff it is not failing and all its dependencies completed.
        for step in def.steps() {
            let status = states[&step.id].status();
            prop_assert!(status.is_terminal());
            let deps_ok = scheduler
                .graph()
                .dependencies_of(&step.id)
                .iter()
                .all(|d| states[d].status() == StepStatus::Completed);
            let expected = if !deps_ok {
                StepStatus::Skipped
            } else if failing.contains(&step.id) {
                StepStatus::Failed
            } else {
                StepStatus::Completed
            };
            prop_assert_eq!(status, expected, "step {}", step.id);
        }
    }
}
