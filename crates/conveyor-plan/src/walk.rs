//! Generic traversal over compiled plan trees.
//!
//! The walker visits every reachable node exactly once, parent before
//! children. Get/Put/Check/Task/SetPipeline/LoadVar are leaves. On top of it
//! sit the rewriting passes (ID stripping, resource-type annotation) and the
//! ID-agnostic structural matcher used by tests and the UI.

use conveyor_types::VersionedResourceTypes;

use crate::plan::{Plan, PlanId, PlanStep};

/// Visit `plan` and every node below it, parents first.
pub fn walk<F: FnMut(&Plan)>(plan: &Plan, visit: &mut F) {
    visit(plan);
    match &plan.step {
        PlanStep::Do(children) | PlanStep::Aggregate(children) | PlanStep::Retry(children) => {
            for child in children {
                walk(child, visit);
            }
        }
        PlanStep::InParallel(ip) => {
            for child in &ip.steps {
                walk(child, visit);
            }
        }
        PlanStep::Try(child) => walk(child, visit),
        PlanStep::Timeout(t) => walk(&t.step, visit),
        PlanStep::Interrupt(i) => walk(&i.step, visit),
        PlanStep::OnSuccess(h)
        | PlanStep::OnFailure(h)
        | PlanStep::OnAbort(h)
        | PlanStep::OnError(h)
        | PlanStep::Ensure(h) => {
            walk(&h.step, visit);
            walk(&h.next, visit);
        }
        PlanStep::Get(_)
        | PlanStep::Put(_)
        | PlanStep::Check(_)
        | PlanStep::Task(_)
        | PlanStep::SetPipeline(_)
        | PlanStep::LoadVar(_) => {}
    }
}

/// Mutable traversal for in-place rewriting passes. Node fields may change;
/// the tree structure must not.
pub fn walk_mut<F: FnMut(&mut Plan)>(plan: &mut Plan, visit: &mut F) {
    visit(plan);
    match &mut plan.step {
        PlanStep::Do(children) | PlanStep::Aggregate(children) | PlanStep::Retry(children) => {
            for child in children {
                walk_mut(child, visit);
            }
        }
        PlanStep::InParallel(ip) => {
            for child in &mut ip.steps {
                walk_mut(child, visit);
            }
        }
        PlanStep::Try(child) => walk_mut(child, visit),
        PlanStep::Timeout(t) => walk_mut(&mut t.step, visit),
        PlanStep::Interrupt(i) => walk_mut(&mut i.step, visit),
        PlanStep::OnSuccess(h)
        | PlanStep::OnFailure(h)
        | PlanStep::OnAbort(h)
        | PlanStep::OnError(h)
        | PlanStep::Ensure(h) => {
            walk_mut(&mut h.step, visit);
            walk_mut(&mut h.next, visit);
        }
        PlanStep::Get(_)
        | PlanStep::Put(_)
        | PlanStep::Check(_)
        | PlanStep::Task(_)
        | PlanStep::SetPipeline(_)
        | PlanStep::LoadVar(_) => {}
    }
}

/// All node IDs in visit order.
pub fn collect_ids(plan: &Plan) -> Vec<PlanId> {
    let mut ids = Vec::new();
    walk(plan, &mut |node| ids.push(node.id.clone()));
    ids
}

/// Blank out every ID, including `version_from` backlinks (they hold IDs
/// too; a presence marker survives so paired and unpaired gets still differ).
pub fn strip_ids(plan: &mut Plan) {
    walk_mut(plan, &mut |node| {
        node.id.clear();
        if let PlanStep::Get(get) = &mut node.step {
            if get.version_from.is_some() {
                get.version_from = Some(PlanId::new());
            }
        }
    });
}

/// Structural equality that ignores ID values.
pub fn matches_ignoring_ids(a: &Plan, b: &Plan) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    strip_ids(&mut a);
    strip_ids(&mut b);
    a == b
}

/// Denormalize `types` into every resource-touching node of an existing
/// tree. Compilation already does this for the trees it builds; this pass
/// covers externally-constructed plans (check plans, engine-synthesized
/// subtrees) before they are shipped to workers.
pub fn attach_resource_types(plan: &mut Plan, types: &VersionedResourceTypes) {
    walk_mut(plan, &mut |node| {
        if let Some(slot) = node.step.resource_types_mut() {
            *slot = types.clone();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{
        CheckPlan, GetPlan, HookPlan, InParallelPlan, LoadVarPlan, TimeoutPlan,
    };
    use conveyor_types::{Source, VersionedResourceType};

    fn load_var(id: &str, name: &str) -> Plan {
        Plan {
            id: id.into(),
            step: PlanStep::LoadVar(LoadVarPlan {
                name: name.into(),
                file: "f".into(),
                format: None,
                reveal: false,
            }),
        }
    }

    /// One tree touching every composite variant.
    fn kitchen_sink() -> Plan {
        Plan {
            id: "9".into(),
            step: PlanStep::Ensure(HookPlan {
                step: Box::new(Plan {
                    id: "8".into(),
                    step: PlanStep::Do(vec![
                        Plan {
                            id: "7".into(),
                            step: PlanStep::Retry(vec![load_var("1", "a"), load_var("2", "a")]),
                        },
                        Plan {
                            id: "6".into(),
                            step: PlanStep::InParallel(InParallelPlan {
                                steps: vec![Plan {
                                    id: "5".into(),
                                    step: PlanStep::Timeout(TimeoutPlan {
                                        step: Box::new(load_var("4", "b")),
                                        duration: "1m".into(),
                                    }),
                                }],
                                limit: Some(1),
                                fail_fast: false,
                            }),
                        },
                    ]),
                }),
                next: Box::new(Plan {
                    id: "11".into(),
                    step: PlanStep::Try(Box::new(load_var("10", "c"))),
                }),
            }),
        }
    }

    #[test]
    fn walk_visits_every_node_exactly_once() {
        let ids = collect_ids(&kitchen_sink());
        assert_eq!(ids.len(), 10);
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
    }

    #[test]
    fn walk_visits_parent_before_children() {
        let plan = kitchen_sink();
        let ids = collect_ids(&plan);
        assert_eq!(ids[0], "9");
        // The hook's step side is visited before its next side.
        let step_pos = ids.iter().position(|i| i == "8").unwrap();
        let next_pos = ids.iter().position(|i| i == "11").unwrap();
        assert!(step_pos < next_pos);
    }

    #[test]
    fn leaves_do_not_recurse() {
        let get = Plan {
            id: "1".into(),
            step: PlanStep::Get(GetPlan::default()),
        };
        assert_eq!(collect_ids(&get), vec!["1".to_string()]);

        let check = Plan {
            id: "2".into(),
            step: PlanStep::Check(CheckPlan::default()),
        };
        assert_eq!(collect_ids(&check), vec!["2".to_string()]);
    }

    #[test]
    fn strip_ids_blanks_every_node() {
        let mut plan = kitchen_sink();
        strip_ids(&mut plan);
        walk(&plan, &mut |node| assert!(node.id.is_empty()));
    }

    #[test]
    fn strip_ids_keeps_version_from_presence() {
        let mut paired = Plan {
            id: "2".into(),
            step: PlanStep::Get(GetPlan {
                version_from: Some("1".into()),
                ..GetPlan::default()
            }),
        };
        let mut unpaired = Plan {
            id: "2".into(),
            step: PlanStep::Get(GetPlan::default()),
        };
        strip_ids(&mut paired);
        strip_ids(&mut unpaired);
        assert_ne!(paired, unpaired);
    }

    #[test]
    fn matcher_ignores_id_values_only() {
        let a = kitchen_sink();
        let mut b = kitchen_sink();
        // Renumber every node.
        let mut n = 100;
        walk_mut(&mut b, &mut |node| {
            node.id = n.to_string();
            n += 1;
        });
        assert!(matches_ignoring_ids(&a, &b));

        // A structural difference is still caught.
        let c = load_var("1", "different");
        assert!(!matches_ignoring_ids(&a, &c));
    }

    #[test]
    fn matcher_is_field_sensitive() {
        let a = load_var("1", "x");
        let mut b = load_var("2", "x");
        assert!(matches_ignoring_ids(&a, &b));
        if let PlanStep::LoadVar(lv) = &mut b.step {
            lv.file = "other".into();
        }
        assert!(!matches_ignoring_ids(&a, &b));
    }

    #[test]
    fn attach_resource_types_reaches_nested_resource_nodes() {
        let types = vec![VersionedResourceType {
            name: "custom".into(),
            type_name: "registry-image".into(),
            source: Source::new(),
            version: None,
        }];

        let mut plan = Plan {
            id: "3".into(),
            step: PlanStep::Do(vec![
                Plan {
                    id: "1".into(),
                    step: PlanStep::Get(GetPlan::default()),
                },
                load_var("2", "v"),
            ]),
        };
        attach_resource_types(&mut plan, &types);

        walk(&plan, &mut |node| match &node.step {
            PlanStep::Get(get) => assert_eq!(get.resource_types, types),
            PlanStep::LoadVar(_) | PlanStep::Do(_) => {}
            other => panic!("unexpected node {other:?}"),
        });
    }

    #[test]
    fn walk_mut_preserves_structure() {
        let mut plan = kitchen_sink();
        let before = collect_ids(&plan).len();
        walk_mut(&mut plan, &mut |node| {
            node.id.push('x');
        });
        assert_eq!(collect_ids(&plan).len(), before);
    }
}
