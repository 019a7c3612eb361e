//! Skip propagation: a `condition` node's untaken branch, and everything
//! that transitively depends only on skipped nodes, is never dispatched.

use std::collections::BTreeSet;

use ice_blueprint::{Blueprint, NodeKindSpec};
use ice_context::BranchDecision;
use ice_core::NodeId;

/// Compute the full set of node ids to skip, given the branch decisions
/// recorded so far.
///
/// A node is skipped if it sits on the untaken side of some condition's
/// `true_branch`/`false_branch`, or if every one of its dependencies is
/// itself skipped (propagation through the DAG).
#[must_use]
pub fn compute_skipped(
    blueprint: &Blueprint,
    branch_decisions: &[BranchDecision],
) -> BTreeSet<NodeId> {
    let mut skipped = BTreeSet::new();

    for decision in branch_decisions {
        let Ok(condition_id) = NodeId::new(decision.node_id.clone()) else {
            continue;
        };
        let Some(node) = blueprint.node(&condition_id) else {
            continue;
        };
        let NodeKindSpec::Condition {
            true_branch,
            false_branch,
            ..
        } = &node.kind
        else {
            continue;
        };
        let untaken = if decision.taken {
            false_branch
        } else {
            true_branch
        };
        skipped.extend(untaken.iter().cloned());
    }

    // Propagate: a node depending only on skipped nodes is itself skipped,
    // iterated to a fixed point since propagation can cascade multiple
    // levels deep.
    loop {
        let mut grew = false;
        for node in &blueprint.nodes {
            if skipped.contains(&node.id) {
                continue;
            }
            if node.dependencies.is_empty() {
                continue;
            }
            if node.dependencies.iter().all(|dep| skipped.contains(dep)) {
                skipped.insert(node.id.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    skipped
}

/// Compute the set of node ids that transitively depend on a failed node,
/// given the ids that have already failed. Used only under
/// [`crate::config::FailurePolicy::ContinuePossible`]: `halt` stops the run
/// before a second level can see the failure, and `always` dispatches
/// these nodes anyway (their unresolved inputs fail them individually).
#[must_use]
pub fn compute_failure_skipped(blueprint: &Blueprint, failed_ids: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
    let mut skipped = BTreeSet::new();
    loop {
        let mut grew = false;
        for node in &blueprint.nodes {
            if skipped.contains(&node.id) || failed_ids.contains(&node.id) {
                continue;
            }
            if node.dependencies.iter().any(|dep| failed_ids.contains(dep) || skipped.contains(dep)) {
                skipped.insert(node.id.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ice_blueprint::{Blueprint, NodeKindSpec, NodeSpec};
    use ice_core::{BlueprintId, SchemaVersion};

    use super::*;

    fn node(id: &str, kind: NodeKindSpec, deps: &[&str]) -> NodeSpec {
        NodeSpec {
            id: NodeId::new(id).unwrap(),
            kind,
            dependencies: deps.iter().map(|d| NodeId::new(*d).unwrap()).collect(),
            input_mappings: BTreeMap::new(),
            output_schema: Some(serde_json::json!({})),
            input_schema: None,
            retries: 0,
            backoff_seconds: 0.0,
            timeout_seconds: None,
            provider: None,
        }
    }

    fn tool(name: &str) -> NodeKindSpec {
        NodeKindSpec::Tool {
            tool_name: name.into(),
            tool_args: BTreeMap::new(),
        }
    }

    #[test]
    fn untaken_branch_and_its_dependents_are_skipped() {
        let cond = node(
            "cond",
            NodeKindSpec::Condition {
                expression: "true".into(),
                true_branch: vec![NodeId::new("on_true").unwrap()],
                false_branch: vec![NodeId::new("on_false").unwrap()],
            },
            &[],
        );
        let on_true = node("on_true", tool("a"), &["cond"]);
        let on_false = node("on_false", tool("b"), &["cond"]);
        let after_false = node("after_false", tool("c"), &["on_false"]);

        let blueprint = Blueprint::try_new(
            SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
            BlueprintId::v4(),
            vec![cond, on_true, on_false, after_false],
            BTreeMap::new(),
        )
        .unwrap();

        let decisions = vec![BranchDecision {
            node_id: "cond".into(),
            taken: true,
        }];

        let skipped = compute_skipped(&blueprint, &decisions);
        assert!(skipped.contains(&NodeId::new("on_false").unwrap()));
        assert!(skipped.contains(&NodeId::new("after_false").unwrap()));
        assert!(!skipped.contains(&NodeId::new("on_true").unwrap()));
    }

    #[test]
    fn failure_skip_propagates_through_the_dependency_chain() {
        let failed = node("failed", tool("a"), &[]);
        let dependent = node("dependent", tool("b"), &["failed"]);
        let grandchild = node("grandchild", tool("c"), &["dependent"]);
        let unrelated = node("unrelated", tool("d"), &[]);

        let blueprint = Blueprint::try_new(
            SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
            BlueprintId::v4(),
            vec![failed, dependent, grandchild, unrelated],
            BTreeMap::new(),
        )
        .unwrap();

        let failed_ids = BTreeSet::from([NodeId::new("failed").unwrap()]);
        let skipped = compute_failure_skipped(&blueprint, &failed_ids);
        assert!(skipped.contains(&NodeId::new("dependent").unwrap()));
        assert!(skipped.contains(&NodeId::new("grandchild").unwrap()));
        assert!(!skipped.contains(&NodeId::new("unrelated").unwrap()));
        assert!(!skipped.contains(&NodeId::new("failed").unwrap()));
    }
}
