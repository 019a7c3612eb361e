//! End-to-end engine runs: a registered tool backend, a real blueprint,
//! and assertions on the resulting `RunSummary`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ice_blueprint::{Blueprint, NodeKindSpec, NodeSpec};
use ice_core::{BlueprintId, NodeId, RunId, SchemaVersion};
use ice_engine::{EngineConfig, FailurePolicy, RunStatus, WorkflowEngine};
use ice_eventbus::EventBus;
use ice_executor::{Dispatcher, ToolInvoker};
use ice_registry::{EntityClass, Registry};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

struct EchoTool;

#[async_trait]
impl ToolInvoker for EchoTool {
    async fn invoke(&self, _tool_name: &str, args: Value) -> Result<Value, String> {
        Ok(args)
    }
}

struct FailingTool;

#[async_trait]
impl ToolInvoker for FailingTool {
    async fn invoke(&self, _tool_name: &str, _args: Value) -> Result<Value, String> {
        Err("always fails".to_owned())
    }
}

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

fn tool_kind(name: &str, args: BTreeMap<String, Value>) -> NodeKindSpec {
    NodeKindSpec::Tool {
        tool_name: name.to_owned(),
        tool_args: args,
    }
}

fn engine_with_tool(invoker: Arc<dyn ToolInvoker>, name: &str) -> WorkflowEngine {
    let registry = Arc::new(Registry::new());
    registry
        .register_instance(EntityClass::Tool, name, Arc::new(invoker))
        .unwrap();
    let event_bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
    WorkflowEngine::new(dispatcher, event_bus, EngineConfig::default())
}

#[tokio::test]
async fn linear_chain_runs_every_node_and_wires_input_mappings() {
    let engine = engine_with_tool(Arc::new(EchoTool), "echo");

    let mut second_inputs = BTreeMap::new();
    second_inputs.insert(
        "upstream".to_owned(),
        ice_blueprint::InputMapping {
            source_node_id: NodeId::new("first").unwrap(),
            source_output_path: "greeting".to_owned(),
        },
    );

    let mut first = node("first", tool_kind("echo", BTreeMap::from([("greeting".to_owned(), serde_json::json!("hi"))])), &[]);
    first.output_schema = Some(serde_json::json!({}));
    let mut second = node(
        "second",
        tool_kind("echo", BTreeMap::from([("relayed".to_owned(), serde_json::json!("{{ upstream }}"))])),
        &["first"],
    );
    second.input_mappings = second_inputs;

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![first, second],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.node_results.len(), 2);
    assert!(summary.node_results["first"].success);
    assert!(summary.node_results["second"].success);
    assert_eq!(
        summary.node_results["second"].output.as_ref().and_then(|o| o.get("relayed")).cloned(),
        Some(serde_json::json!("hi"))
    );
}

#[tokio::test]
async fn condition_node_skips_the_untaken_branch() {
    let engine = engine_with_tool(Arc::new(EchoTool), "echo");

    let cond = node(
        "cond",
        NodeKindSpec::Condition {
            expression: "1 > 0".to_owned(),
            true_branch: vec![NodeId::new("on_true").unwrap()],
            false_branch: vec![NodeId::new("on_false").unwrap()],
        },
        &[],
    );
    let on_true = node("on_true", tool_kind("echo", BTreeMap::new()), &["cond"]);
    let on_false = node("on_false", tool_kind("echo", BTreeMap::new()), &["cond"]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![cond, on_true, on_false],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert!(summary.node_results.contains_key("on_true"));
    assert!(!summary.node_results.contains_key("on_false"));
    assert!(summary.skipped_node_ids.contains(&"on_false".to_owned()));
}

#[tokio::test]
async fn halt_policy_stops_after_a_failing_level() {
    let engine = engine_with_tool(Arc::new(FailingTool), "broken");

    let first = node("first", tool_kind("broken", BTreeMap::new()), &[]);
    let second = node("second", tool_kind("broken", BTreeMap::new()), &["first"]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![first, second],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert!(summary.node_results.contains_key("first"));
    assert!(!summary.node_results.contains_key("second"));
}

#[tokio::test]
async fn continue_possible_policy_still_runs_unrelated_branches() {
    let registry = Arc::new(Registry::new());
    registry
        .register_instance(EntityClass::Tool, "broken", Arc::new(Arc::new(FailingTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    registry
        .register_instance(EntityClass::Tool, "echo", Arc::new(Arc::new(EchoTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    let event_bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
    let config = EngineConfig {
        failure_policy: FailurePolicy::ContinuePossible,
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::new(dispatcher, event_bus, config);

    let failing = node("failing", tool_kind("broken", BTreeMap::new()), &[]);
    let independent = node("independent", tool_kind("echo", BTreeMap::new()), &[]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![failing, independent],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert!(!summary.node_results["failing"].success);
    assert!(summary.node_results["independent"].success);
}

#[tokio::test]
async fn continue_possible_policy_skips_a_failed_nodes_dependent() {
    let registry = Arc::new(Registry::new());
    registry
        .register_instance(EntityClass::Tool, "broken", Arc::new(Arc::new(FailingTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    let event_bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
    let config = EngineConfig {
        failure_policy: FailurePolicy::ContinuePossible,
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::new(dispatcher, event_bus, config);

    let failing = node("failing", tool_kind("broken", BTreeMap::new()), &[]);
    let dependent = node("dependent", tool_kind("broken", BTreeMap::new()), &["failing"]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![failing, dependent],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.node_results["failing"].success);
    assert!(!summary.node_results.contains_key("dependent"));
    assert!(summary.skipped_node_ids.contains(&"dependent".to_owned()));
}

#[tokio::test]
async fn always_policy_dispatches_a_failed_nodes_dependent_anyway() {
    let registry = Arc::new(Registry::new());
    registry
        .register_instance(EntityClass::Tool, "broken", Arc::new(Arc::new(FailingTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    registry
        .register_instance(EntityClass::Tool, "echo", Arc::new(Arc::new(EchoTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    let event_bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
    let config = EngineConfig {
        failure_policy: FailurePolicy::Always,
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::new(dispatcher, event_bus, config);

    let failing = node("failing", tool_kind("broken", BTreeMap::new()), &[]);
    let mut dependent = node("dependent", tool_kind("echo", BTreeMap::new()), &["failing"]);
    dependent.input_mappings.insert(
        "upstream".to_owned(),
        ice_blueprint::InputMapping { source_node_id: NodeId::new("failing").unwrap(), source_output_path: "x".to_owned() },
    );

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![failing, dependent],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.node_results["failing"].success);
    assert!(summary.node_results.contains_key("dependent"));
    assert!(!summary.node_results["dependent"].success);
}

#[tokio::test]
async fn depth_ceiling_aborts_a_run_with_too_many_levels() {
    let engine_with_ceiling = |ceiling: u32| {
        let registry = Arc::new(Registry::new());
        registry
            .register_instance(EntityClass::Tool, "echo", Arc::new(Arc::new(EchoTool) as Arc<dyn ToolInvoker>))
            .unwrap();
        let event_bus = Arc::new(EventBus::new());
        let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
        let config = EngineConfig { depth_ceiling: Some(ceiling), ..EngineConfig::default() };
        WorkflowEngine::new(dispatcher, event_bus, config)
    };
    let engine = engine_with_ceiling(1);

    let first = node("first", tool_kind("echo", BTreeMap::new()), &[]);
    let second = node("second", tool_kind("echo", BTreeMap::new()), &["first"]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![first, second],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Aborted);
    assert!(summary.node_results.contains_key("first"));
    assert!(!summary.node_results.contains_key("second"));
}

#[tokio::test]
async fn monitor_abort_cancels_the_run_before_later_levels_dispatch() {
    let registry = Arc::new(Registry::new());
    registry
        .register_instance(EntityClass::Tool, "echo", Arc::new(Arc::new(EchoTool) as Arc<dyn ToolInvoker>))
        .unwrap();
    let event_bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(registry, Arc::clone(&event_bus));
    let engine = WorkflowEngine::new(dispatcher, event_bus, EngineConfig::default());

    let watchdog = node(
        "watchdog",
        NodeKindSpec::Monitor {
            metric_expression: "true".to_owned(),
            action_on_trigger: ice_blueprint::ActionOnTrigger::Abort,
            alert_channels: vec![],
        },
        &[],
    );
    let after = node("after", tool_kind("echo", BTreeMap::new()), &["watchdog"]);

    let blueprint = Blueprint::try_new(
        SchemaVersion::try_from("1.1.0".to_owned()).unwrap(),
        BlueprintId::v4(),
        vec![watchdog, after],
        BTreeMap::new(),
    )
    .unwrap();

    let summary = engine
        .execute(&blueprint, RunId::v4(), BTreeMap::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert!(summary.node_results.contains_key("watchdog"));
    assert!(!summary.node_results.contains_key("after"));
}
