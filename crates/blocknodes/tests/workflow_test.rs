// crates/blocknodes/tests/workflow_test.rs

use blockcore::{
    block_types, Block, BlockId, ExecutionOutcome, SystemBlockCatalog, Workflow,
};
use blockruntime::{FlowRuntime, HandlerRegistry, RuntimeConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn runtime() -> FlowRuntime {
    let mut registry = HandlerRegistry::new();
    blocknodes::register_all(&mut registry);
    FlowRuntime::with_registry(
        Arc::new(registry),
        Arc::new(SystemBlockCatalog::standard()),
        RuntimeConfig::default(),
    )
}

fn block(workflow: &mut Workflow, name: &str, block_type: &str, config: serde_json::Value) -> BlockId {
    let catalog = SystemBlockCatalog::standard();
    let system_block_id = catalog.id_of(block_type).unwrap();
    workflow.add_block(Block::new(name, system_block_id).with_config(config))
}

/// Start -> Calculation(A + B -> C) -> End
fn adder() -> Workflow {
    let mut workflow = Workflow::new("adder");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let calc = block(
        &mut workflow,
        "Calculation",
        block_types::CALCULATION,
        json!({"Operation": "Add", "FirstVariable": "$A", "SecondVariable": "$B", "ResultVariable": "$C"}),
    );
    let end = block(&mut workflow, "End", block_types::END, json!({}));
    workflow.connect(start, calc);
    workflow.connect(calc, end);
    workflow.add_variable("A", Some("2"));
    workflow.add_variable("B", Some("3"));
    workflow.add_variable("C", Some(""));
    workflow
}

fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_adder_with_defaults() {
    let record = runtime().execute(&adder(), HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(record.result_data.get("C").map(String::as_str), Some("5"));
    assert_eq!(record.path, vec!["Start", "Calculation", "End"]);
    assert_eq!(record.actions.len(), 3);
    assert!(!record.truncated);
}

#[tokio::test]
async fn test_adder_with_overrides() {
    let record = runtime()
        .execute(&adder(), inputs(&[("A", "4"), ("B", "6")]))
        .await
        .unwrap();

    assert_eq!(record.result_data.get("C").map(String::as_str), Some("10"));
    assert_eq!(record.input_data.get("A").map(String::as_str), Some("4"));
    assert_eq!(record.input_data.get("B").map(String::as_str), Some("6"));
    assert_eq!(record.input_data.get("C").map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_trails() {
    let runtime = runtime();
    let workflow = adder();

    let first = runtime.execute(&workflow, inputs(&[("A", "1")])).await.unwrap();
    let second = runtime.execute(&workflow, inputs(&[("A", "1")])).await.unwrap();

    assert_eq!(first.path, second.path);
    assert_eq!(first.actions, second.actions);
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_switch_without_matching_case_is_dead_end() {
    let mut workflow = Workflow::new("switch");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let switch = block(&mut workflow, "Pick", block_types::SWITCH, json!({"Expression": "$color"}));
    let red = block(&mut workflow, "Red", block_types::END, json!({}));
    workflow.connect(start, switch);
    workflow.connect_labeled(switch, red, "red");
    workflow.add_variable("color", Some("blue"));

    let record = runtime().execute(&workflow, HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::DeadEnd);
    assert_eq!(record.path, vec!["Start", "Pick"]);
    assert!(record.actions[1].contains("blue"));
}

#[tokio::test]
async fn test_switch_follows_case_and_default() {
    let mut workflow = Workflow::new("switch");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let switch = block(&mut workflow, "Pick", block_types::SWITCH, json!({"Expression": "$color"}));
    let red = block(&mut workflow, "Red", block_types::END, json!({}));
    let other = block(&mut workflow, "Other", block_types::END, json!({}));
    workflow.connect(start, switch);
    workflow.connect_labeled(switch, red, "Red");
    workflow.connect_labeled(switch, other, "default");

    let runtime = runtime();
    let record = runtime.execute(&workflow, inputs(&[("color", "red")])).await.unwrap();
    assert_eq!(record.path.last().map(String::as_str), Some("Red"));

    let record = runtime.execute(&workflow, inputs(&[("color", "teal")])).await.unwrap();
    assert_eq!(record.path.last().map(String::as_str), Some("Other"));
}

#[tokio::test]
async fn test_condition_routes_success_and_error_edges() {
    let mut workflow = Workflow::new("condition");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let check = block(
        &mut workflow,
        "Big?",
        block_types::IF,
        json!({"DataType": "Number", "First": "$x", "Second": "10", "Comparison": "greater"}),
    );
    let big = block(&mut workflow, "Big", block_types::END, json!({}));
    let small = block(&mut workflow, "Small", block_types::END, json!({}));
    workflow.connect(start, check);
    workflow.connect(check, big);
    workflow.connect_on_error(check, small);

    let runtime = runtime();
    let record = runtime.execute(&workflow, inputs(&[("x", "5")])).await.unwrap();
    assert_eq!(record.path, vec!["Start", "Big?", "Small"]);

    let record = runtime.execute(&workflow, inputs(&[("x", "50")])).await.unwrap();
    assert_eq!(record.path, vec!["Start", "Big?", "Big"]);
}

#[tokio::test]
async fn test_loop_repeats_body_then_exits() {
    let mut workflow = Workflow::new("loop");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let repeat = block(
        &mut workflow,
        "Repeat",
        block_types::LOOP,
        json!({"Iterations": "$times", "CounterVariable": "i"}),
    );
    let body = block(
        &mut workflow,
        "Accumulate",
        block_types::CALCULATION,
        json!({"Operation": "Add", "FirstVariable": "$total", "SecondVariable": "$i", "ResultVariable": "total"}),
    );
    let end = block(&mut workflow, "End", block_types::END, json!({}));
    workflow.connect(start, repeat);
    workflow.connect_labeled(repeat, body, "loop");
    workflow.connect(body, repeat);
    workflow.connect_labeled(repeat, end, "exit");
    workflow.add_variable("times", Some("3"));
    workflow.add_variable("total", Some("0"));

    let record = runtime().execute(&workflow, HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(record.result_data.get("total").map(String::as_str), Some("6"));
    assert_eq!(record.path.iter().filter(|p| *p == "Accumulate").count(), 3);
    assert_eq!(record.path.last().map(String::as_str), Some("End"));
}

#[tokio::test]
async fn test_text_pipeline_with_parser() {
    let mut workflow = Workflow::new("text");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let parse = block(
        &mut workflow,
        "Parse",
        block_types::PARSER,
        json!({"Format": "json", "SourceVariable": "doc", "Mappings": [{"Path": "$.user.name", "Variable": "name"}]}),
    );
    let shout = block(
        &mut workflow,
        "Shout",
        block_types::TEXT_TRANSFORM,
        json!({"InputVariable": "name", "Operation": "upper", "ResultVariable": "loud"}),
    );
    let end = block(&mut workflow, "End", block_types::END, json!({}));
    workflow.connect(start, parse);
    workflow.connect(parse, shout);
    workflow.connect(shout, end);

    let record = runtime()
        .execute(&workflow, inputs(&[("doc", r#"{"user":{"name":"Ada"}}"#)]))
        .await
        .unwrap();

    assert_eq!(record.result_data.get("name").map(String::as_str), Some("Ada"));
    assert_eq!(record.result_data.get("loud").map(String::as_str), Some("ADA"));
    assert_eq!(record.input_data.get("doc").map(String::as_str), Some(r#"{"user":{"name":"Ada"}}"#));
}

#[tokio::test]
async fn test_unregistered_type_runs_through_fallback() {
    let standard = SystemBlockCatalog::standard();
    let custom = blockcore::SystemBlock::new("Notify", "Send a notification");
    let custom_id = custom.id;
    let catalog = SystemBlockCatalog::new(standard.iter().cloned().chain(std::iter::once(custom)));

    let mut registry = HandlerRegistry::new();
    blocknodes::register_all(&mut registry);
    let runtime = FlowRuntime::with_registry(Arc::new(registry), Arc::new(catalog), RuntimeConfig::default());

    let mut workflow = Workflow::new("fallback");
    let start = block(&mut workflow, "Start", block_types::START, json!({}));
    let notify = workflow.add_block(Block::new("", custom_id));
    let end = block(&mut workflow, "End", block_types::END, json!({}));
    workflow.connect(start, notify);
    workflow.connect(notify, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(record.actions[1], "Send a notification");
}

#[tokio::test]
async fn test_standard_handlers_cover_the_catalog() {
    let runtime = runtime();
    for block_type in block_types::ALL {
        assert!(
            runtime.registry().get_metadata(block_type).is_some(),
            "no handler for {}",
            block_type
        );
    }
}
