use std::{collections::{HashMap, HashSet}, fmt};
use dioxus::logger::tracing::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::utils::server::AppError;

pub const FLOW_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
  Trigger,
  Indicator,
  Condition,
  Action,
  Risk,
  Custom(String),
}

impl NodeKind {
  pub const PALETTE: [NodeKind; 5] = [NodeKind::Trigger, NodeKind::Indicator, NodeKind::Condition, NodeKind::Action, NodeKind::Risk];

  pub fn as_str(&self) -> &str {
    match self {
      NodeKind::Trigger => "trigger",
      NodeKind::Indicator => "indicator",
      NodeKind::Condition => "condition",
      NodeKind::Action => "action",
      NodeKind::Risk => "risk",
      NodeKind::Custom(s) => s
    }
  }

  /// Parameters a freshly placed node starts with, so the panel shows what
  /// the kind expects.
  pub fn default_params(&self) -> Map<String, Value> {
    let defaults = match self {
      NodeKind::Trigger => json!({"symbol": "", "timeframe": "5m"}),
      NodeKind::Indicator => json!({"name": "SMA", "period": 20}),
      NodeKind::Condition => json!({"left": "", "operator": ">", "right": ""}),
      NodeKind::Action => json!({"side": "BUY", "quantity": 1}),
      NodeKind::Risk => json!({"stop_loss_pct": 1.0, "take_profit_pct": 2.0}),
      NodeKind::Custom(_) => json!({})
    };
    match defaults {
      Value::Object(map) => map,
      _ => Map::new()
    }
  }

  pub fn label(&self) -> String {
    let s = self.as_str();
    let mut chars = s.chars();
    match chars.next() {
      Some(first) => first.to_uppercase().chain(chars).collect(),
      None => String::new()
    }
  }
}

impl From<String> for NodeKind {
  fn from(value: String) -> Self {
    match value.to_ascii_lowercase().as_str() {
      // legacy block types
      "trigger" | "start" | "entry" => NodeKind::Trigger,
      "indicator" => NodeKind::Indicator,
      "condition" | "logic" => NodeKind::Condition,
      "action" | "order" => NodeKind::Action,
      "risk" | "stop_loss" | "risk_management" => NodeKind::Risk,
      _ => NodeKind::Custom(value)
    }
  }
}

impl From<NodeKind> for String {
  fn from(kind: NodeKind) -> Self {
    kind.as_str().to_string()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
  pub id: String,
  pub kind: NodeKind,
  #[serde(default)]
  pub label: String,
  #[serde(default)]
  pub position: Position,
  #[serde(default)]
  pub params: Map<String, Value>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
  pub id: String,
  pub source: String,
  pub target: String
}

/// Current (v2) visual strategy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
  #[serde(default = "current_version")]
  pub version: u32,
  #[serde(default)]
  pub nodes: Vec<FlowNode>,
  #[serde(default)]
  pub edges: Vec<FlowEdge>
}

fn current_version() -> u32 {
  FLOW_VERSION
}

impl Default for FlowGraph {
  fn default() -> Self {
    Self { version: FLOW_VERSION, nodes: vec![], edges: vec![] }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowIssue {
  UnknownNode(String),
  SelfLoop(String),
  DuplicateEdge { source: String, target: String },
  Cycle { source: String, target: String },
  DuplicateNodeId(String),
  DanglingEdge(String),
  MissingTrigger,
}

impl fmt::Display for FlowIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FlowIssue::UnknownNode(id) => write!(f, "Unknown node {}", id),
      FlowIssue::SelfLoop(id) => write!(f, "Node {} cannot connect to itself", id),
      FlowIssue::DuplicateEdge { source, target } => write!(f, "{} is already connected to {}", source, target),
      FlowIssue::Cycle { source, target } => write!(f, "Connecting {} to {} would create a loop", source, target),
      FlowIssue::DuplicateNodeId(id) => write!(f, "Node id {} is used more than once", id),
      FlowIssue::DanglingEdge(id) => write!(f, "Connection {} points at a missing node", id),
      FlowIssue::MissingTrigger => write!(f, "The flow needs a trigger node"),
    }
  }
}

#[derive(Debug, Deserialize)]
struct LegacyFlow {
  #[serde(default)]
  blocks: Vec<LegacyBlock>,
  #[serde(default)]
  connections: Vec<LegacyConnection>
}

#[derive(Debug, Deserialize)]
struct LegacyBlock {
  id: Value,
  #[serde(alias = "type", alias = "blockType")]
  block_type: String,
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  x: f64,
  #[serde(default)]
  y: f64,
  #[serde(default, alias = "config", alias = "settings")]
  params: Map<String, Value>
}

#[derive(Debug, Deserialize)]
struct LegacyConnection {
  #[serde(alias = "source", alias = "fromId")]
  from: Value,
  #[serde(alias = "target", alias = "toId")]
  to: Value
}

fn id_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string()
  }
}

/// Typed value for a parameter typed into a text field: numbers and
/// booleans keep their JSON type, anything else stays text.
pub fn parse_param(raw: &str) -> Value {
  let trimmed = raw.trim();
  match trimmed {
    "true" => return Value::Bool(true),
    "false" => return Value::Bool(false),
    _ => {}
  }
  if let Ok(n) = trimmed.parse::<i64>() {
    return Value::from(n);
  }
  match trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
    Some(f) => Value::from(f),
    None => Value::String(raw.to_string())
  }
}

/// Text shown in a parameter field.
pub fn param_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string()
  }
}

impl FlowGraph {
  /// Reads whatever the server stored: the current model, the legacy
  /// `blocks`/`connections` model, or nothing at all.
  pub fn from_stored(value: Value) -> Result<Self, AppError> {
    let is_legacy = value.get("blocks").is_some() && value.get("nodes").is_none();
    match value {
      Value::Null => Ok(Self::default()),
      Value::Object(ref map) if map.is_empty() => Ok(Self::default()),
      v if is_legacy => {
        let legacy: LegacyFlow = serde_json::from_value(v).map_err(|e| AppError::DeserializeError(e.to_string()))?;
        Ok(Self::migrate(legacy))
      },
      v => serde_json::from_value(v).map_err(|e| AppError::DeserializeError(e.to_string()))
    }
  }

  fn migrate(legacy: LegacyFlow) -> Self {
    info!("migrating legacy flow with {} blocks", legacy.blocks.len());
    let nodes = legacy.blocks.into_iter().map(|b| {
      let kind = NodeKind::from(b.block_type);
      FlowNode {
        id: id_string(&b.id),
        label: b.name.unwrap_or_else(|| kind.label()),
        kind,
        position: Position { x: b.x, y: b.y },
        params: b.params
      }
    }).collect();
    let edges = legacy.connections.into_iter().enumerate().map(|(i, c)| FlowEdge {
      id: format!("e{}", i + 1),
      source: id_string(&c.from),
      target: id_string(&c.to)
    }).collect();
    Self { version: FLOW_VERSION, nodes, edges }
  }

  pub fn node(&self, id: &str) -> Option<&FlowNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn add_node(&mut self, kind: NodeKind, position: Position) -> String {
    let id = format!("{}-{}", kind.as_str(), &Uuid::new_v4().simple().to_string()[..8]);
    self.nodes.push(FlowNode { id: id.clone(), label: kind.label(), params: kind.default_params(), kind, position });
    id
  }

  pub fn move_node(&mut self, id: &str, position: Position) -> bool {
    match self.nodes.iter_mut().find(|n| n.id == id) {
      Some(node) => {
        node.position = position;
        true
      },
      None => false
    }
  }

  pub fn set_param(&mut self, id: &str, key: &str, value: Value) -> bool {
    match self.nodes.iter_mut().find(|n| n.id == id) {
      Some(node) => {
        node.params.insert(key.to_string(), value);
        true
      },
      None => false
    }
  }

  /// Removes the node and every edge touching it.
  pub fn remove_node(&mut self, id: &str) -> bool {
    let before = self.nodes.len();
    self.nodes.retain(|n| n.id != id);
    self.edges.retain(|e| e.source != id && e.target != id);
    self.nodes.len() != before
  }

  pub fn connect(&mut self, source: &str, target: &str) -> Result<String, FlowIssue> {
    for id in [source, target] {
      if self.node(id).is_none() {
        return Err(FlowIssue::UnknownNode(id.to_string()));
      }
    }
    if source == target {
      return Err(FlowIssue::SelfLoop(source.to_string()));
    }
    if self.edges.iter().any(|e| e.source == source && e.target == target) {
      return Err(FlowIssue::DuplicateEdge { source: source.to_string(), target: target.to_string() });
    }
    if self.reaches(target, source) {
      return Err(FlowIssue::Cycle { source: source.to_string(), target: target.to_string() });
    }
    let id = format!("e-{}-{}", source, target);
    self.edges.push(FlowEdge { id: id.clone(), source: source.to_string(), target: target.to_string() });
    Ok(id)
  }

  pub fn disconnect(&mut self, edge_id: &str) -> bool {
    let before = self.edges.len();
    self.edges.retain(|e| e.id != edge_id);
    self.edges.len() != before
  }

  fn reaches(&self, from: &str, to: &str) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in &self.edges {
      adjacency.entry(e.source.as_str()).or_default().push(e.target.as_str());
    }
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
      if node == to {
        return true;
      }
      if seen.insert(node) {
        stack.extend(adjacency.get(node).into_iter().flatten());
      }
    }
    false
  }

  /// Problems that keep the flow from being turned into a strategy. Empty
  /// means valid; an empty graph only lacks a trigger.
  pub fn validate(&self) -> Vec<FlowIssue> {
    let mut issues = vec![];
    let mut ids = HashSet::new();
    for node in &self.nodes {
      if !ids.insert(node.id.as_str()) {
        issues.push(FlowIssue::DuplicateNodeId(node.id.clone()));
      }
    }
    for edge in &self.edges {
      if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
        issues.push(FlowIssue::DanglingEdge(edge.id.clone()));
      } else if edge.source == edge.target {
        issues.push(FlowIssue::SelfLoop(edge.source.clone()));
      }
    }
    if !self.nodes.iter().any(|n| n.kind == NodeKind::Trigger) {
      issues.push(FlowIssue::MissingTrigger);
    }
    issues
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(x: f64, y: f64) -> Position {
    Position { x, y }
  }

  #[test]
  fn connect_rejects_loops_and_duplicates() {
    let mut flow = FlowGraph::default();
    let a = flow.add_node(NodeKind::Trigger, at(0.0, 0.0));
    let b = flow.add_node(NodeKind::Condition, at(100.0, 0.0));
    let c = flow.add_node(NodeKind::Action, at(200.0, 0.0));

    flow.connect(&a, &b).unwrap();
    flow.connect(&b, &c).unwrap();
    assert!(matches!(flow.connect(&a, &b), Err(FlowIssue::DuplicateEdge { .. })));
    assert!(matches!(flow.connect(&c, &a), Err(FlowIssue::Cycle { .. })));
    assert!(matches!(flow.connect(&b, &b), Err(FlowIssue::SelfLoop(_))));
    assert!(matches!(flow.connect(&a, "nope"), Err(FlowIssue::UnknownNode(_))));
    assert!(flow.validate().is_empty());
  }

  #[test]
  fn removing_a_node_drops_its_edges() {
    let mut flow = FlowGraph::default();
    let a = flow.add_node(NodeKind::Trigger, at(0.0, 0.0));
    let b = flow.add_node(NodeKind::Action, at(1.0, 1.0));
    flow.connect(&a, &b).unwrap();
    assert!(flow.remove_node(&b));
    assert!(flow.edges.is_empty());
    assert!(!flow.remove_node(&b));
  }

  #[test]
  fn new_nodes_carry_their_kind_defaults_and_params_can_change() {
    let mut flow = FlowGraph::default();
    let ind = flow.add_node(NodeKind::Indicator, at(0.0, 0.0));
    assert_eq!(flow.node(&ind).unwrap().params["period"], json!(20));

    assert!(flow.set_param(&ind, "period", parse_param("50")));
    assert!(flow.set_param(&ind, "source", parse_param("close")));
    let params = &flow.node(&ind).unwrap().params;
    assert_eq!(params["period"], json!(50));
    assert_eq!(params["source"], json!("close"));
    assert!(!flow.set_param("ghost", "period", json!(1)));
  }

  #[test]
  fn param_text_round_trips_through_parse() {
    assert_eq!(parse_param("1.5"), json!(1.5));
    assert_eq!(parse_param(" true "), json!(true));
    assert_eq!(parse_param("NaN"), json!("NaN"));
    assert_eq!(parse_param("RELIANCE"), json!("RELIANCE"));
    assert_eq!(param_text(&json!("RELIANCE")), "RELIANCE");
    assert_eq!(param_text(&json!(20)), "20");
  }

  #[test]
  fn disconnect_removes_only_that_edge() {
    let mut flow = FlowGraph::default();
    let a = flow.add_node(NodeKind::Trigger, at(0.0, 0.0));
    let b = flow.add_node(NodeKind::Condition, at(1.0, 0.0));
    let c = flow.add_node(NodeKind::Action, at(2.0, 0.0));
    let ab = flow.connect(&a, &b).unwrap();
    flow.connect(&b, &c).unwrap();

    assert!(flow.disconnect(&ab));
    assert_eq!(flow.edges.len(), 1);
    assert!(!flow.disconnect(&ab));
    // the freed pair can be joined again
    assert!(flow.connect(&a, &b).is_ok());
  }

  #[test]
  fn validate_reports_structural_problems() {
    let flow = FlowGraph {
      version: FLOW_VERSION,
      nodes: vec![
        FlowNode { id: "n1".into(), kind: NodeKind::Action, label: String::new(), position: at(0.0, 0.0), params: Map::new() },
        FlowNode { id: "n1".into(), kind: NodeKind::Condition, label: String::new(), position: at(0.0, 0.0), params: Map::new() },
      ],
      edges: vec![FlowEdge { id: "e1".into(), source: "n1".into(), target: "ghost".into() }]
    };
    let issues = flow.validate();
    assert!(issues.contains(&FlowIssue::DuplicateNodeId("n1".into())));
    assert!(issues.contains(&FlowIssue::DanglingEdge("e1".into())));
    assert!(issues.contains(&FlowIssue::MissingTrigger));
  }

  #[test]
  fn legacy_blocks_are_migrated() {
    let stored = json!({
      "blocks": [
        {"id": 1, "type": "entry", "x": 10, "y": 20, "config": {"symbol": "INFY"}},
        {"id": 2, "type": "order", "x": 200, "y": 20}
      ],
      "connections": [{"from": 1, "to": 2}]
    });
    let flow = FlowGraph::from_stored(stored).unwrap();
    assert_eq!(flow.version, FLOW_VERSION);
    assert_eq!(flow.nodes[0].kind, NodeKind::Trigger);
    assert_eq!(flow.nodes[0].params["symbol"], json!("INFY"));
    assert_eq!(flow.nodes[1].kind, NodeKind::Action);
    assert_eq!(flow.edges[0].source, "1");
    assert_eq!(flow.edges[0].target, "2");
    assert!(flow.validate().is_empty());
  }

  #[test]
  fn current_model_and_empty_values_load() {
    assert_eq!(FlowGraph::from_stored(Value::Null).unwrap(), FlowGraph::default());
    assert_eq!(FlowGraph::from_stored(json!({})).unwrap(), FlowGraph::default());

    let stored = json!({
      "nodes": [{"id": "t", "kind": "trigger", "position": {"x": 1, "y": 2}}, {"id": "x", "kind": "webhook"}],
      "edges": []
    });
    let flow = FlowGraph::from_stored(stored).unwrap();
    assert_eq!(flow.nodes[1].kind, NodeKind::Custom("webhook".to_string()));
    assert_eq!(serde_json::to_value(&flow).unwrap()["nodes"][1]["kind"], json!("webhook"));
  }
}
