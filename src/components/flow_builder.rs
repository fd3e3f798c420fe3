use dioxus::{logger::tracing::{error, info}, prelude::*};
use serde_json::Value;
use tradedesk::{
  editor::flow::{param_text, parse_param, FlowGraph, FlowNode, NodeKind, Position},
  utils::{api::ApiClient, config::AppConfig, debounce::DebouncedTask, server::AppError, session::use_auth}
};
use crate::components::status::ErrorBanner;

const NODE_WIDTH: f64 = 140.0;
const NODE_HEIGHT: f64 = 48.0;

#[derive(Debug, Clone, PartialEq)]
struct Drag {
  node_id: String,
  dx: f64,
  dy: f64
}

fn node_class(node: &FlowNode, connecting: bool, selected: bool) -> String {
  let mut class = format!("flow-node kind-{}", node.kind.as_str());
  if connecting {
    class.push_str(" connecting");
  }
  if selected {
    class.push_str(" selected");
  }
  class
}

fn node_label(nodes: &[FlowNode], id: &str) -> String {
  nodes.iter().find(|n| n.id == id).map(|n| n.label.clone()).unwrap_or_else(|| id.to_string())
}

/// Drag-and-drop strategy graph, saved a moment after the last change.
#[component]
pub fn FlowBuilder(strategy_id: ReadOnlySignal<String>) -> Element {
  let mut auth = use_auth();
  let api = use_context::<ApiClient>();
  let config = use_context::<AppConfig>();
  let mut flow = use_signal(FlowGraph::default);
  let mut drag: Signal<Option<Drag>> = use_signal(|| None);
  let mut connect_from: Signal<Option<String>> = use_signal(|| None);
  let mut selected: Signal<Option<String>> = use_signal(|| None);
  let mut new_param = use_signal(String::new);
  let mut notice: Signal<Option<String>> = use_signal(|| None);
  let mut error: Signal<Option<AppError>> = use_signal(|| None);
  // the strategy the shown graph belongs to; edits are saved against it
  let mut loaded_for: Signal<Option<String>> = use_signal(|| None);

  let save_api = api.clone();
  let autosave = use_hook(move || DebouncedTask::new(config.autosave_debounce, move |(id, graph): (String, FlowGraph)| {
    let api = save_api.clone();
    let session = auth.session.peek().clone();
    async move {
      match api.put_visual_builder(&session, &id, &graph).await {
        Ok(_) => info!("flow for {} saved ({} nodes)", id, graph.nodes.len()),
        Err(e) => {
          error!("flow save failed: {}", e);
          let e = auth.intercept(e);
          // the builder may be gone by the time a flushed save fails
          if let Ok(mut slot) = error.try_write() {
            *slot = Some(e);
          }
        }
      }
    }
  }));

  // pending edits go out now instead of being dropped
  let flush = {
    let autosave = autosave.clone();
    move || {
      if let Some(save) = autosave.flush() {
        spawn_forever(save);
      }
    }
  };

  let load_api = api.clone();
  let loaded = use_resource(move || {
    let api = load_api.clone();
    let session = auth.session.read().clone();
    let id = strategy_id();
    async move {
      if id.is_empty() {
        return Ok((id, FlowGraph::default()));
      }
      let stored = api.get_visual_builder(&session, &id).await.map_err(|e| auth.intercept(e))?;
      Ok((id, FlowGraph::from_stored(stored.flow)?))
    }
  });

  let load_flush = flush.clone();
  use_effect(move || {
    match &*loaded.read() {
      Some(Ok((id, graph))) => {
        load_flush();
        flow.set(graph.clone());
        loaded_for.set(Some(id.clone()));
        selected.set(None);
        connect_from.set(None);
        error.set(None);
      },
      Some(Err(AppError::NotFound(_))) => {
        load_flush();
        flow.set(FlowGraph::default());
        loaded_for.set(Some(strategy_id.peek().clone()));
      },
      Some(Err(e)) => error.set(Some(e.clone())),
      None => {}
    }
  });

  let drop_flush = flush.clone();
  use_drop(move || drop_flush());

  let changed = {
    let autosave = autosave.clone();
    move || {
      let Some(id) = loaded_for.peek().clone().filter(|id| !id.is_empty()) else {
        return;
      };
      let pending = autosave.schedule((id, flow.peek().clone()));
      spawn(async move {
        pending.await;
      });
    }
  };

  let issues = flow.read().validate();
  let edges = flow.read().edges.clone();
  let nodes = flow.read().nodes.clone();
  let focused = selected().and_then(|id| nodes.iter().find(|n| n.id == id).cloned());

  rsx! {
    div {
      class: "flow-builder",
      div {
        class: "flow-palette",
        for kind in NodeKind::PALETTE {
          button {
            key: "{kind.as_str()}",
            onclick: {
              let kind = kind.clone();
              let changed = changed.clone();
              move |_| {
                let offset = 20.0 * flow.peek().nodes.len() as f64;
                flow.write().add_node(kind.clone(), Position { x: 40.0 + offset, y: 40.0 + offset });
                changed();
              }
            },
            "+ {kind.label()}"
          }
        }
      }
      div {
        class: "flow-canvas",
        onmousemove: move |evt| {
          let Some(d) = drag.peek().clone() else { return; };
          let p = evt.client_coordinates();
          flow.write().move_node(&d.node_id, Position { x: p.x - d.dx, y: p.y - d.dy });
        },
        onmouseup: {
          let changed = changed.clone();
          move |_| {
            if drag.take().is_some() {
              changed();
            }
          }
        },
        svg {
          class: "flow-edges",
          for edge in edges.iter() {
            if let (Some(a), Some(b)) = (nodes.iter().find(|n| n.id == edge.source), nodes.iter().find(|n| n.id == edge.target)) {
              line {
                key: "{edge.id}",
                x1: a.position.x + NODE_WIDTH,
                y1: a.position.y + NODE_HEIGHT / 2.0,
                x2: b.position.x,
                y2: b.position.y + NODE_HEIGHT / 2.0,
                stroke: "currentcolor"
              }
            }
          }
        }
        for node in nodes.iter() {
          div {
            key: "{node.id}",
            class: node_class(
              node,
              connect_from.read().as_deref() == Some(node.id.as_str()),
              selected.read().as_deref() == Some(node.id.as_str())
            ),
            style: "left: {node.position.x}px; top: {node.position.y}px;",
            onmousedown: {
              let id = node.id.clone();
              let origin = node.position;
              move |evt: MouseEvent| {
                let p = evt.client_coordinates();
                drag.set(Some(Drag { node_id: id.clone(), dx: p.x - origin.x, dy: p.y - origin.y }));
              }
            },
            span {
              class: "flow-node-label",
              onclick: {
                let id = node.id.clone();
                move |_| selected.set(Some(id.clone()))
              },
              "{node.label}"
            }
            button {
              title: "Connect",
              onclick: {
                let id = node.id.clone();
                let changed = changed.clone();
                move |evt: MouseEvent| {
                  evt.stop_propagation();
                  let source = connect_from.take();
                  match source {
                    None => connect_from.set(Some(id.clone())),
                    Some(source) if source == id => {},
                    Some(source) => {
                      let result = flow.write().connect(&source, &id);
                      match result {
                        Ok(_) => {
                          notice.set(None);
                          changed();
                        },
                        Err(issue) => notice.set(Some(issue.to_string()))
                      }
                    }
                  }
                }
              },
              "→"
            }
            button {
              title: "Remove",
              onclick: {
                let id = node.id.clone();
                let changed = changed.clone();
                move |evt: MouseEvent| {
                  evt.stop_propagation();
                  if flow.write().remove_node(&id) {
                    changed();
                  }
                }
              },
              "×"
            }
          }
        }
      }
      if let Some(node) = focused {
        div {
          class: "flow-params",
          h4 { "{node.label} parameters" }
          for (key, value) in node.params.iter() {
            label {
              key: "{key}",
              span { "{key}" }
              input {
                value: param_text(value),
                onchange: {
                  let (id, key) = (node.id.clone(), key.clone());
                  let changed = changed.clone();
                  move |evt: FormEvent| {
                    if flow.write().set_param(&id, &key, parse_param(&evt.value())) {
                      changed();
                    }
                  }
                }
              }
            }
          }
          form {
            class: "flow-param-add",
            onsubmit: {
              let id = node.id.clone();
              let changed = changed.clone();
              move |evt: FormEvent| {
                evt.prevent_default();
                let key = new_param.peek().trim().to_string();
                if key.is_empty() {
                  return;
                }
                if flow.write().set_param(&id, &key, Value::String(String::new())) {
                  new_param.set(String::new());
                  changed();
                }
              }
            },
            input { placeholder: "New parameter", value: "{new_param}", oninput: move |e| new_param.set(e.value()) }
            button { r#type: "submit", "Add" }
          }
        }
      }
      if !edges.is_empty() {
        ul {
          class: "flow-connections",
          for edge in edges.iter() {
            li {
              key: "{edge.id}",
              span { {format!("{} → {}", node_label(&nodes, &edge.source), node_label(&nodes, &edge.target))} }
              button {
                title: "Disconnect",
                onclick: {
                  let id = edge.id.clone();
                  let changed = changed.clone();
                  move |_| {
                    if flow.write().disconnect(&id) {
                      changed();
                    }
                  }
                },
                "×"
              }
            }
          }
        }
      }
      if let Some(msg) = notice() {
        p { class: "flow-notice", "{msg}" }
      }
      if !issues.is_empty() {
        ul {
          class: "flow-issues",
          for issue in issues.iter() {
            li { "{issue}" }
          }
        }
      }
      if let Some(err) = error() {
        ErrorBanner { error: err, on_retry: None }
      }
    }
  }
}
