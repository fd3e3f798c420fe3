use std::{cell::RefCell, rc::Rc, time::Duration};

use async_std::task::block_on;
use serde_json::json;
use tradedesk::{
  editor::flow::{parse_param, FlowGraph, NodeKind, Position},
  utils::debounce::DebouncedTask
};

const WINDOW: Duration = Duration::from_millis(20);

/// The flow builder's save timer with puts recorded instead of sent.
fn autosave() -> (Rc<RefCell<Vec<(String, FlowGraph)>>>, DebouncedTask<(String, FlowGraph)>) {
  let saves = Rc::new(RefCell::new(vec![]));
  let sink = saves.clone();
  let task = DebouncedTask::new(WINDOW, move |save: (String, FlowGraph)| {
    let sink = sink.clone();
    async move { sink.borrow_mut().push(save) }
  });
  (saves, task)
}

fn edited() -> FlowGraph {
  let mut flow = FlowGraph::default();
  let trigger = flow.add_node(NodeKind::Trigger, Position { x: 40.0, y: 40.0 });
  flow.set_param(&trigger, "symbol", parse_param("INFY"));
  flow
}

#[test]
fn switching_strategy_saves_the_pending_graph_under_its_own_id() {
  let (saves, task) = autosave();
  let graph = edited();
  let timer = task.schedule(("s1".to_string(), graph.clone()));

  // the next strategy's graph arrives inside the debounce window
  let save = task.flush().expect("an edit was pending");
  block_on(save);
  assert!(!block_on(timer));

  let saves = saves.borrow();
  assert_eq!(saves.len(), 1);
  assert_eq!(saves[0].0, "s1");
  assert_eq!(saves[0].1.nodes[0].params["symbol"], json!("INFY"));
}

#[test]
fn unmounting_with_nothing_pending_sends_nothing() {
  let (saves, task) = autosave();
  assert!(block_on(task.schedule(("s1".to_string(), edited()))));
  assert!(task.flush().is_none());
  assert_eq!(saves.borrow().len(), 1);
}

#[test]
fn a_flush_during_a_burst_sends_only_the_latest_graph() {
  let (saves, task) = autosave();
  let first = task.schedule(("s1".to_string(), FlowGraph::default()));
  let second = task.schedule(("s1".to_string(), edited()));

  let save = task.flush().expect("pending");
  block_on(save);
  let outcome = block_on(async { futures::join!(first, second) });
  assert_eq!(outcome, (false, false));
  assert_eq!(saves.borrow().len(), 1);
  assert_eq!(saves.borrow()[0].1.nodes.len(), 1);
}
