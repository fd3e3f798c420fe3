use charming::{
  component::{Axis, DataZoom, Grid, Title},
  element::{AxisType, TextStyle, Tooltip, Trigger},
  series::{Candlestick, Line},
  Chart, WasmRenderer
};
use dioxus::{logger::tracing::warn, prelude::*};
use tradedesk::utils::{
  chartdata::{candle_series, equity_series, price_bounds, resize_observer_script},
  models::{Candle, EquityPoint}
};

static CANVAS_ID_CANDLES: &str = "ohlc-candles";
static CANVAS_ID_EQUITY: &str = "equity-curve";

fn title(text: &str) -> Title {
  Title::new()
    .text(text)
    .text_style(
      TextStyle::new()
      .color("rgba(255, 255, 255, 1)")
      .font_family("Arial")
      .font_size(16)
    )
}

#[component]
pub fn CandlestickChart(candles: ReadOnlySignal<Vec<Candle>>, interval: ReadOnlySignal<Option<String>>) -> Element {
  let renderer = use_signal(|| WasmRenderer::new_opt(None, Some(350)));

  use_effect(move || {
    let candles = candles.read();
    if candles.is_empty() {
      return;
    }
    let (labels, points) = candle_series(&candles);
    let heading = match interval() {
      Some(i) => format!("Price ({})", i),
      None => "Price".to_string()
    };

    let mut y_axis = Axis::new().type_(AxisType::Value).scale(true);
    if let Some((lo, hi)) = price_bounds(&candles) {
      y_axis = y_axis.min(lo).max(hi);
    }

    let chart = Chart::new()
      .title(title(&heading))
      .background_color("rgba(41,52,65,1)")
      .tooltip(Tooltip::new().trigger(Trigger::Axis))
      .grid(Grid::new().left("8%").right("4%").bottom("18%").contain_label(true))
      .data_zoom(DataZoom::new().start(60).end(100))
      .x_axis(Axis::new().type_(AxisType::Category).data(labels))
      .y_axis(y_axis)
      .series(Candlestick::new().name("OHLC").data(points));

    if let Err(e) = renderer.read_unchecked().render(CANVAS_ID_CANDLES, &chart) {
      warn!("candlestick render failed: {:?}", e);
    }
  });

  rsx! {
    div {
      id: CANVAS_ID_CANDLES,
      class: "chart",
      onmounted: move |_| { document::eval(&resize_observer_script(CANVAS_ID_CANDLES)); }
    }
  }
}

#[component]
pub fn EquityChart(curve: ReadOnlySignal<Vec<EquityPoint>>) -> Element {
  let renderer = use_signal(|| WasmRenderer::new_opt(None, Some(300)));

  use_effect(move || {
    let curve = curve.read();
    if curve.is_empty() {
      return;
    }
    let (labels, points) = equity_series(&curve);

    let chart = Chart::new()
      .title(title("Equity curve"))
      .background_color("rgba(41,52,65,1)")
      .tooltip(Tooltip::new().trigger(Trigger::Axis))
      .grid(Grid::new().left("8%").right("4%").contain_label(true))
      .x_axis(Axis::new().type_(AxisType::Category).data(labels))
      .y_axis(Axis::new().type_(AxisType::Value).scale(true))
      .series(Line::new().name("Equity").show_symbol(false).data(points));

    if let Err(e) = renderer.read_unchecked().render(CANVAS_ID_EQUITY, &chart) {
      warn!("equity render failed: {:?}", e);
    }
  });

  rsx! {
    div {
      id: CANVAS_ID_EQUITY,
      class: "chart",
      onmounted: move |_| { document::eval(&resize_observer_script(CANVAS_ID_EQUITY)); }
    }
  }
}
