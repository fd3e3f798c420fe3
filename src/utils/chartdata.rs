use charming::datatype::{CompositeValue, DataPoint, NumericValue};

use super::models::{Candle, EquityPoint};

fn num(v: f64) -> CompositeValue {
  CompositeValue::Number(NumericValue::Float(v))
}

/// Category labels and `[open, close, low, high]` points, the order the
/// candlestick series expects.
pub fn candle_series(candles: &[Candle]) -> (Vec<String>, Vec<DataPoint>) {
  let labels = candles.iter().map(|c| short_timestamp(&c.timestamp)).collect();
  let points = candles.iter()
    .map(|c| DataPoint::Value(CompositeValue::Array(vec![num(c.open), num(c.close), num(c.low), num(c.high)])))
    .collect();
  (labels, points)
}

pub fn equity_series(curve: &[EquityPoint]) -> (Vec<String>, Vec<DataPoint>) {
  let labels = curve.iter().map(|p| short_timestamp(&p.timestamp)).collect();
  let points = curve.iter().map(|p| DataPoint::Value(num(p.equity))).collect();
  (labels, points)
}

/// Lowest low and highest high, padded 2% so candles do not touch the edges.
pub fn price_bounds(candles: &[Candle]) -> Option<(f64, f64)> {
  let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
  let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
  if !low.is_finite() || !high.is_finite() {
    return None;
  }
  let pad = (high - low).abs() * 0.02;
  Some((low - pad, high + pad))
}

// "2024-03-01T09:15:00+05:30" -> "2024-03-01 09:15"
fn short_timestamp(ts: &str) -> String {
  let ts = ts.replacen('T', " ", 1);
  match ts.char_indices().nth(16) {
    Some((idx, _)) => ts[..idx].to_string(),
    None => ts
  }
}

/// Script that makes the echarts instance on element `id` follow the
/// element's own size. The observer hangs off the element, so it goes away
/// with it and a second mount of the same element adds nothing.
pub fn resize_observer_script(id: &str) -> String {
  format!(r#"
    setTimeout(function() {{
      const element = document.getElementById('{id}');
      if (!element || element.__chartResizeObserver) {{ return; }}
      const chart = echarts.getInstanceByDom(element);
      if (!chart) {{ return; }}
      const resizeObserver = new ResizeObserver(entries => {{
        for (const entry of entries) {{
          if (entry.target === element) {{
            chart.resize();
          }}
        }}
      }});
      resizeObserver.observe(element);
      element.__chartResizeObserver = resizeObserver;
    }}, 350)
  "#)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn candle(ts: &str, o: f64, h: f64, l: f64, c: f64) -> Candle {
    Candle { timestamp: ts.to_string(), open: o, high: h, low: l, close: c, volume: 100.0 }
  }

  #[test]
  fn candles_use_open_close_low_high_order() {
    let (labels, points) = candle_series(&[candle("2024-03-01T09:15:00+05:30", 10.0, 12.0, 9.0, 11.0)]);
    assert_eq!(labels, vec!["2024-03-01 09:15"]);
    match &points[0] {
      DataPoint::Value(CompositeValue::Array(values)) => {
        let got: Vec<f64> = values.iter().filter_map(|v| match v {
          CompositeValue::Number(NumericValue::Float(f)) => Some(*f),
          _ => None
        }).collect();
        assert_eq!(got, vec![10.0, 11.0, 9.0, 12.0]);
      },
      _ => panic!("expected an array data point")
    }
  }

  #[test]
  fn bounds_need_data() {
    assert_eq!(price_bounds(&[]), None);
    let (lo, hi) = price_bounds(&[candle("t", 10.0, 20.0, 10.0, 15.0)]).unwrap();
    assert!(lo < 10.0 && hi > 20.0);
  }

  #[test]
  fn resize_script_observes_the_element_not_the_window() {
    let script = resize_observer_script("equity-curve");
    assert!(script.contains("getElementById('equity-curve')"));
    assert!(script.contains("resizeObserver.observe(element)"));
    assert!(script.contains("element.__chartResizeObserver) { return; }"));
    assert!(!script.contains("window.addEventListener"));
  }
}
