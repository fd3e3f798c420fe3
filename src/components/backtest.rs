use dioxus::{logger::tracing::info, prelude::*};
use rust_decimal::Decimal;
use tradedesk::{
  stream::{
    endpoint::StreamKind,
    hooks::{use_event_stream, BacktestHistoryStream, BacktestJobsStream, BacktestProgressStream, HistoricalDataStream, StreamTarget},
    mirror::{ConnectionState, StreamState},
    resource::ScopeFilter
  },
  utils::{
    api::ApiClient,
    models::{BacktestRequest, BacktestResult, EquityPoint, OhlcQuery, QuickBacktestRequest},
    server::AppError,
    session::use_auth
  }
};
use crate::components::{
  charts::{CandlestickChart, EquityChart},
  code_editor::EditorHandle,
  status::{ConnectionBadge, ErrorBanner}
};

const INTERVALS: [&str; 5] = ["1m", "5m", "15m", "1h", "1d"];

/// Backtest launcher plus everything streamed back: job progress, the
/// strategy's history and the OHLC series for the chart.
#[component]
pub fn BacktestPanel(strategy_id: ReadOnlySignal<String>, editor: EditorHandle) -> Element {
  let mut auth = use_auth();
  let api = use_context::<ApiClient>();
  let mut symbol = use_signal(|| "NIFTY 50".to_string());
  let mut interval = use_signal(|| "5m".to_string());
  let mut days = use_signal(|| 30u32);
  let mut job_id: Signal<Option<String>> = use_signal(|| None);
  let mut quick_result: Signal<Option<BacktestResult>> = use_signal(|| None);
  let mut running = use_signal(|| false);
  let mut error: Signal<Option<AppError>> = use_signal(|| None);

  let progress_target = use_memo(move || -> StreamTarget {
    job_id().map(|job_id| (StreamKind::BacktestProgress { job_id }, ScopeFilter::default()))
  });
  let job_progress = use_event_stream::<BacktestProgressStream>(progress_target);

  let history_target = use_memo(move || -> StreamTarget {
    let id = strategy_id();
    (!id.is_empty()).then(|| (StreamKind::BacktestHistory, ScopeFilter::strategy(id).with_limit(20)))
  });
  let history = use_event_stream::<BacktestHistoryStream>(history_target);

  let jobs_target = use_memo(move || -> StreamTarget {
    let id = strategy_id();
    (!id.is_empty()).then(|| (StreamKind::BacktestJobs, ScopeFilter::strategy(id)))
  });
  let jobs = use_event_stream::<BacktestJobsStream>(jobs_target);

  let data_target = use_memo(move || -> StreamTarget {
    let scope = ScopeFilter::default().with_symbol(symbol()).with_interval(interval()).with_limit(500);
    Some((StreamKind::HistoricalData, scope))
  });
  let data = use_event_stream::<HistoricalDataStream>(data_target);

  // the data stream gave up before sending anything; ask the REST endpoint
  let data_down = use_memo(move || {
    let d = data.read();
    d.link().state() == ConnectionState::Closed && d.points().is_empty()
  });
  let ohlc_api = api.clone();
  let rest_ohlc = use_resource(move || {
    let api = ohlc_api.clone();
    let session = auth.session.read().clone();
    let query = OhlcQuery { symbol: symbol(), interval: interval(), from: None, to: None };
    let down = data_down();
    async move {
      if !down {
        return Ok(None);
      }
      info!("historical data stream closed, loading {} {} over REST", query.symbol, query.interval);
      api.ohlc(&session, &query).await.map(Some).map_err(|e| auth.intercept(e))
    }
  });

  let candles = use_memo(move || {
    let streamed = data.read().points().to_vec();
    if !streamed.is_empty() {
      return streamed;
    }
    match &*rest_ohlc.read() {
      Some(Ok(Some(resp))) => resp.data.clone(),
      _ => vec![]
    }
  });
  let candle_interval = use_memo(move || data.read().interval().map(str::to_string));
  let equity = use_memo(move || -> Vec<EquityPoint> {
    let from_job = job_progress.read().value().and_then(|p| p.result.as_ref()).map(|r| r.equity_curve.clone());
    from_job.or_else(|| quick_result.read().as_ref().map(|r| r.equity_curve.clone())).unwrap_or_default()
  });

  let quick_api = api.clone();
  let run_quick = move |_| {
    let api = quick_api.clone();
    let session = auth.session.peek().clone();
    let req = QuickBacktestRequest {
      code: editor.arbiter.peek().code().to_string(),
      symbol: symbol.peek().clone(),
      interval: interval.peek().clone(),
      days: *days.peek()
    };
    running.set(true);
    error.set(None);
    spawn(async move {
      match api.quick_backtest(&session, &req).await {
        Ok(result) => {
          info!("quick backtest finished: {} trades", result.total_trades);
          quick_result.set(Some(result));
        },
        Err(e) => error.set(Some(auth.intercept(e)))
      }
      running.set(false);
    });
  };

  let run_full = move |_| {
    let id = strategy_id.peek().clone();
    if id.is_empty() {
      return;
    }
    let api = api.clone();
    let session = auth.session.peek().clone();
    let end = js_sys::Date::new_0();
    let start = js_sys::Date::new(&(end.get_time() - f64::from(*days.peek()) * 86_400_000.0).into());
    let req = BacktestRequest {
      strategy_id: id,
      symbol: symbol.peek().clone(),
      interval: interval.peek().clone(),
      start_date: String::from(start.to_iso_string()),
      end_date: String::from(end.to_iso_string()),
      initial_capital: Decimal::new(100_000, 0)
    };
    error.set(None);
    spawn(async move {
      match api.run_backtest(&session, &req).await {
        Ok(resp) => job_id.set(Some(resp.job_id)),
        Err(e) => error.set(Some(auth.intercept(e)))
      }
    });
  };

  let p = job_progress.read();
  let percent = p.percent();

  rsx! {
    div {
      class: "backtest-panel",
      div {
        class: "backtest-form",
        input { value: "{symbol}", oninput: move |e| symbol.set(e.value()) }
        select {
          value: "{interval}",
          onchange: move |e| interval.set(e.value()),
          for i in INTERVALS {
            option { key: "{i}", value: i, "{i}" }
          }
        }
        input {
          r#type: "number",
          min: "1",
          max: "365",
          value: "{days}",
          oninput: move |e| if let Ok(d) = e.value().parse::<u32>() { days.set(d.clamp(1, 365)) }
        }
        button { disabled: running(), onclick: run_quick, "Quick test" }
        button { disabled: strategy_id().is_empty(), onclick: run_full, "Full backtest" }
      }
      if let Some(err) = error() {
        ErrorBanner { error: err, on_retry: None }
      }
      if job_id().is_some() {
        div {
          class: "backtest-progress",
          ConnectionBadge { link: p.link().clone() }
          progress { max: "100", value: "{percent}" }
          if let Some(msg) = p.value().and_then(|v| v.message.clone()) {
            span { "{msg}" }
          }
          if let Some(msg) = p.link().last_error() {
            span { class: "stream-error", "{msg}" }
          }
        }
      }
      div {
        class: "chart-header",
        ConnectionBadge { link: data.read().link().clone() }
        if let Some(frac) = data.read().fraction_received().filter(|_| !data.read().is_complete()) {
          span { {format!("Loading {:.0}%", frac * 100.0)} }
        }
      }
      CandlestickChart { candles: candles, interval: candle_interval }
      EquityChart { curve: equity }
      if !jobs.read().is_empty() {
        div {
          class: "backtest-jobs",
          h4 { "Jobs" ConnectionBadge { link: jobs.read().link().clone() } }
          ul {
            for job in jobs.read().records().iter() {
              li {
                key: "{job.job_id}",
                a {
                  href: "#",
                  onclick: {
                    let id = job.job_id.clone();
                    move |evt: MouseEvent| {
                      evt.prevent_default();
                      job_id.set(Some(id.clone()));
                    }
                  },
                  "{job.job_id}"
                }
                span { {format!(" {} {:.0}%", job.status, job.progress)} }
                if let Some(err) = &job.error {
                  span { class: "stream-error", " {err}" }
                }
              }
            }
          }
        }
      }
      div {
        class: "backtest-history",
        h4 { "Recent backtests" ConnectionBadge { link: history.read().link().clone() } }
        table {
          thead { tr { th { "Date" } th { "Symbol" } th { "Return %" } th { "Trades" } th { "Win rate" } } }
          tbody {
            for item in history.read().records().iter() {
              tr {
                key: "{item.id}",
                td { "{item.created_at.clone().unwrap_or_default()}" }
                td { "{item.symbol.clone().unwrap_or_default()}" }
                td { {format!("{:.2}", item.total_return)} }
                td { "{item.total_trades}" }
                td { {format!("{:.1}", item.win_rate)} }
              }
            }
          }
        }
      }
    }
  }
}
