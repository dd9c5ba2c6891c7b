//! Gridstream demo
//!
//! Registers an in-memory frame, binds it to a table and scrolls a grid
//! session through it over the in-process transport, logging every window.
//!
//! Configure with `GRIDSTREAM_*` environment variables and `RUST_LOG`.

use anyhow::Context;
use gridstream::config::{ServerConfig, ViewportConfig};
use gridstream::datatable::{CellValue, ColumnSize, Filter, FilterOp, RowAction, SortDirection};
use gridstream::grid::{
    ContainerSize, FetchTransport, GridEvent, InProcessTransport, PrefetchState, TableSession,
};
use gridstream::server::{DataTableServer, FrameSource, TableBuilder};
use polars::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "jemalloc")]
use tikv_jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const SAMPLE_ROWS: usize = 95;

fn sample_frame(rows: usize) -> PolarsResult<DataFrame> {
    let ids: Vec<String> = (0..rows).map(|i| format!("ORD-{:04}", i)).collect();
    let customers: Vec<String> = (0..rows)
        .map(|i| ["acme", "globex", "initech", "umbrella"][i % 4].to_string())
        .collect();
    let amounts: Vec<f64> = (0..rows).map(|i| (i as f64 * 13.7) % 500.0).collect();
    let shipped: Vec<bool> = (0..rows).map(|i| i % 3 != 0).collect();
    let notes: Vec<Option<String>> = (0..rows)
        .map(|i| (i % 5 == 0).then(|| format!("https://example.com/orders/{}", i)))
        .collect();
    df!(
        "orderId" => ids,
        "customer" => customers,
        "amount" => amounts,
        "shipped" => shipped,
        "trackingLink" => notes,
        "_x_rowVersion" => (0..rows as i64).collect::<Vec<i64>>(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridstream=info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gridstream demo");

    let config = ServerConfig::from_env().context("reading server configuration")?;
    let server = DataTableServer::new(config);
    let reaper = server.spawn_reaper();

    let frame = sample_frame(SAMPLE_ROWS).context("building sample frame")?;
    let (mut scope, table) = TableBuilder::new(Arc::new(FrameSource::new(frame)))
        .header("orderId", "Order")
        .width("amount", ColumnSize::Px(110.0))
        .sort_direction("amount", SortDirection::Desc)
        .id_column("orderId")
        .batch_size(25)
        .row_actions(vec![
            RowAction::new("Open").with_tag("open").with_icon("open_in_new"),
            RowAction::new("Cancel").with_tag("cancel"),
        ])
        .on_row_action(|args| info!(id = %args.id, tag = %args.tag, "row action"))
        .build(&server.connection_service())
        .context("building table")?;

    let transport: Arc<dyn FetchTransport> = Arc::new(InProcessTransport::new(server.clone()));
    let viewport = ViewportConfig::default();
    let row_height = viewport.row_height;
    let mut session = TableSession::new(transport, table.config().clone(), viewport);

    let t0 = Instant::now();
    session.observe_container(ContainerSize::new(1024.0, 480.0), t0);
    session.tick(t0 + Duration::from_millis(60));
    session.connect(table.connection().clone(), table.columns().to_vec(), t0);

    let mut scroll_top = 0.0;
    loop {
        session.scroll_to(scroll_top);
        session.load_until_idle(Instant::now()).await;
        if let Some(e) = session.error() {
            warn!(error = %e, "stopping scroll");
            break;
        }
        info!(
            rows = session.visible_rows(),
            has_more = session.has_more(),
            "window loaded"
        );
        if session.state() == PrefetchState::Exhausted {
            break;
        }
        scroll_top += row_height * 20.0;
    }

    if let Some(first) = session.cache().row_at(0) {
        info!(?first, "top row after initial sort");
    }

    let open = table.row_actions().first();
    if let Some(GridEvent::RowAction(args)) = open.and_then(|action| session.row_action(3, action))
    {
        table.dispatch_row_action(&args);
    }

    session.set_filter(Some(Filter::condition(
        "customer",
        FilterOp::Equals,
        vec![CellValue::from("globex")],
    )));
    session.load_until_idle(Instant::now()).await;
    info!(
        rows = session.visible_rows(),
        filler = session.empty_rows(),
        "filtered to one customer"
    );

    scope.dispose();
    reaper.abort();
    Ok(())
}
