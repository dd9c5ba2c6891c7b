//! One grid bound to one connection
//!
//! The session keeps a snapshot of what the cached rows depend on
//! (`QueryKey`). Every mutator re-evaluates it; a changed key resets the cache
//! and the prefetch controller before anything else happens.
//!
//! Fetching is split in two so UI events can interleave with a pending fetch:
//! [`TableSession::fetch_future`] hands out a `'static` future and its ticket,
//! and [`TableSession::complete`] applies the outcome only if the ticket is
//! still current.

use super::arrangement::ColumnArrangement;
use super::cache::ColumnarCache;
use super::mapper::{CoordinateMapper, GridEvent};
use super::merge::merge_columns;
use super::prefetch::{Completion, FetchTicket, PrefetchController, PrefetchState};
use super::sorting::SortState;
use super::transport::{self, FetchTransport};
use super::viewport::{empty_rows, ContainerSize, ContainerTracker, VisibleRegion};
use crate::config::{DataTableConfig, ViewportConfig};
use crate::datatable::error::{DataTableError, Result};
use crate::datatable::{
    ColumnInfo, ColumnSpec, ConnectionDescriptor, FetchRequest, FetchResponse, Filter, RowAction,
    SortKey,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What the cached rows were fetched for
#[derive(Debug, Clone, PartialEq)]
pub struct QueryKey {
    pub connection_id: Option<String>,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
}

pub struct TableSession {
    transport: Arc<dyn FetchTransport>,
    config: DataTableConfig,
    viewport: ViewportConfig,
    connection: Option<ConnectionDescriptor>,
    declared: Vec<ColumnSpec>,
    reported: Vec<ColumnInfo>,
    cache: ColumnarCache,
    prefetch: PrefetchController,
    arrangement: ColumnArrangement,
    sort: SortState,
    filter: Option<Filter>,
    key: Option<QueryKey>,
    container: ContainerTracker,
    scroll_top: f64,
    has_more: bool,
    error: Option<DataTableError>,
}

impl TableSession {
    pub fn new(
        transport: Arc<dyn FetchTransport>,
        config: DataTableConfig,
        viewport: ViewportConfig,
    ) -> Self {
        TableSession {
            transport,
            prefetch: PrefetchController::new(config.fetch_limit(), &viewport),
            arrangement: ColumnArrangement::new(&config, &viewport),
            container: ContainerTracker::new(&viewport),
            config,
            viewport,
            connection: None,
            declared: Vec::new(),
            reported: Vec::new(),
            cache: ColumnarCache::new(),
            sort: SortState::new(),
            filter: None,
            key: None,
            scroll_top: 0.0,
            has_more: true,
            error: None,
        }
    }

    /// Bind to a (new) descriptor with its declared columns
    pub fn connect(
        &mut self,
        connection: ConnectionDescriptor,
        columns: Vec<ColumnSpec>,
        now: Instant,
    ) {
        debug!(connection = connection.connection_id(), "session connected");
        self.connection = Some(connection);
        self.sort.initialize_from(&columns);
        self.declare_columns(columns, now);
        self.sync();
    }

    /// Re-declare column metadata without touching the data
    pub fn declare_columns(&mut self, columns: Vec<ColumnSpec>, now: Instant) {
        self.declared = columns;
        self.arrangement
            .declare(merge_columns(&self.declared, &self.reported), now);
    }

    /// Replace the filter; false if filtering is disabled
    pub fn set_filter(&mut self, filter: Option<Filter>) -> bool {
        if !self.config.allow_filtering {
            return false;
        }
        self.filter = filter;
        self.sync();
        true
    }

    /// Header click; false if sorting is disabled for the table or column
    pub fn toggle_sort(&mut self, column: &str) -> bool {
        let sortable = self
            .declared
            .iter()
            .any(|c| c.name == column && c.sortable);
        if !self.config.allow_sorting || !sortable {
            return false;
        }
        self.sort.toggle(column);
        self.sync();
        true
    }

    fn current_key(&self) -> QueryKey {
        QueryKey {
            connection_id: self
                .connection
                .as_ref()
                .map(|c| c.connection_id().to_string()),
            filter: self.filter.clone(),
            sort: self.sort.keys().to_vec(),
        }
    }

    fn sync(&mut self) {
        let key = self.current_key();
        if self.key.as_ref() == Some(&key) {
            return;
        }
        debug!(?key, "query changed, resetting cache");
        self.cache.reset();
        self.prefetch.reset();
        self.has_more = true;
        self.error = None;
        self.scroll_top = 0.0;
        self.key = Some(key);
    }

    pub fn scroll_to(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top.max(0.0);
    }

    pub fn observe_container(&mut self, size: ContainerSize, now: Instant) {
        self.container.observe(size, now);
    }

    /// Advance timers: debounced resize and the reorder settle window
    pub fn tick(&mut self, now: Instant) {
        if self.container.poll(now) {
            self.arrangement
                .set_container_width(self.container.current().width);
        }
        self.arrangement.settle(now);
    }

    pub fn visible_region(&self) -> VisibleRegion {
        VisibleRegion::from_scroll(
            self.scroll_top,
            self.container.current().height,
            self.viewport.row_height,
        )
    }

    /// Next window to fetch, if the viewport wants one and none is in flight
    pub fn next_ticket(&mut self) -> Option<FetchTicket> {
        self.connection.as_ref()?;
        let region = self.visible_region();
        self.prefetch.on_viewport(
            region.bottom_row,
            self.container.current().height,
            self.cache.visible_rows(),
        )
    }

    /// Issue the next fetch as a future that does not borrow the session
    pub fn fetch_future(
        &mut self,
    ) -> Option<(FetchTicket, BoxFuture<'static, Result<FetchResponse>>)> {
        let ticket = self.next_ticket()?;
        let connection = self.connection.as_ref()?;
        let request = FetchRequest::new(connection.source_id().clone(), ticket.offset, ticket.limit)
            .with_filter(self.filter.clone())
            .with_sort(self.sort.keys().to_vec());
        let future = transport::fetch(&self.transport, connection, &request);
        Some((ticket, future))
    }

    /// Apply a finished fetch
    ///
    /// Newly reported columns are declared at `now`, so they wait out a
    /// reorder that is still settling.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<FetchResponse>,
        now: Instant,
    ) -> Completion {
        if !self.prefetch.is_current(ticket) {
            debug!(offset = ticket.offset, "dropping response for superseded query");
            return Completion::Stale;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => return self.fail(ticket, e),
        };

        let rows = response.batch.num_rows();
        if let Err(e) = self.cache.append(ticket.offset, response.batch) {
            return self.fail(ticket, e);
        }

        if self.reported != response.columns {
            self.reported = response.columns;
            self.arrangement.set_calculated_widths(&self.reported);
            let merged = merge_columns(&self.declared, &self.reported);
            self.arrangement.declare(merged, now);
        }

        self.has_more = response.has_more;
        self.error = None;
        self.prefetch.complete_success(ticket, rows, response.has_more)
    }

    fn fail(&mut self, ticket: &FetchTicket, error: DataTableError) -> Completion {
        warn!(offset = ticket.offset, error = %error, "fetch failed");
        self.error = Some(error);
        self.prefetch.complete_failure(ticket)
    }

    /// Fetch until the viewport is satisfied, the source is exhausted, or a
    /// fetch fails; completions are applied at `now`
    pub async fn load_until_idle(&mut self, now: Instant) {
        while let Some((ticket, future)) = self.fetch_future() {
            let result = future.await;
            let failed = result.is_err();
            self.complete(&ticket, result, now);
            if failed {
                break;
            }
        }
    }

    pub fn cache(&self) -> &ColumnarCache {
        &self.cache
    }

    pub fn visible_rows(&self) -> usize {
        self.cache.visible_rows()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn state(&self) -> PrefetchState {
        self.prefetch.state()
    }

    /// Last fetch error, cleared by the next success or a query change
    pub fn error(&self) -> Option<&DataTableError> {
        self.error.as_ref()
    }

    pub fn arrangement(&self) -> &ColumnArrangement {
        &self.arrangement
    }

    pub fn arrangement_mut(&mut self) -> &mut ColumnArrangement {
        &mut self.arrangement
    }

    pub fn sort(&self) -> &[SortKey] {
        self.sort.keys()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn config(&self) -> &DataTableConfig {
        &self.config
    }

    pub fn mapper(&self) -> CoordinateMapper<'_> {
        CoordinateMapper::new(&self.arrangement, &self.cache, &self.config)
    }

    pub fn click(&self, display_col: usize, row: usize) -> Option<GridEvent> {
        self.mapper().click(display_col, row)
    }

    pub fn activate(&self, display_col: usize, row: usize) -> Option<GridEvent> {
        self.mapper().activate(display_col, row)
    }

    pub fn row_action(&self, row: usize, action: &RowAction) -> Option<GridEvent> {
        self.mapper().row_action(row, action)
    }

    /// Filler rows to render under the data
    pub fn empty_rows(&self) -> usize {
        empty_rows(
            self.container.current().height,
            self.cache.visible_rows(),
            self.has_more,
            self.config.show_groups,
            &self.viewport,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::datatable::{CellValue, FilterOp, RowActionEventArgs, SortOrder};
    use crate::grid::transport::InProcessTransport;
    use crate::server::{DataTableServer, FrameSource, SourceScope, TableBuilder};
    use polars::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Harness {
        server: DataTableServer,
        session: TableSession,
        scope: SourceScope,
        descriptor: ConnectionDescriptor,
        columns: Vec<ColumnSpec>,
    }

    fn numbers(n: i64) -> DataFrame {
        let values: Vec<i64> = (0..n).collect();
        let codes: Vec<String> = (0..n).map(|i| format!("X{}", i)).collect();
        df!("n" => values, "code" => codes).unwrap()
    }

    fn harness(frame: DataFrame, id_column: Option<&str>) -> Harness {
        let server = DataTableServer::new(ServerConfig::default());
        let mut builder = TableBuilder::new(Arc::new(FrameSource::new(frame)));
        if let Some(id) = id_column {
            builder = builder.id_column(id);
        }
        let (scope, table) = builder.build(&server.connection_service()).unwrap();

        let transport: Arc<dyn FetchTransport> =
            Arc::new(InProcessTransport::new(server.clone()));
        let mut session = TableSession::new(
            transport,
            table.config().clone(),
            ViewportConfig::default(),
        );
        let now = Instant::now();
        // Ten rows tall: 340 px / 34 px
        session.observe_container(ContainerSize::new(800.0, 340.0), now);
        session.tick(now + Duration::from_millis(60));
        session.connect(table.connection().clone(), table.columns().to_vec(), now);

        Harness {
            server,
            session,
            descriptor: table.connection().clone(),
            columns: table.columns().to_vec(),
            scope,
        }
    }

    async fn step(session: &mut TableSession) -> Option<usize> {
        let (ticket, future) = session.fetch_future()?;
        let offset = ticket.offset;
        let result = future.await;
        session.complete(&ticket, result, Instant::now());
        Some(offset)
    }

    #[tokio::test]
    async fn test_forty_five_rows_batch_twenty() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;

        assert_eq!(step(s).await, Some(0));
        assert_eq!(s.visible_rows(), 20);
        // Ten rows on screen, not near the end yet
        assert_eq!(step(s).await, None);

        s.scroll_to(34.0 * 5.0);
        assert_eq!(step(s).await, Some(20));
        assert_eq!(s.visible_rows(), 40);

        s.scroll_to(34.0 * 30.0);
        assert_eq!(step(s).await, Some(40));
        assert_eq!(s.visible_rows(), 45);
        assert!(!s.has_more());
        assert_eq!(s.state(), PrefetchState::Exhausted);

        s.scroll_to(34.0 * 40.0);
        assert_eq!(step(s).await, None);
        assert_eq!(s.cache().batch_count(), 3);
    }

    #[tokio::test]
    async fn test_filter_change_resets_and_refetches() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;
        s.load_until_idle(Instant::now()).await;
        assert_eq!(s.visible_rows(), 20);

        assert!(s.set_filter(Some(Filter::condition(
            "n",
            FilterOp::LessThan,
            vec![CellValue::Int(5)]
        ))));
        assert_eq!(s.visible_rows(), 0);
        assert_eq!(s.state(), PrefetchState::Idle);

        assert_eq!(step(s).await, Some(0));
        assert_eq!(s.visible_rows(), 5);
        assert!(!s.has_more());

        // Same filter again is not a change
        let same = s.filter().cloned();
        s.set_filter(same);
        assert_eq!(s.visible_rows(), 5);
    }

    #[tokio::test]
    async fn test_sort_toggle_resets_and_orders() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;
        s.load_until_idle(Instant::now()).await;

        assert!(s.toggle_sort("n"));
        assert!(s.toggle_sort("n"));
        assert_eq!(s.sort()[0].direction, SortOrder::Desc);
        assert_eq!(s.visible_rows(), 0);

        s.load_until_idle(Instant::now()).await;
        assert_eq!(s.cache().value_at(0, "n"), Some(CellValue::Int(44)));
        assert!(!s.toggle_sort("missing"));
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;

        let (old_ticket, old_future) = s.fetch_future().unwrap();
        s.set_filter(Some(Filter::condition(
            "n",
            FilterOp::GreaterThanOrEqual,
            vec![CellValue::Int(40)],
        )));

        let (ticket, future) = s.fetch_future().unwrap();
        let fresh = future.await;
        let applied = s.complete(&ticket, fresh, Instant::now());
        assert!(matches!(applied, Completion::Applied(_)));

        let stale = old_future.await;
        let stale = s.complete(&old_ticket, stale, Instant::now());
        assert_eq!(stale, Completion::Stale);
        assert_eq!(s.visible_rows(), 5);
        assert_eq!(s.cache().value_at(0, "n"), Some(CellValue::Int(40)));
    }

    #[tokio::test]
    async fn test_container_growth_alone_fetches_more() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;
        s.load_until_idle(Instant::now()).await;
        assert_eq!(s.visible_rows(), 20);
        assert!(s.next_ticket().is_none());

        // 1020 px holds 30 rows; nothing scrolled
        let t0 = Instant::now();
        s.observe_container(ContainerSize::new(800.0, 1020.0), t0);
        s.tick(t0 + Duration::from_millis(10));
        assert!(s.next_ticket().is_none());

        s.tick(t0 + Duration::from_millis(60));
        assert_eq!(step(s).await, Some(20));
        assert_eq!(s.visible_rows(), 40);
        assert_eq!(step(s).await, None);
    }

    #[tokio::test]
    async fn test_reported_columns_declared_at_completion_time() {
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;
        let t0 = Instant::now();
        assert!(s.arrangement_mut().reorder(0, 1, t0));

        // Completion inside the settle window parks the declaration
        let (ticket, future) = s.fetch_future().unwrap();
        let result = future.await;
        s.complete(&ticket, result, t0 + Duration::from_millis(10));
        assert!(!s.arrangement_mut().settle(t0 + Duration::from_millis(50)));
        assert!(s.arrangement_mut().settle(t0 + Duration::from_millis(150)));

        // Completion stamped after the window applies at once
        let mut h = harness(numbers(45), None);
        let s = &mut h.session;
        assert!(s.arrangement_mut().reorder(0, 1, t0));
        let (ticket, future) = s.fetch_future().unwrap();
        let result = future.await;
        s.complete(&ticket, result, t0 + Duration::from_secs(60));
        assert!(!s.arrangement_mut().settle(t0 + Duration::from_secs(60)));
        assert_eq!(s.arrangement().permutation(), &[1, 0]);
    }

    #[tokio::test]
    async fn test_disposed_source_surfaces_not_found_and_keeps_cache() {
        let mut h = harness(numbers(45), None);
        h.session.load_until_idle(Instant::now()).await;
        assert_eq!(h.session.visible_rows(), 20);

        h.scope.dispose();
        h.session.scroll_to(34.0 * 15.0);
        assert_eq!(step(&mut h.session).await, Some(20));

        assert!(h.session.error().is_some_and(|e| e.is_not_found()));
        assert_eq!(h.session.visible_rows(), 20);
        assert_eq!(h.session.state(), PrefetchState::Idle);
        assert!(!h.server.registry().contains(h.descriptor.source_id()));
    }

    #[tokio::test]
    async fn test_transient_failure_then_retry() {
        struct Flaky {
            inner: InProcessTransport,
            fail_next: AtomicBool,
        }
        impl FetchTransport for Flaky {
            fn query(
                &self,
                descriptor: &ConnectionDescriptor,
                request: Vec<u8>,
            ) -> BoxFuture<'static, Result<Vec<u8>>> {
                if self.fail_next.swap(false, Ordering::SeqCst) {
                    let err = DataTableError::Transport("connection reset".into());
                    return Box::pin(futures::future::err::<Vec<u8>, _>(err));
                }
                self.inner.query(descriptor, request)
            }
        }

        let h = harness(numbers(45), None);
        let transport: Arc<dyn FetchTransport> = Arc::new(Flaky {
            inner: InProcessTransport::new(h.server.clone()),
            fail_next: AtomicBool::new(true),
        });
        let mut s = TableSession::new(transport, DataTableConfig::default(), ViewportConfig::default());
        s.connect(h.descriptor.clone(), h.columns.clone(), Instant::now());

        assert_eq!(step(&mut s).await, Some(0));
        assert!(matches!(s.error(), Some(DataTableError::Transport(_))));
        assert_eq!(s.visible_rows(), 0);

        assert_eq!(step(&mut s).await, Some(0));
        assert!(s.error().is_none());
        assert_eq!(s.visible_rows(), 20);
    }

    #[tokio::test]
    async fn test_row_action_uses_hidden_key() {
        let mut h = harness(numbers(45), Some("code"));
        h.session.load_until_idle(Instant::now()).await;

        let event = h
            .session
            .row_action(9, &RowAction::new("Open").with_tag("open"));
        assert_eq!(
            event,
            Some(GridEvent::RowAction(RowActionEventArgs {
                id: CellValue::Text("X9".into()),
                tag: "open".into(),
            }))
        );
        // Hidden key is data only, never a display column
        assert_eq!(h.session.arrangement().display_position("_hiddenKey"), None);
        assert_eq!(h.session.row_action(30, &RowAction::new("Open")), None);
    }

    #[tokio::test]
    async fn test_new_descriptor_resets_cache() {
        let mut h = harness(numbers(45), None);
        h.session.load_until_idle(Instant::now()).await;
        assert_eq!(h.session.visible_rows(), 20);

        let (_scope2, descriptor) = h
            .server
            .connection_service()
            .add_source(Arc::new(FrameSource::new(numbers(3))), None);
        h.session
            .connect(descriptor, h.columns.clone(), Instant::now());
        assert_eq!(h.session.visible_rows(), 0);

        h.session.load_until_idle(Instant::now()).await;
        assert_eq!(h.session.visible_rows(), 3);
        assert!(h.session.empty_rows() > 0);
    }
}
