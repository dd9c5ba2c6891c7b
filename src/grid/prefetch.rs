//! Decides when the grid asks for more rows
//!
//! ```text
//!   Idle --request--> Loading --success(has_more)--> Idle
//!     ^                  |----failure--------------> Idle
//!     |                  '----success(!has_more)---> Exhausted
//!     '------------------reset (any state)----------------'
//! ```
//!
//! Every ticket carries the generation it was issued under; a reset bumps the
//! generation so completions of superseded fetches are discarded.

use crate::config::ViewportConfig;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchState {
    Idle,
    Loading,
    Exhausted,
}

/// One issued fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied(PrefetchState),
    /// Ticket from an earlier generation; nothing changed
    Stale,
}

#[derive(Debug, Clone)]
pub struct PrefetchController {
    state: PrefetchState,
    generation: u64,
    limit: usize,
    row_height: f64,
    scroll_threshold: usize,
}

impl PrefetchController {
    pub fn new(limit: usize, viewport: &ViewportConfig) -> Self {
        PrefetchController {
            state: PrefetchState::Idle,
            generation: 0,
            limit: limit.max(1),
            row_height: viewport.row_height,
            scroll_threshold: viewport.scroll_threshold,
        }
    }

    pub fn state(&self) -> PrefetchState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// The container could show more rows than are cached
    pub fn needs_fill(&self, container_height: f64, visible_rows: usize) -> bool {
        if container_height <= 0.0 || self.row_height <= 0.0 {
            return false;
        }
        let capacity = (container_height / self.row_height).ceil() as usize;
        capacity > visible_rows
    }

    /// The last rendered row is within the threshold of the cache end
    pub fn near_end(&self, bottom_row: usize, visible_rows: usize) -> bool {
        bottom_row + self.scroll_threshold >= visible_rows
    }

    /// Issue a fetch for the next window if one is allowed right now
    ///
    /// Returns `None` while a fetch is in flight (the trigger is coalesced)
    /// and once the source is exhausted.
    pub fn request(&mut self, visible_rows: usize) -> Option<FetchTicket> {
        if self.state != PrefetchState::Idle {
            return None;
        }
        self.state = PrefetchState::Loading;
        let ticket = FetchTicket {
            generation: self.generation,
            offset: visible_rows,
            limit: self.limit,
        };
        debug!(
            generation = ticket.generation,
            offset = ticket.offset,
            limit = ticket.limit,
            "fetch issued"
        );
        Some(ticket)
    }

    /// Evaluate both triggers against the current viewport
    pub fn on_viewport(
        &mut self,
        bottom_row: usize,
        container_height: f64,
        visible_rows: usize,
    ) -> Option<FetchTicket> {
        if self.needs_fill(container_height, visible_rows) || self.near_end(bottom_row, visible_rows)
        {
            self.request(visible_rows)
        } else {
            None
        }
    }

    pub fn complete_success(
        &mut self,
        ticket: &FetchTicket,
        rows_returned: usize,
        has_more: bool,
    ) -> Completion {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "stale fetch completion ignored"
            );
            return Completion::Stale;
        }

        self.state = if !has_more {
            PrefetchState::Exhausted
        } else if rows_returned == 0 {
            warn!(
                offset = ticket.offset,
                "empty batch reported has_more; treating source as exhausted"
            );
            PrefetchState::Exhausted
        } else {
            PrefetchState::Idle
        };
        Completion::Applied(self.state)
    }

    pub fn complete_failure(&mut self, ticket: &FetchTicket) -> Completion {
        if !self.is_current(ticket) {
            return Completion::Stale;
        }
        self.state = PrefetchState::Idle;
        Completion::Applied(self.state)
    }

    /// Back to `Idle` under a new generation
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = PrefetchState::Idle;
        debug!(generation = self.generation, "prefetch reset");
    }
}
