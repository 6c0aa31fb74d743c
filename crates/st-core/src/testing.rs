//! Recording doubles for [`Host`] and [`Reporter`].

use std::cell::{Cell, RefCell};

use crate::interceptor::{Host, Reporter};
use crate::stats::Stats;
use crate::types::InterceptionEvent;

/// Host that records navigations instead of performing them.
#[derive(Debug)]
pub struct RecordingHost {
    url: RefCell<String>,
    navigations: RefCell<Vec<String>>,
    reloads: Cell<usize>,
    clock: Cell<f64>,
}

impl RecordingHost {
    pub fn new(url: &str) -> Self {
        Self {
            url: RefCell::new(url.to_string()),
            navigations: RefCell::new(Vec::new()),
            reloads: Cell::new(0),
            clock: Cell::new(1_700_000_000_000.0),
        }
    }

    /// Move the page without going through the interceptor.
    pub fn set_url(&self, url: &str) {
        *self.url.borrow_mut() = url.to_string();
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.get()
    }
}

impl Host for RecordingHost {
    fn current_url(&self) -> String {
        self.url.borrow().clone()
    }

    fn navigate(&self, url: &str) {
        self.navigations.borrow_mut().push(url.to_string());
        self.set_url(url);
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }

    fn now_ms(&self) -> f64 {
        let now = self.clock.get();
        self.clock.set(now + 1.0);
        now
    }
}

/// Reporter that keeps every event and maintains stats for a settable day.
#[derive(Debug)]
pub struct RecordingReporter {
    events: RefCell<Vec<InterceptionEvent>>,
    stats: RefCell<Stats>,
    today: RefCell<String>,
}

impl RecordingReporter {
    pub fn new(today: &str) -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            stats: RefCell::new(Stats::new(today)),
            today: RefCell::new(today.to_string()),
        }
    }

    pub fn set_today(&self, today: &str) {
        *self.today.borrow_mut() = today.to_string();
    }

    pub fn events(&self) -> Vec<InterceptionEvent> {
        self.events.borrow().clone()
    }

    pub fn stats(&self) -> Stats {
        self.stats.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &InterceptionEvent) {
        self.events.borrow_mut().push(event.clone());
        self.stats.borrow_mut().record(&self.today.borrow());
    }
}
