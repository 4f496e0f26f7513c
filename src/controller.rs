//! Reactive controller: selection events in, sink writes and observer
//! notifications out.
//!
//! ```text
//!            on_region_change / on_year_change
//!   ┌──────┐ ─────────────────────────────────► ┌─────────────┐
//!   │ Idle │                                    │ Recomputing │
//!   └──────┘ ◄───────────────────────────────── └─────────────┘
//!             updated (sinks replaced) | empty
//! ```
//!
//! One event is handled to completion before the next; `&mut self` makes
//! that structural.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::DashboardConfig;
use crate::data::Dataset;
use crate::error::InvalidSelectionError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::pipeline::{recompute, Recompute};
use crate::selection::{Selection, SelectionOptions, SelectionState};
use crate::sinks::ViewSinks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Recomputing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    RegionChanged(String),
    YearChanged(i32),
}

impl std::str::FromStr for SelectionEvent {
    type Err = String;

    /// `region <name>` or `year <yyyy>`, as typed by a host reading stdin.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (cmd, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let arg = arg.trim();
        match cmd.to_lowercase().as_str() {
            "region" if !arg.is_empty() => Ok(SelectionEvent::RegionChanged(arg.to_string())),
            "year" => arg
                .parse()
                .map(SelectionEvent::YearChanged)
                .map_err(|_| format!("bad year: {:?}", arg)),
            _ => Err(format!("unknown command: {:?}", line)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Sinks were replaced; carries the new sink generation.
    Updated { generation: u64 },
    /// Selection matched no rows; sinks keep their previous contents.
    Empty,
    /// The value equals the current one, so no pass ran.
    Unchanged,
}

/// Rendering-layer hook, called after every sink replace.
pub trait ViewObserver {
    fn on_views(&mut self, sinks: &ViewSinks);
}

impl<F: FnMut(&ViewSinks)> ViewObserver for F {
    fn on_views(&mut self, sinks: &ViewSinks) {
        self(sinks)
    }
}

pub struct Controller {
    session_id: u64,
    dataset: Arc<Dataset>,
    aggregate_region: String,
    selection: SelectionState,
    sinks: ViewSinks,
    state: ControllerState,
    observers: Vec<Box<dyn ViewObserver>>,
}

impl Controller {
    pub fn new(
        session_id: u64,
        dataset: Arc<Dataset>,
        cfg: &DashboardConfig,
    ) -> Result<Self, InvalidSelectionError> {
        let options = SelectionOptions::from_dataset(&dataset);
        let selection = SelectionState::new(options, &cfg.preferred_region)?;
        Ok(Self {
            session_id,
            dataset,
            aggregate_region: cfg.aggregate_region.clone(),
            selection,
            sinks: ViewSinks::new(),
            state: ControllerState::Idle,
            observers: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, observer: Box<dyn ViewObserver>) {
        self.observers.push(observer);
    }

    /// First pass with the default selection, before any user input.
    pub fn initial_pass(&mut self) -> PassOutcome {
        log(
            Level::Info,
            Domain::System,
            "session.start",
            obj(&[
                ("session", json!(self.session_id)),
                ("region", v_str(&self.selection.current().region)),
                ("year", json!(self.selection.current().year)),
            ]),
        );
        self.run_pass()
    }

    pub fn on_region_change(
        &mut self,
        region: &str,
    ) -> Result<PassOutcome, InvalidSelectionError> {
        let changed = self
            .selection
            .set_region(region)
            .inspect_err(|e| self.log_rejected(e))?;
        Ok(self.after_change(changed))
    }

    pub fn on_year_change(&mut self, year: i32) -> Result<PassOutcome, InvalidSelectionError> {
        let changed = self
            .selection
            .set_year(year)
            .inspect_err(|e| self.log_rejected(e))?;
        Ok(self.after_change(changed))
    }

    pub fn dispatch(
        &mut self,
        event: SelectionEvent,
    ) -> Result<PassOutcome, InvalidSelectionError> {
        match event {
            SelectionEvent::RegionChanged(region) => self.on_region_change(&region),
            SelectionEvent::YearChanged(year) => self.on_year_change(year),
        }
    }

    /// Status line for a pass that did not reach the observers. `Updated`
    /// yields `None`; observers already saw the views.
    pub fn outcome_report(&self, outcome: PassOutcome) -> Option<Value> {
        match outcome {
            PassOutcome::Updated { .. } => None,
            PassOutcome::Empty => Some(json!({
                "status": "empty",
                "selection": self.selection.current(),
            })),
            PassOutcome::Unchanged => Some(json!({"status": "unchanged"})),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn selection(&self) -> &Selection {
        self.selection.current()
    }

    pub fn options(&self) -> &SelectionOptions {
        self.selection.options()
    }

    pub fn sinks(&self) -> &ViewSinks {
        &self.sinks
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn after_change(&mut self, changed: bool) -> PassOutcome {
        if !changed {
            return PassOutcome::Unchanged;
        }
        log(
            Level::Debug,
            Domain::Selection,
            "selection.changed",
            obj(&[
                ("session", json!(self.session_id)),
                ("region", v_str(&self.selection.current().region)),
                ("year", json!(self.selection.current().year)),
            ]),
        );
        self.run_pass()
    }

    fn run_pass(&mut self) -> PassOutcome {
        self.state = ControllerState::Recomputing;
        let result = recompute(&self.dataset, self.selection.current(), &self.aggregate_region);
        let outcome = match result {
            Recompute::Updated(views) => {
                self.sinks.replace(views);
                PassOutcome::Updated {
                    generation: self.sinks.generation(),
                }
            }
            Recompute::Empty => PassOutcome::Empty,
        };
        self.state = ControllerState::Idle;

        match outcome {
            PassOutcome::Updated { generation } => {
                log(
                    Level::Debug,
                    Domain::Render,
                    "sinks.replaced",
                    obj(&[
                        ("session", json!(self.session_id)),
                        ("generation", json!(generation)),
                        ("observers", json!(self.observers.len())),
                    ]),
                );
                for observer in self.observers.iter_mut() {
                    observer.on_views(&self.sinks);
                }
            }
            _ => log(
                Level::Info,
                Domain::Pipeline,
                "selection.empty",
                obj(&[
                    ("session", json!(self.session_id)),
                    ("region", v_str(&self.selection.current().region)),
                    ("year", json!(self.selection.current().year)),
                ]),
            ),
        }
        outcome
    }

    fn log_rejected(&self, err: &InvalidSelectionError) {
        log(
            Level::Error,
            Domain::Selection,
            "selection.rejected",
            obj(&[
                ("session", json!(self.session_id)),
                ("msg", v_str(&err.to_string())),
            ]),
        );
    }
}
