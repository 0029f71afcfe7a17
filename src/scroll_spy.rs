//! Scroll-spy: which section is "current" while the page scrolls.
//!
//! A section counts as visible when it overlaps a horizontal strip of the
//! viewport (by default from 20% below the top to 70% above the bottom).
//! Visibility changes arrive from an [`IntersectionSource`]; [`ScrollSpy`]
//! turns them into a single active section id.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sections::SectionRegistry;

/// Strip of the viewport that counts as "in view", as fractions of its height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBand {
    pub top_inset: f64,
    pub bottom_inset: f64,
}

impl Default for ViewportBand {
    fn default() -> Self {
        Self {
            top_inset: 0.2,
            bottom_inset: 0.7,
        }
    }
}

impl ViewportBand {
    /// Band edges in px from the viewport top.
    pub fn bounds(&self, viewport_height: f64) -> (f64, f64) {
        (
            viewport_height * self.top_inset,
            viewport_height - viewport_height * self.bottom_inset,
        )
    }

    /// `top` is the section's offset from the viewport top.
    pub fn intersects(&self, viewport_height: f64, top: f64, height: f64) -> bool {
        let (band_top, band_bottom) = self.bounds(viewport_height);
        top < band_bottom && top + height > band_top
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub section_id: String,
    pub is_intersecting: bool,
}

pub type IntersectCallback = Box<dyn FnMut(&IntersectionEntry)>;

/// Anything that can report when a section enters or leaves the band.
pub trait IntersectionSource {
    fn observe(&mut self, section_id: &str, on_intersect: IntersectCallback);

    /// Stop reporting for every observed section.
    fn disconnect(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// The section that most recently became visible wins.
    #[default]
    LastObservedWins,
    /// The visible section earliest in document order wins.
    Topmost,
}

#[derive(Debug)]
struct SpyState {
    policy: SelectionPolicy,
    order: Vec<String>,
    intersecting: BTreeSet<String>,
    active: String,
}

impl SpyState {
    fn record(&mut self, entry: &IntersectionEntry) {
        if entry.is_intersecting {
            self.intersecting.insert(entry.section_id.clone());
        } else {
            self.intersecting.remove(&entry.section_id);
        }

        let next = match self.policy {
            SelectionPolicy::LastObservedWins => entry
                .is_intersecting
                .then(|| entry.section_id.clone()),
            SelectionPolicy::Topmost => self
                .order
                .iter()
                .find(|id| self.intersecting.contains(*id))
                .cloned(),
        };

        // With nothing in the band the last active section stays.
        if let Some(next) = next {
            if next != self.active {
                debug!(from = %self.active, to = %next, "active section changed");
                self.active = next;
            }
        }
    }
}

/// Tracks the active section. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ScrollSpy {
    state: Rc<RefCell<SpyState>>,
}

impl ScrollSpy {
    /// Track the enabled sections of `registry`; the first one starts active.
    pub fn new(registry: &SectionRegistry, policy: SelectionPolicy) -> Self {
        let order: Vec<String> = registry.enabled().map(|s| s.id.clone()).collect();
        let active = order.first().cloned().unwrap_or_default();
        Self {
            state: Rc::new(RefCell::new(SpyState {
                policy,
                order,
                intersecting: BTreeSet::new(),
                active,
            })),
        }
    }

    /// Observe every tracked section on `source`.
    pub fn connect(&self, source: &mut dyn IntersectionSource) {
        let ids = self.state.borrow().order.clone();
        for id in ids {
            let state = self.state.clone();
            source.observe(
                &id,
                Box::new(move |entry: &IntersectionEntry| state.borrow_mut().record(entry)),
            );
        }
    }

    pub fn record(&self, entry: &IntersectionEntry) {
        self.state.borrow_mut().record(entry);
    }

    pub fn active_section(&self) -> String {
        self.state.borrow().active.clone()
    }
}

/// Scroll position as a percentage of the scrollable height, 0..=100.
pub fn scroll_progress(scroll_y: f64, document_height: f64, viewport_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 {
        return 0.0;
    }
    (scroll_y / scrollable * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionRect {
    pub top: f64,
    pub height: f64,
}

struct Observed {
    section_id: String,
    callback: IntersectCallback,
    last: Option<bool>,
}

/// An [`IntersectionSource`] computed from a static page layout.
///
/// Sections are placed with [`BandObserver::set_layout`]; every
/// [`BandObserver::scroll_to`] reports the sections whose visibility changed,
/// in the order they were observed. Observing a laid-out section reports its
/// initial state right away. Sections without a layout are never reported.
pub struct BandObserver {
    band: ViewportBand,
    viewport_height: f64,
    scroll_y: f64,
    layout: HashMap<String, SectionRect>,
    observed: Vec<Observed>,
}

impl std::fmt::Debug for BandObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandObserver")
            .field("band", &self.band)
            .field("viewport_height", &self.viewport_height)
            .field("scroll_y", &self.scroll_y)
            .field("observed", &self.observed.len())
            .finish()
    }
}

impl BandObserver {
    pub fn new(viewport_height: f64, band: ViewportBand) -> Self {
        Self {
            band,
            viewport_height,
            scroll_y: 0.0,
            layout: HashMap::new(),
            observed: Vec::new(),
        }
    }

    pub fn set_layout(&mut self, section_id: &str, rect: SectionRect) {
        self.layout.insert(section_id.to_string(), rect);
    }

    pub fn scroll_to(&mut self, scroll_y: f64) {
        self.scroll_y = scroll_y;
        for i in 0..self.observed.len() {
            self.report(i);
        }
    }

    fn report(&mut self, i: usize) {
        let Some(rect) = self.layout.get(&self.observed[i].section_id).copied() else {
            return;
        };
        let now = self
            .band
            .intersects(self.viewport_height, rect.top - self.scroll_y, rect.height);

        let observed = &mut self.observed[i];
        if observed.last == Some(now) {
            return;
        }
        observed.last = Some(now);
        let entry = IntersectionEntry {
            section_id: observed.section_id.clone(),
            is_intersecting: now,
        };
        (observed.callback)(&entry);
    }
}

impl IntersectionSource for BandObserver {
    fn observe(&mut self, section_id: &str, on_intersect: IntersectCallback) {
        self.observed.push(Observed {
            section_id: section_id.to_string(),
            callback: on_intersect,
            last: None,
        });
        self.report(self.observed.len() - 1);
    }

    fn disconnect(&mut self) {
        self.observed.clear();
    }
}
