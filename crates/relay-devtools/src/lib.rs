//! Channel inspector.
//!
//! [`Inspector`] subscribes to a [`Channel`] like any other listener and keeps
//! running [`Metrics`] about its traffic. [`Inspector::overlay`] renders them
//! as a single HUD line.

use std::cell::RefCell;
use std::rc::Rc;

use web_time::Instant;

use relay_core::{Channel, State, SubId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    /// Transitions observed since attach.
    pub transitions: u64,
    /// Channel subscribers, not counting the inspector.
    pub subscribers: usize,
    /// Top-level keys whose value changed in the last transition.
    pub changed_keys: Vec<String>,
    /// Smoothed transitions per second.
    pub rate: f32,
}

struct Tracker {
    metrics: Metrics,
    previous: State,
    last_at: Option<Instant>,
}

impl Tracker {
    fn observe(&mut self, next: &State) {
        self.metrics.transitions += 1;
        self.metrics.changed_keys = changed_keys(&self.previous, next);
        self.previous = next.clone();

        let now = Instant::now();
        if let Some(prev) = self.last_at.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let rate = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.metrics.rate = if self.metrics.rate == 0.0 {
                    rate
                } else {
                    (1.0 - a) * self.metrics.rate + a * rate
                };
            }
        }
        log::trace!(
            "inspector: transition #{} changed {:?}",
            self.metrics.transitions,
            self.metrics.changed_keys
        );
    }
}

fn changed_keys(prev: &State, next: &State) -> Vec<String> {
    next.iter()
        .filter(|&(k, v)| prev.get(k) != Some(v))
        .map(|(k, _)| k.to_string())
        .collect()
}

pub struct Inspector {
    pub enabled: bool,
    channel: Channel,
    sub: Option<SubId>,
    tracker: Rc<RefCell<Tracker>>,
}

impl Inspector {
    pub fn attach(channel: &Channel) -> Self {
        let tracker = Rc::new(RefCell::new(Tracker {
            metrics: Metrics::default(),
            previous: (*channel.get_state()).clone(),
            last_at: None,
        }));
        let sub = {
            let tracker = tracker.clone();
            channel.subscribe(move |s| tracker.borrow_mut().observe(s))
        };
        log::debug!("inspector: attached");
        Self {
            enabled: false,
            channel: channel.clone(),
            sub: Some(sub),
            tracker,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn is_attached(&self) -> bool {
        self.sub.is_some()
    }

    pub fn metrics(&self) -> Metrics {
        let mut m = self.tracker.borrow().metrics.clone();
        let own = usize::from(self.sub.is_some());
        m.subscribers = self.channel.subscriber_count().saturating_sub(own);
        m
    }

    /// One HUD line, or `None` while disabled.
    pub fn overlay(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let m = self.metrics();
        let mut lines = vec![
            format!("transitions: {}", m.transitions),
            format!("subscribers: {}", m.subscribers),
            format!("rate: {:.1}/s", m.rate),
        ];
        if !m.changed_keys.is_empty() {
            lines.push(format!("changed: {}", m.changed_keys.join(", ")));
        }
        Some(lines.join("  |  "))
    }

    pub fn detach(&mut self) {
        if let Some(sub) = self.sub.take() {
            self.channel.unsubscribe(sub);
            log::debug!("inspector: detached");
        }
    }
}

impl Drop for Inspector {
    fn drop(&mut self) {
        self.detach();
    }
}
