//! Periodic refresh
//!
//! Runs on the refresh timer: keeps `Device Uptime` and `Device Time`
//! current, works out which values need redrawing and computes every
//! indicator colour for the current blink phase.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use snon::{ENTITIES, EntityClass, SharedStore};

use crate::clock::{self, Clock};
use crate::display::{ChangeTracker, Scaled, format_si};
use crate::indicator::{Indicator, Rgb};
use crate::profiles::{DEBUG_LED, DEVICE_TIME, DEVICE_UPTIME};

/// Result of one refresh tick.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub counter: u32,
    /// Values changed since the previous tick, in registration order
    pub redraw: Vec<String>,
    /// Numeric values among `redraw`, scaled for display
    pub readings: Vec<(String, Scaled)>,
    /// Colour of every indicator value for this tick
    pub indicators: Vec<(String, Rgb)>,
    pub debug_led: Option<Rgb>,
}

pub struct Refresher {
    store: SharedStore,
    clock: Arc<Clock>,
    tracker: ChangeTracker,
    counter: u32,
    last_uptime: Option<u64>,
    last_time: Option<String>,
}

impl Refresher {
    pub fn new(store: SharedStore, clock: Arc<Clock>) -> Self {
        Self {
            tracker: ChangeTracker::new(store.clone()),
            store,
            clock,
            counter: 0,
            last_uptime: None,
            last_time: None,
        }
    }

    /// Redraw everything on the next tick.
    pub fn invalidate(&mut self) {
        self.tracker.invalidate();
    }

    pub fn tick(&mut self) -> Frame {
        self.update_clock_values();

        let values: Vec<(String, Option<String>)> = self.store.read(|tables| {
            tables
                .entities()
                .iter()
                .filter(|entity| entity.class == EntityClass::Value && entity.name != ENTITIES)
                .map(|entity| (entity.name.clone(), entity.values.first().cloned()))
                .collect()
        });

        let mut frame = Frame {
            counter: self.counter,
            ..Frame::default()
        };
        frame.redraw = self
            .tracker
            .poll_all(values.iter().map(|(name, _)| name.as_str()))
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in &frame.redraw {
            if let Ok(value) = self.store.try_get_as_number(name) {
                frame.readings.push((name.clone(), format_si(value)));
            }
        }

        for (name, token) in values {
            let Some(token) = token else { continue };
            if name == DEBUG_LED {
                frame.debug_led = Rgb::from_hex(&token);
            } else if Indicator::is_indicator_token(&token) {
                let colour = Indicator::parse(&token).colour_at(self.counter);
                frame.indicators.push((name, colour));
            }
        }

        self.counter = self.counter.wrapping_add(1);
        frame
    }

    /// Tick every `period` until the task is dropped. A notification on
    /// `redraw` forces a full redraw straight away.
    pub async fn run(mut self, period: Duration, redraw: Arc<Notify>) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = redraw.notified() => self.invalidate(),
            }

            let frame = self.tick();
            if !frame.redraw.is_empty() {
                debug!("Tick {}: redraw {:?}", frame.counter, frame.redraw);
            }
            for (name, reading) in &frame.readings {
                trace!("{} = {}", name, reading);
            }
            for (name, colour) in &frame.indicators {
                trace!("{} -> {} ({:06X})", name, colour, colour.to_grb());
            }
            if let Some(led) = frame.debug_led {
                trace!("Debug LED {}", led);
            }
        }
    }

    fn update_clock_values(&mut self) {
        let uptime = self.clock.uptime().as_secs();
        if self.last_uptime != Some(uptime) {
            match self.store.set_value(DEVICE_UPTIME, uptime.to_string()) {
                Ok(_) => self.last_uptime = Some(uptime),
                Err(e) => warn!("Failed to update {}: {}", DEVICE_UPTIME, e),
            }
        }

        let Some(now) = self.clock.now() else {
            return;
        };
        let formatted = clock::format_time(now);
        if self.last_time.as_deref() != Some(formatted.as_str()) {
            match self.store.set_value(DEVICE_TIME, formatted.as_str()) {
                Ok(_) => self.last_time = Some(formatted),
                Err(e) => warn!("Failed to update {}: {}", DEVICE_TIME, e),
            }
        }
    }
}
