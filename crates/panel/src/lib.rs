//! Front-panel host
//!
//! Boots a SNON store wired for one of the 1840A/1841A/1870A panel models,
//! answers the line-oriented console and drives the refresh timer that keeps
//! device time, uptime and indicator colours current.

pub mod clock;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod host;
pub mod indicator;
pub mod profiles;

pub use clock::Clock;
pub use config::PanelConfig;
pub use console::{Console, Reply};
pub use display::{ChangeTracker, Scaled, format_si};
pub use error::{Error, Result};
pub use host::{Frame, Refresher};
pub use indicator::{Blink, Indicator, Rgb};
pub use profiles::Model;
