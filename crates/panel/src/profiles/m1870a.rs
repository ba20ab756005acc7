//! 1870A annunciator: a single panel of fifteen indicator windows.

use snon::{Batch, EntityClass, Result};

use super::designated;

pub const PANEL: &str = "=P01";
pub const WINDOW_COUNT: usize = 15;

/// Initial state of every window.
pub const WINDOW_INITIAL: &str = "vita40_white_steady";

/// Designation of window `n` (1-based).
pub fn window(n: usize) -> String {
    format!("{}=PFA{:02}", PANEL, n)
}

pub(super) fn wire(batch: &mut Batch<'_>) -> Result<()> {
    designated(batch, PANEL, EntityClass::Device, None)?;
    for n in 1..=WINDOW_COUNT {
        designated(batch, &window(n), EntityClass::Value, Some(WINDOW_INITIAL))?;
    }
    Ok(())
}
