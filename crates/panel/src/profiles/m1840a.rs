//! 1840A edge display: bus designator title and three phase currents with
//! their alarm thresholds, drawn as bar graphs.

use snon::{Batch, EntityClass, Result};

use super::THRESHOLDS;

pub const BUS_DESIGNATOR: &str = "Bus Designator";

pub(super) fn wire(batch: &mut Batch<'_>) -> Result<()> {
    batch
        .register(BUS_DESIGNATOR, EntityClass::Value, None)
        .set_value(BUS_DESIGNATOR, "WAITING");

    // Plain values, written directly by the host over the console
    for phase in 1..=3 {
        for (suffix, initial) in THRESHOLDS {
            let name = format!("L{} Current{}", phase, suffix);
            batch
                .register(name.as_str(), EntityClass::Value, None)
                .set_value(name, initial);
        }
    }
    Ok(())
}
