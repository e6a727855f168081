//! Vendor AT command decoding
//!
//! Headsets report accessory state through `+IPHONEACCEV`, whose argument
//! vector is `[n, key1, value1, key2, value2, ...]` with `n` key/value
//! pairs. Key 1 is the battery level, encoded 0..=9.

use crate::broadcast::{VendorArg, VendorCommand};
use crate::error::{HeadsetError, HeadsetResult};

/// Accessory event command name
pub const IPHONEACCEV: &str = "+IPHONEACCEV";

/// Key of the battery level pair
pub const BATTERY_KEY: i32 = 1;

/// Highest encoded battery value
pub const BATTERY_MAX_VALUE: i32 = 9;

/// Decode the battery level carried by an `+IPHONEACCEV` argument vector.
///
/// Returns `Ok(None)` for a well-formed vector without a battery pair.
/// Pairs that are not two integers are skipped.
pub fn parse_battery_level(args: &[VendorArg]) -> HeadsetResult<Option<f32>> {
    let malformed = |reason: String| HeadsetError::broadcast_parse(IPHONEACCEV, reason);

    if args.len() < 3 {
        return Err(malformed(format!("expected at least 3 arguments, got {}", args.len())));
    }
    let Some(pairs) = args[0].as_int() else {
        return Err(malformed("pair count is not an integer".to_string()));
    };
    if pairs < 0 || pairs as usize * 2 + 1 > args.len() {
        return Err(malformed(format!(
            "pair count {} does not fit {} arguments",
            pairs,
            args.len()
        )));
    }

    for pair in args[1..].chunks_exact(2).take(pairs as usize) {
        let (Some(key), Some(value)) = (pair[0].as_int(), pair[1].as_int()) else {
            continue;
        };
        if key != BATTERY_KEY {
            continue;
        }
        if !(0..=BATTERY_MAX_VALUE).contains(&value) {
            return Err(malformed(format!("battery value {} out of range", value)));
        }
        return Ok(Some((value + 1) as f32 / 10.0));
    }
    Ok(None)
}

impl VendorCommand {
    /// Whether this is an accessory event report
    pub fn is_accessory_event(&self) -> bool {
        self.command == IPHONEACCEV
    }

    /// Battery level reported by this command, if it is an accessory
    /// event carrying one
    pub fn battery_level(&self) -> HeadsetResult<Option<f32>> {
        if !self.is_accessory_event() {
            return Ok(None);
        }
        parse_battery_level(&self.args)
    }
}
