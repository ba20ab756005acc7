//! VITA 40 indicator states.
//!
//! Indicator values are tokens such as `vita40_amber_slow`. Each maps to a
//! colour and a blink pattern driven by the refresh tick counter.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed GRB word as shifted out to the LED strip.
    pub fn to_grb(self) -> u32 {
        ((self.r as u32) << 8) | ((self.g as u32) << 16) | self.b as u32
    }

    pub fn is_off(self) -> bool {
        self == Self::OFF
    }

    /// Parse a six-digit hex colour such as the debug LED's `0A000A`.
    pub fn from_hex(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() != 6 || !text.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&text[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blink {
    Steady,
    /// Five ticks on, five off
    Slow,
    /// Alternate ticks
    Fast,
    /// One tick in ten
    Standby,
}

impl Blink {
    pub fn is_lit(self, counter: u32) -> bool {
        match self {
            Blink::Steady => true,
            Blink::Slow => (counter / 5) % 2 == 0,
            Blink::Fast => counter % 2 == 0,
            Blink::Standby => counter % 10 == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Off,
    Lit { colour: Rgb, blink: Blink },
}

const RED: Rgb = Rgb::new(10, 0, 0);
const WHITE: Rgb = Rgb::new(8, 8, 10);
const BLUE: Rgb = Rgb::new(0, 0, 10);
const AMBER: Rgb = Rgb::new(10, 10, 0);
const GREEN: Rgb = Rgb::new(0, 10, 0);

impl Indicator {
    /// Map an indicator token. Unrecognised tokens are dark.
    pub fn parse(token: &str) -> Self {
        let (colour, blink) = match token.trim() {
            "vita40_red_steady" => (RED, Blink::Steady),
            "vita40_white_fast" => (WHITE, Blink::Fast),
            "vita40_blue_steady" => (BLUE, Blink::Steady),
            "vita40_amber_slow" => (AMBER, Blink::Slow),
            "vita40_amber_steady" => (AMBER, Blink::Steady),
            "vita40_green_standby" => (GREEN, Blink::Standby),
            "vita40_green_steady" => (GREEN, Blink::Steady),
            "vita40_green_slow" => (GREEN, Blink::Slow),
            _ => return Indicator::Off,
        };
        Indicator::Lit { colour, blink }
    }

    /// True for any token in the VITA 40 family, recognised or not.
    pub fn is_indicator_token(token: &str) -> bool {
        token.starts_with("vita40_")
    }

    /// Colour to show on refresh tick `counter`.
    pub fn colour_at(&self, counter: u32) -> Rgb {
        match *self {
            Indicator::Lit { colour, blink } if blink.is_lit(counter) => colour,
            _ => Rgb::OFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_tokens() {
        assert_eq!(Indicator::parse("vita40_red_steady").colour_at(3), RED);
        assert_eq!(Indicator::parse("vita40_blue_steady").colour_at(7), BLUE);
        assert_eq!(Indicator::parse("vita40_off").colour_at(0), Rgb::OFF);
    }

    #[test]
    fn test_blink_patterns() {
        let fast = Indicator::parse("vita40_white_fast");
        assert_eq!(fast.colour_at(0), WHITE);
        assert_eq!(fast.colour_at(1), Rgb::OFF);

        let slow = Indicator::parse("vita40_amber_slow");
        let lit: Vec<bool> = (0..10).map(|n| !slow.colour_at(n).is_off()).collect();
        assert_eq!(lit, [true, true, true, true, true, false, false, false, false, false]);

        let standby = Indicator::parse("vita40_green_standby");
        let lit = (0..30).filter(|n| !standby.colour_at(*n).is_off()).count();
        assert_eq!(lit, 3);
    }

    #[test]
    fn test_unknown_tokens_are_off() {
        for token in ["vita40_white_steady", "vita40_green_feedback", "WAITING", ""] {
            assert_eq!(Indicator::parse(token), Indicator::Off, "{}", token);
        }
        assert!(Indicator::is_indicator_token("vita40_white_steady"));
        assert!(!Indicator::is_indicator_token("WAITING"));
    }

    #[test]
    fn test_grb_packing() {
        assert_eq!(RED.to_grb(), 0x00_0A_00);
        assert_eq!(GREEN.to_grb(), 0x0A_00_00);
        assert_eq!(WHITE.to_string(), "08080A");
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(Rgb::from_hex("0A000A"), Some(Rgb::new(10, 0, 10)));
        assert_eq!(Rgb::from_hex("ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::from_hex("0A00"), None);
        assert_eq!(Rgb::from_hex("GG0000"), None);
    }
}
