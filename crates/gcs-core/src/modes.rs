//! Flight-mode vocabulary (ArduCopter custom-mode numbering).

use std::fmt;

/// Simulator-only mode string for "hold position"; it has no numeric id.
pub const HOLD: &str = "HOLD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightMode {
    Stabilize,
    Acro,
    AltHold,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Circle,
    Land,
    Drift,
    Sport,
    Flip,
    Autotune,
    PosHold,
    Brake,
    /// A custom mode id outside the known table.
    Unrecognized(u32),
}

const KNOWN: [(FlightMode, u32, &str); 15] = [
    (FlightMode::Stabilize, 0, "STABILIZE"),
    (FlightMode::Acro, 1, "ACRO"),
    (FlightMode::AltHold, 2, "ALT_HOLD"),
    (FlightMode::Auto, 3, "AUTO"),
    (FlightMode::Guided, 4, "GUIDED"),
    (FlightMode::Loiter, 5, "LOITER"),
    (FlightMode::Rtl, 6, "RTL"),
    (FlightMode::Circle, 7, "CIRCLE"),
    (FlightMode::Land, 9, "LAND"),
    (FlightMode::Drift, 11, "DRIFT"),
    (FlightMode::Sport, 13, "SPORT"),
    (FlightMode::Flip, 14, "FLIP"),
    (FlightMode::Autotune, 15, "AUTOTUNE"),
    (FlightMode::PosHold, 16, "POSHOLD"),
    (FlightMode::Brake, 17, "BRAKE"),
];

impl FlightMode {
    /// Decode the heartbeat's custom mode field.
    pub fn from_custom_mode(id: u32) -> Self {
        KNOWN
            .iter()
            .find(|(_, known, _)| *known == id)
            .map(|(mode, _, _)| *mode)
            .unwrap_or(FlightMode::Unrecognized(id))
    }

    /// Case-insensitive lookup of a known mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        KNOWN
            .iter()
            .find(|(_, _, known)| known.eq_ignore_ascii_case(name))
            .map(|(mode, _, _)| *mode)
    }

    pub fn custom_mode(self) -> u32 {
        match self {
            FlightMode::Unrecognized(id) => id,
            known => KNOWN
                .iter()
                .find(|(mode, _, _)| *mode == known)
                .map(|(_, id, _)| *id)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Unrecognized(id) => write!(f, "MODE_{id}"),
            known => {
                let name = KNOWN
                    .iter()
                    .find(|(mode, _, _)| mode == known)
                    .map(|(_, _, name)| *name)
                    .unwrap_or("UNKNOWN");
                f.write_str(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ids_round_trip() {
        for (mode, id, name) in KNOWN {
            assert_eq!(FlightMode::from_custom_mode(id), mode);
            assert_eq!(mode.custom_mode(), id);
            assert_eq!(mode.to_string(), name);
        }
    }

    #[test]
    fn test_unrecognized_mode_label() {
        let mode = FlightMode::from_custom_mode(21);
        assert_eq!(mode, FlightMode::Unrecognized(21));
        assert_eq!(mode.to_string(), "MODE_21");
        assert_eq!(mode.custom_mode(), 21);
    }

    #[test]
    fn test_name_lookup_ignores_case() {
        assert_eq!(FlightMode::from_name("guided"), Some(FlightMode::Guided));
        assert_eq!(FlightMode::from_name("PosHold"), Some(FlightMode::PosHold));
        assert_eq!(FlightMode::from_name(HOLD), None);
        assert_eq!(FlightMode::from_name("MODE_21"), None);
    }
}
