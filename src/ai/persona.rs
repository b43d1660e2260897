//! Computer-opponent personas
//!
//! A persona is an immutable record of how well a computer player aims and
//! how adventurous its shot choice is. Rosters load from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How far down the ranked candidate list a persona may pick from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionBreadth {
    /// Always the best-scoring candidate
    Best,
    /// Uniformly among the best `n`
    Top(usize),
    /// Uniformly among the best fraction of candidates (0.5 = top half)
    Fraction(f64),
}

impl SelectionBreadth {
    /// Number of candidates to choose from out of `available`
    pub fn pool_size(&self, available: usize) -> usize {
        if available == 0 {
            return 0;
        }
        let n = match *self {
            SelectionBreadth::Best => 1,
            SelectionBreadth::Top(n) => n,
            SelectionBreadth::Fraction(f) => (available as f64 * f.clamp(0.0, 1.0)).ceil() as usize,
        };
        n.clamp(1, available)
    }
}

/// AI difficulty parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    /// Aim noise half-width (degrees)
    pub aim_error_deg: f64,
    /// Power noise half-width as a fraction of the planned power
    pub power_error: f64,
    pub selection: SelectionBreadth,
    /// Presentation-only pause before shooting; the planner ignores it
    pub thinking_delay_ms: u64,
    /// Compare top candidates by simulating where the cue ball ends up
    pub lookahead: bool,
    /// Compensate aim with the fitted aim-error model when one is loaded
    pub use_aim_model: bool,
}

impl Default for Persona {
    fn default() -> Self {
        Self::intermediate()
    }
}

impl Persona {
    pub fn novice() -> Self {
        Self {
            name: "Novice".to_string(),
            aim_error_deg: 4.0,
            power_error: 0.15,
            selection: SelectionBreadth::Fraction(0.5),
            thinking_delay_ms: 1500,
            lookahead: false,
            use_aim_model: false,
        }
    }

    pub fn intermediate() -> Self {
        Self {
            name: "Intermediate".to_string(),
            aim_error_deg: 1.5,
            power_error: 0.08,
            selection: SelectionBreadth::Top(3),
            thinking_delay_ms: 1000,
            lookahead: false,
            use_aim_model: false,
        }
    }

    pub fn expert() -> Self {
        Self {
            name: "Expert".to_string(),
            aim_error_deg: 0.4,
            power_error: 0.03,
            selection: SelectionBreadth::Best,
            thinking_delay_ms: 700,
            lookahead: true,
            use_aim_model: true,
        }
    }

    /// No noise at all; used for calibration and tests
    pub fn perfect() -> Self {
        Self {
            name: "Perfect".to_string(),
            aim_error_deg: 0.0,
            power_error: 0.0,
            selection: SelectionBreadth::Best,
            thinking_delay_ms: 0,
            lookahead: false,
            use_aim_model: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.aim_error_deg >= 0.0 && self.aim_error_deg < 90.0) {
            return Err(Error::InvalidConfig(format!(
                "persona {}: aim_error_deg must be in [0, 90)",
                self.name
            )));
        }
        if !(self.power_error >= 0.0 && self.power_error < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "persona {}: power_error must be in [0, 1)",
                self.name
            )));
        }
        match self.selection {
            SelectionBreadth::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(Error::InvalidConfig(format!(
                "persona {}: selection fraction must be in (0, 1]",
                self.name
            ))),
            SelectionBreadth::Top(0) => Err(Error::InvalidConfig(format!(
                "persona {}: selection must keep at least one candidate",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Named personas available to a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaRoster {
    personas: Vec<Persona>,
}

impl Default for PersonaRoster {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaRoster {
    pub fn builtin() -> Self {
        Self {
            personas: vec![
                Persona::novice(),
                Persona::intermediate(),
                Persona::expert(),
                Persona::perfect(),
            ],
        }
    }

    /// Parse a JSON array of personas
    pub fn from_json_str(json: &str) -> Result<Self> {
        let roster: PersonaRoster = serde_json::from_str(json)?;
        if roster.personas.is_empty() {
            return Err(Error::InvalidConfig("persona roster is empty".to_string()));
        }
        for persona in &roster.personas {
            persona.validate()?;
        }
        Ok(roster)
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from disk, falling back to the built-in roster
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(roster) => {
                log::info!("Loaded {} personas from {}", roster.len(), path.display());
                roster
            }
            Err(e) => {
                log::warn!("Could not load personas from {}: {}, using built-in roster", path.display(), e);
                Self::builtin()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        assert_eq!(SelectionBreadth::Best.pool_size(10), 1);
        assert_eq!(SelectionBreadth::Top(3).pool_size(10), 3);
        assert_eq!(SelectionBreadth::Top(3).pool_size(2), 2);
        assert_eq!(SelectionBreadth::Fraction(0.5).pool_size(7), 4);
        assert_eq!(SelectionBreadth::Fraction(0.5).pool_size(1), 1);
        assert_eq!(SelectionBreadth::Top(3).pool_size(0), 0);
    }

    #[test]
    fn test_builtin_personas_are_valid() {
        let roster = PersonaRoster::builtin();
        assert_eq!(roster.len(), 4);
        for persona in roster.iter() {
            persona.validate().unwrap();
        }
        assert_eq!(roster.get("expert").map(|p| p.selection), Some(SelectionBreadth::Best));
    }

    #[test]
    fn test_roster_from_json() {
        let json = r#"[
            {"name": "Shark", "aim_error_deg": 0.2, "selection": {"Top": 2}},
            {"name": "Rookie", "power_error": 0.3, "selection": {"Fraction": 0.5}}
        ]"#;
        let roster = PersonaRoster::from_json_str(json).unwrap();
        assert_eq!(roster.len(), 2);
        let shark = roster.get("Shark").unwrap();
        assert_eq!(shark.aim_error_deg, 0.2);
        assert_eq!(shark.selection, SelectionBreadth::Top(2));
        // Unspecified fields come from the default persona
        assert_eq!(shark.power_error, Persona::intermediate().power_error);
    }

    #[test]
    fn test_roster_rejects_bad_persona() {
        let json = r#"[{"name": "Wild", "power_error": 1.5}]"#;
        assert!(matches!(PersonaRoster::from_json_str(json), Err(Error::InvalidConfig(_))));
        assert!(matches!(PersonaRoster::from_json_str("[]"), Err(Error::InvalidConfig(_))));
        assert!(matches!(PersonaRoster::from_json_str("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let roster = PersonaRoster::load("/nonexistent/personas.json");
        assert_eq!(roster, PersonaRoster::builtin());
    }
}
