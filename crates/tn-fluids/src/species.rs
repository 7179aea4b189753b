//! Substances with CoolProp equations of state.

use crate::wrapper::FluidBounds;

/// Pure substances the CoolProp backend can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    /// Water (H₂O)
    H2O,
    /// Nitrogen (N₂)
    N2,
    /// Oxygen (O₂)
    O2,
    /// Air (pseudo-pure backend fluid)
    Air,
    /// Carbon dioxide (CO₂)
    CO2,
    /// Argon (Ar)
    Ar,
    /// Methane (CH₄)
    CH4,
    /// Hydrogen (H₂)
    H2,
    /// Helium (He)
    He,
    /// Ammonia (NH₃)
    Ammonia,
    /// Propane
    Propane,
    /// Refrigerant R134a
    R134a,
}

impl Species {
    pub const ALL: [Species; 12] = [
        Species::H2O,
        Species::N2,
        Species::O2,
        Species::Air,
        Species::CO2,
        Species::Ar,
        Species::CH4,
        Species::H2,
        Species::He,
        Species::Ammonia,
        Species::Propane,
        Species::R134a,
    ];

    /// Canonical registry key.
    pub fn key(&self) -> &'static str {
        match self {
            Species::H2O => "water",
            Species::N2 => "N2",
            Species::O2 => "O2",
            Species::Air => "air",
            Species::CO2 => "CO2",
            Species::Ar => "Ar",
            Species::CH4 => "CH4",
            Species::H2 => "H2",
            Species::He => "He",
            Species::Ammonia => "NH3",
            Species::Propane => "propane",
            Species::R134a => "R134a",
        }
    }

    /// Map to the rfluids substance.
    #[cfg(feature = "coolprop")]
    pub(crate) fn rfluids_pure(&self) -> rfluids::substance::Pure {
        use rfluids::substance::Pure;
        match self {
            Species::H2O => Pure::Water,
            Species::N2 => Pure::Nitrogen,
            Species::O2 => Pure::Oxygen,
            Species::Air => Pure::Air,
            Species::CO2 => Pure::CarbonDioxide,
            Species::Ar => Pure::Argon,
            Species::CH4 => Pure::Methane,
            Species::H2 => Pure::Hydrogen,
            Species::He => Pure::Helium,
            Species::Ammonia => Pure::Ammonia,
            Species::Propane => Pure::nPropane,
            Species::R134a => Pure::R134a,
        }
    }

    /// Molar mass [kg/mol].
    pub fn molar_mass(&self) -> f64 {
        match self {
            Species::H2O => 0.018_015,
            Species::N2 => 0.028_014,
            Species::O2 => 0.031_999,
            Species::Air => 0.028_965,
            Species::CO2 => 0.044_010,
            Species::Ar => 0.039_948,
            Species::CH4 => 0.016_043,
            Species::H2 => 0.002_016,
            Species::He => 0.004_003,
            Species::Ammonia => 0.017_031,
            Species::Propane => 0.044_097,
            Species::R134a => 0.102_032,
        }
    }

    /// Validity window of the reference equation of state: triple point
    /// pressure and temperature up to the published upper limits.
    pub fn eos_bounds(&self) -> FluidBounds {
        let (p_min, p_max, t_min, t_max) = match self {
            Species::H2O => (611.655, 1e9, 273.16, 2000.0),
            Species::N2 => (12_523.0, 2.2e9, 63.151, 2000.0),
            Species::O2 => (146.28, 8e7, 54.361, 2000.0),
            Species::Air => (5265.0, 2e9, 59.75, 2000.0),
            Species::CO2 => (517_950.0, 8e8, 216.592, 2000.0),
            Species::Ar => (68_891.0, 1e9, 83.806, 2000.0),
            Species::CH4 => (11_696.0, 1e9, 90.694, 625.0),
            Species::H2 => (7357.8, 2e9, 13.957, 1000.0),
            Species::He => (5033.5, 1e9, 2.1768, 2000.0),
            Species::Ammonia => (6091.2, 1e9, 195.495, 700.0),
            Species::Propane => (1.7e-4, 1e9, 85.525, 650.0),
            Species::R134a => (389.56, 7e7, 169.85, 455.0),
        };
        FluidBounds::new(p_min, p_max, t_min, t_max)
    }
}

impl core::str::FromStr for Species {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "H2O" | "WATER" => Ok(Species::H2O),
            "N2" | "NITROGEN" => Ok(Species::N2),
            "O2" | "OXYGEN" => Ok(Species::O2),
            "AIR" => Ok(Species::Air),
            "CO2" | "CARBONDIOXIDE" | "CARBON DIOXIDE" => Ok(Species::CO2),
            "AR" | "ARGON" => Ok(Species::Ar),
            "CH4" | "METHANE" => Ok(Species::CH4),
            "H2" | "HYDROGEN" => Ok(Species::H2),
            "HE" | "HELIUM" => Ok(Species::He),
            "NH3" | "AMMONIA" => Ok(Species::Ammonia),
            "PROPANE" | "C3H8" | "N-PROPANE" => Ok(Species::Propane),
            "R134A" => Ok(Species::R134a),
            _ => Err("unknown species"),
        }
    }
}
