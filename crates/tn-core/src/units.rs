// tn-core/src/units.rs

use core::fmt;
use core::str::FromStr;

use uom::si::f64::{
    AvailableEnergy as UomAvailableEnergy, Mass as UomMass, MassRate as UomMassRate,
    Pressure as UomPressure, SpecificHeatCapacity as UomSpecificHeatCapacity,
    SpecificVolume as UomSpecificVolume, TemperatureInterval as UomTemperatureInterval,
    ThermodynamicTemperature as UomThermodynamicTemperature, Time as UomTime,
    Volume as UomVolume, VolumeRate as UomVolumeRate,
};

use crate::error::{TnError, TnResult};

// Public canonical unit types (SI, f64)
pub type MassRate = UomMassRate;
pub type Pressure = UomPressure;
pub type SpecEnthalpy = UomAvailableEnergy;
pub type SpecEntropy = UomSpecificHeatCapacity;
pub type SpecVolume = UomSpecificVolume;
pub type Temperature = UomThermodynamicTemperature;
pub type TempInterval = UomTemperatureInterval;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn kgps(v: f64) -> MassRate {
    use uom::si::mass_rate::kilogram_per_second;
    MassRate::new::<kilogram_per_second>(v)
}

#[inline]
pub fn jpkg(v: f64) -> SpecEnthalpy {
    use uom::si::available_energy::joule_per_kilogram;
    SpecEnthalpy::new::<joule_per_kilogram>(v)
}

/// Physical quantity a property container holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyKind {
    MassFlow,
    Pressure,
    Enthalpy,
    Temperature,
    VolumetricFlow,
    SpecificVolume,
    Entropy,
    Fraction,
}

impl PropertyKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::MassFlow => "mass flow",
            Self::Pressure => "pressure",
            Self::Enthalpy => "enthalpy",
            Self::Temperature => "temperature",
            Self::VolumetricFlow => "volumetric flow",
            Self::SpecificVolume => "specific volume",
            Self::Entropy => "entropy",
            Self::Fraction => "fraction",
        }
    }

    /// Unit every value of this kind is stored in internally.
    pub fn si_unit(self) -> Unit {
        match self {
            Self::MassFlow => Unit::KilogramPerSecond,
            Self::Pressure => Unit::Pascal,
            Self::Enthalpy => Unit::JoulePerKilogram,
            Self::Temperature => Unit::Kelvin,
            Self::VolumetricFlow => Unit::CubicMeterPerSecond,
            Self::SpecificVolume => Unit::CubicMeterPerKilogram,
            Self::Entropy => Unit::JoulePerKilogramKelvin,
            Self::Fraction => Unit::Dimensionless,
        }
    }
}

/// User facing units accepted by property containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    #[cfg_attr(feature = "serde", serde(rename = "kg/s"))]
    KilogramPerSecond,
    #[cfg_attr(feature = "serde", serde(rename = "t/h"))]
    TonPerHour,
    #[cfg_attr(feature = "serde", serde(rename = "Pa"))]
    Pascal,
    #[cfg_attr(feature = "serde", serde(rename = "kPa"))]
    Kilopascal,
    #[cfg_attr(feature = "serde", serde(rename = "bar"))]
    Bar,
    #[cfg_attr(feature = "serde", serde(rename = "MPa"))]
    Megapascal,
    #[cfg_attr(feature = "serde", serde(rename = "psi"))]
    Psi,
    #[cfg_attr(feature = "serde", serde(rename = "J/kg"))]
    JoulePerKilogram,
    #[cfg_attr(feature = "serde", serde(rename = "kJ/kg"))]
    KilojoulePerKilogram,
    #[cfg_attr(feature = "serde", serde(rename = "K"))]
    Kelvin,
    #[cfg_attr(feature = "serde", serde(rename = "C"))]
    Celsius,
    #[cfg_attr(feature = "serde", serde(rename = "F"))]
    Fahrenheit,
    #[cfg_attr(feature = "serde", serde(rename = "m3/s"))]
    CubicMeterPerSecond,
    #[cfg_attr(feature = "serde", serde(rename = "l/s"))]
    LiterPerSecond,
    #[cfg_attr(feature = "serde", serde(rename = "m3/h"))]
    CubicMeterPerHour,
    #[cfg_attr(feature = "serde", serde(rename = "m3/kg"))]
    CubicMeterPerKilogram,
    #[cfg_attr(feature = "serde", serde(rename = "J/kgK"))]
    JoulePerKilogramKelvin,
    #[cfg_attr(feature = "serde", serde(rename = "kJ/kgK"))]
    KilojoulePerKilogramKelvin,
    #[cfg_attr(feature = "serde", serde(rename = "-"))]
    Dimensionless,
}

impl Unit {
    pub fn kind(self) -> PropertyKind {
        match self {
            Self::KilogramPerSecond | Self::TonPerHour => PropertyKind::MassFlow,
            Self::Pascal | Self::Kilopascal | Self::Bar | Self::Megapascal | Self::Psi => {
                PropertyKind::Pressure
            }
            Self::JoulePerKilogram | Self::KilojoulePerKilogram => PropertyKind::Enthalpy,
            Self::Kelvin | Self::Celsius | Self::Fahrenheit => PropertyKind::Temperature,
            Self::CubicMeterPerSecond | Self::LiterPerSecond | Self::CubicMeterPerHour => {
                PropertyKind::VolumetricFlow
            }
            Self::CubicMeterPerKilogram => PropertyKind::SpecificVolume,
            Self::JoulePerKilogramKelvin | Self::KilojoulePerKilogramKelvin => {
                PropertyKind::Entropy
            }
            Self::Dimensionless => PropertyKind::Fraction,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::KilogramPerSecond => "kg/s",
            Self::TonPerHour => "t/h",
            Self::Pascal => "Pa",
            Self::Kilopascal => "kPa",
            Self::Bar => "bar",
            Self::Megapascal => "MPa",
            Self::Psi => "psi",
            Self::JoulePerKilogram => "J/kg",
            Self::KilojoulePerKilogram => "kJ/kg",
            Self::Kelvin => "K",
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
            Self::CubicMeterPerSecond => "m3/s",
            Self::LiterPerSecond => "l/s",
            Self::CubicMeterPerHour => "m3/h",
            Self::CubicMeterPerKilogram => "m3/kg",
            Self::JoulePerKilogramKelvin => "J/kgK",
            Self::KilojoulePerKilogramKelvin => "kJ/kgK",
            Self::Dimensionless => "-",
        }
    }

    /// Convert an absolute value in this unit to SI.
    pub fn to_si(self, v: f64) -> f64 {
        use uom::si::{
            available_energy as ae, mass, mass_rate, pressure, specific_heat_capacity as shc,
            specific_volume as sv, thermodynamic_temperature as tt, time, volume, volume_rate,
        };
        match self {
            Self::KilogramPerSecond => {
                MassRate::new::<mass_rate::kilogram_per_second>(v)
                    .get::<mass_rate::kilogram_per_second>()
            }
            Self::TonPerHour => {
                let rate: MassRate =
                    UomMass::new::<mass::ton>(v) / UomTime::new::<time::hour>(1.0);
                rate.get::<mass_rate::kilogram_per_second>()
            }
            Self::Pascal => Pressure::new::<pressure::pascal>(v).get::<pressure::pascal>(),
            Self::Kilopascal => Pressure::new::<pressure::kilopascal>(v).get::<pressure::pascal>(),
            Self::Bar => Pressure::new::<pressure::bar>(v).get::<pressure::pascal>(),
            Self::Megapascal => Pressure::new::<pressure::megapascal>(v).get::<pressure::pascal>(),
            Self::Psi => Pressure::new::<pressure::pound_force_per_square_inch>(v)
                .get::<pressure::pascal>(),
            Self::JoulePerKilogram => {
                SpecEnthalpy::new::<ae::joule_per_kilogram>(v).get::<ae::joule_per_kilogram>()
            }
            Self::KilojoulePerKilogram => {
                SpecEnthalpy::new::<ae::kilojoule_per_kilogram>(v).get::<ae::joule_per_kilogram>()
            }
            Self::Kelvin => Temperature::new::<tt::kelvin>(v).get::<tt::kelvin>(),
            Self::Celsius => Temperature::new::<tt::degree_celsius>(v).get::<tt::kelvin>(),
            Self::Fahrenheit => Temperature::new::<tt::degree_fahrenheit>(v).get::<tt::kelvin>(),
            Self::CubicMeterPerSecond => VolumeRate::new::<volume_rate::cubic_meter_per_second>(v)
                .get::<volume_rate::cubic_meter_per_second>(),
            Self::LiterPerSecond => VolumeRate::new::<volume_rate::liter_per_second>(v)
                .get::<volume_rate::cubic_meter_per_second>(),
            Self::CubicMeterPerHour => {
                let rate: VolumeRate =
                    UomVolume::new::<volume::cubic_meter>(v) / UomTime::new::<time::hour>(1.0);
                rate.get::<volume_rate::cubic_meter_per_second>()
            }
            Self::CubicMeterPerKilogram => SpecVolume::new::<sv::cubic_meter_per_kilogram>(v)
                .get::<sv::cubic_meter_per_kilogram>(),
            Self::JoulePerKilogramKelvin => SpecEntropy::new::<shc::joule_per_kilogram_kelvin>(v)
                .get::<shc::joule_per_kilogram_kelvin>(),
            Self::KilojoulePerKilogramKelvin => {
                SpecEntropy::new::<shc::kilojoule_per_kilogram_kelvin>(v)
                    .get::<shc::joule_per_kilogram_kelvin>()
            }
            Self::Dimensionless => v,
        }
    }

    /// Convert an SI value back to this unit.
    pub fn from_si(self, v: f64) -> f64 {
        use uom::si::{pressure, thermodynamic_temperature as tt};
        match self {
            Self::Celsius => Temperature::new::<tt::kelvin>(v).get::<tt::degree_celsius>(),
            Self::Fahrenheit => Temperature::new::<tt::kelvin>(v).get::<tt::degree_fahrenheit>(),
            Self::Psi => {
                Pressure::new::<pressure::pascal>(v).get::<pressure::pound_force_per_square_inch>()
            }
            // every other unit is a pure scale of its SI counterpart
            _ => v / self.to_si(1.0),
        }
    }

    /// Convert a difference (no offset) in this unit to SI.
    pub fn delta_to_si(self, v: f64) -> f64 {
        use uom::si::temperature_interval as ti;
        match self {
            Self::Celsius => TempInterval::new::<ti::degree_celsius>(v).get::<ti::kelvin>(),
            Self::Fahrenheit => TempInterval::new::<ti::degree_fahrenheit>(v).get::<ti::kelvin>(),
            _ => self.to_si(v) - self.to_si(0.0),
        }
    }

    /// Convert an SI difference back to this unit.
    pub fn delta_from_si(self, v: f64) -> f64 {
        v / self.delta_to_si(1.0)
    }

    /// Reject a unit that cannot express `kind`.
    pub fn ensure_kind(self, kind: PropertyKind) -> TnResult<Self> {
        if self.kind() == kind {
            Ok(self)
        } else {
            Err(TnError::UnitMismatch {
                unit: self.symbol().to_string(),
                kind: kind.name(),
            })
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = TnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Unit; 19] = [
            Unit::KilogramPerSecond,
            Unit::TonPerHour,
            Unit::Pascal,
            Unit::Kilopascal,
            Unit::Bar,
            Unit::Megapascal,
            Unit::Psi,
            Unit::JoulePerKilogram,
            Unit::KilojoulePerKilogram,
            Unit::Kelvin,
            Unit::Celsius,
            Unit::Fahrenheit,
            Unit::CubicMeterPerSecond,
            Unit::LiterPerSecond,
            Unit::CubicMeterPerHour,
            Unit::CubicMeterPerKilogram,
            Unit::JoulePerKilogramKelvin,
            Unit::KilojoulePerKilogramKelvin,
            Unit::Dimensionless,
        ];
        ALL.into_iter()
            .find(|u| u.symbol().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TnError::UnknownUnit {
                symbol: s.to_string(),
            })
    }
}

/// Network wide default units, one per property kind.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitSystem {
    pub mass_flow: Unit,
    pub pressure: Unit,
    pub enthalpy: Unit,
    pub temperature: Unit,
    pub volumetric_flow: Unit,
    pub specific_volume: Unit,
    pub entropy: Unit,
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self {
            mass_flow: Unit::KilogramPerSecond,
            pressure: Unit::Pascal,
            enthalpy: Unit::JoulePerKilogram,
            temperature: Unit::Kelvin,
            volumetric_flow: Unit::CubicMeterPerSecond,
            specific_volume: Unit::CubicMeterPerKilogram,
            entropy: Unit::JoulePerKilogramKelvin,
        }
    }
}

impl UnitSystem {
    pub fn unit_for(&self, kind: PropertyKind) -> Unit {
        match kind {
            PropertyKind::MassFlow => self.mass_flow,
            PropertyKind::Pressure => self.pressure,
            PropertyKind::Enthalpy => self.enthalpy,
            PropertyKind::Temperature => self.temperature,
            PropertyKind::VolumetricFlow => self.volumetric_flow,
            PropertyKind::SpecificVolume => self.specific_volume,
            PropertyKind::Entropy => self.entropy,
            PropertyKind::Fraction => Unit::Dimensionless,
        }
    }

    /// Replace the default unit of the matching kind.
    pub fn with_unit(mut self, unit: Unit) -> Self {
        match unit.kind() {
            PropertyKind::MassFlow => self.mass_flow = unit,
            PropertyKind::Pressure => self.pressure = unit,
            PropertyKind::Enthalpy => self.enthalpy = unit,
            PropertyKind::Temperature => self.temperature = unit,
            PropertyKind::VolumetricFlow => self.volumetric_flow = unit,
            PropertyKind::SpecificVolume => self.specific_volume = unit,
            PropertyKind::Entropy => self.entropy = unit,
            PropertyKind::Fraction => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn constructors_smoke() {
        let _p = pa(101_325.0);
        let _t = k(300.0);
        let _mdot = kgps(1.2);
        let _h = jpkg(4.2e5);
    }

    #[test]
    fn pressure_units_convert_both_ways() {
        assert!(close(Unit::Bar.to_si(5.0), 5e5));
        assert!(close(Unit::Bar.from_si(5e5), 5.0));
        assert!(close(Unit::Megapascal.to_si(0.1), 1e5));
        assert!(close(Unit::Psi.from_si(Unit::Psi.to_si(14.7)), 14.7));
    }

    #[test]
    fn temperature_offsets_only_apply_to_absolute_values() {
        assert!(close(Unit::Celsius.to_si(25.0), 298.15));
        assert!(close(Unit::Celsius.from_si(298.15), 25.0));
        assert!(close(Unit::Celsius.delta_to_si(10.0), 10.0));
        assert!(close(Unit::Fahrenheit.delta_to_si(9.0), 5.0));
    }

    #[test]
    fn hourly_rates_convert() {
        assert!(close(Unit::TonPerHour.to_si(3.6), 1.0));
        assert!(close(Unit::CubicMeterPerHour.to_si(3600.0), 1.0));
        assert!(close(Unit::KilojoulePerKilogram.to_si(2.5), 2500.0));
    }

    #[test]
    fn parse_symbols_and_reject_unknown() {
        assert_eq!("kJ/kg".parse::<Unit>().unwrap(), Unit::KilojoulePerKilogram);
        assert_eq!(" BAR ".parse::<Unit>().unwrap(), Unit::Bar);
        assert!("furlong".parse::<Unit>().is_err());
    }

    #[test]
    fn unit_system_selects_by_kind() {
        let units = UnitSystem::default()
            .with_unit(Unit::Bar)
            .with_unit(Unit::Celsius);
        assert_eq!(units.unit_for(PropertyKind::Pressure), Unit::Bar);
        assert_eq!(units.unit_for(PropertyKind::Temperature), Unit::Celsius);
        assert_eq!(units.unit_for(PropertyKind::MassFlow), Unit::KilogramPerSecond);
        assert!(Unit::Bar.ensure_kind(PropertyKind::Enthalpy).is_err());
    }
}
