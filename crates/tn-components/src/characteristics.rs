//! Characteristic lines linking a component quantity to an operating value.

use serde::{Deserialize, Serialize};

use crate::error::{ComponentError, ComponentResult};

/// Piecewise linear `y = f(x)` over strictly increasing support points.
///
/// Outside `[x_0, x_n]` the line holds its end value unless extrapolation is
/// enabled, in which case the outer segments are extended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharLine {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(default)]
    extrapolate: bool,
}

impl CharLine {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> ComponentResult<Self> {
        if x.len() != y.len() {
            return Err(ComponentError::config(format!(
                "characteristic line has {} x and {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(ComponentError::config(
                "characteristic line needs at least two points",
            ));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(ComponentError::config(
                "characteristic line values must be finite",
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ComponentError::config(
                "characteristic line x values must be strictly increasing",
            ));
        }
        Ok(Self {
            x,
            y,
            extrapolate: false,
        })
    }

    pub fn with_extrapolation(mut self, extrapolate: bool) -> Self {
        self.extrapolate = extrapolate;
        self
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.x.len();
        // index of the segment's upper point
        let upper = self.x.partition_point(|&xi| xi < x);
        let upper = match upper {
            0 if !self.extrapolate => return self.y[0],
            0 => 1,
            u if u == n && !self.extrapolate => return self.y[n - 1],
            u if u == n => n - 1,
            u => u,
        };
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }
}

/// Operating value a characteristic is read at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharParam {
    /// Inlet mass flow, kg/s.
    #[default]
    #[serde(rename = "m")]
    MassFlow,
    /// Inlet volumetric flow, m³/s.
    #[serde(rename = "v")]
    VolumetricFlow,
}

/// Pressure drop `p_in - p_out` of a valve as a function of its flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DpCharacteristic {
    pub line: CharLine,
    #[serde(default)]
    pub param: CharParam,
}

impl DpCharacteristic {
    pub fn new(line: CharLine, param: CharParam) -> Self {
        Self { line, param }
    }
}
