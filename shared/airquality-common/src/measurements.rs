use serde::{Deserialize, Serialize};

/// Number of entries in [`MeasurementSnapshot::feature_vector`].
pub const FEATURE_COUNT: usize = 8;

/// Order of the model features, matching [`MeasurementSnapshot::feature_vector`].
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "temperature",
    "humidity",
    "pm2_5",
    "pm10",
    "no2",
    "so2",
    "co",
    "population_density",
];

/// Latest environmental readings for one coordinate pair.
///
/// Pollutants are in µg/m³, temperature in °C and humidity in percent. The
/// serialized field names are the ones the prediction service was trained
/// against.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeasurementSnapshot {
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Humidity")]
    pub humidity: f64,
    #[serde(rename = "PM25")]
    pub pm2_5: f64,
    #[serde(rename = "PM10")]
    pub pm10: f64,
    #[serde(rename = "NO2")]
    pub no2: f64,
    #[serde(rename = "SO2")]
    pub so2: f64,
    #[serde(rename = "CO")]
    pub co: f64,
    #[serde(rename = "PopulationDensity")]
    pub population_density: f64,
    /// Raw measured air-quality index, when the source reports one.
    #[serde(rename = "AQI", default, skip_serializing_if = "Option::is_none")]
    pub aqi: Option<f64>,
}

impl MeasurementSnapshot {
    pub fn feature_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.temperature,
            self.humidity,
            self.pm2_5,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.population_density,
        ]
    }

    /// Name of the first model feature that is NaN or infinite.
    pub fn first_non_finite_feature(&self) -> Option<&'static str> {
        FEATURE_NAMES
            .iter()
            .zip(self.feature_vector())
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| *name)
    }
}
