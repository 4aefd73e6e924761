// Gauge channels and their display ranges
use super::telemetry::PrimarySample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeChannel {
    Rpm,
    Temperature,
    FuelFlow,
    Load,
}

impl GaugeChannel {
    pub const ALL: [GaugeChannel; 4] = [
        GaugeChannel::Rpm,
        GaugeChannel::Temperature,
        GaugeChannel::FuelFlow,
        GaugeChannel::Load,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeLevel {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GaugeRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub warning: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl GaugeRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            warning: None,
            critical: None,
        }
    }

    pub const fn with_thresholds(self, warning: f64, critical: f64) -> Self {
        Self {
            warning: Some(warning),
            critical: Some(critical),
            ..self
        }
    }

    /// Map a raw value onto [0,1]; a degenerate range maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn level(&self, value: f64) -> GaugeLevel {
        match (self.warning, self.critical) {
            (_, Some(critical)) if value >= critical => GaugeLevel::Critical,
            (Some(warning), _) if value >= warning => GaugeLevel::Warning,
            _ => GaugeLevel::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GaugeRanges {
    pub rpm: GaugeRange,
    pub temperature: GaugeRange,
    pub fuel_flow: GaugeRange,
    pub load: GaugeRange,
}

impl Default for GaugeRanges {
    fn default() -> Self {
        Self {
            rpm: GaugeRange::new(0.0, 2000.0),
            temperature: GaugeRange::new(20.0, 95.0).with_thresholds(75.0, 85.0),
            fuel_flow: GaugeRange::new(0.0, 5.0),
            load: GaugeRange::new(0.0, 100.0).with_thresholds(80.0, 90.0),
        }
    }
}

impl GaugeRanges {
    pub fn range(&self, channel: GaugeChannel) -> &GaugeRange {
        match channel {
            GaugeChannel::Rpm => &self.rpm,
            GaugeChannel::Temperature => &self.temperature,
            GaugeChannel::FuelFlow => &self.fuel_flow,
            GaugeChannel::Load => &self.load,
        }
    }

    pub fn raw_value(channel: GaugeChannel, sample: &PrimarySample) -> f64 {
        match channel {
            GaugeChannel::Rpm => sample.rpm,
            GaugeChannel::Temperature => sample.temperature,
            GaugeChannel::FuelFlow => sample.fuel_flow,
            GaugeChannel::Load => sample.load,
        }
    }

    /// Normalized smoothing target of every gauge for one primary sample
    pub fn targets(&self, sample: &PrimarySample) -> [(GaugeChannel, f64); 4] {
        GaugeChannel::ALL.map(|channel| {
            let raw = Self::raw_value(channel, sample);
            (channel, self.range(channel).normalize(raw))
        })
    }

    pub fn level(&self, channel: GaugeChannel, sample: &PrimarySample) -> GaugeLevel {
        self.range(channel).level(Self::raw_value(channel, sample))
    }
}
