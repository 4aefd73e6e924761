// Telemetry data domain models
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Engine operating status as reported by the primary channel.
///
/// Unknown codes degrade to `Stopped` instead of failing the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum EngineStatus {
    #[default]
    Stopped,
    Running,
    Warning,
    Alarm,
}

impl From<i64> for EngineStatus {
    fn from(code: i64) -> Self {
        match code {
            1 => EngineStatus::Running,
            2 => EngineStatus::Warning,
            3 => EngineStatus::Alarm,
            _ => EngineStatus::Stopped,
        }
    }
}

impl From<EngineStatus> for u8 {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Stopped => 0,
            EngineStatus::Running => 1,
            EngineStatus::Warning => 2,
            EngineStatus::Alarm => 3,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineStatus::Stopped => "Stopped",
            EngineStatus::Running => "Running",
            EngineStatus::Warning => "Warning",
            EngineStatus::Alarm => "Alarm",
        };
        f.write_str(label)
    }
}

/// One engine-state tick from the primary channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimarySample {
    pub rpm: f64,
    pub temperature: f64,
    #[serde(rename = "fuelFlow", alias = "fuel_flow")]
    pub fuel_flow: f64,
    pub load: f64,
    pub status: EngineStatus,
}

impl PrimarySample {
    /// Clamp fields into their physical ranges (rpm and fuel flow are
    /// non-negative, load is a percentage).
    pub fn sanitized(self) -> Self {
        Self {
            rpm: self.rpm.max(0.0),
            fuel_flow: self.fuel_flow.max(0.0),
            load: self.load.clamp(0.0, 100.0),
            ..self
        }
    }
}

/// A single auxiliary sensor value with its engineering unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryReading {
    pub value: f64,
    pub unit: String,
}

#[cfg(test)]
impl AuxiliaryReading {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// The auxiliary sensors that have a column in the merged history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuxiliarySensor {
    ExhaustTemp,
    LubeOilPressure,
    CoolingWaterTemp,
    TurbochargerSpeed,
}

impl AuxiliarySensor {
    pub const ALL: [AuxiliarySensor; 4] = [
        AuxiliarySensor::ExhaustTemp,
        AuxiliarySensor::LubeOilPressure,
        AuxiliarySensor::CoolingWaterTemp,
        AuxiliarySensor::TurbochargerSpeed,
    ];

    /// Wire name of the sensor in auxiliary messages
    pub fn key(self) -> &'static str {
        match self {
            AuxiliarySensor::ExhaustTemp => "exhaust_temp",
            AuxiliarySensor::LubeOilPressure => "lube_oil_pressure",
            AuxiliarySensor::CoolingWaterTemp => "cooling_water_temp",
            AuxiliarySensor::TurbochargerSpeed => "turbocharger_speed",
        }
    }
}

/// Last known value of every auxiliary sensor that has ever reported.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct AuxiliarySnapshot {
    readings: BTreeMap<String, AuxiliaryReading>,
}

impl AuxiliarySnapshot {
    /// Overwrite the sensors present in `update`; sensors absent from it keep
    /// their previous reading.
    pub fn merge(&mut self, update: BTreeMap<String, AuxiliaryReading>) {
        self.readings.extend(update);
    }

    pub fn reading(&self, name: &str) -> Option<&AuxiliaryReading> {
        self.readings.get(name)
    }

    /// Carry-forward value of a history column, 0 until the sensor reports.
    pub fn value_of(&self, sensor: AuxiliarySensor) -> f64 {
        self.reading(sensor.key())
            .map(|r| r.value)
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// PLC-reported alarm list, operating mode and setpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmSet {
    pub mode: String,
    pub alarms: Vec<String>,
    pub setpoints: BTreeMap<String, f64>,
}

impl Default for AlarmSet {
    fn default() -> Self {
        Self {
            mode: "MANUAL".to_string(),
            alarms: Vec::new(),
            setpoints: BTreeMap::new(),
        }
    }
}

/// Partial PLC update; each present field replaces the stored one as a whole.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PlcUpdate {
    pub mode: Option<String>,
    pub alarms: Option<Vec<String>>,
    pub setpoints: Option<BTreeMap<String, f64>>,
}

impl PlcUpdate {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.alarms.is_none() && self.setpoints.is_none()
    }
}

impl AlarmSet {
    pub fn apply(&mut self, update: PlcUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(alarms) = update.alarms {
            self.alarms = alarms;
        }
        if let Some(setpoints) = update.setpoints {
            self.setpoints = setpoints;
        }
    }
}

/// Auxiliary channel payload: sensor readings plus an optional PLC block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuxiliaryUpdate {
    pub sensors: BTreeMap<String, AuxiliaryReading>,
    pub plc: PlcUpdate,
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Primary {
        sample: PrimarySample,
        plc: Option<PlcUpdate>,
    },
    Auxiliary(AuxiliaryUpdate),
}

/// Reconciled engine state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EngineState {
    pub primary: PrimarySample,
    pub auxiliary: AuxiliarySnapshot,
    pub plc: AlarmSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_primary_fields_default_to_zero() {
        let sample: PrimarySample = serde_json::from_str(r#"{"rpm": 750}"#).unwrap();
        assert_eq!(sample.rpm, 750.0);
        assert_eq!(sample.temperature, 0.0);
        assert_eq!(sample.fuel_flow, 0.0);
        assert_eq!(sample.status, EngineStatus::Stopped);
    }

    #[test]
    fn test_fuel_flow_accepts_both_spellings() {
        let camel: PrimarySample = serde_json::from_str(r#"{"fuelFlow": 1.5}"#).unwrap();
        let snake: PrimarySample = serde_json::from_str(r#"{"fuel_flow": 1.5}"#).unwrap();
        assert_eq!(camel, snake);
    }

    #[test]
    fn test_unknown_status_code_degrades_to_stopped() {
        let sample: PrimarySample = serde_json::from_str(r#"{"status": 9}"#).unwrap();
        assert_eq!(sample.status, EngineStatus::Stopped);

        let sample: PrimarySample = serde_json::from_str(r#"{"status": 3}"#).unwrap();
        assert_eq!(sample.status, EngineStatus::Alarm);
        assert_eq!(sample.status.to_string(), "Alarm");
    }

    #[test]
    fn test_sanitized_clamps_ranges() {
        let sample = PrimarySample {
            rpm: -5.0,
            fuel_flow: -0.1,
            load: 140.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(sample.rpm, 0.0);
        assert_eq!(sample.fuel_flow, 0.0);
        assert_eq!(sample.load, 100.0);
    }

    #[test]
    fn test_snapshot_merge_keeps_other_sensors() {
        let mut snapshot = AuxiliarySnapshot::default();
        snapshot.merge(BTreeMap::from([
            ("exhaust_temp".to_string(), AuxiliaryReading::new(310.0, "°C")),
            ("lube_oil_pressure".to_string(), AuxiliaryReading::new(4.2, "bar")),
        ]));
        snapshot.merge(BTreeMap::from([(
            "exhaust_temp".to_string(),
            AuxiliaryReading::new(325.0, "°C"),
        )]));

        assert_eq!(snapshot.value_of(AuxiliarySensor::ExhaustTemp), 325.0);
        assert_eq!(snapshot.value_of(AuxiliarySensor::LubeOilPressure), 4.2);
        assert_eq!(snapshot.value_of(AuxiliarySensor::TurbochargerSpeed), 0.0);
    }

    #[test]
    fn test_alarm_list_is_replaced_not_merged() {
        let mut plc = AlarmSet::default();
        plc.apply(PlcUpdate {
            alarms: Some(vec!["HIGH TEMP".into(), "LOW OIL".into()]),
            ..Default::default()
        });
        plc.apply(PlcUpdate {
            alarms: Some(vec!["OVERSPEED".into()]),
            mode: Some("AUTO".into()),
            ..Default::default()
        });

        assert_eq!(plc.alarms, vec!["OVERSPEED".to_string()]);
        assert_eq!(plc.mode, "AUTO");
    }
}
