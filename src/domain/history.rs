// Bounded, time-ordered history of merged telemetry rows
use super::telemetry::{AuxiliarySensor, AuxiliarySnapshot, EngineStatus, PrimarySample};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One chart row: a primary sample plus the auxiliary values known when it
/// was recorded. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub rpm: f64,
    pub temperature: f64,
    #[serde(rename = "fuelFlow")]
    pub fuel_flow: f64,
    pub load: f64,
    pub status: EngineStatus,
    pub exhaust_temp: f64,
    pub lube_oil_pressure: f64,
    pub cooling_water_temp: f64,
    pub turbocharger_speed: f64,
}

impl HistoryPoint {
    fn new(
        timestamp: DateTime<Utc>,
        sample: &PrimarySample,
        auxiliary: &AuxiliarySnapshot,
    ) -> Self {
        let mut point = Self {
            timestamp,
            rpm: sample.rpm,
            temperature: sample.temperature,
            fuel_flow: sample.fuel_flow,
            load: sample.load,
            status: sample.status,
            exhaust_temp: 0.0,
            lube_oil_pressure: 0.0,
            cooling_water_temp: 0.0,
            turbocharger_speed: 0.0,
        };
        point.set_auxiliary(auxiliary);
        point
    }

    fn set_auxiliary(&mut self, auxiliary: &AuxiliarySnapshot) {
        for sensor in AuxiliarySensor::ALL {
            let value = auxiliary.value_of(sensor);
            match sensor {
                AuxiliarySensor::ExhaustTemp => self.exhaust_temp = value,
                AuxiliarySensor::LubeOilPressure => self.lube_oil_pressure = value,
                AuxiliarySensor::CoolingWaterTemp => self.cooling_water_temp = value,
                AuxiliarySensor::TurbochargerSpeed => self.turbocharger_speed = value,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// A zero capacity is raised to one so the latest row is always visible.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a primary tick stamped with the current time.
    pub fn append_primary(
        &mut self,
        sample: &PrimarySample,
        auxiliary: &AuxiliarySnapshot,
    ) -> HistoryPoint {
        self.append_primary_at(Utc::now(), sample, auxiliary)
    }

    pub fn append_primary_at(
        &mut self,
        timestamp: DateTime<Utc>,
        sample: &PrimarySample,
        auxiliary: &AuxiliarySnapshot,
    ) -> HistoryPoint {
        let point = HistoryPoint::new(timestamp, sample, auxiliary);
        self.points.push_back(point.clone());
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
        point
    }

    /// Refresh the auxiliary columns of the newest row. Returns false (and
    /// records nothing) when no primary tick has been seen yet.
    pub fn amend_latest_auxiliary(&mut self, auxiliary: &AuxiliarySnapshot) -> bool {
        match self.points.back_mut() {
            Some(last) => {
                last.set_auxiliary(auxiliary);
                true
            }
            None => false,
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points().cloned().collect()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
