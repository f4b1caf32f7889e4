//! Rolling temperature/humidity history for the display chart.

use std::collections::VecDeque;

use model::TelemetrySnapshot;
use serde::Serialize;
use serde_json::{json, Value};

pub const DEFAULT_CAPACITY: usize = 100;

/// Two parallel newest-first series with a fixed capacity.
///
/// Index 0 always holds the most recent sample. Both series are pushed and
/// evicted together so their lengths never differ.
#[derive(Debug, Clone)]
pub struct RollingSample {
    temperature: VecDeque<f32>,
    humidity: VecDeque<f32>,
    capacity: usize,
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct SeriesRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct Summary {
    pub temperature: Option<SeriesRange>,
    pub humidity: Option<SeriesRange>,
}

impl RollingSample {
    pub fn new(capacity: usize) -> Self {
        Self {
            temperature: VecDeque::with_capacity(capacity),
            humidity: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty()
    }

    /// Prepends a sample, evicting the oldest ones first so the length never
    /// exceeds the capacity.
    pub fn push(&mut self, temperature: f32, humidity: f32) {
        if self.capacity == 0 {
            return;
        }
        while self.temperature.len() >= self.capacity {
            self.temperature.pop_back();
            self.humidity.pop_back();
        }
        self.temperature.push_front(temperature);
        self.humidity.push_front(humidity);
    }

    /// Feeds the pair carried by a snapshot, if the sensor is enabled.
    pub fn push_snapshot(&mut self, snapshot: &TelemetrySnapshot) -> bool {
        match snapshot.th {
            Some((t, h)) => {
                self.push(t, h);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.temperature.clear();
        self.humidity.clear();
    }

    pub fn temperature(&self) -> impl Iterator<Item = f32> + '_ {
        self.temperature.iter().copied()
    }

    pub fn humidity(&self) -> impl Iterator<Item = f32> + '_ {
        self.humidity.iter().copied()
    }

    pub fn temperature_range(&self) -> Option<SeriesRange> {
        range_of(&self.temperature)
    }

    pub fn humidity_range(&self) -> Option<SeriesRange> {
        range_of(&self.humidity)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            temperature: self.temperature_range(),
            humidity: self.humidity_range(),
        }
    }

    /// Both series plus their ranges, newest first, for the chart.
    pub fn to_chart_json(&self) -> Value {
        json!({
            "temperature": self.temperature.iter().collect::<Vec<_>>(),
            "humidity": self.humidity.iter().collect::<Vec<_>>(),
            "summary": self.summary(),
        })
    }
}

impl Default for RollingSample {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// empty series report no range rather than +/-inf
fn range_of(series: &VecDeque<f32>) -> Option<SeriesRange> {
    if series.is_empty() {
        return None;
    }
    let min = series.iter().copied().fold(f32::INFINITY, f32::min);
    let max = series.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some(SeriesRange { min, max })
}
