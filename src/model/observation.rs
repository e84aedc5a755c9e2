//! The fusion of a report with one transmitter record, carrying a
//! `unique_key` and a `better(other)` quality relation.
//!
//! The quality ordering ranks freshness first (smaller `age` wins), then
//! signal strength (higher wins).

use chrono::{DateTime, Utc};
use serde::Serialize;

fn freshness_rank(age: Option<i64>) -> i64 {
    age.unwrap_or(i64::MAX)
}

fn signal_rank(signal: Option<i32>) -> i32 {
    signal.unwrap_or(i32::MIN)
}

/// Returns true iff `a` should be kept over `b` under the quality preorder.
fn better(a_age: Option<i64>, a_signal: Option<i32>, b_age: Option<i64>, b_signal: Option<i32>) -> bool {
    let (a_fresh, b_fresh) = (freshness_rank(a_age), freshness_rank(b_age));
    if a_fresh != b_fresh {
        return a_fresh < b_fresh;
    }
    signal_rank(a_signal) > signal_rank(b_signal)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlueObservation {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub mac: String,
    pub age: Option<i64>,
    pub signal: Option<i32>,
}

impl BlueObservation {
    pub fn unique_key(&self) -> String {
        self.mac.clone()
    }

    pub fn shard_key(&self) -> &str {
        &self.mac
    }

    pub fn better(&self, other: &Self) -> bool {
        better(self.age, self.signal, other.age, other.signal)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WifiObservation {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub mac: String,
    pub radio: Option<String>,
    pub age: Option<i64>,
    pub channel: Option<i32>,
    pub frequency: Option<i32>,
    pub signal_to_noise_ratio: Option<i32>,
    pub signal: Option<i32>,
}

impl WifiObservation {
    pub fn unique_key(&self) -> String {
        self.mac.clone()
    }

    pub fn shard_key(&self) -> &str {
        &self.mac
    }

    pub fn better(&self, other: &Self) -> bool {
        better(self.age, self.signal, other.age, other.signal)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CellObservation {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub radio: String,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u64,
    pub age: Option<i64>,
    pub asu: Option<i32>,
    pub psc: Option<u32>,
    pub serving: Option<u8>,
    pub signal: Option<i32>,
    pub ta: Option<i32>,
}

impl CellObservation {
    /// Composite identity: a bare cell id is not globally unique.
    pub fn unique_key(&self) -> String {
        format!("{}:{}:{}:{}:{}", self.radio, self.mcc, self.mnc, self.lac, self.cid)
    }

    /// The sharding function is applied to the bare `cellid`.
    pub fn shard_key(&self) -> String {
        self.cid.to_string()
    }

    pub fn better(&self, other: &Self) -> bool {
        better(self.age, self.signal, other.age, other.signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(age: Option<i64>, signal: Option<i32>) -> BlueObservation {
        BlueObservation {
            lat: 1.0,
            lon: 2.0,
            time: Utc::now(),
            mac: "aa:bb".to_string(),
            age,
            signal,
        }
    }

    #[test]
    fn fresher_observation_wins() {
        let fresher = obs(Some(0), Some(-90));
        let staler = obs(Some(1000), Some(-40));
        assert!(fresher.better(&staler));
        assert!(!staler.better(&fresher));
    }

    #[test]
    fn stronger_signal_breaks_freshness_tie() {
        let weak = obs(Some(0), Some(-60));
        let strong = obs(Some(0), Some(-50));
        assert!(strong.better(&weak));
        assert!(!weak.better(&strong));
    }
}
