//! InternalSink: transforms a batch of envelopes into sharded
//! observations, a deduplicated datamap, and per-user score credit,
//! then commits every downstream enqueue through one store pipeline.

use chrono::{DateTime, Utc};
use snafu::{ResultExt, Snafu};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::model::api_key::ApiKeyRepo;
use crate::model::observation::{BlueObservation, CellObservation, WifiObservation};
use crate::model::report::{Envelope, InternalBlue, InternalCell, InternalReport, InternalWifi};
use crate::model::score::ScoreEntry;
use crate::model::user::{nickname_in_window, UserRepo};
use crate::model::{datamap, shard};
use crate::queue::DataQueue;
use crate::store::{QueueError, Store};
use crate::transform::InternalTransform;

#[derive(Debug, Snafu)]
pub enum InternalSinkError {
    #[snafu(display("queue error: {source}"))]
    Queue { source: QueueError },

    #[snafu(display("user resolution failed: {source}"))]
    User { source: sqlx::Error },

    #[snafu(display("api key lookup failed: {source}"))]
    ApiKey { source: sqlx::Error },
}

impl From<QueueError> for InternalSinkError {
    fn from(source: QueueError) -> Self {
        InternalSinkError::Queue { source }
    }
}

/// Batch/compress applied to the sharded downstream queues; every
/// internal fan-out queue shares one crate-wide default.
const DOWNSTREAM_BATCH: usize = 100;
const DOWNSTREAM_COMPRESS: bool = true;

#[derive(Default)]
struct ApiKeyCounters {
    reports: u64,
    malformed_reports: u64,
    observation_upload: HashMap<&'static str, u64>,
    observation_drop: HashMap<&'static str, u64>,
}

fn recover_time(timestamp: Option<i64>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|millis| DateTime::from_timestamp(millis / 1000, 0))
}

fn validate_blue(item: &InternalBlue, lat: f64, lon: f64, time: DateTime<Utc>) -> Option<BlueObservation> {
    let mac = item.mac.clone()?;
    Some(BlueObservation {
        lat,
        lon,
        time,
        mac,
        age: item.age,
        signal: item.signal,
    })
}

fn validate_wifi(item: &InternalWifi, lat: f64, lon: f64, time: DateTime<Utc>) -> Option<WifiObservation> {
    let mac = item.mac.clone()?;
    Some(WifiObservation {
        lat,
        lon,
        time,
        mac,
        radio: item.radio.clone(),
        age: item.age,
        channel: item.channel,
        frequency: item.frequency,
        signal_to_noise_ratio: item.signal_to_noise_ratio,
        signal: item.signal,
    })
}

fn validate_cell(item: &InternalCell, lat: f64, lon: f64, time: DateTime<Utc>) -> Option<CellObservation> {
    Some(CellObservation {
        lat,
        lon,
        time,
        radio: item.radio.clone()?,
        mcc: item.mcc?,
        mnc: item.mnc?,
        lac: item.lac?,
        cid: item.cid?,
        age: item.age,
        asu: item.asu,
        psc: item.psc,
        serving: item.serving,
        signal: item.signal,
        ta: item.ta,
    })
}

macro_rules! insert_better {
    ($dedup:expr, $key:expr, $candidate:expr) => {{
        let key = $key;
        let candidate = $candidate;
        match $dedup.get(&key) {
            Some(existing) if existing.better(&candidate) => {}
            _ => {
                $dedup.insert(key, candidate);
            }
        }
    }};
}

struct RawReport {
    api_key: Option<String>,
    nickname: Option<String>,
    report: InternalReport,
}

pub async fn process(
    envelopes: Vec<Envelope>,
    store: Arc<dyn Store>,
    users: &dyn UserRepo,
    api_keys: &dyn ApiKeyRepo,
) -> Result<(), InternalSinkError> {
    let transform = InternalTransform;
    let mut counters: HashMap<Option<String>, ApiKeyCounters> = HashMap::new();

    // Step 1: transform and group.
    let mut raw_reports = Vec::with_capacity(envelopes.len());
    for envelope in envelopes {
        let mut report = transform.transform(&envelope.report);
        if report.is_empty() {
            counters.entry(envelope.api_key.clone()).or_default().malformed_reports += 1;
            continue;
        }
        report.time = recover_time(report.timestamp);
        counters.entry(envelope.api_key.clone()).or_default().reports += 1;
        raw_reports.push(RawReport {
            api_key: envelope.api_key,
            nickname: envelope.nickname,
            report,
        });
    }

    let mut grouped: HashMap<(Option<String>, Option<String>), Vec<InternalReport>> = HashMap::new();
    for raw in raw_reports {
        grouped.entry((raw.api_key, raw.nickname)).or_default().push(raw.report);
    }

    // Step 2: resolve users.
    let mut userids: HashMap<String, i64> = HashMap::new();
    for (_, nickname) in grouped.keys() {
        if let Some(nickname) = nickname {
            if nickname_in_window(nickname) && !userids.contains_key(nickname) {
                let userid = users.resolve(nickname).await.context(UserSnafu)?;
                userids.insert(nickname.clone(), userid);
            }
        }
    }
    let mut scores: HashMap<i64, i64> = userids.values().map(|&id| (id, 0)).collect();

    // Steps 4-7: per-group processing, deduplicated across the whole batch.
    let mut blue_dedup: HashMap<String, BlueObservation> = HashMap::new();
    let mut wifi_dedup: HashMap<String, WifiObservation> = HashMap::new();
    let mut cell_dedup: HashMap<String, CellObservation> = HashMap::new();
    let mut grid_cells: HashSet<(i64, i64)> = HashSet::new();

    for ((api_key, nickname), reports) in &grouped {
        let entry = counters.entry(api_key.clone()).or_default();
        let userid = nickname.as_ref().and_then(|nickname| userids.get(nickname).copied());
        let mut valid_positions = 0i64;

        for report in reports {
            let (Some(lat), Some(lon), Some(time)) = (report.lat, report.lon, report.time) else {
                entry.malformed_reports += 1;
                continue;
            };

            let mut any_valid = false;

            for item in &report.blue {
                match validate_blue(item, lat, lon, time) {
                    Some(observation) => {
                        any_valid = true;
                        *entry.observation_upload.entry("blue").or_default() += 1;
                        insert_better!(blue_dedup, observation.unique_key(), observation);
                    }
                    None => *entry.observation_drop.entry("blue").or_default() += 1,
                }
            }
            for item in &report.wifi {
                match validate_wifi(item, lat, lon, time) {
                    Some(observation) => {
                        any_valid = true;
                        *entry.observation_upload.entry("wifi").or_default() += 1;
                        insert_better!(wifi_dedup, observation.unique_key(), observation);
                    }
                    None => *entry.observation_drop.entry("wifi").or_default() += 1,
                }
            }
            for item in &report.cell {
                match validate_cell(item, lat, lon, time) {
                    Some(observation) => {
                        any_valid = true;
                        *entry.observation_upload.entry("cell").or_default() += 1;
                        insert_better!(cell_dedup, observation.unique_key(), observation);
                    }
                    None => *entry.observation_drop.entry("cell").or_default() += 1,
                }
            }

            if any_valid {
                grid_cells.insert(datamap::scale(lat, lon));
                valid_positions += 1;
            } else {
                entry.malformed_reports += 1;
            }
        }

        if let Some(userid) = userid {
            *scores.entry(userid).or_default() += valid_positions;
        }
    }

    // Step 5: shard and stage observations.
    let mut pipeline = store.pipeline();

    stage_sharded(&mut *pipeline, &store, "update_blue", blue_dedup.into_values(), |o| {
        shard::shard_id_for_mac(o.shard_key())
    })
    .await?;
    stage_sharded(&mut *pipeline, &store, "update_wifi", wifi_dedup.into_values(), |o| {
        shard::shard_id_for_mac(o.shard_key())
    })
    .await?;
    stage_sharded(&mut *pipeline, &store, "update_cell", cell_dedup.into_values(), |o| {
        shard::shard_id_for_cell(&o.shard_key())
    })
    .await?;

    // Step 6: datamap.
    let mut by_shard: HashMap<String, Vec<String>> = HashMap::new();
    for (lat_scaled, lon_scaled) in &grid_cells {
        let lat = *lat_scaled as f64 / 1000.0;
        let lon = *lon_scaled as f64 / 1000.0;
        let shard_id = datamap::shard_id(lat, lon);
        by_shard
            .entry(shard_id)
            .or_default()
            .push(datamap::encode_datamap_grid(lat, lon));
    }
    for (shard_id, cells) in by_shard {
        let key = format!("update_datamap_{shard_id}");
        let queue = DataQueue::new(key, store.clone(), DOWNSTREAM_BATCH, DOWNSTREAM_COMPRESS);
        queue.enqueue(&cells, Some(pipeline.as_mut())).await?;
    }

    // Step 7: scores.
    let entries: Vec<ScoreEntry> = scores
        .into_iter()
        .filter(|&(_, value)| value > 0)
        .map(|(userid, value)| ScoreEntry::location(userid, value))
        .collect();
    if !entries.is_empty() {
        let queue = DataQueue::new("update_score", store.clone(), DOWNSTREAM_BATCH, DOWNSTREAM_COMPRESS);
        queue.enqueue(&entries, Some(pipeline.as_mut())).await?;
    }

    pipeline.commit().await?;

    // Step 8: emit stats.
    for (api_key, entry) in counters {
        let Some(api_key) = api_key else { continue };
        if !api_keys.should_log_submissions(&api_key).await.context(ApiKeySnafu)? {
            continue;
        }
        emit_counter(entry.reports, "data.report.upload", &api_key, None);
        emit_counter(entry.malformed_reports, "data.report.drop", &api_key, Some("malformed"));
        for (kind, count) in entry.observation_upload {
            emit_typed_counter(count, "data.observation.upload", &api_key, kind, None);
        }
        for (kind, count) in entry.observation_drop {
            emit_typed_counter(count, "data.observation.drop", &api_key, kind, Some("malformed"));
        }
    }

    Ok(())
}

async fn stage_sharded<T, F>(
    pipeline: &mut dyn crate::store::Pipeline,
    store: &Arc<dyn Store>,
    prefix: &str,
    observations: impl Iterator<Item = T>,
    shard_of: F,
) -> Result<(), InternalSinkError>
where
    T: serde::Serialize,
    F: Fn(&T) -> String,
{
    let mut by_shard: HashMap<String, Vec<T>> = HashMap::new();
    for observation in observations {
        by_shard.entry(shard_of(&observation)).or_default().push(observation);
    }
    for (shard_id, items) in by_shard {
        let key = format!("{prefix}_{shard_id}");
        let queue = DataQueue::new(key, store.clone(), DOWNSTREAM_BATCH, DOWNSTREAM_COMPRESS);
        queue.enqueue(&items, Some(pipeline)).await?;
    }
    Ok(())
}

fn emit_counter(count: u64, name: &'static str, api_key: &str, reason: Option<&'static str>) {
    if count == 0 {
        return;
    }
    match reason {
        Some(reason) => metrics::counter!(name, "key" => api_key.to_string(), "reason" => reason).increment(count),
        None => metrics::counter!(name, "key" => api_key.to_string()).increment(count),
    }
}

fn emit_typed_counter(
    count: u64,
    name: &'static str,
    api_key: &str,
    kind: &'static str,
    reason: Option<&'static str>,
) {
    if count == 0 {
        return;
    }
    match reason {
        Some(reason) => metrics::counter!(
            name,
            "key" => api_key.to_string(),
            "type" => kind,
            "reason" => reason,
        )
        .increment(count),
        None => metrics::counter!(name, "key" => api_key.to_string(), "type" => kind).increment(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::api_key::InMemoryApiKeyRepo;
    use crate::model::report::{ExternalPosition, ExternalReport, ExternalWifi};
    use crate::model::user::InMemoryUserRepo;
    use crate::store::InMemoryStore;

    fn envelope_with_wifi(api_key: &str, nickname: &str, mac: &str) -> Envelope {
        Envelope {
            api_key: Some(api_key.to_string()),
            nickname: Some(nickname.to_string()),
            report: ExternalReport {
                timestamp: Some(1_700_000_000_000),
                position: Some(ExternalPosition {
                    latitude: Some(51.5),
                    longitude: Some(-0.1),
                    ..Default::default()
                }),
                wifi_access_points: vec![ExternalWifi {
                    mac_address: Some(mac.to_string()),
                    signal_strength: Some(-50),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn credits_new_user_once_per_batch() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let users = InMemoryUserRepo::new();
        let api_keys = InMemoryApiKeyRepo::new().with_key("key1", true);

        let envelopes = vec![
            envelope_with_wifi("key1", "alice", "aa:aa:aa:aa:aa:01"),
            envelope_with_wifi("key1", "alice", "aa:aa:aa:aa:aa:02"),
            envelope_with_wifi("key1", "alice", "aa:aa:aa:aa:aa:03"),
            envelope_with_wifi("key1", "alice", "aa:aa:aa:aa:aa:04"),
        ];

        process(envelopes, store.clone(), &users, &api_keys).await.unwrap();

        let scores: Vec<ScoreEntry> = store.drain("update_score").await.unwrap().into_iter().map(|raw| {
            serde_json::from_slice(&raw).unwrap()
        }).collect();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].value, 4);
    }

    #[tokio::test]
    async fn empty_nickname_skips_scoring_but_keeps_observations() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let users = InMemoryUserRepo::new();
        let api_keys = InMemoryApiKeyRepo::new();

        let envelope = envelope_with_wifi("key1", "a", "aa:aa:aa:aa:aa:01");
        process(vec![envelope], store.clone(), &users, &api_keys).await.unwrap();

        assert!(store.drain("update_score").await.unwrap().is_empty());
        let shard = shard::shard_id_for_mac("aa:aa:aa:aa:aa:01");
        let key = format!("update_wifi_{shard}");
        assert_eq!(store.len(&key).await.unwrap(), 1);
    }
}
