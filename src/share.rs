//! Write-once benchmark snapshots addressed by a generated identifier.
//!
//! A snapshot is either the raw log text (preferred, so later extractor
//! fixes apply when the link is opened) or an already aggregated analysis.
//! Both shapes are accepted on load.
//!
//! On-disk layout of [`FsSnapshotStore`]:
//!
//! ```text
//! <root>/<id>.json   {"id": .., "storedAt": .., "snapshot": {..}}
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::aggregate::Analysis;
use crate::error::{AnalyzerError, Result};
use crate::extract::Extractor;
use crate::flat_snapshot::FlatSnapshot;

/// Query parameter carrying the snapshot id in share links.
pub const SHARE_QUERY_PARAM: &str = "benchmark";

/// Largest serialized snapshot a store accepts.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

const ID_LEN: usize = 16;

/// Opaque snapshot identifier: 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn parse(s: &str) -> Result<Self> {
        let valid = s.len() == ID_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(AnalyzerError::InvalidSnapshotId(s.to_string()))
        }
    }

    fn generate(payload: &[u8], stored_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(stored_at.to_rfc3339().as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        let mut s = String::with_capacity(ID_LEN);
        for b in &digest[..ID_LEN / 2] {
            s.push_str(&format!("{:02x}", b));
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogSnapshot {
    pub raw_log_content: String,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSnapshot {
    #[serde(flatten)]
    pub analysis: Analysis,
    #[serde(default)]
    pub file_name: Option<String>,
    pub shared_at: DateTime<Utc>,
}

/// Stored shapes, tried in declaration order on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    RawLog(RawLogSnapshot),
    Aggregated(AggregatedSnapshot),
    /// Aggregated output in the web viewer's flat layout.
    FlatAggregated(FlatSnapshot),
}

impl Snapshot {
    pub fn raw_log(content: impl Into<String>, file_name: Option<&str>) -> Self {
        Snapshot::RawLog(RawLogSnapshot {
            raw_log_content: content.into(),
            file_name: file_name.unwrap_or("benchmark.log").to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn aggregated(analysis: Analysis, file_name: Option<&str>) -> Self {
        Snapshot::Aggregated(AggregatedSnapshot {
            analysis,
            file_name: file_name.map(str::to_string),
            shared_at: Utc::now(),
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            Snapshot::RawLog(raw) => Some(&raw.file_name),
            Snapshot::Aggregated(agg) => agg.file_name.as_deref(),
            Snapshot::FlatAggregated(flat) => flat.file_name.as_deref(),
        }
    }
}

/// Sharing backend.
pub trait SnapshotStore {
    /// Persist `snapshot`; the returned id resolves it until it expires.
    fn store(&self, snapshot: &Snapshot) -> Result<SnapshotId>;

    /// Resolve `id`, failing with [`AnalyzerError::RemoteNotFound`] when it
    /// is unknown or expired.
    fn fetch(&self, id: &SnapshotId) -> Result<Snapshot>;
}

fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(snapshot)?;
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(AnalyzerError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(payload)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSnapshot {
    id: SnapshotId,
    stored_at: DateTime<Utc>,
    snapshot: Snapshot,
}

/// One JSON file per snapshot under a directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
    retention: Duration,
}

impl FsSnapshotStore {
    pub fn new(root: impl AsRef<Path>, retention: Duration) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            retention,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn store_at(&self, snapshot: &Snapshot, stored_at: DateTime<Utc>) -> Result<SnapshotId> {
        let payload = encode(snapshot)?;
        let id = SnapshotId::generate(&payload, stored_at);
        let envelope = StoredSnapshot {
            id: id.clone(),
            stored_at,
            snapshot: snapshot.clone(),
        };

        fs::create_dir_all(&self.root)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&serde_json::to_vec(&envelope)?)?;
        tmp.flush()?;
        tmp.persist(self.path_for(&id)).map_err(|e| e.error)?;

        tracing::info!(id = %id, bytes = payload.len(), "stored snapshot");
        Ok(id)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn store(&self, snapshot: &Snapshot) -> Result<SnapshotId> {
        self.store_at(snapshot, Utc::now())
    }

    fn fetch(&self, id: &SnapshotId) -> Result<Snapshot> {
        let not_found = || AnalyzerError::RemoteNotFound {
            id: id.to_string(),
        };
        let bytes = match fs::read(self.path_for(id)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSnapshot = serde_json::from_slice(&bytes)?;
        if Utc::now() - stored.stored_at > self.retention {
            tracing::warn!(id = %id, stored_at = %stored.stored_at, "snapshot expired");
            return Err(not_found());
        }
        tracing::debug!(id = %id, bytes = bytes.len(), "fetched snapshot");
        Ok(stored.snapshot)
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<SnapshotId, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn store(&self, snapshot: &Snapshot) -> Result<SnapshotId> {
        let payload = encode(snapshot)?;
        let id = SnapshotId::generate(&payload, Utc::now());
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), payload);
        Ok(id)
    }

    fn fetch(&self, id: &SnapshotId) -> Result<Snapshot> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let payload = entries
            .get(id)
            .ok_or_else(|| AnalyzerError::RemoteNotFound {
                id: id.to_string(),
            })?;
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Share link for `id` under `base`.
pub fn share_url(base: &str, id: &SnapshotId) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| AnalyzerError::InvalidShareUrl {
        reason: format!("{base}: {e}"),
    })?;
    url.query_pairs_mut()
        .append_pair(SHARE_QUERY_PARAM, id.as_str());
    Ok(url.into())
}

/// Snapshot id carried by a share link.
pub fn id_from_url(link: &str) -> Result<SnapshotId> {
    let url = Url::parse(link).map_err(|e| AnalyzerError::InvalidShareUrl {
        reason: e.to_string(),
    })?;
    let value = url
        .query_pairs()
        .find(|(k, _)| k == SHARE_QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| AnalyzerError::InvalidShareUrl {
            reason: format!("no `{SHARE_QUERY_PARAM}` parameter in {link}"),
        })?;
    SnapshotId::parse(&value)
}

/// Accept either a bare id or a share link.
pub fn parse_reference(reference: &str) -> Result<SnapshotId> {
    let reference = reference.trim();
    if reference.contains("://") {
        id_from_url(reference)
    } else {
        SnapshotId::parse(reference)
    }
}

/// Turn a fetched snapshot back into an analysis.
///
/// Raw logs are re-extracted; aggregated snapshots are returned as stored
/// (converted from the flat layout when needed).
pub fn load_snapshot(snapshot: Snapshot, extractor: &Extractor) -> Result<Analysis> {
    match snapshot {
        Snapshot::RawLog(raw) => crate::analyze_log_with(extractor, &raw.raw_log_content),
        Snapshot::Aggregated(agg) => Ok(agg.analysis),
        Snapshot::FlatAggregated(flat) => Ok(flat.into_analysis()),
    }
}

/// Resolve `id` from `store` and load it.
pub fn fetch_analysis(
    store: &dyn SnapshotStore,
    id: &SnapshotId,
    extractor: &Extractor,
) -> Result<(Snapshot, Analysis)> {
    let snapshot = store.fetch(id)?;
    let analysis = load_snapshot(snapshot.clone(), extractor)?;
    Ok((snapshot, analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{self, SynthConfig};
    use crate::LogFormat;
    use tempfile::tempdir;

    fn sample_log() -> String {
        synth::generate_log(&SynthConfig {
            scenes: 3,
            runs: 4,
            seed: 7,
            ..Default::default()
        })
    }

    #[test]
    fn test_raw_log_round_trip_reproduces_analysis() {
        let text = sample_log();
        let direct = crate::analyze_log(&text).unwrap();

        let dir = tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path(), Duration::days(30));
        let id = store
            .store(&Snapshot::raw_log(text.as_str(), Some("run.log")))
            .unwrap();
        let (snapshot, loaded) = fetch_analysis(&store, &id, &Extractor::default()).unwrap();

        assert_eq!(snapshot.file_name(), Some("run.log"));
        assert_eq!(loaded, direct);
    }

    #[test]
    fn test_aggregated_snapshot_used_directly() {
        let analysis = crate::analyze_log(&sample_log()).unwrap();
        let store = MemorySnapshotStore::new();
        let id = store
            .store(&Snapshot::aggregated(analysis.clone(), None))
            .unwrap();
        let (_, loaded) = fetch_analysis(&store, &id, &Extractor::default()).unwrap();
        assert_eq!(loaded, analysis);
    }

    #[test]
    fn test_raw_log_field_names() {
        let raw = r#"{"rawLogContent":"nothing","fileName":"a.log","timestamp":"2025-03-10T18:00:00Z"}"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert!(matches!(snapshot, Snapshot::RawLog(_)));
        assert!(matches!(
            load_snapshot(snapshot, &Extractor::default()),
            Err(AnalyzerError::NoBenchmarkData)
        ));
    }

    #[test]
    fn test_loads_web_viewer_aggregated_snapshot() {
        let flat = r#"{
          "evolutionData": {"Citadel": [
            {"run": 0, "mean": 72.5, "median": 71.0, "min": 33.0, "max": 99.0,
             "below60": 20.0, "below45": 4.0, "below30": 0.5, "below15": 0, "samples": 900,
             "gameThreadMean": 8.1, "gameThreadMedian": 8.0, "gameThreadMin": 5.2, "gameThreadMax": 19.9,
             "renderThreadMean": 9.4, "renderThreadMedian": 9.2, "renderThreadMin": 6.1, "renderThreadMax": 22.3,
             "gpuTimeMean": 12.6, "gpuTimeMedian": 12.4, "gpuTimeMin": 9.0, "gpuTimeMax": 30.2}]},
          "sceneAverages": [
            {"name": "Citadel", "meanFPS": 72.5, "medianFPS": 71.0, "minFPS": 33.0, "maxFPS": 99.0,
             "minMeanFPS": 72.5, "maxMeanFPS": 72.5,
             "gameThreadMean": 8.1, "minGameThreadMean": 8.1, "maxGameThreadMean": 8.1,
             "renderThreadMean": 9.4, "minRenderThreadMean": 9.4, "maxRenderThreadMean": 9.4,
             "gpuTimeMean": 12.6, "minGpuTimeMean": 12.6, "maxGpuTimeMean": 12.6,
             "below60": 20.0, "below45": 4.0, "below30": 0.5, "below15": 0,
             "totalSamples": 900, "hasThreadData": true}],
          "stutters": [],
          "fileName": "citadel.log",
          "sharedAt": "2025-03-10T18:00:00.000Z"
        }"#;
        let snapshot: Snapshot = serde_json::from_str(flat).unwrap();
        assert!(matches!(snapshot, Snapshot::FlatAggregated(_)));
        assert_eq!(snapshot.file_name(), Some("citadel.log"));

        let store = MemorySnapshotStore::new();
        let id = store.store(&snapshot).unwrap();
        let (_, analysis) = fetch_analysis(&store, &id, &Extractor::default()).unwrap();
        assert_eq!(analysis.format, Some(LogFormat::Primary));
        assert_eq!(analysis.evolution[0].name, "Citadel");
        assert_eq!(
            analysis.evolution[0].runs[0].thread_times.unwrap().render_thread.max,
            22.3
        );
        let scene = &analysis.averages[0];
        assert_eq!(scene.mean_fps, 72.5);
        assert_eq!(scene.total_samples, 900);
        assert_eq!(scene.thread_times.unwrap().gpu_time.mean, 12.6);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path(), Duration::days(30));
        let id = SnapshotId::parse("0123456789abcdef").unwrap();
        assert!(matches!(
            store.fetch(&id),
            Err(AnalyzerError::RemoteNotFound { .. })
        ));
        assert!(matches!(
            MemorySnapshotStore::new().fetch(&id),
            Err(AnalyzerError::RemoteNotFound { .. })
        ));
    }

    #[test]
    fn test_expired_snapshot_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path(), Duration::days(30));
        let old = Utc::now() - Duration::days(31);
        let id = store
            .store_at(&Snapshot::raw_log(sample_log(), None), old)
            .unwrap();
        assert!(matches!(
            store.fetch(&id),
            Err(AnalyzerError::RemoteNotFound { .. })
        ));
    }

    #[test]
    fn test_payload_limit() {
        let store = MemorySnapshotStore::new();
        let huge = "x".repeat(MAX_PAYLOAD_BYTES + 1);
        assert!(matches!(
            store.store(&Snapshot::raw_log(huge, None)),
            Err(AnalyzerError::PayloadTooLarge { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_share_url_round_trip() {
        let id = SnapshotId::parse("00ff00ff00ff00ff").unwrap();
        let link = share_url("https://bench.example.com/view?theme=dark", &id).unwrap();
        assert_eq!(
            link,
            "https://bench.example.com/view?theme=dark&benchmark=00ff00ff00ff00ff"
        );
        assert_eq!(id_from_url(&link).unwrap(), id);
        assert_eq!(parse_reference(&link).unwrap(), id);
        assert_eq!(parse_reference(" 00ff00ff00ff00ff ").unwrap(), id);
    }

    #[test]
    fn test_bad_references() {
        assert!(matches!(
            id_from_url("https://bench.example.com/view"),
            Err(AnalyzerError::InvalidShareUrl { .. })
        ));
        assert!(matches!(
            parse_reference("not-an-id"),
            Err(AnalyzerError::InvalidSnapshotId(_))
        ));
        assert!(SnapshotId::parse("00FF00FF00FF00FF").is_err());
    }

    #[test]
    fn test_legacy_log_round_trip_keeps_format() {
        let text = synth::generate_log(&SynthConfig {
            format: LogFormat::Legacy,
            ..Default::default()
        });
        let store = MemorySnapshotStore::new();
        let id = store.store(&Snapshot::raw_log(text.as_str(), None)).unwrap();
        let (_, loaded) = fetch_analysis(&store, &id, &Extractor::default()).unwrap();
        assert_eq!(loaded.format, Some(LogFormat::Legacy));
        assert!(loaded.averages.iter().all(|s| s.thread_times.is_none()));
    }
}
