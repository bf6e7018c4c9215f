//! Stats Snapshots
//!
//! JSON dumps of `SimStats` for offline plotting.

use std::fs;
use std::path::{Path, PathBuf};

use crate::simulation::SimError;

use super::stats::SimStats;

/// File name for the snapshot taken at `tick`
pub fn snapshot_file_name(tick: u64) -> String {
    format!("stats_{:06}.json", tick)
}

/// Write `stats` as pretty JSON into `dir`, creating it if needed.
///
/// Returns the path of the written file.
pub fn write_stats_snapshot(dir: impl AsRef<Path>, stats: &SimStats) -> Result<PathBuf, SimError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(stats.tick));
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = SimStats {
            tick: 42,
            infected: 7,
            ..SimStats::default()
        };
        stats.alive.doctor = 3;

        let path = write_stats_snapshot(dir.path().join("snapshots"), &stats).unwrap();
        assert!(path.ends_with("stats_000042.json"));

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"infected\": 7"));
        let parsed: SimStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
