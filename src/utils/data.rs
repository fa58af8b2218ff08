use crate::utils::leaderboard::LeaderboardEntry;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable value to a pretty-printed JSON file,
/// creating parent directories as needed
pub fn save_to_cache<T: Serialize + ?Sized>(value: &T, cache_file: impl AsRef<Path>) -> Result<()> {
    let cache_file = cache_file.as_ref();
    if let Some(parent) = cache_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(value).context("Failed to serialize data")?;
    std::fs::write(cache_file, json)
        .with_context(|| format!("Failed to write {}", cache_file.display()))?;
    Ok(())
}

/// Load a value from a JSON file
pub fn load_from_cache<T: DeserializeOwned>(cache_file: impl AsRef<Path>) -> Result<T> {
    let cache_file = cache_file.as_ref();
    let json = std::fs::read_to_string(cache_file)
        .with_context(|| format!("Failed to read {}", cache_file.display()))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to deserialize {}", cache_file.display()))?;
    Ok(value)
}

/// Save the leaderboard to CSV
pub fn save_leaderboard_to_csv(entries: &[LeaderboardEntry], filename: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename.as_ref()).context("Failed to create CSV file")?;

    writer.write_record([
        "Rank",
        "Username",
        "Display Name",
        "Total Points",
        "Correct Picks",
        "Total Picks",
        "Win Rate (%)",
        "Best Bets Correct",
        "Best Bets Total",
    ])?;

    for (i, entry) in entries.iter().enumerate() {
        writer.write_record([
            (i + 1).to_string(),
            entry.username.clone(),
            entry.display_name.clone(),
            entry.total_points.to_string(),
            entry.correct_picks.to_string(),
            entry.total_picks.to_string(),
            format!("{:.1}", entry.win_rate() * 100.0),
            entry.best_bets_correct.to_string(),
            entry.best_bets_total.to_string(),
        ])?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_cache_round_trip_creates_dirs() {
        let dir = std::env::temp_dir().join(format!("pickem-data-{}", std::process::id()));
        let file = dir.join("nested").join("totals.json");

        let mut totals = BTreeMap::new();
        totals.insert("alice".to_string(), 4u32);
        save_to_cache(&totals, &file).unwrap();

        let loaded: BTreeMap<String, u32> = load_from_cache(&file).unwrap();
        assert_eq!(loaded, totals);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_leaderboard_to_csv() {
        let file = std::env::temp_dir().join(format!("pickem-board-{}.csv", std::process::id()));
        let entries = vec![LeaderboardEntry {
            user_id: "alice".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            total_points: 4,
            total_picks: 3,
            correct_picks: 2,
            best_bets_total: 1,
            best_bets_correct: 1,
        }];

        save_leaderboard_to_csv(&entries, &file).unwrap();
        let csv = std::fs::read_to_string(&file).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Rank,Username"));
        assert_eq!(lines.next().unwrap(), "1,alice,Alice,4,2,3,66.7,1,1");

        std::fs::remove_file(&file).ok();
    }
}
