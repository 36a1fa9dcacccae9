//! Size-bounded eviction
//!
//! Eviction is triggered when the document cache grows past its ceiling.
//! It then removes the largest payloads first until the cache is at or
//! below `target_percent` of the ceiling.

use meddir_core::{config::ContentCacheConfig, domain::CacheEntry};

// ============================================================================
// EvictionPolicy
// ============================================================================

/// Ceiling and target for the document cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Maximum total payload bytes before eviction kicks in.
    pub max_bytes: u64,
    /// Share of `max_bytes` eviction stops at (0-100).
    pub target_percent: u8,
}

impl EvictionPolicy {
    pub fn new(max_bytes: u64, target_percent: u8) -> Self {
        Self {
            max_bytes,
            target_percent: target_percent.min(100),
        }
    }

    pub fn from_config(config: &ContentCacheConfig) -> Self {
        Self::new(config.max_size_bytes(), config.target_percent)
    }

    /// Size eviction brings the cache down to.
    pub fn target_bytes(&self) -> u64 {
        (self.max_bytes * self.target_percent as u64) / 100
    }

    /// Returns `true` when `total_bytes` exceeds the ceiling.
    pub fn is_over_ceiling(&self, total_bytes: u64) -> bool {
        total_bytes > self.max_bytes
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(500 * 1024 * 1024, 80)
    }
}

// ============================================================================
// EvictionReport
// ============================================================================

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// URLs removed, in eviction order.
    pub evicted: Vec<String>,
    pub bytes_freed: u64,
}

impl EvictionReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: EvictionReport) {
        self.evicted.extend(other.evicted);
        self.bytes_freed += other.bytes_freed;
    }
}

/// Picks entries to remove so the remaining total is at or below
/// `target_bytes`, largest first.
///
/// Equal sizes are broken by age, older first.
pub fn select_victims(entries: &[CacheEntry], target_bytes: u64) -> Vec<CacheEntry> {
    let mut total: u64 = entries.iter().map(|e| e.size).sum();
    if total <= target_bytes {
        return Vec::new();
    }

    let mut by_size: Vec<&CacheEntry> = entries.iter().collect();
    by_size.sort_by(|a, b| {
        b.size
            .cmp(&a.size)
            .then_with(|| a.inserted_at.cmp(&b.inserted_at))
    });

    let mut victims = Vec::new();
    for entry in by_size {
        if total <= target_bytes {
            break;
        }
        total = total.saturating_sub(entry.size);
        victims.push(entry.clone());
    }
    victims
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(url: &str, size: u64, age_secs: i64) -> CacheEntry {
        CacheEntry {
            url: url.to_string(),
            size,
            content_type: None,
            inserted_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_target_bytes() {
        let policy = EvictionPolicy::new(1000, 80);
        assert_eq!(policy.target_bytes(), 800);
        assert!(!policy.is_over_ceiling(1000));
        assert!(policy.is_over_ceiling(1001));
    }

    #[test]
    fn test_target_percent_is_clamped() {
        assert_eq!(EvictionPolicy::new(1000, 150).target_bytes(), 1000);
    }

    #[test]
    fn test_from_config() {
        let config = ContentCacheConfig {
            max_size_mb: 2,
            target_percent: 50,
            ..ContentCacheConfig::default()
        };
        let policy = EvictionPolicy::from_config(&config);
        assert_eq!(policy.max_bytes, 2 * 1024 * 1024);
        assert_eq!(policy.target_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_no_victims_under_target() {
        let entries = vec![entry("/a", 300, 0), entry("/b", 400, 0)];
        assert!(select_victims(&entries, 800).is_empty());
    }

    #[test]
    fn test_largest_first_until_target() {
        let entries = vec![
            entry("/small", 100, 3),
            entry("/large", 500, 2),
            entry("/medium", 300, 1),
            entry("/mid2", 250, 0),
        ];
        // total 1150, target 500: drop 500 -> 650, drop 300 -> 350
        let victims: Vec<_> = select_victims(&entries, 500)
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(victims, vec!["/large", "/medium"]);
    }

    #[test]
    fn test_ties_evict_oldest_first() {
        let entries = vec![entry("/new", 100, 0), entry("/old", 100, 60)];
        let victims = select_victims(&entries, 150);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].url, "/old");
    }

    #[test]
    fn test_report_merge() {
        let mut report = EvictionReport {
            evicted: vec!["/a".into()],
            bytes_freed: 10,
        };
        report.merge(EvictionReport {
            evicted: vec!["/b".into()],
            bytes_freed: 5,
        });
        assert_eq!(report.evicted, vec!["/a", "/b"]);
        assert_eq!(report.bytes_freed, 15);
        assert!(!report.is_empty());
    }
}
