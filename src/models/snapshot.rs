//! Normalized snapshots returned by a poll.
//!
//! Every integration maps its upstream payload into one of these shapes, so the
//! presentation layer only has to know five kinds of widget.

use serde::{Deserialize, Serialize};

/// The result of one successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainSnapshot {
    Torrents(TorrentSnapshot),
    AdBlock(AdBlockSnapshot),
    Repositories(RepositorySnapshot),
    MediaRequests(MediaRequestSnapshot),
    Reachability(ReachabilitySnapshot),
}

impl DomainSnapshot {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            DomainSnapshot::Torrents(_) => "torrents",
            DomainSnapshot::AdBlock(_) => "ad_block",
            DomainSnapshot::Repositories(_) => "repositories",
            DomainSnapshot::MediaRequests(_) => "media_requests",
            DomainSnapshot::Reachability(_) => "reachability",
        }
    }
}

/// Normalized torrent state across qBittorrent, Deluge and Transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    Downloading,
    Seeding,
    Paused,
    Checking,
    Queued,
    Stalled,
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentItem {
    /// Hash (qBittorrent, Deluge) or numeric id (Transmission) as a string.
    pub id: String,
    pub name: String,
    pub state: TorrentState,
    /// Completion in `0.0..=1.0`.
    pub progress: f64,
    pub size_bytes: u64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub eta_secs: Option<u64>,
    pub ratio: f64,
}

/// Client-wide transfer totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferStats {
    pub download_rate: u64,
    pub upload_rate: u64,
    pub downloading: usize,
    pub seeding: usize,
    pub paused: usize,
}

impl TransferStats {
    /// Count torrents by state; rates come from the client's own totals.
    pub fn tally(torrents: &[TorrentItem], download_rate: u64, upload_rate: u64) -> Self {
        let count = |state| torrents.iter().filter(|t| t.state == state).count();
        Self {
            download_rate,
            upload_rate,
            downloading: count(TorrentState::Downloading),
            seeding: count(TorrentState::Seeding),
            paused: count(TorrentState::Paused),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSnapshot {
    pub torrents: Vec<TorrentItem>,
    pub stats: TransferStats,
}

/// Pi-hole summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdBlockSnapshot {
    pub blocking_enabled: bool,
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub percent_blocked: f64,
    pub domains_on_blocklist: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub full_name: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub url: String,
}

/// Aggregate over the account's repositories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub repositories: usize,
    pub stars: u64,
    pub forks: u64,
    /// Open issues excluding pull requests.
    pub open_issues: u64,
    pub open_pull_requests: u64,
    /// Most starred first.
    pub top: Vec<RepositorySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub id: u64,
    pub media_type: String,
    pub tmdb_id: Option<u64>,
    pub requested_by: Option<String>,
    pub created_at: Option<String>,
}

/// Jellyseerr/Overseerr request queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRequestSnapshot {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub declined: u64,
    pub processing: u64,
    pub available: u64,
    pub pending_requests: Vec<MediaRequest>,
}

/// HTTP or ICMP probe result. An unreachable target is still a successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilitySnapshot {
    pub target: String,
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub latency_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent(id: &str, state: TorrentState) -> TorrentItem {
        TorrentItem {
            id: id.to_string(),
            name: format!("torrent {}", id),
            state,
            progress: 0.5,
            size_bytes: 1024,
            download_rate: 0,
            upload_rate: 0,
            eta_secs: None,
            ratio: 0.0,
        }
    }

    #[test]
    fn test_tally_counts_states() {
        let torrents = vec![
            torrent("a", TorrentState::Downloading),
            torrent("b", TorrentState::Seeding),
            torrent("c", TorrentState::Seeding),
            torrent("d", TorrentState::Paused),
            torrent("e", TorrentState::Checking),
        ];
        let stats = TransferStats::tally(&torrents, 100, 50);
        assert_eq!(stats.downloading, 1);
        assert_eq!(stats.seeding, 2);
        assert_eq!(stats.paused, 1);
        assert_eq!(stats.download_rate, 100);
    }

    #[test]
    fn test_snapshot_is_tagged() {
        let snapshot = DomainSnapshot::Reachability(ReachabilitySnapshot {
            target: "http://nas.local".to_string(),
            reachable: true,
            status_code: Some(200),
            latency_ms: Some(12.5),
        });
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["type"], "reachability");
        assert_eq!(json["reachable"], true);
        assert_eq!(snapshot.label(), "reachability");
    }
}
