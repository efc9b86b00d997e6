//! The closed set of supported services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which integration serves a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Qbittorrent,
    Deluge,
    Transmission,
    PiholeV5,
    PiholeV6,
    Github,
    Jellyseerr,
    Overseerr,
    HttpProbe,
    IcmpProbe,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 10] = [
        AdapterKind::Qbittorrent,
        AdapterKind::Deluge,
        AdapterKind::Transmission,
        AdapterKind::PiholeV5,
        AdapterKind::PiholeV6,
        AdapterKind::Github,
        AdapterKind::Jellyseerr,
        AdapterKind::Overseerr,
        AdapterKind::HttpProbe,
        AdapterKind::IcmpProbe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Qbittorrent => "qbittorrent",
            AdapterKind::Deluge => "deluge",
            AdapterKind::Transmission => "transmission",
            AdapterKind::PiholeV5 => "pihole_v5",
            AdapterKind::PiholeV6 => "pihole_v6",
            AdapterKind::Github => "github",
            AdapterKind::Jellyseerr => "jellyseerr",
            AdapterKind::Overseerr => "overseerr",
            AdapterKind::HttpProbe => "http_probe",
            AdapterKind::IcmpProbe => "icmp_probe",
        }
    }

    /// Secret field names a widget of this kind may hold.
    ///
    /// Pi-hole lists both fields but holds only one of them, see
    /// [`AdapterKind::single_secret`].
    pub fn secret_fields(&self) -> &'static [&'static str] {
        match self {
            AdapterKind::Qbittorrent | AdapterKind::Deluge | AdapterKind::Transmission => {
                &["password"]
            }
            AdapterKind::PiholeV5 | AdapterKind::PiholeV6 => &["apiToken", "password"],
            AdapterKind::Github => &["apiToken"],
            AdapterKind::Jellyseerr | AdapterKind::Overseerr => &["apiKey"],
            AdapterKind::HttpProbe | AdapterKind::IcmpProbe => &[],
        }
    }

    /// True when the widget may hold at most one of its secret fields.
    pub fn single_secret(&self) -> bool {
        matches!(self, AdapterKind::PiholeV5 | AdapterKind::PiholeV6)
    }

    /// True for probes, which never log in.
    pub fn is_probe(&self) -> bool {
        matches!(self, AdapterKind::HttpProbe | AdapterKind::IcmpProbe)
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdapterKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown adapter kind '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for kind in AdapterKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<AdapterKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert!("plex".parse::<AdapterKind>().is_err());
    }

    #[test]
    fn test_probes_have_no_secrets() {
        assert!(AdapterKind::HttpProbe.secret_fields().is_empty());
        assert!(AdapterKind::IcmpProbe.is_probe());
        assert!(AdapterKind::PiholeV6.secret_fields().contains(&"apiToken"));
        assert!(AdapterKind::PiholeV5.single_secret());
        assert!(!AdapterKind::Github.single_secret());
    }
}
