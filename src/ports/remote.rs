//! Remote URL parsing and protocol rendering

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.\-]+@)?(?P<host>[\w.\-]+):(?P<path>[^/][^:]*)$")
        .expect("Invalid regex pattern")
});

static URL_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>https?|ssh|git)://(?:[^@/]+@)?(?P<host>[\w.\-]+)(?::\d+)?/(?P<path>.+)$")
        .expect("Invalid regex pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteProtocol {
    Https,
    Ssh,
    Git,
}

impl RemoteProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteProtocol::Https => "https",
            RemoteProtocol::Ssh => "ssh",
            RemoteProtocol::Git => "git",
        }
    }
}

impl fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "https" | "http" => Ok(RemoteProtocol::Https),
            "ssh" => Ok(RemoteProtocol::Ssh),
            "git" => Ok(RemoteProtocol::Git),
            other => Err(format!("unrecognized protocol '{other}' (expected https, ssh or git)")),
        }
    }
}

/// A parsed `host/owner/name` remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub protocol: RemoteProtocol,
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RemoteUrl {
    /// Parse https, ssh://, git:// and scp-style (`git@host:owner/name.git`) URLs.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let (protocol, host, path) = if let Some(caps) = URL_LIKE.captures(url) {
            let protocol = match &caps["scheme"] {
                "ssh" => RemoteProtocol::Ssh,
                "git" => RemoteProtocol::Git,
                _ => RemoteProtocol::Https,
            };
            (protocol, caps["host"].to_string(), caps["path"].to_string())
        } else if let Some(caps) = SCP_LIKE.captures(url) {
            (
                RemoteProtocol::Ssh,
                caps["host"].to_string(),
                caps["path"].to_string(),
            )
        } else {
            return None;
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, name) = path.rsplit_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self {
            protocol,
            host,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Render this remote using `protocol`
    pub fn render(&self, protocol: RemoteProtocol) -> String {
        match protocol {
            RemoteProtocol::Https => {
                format!("https://{}/{}/{}.git", self.host, self.owner, self.name)
            }
            RemoteProtocol::Ssh => format!("git@{}:{}/{}.git", self.host, self.owner, self.name),
            RemoteProtocol::Git => format!("git://{}/{}/{}.git", self.host, self.owner, self.name),
        }
    }
}
