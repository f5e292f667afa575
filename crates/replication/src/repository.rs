//! Packet repositories
//!
//! Packets are numbered by replication sequence; a consumer that has applied
//! packet `N` asks for `N + 1` until the repository has nothing newer. A
//! missing packet is `Ok(None)`, not an error.

#[cfg(feature = "http")]
use crate::error::ReplicationError;
use crate::error::ReplicationResult;
use crate::packet::ReplicationPacket;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of numbered packets.
pub trait PacketRepository: Send + Sync {
    /// Fetch packet `sequence`, if it exists.
    fn packet(&self, sequence: i32) -> ReplicationResult<Option<ReplicationPacket>>;
}

/// File name of packet `sequence`.
pub fn packet_file_name(sequence: i32) -> String {
    format!("replication-{}.tar.zst", sequence)
}

/// Packets stored in a local directory as `replication-<N>.tar.zst` or
/// `replication-<N>.tar`.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    dir: PathBuf,
}

impl DirectoryRepository {
    /// Repository over `dir`.
    pub fn new(dir: &Path) -> Self {
        DirectoryRepository {
            dir: dir.to_path_buf(),
        }
    }

    /// Directory packets are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PacketRepository for DirectoryRepository {
    fn packet(&self, sequence: i32) -> ReplicationResult<Option<ReplicationPacket>> {
        let candidates = [
            self.dir.join(packet_file_name(sequence)),
            self.dir.join(format!("replication-{}.tar", sequence)),
        ];
        for path in candidates {
            if path.is_file() {
                debug!(target: "musearch::replication", path = %path.display(), "Opening packet");
                return ReplicationPacket::open(&path).map(Some);
            }
        }
        Ok(None)
    }
}

/// Packets served over HTTP at `<base>/replication-<N>.tar.zst`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpRepository {
    base_url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "http")]
impl HttpRepository {
    /// Repository rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        HttpRepository {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(60))
                .build(),
        }
    }

    fn url(&self, sequence: i32) -> String {
        format!("{}/{}", self.base_url, packet_file_name(sequence))
    }
}

#[cfg(feature = "http")]
impl PacketRepository for HttpRepository {
    fn packet(&self, sequence: i32) -> ReplicationResult<Option<ReplicationPacket>> {
        let url = self.url(sequence);
        debug!(target: "musearch::replication", url = %url, "Fetching packet");
        match self.agent.get(&url).call() {
            Ok(response) => ReplicationPacket::read(response.into_reader()).map(Some),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(ReplicationError::Repository(format!("{}: {}", url, e))),
        }
    }
}
