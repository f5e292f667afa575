//! Change data capture for the search indexes
//!
//! Turns raw change-log fragments into ordered, complete [`Change`]s:
//! - [`unpack`]: COPY text and packed column encodings
//! - [`decoder`]: fragment merging by sequence id
//! - [`packet`]: archived packets (tar, optionally zstd-compressed)
//! - [`repository`]: numbered packet sources (directory, HTTP)
//! - [`changelog`]: the live change-log tables of the source database
//!
//! Both the live log and archived packets produce the same
//! [`ReplicationPacket`].
//!
//! [`Change`]: musearch_core::Change

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changelog;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod repository;
pub mod unpack;

pub use changelog::{ChangeLog, SqliteChangeLog};
pub use decoder::{decode, ChangeDecoder, DecodedBatch, DroppedChange, Fragment, Side};
pub use error::{ReplicationError, ReplicationResult};
pub use packet::{PacketWriter, ReplicationPacket};
#[cfg(feature = "http")]
pub use repository::HttpRepository;
pub use repository::{packet_file_name, DirectoryRepository, PacketRepository};
