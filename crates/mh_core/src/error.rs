use crate::replication::Authority;
use crate::types::{PlayerId, RoomId, StationId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced to command callers.
///
/// Internal fallbacks (missing candidates, empty tallies, full rooms) do not
/// produce errors; they resolve via the documented fallback paths and log a
/// warning instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown player {0:?}")]
    UnknownPlayer(PlayerId),

    #[error("unknown station {0:?}")]
    UnknownStation(StationId),

    #[error("unknown room {0:?}")]
    UnknownRoom(RoomId),

    #[error("caller {0:?} is not authorized for this write")]
    NotAuthoritative(Authority),

    #[error("no free seat for a new player")]
    CapacityExhausted,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
