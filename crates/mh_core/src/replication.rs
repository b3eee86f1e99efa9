//! Replication primitive: a value with exactly one authorized writer.
//!
//! Every field that is visible to remote observers is wrapped in
//! [`Replicated`]. The wrapper rejects writes from any role other than its
//! writer, and reports whether an accepted write actually changed the value so
//! the owner can broadcast a change notification afterwards. Notifications are
//! always dispatched after the write is accepted, never before.

use crate::error::{CoreError, Result};
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};

/// The role a caller acts as when issuing a command or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authority {
    /// The single authoritative match process.
    Server,
    /// A connected player's client.
    Client(PlayerId),
}

impl Authority {
    pub fn is_server(self) -> bool {
        matches!(self, Authority::Server)
    }
}

/// A replicated value with a single write-authority role.
///
/// The server may always write (it is the authority that accepts or rejects
/// every mutation). A client may write only if it is the designated writer,
/// which is used for the small set of per-player fields such as vote
/// targeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replicated<T> {
    value: T,
    writer: Authority,
}

impl<T: PartialEq> Replicated<T> {
    /// A server-owned field. This is the common case.
    pub fn server_owned(value: T) -> Self {
        Self { value, writer: Authority::Server }
    }

    /// A field writable by one specific client (and the server).
    pub fn client_owned(value: T, owner: PlayerId) -> Self {
        Self { value, writer: Authority::Client(owner) }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn writer(&self) -> Authority {
        self.writer
    }

    /// Apply a write from `caller`. Returns `Ok(true)` if the value changed,
    /// `Ok(false)` if the write was accepted but equal to the current value,
    /// and `Err(NotAuthoritative)` if `caller` holds no write authority.
    pub fn set(&mut self, caller: Authority, value: T) -> Result<bool> {
        if !caller.is_server() && caller != self.writer {
            return Err(CoreError::NotAuthoritative(caller));
        }
        if self.value == value {
            return Ok(false);
        }
        self.value = value;
        Ok(true)
    }

    /// Server-side write. Panics never; the server always holds authority.
    pub fn set_server(&mut self, value: T) -> bool {
        // Server writes cannot fail the authority check.
        self.set(Authority::Server, value).unwrap_or(false)
    }
}

impl<T: Copy> Replicated<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_owned_rejects_client_write() {
        let mut field = Replicated::server_owned(3u32);
        let err = field.set(Authority::Client(PlayerId(1)), 7).unwrap_err();
        assert_eq!(err, CoreError::NotAuthoritative(Authority::Client(PlayerId(1))));
        assert_eq!(*field.get(), 3);
    }

    #[test]
    fn test_client_owned_accepts_owner_and_server() {
        let owner = PlayerId(4);
        let mut field = Replicated::client_owned(None::<u8>, owner);
        assert!(field.set(Authority::Client(owner), Some(1)).unwrap());
        assert!(field.set(Authority::Server, Some(2)).unwrap());
        let other = Authority::Client(PlayerId(5));
        assert!(field.set(other, Some(3)).is_err());
        assert_eq!(*field.get(), Some(2));
    }

    #[test]
    fn test_unchanged_write_reports_false() {
        let mut field = Replicated::server_owned(10i32);
        assert!(!field.set(Authority::Server, 10).unwrap());
        assert!(field.set(Authority::Server, 11).unwrap());
    }
}
