use std::{collections::BTreeSet, fmt};

/// Opaque handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Presence phase derived from the participant count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Solo,
    Populated,
}

impl Phase {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Phase::Empty,
            1 => Phase::Solo,
            _ => Phase::Populated,
        }
    }
}

/// Membership set for the participants of one relay instance.
///
/// The count is the size of the set, so it can never drop below zero and a
/// repeated leave for the same connection is not double-counted.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: BTreeSet<ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the connection was already registered.
    pub fn join(&mut self, id: ConnectionId) -> bool {
        self.members.insert(id)
    }

    /// Returns `false` if the connection was not registered.
    pub fn leave(&mut self, id: ConnectionId) -> bool {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_count(self.count())
    }

    /// Copy of the current members, in join-id order.
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.members.iter().copied().collect()
    }
}
