//! Outstanding command bookkeeping.
//!
//! Every command sent with an acknowledgement expected gets a monotonically
//! increasing id and a 5-second deadline. Acknowledgements (MID 0005/0004)
//! name the MID they answer, not the command, so resolution is FIFO per
//! MID.

use std::time::{Duration, Instant};

use crate::error::ClientError;

/// How long the controller gets to acknowledge a command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// One in-flight command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub command_id: u64,
    pub mid: u16,
    pub issued_at: Instant,
    pub deadline: Instant,
}

#[derive(Debug)]
pub struct CommandTracker {
    // Insertion order preserved; ids are unique and monotone.
    pending: Vec<PendingCommand>,
    next_id: u64,
    allow_duplicates: bool,
}

impl CommandTracker {
    pub fn new(allow_duplicates: bool) -> Self {
        Self {
            pending: Vec::new(),
            next_id: 1,
            allow_duplicates,
        }
    }

    /// Admit a command for tracking. Fails fast (no bytes written by the
    /// caller) when the MID already has a pending entry and duplicates are
    /// not allowed.
    pub fn admit(&mut self, mid: u16, now: Instant) -> Result<u64, ClientError> {
        if !self.allow_duplicates && self.has_pending(mid) {
            return Err(ClientError::DuplicateCommand { mid });
        }
        let command_id = self.next_id;
        self.next_id += 1;
        self.pending.push(PendingCommand {
            command_id,
            mid,
            issued_at: now,
            deadline: now + COMMAND_TIMEOUT,
        });
        Ok(command_id)
    }

    pub fn has_pending(&self, mid: u16) -> bool {
        self.pending.iter().any(|p| p.mid == mid)
    }

    /// Resolve the first (oldest) pending entry for `mid`.
    pub fn resolve_first(&mut self, mid: u16) -> Option<PendingCommand> {
        let index = self.pending.iter().position(|p| p.mid == mid)?;
        Some(self.pending.remove(index))
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<PendingCommand> {
        let mut expired = Vec::new();
        self.pending.retain(|p| {
            if now >= p.deadline {
                expired.push(p.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Drain everything, oldest first. Used on disconnect.
    pub fn abort_all(&mut self) -> Vec<PendingCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
