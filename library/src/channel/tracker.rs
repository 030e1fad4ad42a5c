use std::collections::HashSet;

use call_signal_protocol::{CallDocument, DocumentSnapshot, IceCandidate, Role, SessionDescription};

use crate::channel::SignalEvent;
use crate::Error;

/// Turns the snapshots of a call document into the events of one participant.
///
/// Only the remote role's field is ever looked at, so echoes of the participant's own writes
/// never surface as events.
#[derive(Debug, Clone)]
pub struct SnapshotTracker {
    remote: Role,
    remote_joined: bool,
    last_description: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    finished: bool,
}

impl SnapshotTracker {
    /// Tracker for the participant playing `local`.
    #[must_use]
    pub const fn new(local: Role) -> Self {
        Self {
            remote: local.remote(),
            remote_joined: false,
            last_description: None,
            remote_candidates: Vec::new(),
            finished: false,
        }
    }

    /// `true` once a disconnect has been reported, no further events will be produced.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Remote candidates as of the last applied snapshot.
    #[must_use]
    pub fn remote_candidates(&self) -> &[IceCandidate] {
        &self.remote_candidates
    }

    /// Apply one snapshot and return the events it produces, in delivery order.
    ///
    /// # Errors
    /// Returns [`Error::MalformedSnapshot`] when the document cannot be decoded.
    /// The tracker state is left untouched in that case, so the snapshot can simply be skipped.
    pub fn apply(&mut self, snapshot: &DocumentSnapshot) -> crate::Result<Vec<SignalEvent>> {
        if self.finished {
            return Ok(Vec::new());
        }
        if !snapshot.exists {
            self.finished = true;
            return Ok(vec![SignalEvent::Disconnected]);
        }

        let document = CallDocument::from_data(&snapshot.data).map_err(Error::MalformedSnapshot)?;
        let Some(remote) = document.record(self.remote) else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        if !self.remote_joined {
            self.remote_joined = true;
            events.push(SignalEvent::Connected);
        }

        if let Some(description) = remote.description(self.remote) {
            if self.last_description.as_ref() != Some(description) {
                self.last_description = Some(description.clone());
                events.push(SignalEvent::RemoteDescription(description.clone()));
            }
        }

        let previous: HashSet<&IceCandidate> = self.remote_candidates.iter().collect();
        let mut delivered = HashSet::new();
        for candidate in &remote.ice_candidates {
            if !previous.contains(candidate) && delivered.insert(candidate) {
                events.push(SignalEvent::RemoteCandidate(candidate.clone()));
            }
        }
        // reconcile to the latest server state instead of accumulating a history
        self.remote_candidates = remote.ice_candidates.clone();

        Ok(events)
    }

    /// The snapshot stream ended. Reports a disconnect unless one was already reported.
    pub fn stream_ended(&mut self) -> Option<SignalEvent> {
        if self.finished {
            None
        } else {
            self.finished = true;
            Some(SignalEvent::Disconnected)
        }
    }
}
