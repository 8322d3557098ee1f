//! Actor-owned registry of in-flight reservations
//!
//! A single task owns the map; handles talk to it over a bounded mailbox.
//!
//! ```text
//! OrderService ──┐                     ┌──▶ HashMap<ReservationId, RegistryEntry>
//! Supervisor  ───┼─ RegistryHandle ────┤
//! Gateway     ───┘  (mpsc, bounded)    └──  RegistryActor (single task)
//! ```
//!
//! Entries live exactly as long as their supervisor: the supervisor is the
//! only caller of `remove`, except for the creator rolling back an entry
//! that never got one.

use crate::handshake::HandshakeSender;
use crate::types::{Reservation, ReservationDraft, ReservationId};
use crate::{Error, Result};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Registry entry: the pending reservation and its payment channel
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub reservation: Reservation,
    pub handshake: HandshakeSender,
}

/// Message sent to the registry actor
pub enum RegistryMessage {
    /// Allocate an id and insert a pending reservation
    Create {
        draft: ReservationDraft,
        handshake: HandshakeSender,
        response: oneshot::Sender<Reservation>,
    },

    /// Look up an entry
    Get {
        id: ReservationId,
        response: oneshot::Sender<Option<RegistryEntry>>,
    },

    /// Delete an entry
    Remove {
        id: ReservationId,
        response: oneshot::Sender<bool>,
    },

    /// Count entries
    Len { response: oneshot::Sender<usize> },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the reservation map
pub struct RegistryActor {
    entries: HashMap<ReservationId, RegistryEntry>,
    mailbox: mpsc::Receiver<RegistryMessage>,
}

impl RegistryActor {
    /// Create new actor
    pub fn new(mailbox: mpsc::Receiver<RegistryMessage>) -> Self {
        Self {
            entries: HashMap::new(),
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                RegistryMessage::Shutdown => {
                    tracing::info!(active = self.entries.len(), "Registry shutting down");
                    break;
                }
                msg => self.handle_message(msg),
            }
        }
    }

    fn handle_message(&mut self, msg: RegistryMessage) {
        match msg {
            RegistryMessage::Create {
                draft,
                handshake,
                response,
            } => {
                let id = self.allocate_id();
                let reservation = Reservation::pending(id, draft);
                self.entries.insert(
                    id,
                    RegistryEntry {
                        reservation: reservation.clone(),
                        handshake,
                    },
                );
                tracing::debug!(reservation_id = %id, "Registered pending reservation");
                let _ = response.send(reservation);
            }

            RegistryMessage::Get { id, response } => {
                let _ = response.send(self.entries.get(&id).cloned());
            }

            RegistryMessage::Remove { id, response } => {
                let removed = self.entries.remove(&id).is_some();
                let _ = response.send(removed);
            }

            RegistryMessage::Len { response } => {
                let _ = response.send(self.entries.len());
            }

            RegistryMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }

    /// Fresh id not present in the map
    fn allocate_id(&self) -> ReservationId {
        loop {
            let id = ReservationId::generate();
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
}

impl RegistryHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<RegistryMessage>) -> Self {
        Self { sender }
    }

    /// Insert a pending reservation under a freshly allocated id
    pub async fn create(
        &self,
        draft: ReservationDraft,
        handshake: HandshakeSender,
    ) -> Result<Reservation> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Create {
                draft,
                handshake,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Look up a pending reservation
    pub async fn get(&self, id: ReservationId) -> Result<Option<RegistryEntry>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Get { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Delete an entry, returning whether it was present
    pub async fn remove(&self, id: ReservationId) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Remove { id, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Number of pending reservations
    pub async fn len(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Len { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RegistryMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the registry actor with a bounded mailbox
pub fn spawn_registry(mailbox_capacity: usize) -> RegistryHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = RegistryActor::new(rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    RegistryHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake;
    use crate::types::tests::sample_solution;
    use crate::types::{MachineId, ReservationStatus, SubjectId};
    use std::collections::HashSet;

    fn draft(user: &str) -> ReservationDraft {
        ReservationDraft {
            user_id: SubjectId::new(user),
            solution: sample_solution(),
            solution_digest: "00".repeat(32),
            placed_at: chrono::Utc::now(),
            machine_id: MachineId::unassigned(),
        }
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = spawn_registry(16);
        let (tx, _rx) = handshake::channel();

        let reservation = registry.create(draft("alice"), tx).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);

        let entry = registry.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(entry.reservation, reservation);
        assert_eq!(registry.len().await.unwrap(), 1);

        assert!(registry.remove(reservation.id).await.unwrap());
        assert!(!registry.remove(reservation.id).await.unwrap());
        assert!(registry.get(reservation.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_distinct_ids() {
        let registry = spawn_registry(8);

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (tx, _rx) = handshake::channel();
                    registry.create(draft(&format!("user-{}", i)), tx).await.unwrap().id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(registry.len().await.unwrap(), 64);
    }

    #[tokio::test]
    async fn test_handle_fails_after_shutdown() {
        let registry = spawn_registry(4);
        registry.shutdown().await.unwrap();

        // Give the actor a chance to exit
        tokio::task::yield_now().await;

        let result = registry.len().await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }
}
