use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::entities::owner::StockOwner;

/// Events emitted by the stock-lot core after committed mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The per-owner/per-vaccine expiration summary is stale. Downstream
    /// consumers recompute whatever materialization they keep (nearest
    /// expiration, dashboards); nothing in this core depends on it.
    StockSummaryStale {
        vaccine_id: i64,
        owner_level: String,
        owner_id: Option<i64>,
    },

    // Lot events
    LotCreated {
        lot_id: i64,
        vaccine_id: i64,
    },
    LotsExpired {
        lot_ids: Vec<i64>,
    },
    LotsDeleted {
        lot_ids: Vec<i64>,
    },

    // Dose movement events
    DosesConsumed {
        vaccine_id: i64,
        quantity: i32,
    },
    DoseReserved {
        vaccine_id: i64,
        health_center_id: i64,
        lot_id: i64,
        quantity: i32,
    },
    DoseReleased {
        vaccine_id: i64,
        health_center_id: i64,
        lot_id: i64,
        quantity: i32,
    },
    TransferRecorded {
        transfer_id: i64,
        quantity: i32,
    },
}

/// Sends core events to whatever consumer is attached.
///
/// Constructed either over a channel (`new`) or as a no-op (`disabled`).
/// The disabled form is the default wiring for callers that attach no
/// summary materialization.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Option<mpsc::Sender<Event>>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sender that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Sends an event, reporting delivery failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        match &self.sender {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| format!("failed to send event: {}", e)),
            None => Ok(()),
        }
    }

    /// Best-effort send. Event delivery must never fail a committed stock
    /// mutation, so errors are logged and swallowed.
    pub async fn emit(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "dropping stock event");
        }
    }

    /// Fires the expiration-summary refresh hook for one owner/vaccine
    /// combination.
    pub async fn stock_summary_stale(&self, vaccine_id: i64, owner: StockOwner) {
        self.emit(Event::StockSummaryStale {
            vaccine_id,
            owner_level: owner.level.as_str().to_string(),
            owner_id: owner.id,
        })
        .await;
    }
}

/// Drains events from the channel and logs them. Callers that keep a real
/// expiration-summary materialization replace this consumer with their own.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StockSummaryStale {
                vaccine_id,
                owner_level,
                owner_id,
            } => {
                debug!(
                    vaccine_id,
                    owner_level,
                    ?owner_id,
                    "stock summary marked stale"
                );
            }
            other => info!(event = ?other, "stock event"),
        }
    }
}
