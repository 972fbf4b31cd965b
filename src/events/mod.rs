use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Events emitted by the stock services. In-process, fire-and-forget;
/// consumers that need durability should bridge these to their own
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Movement ledger events
    MovementCreated {
        movement_id: Uuid,
        reference: String,
    },
    MovementValidated {
        movement_id: Uuid,
        movement_type: String,
        product_id: Uuid,
        quantity: Decimal,
    },
    MovementCancelled {
        movement_id: Uuid,
        was_validated: bool,
    },

    // Reservation events
    ReservationCreated {
        reservation_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    },
    ReservationReleased {
        reservation_id: Uuid,
    },
    ReservationsReleasedByReference {
        reference_type: String,
        reference_id: Uuid,
        released: u64,
    },
    ReservationsExpired {
        released: u64,
    },

    // Transfer workflow events
    TransferCreated {
        transfer_id: Uuid,
        reference: String,
    },
    TransferValidated {
        transfer_id: Uuid,
    },
    TransferShipped {
        transfer_id: Uuid,
    },
    TransferReceived {
        transfer_id: Uuid,
    },
    TransferCancelled {
        transfer_id: Uuid,
    },

    // Inventory count events
    InventoryCountCreated {
        inventory_id: Uuid,
        reference: String,
        lines: u64,
    },
    InventoryCountStarted {
        inventory_id: Uuid,
    },
    InventoryCountValidated {
        inventory_id: Uuid,
        adjustments: u64,
    },
    InventoryCountCancelled {
        inventory_id: Uuid,
    },

    // Cycle planner events
    CycleStarted {
        cycle_id: Uuid,
        inventory_id: Uuid,
    },
    CycleCompleted {
        cycle_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender/receiver pair with the given channel capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Spawn this as a task when
/// no richer consumer is wired in.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        debug!(?event, "Processing event");
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (sender, mut rx) = EventSender::channel(8);
        let movement_id = Uuid::new_v4();
        sender
            .send(Event::MovementValidated {
                movement_id,
                movement_type: "in".to_string(),
                product_id: Uuid::new_v4(),
                quantity: dec!(5),
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::MovementValidated {
                movement_id: got, ..
            } => assert_eq!(got, movement_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert!(sender
            .send(Event::ReservationsExpired { released: 0 })
            .await
            .is_err());
    }
}
