//! Observable events emitted after each committed bet or resolution
//!
//! Serialized form is a JSON object tagged by `"event"` with kebab-case
//! field names, e.g. `{"event":"bet-placed","game-id":1,...}`.

use crate::common::types::{AccountId, Amount, GameId};
use crate::games::types::DieFace;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BetPlaced {
    pub game_id: GameId,
    pub player: AccountId,
    pub prediction: DieFace,
    pub stake: Amount,
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GameResolved {
    pub game_id: GameId,
    pub player: AccountId,
    pub prediction: DieFace,
    pub outcome: DieFace,
    pub win: bool,
    pub payout: Amount,
    pub fee: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum GameEvent {
    #[serde(rename = "bet-placed")]
    BetPlaced(BetPlaced),
    #[serde(rename = "game-resolved")]
    GameResolved(GameResolved),
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::BetPlaced(e) => e.game_id,
            GameEvent::GameResolved(e) => e.game_id,
        }
    }
}

/// Fan-out of engine events to any number of subscribers
#[derive(Clone)]
pub struct EventBus {
    publisher: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (publisher, _) = broadcast::channel(capacity.max(1));
        Self { publisher }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.publisher.subscribe()
    }

    /// Publish to current subscribers; having none is not an error
    pub fn emit(&self, event: GameEvent) {
        if tracing::enabled!(target: "dicehouse::events", tracing::Level::DEBUG) {
            if let Ok(json) = serde_json::to_string(&event) {
                tracing::debug!(target: "dicehouse::events", %json, "Event emitted");
            }
        }
        let _ = self.publisher.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.publisher.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet_placed() -> GameEvent {
        GameEvent::BetPlaced(BetPlaced {
            game_id: 1,
            player: AccountId::new([1u8; 32]),
            prediction: DieFace::new(3).unwrap(),
            stake: 1_000_000,
            height: 42,
        })
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(bet_placed()).unwrap();

        assert_eq!(json["event"], "bet-placed");
        assert_eq!(json["game-id"], 1);
        assert_eq!(json["prediction"], 3);
        assert_eq!(json["stake"], 1_000_000);
        assert_eq!(json["height"], 42);
        assert_eq!(json["player"], "01".repeat(32));
    }

    #[test]
    fn test_resolved_event_fields() {
        let event = GameEvent::GameResolved(GameResolved {
            game_id: 2,
            player: AccountId::new([2u8; 32]),
            prediction: DieFace::new(3).unwrap(),
            outcome: DieFace::new(3).unwrap(),
            win: true,
            payout: 5_820_000,
            fee: 180_000,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "game-resolved");
        assert_eq!(json["win"], true);
        assert_eq!(json["fee"], 180_000);

        let parsed: GameEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(bet_placed());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.game_id(), 1);
    }

    #[test]
    fn test_delivery_independent_of_log_level() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit(bet_placed());
        let debug_logger = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(debug_logger, || bus.emit(bet_placed()));

        assert_eq!(rx.try_recv().unwrap(), bet_placed());
        assert_eq!(rx.try_recv().unwrap(), bet_placed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(bet_placed());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
