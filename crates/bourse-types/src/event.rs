//! Best-effort market notifications.
//!
//! Events are emitted after the owning transaction commits. Delivery is
//! not part of the engine's correctness contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, InstrumentId, InstrumentStatus, OrderId, Trade};

/// Something subscribers may want to relay (websocket, pub/sub, logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    TradeExecuted {
        trade: Trade,
    },
    IpoPriceUpdated {
        instrument_id: InstrumentId,
        price: Decimal,
        at: DateTime<Utc>,
    },
    InstrumentStatusChanged {
        instrument_id: InstrumentId,
        from: InstrumentStatus,
        to: InstrumentStatus,
    },
    OrderCancelled {
        order_id: OrderId,
        instrument_id: InstrumentId,
        cancelled_quantity: u64,
    },
    SharesVested {
        account_id: AccountId,
        instrument_id: InstrumentId,
        quantity: u64,
        unlocked_total: u64,
    },
}

impl MarketEvent {
    #[must_use]
    pub fn instrument_id(&self) -> InstrumentId {
        match self {
            Self::TradeExecuted { trade } => trade.instrument_id,
            Self::IpoPriceUpdated { instrument_id, .. }
            | Self::InstrumentStatusChanged { instrument_id, .. }
            | Self::OrderCancelled { instrument_id, .. }
            | Self::SharesVested { instrument_id, .. } => *instrument_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_tag() {
        let event = MarketEvent::InstrumentStatusChanged {
            instrument_id: InstrumentId::new(),
            from: InstrumentStatus::IpoActive,
            to: InstrumentStatus::Trading,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"instrument_status_changed\""));
        let back: MarketEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
