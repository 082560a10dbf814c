//! Order types for the Bourse order book.
//!
//! `filled_quantity` and `status` are private: the only mutators are
//! [`Order::apply_fill`] and [`Order::cancel`], so
//! `remaining == quantity - filled` and the terminal states are enforced
//! by the type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BourseError, InstrumentId, OrderId, Result};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The type of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Inbound order parameters, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument_id: InstrumentId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: u64,
    pub limit_price: Option<Decimal>,
}

impl OrderRequest {
    #[must_use]
    pub fn limit(instrument_id: InstrumentId, side: OrderSide, quantity: u64, price: Decimal) -> Self {
        Self {
            instrument_id,
            side,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(price),
        }
    }

    #[must_use]
    pub fn market(instrument_id: InstrumentId, side: OrderSide, quantity: u64) -> Self {
        Self {
            instrument_id,
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
        }
    }
}

/// Core order struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Present for LIMIT orders only; MARKET orders ignore any supplied price.
    pub limit_price: Option<Decimal>,
    pub quantity: u64,
    filled_quantity: u64,
    status: OrderStatus,
    /// Store-assigned admission sequence; breaks `created_at` ties.
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate a request and build an OPEN order.
    ///
    /// # Errors
    /// `InvalidOrderParameters` for a zero quantity or a LIMIT order
    /// without a positive limit price.
    pub fn new(
        account_id: AccountId,
        request: &OrderRequest,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if request.quantity == 0 {
            return Err(BourseError::InvalidOrderParameters {
                reason: "quantity must be positive".to_string(),
            });
        }
        let limit_price = match request.order_type {
            OrderType::Limit => {
                let price = request.limit_price.ok_or_else(|| {
                    BourseError::InvalidOrderParameters {
                        reason: "LIMIT order requires a limit price".to_string(),
                    }
                })?;
                if price <= Decimal::ZERO {
                    return Err(BourseError::InvalidOrderParameters {
                        reason: format!("limit price must be positive, got {price}"),
                    });
                }
                Some(price)
            }
            OrderType::Market => None,
        };
        Ok(Self {
            id: OrderId::new(),
            account_id,
            instrument_id: request.instrument_id,
            side: request.side,
            order_type: request.order_type,
            limit_price,
            quantity: request.quantity,
            filled_quantity: 0,
            status: OrderStatus::Open,
            sequence,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub fn filled_quantity(&self) -> u64 {
        self.filled_quantity
    }

    #[must_use]
    pub fn remaining_quantity(&self) -> u64 {
        self.quantity - self.filled_quantity
    }

    #[must_use]
    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market
    }

    /// Whether this order is willing to trade against a resting `price`.
    #[must_use]
    pub fn accepts_price(&self, price: Decimal) -> bool {
        match (self.order_type, self.limit_price) {
            (OrderType::Market, _) | (OrderType::Limit, None) => true,
            (OrderType::Limit, Some(limit)) => match self.side {
                OrderSide::Buy => limit >= price,
                OrderSide::Sell => limit <= price,
            },
        }
    }

    /// Record an execution of `quantity` shares.
    ///
    /// # Errors
    /// `InvalidOrderParameters` if the order is terminal or the fill
    /// exceeds the remaining quantity.
    pub fn apply_fill(&mut self, quantity: u64, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(BourseError::InvalidOrderParameters {
                reason: format!("order {} is {} and cannot be filled", self.id, self.status),
            });
        }
        if quantity == 0 || quantity > self.remaining_quantity() {
            return Err(BourseError::InvalidOrderParameters {
                reason: format!(
                    "fill of {quantity} invalid for order {} with {} remaining",
                    self.id,
                    self.remaining_quantity()
                ),
            });
        }
        self.filled_quantity += quantity;
        self.status = if self.remaining_quantity() == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the order, returning the quantity that was still open.
    ///
    /// # Errors
    /// `OrderNotCancellable` if the order is already FILLED or CANCELLED.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<u64> {
        if self.status.is_terminal() {
            return Err(BourseError::OrderNotCancellable {
                order_id: self.id,
                status: self.status,
            });
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(self.remaining_quantity())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: OrderSide, price: Decimal, qty: u64) -> Self {
        Self::dummy_limit_for(AccountId::new(), side, price, qty)
    }

    pub fn dummy_limit_for(account_id: AccountId, side: OrderSide, price: Decimal, qty: u64) -> Self {
        let request = OrderRequest::limit(InstrumentId::new(), side, qty, price);
        Self::new(account_id, &request, 0, Utc::now()).unwrap()
    }
}
