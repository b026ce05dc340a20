//! Paper exchange for dry runs.
//!
//! Holds simulated orders in memory and answers the exchange port from them,
//! detail lookups included. Ids use [`PAPER_ORDER_PREFIX`], which must differ
//! from the engine's simulated-order prefix so that filled paper orders are
//! looked up and replayed. Fills, expiries and outages are driven by the host
//! through the inherent methods.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::application::ports::{
    ExchangeGateway, ExchangeOrderStatus, GatewayError, OrderDetail, OrderLookup, OrderSummary,
};
use crate::domain::{InstrumentId, OrderId, Outcome, QuoteSide};

/// Id prefix of orders placed on the paper venue.
pub const PAPER_ORDER_PREFIX: &str = "paper-";

#[derive(Debug, Clone)]
struct PaperOrder {
    instrument_id: InstrumentId,
    outcome: Option<Outcome>,
    side: QuoteSide,
    price: Decimal,
    size: Decimal,
    size_matched: Decimal,
    status: ExchangeOrderStatus,
}

impl PaperOrder {
    fn summary(&self, id: &OrderId) -> OrderSummary {
        OrderSummary {
            id: id.clone(),
            instrument_id: self.instrument_id.clone(),
            side: self.side,
            price: self.price,
            size: self.size,
            size_matched: self.size_matched,
        }
    }

    fn detail(&self) -> OrderDetail {
        OrderDetail {
            status: self.status,
            size_matched: self.size_matched,
            original_size: self.size,
            price: self.price,
            side: self.side,
            outcome: self.outcome,
            instrument_id: self.instrument_id.clone(),
        }
    }

    const fn is_open(&self) -> bool {
        matches!(
            self.status,
            ExchangeOrderStatus::Live | ExchangeOrderStatus::Delayed
        )
    }
}

/// Simulated exchange.
#[derive(Debug)]
pub struct PaperExchangeGateway {
    prefix: String,
    orders: Mutex<BTreeMap<OrderId, PaperOrder>>,
    next_id: AtomicU64,
    available: AtomicBool,
    lookups_fail: AtomicBool,
}

impl Default for PaperExchangeGateway {
    fn default() -> Self {
        Self::new(PAPER_ORDER_PREFIX)
    }
}

impl PaperExchangeGateway {
    /// Create an empty venue minting ids with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            orders: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
            lookups_fail: AtomicBool::new(false),
        }
    }

    /// Rest a new order and return its id.
    pub fn place(
        &self,
        instrument_id: InstrumentId,
        outcome: Outcome,
        side: QuoteSide,
        price: Decimal,
        size: Decimal,
    ) -> OrderId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = OrderId::new(format!("{}{n}", self.prefix));
        self.insert(id.clone(), instrument_id, Some(outcome), side, price, size);
        id
    }

    /// Rest an order under a caller-chosen id.
    pub fn insert(
        &self,
        id: OrderId,
        instrument_id: InstrumentId,
        outcome: Option<Outcome>,
        side: QuoteSide,
        price: Decimal,
        size: Decimal,
    ) {
        self.orders.lock().insert(
            id,
            PaperOrder {
                instrument_id,
                outcome,
                side,
                price,
                size,
                size_matched: Decimal::ZERO,
                status: ExchangeOrderStatus::Live,
            },
        );
    }

    /// Match `qty` more of an open order. Fully matched orders leave the book.
    ///
    /// Returns false if the order is unknown or closed.
    pub fn fill(&self, id: &OrderId, qty: Decimal) -> bool {
        let mut orders = self.orders.lock();
        let Some(order) = orders.get_mut(id).filter(|o| o.is_open()) else {
            return false;
        };
        order.size_matched = (order.size_matched + qty).min(order.size);
        if order.size_matched == order.size {
            order.status = ExchangeOrderStatus::Matched;
        }
        debug!(order_id = %id, matched = %order.size_matched, "Paper fill");
        true
    }

    /// Move an order to a terminal status without further matching.
    pub fn close(&self, id: &OrderId, status: ExchangeOrderStatus) -> bool {
        match self.orders.lock().get_mut(id) {
            Some(order) => {
                order.status = status;
                true
            }
            None => false,
        }
    }

    /// Change the resting price of an order.
    pub fn reprice(&self, id: &OrderId, price: Decimal) -> bool {
        match self.orders.lock().get_mut(id) {
            Some(order) => {
                order.price = price;
                true
            }
            None => false,
        }
    }

    /// Drop all record of an order, as if the venue purged it.
    pub fn purge(&self, id: &OrderId) -> bool {
        self.orders.lock().remove(id).is_some()
    }

    /// Simulate an outage of the open-orders endpoint.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every detail lookup fail.
    pub fn set_lookups_fail(&self, fail: bool) {
        self.lookups_fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchangeGateway {
    async fn fetch_open_orders(&self) -> Result<Vec<OrderSummary>, GatewayError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable("paper exchange offline"));
        }
        Ok(self
            .orders
            .lock()
            .iter()
            .filter(|(_, o)| o.is_open())
            .map(|(id, o)| o.summary(id))
            .collect())
    }

    async fn get_order_detail(&self, order_id: &OrderId) -> OrderLookup {
        if self.lookups_fail.load(Ordering::SeqCst) {
            return OrderLookup::Error("paper lookup failure".to_string());
        }
        match self.orders.lock().get(order_id) {
            Some(order) => OrderLookup::Found(order.detail()),
            None => OrderLookup::NotFound,
        }
    }

    async fn cancel_order(&self, order_id: &OrderId) -> bool {
        match self.orders.lock().get_mut(order_id) {
            Some(order) if order.is_open() => {
                order.status = ExchangeOrderStatus::Cancelled;
                true
            }
            _ => false,
        }
    }
}
