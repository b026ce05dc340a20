//! Sync issue types.
//!
//! Every finding of a sync pass is a [`SyncIssue`]: what was found, how bad
//! it is, and what the pass did about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::domain::{InstrumentId, MarketMakerId, OrderId};

/// Kind of finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Open on the exchange, not tracked locally.
    OrderInClobNotDb,
    /// Tracked locally, not open on the exchange.
    OrderInDbNotClob,
    /// Tracked price differs from the exchange.
    OrderMismatch,
    /// Order detail lookup failed.
    OrderStatusUnknown,
    /// Matched size folded into local state.
    FillReplayed,
    /// Local position differs from the ledger.
    PositionDrift,
    /// Ledger position with no configured market.
    PositionMissing,
    /// Staged fill confirmed by the ledger.
    PendingFillConfirmed,
    /// Staged fill outlived its TTL.
    PendingFillExpired,
    /// Stored realized P&L differs from the fill sum.
    PnlMismatch,
    /// Exchange gateway failed.
    ClobUnavailable,
    /// Ledger gateway failed.
    DataApiUnavailable,
    /// Local store read or write failed.
    StoreError,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OrderInClobNotDb => "ORDER_IN_CLOB_NOT_DB",
            Self::OrderInDbNotClob => "ORDER_IN_DB_NOT_CLOB",
            Self::OrderMismatch => "ORDER_MISMATCH",
            Self::OrderStatusUnknown => "ORDER_STATUS_UNKNOWN",
            Self::FillReplayed => "FILL_REPLAYED",
            Self::PositionDrift => "POSITION_DRIFT",
            Self::PositionMissing => "POSITION_MISSING",
            Self::PendingFillConfirmed => "PENDING_FILL_CONFIRMED",
            Self::PendingFillExpired => "PENDING_FILL_EXPIRED",
            Self::PnlMismatch => "PNL_MISMATCH",
            Self::ClobUnavailable => "CLOB_UNAVAILABLE",
            Self::DataApiUnavailable => "DATA_API_UNAVAILABLE",
            Self::StoreError => "STORE_ERROR",
        };
        f.write_str(s)
    }
}

/// Severity of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Informational only.
    Info,
    /// Expected inconsistency.
    Warn,
    /// Material inconsistency.
    Error,
    /// Dependency outage or dangerous ambiguity.
    Critical,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What the pass did about an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueAction {
    /// Local state was repaired.
    Corrected,
    /// Recorded only.
    Logged,
    /// An operator must intervene.
    RequiresManual,
}

impl IssueAction {
    /// `Corrected` if the fix was applied, otherwise `Logged`.
    #[must_use]
    pub const fn corrected_if(applied: bool) -> Self {
        if applied { Self::Corrected } else { Self::Logged }
    }
}

impl fmt::Display for IssueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrected => write!(f, "CORRECTED"),
            Self::Logged => write!(f, "LOGGED"),
            Self::RequiresManual => write!(f, "REQUIRES_MANUAL"),
        }
    }
}

/// One finding of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIssue {
    /// Kind of finding.
    pub issue_type: IssueType,
    /// Severity.
    pub severity: IssueSeverity,
    /// Action taken.
    pub action: IssueAction,
    /// Affected market maker.
    pub market_maker_id: Option<MarketMakerId>,
    /// Affected token.
    pub instrument_id: Option<InstrumentId>,
    /// Affected order.
    pub order_id: Option<OrderId>,
    /// Description.
    pub message: String,
    /// Detection timestamp.
    pub detected_at: DateTime<Utc>,
}

impl SyncIssue {
    /// Create an issue not yet tied to an entity.
    #[must_use]
    pub fn new(
        issue_type: IssueType,
        severity: IssueSeverity,
        action: IssueAction,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            action,
            market_maker_id: None,
            instrument_id: None,
            order_id: None,
            message: message.into(),
            detected_at: Utc::now(),
        }
    }

    /// Attach a market maker.
    #[must_use]
    pub fn market_maker(mut self, id: &MarketMakerId) -> Self {
        self.market_maker_id = Some(id.clone());
        self
    }

    /// Attach a token.
    #[must_use]
    pub fn instrument(mut self, id: &InstrumentId) -> Self {
        self.instrument_id = Some(id.clone());
        self
    }

    /// Attach an order.
    #[must_use]
    pub fn order(mut self, id: &OrderId) -> Self {
        self.order_id = Some(id.clone());
        self
    }

    /// Emit the issue at the log level matching its severity.
    pub fn log(&self) {
        let mm = self.market_maker_id.as_ref().map(MarketMakerId::as_str);
        let instrument = self.instrument_id.as_ref().map(InstrumentId::as_str);
        let order = self.order_id.as_ref().map(OrderId::as_str);
        match self.severity {
            IssueSeverity::Info => info!(
                issue = %self.issue_type, action = %self.action,
                market_maker = ?mm, instrument = ?instrument, order = ?order,
                "{}", self.message
            ),
            IssueSeverity::Warn => warn!(
                issue = %self.issue_type, action = %self.action,
                market_maker = ?mm, instrument = ?instrument, order = ?order,
                "{}", self.message
            ),
            IssueSeverity::Error => error!(
                issue = %self.issue_type, action = %self.action,
                market_maker = ?mm, instrument = ?instrument, order = ?order,
                "{}", self.message
            ),
            IssueSeverity::Critical => error!(
                issue = %self.issue_type, action = %self.action,
                market_maker = ?mm, instrument = ?instrument, order = ?order,
                severity = "CRITICAL",
                "{}", self.message
            ),
        }
    }
}
