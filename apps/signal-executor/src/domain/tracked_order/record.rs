//! Tracked order record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::shared::{BrokerOrderId, BrokerPositionId, ChannelId, SignalOrderId};
use crate::domain::signal::TradeSignal;

/// Role of a broker order within a signal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderRole {
    /// Entry order (and the position it opens).
    Main,
    /// Standing stop-loss leg.
    Stoploss,
    /// Standing take-profit leg.
    Takeprofit,
}

impl OrderRole {
    /// Exit legs, in the order they are placed and cancelled.
    pub const LEGS: [Self; 2] = [Self::Stoploss, Self::Takeprofit];

    /// Stable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::Stoploss => "STOPLOSS",
            Self::Takeprofit => "TAKEPROFIT",
        }
    }
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MAIN" => Ok(Self::Main),
            "STOPLOSS" => Ok(Self::Stoploss),
            "TAKEPROFIT" => Ok(Self::Takeprofit),
            other => Err(format!("unknown order role '{other}'")),
        }
    }
}

/// Record lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackedStatus {
    /// Resting at the venue; no position known.
    Pending,
    /// Position id known.
    Filled,
    /// Closed or cancelled; kept for reference only.
    Retired,
}

/// Unique key of a tracked order within one venue namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey {
    /// Channel the chain belongs to.
    pub channel_id: ChannelId,
    /// Signal chain id.
    pub signal_order_id: SignalOrderId,
    /// Order role.
    pub role: OrderRole,
}

impl OrderKey {
    /// Create a key.
    #[must_use]
    pub const fn new(channel_id: ChannelId, signal_order_id: SignalOrderId, role: OrderRole) -> Self {
        Self {
            channel_id,
            signal_order_id,
            role,
        }
    }

    /// Key of the given role for the chain a signal belongs to.
    #[must_use]
    pub fn for_signal(signal: &TradeSignal, role: OrderRole) -> Self {
        Self::new(signal.channel_id.clone(), signal.order_id.clone(), role)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.channel_id, self.signal_order_id, self.role)
    }
}

/// Partial update applied by [`OrderStore::update`](super::OrderStore::update).
///
/// `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    /// New broker order id.
    pub broker_order_id: Option<BrokerOrderId>,
    /// Newly learned position id; moves a pending record to FILLED.
    pub broker_position_id: Option<BrokerPositionId>,
    /// Explicit status change.
    pub status: Option<TrackedStatus>,
    /// Signal that last touched the record.
    pub last_signal: Option<TradeSignal>,
}

impl OrderPatch {
    /// Patch retiring the record.
    #[must_use]
    pub fn retire() -> Self {
        Self {
            status: Some(TrackedStatus::Retired),
            ..Self::default()
        }
    }
}

/// Persisted mapping from a signal chain to broker-side ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedOrder {
    /// Signal chain id.
    pub signal_order_id: SignalOrderId,
    /// Channel id.
    pub channel_id: ChannelId,
    /// Order role.
    pub order_role: OrderRole,
    /// Broker order id.
    pub broker_order_id: BrokerOrderId,
    /// Broker position id once filled.
    #[serde(default)]
    pub broker_position_id: Option<BrokerPositionId>,
    /// Lifecycle status.
    pub status: TrackedStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// OPEN signal the record was created from.
    pub origin_signal: TradeSignal,
    /// Latest MODIFICATION or CLOSE applied to the record.
    #[serde(default)]
    pub last_signal: Option<TradeSignal>,
}

impl TrackedOrder {
    /// Build a fresh record. A known position id makes it FILLED.
    #[must_use]
    pub fn new(
        signal: &TradeSignal,
        role: OrderRole,
        broker_order_id: BrokerOrderId,
        broker_position_id: Option<BrokerPositionId>,
    ) -> Self {
        let now = Utc::now();
        let status = if broker_position_id.is_some() {
            TrackedStatus::Filled
        } else {
            TrackedStatus::Pending
        };

        Self {
            signal_order_id: signal.order_id.clone(),
            channel_id: signal.channel_id.clone(),
            order_role: role,
            broker_order_id,
            broker_position_id,
            status,
            created_at: now,
            updated_at: now,
            origin_signal: signal.clone(),
            last_signal: None,
        }
    }

    /// Store key.
    #[must_use]
    pub fn key(&self) -> OrderKey {
        OrderKey::new(
            self.channel_id.clone(),
            self.signal_order_id.clone(),
            self.order_role,
        )
    }

    /// Whether later signals may act on this record.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status != TrackedStatus::Retired
    }

    /// Apply a patch in place.
    pub fn apply(&mut self, patch: OrderPatch) {
        if let Some(order_id) = patch.broker_order_id {
            self.broker_order_id = order_id;
        }
        if let Some(position_id) = patch.broker_position_id {
            self.broker_position_id = Some(position_id);
            if self.status == TrackedStatus::Pending {
                self.status = TrackedStatus::Filled;
            }
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(signal) = patch.last_signal {
            self.last_signal = Some(signal);
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{ContractType, SignalAction, SignalType};

    fn signal() -> TradeSignal {
        TradeSignal {
            order_id: "7".into(),
            channel_id: "alpha".into(),
            ticker: "EUR.USD".to_string(),
            action: SignalAction::Buy,
            contract_type: ContractType::Market,
            price: None,
            stop_loss: None,
            take_profit: None,
            kind: SignalType::Open,
        }
    }

    #[test]
    fn new_record_status_follows_position() {
        let pending = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);
        let filled = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), Some("9".into()));

        assert_eq!(pending.status, TrackedStatus::Pending);
        assert_eq!(filled.status, TrackedStatus::Filled);
        assert!(pending.is_live());
    }

    #[test]
    fn patch_with_position_fills() {
        let mut record = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);

        record.apply(OrderPatch {
            broker_position_id: Some("55".into()),
            ..OrderPatch::default()
        });

        assert_eq!(record.status, TrackedStatus::Filled);
        assert_eq!(record.broker_position_id, Some("55".into()));
        assert_eq!(record.broker_order_id, "1".into());
    }

    #[test]
    fn retire_patch_wins_over_fill() {
        let mut record = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);

        record.apply(OrderPatch {
            broker_position_id: Some("55".into()),
            ..OrderPatch::retire()
        });

        assert_eq!(record.status, TrackedStatus::Retired);
        assert!(!record.is_live());
    }

    #[test]
    fn key_display_and_role_parsing() {
        let key = OrderKey::for_signal(&signal(), OrderRole::Takeprofit);

        assert_eq!(key.to_string(), "alpha:7:TAKEPROFIT");
        assert_eq!("stoploss".parse::<OrderRole>().unwrap(), OrderRole::Stoploss);
        assert!("leg".parse::<OrderRole>().is_err());
    }

    #[test]
    fn keys_sort_by_channel_then_order_then_role() {
        let mut keys = vec![
            OrderKey::new("beta".into(), "1".into(), OrderRole::Main),
            OrderKey::new("alpha".into(), "7".into(), OrderRole::Takeprofit),
            OrderKey::new("alpha".into(), "7".into(), OrderRole::Main),
            OrderKey::new("alpha".into(), "7".into(), OrderRole::Stoploss),
        ];
        keys.sort();

        let roles: Vec<_> = keys.iter().map(|k| k.role).collect();
        assert_eq!(
            roles,
            [
                OrderRole::Main,
                OrderRole::Stoploss,
                OrderRole::Takeprofit,
                OrderRole::Main
            ]
        );
        assert_eq!(keys[3].channel_id, "beta".into());
    }

    #[test]
    fn later_signals_do_not_replace_origin() {
        let mut record = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);
        let modification = TradeSignal {
            stop_loss: Some(rust_decimal_macros::dec!(1.05)),
            kind: SignalType::Modification,
            ..signal()
        };

        record.apply(OrderPatch {
            last_signal: Some(modification.clone()),
            ..OrderPatch::default()
        });

        assert_eq!(record.origin_signal, signal());
        assert_eq!(record.last_signal, Some(modification));
    }

    #[test]
    fn record_json_is_camel_case() {
        let record = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["orderRole"], "MAIN");
        assert_eq!(json["brokerOrderId"], "1");
        assert_eq!(json["originSignal"]["ticker"], "EUR.USD");
        assert!(json["lastSignal"].is_null());
    }

    #[test]
    fn record_without_last_signal_still_decodes() {
        let record = TrackedOrder::new(&signal(), OrderRole::Main, "1".into(), None);
        let mut json = serde_json::to_value(&record).unwrap();
        json.as_object_mut().unwrap().remove("lastSignal");

        let decoded: TrackedOrder = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }
}
