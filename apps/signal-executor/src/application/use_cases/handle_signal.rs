//! Handle Signal Use Case
//!
//! Drives one trade signal to completion: resolves the contract, builds order
//! templates, talks to the venue and keeps the tracked-order records in step
//! with what the venue acknowledged.
//!
//! Local state can lag the venue (a pending entry fills, a position is closed
//! by its stop). MODIFICATION and CLOSE therefore pick a primary venue
//! operation from the stored record and, when the venue rejects it, try the
//! operation that fits the other state once.
//!
//! On leg venues a CLOSE cancels the exit legs first. If any cancel fails the
//! CLOSE stops there and MAIN stays live, so a repeated CLOSE can finish.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::application::ports::{
    AuditEvent, AuditSink, AuditTag, ExitModel, PlaceOrderRequest, Protection, VenueAck,
    VenueError, VenueOperation, VenuePort,
};
use crate::domain::instrument::{ContractDescriptor, ContractError, ContractResolver};
use crate::domain::order_template::{OrderIntent, OrderSpec, OrderTemplates, TemplateError};
use crate::domain::shared::{BrokerOrderId, BrokerPositionId, ChannelId, SignalOrderId};
use crate::domain::signal::{SignalType, TradeSignal};
use crate::domain::tracked_order::{
    OrderKey, OrderPatch, OrderRole, OrderStore, StoreError, TrackedOrder,
};
use crate::observability::{record_fallback, record_signal};

/// Why a signal found nothing to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookupCondition {
    /// MODIFICATION without a live MAIN record.
    ModifyWithoutOpen,
    /// CLOSE without a live MAIN record.
    CloseWithoutOpen,
    /// Leg MODIFICATION without a prior leg record.
    ModifyWithoutPrevious(OrderRole),
}

impl fmt::Display for LookupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModifyWithoutOpen => write!(f, "modify without open"),
            Self::CloseWithoutOpen => write!(f, "close without open"),
            Self::ModifyWithoutPrevious(role) => write!(f, "modify {role} without previous"),
        }
    }
}

/// Signal handling errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// No record to act on. Non-fatal; the signal is dropped.
    #[error("Lookup miss: {condition}")]
    LookupMiss {
        /// What was missing.
        condition: LookupCondition,
    },

    /// The OPEN main order was not created.
    #[error("Order placement failed: {source}")]
    PlacementFailed {
        /// Venue error.
        source: VenueError,
    },

    /// Primary venue operation and its fallback both failed.
    #[error(
        "{primary} failed ({primary_error}); {}",
        describe_fallback(.fallback.as_ref(), .fallback_error.as_ref())
    )]
    FallbackOperationFailed {
        /// Primary operation.
        primary: VenueOperation,
        /// Primary failure.
        primary_error: VenueError,
        /// Fallback operation, when one was available.
        fallback: Option<VenueOperation>,
        /// Fallback failure.
        fallback_error: Option<VenueError>,
    },

    /// Cancelling or re-placing an exit leg failed.
    #[error("{role} leg replacement failed at {operation}: {source}")]
    LegReplacementFailed {
        /// Leg role.
        role: OrderRole,
        /// Operation that failed.
        operation: VenueOperation,
        /// Venue error.
        source: VenueError,
    },

    /// Ticker resolution failed.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Template construction failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn describe_fallback(fallback: Option<&VenueOperation>, error: Option<&VenueError>) -> String {
    match (fallback, error) {
        (Some(operation), Some(error)) => format!("fallback {operation} failed ({error})"),
        (Some(operation), None) => format!("fallback {operation} failed"),
        (None, _) => "no fallback target".to_string(),
    }
}

impl SignalError {
    /// Short label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LookupMiss { .. } => "lookup_miss",
            Self::PlacementFailed { .. } => "placement_failed",
            Self::FallbackOperationFailed { .. } => "fallback_failed",
            Self::LegReplacementFailed { .. } => "leg_replacement_failed",
            Self::Contract(_) => "contract",
            Self::Template(_) => "template",
            Self::Store(_) => "store",
        }
    }
}

/// How the venue side of a signal was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "path", content = "operation", rename_all = "snake_case")]
pub enum ExecutionPath {
    /// New order placed (OPEN).
    Placed,
    /// Primary operation accepted.
    Primary(VenueOperation),
    /// Primary rejected, fallback accepted.
    Fallback(VenueOperation),
    /// Only exit legs were touched.
    Legs,
}

/// Result for one exit leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LegResult {
    /// Leg placed.
    Placed {
        /// New broker order id.
        order_id: BrokerOrderId,
    },
    /// Old leg cancelled and a new one placed.
    Replaced {
        /// Cancelled broker order id.
        previous: BrokerOrderId,
        /// New broker order id.
        order_id: BrokerOrderId,
    },
    /// Leg cancelled.
    Cancelled {
        /// Cancelled broker order id.
        order_id: BrokerOrderId,
    },
    /// No prior leg record.
    Missing,
    /// Venue rejected the leg operation.
    Failed {
        /// Operation rejected.
        operation: VenueOperation,
        /// Venue error.
        error: VenueError,
    },
}

/// Outcome for one exit leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegOutcome {
    /// Leg role.
    pub role: OrderRole,
    /// What happened.
    #[serde(flatten)]
    pub result: LegResult,
}

/// Successful handling of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOutcome {
    /// Signal chain id.
    pub signal_id: SignalOrderId,
    /// Channel.
    pub channel_id: ChannelId,
    /// Signal type.
    pub kind: SignalType,
    /// Venue path taken.
    pub path: ExecutionPath,
    /// MAIN record after handling.
    pub record: Option<TrackedOrder>,
    /// Exit leg results.
    pub legs: Vec<LegOutcome>,
}

#[derive(Debug, Clone)]
enum VenueCall {
    Place(Box<PlaceOrderRequest>),
    ModifyPosition(BrokerPositionId, Protection),
    ModifyPendingOrder(BrokerOrderId, Option<Decimal>, Protection),
    ClosePosition(BrokerPositionId),
    CancelOrder(BrokerOrderId),
}

impl VenueCall {
    const fn operation(&self) -> VenueOperation {
        match self {
            Self::Place(_) => VenueOperation::PlaceOrder,
            Self::ModifyPosition(..) => VenueOperation::ModifyPosition,
            Self::ModifyPendingOrder(..) => VenueOperation::ModifyPendingOrder,
            Self::ClosePosition(_) => VenueOperation::ClosePosition,
            Self::CancelOrder(_) => VenueOperation::CancelOrder,
        }
    }
}

const fn leg_intent(role: OrderRole) -> OrderIntent {
    match role {
        OrderRole::Stoploss => OrderIntent::StopLoss,
        OrderRole::Takeprofit => OrderIntent::TakeProfit,
        OrderRole::Main => OrderIntent::Open,
    }
}

const fn leg_level(signal: &TradeSignal, role: OrderRole) -> Option<Decimal> {
    match role {
        OrderRole::Stoploss => signal.stop_loss,
        OrderRole::Takeprofit => signal.take_profit,
        OrderRole::Main => signal.price,
    }
}

fn first_leg_failure(legs: &[LegOutcome]) -> Option<SignalError> {
    legs.iter().find_map(|leg| match &leg.result {
        LegResult::Failed { operation, error } => Some(SignalError::LegReplacementFailed {
            role: leg.role,
            operation: *operation,
            source: error.clone(),
        }),
        _ => None,
    })
}

fn acked_order_id(ack: &VenueAck) -> Option<BrokerOrderId> {
    ack.order_id.clone().or_else(|| {
        ack.position_id
            .as_ref()
            .map(|position| BrokerOrderId::new(position.as_str()))
    })
}

fn missing_order_id() -> VenueError {
    VenueError::Decode {
        message: "acknowledgement carries no order id".to_string(),
    }
}

/// Use case handling one trade signal at a time.
pub struct SignalHandler<V, S>
where
    V: VenuePort,
    S: OrderStore,
{
    venue: Arc<V>,
    store: Arc<S>,
    resolver: Arc<dyn ContractResolver>,
    templates: OrderTemplates,
    audit: Arc<dyn AuditSink>,
}

impl<V, S> SignalHandler<V, S>
where
    V: VenuePort,
    S: OrderStore,
{
    /// Create a new SignalHandler.
    pub fn new(
        venue: Arc<V>,
        store: Arc<S>,
        resolver: Arc<dyn ContractResolver>,
        templates: OrderTemplates,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            venue,
            store,
            resolver,
            templates,
            audit,
        }
    }

    /// Order store used by the handler.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle a signal.
    pub async fn handle(&self, signal: &TradeSignal) -> Result<SignalOutcome, SignalError> {
        let started = Instant::now();

        tracing::info!(
            signal_id = %signal.order_id,
            channel_id = %signal.channel_id,
            kind = %signal.kind,
            ticker = %signal.ticker,
            action = %signal.action,
            venue = self.venue.name(),
            "Handling signal"
        );

        let result = match signal.kind {
            SignalType::Open => self.open(signal).await,
            SignalType::Modification => self.modify(signal).await,
            SignalType::Close => self.close(signal).await,
        };

        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let label = result.as_ref().map_or_else(SignalError::label, |_| "ok");

        if let Err(
            error @ (SignalError::Contract(_) | SignalError::Template(_) | SignalError::Store(_)),
        ) = &result
        {
            self.audit(
                signal,
                AuditTag::SignalFailed,
                json!({ "error": error.to_string() }),
            );
        }

        record_signal(signal.kind.as_str(), label, elapsed.as_secs_f64());
        self.audit(
            signal,
            AuditTag::HandleExecution,
            json!({
                "type": signal.kind,
                "outcome": label,
                "elapsedMs": elapsed_ms,
            }),
        );

        match &result {
            Ok(outcome) => tracing::info!(
                signal_id = %signal.order_id,
                kind = %signal.kind,
                path = ?outcome.path,
                elapsed_ms,
                "Signal handled"
            ),
            Err(error) => tracing::warn!(
                signal_id = %signal.order_id,
                kind = %signal.kind,
                error = %error,
                elapsed_ms,
                "Signal not executed"
            ),
        }

        result
    }

    // ------------------------------------------------------------------
    // OPEN
    // ------------------------------------------------------------------

    async fn open(&self, signal: &TradeSignal) -> Result<SignalOutcome, SignalError> {
        let contract = self.resolver.resolve(&signal.ticker)?;
        let spec = self.templates.build(signal, OrderIntent::Open)?;
        let model = self.venue.exit_model();

        let protection = match model {
            ExitModel::Attached => Protection::new(signal.stop_loss, signal.take_profit),
            ExitModel::SeparateLegs => Protection::default(),
        };
        let request = Self::request(signal, contract.clone(), spec, protection, OrderRole::Main);

        let ack = match self.venue.place_order(request).await {
            Ok(ack) => ack,
            Err(source) => {
                self.audit(
                    signal,
                    AuditTag::PlacementFailed,
                    json!({ "error": source.to_string(), "kind": source.kind() }),
                );
                return Err(SignalError::PlacementFailed { source });
            }
        };

        let Some(order_id) = acked_order_id(&ack) else {
            let source = missing_order_id();
            self.audit(
                signal,
                AuditTag::PlacementFailed,
                json!({ "error": source.to_string() }),
            );
            return Err(SignalError::PlacementFailed { source });
        };

        let record = TrackedOrder::new(signal, OrderRole::Main, order_id, ack.position_id.clone());
        self.store.put(record.clone()).await?;

        let mut legs = Vec::new();
        if model == ExitModel::SeparateLegs {
            for role in OrderRole::LEGS {
                if leg_level(signal, role).is_some() {
                    legs.push(self.place_leg(signal, &contract, role).await?);
                }
            }
        }

        self.audit(
            signal,
            AuditTag::Open,
            json!({
                "brokerOrderId": record.broker_order_id,
                "brokerPositionId": record.broker_position_id,
                "code": ack.code,
                "legs": legs,
            }),
        );

        Ok(Self::outcome(signal, ExecutionPath::Placed, Some(record), legs))
    }

    async fn place_leg(
        &self,
        signal: &TradeSignal,
        contract: &ContractDescriptor,
        role: OrderRole,
    ) -> Result<LegOutcome, SignalError> {
        let spec = self.templates.build(signal, leg_intent(role))?;
        let request = Self::request(signal, contract.clone(), spec, Protection::default(), role);

        let placed = self
            .venue
            .place_order(request)
            .await
            .and_then(|ack| acked_order_id(&ack).ok_or_else(missing_order_id));

        match placed {
            Ok(order_id) => {
                self.store
                    .put(TrackedOrder::new(signal, role, order_id.clone(), None))
                    .await?;
                self.audit(
                    signal,
                    AuditTag::LegPlaced,
                    json!({ "role": role, "brokerOrderId": order_id }),
                );
                Ok(LegOutcome {
                    role,
                    result: LegResult::Placed { order_id },
                })
            }
            Err(error) => {
                self.audit(
                    signal,
                    AuditTag::LegFailed,
                    json!({ "role": role, "error": error.to_string() }),
                );
                Ok(LegOutcome {
                    role,
                    result: LegResult::Failed {
                        operation: VenueOperation::PlaceOrder,
                        error,
                    },
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // MODIFICATION
    // ------------------------------------------------------------------

    async fn modify(&self, signal: &TradeSignal) -> Result<SignalOutcome, SignalError> {
        let main = self
            .live_main(signal, LookupCondition::ModifyWithoutOpen)
            .await?;

        match self.venue.exit_model() {
            ExitModel::Attached => self.modify_attached(signal, &main).await,
            ExitModel::SeparateLegs => self.modify_legs(signal, &main).await,
        }
    }

    async fn modify_attached(
        &self,
        signal: &TradeSignal,
        main: &TrackedOrder,
    ) -> Result<SignalOutcome, SignalError> {
        let protection = Protection::new(signal.stop_loss, signal.take_profit);
        let pending = VenueCall::ModifyPendingOrder(
            main.broker_order_id.clone(),
            signal.price,
            protection,
        );

        let (primary, fallback) = match &main.broker_position_id {
            Some(position) => (
                VenueCall::ModifyPosition(position.clone(), protection),
                Some(pending),
            ),
            None => (
                pending,
                self.venue
                    .position_for_order(&main.broker_order_id)
                    .map(|position| VenueCall::ModifyPosition(position, protection)),
            ),
        };

        let (ack, path) = self.run_with_fallback(signal, primary, fallback).await?;

        let patch = OrderPatch {
            broker_order_id: match path {
                ExecutionPath::Primary(VenueOperation::ModifyPendingOrder)
                | ExecutionPath::Fallback(VenueOperation::ModifyPendingOrder) => {
                    ack.order_id.clone()
                }
                _ => None,
            },
            broker_position_id: ack.position_id.clone(),
            status: None,
            last_signal: Some(signal.clone()),
        };
        let record = self.store.update(&main.key(), patch).await?;

        self.audit(
            signal,
            AuditTag::Modification,
            json!({ "path": path, "code": ack.code, "message": ack.message }),
        );

        Ok(Self::outcome(signal, path, record, Vec::new()))
    }

    async fn modify_legs(
        &self,
        signal: &TradeSignal,
        main: &TrackedOrder,
    ) -> Result<SignalOutcome, SignalError> {
        let contract = self.resolver.resolve(&signal.ticker)?;

        let mut legs = Vec::new();
        for role in OrderRole::LEGS {
            if leg_level(signal, role).is_some() {
                legs.push(self.replace_leg(signal, &contract, role).await?);
            }
        }

        if let Some(err) = first_leg_failure(&legs) {
            return Err(err);
        }

        if !legs.is_empty() && legs.iter().all(|leg| leg.result == LegResult::Missing) {
            let condition = LookupCondition::ModifyWithoutPrevious(legs[0].role);
            return Err(SignalError::LookupMiss { condition });
        }

        let record = self
            .store
            .update(
                &main.key(),
                OrderPatch {
                    last_signal: Some(signal.clone()),
                    ..OrderPatch::default()
                },
            )
            .await?;

        self.audit(signal, AuditTag::Modification, json!({ "legs": legs }));

        Ok(Self::outcome(signal, ExecutionPath::Legs, record, legs))
    }

    /// Take the prior leg record, cancel its order, then place the new leg.
    ///
    /// Once the cancel is accepted the old record is gone for good: a rejected
    /// re-placement leaves the trade without that leg and is reported, not
    /// rolled back. A rejected cancel puts the old record back since its order
    /// still stands.
    async fn replace_leg(
        &self,
        signal: &TradeSignal,
        contract: &ContractDescriptor,
        role: OrderRole,
    ) -> Result<LegOutcome, SignalError> {
        let key = OrderKey::for_signal(signal, role);

        let Some(previous) = self.store.take(&key).await? else {
            let condition = LookupCondition::ModifyWithoutPrevious(role);
            tracing::warn!(
                signal_id = %signal.order_id,
                role = %role,
                "Try modify without previous"
            );
            self.audit(
                signal,
                AuditTag::LookupMiss,
                json!({ "condition": condition.to_string(), "role": role }),
            );
            return Ok(LegOutcome {
                role,
                result: LegResult::Missing,
            });
        };

        match self.venue.cancel_order(&previous.broker_order_id).await {
            Ok(_) => {}
            Err(VenueError::NotFound { .. }) => {
                tracing::debug!(
                    order_id = %previous.broker_order_id,
                    "Leg already gone at venue"
                );
            }
            Err(error) => {
                self.store.put(previous).await?;
                return Ok(self.leg_replacement_failed(
                    signal,
                    role,
                    VenueOperation::CancelOrder,
                    &error,
                ));
            }
        }
        self.audit(
            signal,
            AuditTag::LegCancelled,
            json!({ "role": role, "brokerOrderId": previous.broker_order_id }),
        );

        let spec = self.templates.build(signal, leg_intent(role))?;
        let request = Self::request(signal, contract.clone(), spec, Protection::default(), role);

        let placed = self
            .venue
            .place_order(request)
            .await
            .and_then(|ack| acked_order_id(&ack).ok_or_else(missing_order_id));

        match placed {
            Ok(order_id) => {
                self.store
                    .put(TrackedOrder::new(signal, role, order_id.clone(), None))
                    .await?;
                self.audit(
                    signal,
                    AuditTag::LegPlaced,
                    json!({
                        "role": role,
                        "brokerOrderId": order_id,
                        "replaced": previous.broker_order_id,
                    }),
                );
                Ok(LegOutcome {
                    role,
                    result: LegResult::Replaced {
                        previous: previous.broker_order_id,
                        order_id,
                    },
                })
            }
            Err(error) => Ok(self.leg_replacement_failed(
                signal,
                role,
                VenueOperation::PlaceOrder,
                &error,
            )),
        }
    }

    fn leg_replacement_failed(
        &self,
        signal: &TradeSignal,
        role: OrderRole,
        operation: VenueOperation,
        error: &VenueError,
    ) -> LegOutcome {
        tracing::error!(
            signal_id = %signal.order_id,
            role = %role,
            operation = %operation,
            error = %error,
            "Leg replacement failed"
        );
        self.audit(
            signal,
            AuditTag::LegReplacementFailed,
            json!({
                "role": role,
                "operation": operation,
                "error": error.to_string(),
                "unprotected": operation == VenueOperation::PlaceOrder,
            }),
        );
        LegOutcome {
            role,
            result: LegResult::Failed {
                operation,
                error: error.clone(),
            },
        }
    }

    // ------------------------------------------------------------------
    // CLOSE
    // ------------------------------------------------------------------

    async fn close(&self, signal: &TradeSignal) -> Result<SignalOutcome, SignalError> {
        let main = self
            .live_main(signal, LookupCondition::CloseWithoutOpen)
            .await?;

        let (primary, fallback, legs) = match self.venue.exit_model() {
            ExitModel::Attached => {
                let (primary, fallback) = self.plan_attached_close(&main);
                (primary, fallback, Vec::new())
            }
            ExitModel::SeparateLegs => {
                let contract = self.resolver.resolve(&signal.ticker)?;
                let spec = self.templates.build(signal, OrderIntent::Close)?;
                let flatten = Self::request(
                    signal,
                    contract,
                    spec,
                    Protection::default(),
                    OrderRole::Main,
                );
                // A leg left working would outlive the position it protects,
                // so MAIN stays live until every leg is gone.
                let legs = self.cancel_legs(signal).await?;
                if let Some(err) = first_leg_failure(&legs) {
                    return Err(err);
                }
                (
                    VenueCall::CancelOrder(main.broker_order_id.clone()),
                    Some(VenueCall::Place(Box::new(flatten))),
                    legs,
                )
            }
        };

        let (ack, path) = self.run_with_fallback(signal, primary, fallback).await?;

        let record = self
            .store
            .update(
                &main.key(),
                OrderPatch {
                    last_signal: Some(signal.clone()),
                    ..OrderPatch::retire()
                },
            )
            .await?;

        self.audit(
            signal,
            AuditTag::Close,
            json!({ "path": path, "code": ack.code, "message": ack.message, "legs": legs }),
        );

        Ok(Self::outcome(signal, path, record, legs))
    }

    fn plan_attached_close(&self, main: &TrackedOrder) -> (VenueCall, Option<VenueCall>) {
        let cancel = VenueCall::CancelOrder(main.broker_order_id.clone());

        match &main.broker_position_id {
            Some(position) => (VenueCall::ClosePosition(position.clone()), Some(cancel)),
            None => (
                cancel,
                self.venue
                    .position_for_order(&main.broker_order_id)
                    .map(VenueCall::ClosePosition),
            ),
        }
    }

    async fn cancel_legs(&self, signal: &TradeSignal) -> Result<Vec<LegOutcome>, SignalError> {
        let mut legs = Vec::new();

        for role in OrderRole::LEGS {
            let key = OrderKey::for_signal(signal, role);
            let Some(leg) = self.store.take(&key).await? else {
                continue;
            };

            let result = match self.venue.cancel_order(&leg.broker_order_id).await {
                Ok(_) | Err(VenueError::NotFound { .. }) => {
                    self.audit(
                        signal,
                        AuditTag::LegCancelled,
                        json!({ "role": role, "brokerOrderId": leg.broker_order_id }),
                    );
                    LegResult::Cancelled {
                        order_id: leg.broker_order_id,
                    }
                }
                Err(error) => {
                    self.audit(
                        signal,
                        AuditTag::LegFailed,
                        json!({
                            "role": role,
                            "operation": VenueOperation::CancelOrder,
                            "error": error.to_string(),
                        }),
                    );
                    self.store.put(leg).await?;
                    LegResult::Failed {
                        operation: VenueOperation::CancelOrder,
                        error,
                    }
                }
            };
            legs.push(LegOutcome { role, result });
        }

        Ok(legs)
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    async fn live_main(
        &self,
        signal: &TradeSignal,
        condition: LookupCondition,
    ) -> Result<TrackedOrder, SignalError> {
        let key = OrderKey::for_signal(signal, OrderRole::Main);

        match self.store.get(&key).await? {
            Some(record) if record.is_live() => Ok(record),
            stale => {
                tracing::warn!(
                    signal_id = %signal.order_id,
                    channel_id = %signal.channel_id,
                    retired = stale.is_some(),
                    "Try {condition}"
                );
                self.audit(
                    signal,
                    AuditTag::LookupMiss,
                    json!({ "condition": condition.to_string(), "retired": stale.is_some() }),
                );
                Err(SignalError::LookupMiss { condition })
            }
        }
    }

    /// Run the primary call; on any rejection run the fallback exactly once.
    async fn run_with_fallback(
        &self,
        signal: &TradeSignal,
        primary: VenueCall,
        fallback: Option<VenueCall>,
    ) -> Result<(VenueAck, ExecutionPath), SignalError> {
        let primary_op = primary.operation();

        let primary_error = match self.dispatch(primary).await {
            Ok(ack) => return Ok((ack, ExecutionPath::Primary(primary_op))),
            Err(error) => error,
        };

        tracing::warn!(
            signal_id = %signal.order_id,
            operation = %primary_op,
            error = %primary_error,
            divergence = primary_error.is_state_divergence(),
            "Primary venue operation failed"
        );
        self.audit(
            signal,
            AuditTag::PrimaryOperationFailed,
            json!({
                "operation": primary_op,
                "error": primary_error.to_string(),
                "kind": primary_error.kind(),
            }),
        );

        let Some(fallback) = fallback else {
            self.audit(
                signal,
                AuditTag::FallbackFailed,
                json!({ "primary": primary_op, "reason": "no fallback target" }),
            );
            return Err(SignalError::FallbackOperationFailed {
                primary: primary_op,
                primary_error,
                fallback: None,
                fallback_error: None,
            });
        };

        let fallback_op = fallback.operation();
        match self.dispatch(fallback).await {
            Ok(ack) => {
                record_fallback(fallback_op.as_str(), true);
                self.audit(
                    signal,
                    AuditTag::FallbackSucceeded,
                    json!({ "primary": primary_op, "operation": fallback_op, "code": ack.code }),
                );
                Ok((ack, ExecutionPath::Fallback(fallback_op)))
            }
            Err(fallback_error) => {
                record_fallback(fallback_op.as_str(), false);
                self.audit(
                    signal,
                    AuditTag::FallbackFailed,
                    json!({
                        "primary": primary_op,
                        "operation": fallback_op,
                        "error": fallback_error.to_string(),
                    }),
                );
                Err(SignalError::FallbackOperationFailed {
                    primary: primary_op,
                    primary_error,
                    fallback: Some(fallback_op),
                    fallback_error: Some(fallback_error),
                })
            }
        }
    }

    /// Issue one venue call. Position calls report the position they targeted
    /// when the venue does not echo it.
    async fn dispatch(&self, call: VenueCall) -> Result<VenueAck, VenueError> {
        match call {
            VenueCall::Place(request) => self.venue.place_order(*request).await,
            VenueCall::ModifyPosition(position, protection) => {
                let ack = self.venue.modify_position(&position, protection).await?;
                Ok(Self::with_target_position(ack, position))
            }
            VenueCall::ModifyPendingOrder(order, price, protection) => {
                self.venue
                    .modify_pending_order(&order, price, protection)
                    .await
            }
            VenueCall::ClosePosition(position) => {
                let ack = self.venue.close_position(&position).await?;
                Ok(Self::with_target_position(ack, position))
            }
            VenueCall::CancelOrder(order) => self.venue.cancel_order(&order).await,
        }
    }

    fn with_target_position(mut ack: VenueAck, position: BrokerPositionId) -> VenueAck {
        if ack.position_id.is_none() {
            ack.position_id = Some(position);
        }
        ack
    }

    fn request(
        signal: &TradeSignal,
        contract: ContractDescriptor,
        spec: OrderSpec,
        protection: Protection,
        role: OrderRole,
    ) -> PlaceOrderRequest {
        let price = signal
            .price
            .map_or_else(|| "MKT".to_string(), |price| price.to_string());

        PlaceOrderRequest {
            contract,
            spec,
            protection,
            comment: format!("{price} : {}", signal.order_id),
            client_tag: format!(
                "{}-{}-{}",
                signal.order_id,
                role.as_str().to_lowercase(),
                Uuid::new_v4().simple()
            ),
        }
    }

    fn outcome(
        signal: &TradeSignal,
        path: ExecutionPath,
        record: Option<TrackedOrder>,
        legs: Vec<LegOutcome>,
    ) -> SignalOutcome {
        SignalOutcome {
            signal_id: signal.order_id.clone(),
            channel_id: signal.channel_id.clone(),
            kind: signal.kind,
            path,
            record,
            legs,
        }
    }

    fn audit(&self, signal: &TradeSignal, tag: AuditTag, payload: Value) {
        self.audit.record(AuditEvent::new(
            signal.order_id.clone(),
            signal.channel_id.clone(),
            tag,
            payload,
        ));
    }
}
