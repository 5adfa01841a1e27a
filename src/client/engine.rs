//! Client protocol engine
//!
//! Drives one client through the broker protocol over a [`Channel`]:
//! - correlating replies with the request that is waiting for them
//! - parking replies that arrive out of order so that nothing is lost
//! - handing the session over to another broker when the current one says
//!   it is not responsible, with rollback if the new broker cannot be reached
//!
//! The engine is sequential: each operation sends, then waits for its reply
//! under a deadline. A reply of a different kind that shows up meanwhile is
//! parked in the [`Inbox`] and served to whichever wait asks for it later.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::client::channel::{Channel, Connector};
use crate::client::inbox::Inbox;
use crate::config::ClientSettings;
use crate::geo::{Geofence, Location};
use crate::protocol::function::{
    FunctionAction, FunctionMessage, RequestId, ResponseTopic, TypeCode, function_topic,
};
use crate::protocol::{BrokerInfo, Payload, PayloadKind, PublishPayload, ReasonCode, Topic};
use crate::utils::ClientError;

/// Timeouts and limits of a [`GeoClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub result_timeout: Duration,
    /// Redirects followed in a row before giving up.
    pub max_handoff_hops: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
            result_timeout: Duration::from_millis(settings.result_timeout_ms),
            max_handoff_hops: settings.max_handoff_hops,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStatus {
    Granted,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeStatus {
    Removed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationStatus {
    Updated,
    /// The broker did not know this client; the location is kept locally.
    NotConnected,
    /// The new location belongs to another broker and the session moved there.
    HandedOff(BrokerInfo),
}

/// How the broker answered a publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Acked(ReasonCode),
    /// The broker is not responsible; the caller decides whether to move.
    Redirected(Option<BrokerInfo>),
}

enum Registration {
    Accepted,
    Redirected(BrokerInfo),
}

/// A remote function invocation.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub func_name: String,
    pub data: String,
    pub req_id: RequestId,
    /// Where the call is published.
    pub pub_fence: Geofence,
    /// Where ack and result are expected from.
    pub sub_fence: Geofence,
    /// Extra attempts after the first one got no answer.
    pub retries: u32,
    /// Times the CALL is published within one attempt while no ACK arrives.
    pub ack_attempts: u32,
    /// After the ACK attempts ran out, offer the call to the cloud service
    /// on the `nack` topic before giving up on the attempt.
    pub cloud_retry: bool,
    /// Overrides [`ClientOptions::ack_timeout`] for this call.
    pub ack_timeout: Option<Duration>,
    /// Overrides [`ClientOptions::result_timeout`] for this call.
    pub result_timeout: Option<Duration>,
}

impl CallRequest {
    pub fn new(
        func_name: impl Into<String>,
        data: impl Into<String>,
        req_id: RequestId,
        fence: Geofence,
    ) -> Self {
        Self {
            func_name: func_name.into(),
            data: data.into(),
            req_id,
            pub_fence: fence.clone(),
            sub_fence: fence,
            retries: 0,
            ack_attempts: 1,
            cloud_retry: false,
            ack_timeout: None,
            result_timeout: None,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// At least one ACK attempt is always made.
    pub fn with_ack_attempts(mut self, ack_attempts: u32) -> Self {
        self.ack_attempts = ack_attempts.max(1);
        self
    }

    pub fn with_cloud_retry(mut self, cloud_retry: bool) -> Self {
        self.cloud_retry = cloud_retry;
        self
    }

    pub fn with_timeouts(mut self, ack_timeout: Duration, result_timeout: Duration) -> Self {
        self.ack_timeout = Some(ack_timeout);
        self.result_timeout = Some(result_timeout);
        self
    }
}

/// Whether a published CALL can be answered at all.
enum CallDelivery {
    Delivered,
    NoSubscribers,
    NotConnected,
}

enum CallAnswer {
    Ack(FunctionMessage),
    Result(FunctionMessage),
    Refused,
    Silent,
}

/// One client session, talking to the broker responsible for its location.
pub struct GeoClient<C: Connector> {
    id: String,
    connector: C,
    channel: Option<C::Channel>,
    broker_address: String,
    location: Option<Location>,
    subscriptions: HashMap<Topic, Geofence>,
    inbox: Inbox,
    visited: HashSet<String>,
    options: ClientOptions,
}

impl<C: Connector> GeoClient<C> {
    pub fn new(
        id: impl Into<String>,
        location: Option<Location>,
        connector: C,
        options: ClientOptions,
    ) -> Self {
        Self {
            id: id.into(),
            connector,
            channel: None,
            broker_address: String::new(),
            location,
            subscriptions: HashMap::new(),
            inbox: Inbox::new(),
            visited: HashSet::new(),
            options,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn broker_address(&self) -> &str {
        &self.broker_address
    }

    /// Subscriptions granted by the current broker.
    pub fn subscriptions(&self) -> &HashMap<Topic, Geofence> {
        &self.subscriptions
    }

    /// True while a channel to a broker is open.
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Registers with the broker at `address`, following redirects to the
    /// broker responsible for the current location.
    pub async fn connect(&mut self, address: &str) -> Result<(), ClientError> {
        self.close_channel().await;
        self.visited.clear();
        self.subscriptions.clear();
        self.broker_address = address.to_string();
        self.channel = Some(self.connector.connect(address, &self.id).await?);

        let outcome = match self.register().await {
            Ok(Registration::Accepted) => Ok(()),
            Ok(Registration::Redirected(target)) => self.follow_redirects(target).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                info!("Client {} connected to {}", self.id, self.broker_address);
                Ok(())
            }
            Err(e) => {
                warn!("Client {} failed to connect: {e}", self.id);
                self.close_channel().await;
                Err(e)
            }
        }
    }

    /// Sends DISCONNECT and drops the session. Local state other than the
    /// location is discarded.
    pub async fn disconnect(&mut self) {
        if self.channel.is_some() {
            let bye = Payload::Disconnect {
                reason_code: ReasonCode::NormalDisconnection,
                broker_info: None,
            };
            if let Err(e) = self.send(bye).await {
                warn!("Client {} could not say goodbye: {e}", self.id);
            }
        }
        self.close_channel().await;
        self.subscriptions.clear();
        self.visited.clear();
    }

    /// Subscribes to `topic` within `geofence`. A topic that is already
    /// tracked is not sent again.
    pub async fn subscribe(
        &mut self,
        topic: impl Into<Topic>,
        geofence: Geofence,
    ) -> Result<SubscribeStatus, ClientError> {
        let topic = topic.into();
        if self.subscriptions.contains_key(&topic) {
            debug!("Client {} already subscribed to {topic}", self.id);
            return Ok(SubscribeStatus::AlreadySubscribed);
        }
        self.send(Payload::Subscribe {
            topic: topic.clone(),
            geofence: geofence.clone(),
        })
        .await?;
        match self
            .await_reply(&[PayloadKind::SubAck], self.options.ack_timeout, "SUBACK")
            .await?
        {
            Payload::SubAck {
                reason_code: ReasonCode::GrantedQoS0,
            } => {
                self.subscriptions.insert(topic, geofence);
                Ok(SubscribeStatus::Granted)
            }
            other => Err(rejection(other)),
        }
    }

    /// Removes the subscription to `topic` on the broker and locally.
    pub async fn unsubscribe(
        &mut self,
        topic: impl Into<Topic>,
    ) -> Result<UnsubscribeStatus, ClientError> {
        let topic = topic.into();
        self.send(Payload::Unsubscribe {
            topic: topic.clone(),
        })
        .await?;
        let reply = self
            .await_reply(&[PayloadKind::UnsubAck], self.options.ack_timeout, "UNSUBACK")
            .await?;
        let status = match reply {
            Payload::UnsubAck {
                reason_code: ReasonCode::Success,
            } => UnsubscribeStatus::Removed,
            Payload::UnsubAck {
                reason_code: ReasonCode::NoSubscriptionExisted,
            } => UnsubscribeStatus::NotFound,
            other => return Err(rejection(other)),
        };
        self.subscriptions.remove(&topic);
        Ok(status)
    }

    /// Reports a new location. Moves the session if the broker says another
    /// broker is now responsible.
    pub async fn update_location(&mut self, location: Location) -> Result<LocationStatus, ClientError> {
        self.send(Payload::PingReq {
            location: Some(location),
        })
        .await?;
        let reply = self
            .await_reply(
                &[PayloadKind::PingResp, PayloadKind::Disconnect],
                self.options.ack_timeout,
                "PINGRESP",
            )
            .await?;
        match reply {
            Payload::PingResp {
                reason_code: ReasonCode::LocationUpdated,
            } => {
                self.location = Some(location);
                self.subscriptions.clear();
                Ok(LocationStatus::Updated)
            }
            Payload::PingResp {
                reason_code: ReasonCode::NotConnectedOrNoLocation,
            } => {
                self.location = Some(location);
                Ok(LocationStatus::NotConnected)
            }
            Payload::Disconnect {
                reason_code: ReasonCode::WrongBroker,
                broker_info: Some(target),
            } => {
                let moved_km = self.location.map_or(0.0, |l| l.distance_km(&location));
                self.location = Some(location);
                info!(
                    "Client {} moved {moved_km:.1} km out of the area of {}, handing over to {}",
                    self.id, self.broker_address, target.broker_id
                );
                self.follow_redirects(target.clone()).await?;
                Ok(LocationStatus::HandedOff(target))
            }
            Payload::Disconnect {
                reason_code: ReasonCode::WrongBroker,
                broker_info: None,
            } => {
                self.location = Some(location);
                self.close_channel().await;
                Err(ClientError::NoResponsibleBroker)
            }
            other => Err(rejection(other)),
        }
    }

    /// Publishes `content` to `topic` within `geofence` and returns the
    /// broker's verdict. Redirects are reported, not followed.
    pub async fn publish(
        &mut self,
        topic: impl Into<Topic>,
        geofence: Geofence,
        content: impl Into<String>,
    ) -> Result<AckOutcome, ClientError> {
        self.send(Payload::Publish(PublishPayload {
            topic: topic.into(),
            geofence,
            content: content.into(),
        }))
        .await?;
        let reply = self
            .await_reply(
                &[PayloadKind::PubAck, PayloadKind::Disconnect],
                self.options.ack_timeout,
                "PUBACK",
            )
            .await?;
        match reply {
            Payload::PubAck { reason_code } => Ok(AckOutcome::Acked(reason_code)),
            Payload::Disconnect {
                reason_code: ReasonCode::WrongBroker,
                broker_info,
            } => Ok(AckOutcome::Redirected(broker_info)),
            other => Err(rejection(other)),
        }
    }

    /// Next delivered publication, or `None` once `budget` runs out.
    pub async fn next_publication(
        &mut self,
        budget: Duration,
    ) -> Result<Option<PublishPayload>, ClientError> {
        match self.await_reply(&[PayloadKind::Publish], budget, "PUBLISH").await {
            Ok(Payload::Publish(publish)) => Ok(Some(publish)),
            Ok(other) => Err(ClientError::UnexpectedReply(format!("{:?}", other.kind()))),
            Err(ClientError::Timeout(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Waits for the function message with `action` answering `req_id`.
    ///
    /// Messages of the same request with another action, and publications
    /// that are no function message at all, are held back and parked again
    /// afterwards, so neither a result that overtakes its ack nor a plain
    /// delivery is lost. Messages belonging to other requests are discarded.
    pub async fn listen_for(
        &mut self,
        action: FunctionAction,
        req_id: &RequestId,
        budget: Duration,
    ) -> Result<Option<FunctionMessage>, ClientError> {
        let deadline = Instant::now() + budget;
        let mut deferred = Vec::new();
        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let publish = match self.next_publication(remaining).await {
                Ok(Some(publish)) => publish,
                Ok(None) => break Ok(None),
                Err(e) => break Err(e),
            };
            let message = match FunctionMessage::decode(&publish.content) {
                Ok(message) => message,
                Err(e) => {
                    trace!("Holding back publication on {}: {e}", publish.topic);
                    deferred.push(Payload::Publish(publish));
                    continue;
                }
            };
            if message.req_id != *req_id {
                info!(
                    "Dropping {:?} for request {} while waiting for {req_id}",
                    message.action, message.req_id
                );
                continue;
            }
            if message.action == action {
                break Ok(Some(message));
            }
            trace!("Holding back {:?} of request {req_id}", message.action);
            deferred.push(Payload::Publish(publish));
        };
        for payload in deferred {
            self.inbox.park(payload);
        }
        outcome
    }

    /// Calls a remote function and waits for its result.
    ///
    /// Each attempt publishes the CALL up to `ack_attempts` times until an
    /// ACK arrives, optionally offers it to the cloud service, then waits for
    /// the RESULT. A broker that does not know the client ends the call.
    /// Returns `None` if every attempt went unanswered.
    pub async fn call_function(
        &mut self,
        request: CallRequest,
    ) -> Result<Option<FunctionMessage>, ClientError> {
        let ack_timeout = request.ack_timeout.unwrap_or(self.options.ack_timeout);
        let result_timeout = request
            .result_timeout
            .unwrap_or(self.options.result_timeout);
        let result_topic = function_topic(&request.func_name, FunctionAction::Result);
        let ack_topic = function_topic(&request.func_name, FunctionAction::Ack);
        self.subscribe(result_topic.clone(), request.sub_fence.clone())
            .await?;
        self.subscribe(ack_topic, request.sub_fence.clone()).await?;

        let call = FunctionMessage {
            func_name: request.func_name.clone(),
            action: FunctionAction::Call,
            data: request.data.clone(),
            type_code: TypeCode::Normal,
            response_topic: ResponseTopic {
                topic: result_topic,
                fence: request.sub_fence.clone(),
            },
            sender_id: self.id.clone(),
            receiver_id: String::new(),
            req_id: request.req_id.clone(),
        };
        let content = call.encode()?;
        let call_topic = function_topic(&request.func_name, FunctionAction::Call);
        let cloud_topic = function_topic(&request.func_name, FunctionAction::Nack);

        for attempt in 0..=request.retries {
            let mut ack = None;
            for ack_attempt in 0..request.ack_attempts.max(1) {
                match self.publish_call(&call_topic, &request, &content).await? {
                    CallDelivery::Delivered => {}
                    CallDelivery::NoSubscribers => break,
                    CallDelivery::NotConnected => return Ok(None),
                }
                trace!(
                    "Call {} attempt {attempt}.{ack_attempt} waiting for an ack",
                    request.req_id
                );
                match self.await_call_ack(&request.req_id, ack_timeout).await? {
                    CallAnswer::Ack(message) => {
                        ack = Some(message);
                        break;
                    }
                    CallAnswer::Result(message) => return Ok(Some(message)),
                    CallAnswer::Refused => break,
                    CallAnswer::Silent => {}
                }
            }

            if ack.is_none() && request.cloud_retry {
                info!("Offering call {} to the cloud on {cloud_topic}", request.req_id);
                match self.publish_call(&cloud_topic, &request, &content).await? {
                    CallDelivery::Delivered => {
                        match self.await_call_ack(&request.req_id, ack_timeout).await? {
                            CallAnswer::Ack(message) => ack = Some(message),
                            CallAnswer::Result(message) => return Ok(Some(message)),
                            CallAnswer::Refused | CallAnswer::Silent => {}
                        }
                    }
                    CallDelivery::NoSubscribers => {}
                    CallDelivery::NotConnected => return Ok(None),
                }
            }

            let Some(ack) = ack else {
                continue;
            };
            debug!("Call {} accepted by {}", request.req_id, ack.sender_id);
            let result = self
                .listen_for(FunctionAction::Result, &request.req_id, result_timeout)
                .await?;
            if result.is_some() {
                return Ok(result);
            }
            warn!("No result for call {} from {}", request.req_id, ack.sender_id);
        }
        Ok(None)
    }

    /// Publishes one CALL and classifies the broker's PUBACK.
    async fn publish_call(
        &mut self,
        topic: &Topic,
        request: &CallRequest,
        content: &str,
    ) -> Result<CallDelivery, ClientError> {
        let reason_code = self
            .publish_following_redirects(topic, &request.pub_fence, content)
            .await?;
        match reason_code {
            ReasonCode::NoMatchingSubscribers => {
                warn!("Nobody serves {topic} for call {}", request.req_id);
                Ok(CallDelivery::NoSubscribers)
            }
            ReasonCode::NotConnectedOrNoLocation => {
                warn!(
                    "Broker {} does not know {}, dropping call {}",
                    self.broker_address, self.id, request.req_id
                );
                Ok(CallDelivery::NotConnected)
            }
            other => {
                debug!("Call {} on {topic} acknowledged by broker with {other}", request.req_id);
                Ok(CallDelivery::Delivered)
            }
        }
    }

    /// Waits for the ACK of `req_id`. When none comes, a parked RESULT or NACK
    /// still answers the call.
    async fn await_call_ack(
        &mut self,
        req_id: &RequestId,
        budget: Duration,
    ) -> Result<CallAnswer, ClientError> {
        if let Some(ack) = self.listen_for(FunctionAction::Ack, req_id, budget).await? {
            return Ok(CallAnswer::Ack(ack));
        }
        // the result may have been sent without a separate ack
        if let Some(result) = self
            .listen_for(FunctionAction::Result, req_id, Duration::ZERO)
            .await?
        {
            return Ok(CallAnswer::Result(result));
        }
        if let Some(nack) = self
            .listen_for(FunctionAction::Nack, req_id, Duration::ZERO)
            .await?
        {
            warn!("Call {req_id} refused by {}", nack.sender_id);
            return Ok(CallAnswer::Refused);
        }
        warn!("No ack for call {req_id}");
        Ok(CallAnswer::Silent)
    }

    /// Publishes and, when redirected, moves to the suggested broker, restores
    /// the subscriptions there and publishes again.
    async fn publish_following_redirects(
        &mut self,
        topic: &Topic,
        geofence: &Geofence,
        content: &str,
    ) -> Result<ReasonCode, ClientError> {
        for _ in 0..=self.options.max_handoff_hops {
            match self.publish(topic.clone(), geofence.clone(), content).await? {
                AckOutcome::Acked(reason_code) => return Ok(reason_code),
                AckOutcome::Redirected(Some(target)) => {
                    let wanted = self.subscriptions.clone();
                    self.follow_redirects(target).await?;
                    for (topic, fence) in wanted {
                        self.subscribe(topic, fence).await?;
                    }
                }
                AckOutcome::Redirected(None) => return Err(ClientError::NoResponsibleBroker),
            }
        }
        Err(ClientError::TooManyRedirects(self.options.max_handoff_hops))
    }

    async fn send(&mut self, payload: Payload) -> Result<(), ClientError> {
        trace!("Client {} sending {:?}", self.id, payload.kind());
        self.channel
            .as_mut()
            .ok_or(ClientError::ChannelClosed)?
            .send(payload)
            .await
    }

    /// Waits for a payload of one of the `expected` kinds, parked ones first.
    /// Anything else that arrives is parked.
    async fn await_reply(
        &mut self,
        expected: &[PayloadKind],
        budget: Duration,
        what: &'static str,
    ) -> Result<Payload, ClientError> {
        if let Some(payload) = self.inbox.take(expected) {
            return Ok(payload);
        }
        let deadline = Instant::now() + budget;
        let channel = self.channel.as_mut().ok_or(ClientError::ChannelClosed)?;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout(what));
            }
            match channel.recv(remaining).await? {
                Some(payload) if expected.contains(&payload.kind()) => return Ok(payload),
                Some(payload) => {
                    trace!("Parking {:?} while waiting for {what}", payload.kind());
                    self.inbox.park(payload);
                }
                None => return Err(ClientError::Timeout(what)),
            }
        }
    }

    /// Sends CONNECT on the current channel and interprets the answer. A
    /// duplicate-id rejection is retried once since the broker evicts the
    /// stale session while rejecting.
    async fn register(&mut self) -> Result<Registration, ClientError> {
        let mut retried = false;
        loop {
            self.send(Payload::Connect {
                location: self.location,
            })
            .await?;
            let reply = self
                .await_reply(
                    &[PayloadKind::ConnAck, PayloadKind::Disconnect],
                    self.options.connect_timeout,
                    "CONNACK",
                )
                .await?;
            match reply {
                Payload::ConnAck {
                    reason_code: ReasonCode::Success,
                } => return Ok(Registration::Accepted),
                Payload::Disconnect {
                    reason_code: ReasonCode::ProtocolError,
                    ..
                } if !retried => {
                    debug!("Broker rejected {} as a duplicate, retrying", self.id);
                    retried = true;
                }
                Payload::Disconnect {
                    reason_code: ReasonCode::WrongBroker,
                    broker_info: Some(target),
                } => return Ok(Registration::Redirected(target)),
                Payload::Disconnect {
                    reason_code: ReasonCode::WrongBroker,
                    broker_info: None,
                } => return Err(ClientError::NoResponsibleBroker),
                other => return Err(rejection(other)),
            }
        }
    }

    /// Moves the session along a chain of redirects starting at `target`.
    ///
    /// The channel the chain started from stays open until a broker accepts
    /// the client. If any hop fails, or the chain grows too long, channel,
    /// address, id and inbox are restored as they were before the first hop.
    async fn follow_redirects(&mut self, target: BrokerInfo) -> Result<(), ClientError> {
        let origin_channel = self.channel.take();
        let origin_address = self.broker_address.clone();
        let origin_id = self.id.clone();
        let origin_visited = self.visited.clone();
        let origin_inbox = std::mem::take(&mut self.inbox);

        match self.hop_until_accepted(target).await {
            Ok(()) => {
                if let Some(mut old) = origin_channel {
                    old.close().await;
                }
                self.subscriptions.clear();
                debug!("Client {} now talks to {}", self.id, self.broker_address);
                Ok(())
            }
            Err(e) => {
                self.close_channel().await;
                self.channel = origin_channel;
                self.broker_address = origin_address;
                self.id = origin_id;
                self.visited = origin_visited;
                self.inbox = origin_inbox;
                warn!("Handoff failed, staying with {}: {e}", self.broker_address);
                Err(e)
            }
        }
    }

    async fn hop_until_accepted(&mut self, mut target: BrokerInfo) -> Result<(), ClientError> {
        for _ in 0..self.options.max_handoff_hops {
            match self.handoff(&target).await? {
                Registration::Accepted => return Ok(()),
                Registration::Redirected(next) => target = next,
            }
        }
        Err(ClientError::TooManyRedirects(self.options.max_handoff_hops))
    }

    /// One hop: opens a channel to `target` and registers there. A channel
    /// left from the previous hop is closed once the new one is open.
    async fn handoff(&mut self, target: &BrokerInfo) -> Result<Registration, ClientError> {
        self.visited.insert(self.broker_address.clone());
        if self.visited.contains(&target.address) {
            self.id = format!("{}-{}", self.id, Utc::now().timestamp_millis());
            self.visited.clear();
            info!(
                "Broker {} was visited before, continuing as {}",
                target.address, self.id
            );
        }

        let channel = self
            .connector
            .connect(&target.address, &self.id)
            .await
            .map_err(|e| handoff_failed(target, e))?;
        self.close_channel().await;
        self.channel = Some(channel);
        self.broker_address = target.address.clone();
        self.register().await.map_err(|e| handoff_failed(target, e))
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        self.inbox.clear();
    }
}

fn rejection(reply: Payload) -> ClientError {
    match reply.reason_code() {
        Some(reason_code) => ClientError::Rejected(reason_code),
        None => ClientError::UnexpectedReply(format!("{:?}", reply.kind())),
    }
}

fn handoff_failed(target: &BrokerInfo, e: ClientError) -> ClientError {
    ClientError::HandoffFailed {
        target: target.clone(),
        reason: e.to_string(),
    }
}
