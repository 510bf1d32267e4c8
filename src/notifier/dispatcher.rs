//! The notification dispatcher: one event in, one result per channel out.
//!
//! Given a [`FlightStatusEvent`], the dispatcher builds a channel-appropriate
//! payload for push, email, and SMS and attempts delivery on all three
//! channels concurrently. The three attempts are joined, never raced, and
//! each channel's failure is caught locally into its own result slot — a
//! dead provider on one channel cannot suppress the other two attempts,
//! and `dispatch` itself never fails.

use crate::core::{
    Channel, DispatchResult, EmailSender, FlightStatusEvent, PushSender, Recipients, SmsSender,
};
use metrics::counter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Default bound on a single channel send.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans one event out to the three notification channels.
pub struct Dispatcher {
    push: Arc<dyn PushSender>,
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    send_timeout: Duration,
}

impl Dispatcher {
    /// Creates a new `Dispatcher` over the three channel senders.
    pub fn new(
        push: Arc<dyn PushSender>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            push,
            email,
            sms,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Overrides the per-send timeout.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Attempts delivery of `event` on all three channels.
    ///
    /// Always returns exactly one [`DispatchResult`] per channel, in
    /// push/email/sms order, even if every channel failed. Partial or total
    /// channel failure is a normal, representable outcome, not an error.
    pub async fn dispatch(
        &self,
        event: &FlightStatusEvent,
        recipients: &Recipients,
    ) -> Vec<DispatchResult> {
        // Join, not race: the caller needs a complete per-channel summary.
        let (push, email, sms) = tokio::join!(
            self.dispatch_push(event, recipients),
            self.dispatch_email(event, recipients),
            self.dispatch_sms(event, recipients),
        );

        for result in [&push, &email, &sms] {
            match &result.detail {
                Some(detail) => {
                    info!(channel = %result.channel, outcome = ?result.outcome, detail = %detail, "channel dispatch finished");
                }
                None => {
                    info!(channel = %result.channel, outcome = ?result.outcome, "channel dispatch finished");
                }
            }
        }
        vec![push, email, sms]
    }

    async fn dispatch_push(
        &self,
        event: &FlightStatusEvent,
        recipients: &Recipients,
    ) -> DispatchResult {
        let data = push_data(event);
        let title = format!("Flight {} Update", event.flight_id);
        let body = format!(
            "Status: {}, Gate: {}, Delay: {}",
            event.status,
            event.gate_label(),
            event.delay_label()
        );

        let attempt = self.push.send(&recipients.topic, &data, &title, &body);
        match timeout(self.send_timeout, attempt).await {
            Ok(Ok(())) => DispatchResult::sent(Channel::Push, None),
            Ok(Err(e)) => self.channel_failure(Channel::Push, e.to_string()),
            Err(_) => self.channel_timeout(Channel::Push),
        }
    }

    async fn dispatch_email(
        &self,
        event: &FlightStatusEvent,
        recipients: &Recipients,
    ) -> DispatchResult {
        if recipients.emails.is_empty() {
            return DispatchResult::sent(Channel::Email, Some("no subscribed recipients".into()));
        }

        let subject = format!("Flight {} Status Update", event.flight_id);
        let body = format!(
            "Flight Status Update:\n\
             Flight ID: {}\n\
             Status: {}\n\
             Gate: {}\n\
             Delay: {}\n",
            event.flight_id,
            event.status,
            event.gate_label(),
            event.delay_label()
        );

        let mut failures = Vec::new();
        for recipient in &recipients.emails {
            let attempt = self.email.send(&subject, recipient, &body);
            match timeout(self.send_timeout, attempt).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("{recipient}: {e}")),
                Err(_) => failures.push(format!(
                    "{recipient}: timed out after {:?}",
                    self.send_timeout
                )),
            }
        }

        if failures.is_empty() {
            DispatchResult::sent(
                Channel::Email,
                Some(format!("delivered to {} recipient(s)", recipients.emails.len())),
            )
        } else {
            self.channel_failure(Channel::Email, failures.join("; "))
        }
    }

    async fn dispatch_sms(
        &self,
        event: &FlightStatusEvent,
        recipients: &Recipients,
    ) -> DispatchResult {
        if recipients.phones.is_empty() {
            return DispatchResult::sent(Channel::Sms, Some("no subscribed recipients".into()));
        }

        let body = format!(
            "Flight {} Update: {}, Gate: {}, Delay: {}",
            event.flight_id,
            event.status,
            event.gate_label(),
            event.delay_label()
        );

        let mut failures = Vec::new();
        for phone in &recipients.phones {
            let attempt = self.sms.send(phone, &body);
            match timeout(self.send_timeout, attempt).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("{phone}: {e}")),
                Err(_) => {
                    failures.push(format!("{phone}: timed out after {:?}", self.send_timeout))
                }
            }
        }

        if failures.is_empty() {
            DispatchResult::sent(
                Channel::Sms,
                Some(format!("delivered to {} recipient(s)", recipients.phones.len())),
            )
        } else {
            self.channel_failure(Channel::Sms, failures.join("; "))
        }
    }

    fn channel_failure(&self, channel: Channel, detail: String) -> DispatchResult {
        counter!("notification_failures_total", "channel" => channel.to_string()).increment(1);
        warn!(%channel, %detail, "channel delivery failed");
        DispatchResult::failed(channel, detail)
    }

    fn channel_timeout(&self, channel: Channel) -> DispatchResult {
        self.channel_failure(channel, format!("timed out after {:?}", self.send_timeout))
    }
}

/// Builds the push data payload for an event.
///
/// Sanitization contract: every value is stringified, and any field whose
/// source value is absent is omitted entirely — the push provider rejects
/// null values.
fn push_data(event: &FlightStatusEvent) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert("flight_id".to_string(), event.flight_id.clone());
    data.insert("status".to_string(), event.status.clone());
    if let Some(gate) = &event.gate {
        data.insert("gate".to_string(), gate.clone());
    }
    if let Some(delay) = event.delay {
        data.insert("delay".to_string(), delay.to_string());
    }
    data
}
