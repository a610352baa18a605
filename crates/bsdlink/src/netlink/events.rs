//! Route change subscriptions.
//!
//! A subscription owns its own socket joined to the IPv4 and IPv6
//! route multicast groups, runs a background task that decodes
//! notifications, and hands [`RouteUpdate`]s out through a bounded
//! channel. Dropping the subscription cancels the task and closes the
//! socket.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{Notify, mpsc};
use tracing::debug;

use super::connection::dump_request;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_APPEND, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REPLACE, NlMsgError, NlMsgType,
    PID_KERNEL,
};
use super::route::{Route, deserialize_route};
use super::socket::{NetlinkSocket, rtnetlink_groups};
use super::types::route::RtMsg;

/// Flags preserved on a [`RouteUpdate`]: the NEW request modifiers
/// that distinguish a replace from a plain add.
const UPDATE_FLAG_MASK: u16 = NLM_F_REPLACE | NLM_F_EXCL | NLM_F_CREATE | NLM_F_APPEND;

/// Options for a route subscription.
pub struct SubscribeOptions {
    /// Replay the current routing table as updates before streaming
    /// changes.
    pub list_existing: bool,
    /// Capacity of the update channel. The background task blocks when
    /// the receiver falls this far behind.
    pub channel_capacity: usize,
    /// Kernel receive buffer size for the subscription socket.
    pub receive_buffer_size: Option<usize>,
    /// Receive deadline for the subscription socket. Expiry stops the
    /// background task.
    pub receive_timeout: Option<std::time::Duration>,
    /// Called with errors the background task cannot return, such as
    /// undecodable notifications. The task keeps running.
    pub error_callback: Option<Box<dyn Fn(Error) + Send + Sync>>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            list_existing: false,
            channel_capacity: 128,
            receive_buffer_size: None,
            receive_timeout: None,
            error_callback: None,
        }
    }
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("list_existing", &self.list_existing)
            .field("channel_capacity", &self.channel_capacity)
            .field("receive_buffer_size", &self.receive_buffer_size)
            .field("receive_timeout", &self.receive_timeout)
            .field("error_callback", &self.error_callback.is_some())
            .finish()
    }
}

/// A single route change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    /// RTM_NEWROUTE or RTM_DELROUTE.
    pub msg_type: u16,
    /// Request modifier flags from the notification, restricted to
    /// REPLACE, EXCL, CREATE and APPEND.
    pub nl_flags: u16,
    /// The route the notification describes.
    pub route: Route,
}

impl RouteUpdate {
    /// Whether this update announces a new or changed route.
    pub fn is_new(&self) -> bool {
        self.msg_type == NlMsgType::RTM_NEWROUTE
    }

    /// Whether this update announces a removed route.
    pub fn is_del(&self) -> bool {
        self.msg_type == NlMsgType::RTM_DELROUTE
    }
}

/// A running route subscription.
pub struct RouteSubscription {
    rx: mpsc::Receiver<RouteUpdate>,
    cancel: Arc<Notify>,
}

impl RouteSubscription {
    /// Open a subscription socket and start the background task.
    pub fn start(options: SubscribeOptions) -> Result<Self> {
        let mut socket = NetlinkSocket::with_recv_buffer_size(options.receive_buffer_size)?;
        socket.set_recv_timeout(options.receive_timeout);
        socket.add_membership(rtnetlink_groups::RTNLGRP_IPV4_ROUTE)?;
        socket.add_membership(rtnetlink_groups::RTNLGRP_IPV6_ROUTE)?;

        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let cancel = Arc::new(Notify::new());
        tokio::spawn(run_subscription(socket, tx, cancel.clone(), options));

        Ok(Self { rx, cancel })
    }

    /// Receive the next update. Returns `None` once the subscription
    /// has been cancelled or the background task stopped.
    pub async fn recv(&mut self) -> Option<RouteUpdate> {
        self.rx.recv().await
    }

    /// Stop the background task. Updates already in the channel can
    /// still be received.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }
}

impl Drop for RouteSubscription {
    fn drop(&mut self) {
        // The task observes the signal and exits, closing its socket.
        self.cancel.notify_one();
    }
}

impl tokio_stream::Stream for RouteSubscription {
    type Item = RouteUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Subscribe to route changes with the given options.
pub fn route_subscribe(options: SubscribeOptions) -> Result<RouteSubscription> {
    RouteSubscription::start(options)
}

/// Decode one datagram worth of notifications.
///
/// NLMSG_DONE (end of a replayed dump) and ACKs are skipped. Kernel
/// errors and undecodable messages go to `report`; decoding continues
/// with the next message.
fn process_subscription_datagram(
    data: &[u8],
    out: &mut Vec<RouteUpdate>,
    report: &dyn Fn(Error),
) {
    for item in MessageIter::new(data) {
        let (header, payload) = match item {
            Ok(v) => v,
            Err(err) => {
                report(err);
                return;
            }
        };

        if header.is_done() {
            continue;
        }
        if header.is_error() {
            match NlMsgError::from_bytes(payload) {
                Ok(msg) if msg.is_ack() => {}
                Ok(msg) => report(Error::from_errno(msg.error)),
                Err(err) => report(err),
            }
            continue;
        }
        if header.nlmsg_type != NlMsgType::RTM_NEWROUTE
            && header.nlmsg_type != NlMsgType::RTM_DELROUTE
        {
            continue;
        }

        match deserialize_route(payload) {
            Ok(route) => out.push(RouteUpdate {
                msg_type: header.nlmsg_type,
                nl_flags: header.nlmsg_flags & UPDATE_FLAG_MASK,
                route,
            }),
            Err(err) => report(err),
        }
    }
}

async fn run_subscription(
    socket: NetlinkSocket,
    tx: mpsc::Sender<RouteUpdate>,
    cancel: Arc<Notify>,
    options: SubscribeOptions,
) {
    let report = |err: Error| {
        if let Some(ref cb) = options.error_callback {
            cb(err);
        } else {
            debug!(%err, "route subscription error");
        }
    };

    if options.list_existing {
        let mut builder = dump_request(NlMsgType::RTM_GETROUTE);
        builder.append(&RtMsg {
            rtm_family: libc::AF_UNSPEC as u8,
            ..Default::default()
        });
        builder.set_seq(socket.next_seq());
        builder.set_pid(socket.pid());
        if let Err(err) = socket.send(&builder.finish()).await {
            report(err);
            return;
        }
    }

    let mut updates = Vec::new();
    loop {
        let (data, port) = tokio::select! {
            _ = cancel.notified() => return,
            result = socket.recv_msg_from() => match result {
                Ok(v) => v,
                Err(err) => {
                    report(err);
                    return;
                }
            },
        };

        if port != PID_KERNEL {
            report(Error::InvalidMessage(format!(
                "notification from unexpected port {}",
                port
            )));
            continue;
        }

        process_subscription_datagram(&data, &mut updates, &report);
        for update in updates.drain(..) {
            if tx.send(update).await.is_err() {
                // Receiver dropped, nothing left to deliver to.
                return;
            }
        }
    }
}
