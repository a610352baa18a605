//! High-level netlink connection with request/response handling.

use tracing::debug;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NlMsgError, NlMsgHdr};
use super::socket::NetlinkSocket;

/// What a processed dump datagram means for the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DumpState {
    /// More datagrams expected.
    Continue,
    /// NLMSG_DONE (or a terminal ACK) was seen.
    Done,
}

/// Walk one received datagram of a dump and feed matching messages to
/// the callback.
///
/// Messages whose sequence number or port id do not belong to the
/// request are skipped; a multicast notification arriving on the same
/// socket must not corrupt an in-flight dump. Once the callback asks to
/// stop (`Ok(false)`), `stopped` latches and remaining messages are
/// consumed without being delivered, so the socket is drained to
/// NLMSG_DONE and stays usable for the next request.
pub(crate) fn process_dump_datagram(
    data: &[u8],
    seq: u32,
    pid: u32,
    stopped: &mut bool,
    cb: &mut dyn FnMut(&NlMsgHdr, &[u8]) -> Result<bool>,
) -> Result<DumpState> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq || header.nlmsg_pid != pid {
            continue;
        }

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
            // An ACK terminates the exchange like NLMSG_DONE does.
            return Ok(DumpState::Done);
        }

        if header.is_done() {
            return Ok(DumpState::Done);
        }

        if !*stopped && !cb(header, payload)? {
            *stopped = true;
        }
    }

    Ok(DumpState::Continue)
}

/// High-level netlink connection.
///
/// One handle per socket, passed explicitly to everything that needs
/// kernel access.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Create a new route-family connection.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
        })
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Set a receive deadline for every reply wait on this connection.
    pub fn set_recv_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.socket.set_recv_timeout(timeout);
    }

    /// Send a request and collect every reply message belonging to it.
    ///
    /// Terminates on NLMSG_DONE for multipart replies, or after the
    /// first datagram when the reply is not multipart. Returns the
    /// matching message headers with their payloads.
    pub async fn request(&self, mut builder: MessageBuilder) -> Result<Vec<(NlMsgHdr, Vec<u8>)>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg).await?;

        let mut replies = Vec::new();

        loop {
            let data = self.socket.recv_msg().await?;
            let mut multipart = false;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq || header.nlmsg_pid != self.socket.pid() {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(payload)?;
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                    return Ok(replies);
                }

                if header.is_done() {
                    return Ok(replies);
                }

                multipart |= header.is_multi();
                replies.push((*header, payload.to_vec()));
            }

            if !multipart {
                return Ok(replies);
            }
        }
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, mut builder: MessageBuilder) -> Result<()> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg).await?;

        loop {
            let data = self.socket.recv_msg().await?;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq || header.nlmsg_pid != self.socket.pid() {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(payload)?;
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Send a dump request and collect all response messages.
    pub async fn dump(&self, builder: MessageBuilder) -> Result<Vec<(NlMsgHdr, Vec<u8>)>> {
        let mut responses = Vec::new();
        self.dump_iter(builder, |header, payload| {
            responses.push((*header, payload.to_vec()));
            Ok(true)
        })
        .await?;
        Ok(responses)
    }

    /// Send a dump request and stream response messages through a
    /// callback.
    ///
    /// The callback returning `Ok(false)` stops delivery early; the
    /// remaining dump messages are still read off the socket so the
    /// connection can be reused.
    pub async fn dump_iter<F>(&self, mut builder: MessageBuilder, mut cb: F) -> Result<()>
    where
        F: FnMut(&NlMsgHdr, &[u8]) -> Result<bool>,
    {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg).await?;

        let mut stopped = false;
        loop {
            let data = self.socket.recv_msg().await?;
            match process_dump_datagram(&data, seq, self.socket.pid(), &mut stopped, &mut cb)? {
                DumpState::Continue => {}
                DumpState::Done => break,
            }
        }

        if stopped {
            debug!(seq, "dump stopped early by caller, socket drained");
        }
        Ok(())
    }
}

/// Helper to build a dump request.
pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}

/// Helper to build a request expecting ACK.
pub fn ack_request(msg_type: u16, extra_flags: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK | extra_flags)
}
