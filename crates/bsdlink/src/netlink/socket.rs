//! Low-level async netlink socket operations.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::error::{Error, Result};

/// Async netlink socket bound to the route family.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
    /// Per-socket receive deadline. None waits forever.
    recv_timeout: Option<Duration>,
}

impl NetlinkSocket {
    /// Create a new NETLINK_ROUTE socket.
    pub fn new() -> Result<Self> {
        Self::with_recv_buffer_size(None)
    }

    /// Create a socket with an explicit kernel receive buffer size.
    ///
    /// Subscription sockets that may fall behind a burst of route churn
    /// want a larger buffer than the default.
    pub fn with_recv_buffer_size(size: Option<usize>) -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        if let Some(size) = size {
            socket.set_rx_buf_sz(size)?;
        }

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Enable extended ACK for better error messages
        socket.set_ext_ack(true).ok(); // Ignore if not supported

        let fd = AsyncFd::new(socket)?;

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
            recv_timeout: None,
        })
    }

    /// Set a receive deadline applied to every receive on this socket.
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) {
        self.recv_timeout = timeout;
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Subscribe to a multicast group.
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().add_membership(group)?;
        Ok(())
    }

    /// Unsubscribe from a multicast group.
    pub fn drop_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().drop_membership(group)?;
        Ok(())
    }

    /// Send a message.
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive a message, allocating a buffer.
    ///
    /// Honors the socket's receive timeout when one is set; expiry
    /// surfaces as a TimedOut I/O error.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        self.deadline(self.recv_msg_inner()).await
    }

    async fn recv_msg_inner(&self) -> Result<Vec<u8>> {
        // Allocate buffer with capacity - don't resize, let recv fill it
        let mut buf = BytesMut::with_capacity(32768);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    let _n = result?;
                    // buf has been advanced by recv, so buf[..] contains the data
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive a message together with the sender's port id.
    ///
    /// Multicast notifications come from the kernel itself, port 0;
    /// anything else on a subscription socket is another process
    /// writing to our port and must not be trusted.
    pub async fn recv_msg_from(&self) -> Result<(Vec<u8>, u32)> {
        self.deadline(self.recv_msg_from_inner()).await
    }

    async fn recv_msg_from_inner(&self) -> Result<(Vec<u8>, u32)> {
        let mut buf = BytesMut::with_capacity(32768);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv_from(&mut buf, 0)) {
                Ok(result) => {
                    let (_n, addr) = result?;
                    return Ok((buf.to_vec(), addr.port_number()));
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.recv_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| Error::Io(io::Error::from(io::ErrorKind::TimedOut)))?,
            None => fut.await,
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

/// Multicast groups for NETLINK_ROUTE.
pub mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
    pub const RTNLGRP_IPV4_IFADDR: u32 = 5;
    pub const RTNLGRP_IPV4_ROUTE: u32 = 7;
    pub const RTNLGRP_IPV6_IFADDR: u32 = 9;
    pub const RTNLGRP_IPV6_ROUTE: u32 = 11;
}
