//! MPLS destinations and encapsulation.
//!
//! MPLS routes address a label stack instead of an IP prefix, and IP
//! routes can push a label stack on their way out via lightweight
//! tunnel encapsulation. Both carry the same wire form: a run of 4-byte
//! big-endian label entries with the bottom-of-stack bit on the last.

use std::fmt;

use super::attr::{AttrIter, push_attr};
use super::error::{Error, Result};
use super::types::mpls::{MplsLabelEntry, lwtunnel_encap, mpls_label, mpls_tunnel};

/// An MPLS destination: a stack of 20-bit labels, outer first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MplsDestination {
    /// Label stack (outer to inner).
    pub labels: Vec<u32>,
}

impl MplsDestination {
    /// Create a destination from a label stack.
    ///
    /// Labels above the 20-bit range are rejected.
    pub fn new(labels: Vec<u32>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidInput("empty MPLS label stack".into()));
        }
        for &label in &labels {
            if label > mpls_label::MAX {
                return Err(Error::InvalidInput(format!(
                    "MPLS label {} out of range",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    /// Encode the label stack, bottom-of-stack set on the last entry.
    pub fn encode(&self) -> Vec<u8> {
        encode_label_stack(&self.labels, 0)
    }

    /// Decode a label stack from an attribute payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let labels = decode_label_stack(data)?;
        Ok(Self { labels })
    }
}

impl fmt::Display for MplsDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// MPLS encapsulation for IP routes (push a label stack on egress).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MplsEncap {
    /// Label stack (outer to inner).
    pub labels: Vec<u32>,
    /// TTL for the bottom label. Defaults to 255 on the wire.
    pub ttl: Option<u8>,
}

impl MplsEncap {
    /// Create an encapsulation pushing the given stack.
    pub fn new(labels: Vec<u32>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidInput("empty MPLS label stack".into()));
        }
        for &label in &labels {
            if label > mpls_label::MAX {
                return Err(Error::InvalidInput(format!(
                    "MPLS label {} out of range",
                    label
                )));
            }
        }
        Ok(Self { labels, ttl: None })
    }

    /// The LWTUNNEL_ENCAP type tag for this encapsulation.
    pub fn encap_type(&self) -> u16 {
        lwtunnel_encap::MPLS
    }

    /// Build the RTA_ENCAP payload (MPLS_IPTUNNEL_* attributes).
    pub(crate) fn payload_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let label_data = encode_label_stack(&self.labels, self.ttl.unwrap_or(255));
        push_attr(&mut buf, mpls_tunnel::DST, &label_data);
        if let Some(ttl) = self.ttl {
            push_attr(&mut buf, mpls_tunnel::TTL, &[ttl]);
        }
        buf
    }

    /// Decode from an RTA_ENCAP payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut labels = Vec::new();
        let mut ttl = None;

        for item in AttrIter::new(data) {
            let (attr_type, payload) = item?;
            match attr_type {
                mpls_tunnel::DST => labels = decode_label_stack(payload)?,
                mpls_tunnel::TTL => {
                    if !payload.is_empty() {
                        ttl = Some(payload[0]);
                    }
                }
                _ => {}
            }
        }

        if labels.is_empty() {
            return Err(Error::InvalidAttribute(
                "MPLS encap without a label stack".into(),
            ));
        }
        Ok(Self { labels, ttl })
    }
}

fn encode_label_stack(labels: &[u32], bottom_ttl: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(labels.len() * MplsLabelEntry::SIZE);
    for (i, &label) in labels.iter().enumerate() {
        let entry = if i == labels.len() - 1 {
            MplsLabelEntry::bottom(label, bottom_ttl)
        } else {
            MplsLabelEntry::new(label)
        };
        data.extend_from_slice(entry.as_bytes());
    }
    data
}

fn decode_label_stack(data: &[u8]) -> Result<Vec<u32>> {
    if data.is_empty() || data.len() % MplsLabelEntry::SIZE != 0 {
        return Err(Error::InvalidAttribute(format!(
            "MPLS label stack has invalid length {}",
            data.len()
        )));
    }

    let mut labels = Vec::with_capacity(data.len() / MplsLabelEntry::SIZE);
    let mut offset = 0;
    while offset + MplsLabelEntry::SIZE <= data.len() {
        let entry = MplsLabelEntry::from_bytes(&data[offset..]).ok_or_else(|| {
            Error::Truncated {
                expected: MplsLabelEntry::SIZE,
                actual: data.len() - offset,
            }
        })?;
        labels.push(entry.label());
        if entry.is_bos() {
            break;
        }
        offset += MplsLabelEntry::SIZE;
    }
    Ok(labels)
}
