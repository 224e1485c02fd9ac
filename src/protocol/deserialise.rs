//! Deserialisation of DNS messages from the network.  See the
//! `wire_types` module for details of the format.
//!
//! Nothing in here trusts the input: every field is bounds-checked
//! before it is read, and a failure says which part of the message
//! was incomplete and by how many octets.

use bytes::Bytes;

use crate::protocol::wire_types::*;

impl Message {
    /// Parse a complete datagram.  Octets left over after the
    /// sections declared in the header are an error.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed, or has trailing octets.
    pub fn from_octets(octets: &[u8]) -> Result<Self, ProtocolError> {
        let (message, consumed) = Self::deserialise_with_len(octets)?;
        if consumed == octets.len() {
            Ok(message)
        } else {
            Err(ProtocolError::TrailingOctets {
                id: message.header.id,
                count: octets.len() - consumed,
            })
        }
    }

    /// Parse a message from the start of `octets`, returning it along
    /// with the number of octets it occupied.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise_with_len(octets: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut buffer = ConsumableBuffer::new(octets);
        let message = Self::deserialise(&mut buffer)?;
        Ok((message, buffer.position()))
    }

    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let wire_header = WireHeader::deserialise(buffer)?;
        let id = wire_header.header.id;

        // the counts come from the client, so they only bound the
        // loops: capacity grows with what is actually present.
        let mut questions = Vec::new();
        let mut answers = Vec::new();
        let mut authority = Vec::new();
        let mut additional = Vec::new();

        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(id, buffer)?);
        }
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(id, buffer)?);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl Opcode {
    /// The opcode of a datagram which may not decode as a whole, if it
    /// is long enough to have one.
    pub fn peek(octets: &[u8]) -> Option<Self> {
        let flags1 = octets.get(2)?;
        Some(Opcode::from(
            (flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE,
        ))
    }
}

impl WireHeader {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let available = buffer.remaining();
        let id = buffer.next_u16().ok_or(ProtocolError::CompletelyBusted)?;
        if available < HEADER_LEN {
            return Err(ProtocolError::HeaderTooShort {
                id,
                missing: HEADER_LEN - available,
            });
        }

        let too_short = ProtocolError::HeaderTooShort { id, missing: 0 };
        let flags1 = buffer.next_u8().ok_or(too_short)?;
        let flags2 = buffer.next_u8().ok_or(too_short)?;
        let qdcount = buffer.next_u16().ok_or(too_short)?;
        let ancount = buffer.next_u16().ok_or(too_short)?;
        let nscount = buffer.next_u16().ok_or(too_short)?;
        let arcount = buffer.next_u16().ok_or(too_short)?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & HEADER_MASK_QR != 0,
                opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
                is_authoritative: flags1 & HEADER_MASK_AA != 0,
                is_truncated: flags1 & HEADER_MASK_TC != 0,
                recursion_desired: flags1 & HEADER_MASK_RD != 0,
                recursion_available: flags2 & HEADER_MASK_RA != 0,
                rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(id, buffer)?;

        // QTYPE + QCLASS
        let missing = buffer.missing(2 + 2);
        if missing > 0 {
            return Err(ProtocolError::QuestionTooShort { id, missing });
        }

        let too_short = ProtocolError::QuestionTooShort { id, missing: 0 };
        let qtype = QueryType::from(buffer.next_u16().ok_or(too_short)?);
        let qclass = QueryClass::from(buffer.next_u16().ok_or(too_short)?);

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(id, buffer)?;

        // TYPE + CLASS + TTL + RDLENGTH
        let missing = buffer.missing(2 + 2 + 4 + 2);
        if missing > 0 {
            return Err(ProtocolError::ResourceRecordTooShort { id, missing });
        }

        let too_short = ProtocolError::ResourceRecordTooShort { id, missing: 0 };
        let rtype = RecordType::from(buffer.next_u16().ok_or(too_short)?);
        let rclass = RecordClass::from(buffer.next_u16().ok_or(too_short)?);
        let ttl = buffer.next_u32().ok_or(too_short)?;
        let rdlength = usize::from(buffer.next_u16().ok_or(too_short)?);

        let rdata = buffer
            .take(rdlength)
            .ok_or(ProtocolError::ResourceRecordTooShort {
                id,
                missing: buffer.missing(rdlength),
            })?;

        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata: Bytes::copy_from_slice(rdata),
        })
    }
}

impl DomainName {
    /// # Errors
    ///
    /// If the domain cannot be parsed, or uses a compression pointer.
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let mut labels = Vec::<Vec<u8>>::with_capacity(5);

        loop {
            let size = buffer
                .next_u8()
                .ok_or(ProtocolError::DomainTooShort { id, missing: 1 })?;

            if size == 0 {
                break;
            }

            if size & LABEL_MASK_POINTER == LABEL_MASK_POINTER {
                return Err(ProtocolError::DomainPointerUnsupported(id));
            }

            let size = usize::from(size);
            if let Some(label) = buffer.take(size) {
                labels.push(label.to_vec());
            } else {
                return Err(ProtocolError::DomainTooShort {
                    id,
                    missing: buffer.missing(size),
                });
            }
        }

        Ok(Self { labels })
    }
}

/// Errors encountered when parsing a datagram.  In all the errors
/// which have an `id` field, that is the ID from the header - so that
/// an error response can be sent.  The `missing` fields count how
/// many octets the declared or fixed-width field needed beyond the
/// end of the input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProtocolError {
    /// The datagram is not even 2 octets long, so it doesn't even
    /// contain a valid ID.  An error cannot even be sent back to the
    /// client in this case as, without an ID, it cannot be linked
    /// with the correct query.
    CompletelyBusted,

    /// The header is missing one or more required fields.
    HeaderTooShort { id: u16, missing: usize },

    /// A question ends with an incomplete field.
    QuestionTooShort { id: u16, missing: usize },

    /// A resource record ends with an incomplete field, or its RDATA
    /// is shorter than its RDLENGTH.
    ResourceRecordTooShort { id: u16, missing: usize },

    /// A domain is incomplete.
    DomainTooShort { id: u16, missing: usize },

    /// A domain contains a compression pointer.
    DomainPointerUnsupported(u16),

    /// The datagram continues after the last section declared in the
    /// header.
    TrailingOctets { id: u16, count: usize },
}

impl ProtocolError {
    pub fn id(self) -> Option<u16> {
        match self {
            ProtocolError::CompletelyBusted => None,
            ProtocolError::HeaderTooShort { id, .. } => Some(id),
            ProtocolError::QuestionTooShort { id, .. } => Some(id),
            ProtocolError::ResourceRecordTooShort { id, .. } => Some(id),
            ProtocolError::DomainTooShort { id, .. } => Some(id),
            ProtocolError::DomainPointerUnsupported(id) => Some(id),
            ProtocolError::TrailingOctets { id, .. } => Some(id),
        }
    }

    /// Whether the input ended before the message did.
    pub fn is_truncation(self) -> bool {
        matches!(
            self,
            ProtocolError::CompletelyBusted
                | ProtocolError::HeaderTooShort { .. }
                | ProtocolError::QuestionTooShort { .. }
                | ProtocolError::ResourceRecordTooShort { .. }
                | ProtocolError::DomainTooShort { .. }
        )
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProtocolError::CompletelyBusted => write!(f, "datagram too short to contain an ID"),
            ProtocolError::HeaderTooShort { missing, .. } => {
                write!(f, "header truncated ({missing} octets missing)")
            }
            ProtocolError::QuestionTooShort { missing, .. } => {
                write!(f, "question truncated ({missing} octets missing)")
            }
            ProtocolError::ResourceRecordTooShort { missing, .. } => {
                write!(f, "resource record truncated ({missing} octets missing)")
            }
            ProtocolError::DomainTooShort { missing, .. } => {
                write!(f, "domain name truncated ({missing} octets missing)")
            }
            ProtocolError::DomainPointerUnsupported(_) => {
                write!(f, "domain name compression is not supported")
            }
            ProtocolError::TrailingOctets { count, .. } => {
                write!(f, "{count} octets after the end of the message")
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    /// How many octets have been consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.octets.len() - self.position
    }

    /// How many octets short the buffer is of holding `wanted` more.
    pub fn missing(&self, wanted: usize) -> usize {
        wanted.saturating_sub(self.remaining())
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        let [a] = self.take_array()?;
        Some(a)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.remaining() >= size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N).and_then(|slice| slice.try_into().ok())
    }
}
