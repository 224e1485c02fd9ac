//! Serialisation of DNS messages to the wire format.  See the
//! `wire_types` module for details of the format.
//!
//! Every write is checked against the size limit of the
//! `WritableBuffer`: running out of room is an error, not a panic.

use bytes::{BufMut, BytesMut};

use crate::protocol::wire_types::*;

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed), or exceeds the maximum message
    /// size.
    pub fn to_octets(&self) -> Result<BytesMut, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// Write the message, with header counts taken from the sections,
    /// and return the number of octets written.  On error the buffer
    /// is left as it was before the call.
    ///
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed), or does not fit in the buffer.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<usize, Error> {
        let start = buffer.index();
        let result = self.serialise_sections(buffer);
        if result.is_err() {
            buffer.octets.truncate(start);
        }
        result.map(|()| buffer.index() - start)
    }

    fn serialise_sections(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let wire_header = WireHeader {
            header: self.header,
            qdcount: usize_to_u16(self.questions.len())?,
            ancount: usize_to_u16(self.answers.len())?,
            nscount: usize_to_u16(self.authority.len())?,
            arcount: usize_to_u16(self.additional.len())?,
        };

        wire_header.serialise(buffer)?;
        for question in &self.questions {
            question.serialise(buffer)?;
        }
        for rr in &self.answers {
            rr.serialise(buffer)?;
        }
        for rr in &self.authority {
            rr.serialise(buffer)?;
        }
        for rr in &self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl WireHeader {
    /// # Errors
    ///
    /// If the buffer is full.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<usize, Error> {
        let header = &self.header;

        // octet 1
        let flag_qr = if header.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(header.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if header.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if header.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if header.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if header.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_rcode = HEADER_MASK_RCODE & (u8::from(header.rcode) << HEADER_OFFSET_RCODE);

        buffer.reserve(HEADER_LEN)?;
        buffer.write_u16(header.id)?;
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd)?;
        buffer.write_u8(flag_ra | field_rcode)?;
        buffer.write_u16(self.qdcount)?;
        buffer.write_u16(self.ancount)?;
        buffer.write_u16(self.nscount)?;
        buffer.write_u16(self.arcount)?;

        Ok(HEADER_LEN)
    }
}

impl Question {
    /// # Errors
    ///
    /// If the name is invalid or the buffer is full.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<usize, Error> {
        let name_len = self.name.serialise(buffer)?;
        buffer.reserve(2 + 2)?;
        buffer.write_u16(self.qtype.into())?;
        buffer.write_u16(self.qclass.into())?;

        Ok(name_len + 2 + 2)
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the name is invalid, the RDATA is too long, or the buffer is
    /// full.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<usize, Error> {
        let rdlength = usize_to_u16(self.rdata.len())?;

        let name_len = self.name.serialise(buffer)?;
        buffer.reserve(2 + 2 + 4 + 2 + self.rdata.len())?;
        buffer.write_u16(self.rtype.into())?;
        buffer.write_u16(self.rclass.into())?;
        buffer.write_u32(self.ttl)?;
        buffer.write_u16(rdlength)?;
        buffer.write_octets(&self.rdata)?;

        Ok(name_len + 2 + 2 + 4 + 2 + self.rdata.len())
    }
}

impl DomainName {
    /// Names are always written in full: this server never emits
    /// compression pointers.
    ///
    /// # Errors
    ///
    /// If a label is too long to be written unambiguously, or the
    /// buffer is full.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<usize, Error> {
        for label in &self.labels {
            if label.is_empty() || label.len() > LABEL_MAX_LEN {
                return Err(Error::BadLabelLength { len: label.len() });
            }
        }

        let len = self.encoded_len();
        buffer.reserve(len)?;
        for label in &self.labels {
            // checked above
            buffer.write_u8(label.len() as u8)?;
            buffer.write_octets(label)?;
        }
        buffer.write_u8(0)?;

        Ok(len)
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter does not fit in the desired width.
    CounterTooLarge { counter: usize, bits: u32 },

    /// The buffer does not have room for the next field.
    BufferTooSmall { needed: usize, available: usize },

    /// A label is empty, or so long that its length octet would be
    /// read back as a compression pointer.
    BadLabelLength { len: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
            Error::BufferTooSmall { needed, available } => {
                write!(f, "needed {needed} octets but only {available} available")
            }
            Error::BadLabelLength { len } => {
                write!(f, "label of {len} octets cannot be written")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which can be written to, for serialisation purposes, up
/// to a fixed limit.
pub struct WritableBuffer {
    pub octets: BytesMut,
    limit: usize,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_MESSAGE_SIZE)
    }
}

impl WritableBuffer {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            octets: BytesMut::with_capacity(limit.min(MAX_DATAGRAM_SIZE)),
            limit,
        }
    }

    pub fn index(&self) -> usize {
        self.octets.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.octets.clear();
    }

    /// Check there is room for `size` more octets.
    ///
    /// # Errors
    ///
    /// If there is not.
    pub fn reserve(&self, size: usize) -> Result<(), Error> {
        let available = self.limit.saturating_sub(self.index());
        if size > available {
            Err(Error::BufferTooSmall {
                needed: size,
                available,
            })
        } else {
            Ok(())
        }
    }

    pub fn write_u8(&mut self, octet: u8) -> Result<(), Error> {
        self.reserve(1)?;
        self.octets.put_u8(octet);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), Error> {
        self.write_octets(&value.to_be_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        self.write_octets(&value.to_be_bytes())
    }

    pub fn write_octets(&mut self, octets: &[u8]) -> Result<(), Error> {
        self.reserve(octets.len())?;
        self.octets.put_slice(octets);
        Ok(())
    }
}

/// Helper function to convert a `usize` into a `u16` (or return an error).
///
/// # Errors
///
/// If the value cannot be converted.
fn usize_to_u16(counter: usize) -> Result<u16, Error> {
    if let Ok(t) = u16::try_from(counter) {
        Ok(t)
    } else {
        Err(Error::CounterTooLarge {
            counter,
            bits: u16::BITS,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::protocol::wire_types::test_util::*;

    #[test]
    #[rustfmt::skip]
    fn test_a_response() {
        let mut message = Message::from_question(0x1234, a_question("www.example.com.")).make_response();
        message.header.is_authoritative = true;
        message.answers.push(ResourceRecord::a(
            domain("www.example.com."),
            Ipv4Addr::new(93, 184, 216, 34),
            600,
        ));

        assert_eq!(
            vec![
                // ID
                0x12, 0x34,
                // QR, AA / RCODE
                0b1000_0100, 0b0000_0000,
                // QDCOUNT, ANCOUNT, NSCOUNT, ARCOUNT
                0, 1, 0, 1, 0, 0, 0, 0,
                // QNAME
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // QTYPE, QCLASS
                0, 1, 0, 1,
                // NAME
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // TYPE, CLASS
                0, 1, 0, 1,
                // TTL
                0b0000_0000, 0b0000_0000, 0b0000_0010, 0b0101_1000, // 600
                // RDLENGTH
                0, 4,
                // RDATA
                93, 184, 216, 34,
            ],
            message.to_octets().unwrap(),
        );
    }

    #[test]
    #[rustfmt::skip]
    fn test_header_bits() {
        let wire_header = WireHeader {
            header: Header {
                id: 0xffff,
                is_response: false,
                opcode: Opcode::Status,
                is_authoritative: false,
                is_truncated: true,
                recursion_desired: false,
                recursion_available: true,
                rcode: Rcode::NotImplemented,
            },
            qdcount: 1,
            ancount: 2,
            nscount: 3,
            arcount: 0x0102,
        };

        let mut buf = WritableBuffer::default();
        assert_eq!(Ok(HEADER_LEN), wire_header.serialise(&mut buf));
        assert_eq!(
            vec![
                0xff, 0xff,
                // opcode 2, TC
                0b0001_0010,
                // RA, rcode 4
                0b1000_0100,
                0, 1, 0, 2, 0, 3, 1, 2,
            ],
            buf.octets,
        );
    }

    #[test]
    fn test_counts_follow_sections() {
        let mut message = Message::from_question(1, a_question("a."));
        message.questions.push(a_question("b."));
        message.additional.push(a_record("c.", Ipv4Addr::LOCALHOST));

        let octets = message.to_octets().unwrap();
        assert_eq!(&[0, 2, 0, 0, 0, 0, 0, 1], &octets[4..12]);
    }

    #[test]
    fn test_returns_octets_written() {
        let message = Message::from_question(1, a_question("www.example.com."));

        let mut buf = WritableBuffer::default();
        buf.write_u8(0).unwrap();
        assert_eq!(Ok(12 + 17 + 4), message.serialise(&mut buf));
        assert_eq!(1 + 12 + 17 + 4, buf.index());
    }

    #[test]
    fn test_name_too_big_for_buffer() {
        let mut buf = WritableBuffer::with_limit(10);
        assert_eq!(
            Err(Error::BufferTooSmall {
                needed: 17,
                available: 10
            }),
            domain("www.example.com.").serialise(&mut buf)
        );
        assert_eq!(0, buf.index());
    }

    #[test]
    fn test_message_too_big_for_buffer_is_rolled_back() {
        let mut message = Message::from_question(1, a_question("www.example.com."));
        for _ in 0..100 {
            message
                .answers
                .push(a_record("www.example.com.", Ipv4Addr::LOCALHOST));
        }

        let mut buf = WritableBuffer::with_limit(MAX_DATAGRAM_SIZE);
        buf.write_u8(42).unwrap();
        assert!(matches!(
            message.serialise(&mut buf),
            Err(Error::BufferTooSmall { .. })
        ));
        assert_eq!(vec![42], buf.octets);
    }

    #[test]
    fn test_header_needs_twelve_octets() {
        let message = Message::make_format_error_response(1, Opcode::Standard);

        let mut buf = WritableBuffer::with_limit(HEADER_LEN - 1);
        assert_eq!(
            Err(Error::BufferTooSmall {
                needed: HEADER_LEN,
                available: HEADER_LEN - 1
            }),
            message.serialise(&mut buf)
        );

        let mut buf = WritableBuffer::with_limit(HEADER_LEN);
        assert_eq!(Ok(HEADER_LEN), message.serialise(&mut buf));
    }

    #[test]
    fn test_rdata_too_long() {
        let mut rr = a_record("www.example.com.", Ipv4Addr::LOCALHOST);
        rr.rdata = Bytes::from(vec![0; 70000]);

        let mut buf = WritableBuffer::with_limit(usize::MAX);
        assert_eq!(
            Err(Error::CounterTooLarge {
                counter: 70000,
                bits: 16
            }),
            rr.serialise(&mut buf)
        );
    }

    #[test]
    fn test_label_which_looks_like_a_pointer() {
        let name = DomainName {
            labels: vec![vec![b'a'; LABEL_MAX_LEN + 1]],
        };

        let mut buf = WritableBuffer::default();
        assert_eq!(
            Err(Error::BadLabelLength {
                len: LABEL_MAX_LEN + 1
            }),
            name.serialise(&mut buf)
        );
    }

    #[test]
    fn test_roundtrip_arbitrary_messages() {
        for _ in 0..100 {
            let message: Message = arbitrary();
            if let Ok(octets) = message.to_octets() {
                assert_eq!(Ok(message), Message::from_octets(&octets));
            }
        }
    }
}
