pub mod deserialise;
pub mod serialise;
pub mod wire_types;

use self::wire_types::*;

impl Message {
    /// A reply skeleton for this query: same ID, opcode, and
    /// questions, no records, and no recursion on offer.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn make_format_error_response(id: u16, opcode: Opcode) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::FormatError,
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

impl DomainName {
    pub fn root_domain() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// The labels joined with `.`, with a trailing `.` for the root.
    /// Octets are mapped to `char`s one-to-one, so this is lossless
    /// for any label content.
    pub fn to_dotted_string(&self) -> String {
        let mut out = String::with_capacity(self.encoded_len());
        for label in &self.labels {
            for octet in label {
                out.push(*octet as char);
            }
            out.push('.');
        }
        if out.is_empty() {
            out.push('.');
        }

        out
    }

    /// Parse a name like `www.example.com.` or `www.example.com`: the
    /// trailing dot is optional, every other label must be non-empty.
    /// Case is preserved.
    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s.is_empty() || s == "." {
            return Some(Self::root_domain());
        }

        let s = s.strip_suffix('.').unwrap_or(s);
        Self::from_labels(s.split('.').map(|label| label.as_bytes().to_vec()).collect())
    }

    /// Build a name from its non-root labels.
    pub fn from_labels(labels: Vec<Vec<u8>>) -> Option<Self> {
        if labels
            .iter()
            .any(|label| label.is_empty() || label.len() > LABEL_MAX_LEN)
        {
            None
        } else {
            Some(Self { labels })
        }
    }

    /// Number of octets this name takes on the wire, including the
    /// length octets and the terminating root label.
    pub fn encoded_len(&self) -> usize {
        self.labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1
    }
}
