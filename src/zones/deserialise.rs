//! Parsing of zone databases.
//!
//! The format is line-oriented: each record is four
//! whitespace-separated fields,
//!
//! ```text
//! www.example.com. IN A 93.184.216.34
//! ```
//!
//! and anything from a `;` to the end of the line is a comment.  Only
//! `IN` class `A` records are supported, spelled exactly that way:
//! `in`, `CLASS1` and `TYPE1` are rejected.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::protocol::wire_types::*;
use crate::zones::{ZoneStore, ZONE_TTL};

impl ZoneStore {
    /// Parse a string of zone data
    ///
    /// # Errors
    ///
    /// If the string cannot be parsed.
    pub fn deserialise(data: &str) -> Result<Self, Error> {
        let mut records = Vec::new();
        for (i, line) in data.lines().enumerate() {
            if let Some(rr) = parse_line(i + 1, line)? {
                records.push(rr);
            }
        }
        Ok(Self::from_records(records))
    }
}

/// Parse a single line, `None` if it is blank or a comment.
///
/// # Errors
///
/// If the line cannot be parsed.
fn parse_line(line: usize, text: &str) -> Result<Option<ResourceRecord>, Error> {
    let text = match text.split_once(';') {
        Some((before, _comment)) => before,
        None => text,
    };

    let mut fields = text.split_whitespace();
    let Some(name_str) = fields.next() else {
        return Ok(None);
    };

    let missing = |expected| Error::MissingField { line, expected };
    let class_str = fields.next().ok_or_else(|| missing("record class"))?;
    let type_str = fields.next().ok_or_else(|| missing("record type"))?;
    let address_str = fields.next().ok_or_else(|| missing("IP address"))?;

    if let Some(extra) = fields.next() {
        return Err(Error::TrailingField {
            line,
            field: extra.into(),
        });
    }

    let Some(name) = DomainName::from_dotted_string(name_str) else {
        return Err(Error::BadName {
            line,
            name: name_str.into(),
        });
    };

    if class_str != "IN" || type_str != "A" {
        return Err(Error::NotImplemented {
            line,
            class: class_str.into(),
            rtype: type_str.into(),
        });
    }

    match Ipv4Addr::from_str(address_str) {
        Ok(address) => Ok(Some(ResourceRecord::a(name, address, ZONE_TTL))),
        Err(_) => Err(Error::BadAddress {
            line,
            address: address_str.into(),
        }),
    }
}

/// An error that can occur reading a zone database.  `line` is
/// 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MissingField {
        line: usize,
        expected: &'static str,
    },
    TrailingField {
        line: usize,
        field: String,
    },
    BadName {
        line: usize,
        name: String,
    },
    NotImplemented {
        line: usize,
        class: String,
        rtype: String,
    },
    BadAddress {
        line: usize,
        address: String,
    },
}

impl Error {
    pub fn line(&self) -> usize {
        match self {
            Error::MissingField { line, .. } => *line,
            Error::TrailingField { line, .. } => *line,
            Error::BadName { line, .. } => *line,
            Error::NotImplemented { line, .. } => *line,
            Error::BadAddress { line, .. } => *line,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingField { line, expected } => {
                write!(f, "line {line}: bad database format: expected {expected}")
            }
            Error::TrailingField { line, field } => {
                write!(f, "line {line}: bad database format: unexpected '{field}'")
            }
            Error::BadName { line, name } => {
                write!(f, "line {line}: could not parse domain name '{name}'")
            }
            Error::NotImplemented { line, class, rtype } => {
                write!(f, "line {line}: not implemented: '{class} {rtype}' records")
            }
            Error::BadAddress { line, address } => {
                write!(f, "line {line}: could not parse IPv4 address '{address}'")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire_types::test_util::*;

    #[test]
    fn parses_records() {
        let zone = ZoneStore::deserialise(
            "www.example.com. IN A 93.184.216.34\nmail.example.com\tIN\tA\t10.0.0.1\n",
        )
        .unwrap();

        assert_eq!(2, zone.len());

        let rr = zone.lookup(&domain("www.example.com.")).unwrap();
        assert_eq!(domain("www.example.com."), rr.name);
        assert_eq!(RecordType::A, rr.rtype);
        assert_eq!(RecordClass::IN, rr.rclass);
        assert_eq!(ZONE_TTL, rr.ttl);
        assert_eq!(&[93, 184, 216, 34], rr.rdata.as_ref());

        assert_eq!(
            Some(Ipv4Addr::new(10, 0, 0, 1)),
            zone.lookup(&domain("mail.example.com."))
                .and_then(ResourceRecord::address)
        );
    }

    #[test]
    fn skips_blanks_and_comments() {
        let zone = ZoneStore::deserialise(
            "; a comment\n\n   \n  ; indented comment\nwww.example.com. IN A 1.2.3.4 ; trailing\n",
        )
        .unwrap();

        assert_eq!(1, zone.len());
    }

    #[test]
    fn empty_input_is_empty_zone() {
        assert!(ZoneStore::deserialise("").unwrap().is_empty());
    }

    #[test]
    fn missing_fields_report_line() {
        assert_eq!(
            Err(Error::MissingField {
                line: 2,
                expected: "record type"
            }),
            ZoneStore::deserialise("; header\nwww.example.com. IN\n")
        );
        assert_eq!(
            Err(Error::MissingField {
                line: 1,
                expected: "IP address"
            }),
            ZoneStore::deserialise("www.example.com. IN A ; 1.2.3.4\n")
        );
    }

    #[test]
    fn trailing_field_is_an_error() {
        assert_eq!(
            Err(Error::TrailingField {
                line: 1,
                field: "extra".into()
            }),
            ZoneStore::deserialise("www.example.com. IN A 1.2.3.4 extra\n")
        );
    }

    #[test]
    fn unsupported_class_or_type_is_not_implemented() {
        assert_eq!(
            Err(Error::NotImplemented {
                line: 1,
                class: "CH".into(),
                rtype: "A".into()
            }),
            ZoneStore::deserialise("www.example.com. CH A 1.2.3.4\n")
        );
        assert_eq!(
            Err(Error::NotImplemented {
                line: 3,
                class: "IN".into(),
                rtype: "MX".into()
            }),
            ZoneStore::deserialise("\n\nexample.com. IN MX 1.2.3.4\n")
        );
    }

    #[test]
    fn class_and_type_must_be_spelled_in_a() {
        assert_eq!(
            Err(Error::NotImplemented {
                line: 1,
                class: "CLASS1".into(),
                rtype: "TYPE1".into()
            }),
            ZoneStore::deserialise("www.example.com. CLASS1 TYPE1 1.2.3.4\n")
        );
        assert_eq!(
            Err(Error::NotImplemented {
                line: 1,
                class: "in".into(),
                rtype: "a".into()
            }),
            ZoneStore::deserialise("www.example.com. in a 1.2.3.4\n")
        );
    }

    #[test]
    fn bad_address_is_an_error() {
        let err = ZoneStore::deserialise("www.example.com. IN A 1.2.3\n").unwrap_err();
        assert_eq!(
            Error::BadAddress {
                line: 1,
                address: "1.2.3".into()
            },
            err
        );
        assert_eq!(1, err.line());

        assert!(matches!(
            ZoneStore::deserialise("www.example.com. IN A ::1\n"),
            Err(Error::BadAddress { .. })
        ));
    }

    #[test]
    fn bad_name_is_an_error() {
        assert_eq!(
            Err(Error::BadName {
                line: 1,
                name: "www..com.".into()
            }),
            ZoneStore::deserialise("www..com. IN A 1.2.3.4\n")
        );
    }
}
