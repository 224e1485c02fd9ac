use crate::protocol::wire_types::*;
use crate::zones::ZoneStore;

/// Decode a datagram and build the reply to send back, if any.
///
/// A datagram which does not decode, or which has octets left over
/// after the message, gets a `FormatError` reply if its ID can be
/// recovered.  Otherwise it is dropped, and this returns `None`.  The
/// reply copies the opcode when the datagram is long enough to have
/// one.
pub fn handle_raw_message(octets: &[u8], zone: &ZoneStore) -> Option<Message> {
    match Message::from_octets(octets) {
        Ok(query) => {
            if query.header.is_response {
                tracing::debug!(id = query.header.id, "got response, not query");
                Some(Message::make_format_error_response(
                    query.header.id,
                    query.header.opcode,
                ))
            } else {
                Some(respond(&query, zone))
            }
        }
        Err(error) => {
            tracing::debug!(%error, "could not decode message");
            let opcode = Opcode::peek(octets).unwrap_or(Opcode::Standard);
            error
                .id()
                .map(|id| Message::make_format_error_response(id, opcode))
        }
    }
}

/// Answer a query from the zone.
///
/// Every question must be for an `IN A` record: the first one which
/// is not fails the whole reply with `NotImplemented`, dropping any
/// answers found for earlier questions.  A name which is not in the
/// zone contributes no answer and is not an error.
pub fn respond(query: &Message, zone: &ZoneStore) -> Message {
    let mut response = query.make_response();

    for question in &query.questions {
        if !is_supported(question) {
            tracing::debug!(%question, "unsupported question");
            response.answers.clear();
            response.header.rcode = Rcode::NotImplemented;
            response.header.is_authoritative = false;
            return response;
        }

        match zone.lookup(&question.name) {
            Some(rr) => {
                tracing::trace!(%question, "found record");
                response.answers.push(rr.clone());
            }
            None => tracing::trace!(%question, "no record"),
        }
    }

    response.header.is_authoritative = !response.answers.is_empty();
    response
}

fn is_supported(question: &Question) -> bool {
    question.qtype == QueryType::Record(RecordType::A)
        && question.qclass == QueryClass::Record(RecordClass::IN)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::protocol::wire_types::test_util::*;
    use crate::zones::ZONE_TTL;

    fn example_zone() -> ZoneStore {
        ZoneStore::deserialise(
            "www.example.com. IN A 93.184.216.34\nmail.example.com. IN A 10.0.0.25\n",
        )
        .unwrap()
    }

    #[test]
    fn respond_answers_from_zone() {
        let mut query = Message::from_question(0xbeef, a_question("www.example.com."));
        query.header.recursion_desired = true;

        let response = respond(&query, &example_zone());

        assert_eq!(0xbeef, response.header.id);
        assert!(response.header.is_response);
        assert!(response.header.is_authoritative);
        assert!(response.header.recursion_desired);
        assert!(!response.header.recursion_available);
        assert_eq!(Rcode::NoError, response.header.rcode);
        assert_eq!(query.questions, response.questions);
        assert_eq!(1, response.answers.len());

        let rr = &response.answers[0];
        assert_eq!(
            vec![b"www".to_vec(), b"example".to_vec(), b"com".to_vec()],
            rr.name.labels
        );
        assert_eq!(RecordType::A, rr.rtype);
        assert_eq!(RecordClass::IN, rr.rclass);
        assert_eq!(ZONE_TTL, rr.ttl);
        assert_eq!(&[93, 184, 216, 34], rr.rdata.as_ref());
    }

    #[test]
    fn respond_answers_each_question_in_order() {
        let mut query = Message::from_question(1, a_question("mail.example.com."));
        query.questions.push(a_question("nope.example.com."));
        query.questions.push(a_question("www.example.com."));

        let response = respond(&query, &example_zone());

        assert_eq!(Rcode::NoError, response.header.rcode);
        assert_eq!(
            vec![
                Some(Ipv4Addr::new(10, 0, 0, 25)),
                Some(Ipv4Addr::new(93, 184, 216, 34))
            ],
            response
                .answers
                .iter()
                .map(ResourceRecord::address)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn respond_missing_name_is_empty_noerror() {
        let query = Message::from_question(2, a_question("missing.example.com."));

        let response = respond(&query, &example_zone());

        assert_eq!(Rcode::NoError, response.header.rcode);
        assert!(!response.header.is_authoritative);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn respond_disallowed_type_aborts_whole_message() {
        let mut query = Message::from_question(3, a_question("www.example.com."));
        query.questions.push(question(
            "www.example.com.",
            QueryType::Record(RecordType::MX),
            QueryClass::Record(RecordClass::IN),
        ));
        query.questions.push(a_question("mail.example.com."));

        let response = respond(&query, &example_zone());

        assert_eq!(3, response.header.id);
        assert_eq!(Rcode::NotImplemented, response.header.rcode);
        assert!(!response.header.is_authoritative);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn respond_disallowed_class_is_not_implemented() {
        for qclass in [
            QueryClass::Record(RecordClass::CH),
            QueryClass::Wildcard,
        ] {
            let query = Message::from_question(
                4,
                question("www.example.com.", QueryType::Record(RecordType::A), qclass),
            );

            let response = respond(&query, &example_zone());

            assert_eq!(Rcode::NotImplemented, response.header.rcode);
            assert!(response.answers.is_empty());
        }
    }

    #[test]
    fn respond_wildcard_type_is_not_implemented() {
        let query = Message::from_question(
            5,
            question(
                "www.example.com.",
                QueryType::Wildcard,
                QueryClass::Record(RecordClass::IN),
            ),
        );

        assert_eq!(
            Rcode::NotImplemented,
            respond(&query, &example_zone()).header.rcode
        );
    }

    #[test]
    fn respond_is_case_sensitive() {
        let query = Message::from_question(6, a_question("WWW.EXAMPLE.COM."));

        assert!(respond(&query, &example_zone()).answers.is_empty());
    }

    #[test]
    fn handle_raw_message_answers_query() {
        let query = Message::from_question(7, a_question("www.example.com."));
        let octets = query.to_octets().unwrap();

        let response = handle_raw_message(&octets, &example_zone()).unwrap();

        assert_eq!(respond(&query, &example_zone()), response);
    }

    #[test]
    fn handle_raw_message_trailing_garbage_is_format_error() {
        let query = Message::from_question(0x0102, a_question("www.example.com."));
        let mut octets = query.to_octets().unwrap().to_vec();
        octets.extend_from_slice(&[1, 2, 3]);

        let response = handle_raw_message(&octets, &example_zone()).unwrap();

        assert_eq!(
            Message::make_format_error_response(0x0102, Opcode::Standard),
            response
        );
    }

    #[test]
    fn handle_raw_message_truncated_is_format_error() {
        let query = Message::from_question(0x0304, a_question("www.example.com."));
        let octets = query.to_octets().unwrap();

        let response = handle_raw_message(&octets[..octets.len() - 1], &example_zone()).unwrap();

        assert_eq!(0x0304, response.header.id);
        assert_eq!(Rcode::FormatError, response.header.rcode);
        assert!(response.questions.is_empty());
        assert!(response.answers.is_empty());
    }

    #[test]
    fn handle_raw_message_format_error_keeps_opcode() {
        let mut query = Message::from_question(0x0506, a_question("www.example.com."));
        query.header.opcode = Opcode::Status;
        let mut octets = query.to_octets().unwrap().to_vec();
        octets.push(0);

        assert_eq!(
            Some(Message::make_format_error_response(0x0506, Opcode::Status)),
            handle_raw_message(&octets, &example_zone())
        );
    }

    #[test]
    fn handle_raw_message_short_header_keeps_opcode() {
        let octets = [0x05, 0x07, 0b0000_1000];

        assert_eq!(
            Some(Message::make_format_error_response(0x0507, Opcode::Inverse)),
            handle_raw_message(&octets, &example_zone())
        );
        assert_eq!(
            Some(Message::make_format_error_response(0x0507, Opcode::Standard)),
            handle_raw_message(&octets[..2], &example_zone())
        );
    }

    #[test]
    fn handle_raw_message_response_keeps_opcode() {
        let mut query = Message::from_question(9, a_question("www.example.com."));
        query.header.is_response = true;
        query.header.opcode = Opcode::Inverse;
        let octets = query.to_octets().unwrap();

        assert_eq!(
            Some(Message::make_format_error_response(9, Opcode::Inverse)),
            handle_raw_message(&octets, &example_zone())
        );
    }

    #[test]
    fn handle_raw_message_without_id_is_dropped() {
        assert_eq!(None, handle_raw_message(&[], &example_zone()));
        assert_eq!(None, handle_raw_message(&[0x12], &example_zone()));
    }

    #[test]
    fn handle_raw_message_response_is_format_error() {
        let mut query = Message::from_question(8, a_question("www.example.com."));
        query.header.is_response = true;
        let octets = query.to_octets().unwrap();

        assert_eq!(
            Some(Message::make_format_error_response(8, Opcode::Standard)),
            handle_raw_message(&octets, &example_zone())
        );
    }

    #[test]
    fn handle_raw_message_arbitrary_never_panics() {
        let zone = example_zone();
        for _ in 0..100 {
            let octets: Vec<u8> = arbitrary();
            if let Some(response) = handle_raw_message(&octets, &zone) {
                assert!(response.header.is_response);
            }
        }
    }
}
