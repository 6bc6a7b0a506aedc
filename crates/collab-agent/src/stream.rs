/// Parse a single SSE line. SSE format: `event: <type>\ndata: <json>\n\n`.
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_line() {
        match parse_sse_line("event: message_start") {
            Some(SseParsed::Event(e)) => assert_eq!(e, "message_start"),
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn parses_data_line() {
        match parse_sse_line("data: {\"a\":1}") {
            Some(SseParsed::Data(d)) => assert_eq!(d, "{\"a\":1}"),
            _ => panic!("expected data"),
        }
    }

    #[test]
    fn ignores_unrelated_line() {
        assert!(parse_sse_line("id: 5").is_none());
    }
}
