use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::{Details, Protocol};
use serde_json::json;
use std::fmt::Write;

/// Methods a request is sent with
pub const METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS"];

/// Paths commonly exposed by embedded web interfaces
pub const PATHS: [&str; 6] = ["/", "/admin", "/api", "/debug", "/test", "/config"];

const RANDOM_STRING_LEN: usize = 16;

/// Builds HTTP/1.1 requests with spoofed headers and a random JSON body.
#[derive(Debug, Clone)]
pub struct HttpEncoder {
    host: String,
}

impl HttpEncoder {
    /// `host` is sent as `Host` header, usually `target:port`
    #[must_use]
    pub fn new(host: String) -> Self {
        Self { host }
    }
}

impl Encoder for HttpEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        let method = *mutator.choose(&METHODS);
        let path = *mutator.choose(&PATHS);

        let headers = [
            ("User-Agent", mutator.gen_string(RANDOM_STRING_LEN)),
            ("Content-Type", "application/json".to_owned()),
            ("X-Forwarded-For", mutator.gen_ipv4().to_string()),
            (
                "Authorization",
                format!("Bearer {}", mutator.gen_string(RANDOM_STRING_LEN)),
            ),
        ];

        let id = mutator.gen_range_inclusive(1, 1000);
        let name = mutator.gen_string(RANDOM_STRING_LEN);
        let value = mutator.gen_unit_f64();
        let data: Vec<String> = (0..3)
            .map(|_| mutator.gen_string(RANDOM_STRING_LEN))
            .collect();
        let body = serde_json::to_string(&json!({
            "id": id,
            "name": name,
            "value": value,
            "data": data,
        }))?;

        let mut request = format!("{method} {path} HTTP/1.1\r\nHost: {}\r\n", self.host);
        for (key, value) in &headers {
            let _ = write!(request, "{key}: {value}\r\n");
        }
        let _ = write!(request, "Content-Length: {}\r\n\r\n", body.len());
        request.push_str(&body);

        assert_eq!(
            content_length(request.as_bytes()),
            Some(body.len()),
            "Content-Length does not match the body"
        );

        let mut details = Details::new();
        details.insert("method".into(), method.into());
        details.insert("path".into(), path.into());
        details.insert(
            "headers".into(),
            headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), serde_json::Value::from(v.as_str())))
                .collect::<serde_json::Map<_, _>>()
                .into(),
        );
        details.insert("content_length".into(), body.len().into());

        Ok(Encoded {
            bytes: request.into_bytes(),
            details,
        })
    }
}

/// Returns the declared `Content-Length` of a request if it carries a complete body
#[must_use]
pub fn content_length(request: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(request).ok()?;
    let (head, body) = text.split_once("\r\n\r\n")?;
    let declared = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())?;
    (declared == body.len()).then_some(declared)
}
