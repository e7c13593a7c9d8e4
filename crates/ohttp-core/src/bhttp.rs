//! Known-length binary HTTP codec for inner messages
//!
//! Implements the known-length request/response forms: a framing indicator,
//! variable-length-integer prefixed control data and field sections, then
//! content. Messages truncated after a complete section decode with the
//! remaining sections empty; trailing padding must be zero bytes.

use http::{Method, StatusCode};

use crate::error::Error;

const FRAMING_REQUEST: u64 = 0;
const FRAMING_RESPONSE: u64 = 1;

const VARINT_MAX: u64 = (1 << 62) - 1;

fn write_varint(out: &mut Vec<u8>, v: u64) {
    debug_assert!(v <= VARINT_MAX);
    if v < 1 << 6 {
        out.push(v as u8);
    } else if v < 1 << 14 {
        out.extend_from_slice(&((v as u16) | 0x4000).to_be_bytes());
    } else if v < 1 << 30 {
        out.extend_from_slice(&((v as u32) | 0x8000_0000).to_be_bytes());
    } else {
        out.extend_from_slice(&(v | 0xC000_0000_0000_0000).to_be_bytes());
    }
}

fn read_varint(input: &mut &[u8]) -> Result<u64, Error> {
    let first = *input.first().ok_or_else(|| Error::format("truncated varint"))?;
    let len = 1usize << (first >> 6);
    if input.len() < len {
        return Err(Error::format("truncated varint"));
    }
    let (head, rest) = input.split_at(len);
    *input = rest;

    let mut v = u64::from(first & 0x3F);
    for byte in &head[1..] {
        v = (v << 8) | u64::from(*byte);
    }
    Ok(v)
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn read_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], Error> {
    let len = read_varint(input)? as usize;
    if input.len() < len {
        return Err(Error::format("truncated length-prefixed field"));
    }
    let (bytes, rest) = input.split_at(len);
    *input = rest;
    Ok(bytes)
}

fn read_string(input: &mut &[u8]) -> Result<String, Error> {
    String::from_utf8(read_bytes(input)?.to_vec())
        .map_err(|_| Error::format("non-UTF-8 control data"))
}

fn write_field_section(out: &mut Vec<u8>, fields: &[(String, Vec<u8>)]) {
    let mut section = Vec::new();
    for (name, value) in fields {
        write_bytes(&mut section, name.as_bytes());
        write_bytes(&mut section, value);
    }
    write_bytes(out, &section);
}

fn read_field_section(input: &mut &[u8]) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let mut section = read_bytes(input)?;
    let mut fields = Vec::new();
    while !section.is_empty() {
        let name = String::from_utf8(read_bytes(&mut section)?.to_vec())
            .map_err(|_| Error::format("non-UTF-8 field name"))?;
        let value = read_bytes(&mut section)?.to_vec();
        fields.push((name, value));
    }
    Ok(fields)
}

/// Consume an optional trailer section and any zero padding.
fn finish_message(input: &mut &[u8]) -> Result<(), Error> {
    if !input.is_empty() {
        read_field_section(input)?;
    }
    if input.iter().any(|b| *b != 0) {
        return Err(Error::format("non-zero message padding"));
    }
    Ok(())
}

/// A decoded inner HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRequest {
    pub method: Method,
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl BinaryRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, FRAMING_REQUEST);
        write_bytes(&mut out, self.method.as_str().as_bytes());
        write_bytes(&mut out, self.scheme.as_bytes());
        write_bytes(&mut out, self.authority.as_bytes());
        write_bytes(&mut out, self.path.as_bytes());
        write_field_section(&mut out, &self.headers);
        write_bytes(&mut out, &self.body);
        write_varint(&mut out, 0); // empty trailer section
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut input = bytes;
        if read_varint(&mut input)? != FRAMING_REQUEST {
            return Err(Error::format("not a known-length request"));
        }

        let method_bytes = read_bytes(&mut input)?;
        let method = Method::from_bytes(method_bytes)
            .map_err(|_| Error::format("invalid request method"))?;
        let scheme = read_string(&mut input)?;
        let authority = read_string(&mut input)?;
        let path = read_string(&mut input)?;

        let headers = if input.is_empty() {
            Vec::new()
        } else {
            read_field_section(&mut input)?
        };
        let body = if input.is_empty() {
            Vec::new()
        } else {
            read_bytes(&mut input)?.to_vec()
        };
        finish_message(&mut input)?;

        Ok(Self {
            method,
            scheme,
            authority,
            path,
            headers,
            body,
        })
    }

    /// The host this request addresses: the authority when present, falling
    /// back to a `Host` header.
    pub fn host(&self) -> Option<String> {
        if !self.authority.is_empty() {
            return Some(self.authority.clone());
        }
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .and_then(|(_, value)| String::from_utf8(value.clone()).ok())
    }
}

/// A decoded (or to-be-encoded) inner HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

impl BinaryResponse {
    /// A bare response with no headers, used for sealed inner failures.
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, FRAMING_RESPONSE);
        write_varint(&mut out, u64::from(self.status.as_u16()));
        write_field_section(&mut out, &self.headers);
        write_bytes(&mut out, &self.body);
        write_varint(&mut out, 0); // empty trailer section
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut input = bytes;
        if read_varint(&mut input)? != FRAMING_RESPONSE {
            return Err(Error::format("not a known-length response"));
        }

        let status_code = read_varint(&mut input)?;
        let status = u16::try_from(status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Error::format("invalid response status"))?;

        let headers = if input.is_empty() {
            Vec::new()
        } else {
            read_field_section(&mut input)?
        };
        let body = if input.is_empty() {
            Vec::new()
        } else {
            read_bytes(&mut input)?.to_vec()
        };
        finish_message(&mut input)?;

        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> BinaryRequest {
        BinaryRequest {
            method: Method::POST,
            scheme: "https".to_string(),
            authority: "target.example".to_string(),
            path: "/resource?q=1".to_string(),
            headers: vec![
                ("content-type".to_string(), b"application/json".to_vec()),
                ("x-request-id".to_string(), b"abc123".to_vec()),
            ],
            body: b"{\"hello\":true}".to_vec(),
        }
    }

    #[test]
    fn test_request_round_trip() {
        let req = sample_request();
        assert_eq!(BinaryRequest::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn test_response_round_trip() {
        let resp = BinaryResponse {
            status: StatusCode::FORBIDDEN,
            headers: vec![("content-length".to_string(), b"0".to_vec())],
            body: Vec::new(),
        };
        assert_eq!(BinaryResponse::decode(&resp.encode()).unwrap(), resp);
    }

    #[test]
    fn test_varint_boundaries() {
        for len in [0usize, 63, 64, 16_383, 16_384] {
            let req = BinaryRequest {
                body: vec![0x5A; len],
                ..sample_request()
            };
            assert_eq!(BinaryRequest::decode(&req.encode()).unwrap().body.len(), len);
        }
    }

    #[test]
    fn test_truncation_yields_empty_sections() {
        // Control data only: headers, body and trailers all absent.
        let mut out = Vec::new();
        write_varint(&mut out, 0);
        write_bytes(&mut out, b"GET");
        write_bytes(&mut out, b"http");
        write_bytes(&mut out, b"example.com");
        write_bytes(&mut out, b"/");

        let req = BinaryRequest::decode(&out).unwrap();
        assert_eq!(req.method, Method::GET);
        assert!(req.headers.is_empty());
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_wrong_framing_rejected() {
        let req = sample_request().encode();
        assert!(BinaryResponse::decode(&req).is_err());

        let resp = BinaryResponse::new(StatusCode::OK, Vec::new()).encode();
        assert!(BinaryRequest::decode(&resp).is_err());
    }

    #[test]
    fn test_padding_must_be_zero() {
        let mut bytes = sample_request().encode();
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(BinaryRequest::decode(&bytes).is_ok());

        bytes.push(1);
        assert!(BinaryRequest::decode(&bytes).is_err());
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(BinaryRequest::decode(&[]).is_err());

        // Field length runs past the end of the message.
        let mut out = Vec::new();
        write_varint(&mut out, 0);
        write_varint(&mut out, 40);
        out.extend_from_slice(b"GET");
        assert!(BinaryRequest::decode(&out).is_err());

        // Status code out of range.
        let mut out = Vec::new();
        write_varint(&mut out, 1);
        write_varint(&mut out, 99);
        assert!(BinaryResponse::decode(&out).is_err());
    }

    #[test]
    fn test_host_prefers_authority() {
        let mut req = sample_request();
        assert_eq!(req.host().as_deref(), Some("target.example"));

        req.authority.clear();
        req.headers.push(("Host".to_string(), b"fallback.example".to_vec()));
        assert_eq!(req.host().as_deref(), Some("fallback.example"));

        req.headers.clear();
        assert_eq!(req.host(), None);
    }
}
