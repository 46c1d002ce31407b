//! HPACK header compression adapter
//!
//! Wraps the `hpack` crate's `Encoder`/`Decoder` pair so that one dynamic
//! table per direction is shared across every stream of a connection, and
//! layers on the header validation HTTP/2 requires on top of plain HPACK:
//! lowercase field names, pseudo-headers before regular fields, and the
//! RFC 7230 field-value octet rule.

use crate::error::{Error, Result};
use bytes::Bytes;
use hpack::{Decoder as HpackDecoder, Encoder as HpackEncoder};

/// A decoded header list, split into HTTP/2 pseudo-headers and regular
/// fields.
#[derive(Debug, Clone, Default)]
pub struct HeaderList {
    /// `:method`
    pub method: Option<String>,
    /// `:scheme`
    pub scheme: Option<String>,
    /// `:authority`
    pub authority: Option<String>,
    /// `:path`
    pub path: Option<String>,
    /// `:status` (responses only)
    pub status: Option<u16>,
    /// Regular fields, in wire order
    pub fields: Vec<(String, String)>,
}

impl HeaderList {
    /// Look up the first regular field with this name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared-table HPACK coding context for one connection.
///
/// Both directions of a connection must pass every header block through
/// the same context, in wire order, or the dynamic tables fall out of
/// sync and decoding fails with COMPRESSION_ERROR.
pub struct HpackContext {
    encoder: HpackEncoder<'static>,
    decoder: HpackDecoder<'static>,
}

impl HpackContext {
    /// Create a context with the protocol-default 4096 byte tables
    pub fn new() -> Self {
        HpackContext {
            encoder: HpackEncoder::new(),
            decoder: HpackDecoder::new(),
        }
    }

    /// Bound the decode-side dynamic table, from the peer-acknowledged
    /// SETTINGS_HEADER_TABLE_SIZE.
    pub fn set_max_table_size(&mut self, size: u32) {
        self.decoder.set_max_table_size(size as usize);
    }

    /// Encode a header list into a header block fragment.
    ///
    /// Names are lowercased on the way in; HTTP/2 forbids uppercase field
    /// names (RFC 7540 Section 8.1.2).
    pub fn encode(&mut self, headers: &[(&str, &str)]) -> Result<Bytes> {
        let mut lowered: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            validate_header_value(value.as_bytes())?;
            lowered.push((
                name.to_ascii_lowercase().into_bytes(),
                value.as_bytes().to_vec(),
            ));
        }

        let mut block = Vec::new();
        self.encoder
            .encode_into(
                lowered.iter().map(|(n, v)| (n.as_slice(), v.as_slice())),
                &mut block,
            )
            .map_err(|e| Error::Internal(format!("HPACK encode error: {}", e)))?;

        Ok(Bytes::from(block))
    }

    /// Decode a complete header block into a validated [`HeaderList`].
    ///
    /// Enforces Section 8.1.2: lowercase names, known pseudo-headers only,
    /// no pseudo-header after a regular field, no duplicate pseudo-headers.
    pub fn decode(&mut self, block: &[u8]) -> Result<HeaderList> {
        let raw = self
            .decoder
            .decode(block)
            .map_err(|e| Error::Compression(format!("HPACK decode error: {:?}", e)))?;

        let mut list = HeaderList::default();
        let mut seen_regular = false;

        for (name_bytes, value_bytes) in raw {
            let name = String::from_utf8(name_bytes)
                .map_err(|_| Error::InvalidHeader("header name not UTF-8".to_string()))?;
            validate_header_name(name.as_bytes())?;
            validate_header_value(&value_bytes)?;
            let value = String::from_utf8_lossy(&value_bytes).to_string();

            if let Some(pseudo) = name.strip_prefix(':') {
                if seen_regular {
                    return Err(Error::InvalidHeader(format!(
                        "pseudo-header :{} after regular field",
                        pseudo
                    )));
                }
                let slot = match pseudo {
                    "method" => &mut list.method,
                    "scheme" => &mut list.scheme,
                    "authority" => &mut list.authority,
                    "path" => &mut list.path,
                    "status" => {
                        if list.status.is_some() {
                            return Err(Error::InvalidHeader(
                                "duplicate :status pseudo-header".to_string(),
                            ));
                        }
                        let code = value.parse::<u16>().map_err(|_| {
                            Error::InvalidHeader(format!("invalid :status value {:?}", value))
                        })?;
                        list.status = Some(code);
                        continue;
                    }
                    other => {
                        return Err(Error::InvalidHeader(format!(
                            "unknown pseudo-header :{}",
                            other
                        )));
                    }
                };
                if slot.is_some() {
                    return Err(Error::InvalidHeader(format!(
                        "duplicate :{} pseudo-header",
                        pseudo
                    )));
                }
                *slot = Some(value);
            } else {
                seen_regular = true;
                list.fields.push((name, value));
            }
        }

        Ok(list)
    }
}

impl Default for HpackContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a field name: non-empty, lowercase, no separators.
fn validate_header_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidHeader("empty header name".to_string()));
    }
    for &b in name {
        if b.is_ascii_uppercase() {
            return Err(Error::InvalidHeader(
                "uppercase character in header name".to_string(),
            ));
        }
        // token chars plus ':' for pseudo-headers
        if b <= b' ' || b == b'(' || b == b')' || b == b',' || b == b'/' || b >= 0x7f {
            return Err(Error::InvalidHeader(format!(
                "invalid octet 0x{:02x} in header name",
                b
            )));
        }
    }
    Ok(())
}

/// Validate a field value against the RFC 7230 field-content rule:
/// visible ASCII, space and horizontal tab only. Control octets would let
/// a value smuggle a CRLF into a downstream HTTP/1 hop.
fn validate_header_value(value: &[u8]) -> Result<()> {
    for &b in value {
        if !b.is_ascii() {
            return Err(Error::InvalidHeader(format!(
                "non-ASCII octet 0x{:02x} in header value",
                b
            )));
        }
        if (b < b' ' || b > b'~') && b != b'\t' {
            return Err(Error::InvalidHeader(format!(
                "control octet 0x{:02x} in header value",
                b
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx
            .encode(&[
                (":method", "GET"),
                (":scheme", "https"),
                (":path", "/index.html"),
                (":authority", "example.com"),
                ("accept", "text/html"),
            ])
            .unwrap();

        let list = dec_ctx.decode(&block).unwrap();
        assert_eq!(list.method.as_deref(), Some("GET"));
        assert_eq!(list.scheme.as_deref(), Some("https"));
        assert_eq!(list.path.as_deref(), Some("/index.html"));
        assert_eq!(list.authority.as_deref(), Some("example.com"));
        assert_eq!(list.get("accept"), Some("text/html"));
    }

    #[test]
    fn test_dynamic_table_carries_across_blocks() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block1 = enc_ctx
            .encode(&[("x-request-id", "abc-123"), ("accept", "*/*")])
            .unwrap();
        let block2 = enc_ctx
            .encode(&[("x-request-id", "abc-123"), ("accept", "*/*")])
            .unwrap();

        // The second block reuses the dynamic table, so it must be smaller
        assert!(block2.len() < block1.len());

        let list1 = dec_ctx.decode(&block1).unwrap();
        let list2 = dec_ctx.decode(&block2).unwrap();
        assert_eq!(list1.get("x-request-id"), Some("abc-123"));
        assert_eq!(list2.get("x-request-id"), Some("abc-123"));
    }

    #[test]
    fn test_encode_lowercases_names() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx.encode(&[("Content-Type", "text/plain")]).unwrap();
        let list = dec_ctx.decode(&block).unwrap();
        assert_eq!(list.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_status_pseudo_header() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx
            .encode(&[(":status", "204"), ("server", "h2wire")])
            .unwrap();
        let list = dec_ctx.decode(&block).unwrap();
        assert_eq!(list.status, Some(204));
        assert_eq!(list.get("server"), Some("h2wire"));
    }

    #[test]
    fn test_pseudo_after_regular_rejected() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx
            .encode(&[("accept", "*/*"), (":method", "GET")])
            .unwrap();
        let err = dec_ctx.decode(&block).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_unknown_pseudo_header_rejected() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx.encode(&[(":bogus", "1")]).unwrap();
        let err = dec_ctx.decode(&block).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_duplicate_pseudo_header_rejected() {
        let mut enc_ctx = HpackContext::new();
        let mut dec_ctx = HpackContext::new();

        let block = enc_ctx
            .encode(&[(":method", "GET"), (":method", "POST")])
            .unwrap();
        let err = dec_ctx.decode(&block).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_header_value_octet_rule() {
        assert!(validate_header_value(b"plain value").is_ok());
        assert!(validate_header_value(b"tab\tseparated").is_ok());
        assert!(validate_header_value(b"crlf\r\ninjection").is_err());
        assert!(validate_header_value(&[0x80]).is_err());
    }

    #[test]
    fn test_header_name_rules() {
        assert!(validate_header_name(b"content-length").is_ok());
        assert!(validate_header_name(b":authority").is_ok());
        assert!(validate_header_name(b"Content-Length").is_err());
        assert!(validate_header_name(b"").is_err());
        assert!(validate_header_name(b"bad name").is_err());
    }

    #[test]
    fn test_encode_rejects_bad_value() {
        let mut ctx = HpackContext::new();
        let err = ctx.encode(&[("x-bad", "a\r\nb")]).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }
}
