//! `Signature` header parser.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

use crate::error::{AttestationError, Result};

/// Standard-alphabet base64 that accepts input with or without `=` padding.
const SIGNATURE_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A parsed `Signature` header entry.
#[derive(Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    label: String,
    signature_bytes: Vec<u8>,
}

impl ParsedSignature {
    /// Signature label, e.g. `sig1`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw signature bytes decoded from the byte-sequence token.
    #[must_use]
    pub fn signature_bytes(&self) -> &[u8] {
        &self.signature_bytes
    }
}

impl std::fmt::Debug for ParsedSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedSignature")
            .field("label", &self.label)
            .field("signature_len", &self.signature_bytes.len())
            .finish()
    }
}

/// Strict parser for single-label `Signature` headers of the form
/// `label=:<base64>:`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureHeaderParser;

impl SignatureHeaderParser {
    /// Parses a raw `Signature` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::InvalidSignatureHeader`] when the header is
    /// blank, carries more than one label, is not a byte sequence, is missing
    /// its closing `:`, has trailing content, or holds invalid base64.
    ///
    /// # Examples
    ///
    /// ```
    /// use agent_attestation::rfc9421::SignatureHeaderParser;
    ///
    /// let parsed = SignatureHeaderParser::parse_single("sig1=:AQID:")?;
    /// assert_eq!(parsed.label(), "sig1");
    /// assert_eq!(parsed.signature_bytes(), &[1, 2, 3]);
    /// # Ok::<(), agent_attestation::AttestationError>(())
    /// ```
    pub fn parse_single(header: &str) -> Result<ParsedSignature> {
        let raw = header.trim();
        if raw.is_empty() {
            return Err(invalid("Signature is required"));
        }

        // base64 never contains ',', so any comma separates labels
        if raw.contains(',') {
            return Err(invalid("multiple Signature labels are not supported"));
        }

        let (label, rest) = raw.split_once('=').ok_or_else(|| invalid("invalid Signature format"))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(invalid("Signature label is required"));
        }

        let body = rest
            .trim()
            .strip_prefix(':')
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("Signature value must be a byte sequence"))?;

        let (encoded, trailing) =
            body.split_once(':').ok_or_else(|| invalid("unterminated signature byte sequence"))?;

        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(invalid("signature bytes must not be empty"));
        }
        if !trailing.trim().is_empty() {
            return Err(invalid("invalid trailing content in Signature header"));
        }

        let signature_bytes = SIGNATURE_B64
            .decode(encoded)
            .map_err(|_| invalid("invalid base64 in Signature header"))?;

        Ok(ParsedSignature { label: label.to_owned(), signature_bytes })
    }
}

fn invalid(message: &str) -> AttestationError {
    AttestationError::InvalidSignatureHeader(message.to_owned())
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    fn err_message(header: &str) -> String {
        SignatureHeaderParser::parse_single(header).unwrap_err().to_string().to_lowercase()
    }

    #[test]
    fn test_parse_valid_signature() {
        let payload = b"hello-signature";
        let header = format!("sig1=:{}:", STANDARD.encode(payload));

        let parsed = SignatureHeaderParser::parse_single(&header).unwrap();
        assert_eq!(parsed.label(), "sig1");
        assert_eq!(parsed.signature_bytes(), payload);
    }

    #[test]
    fn test_unpadded_base64_accepted() {
        let parsed = SignatureHeaderParser::parse_single("sig1=:aGk:").unwrap();
        assert_eq!(parsed.signature_bytes(), b"hi");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let parsed = SignatureHeaderParser::parse_single("  sig1 = :aGk=:  ").unwrap();
        assert_eq!(parsed.label(), "sig1");
    }

    #[test]
    fn test_multiple_labels_rejected() {
        assert!(err_message("sig1=:aGk=:, sig2=:aGk=:").contains("multiple"));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(err_message("sig1=:not*base64!:").contains("base64"));
    }

    #[test]
    fn test_missing_byte_sequence_rejected() {
        assert!(err_message("sig1=aGk=").contains("byte sequence"));
        assert!(err_message("sig1=:").contains("byte sequence"));
    }

    #[test]
    fn test_unterminated_byte_sequence_rejected() {
        assert!(err_message("sig1=:aGk=").contains("unterminated"));
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(err_message("sig1=::").contains("must not be empty"));
    }

    #[test]
    fn test_trailing_content_rejected() {
        assert!(err_message("sig1=:aGk=:;extra").contains("trailing"));
    }

    #[test]
    fn test_blank_and_unlabelled_rejected() {
        assert!(err_message("").contains("required"));
        assert!(err_message("=:aGk=:").contains("label is required"));
        assert!(err_message("sig1").contains("invalid signature format"));
    }

    #[test]
    fn test_debug_does_not_print_signature_bytes() {
        let parsed = SignatureHeaderParser::parse_single("sig1=:aGk=:").unwrap();
        let debug = format!("{parsed:?}");
        assert!(debug.contains("signature_len: 2"));
        assert!(!debug.contains("104"));
    }
}
