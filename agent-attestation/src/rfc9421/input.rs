//! `Signature-Input` header model and parser.

use std::collections::HashMap;

use crate::error::{AttestationError, Result};

/// Signature parameters carried in a `Signature-Input` entry.
///
/// Every field is required and non-blank. Values can only be obtained from
/// [`SignatureInputParser::parse_single`], so a partially populated set of
/// parameters cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    key_id: String,
    alg: String,
    created: i64,
    expires: i64,
    nonce: String,
    tag: String,
}

impl SignatureParams {
    /// Key identifier (`keyid`).
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signature algorithm as sent by the agent (`alg`).
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// Creation time in epoch seconds (`created`).
    #[must_use]
    pub const fn created(&self) -> i64 {
        self.created
    }

    /// Expiry time in epoch seconds (`expires`).
    #[must_use]
    pub const fn expires(&self) -> i64 {
        self.expires
    }

    /// Per-signature replay nonce (`nonce`).
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Application tag (`tag`).
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// A single parsed `Signature-Input` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInput {
    label: String,
    covered_components: Vec<String>,
    params: SignatureParams,
}

impl SignatureInput {
    /// Signature label, e.g. `sig1`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Covered component identifiers in the order the agent listed them.
    #[must_use]
    pub fn covered_components(&self) -> &[String] {
        &self.covered_components
    }

    /// Signature parameters.
    #[must_use]
    pub const fn params(&self) -> &SignatureParams {
        &self.params
    }
}

/// Strict parser for single-label `Signature-Input` headers.
///
/// Accepted shape:
///
/// ```text
/// sig1=("@authority" "@path" "@signature-params");created=1700000000;expires=1700000480;keyid="k1";alg="ed25519";nonce="n-123";tag="t-1"
/// ```
///
/// Parameter values are bare tokens running to the next `;` or double-quoted
/// strings with `\"` and `\\` escapes. Unknown parameters are ignored; when a
/// parameter repeats, the last occurrence wins.
///
/// # Examples
///
/// ```
/// use agent_attestation::rfc9421::SignatureInputParser;
///
/// let input = SignatureInputParser::parse_single(
///     r#"sig1=("@authority" "@path" "@signature-params");created=1;expires=2;keyid="k1";alg="ed25519";nonce="n";tag="t""#,
/// )?;
/// assert_eq!(input.label(), "sig1");
/// assert_eq!(input.covered_components().len(), 3);
/// assert_eq!(input.params().key_id(), "k1");
/// # Ok::<(), agent_attestation::AttestationError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureInputParser;

impl SignatureInputParser {
    /// Parses a raw `Signature-Input` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::InvalidSignatureInput`] when the header is
    /// blank, carries more than one label, has an empty or malformed component
    /// list, has malformed parameters, lacks a required parameter, or carries
    /// a non-integer `created`/`expires`.
    pub fn parse_single(header: &str) -> Result<SignatureInput> {
        let raw = header.trim();
        if raw.is_empty() {
            return Err(invalid("Signature-Input is required"));
        }

        if contains_top_level_comma(raw) {
            return Err(invalid("multiple Signature-Input labels are not supported"));
        }

        let (label, rest) = raw
            .split_once('=')
            .ok_or_else(|| invalid("invalid Signature-Input format"))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(invalid("Signature label is required"));
        }

        let rest = rest.trim();
        if !rest.starts_with('(') {
            return Err(invalid("Signature-Input must start with component list"));
        }

        let close = find_matching_paren(rest).ok_or_else(|| invalid("unterminated component list"))?;
        let (components_part, params_part) = rest.split_at(close + 1);

        let covered_components = parse_components(components_part)?;
        let params = parse_params(params_part.trim())?;

        let key_id = require_param(&params, "keyid")?;
        let alg = require_param(&params, "alg")?;
        let created = parse_integer_param(&params, "created")?;
        let expires = parse_integer_param(&params, "expires")?;
        let nonce = require_param(&params, "nonce")?;
        let tag = require_param(&params, "tag")?;

        Ok(SignatureInput {
            label: label.to_owned(),
            covered_components,
            params: SignatureParams { key_id, alg, created, expires, nonce, tag },
        })
    }
}

fn invalid<M: Into<String>>(message: M) -> AttestationError {
    AttestationError::InvalidSignatureInput(message.into())
}

/// Returns `true` when `s` holds a comma outside quotes and parentheses.
pub(crate) fn contains_top_level_comma(s: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for c in s.chars() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Byte index of the `)` closing the `(` at index 0, skipping quoted text.
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for (i, c) in s.char_indices() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reads a quoted string starting at the opening quote of `s`.
///
/// Returns the unescaped value and the remainder after the closing quote, or
/// `None` when the quote is never closed.
#[allow(clippy::string_slice, reason = "index comes from char_indices and is a char boundary")]
fn read_quoted(s: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut escaped = false;

    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((value, &s[i + c.len_utf8()..]));
        } else {
            value.push(c);
        }
    }
    None
}

fn parse_components(part: &str) -> Result<Vec<String>> {
    let inner = part
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| invalid("invalid component list"))?
        .trim();

    if inner.is_empty() {
        return Err(invalid("component list must not be empty"));
    }

    let mut components = Vec::new();
    let mut rest = inner;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if !rest.starts_with('"') {
            return Err(invalid("component must be a quoted string"));
        }
        let (value, remainder) =
            read_quoted(rest).ok_or_else(|| invalid("unterminated component quote"))?;
        if value.trim().is_empty() {
            return Err(invalid("component must not be blank"));
        }
        components.push(value);
        rest = remainder;
    }

    Ok(components)
}

#[allow(clippy::string_slice, reason = "indices come from str::find on ASCII delimiters")]
fn parse_params(part: &str) -> Result<HashMap<String, String>> {
    if part.is_empty() {
        return Err(invalid("signature parameters are required"));
    }

    let mut params = HashMap::new();
    let mut rest = part;
    while !rest.is_empty() {
        rest = rest
            .strip_prefix(';')
            .ok_or_else(|| invalid("signature parameters must start with ';'"))?;

        let eq = rest
            .find(['=', ';'])
            .filter(|&i| rest[i..].starts_with('='))
            .ok_or_else(|| invalid("invalid signature parameter"))?;

        let key = rest[..eq].trim().to_lowercase();
        if key.is_empty() {
            return Err(invalid("parameter name is required"));
        }
        rest = &rest[eq + 1..];

        let value = if rest.starts_with('"') {
            let (value, remainder) =
                read_quoted(rest).ok_or_else(|| invalid("unterminated quoted parameter"))?;
            rest = remainder;
            value
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            let value = rest[..end].trim().to_owned();
            rest = &rest[end..];
            value
        };

        if value.is_empty() {
            return Err(invalid(format!("parameter value is required: {key}")));
        }
        params.insert(key, value);
    }

    Ok(params)
}

fn require_param(params: &HashMap<String, String>, name: &str) -> Result<String> {
    params
        .get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| invalid(format!("missing required signature parameter: {name}")))
}

fn parse_integer_param(params: &HashMap<String, String>, name: &str) -> Result<i64> {
    require_param(params, name)?
        .parse::<i64>()
        .map_err(|_| invalid(format!("invalid numeric signature parameter: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "sig1=(\"@authority\" \"@path\" \"@signature-params\");\
                         created=1700000000;expires=1700000480;\
                         keyid=\"dev-ed25519-1\";alg=\"ed25519\";nonce=\"n-123\";tag=\"t-1\"";

    fn err_message(header: &str) -> String {
        SignatureInputParser::parse_single(header).unwrap_err().to_string().to_lowercase()
    }

    #[test]
    fn test_parse_valid_header() {
        let input = SignatureInputParser::parse_single(VALID).unwrap();

        assert_eq!(input.label(), "sig1");
        assert_eq!(input.covered_components(), ["@authority", "@path", "@signature-params"]);

        let params = input.params();
        assert_eq!(params.key_id(), "dev-ed25519-1");
        assert_eq!(params.alg(), "ed25519");
        assert_eq!(params.created(), 1_700_000_000);
        assert_eq!(params.expires(), 1_700_000_480);
        assert_eq!(params.nonce(), "n-123");
        assert_eq!(params.tag(), "t-1");
    }

    #[test]
    fn test_component_order_preserved() {
        let header = "sig1=(\"@signature-params\" \"@path\" \"@authority\");created=1;expires=2;\
                      keyid=\"k\";alg=\"ed25519\";nonce=\"n\";tag=\"t\"";
        let input = SignatureInputParser::parse_single(header).unwrap();
        assert_eq!(input.covered_components(), ["@signature-params", "@path", "@authority"]);
    }

    #[test]
    fn test_multiple_labels_rejected() {
        let header = format!("{VALID}, {}", VALID.replace("sig1", "sig2"));
        assert!(err_message(&header).contains("multiple"));
    }

    #[test]
    fn test_comma_inside_quotes_is_not_a_label_separator() {
        let header = VALID.replace("n-123", "n,123");
        let input = SignatureInputParser::parse_single(&header).unwrap();
        assert_eq!(input.params().nonce(), "n,123");
    }

    #[test]
    fn test_missing_required_param_rejected() {
        let header = VALID.replace(";nonce=\"n-123\"", "");
        let message = err_message(&header);
        assert!(message.contains("missing required signature parameter: nonce"), "{message}");
    }

    #[test]
    fn test_every_required_param_is_enforced() {
        for (name, fragment) in [
            ("keyid", ";keyid=\"dev-ed25519-1\""),
            ("alg", ";alg=\"ed25519\""),
            ("created", ";created=1700000000"),
            ("expires", ";expires=1700000480"),
            ("tag", ";tag=\"t-1\""),
        ] {
            let message = err_message(&VALID.replace(fragment, ""));
            assert!(message.contains(&format!("missing required signature parameter: {name}")));
        }
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let header = VALID.replace("created=1700000000", "created=yesterday");
        assert!(err_message(&header).contains("invalid numeric signature parameter: created"));

        let header = VALID.replace("expires=1700000480", "expires=\"1.5\"");
        assert!(err_message(&header).contains("invalid numeric signature parameter: expires"));
    }

    #[test]
    fn test_blank_header_rejected() {
        assert!(err_message("   ").contains("required"));
    }

    #[test]
    fn test_missing_label_rejected() {
        let header = VALID.replacen("sig1", "", 1);
        assert!(err_message(&header).contains("label is required"));
    }

    #[test]
    fn test_component_list_required() {
        let header = VALID.replacen('(', "", 1);
        assert!(err_message(&header).contains("component list"));
    }

    #[test]
    fn test_empty_component_list_rejected() {
        let header = "sig1=();created=1;expires=2;keyid=\"k\";alg=\"a\";nonce=\"n\";tag=\"t\"";
        assert!(err_message(header).contains("must not be empty"));
    }

    #[test]
    fn test_unquoted_component_rejected() {
        let header = "sig1=(@authority);created=1;expires=2;keyid=\"k\";alg=\"a\";nonce=\"n\";tag=\"t\"";
        assert!(err_message(header).contains("quoted string"));
    }

    #[test]
    fn test_unterminated_nesting_rejected() {
        assert!(err_message("sig1=(\"@authority\" \"@path\"").contains("unterminated"));
        assert!(err_message("sig1=(\"@authority)").contains("unterminated"));
    }

    #[test]
    fn test_unterminated_quoted_param_rejected() {
        let header = "sig1=(\"@path\");created=1;expires=2;keyid=\"k";
        assert!(err_message(header).contains("unterminated quoted parameter"));
    }

    #[test]
    fn test_params_required() {
        assert!(err_message("sig1=(\"@path\")").contains("parameters are required"));
    }

    #[test]
    fn test_param_without_value_rejected() {
        let header = VALID.replace(";tag=\"t-1\"", ";tag");
        assert!(err_message(&header).contains("invalid signature parameter"));
    }

    #[test]
    fn test_quoted_values_are_unescaped() {
        let header = VALID.replace("\"t-1\"", r#""say \"hi\" \\ bye""#);
        let input = SignatureInputParser::parse_single(&header).unwrap();
        assert_eq!(input.params().tag(), r#"say "hi" \ bye"#);
    }

    #[test]
    fn test_param_names_are_case_insensitive() {
        let header = VALID.replace("keyid=", "KeyId=");
        let input = SignatureInputParser::parse_single(&header).unwrap();
        assert_eq!(input.params().key_id(), "dev-ed25519-1");
    }

    #[test]
    fn test_unknown_params_ignored() {
        let header = format!("{VALID};extra=\"value\"");
        assert!(SignatureInputParser::parse_single(&header).is_ok());
    }

    #[test]
    fn test_top_level_comma_detection() {
        assert!(contains_top_level_comma("a=(\"x\"), b=(\"y\")"));
        assert!(!contains_top_level_comma("a=(\"x,y\")"));
        assert!(!contains_top_level_comma("a=(\"x\" \"y\");tag=\"p,q\""));
        assert!(!contains_top_level_comma(r#"a=("x\",y")"#));
    }
}
