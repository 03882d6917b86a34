//! Canonical signature-base construction.
//!
//! The signature base is the exact byte string an agent signs. Both the
//! verifier and [`AttestationSigner`](super::AttestationSigner) go through
//! [`SignatureBaseBuilder::build`], so the two sides cannot drift apart.
//!
//! Each covered component becomes one line `"<component>": <value>`; lines are
//! joined with `\n` and the result has no trailing newline. The value of
//! `@signature-params` is the inner list followed by the parameters in the
//! fixed order `created`, `expires`, `keyid`, `alg`, `nonce`, `tag`. Agents
//! depend on that order, so it must never change.

use std::collections::BTreeMap;

use crate::{
    error::{AttestationError, Result},
    rfc9421::SignatureParams,
};

/// Component name for the request authority.
pub const COMPONENT_AUTHORITY: &str = "@authority";
/// Component name for the request path.
pub const COMPONENT_PATH: &str = "@path";
/// Component name for the signature parameters line.
pub const COMPONENT_SIGNATURE_PARAMS: &str = "@signature-params";

/// Request data a component renderer can draw from.
#[derive(Debug, Clone, Copy)]
pub struct BaseContext<'a> {
    /// Raw `Host` / `:authority` value.
    pub authority: &'a str,
    /// Request-target path.
    pub path: &'a str,
    /// Covered components exactly as listed in `Signature-Input`.
    pub covered_components: &'a [String],
    /// Parsed signature parameters.
    pub params: &'a SignatureParams,
}

/// Renders the value half of a signature-base line.
pub type ComponentRenderer = fn(&BaseContext<'_>) -> String;

/// Builds signature bases from a registry of component renderers.
///
/// The default registry knows `@authority`, `@path` and `@signature-params`.
/// Anything else, including body-bound components such as `content-digest`,
/// is rejected unless a renderer is registered for it.
///
/// # Examples
///
/// ```
/// use agent_attestation::rfc9421::{SignatureBaseBuilder, SignatureInputParser};
///
/// let input = SignatureInputParser::parse_single(
///     r#"sig1=("@authority" "@path");created=1;expires=2;keyid="k1";alg="ed25519";nonce="n";tag="t""#,
/// )?;
/// let base = SignatureBaseBuilder::default().build(
///     "Shop.Example",
///     "/cart",
///     input.covered_components(),
///     input.params(),
/// )?;
/// assert_eq!(base, "\"@authority\": \"shop.example\"\n\"@path\": \"/cart\"");
/// # Ok::<(), agent_attestation::AttestationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SignatureBaseBuilder {
    renderers: BTreeMap<String, ComponentRenderer>,
}

impl Default for SignatureBaseBuilder {
    fn default() -> Self {
        Self { renderers: BTreeMap::new() }
            .with_renderer(COMPONENT_AUTHORITY, render_authority)
            .with_renderer(COMPONENT_PATH, render_path)
            .with_renderer(COMPONENT_SIGNATURE_PARAMS, render_signature_params)
    }
}

impl SignatureBaseBuilder {
    /// Registers (or replaces) the renderer for a component name.
    ///
    /// Names are matched case-insensitively.
    #[must_use]
    pub fn with_renderer(mut self, component: &str, renderer: ComponentRenderer) -> Self {
        self.renderers.insert(component.trim().to_lowercase(), renderer);
        self
    }

    /// Returns `true` when `component` has a registered renderer.
    #[must_use]
    pub fn supports(&self, component: &str) -> bool {
        self.renderers.contains_key(&component.trim().to_lowercase())
    }

    /// Builds the signature base for the given request and covered components.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::SignatureBase`] when `authority` or `path`
    /// is blank, a covered component is blank, or a covered component has no
    /// registered renderer.
    pub fn build(
        &self,
        authority: &str,
        path: &str,
        covered_components: &[String],
        params: &SignatureParams,
    ) -> Result<String> {
        if authority.trim().is_empty() {
            return Err(AttestationError::SignatureBase("authority is required".to_owned()));
        }
        if path.trim().is_empty() {
            return Err(AttestationError::SignatureBase("path is required".to_owned()));
        }

        let ctx = BaseContext { authority, path, covered_components, params };

        let lines = covered_components
            .iter()
            .map(|component| {
                let name = component.trim().to_lowercase();
                if name.is_empty() {
                    return Err(AttestationError::SignatureBase(
                        "covered component must not be blank".to_owned(),
                    ));
                }
                let render = self.renderers.get(&name).ok_or_else(|| {
                    AttestationError::SignatureBase(format!(
                        "unsupported covered component: {component}"
                    ))
                })?;
                Ok(format!("{}: {}", quote(&name), render(&ctx)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(lines.join("\n"))
    }
}

/// Serializes the inner list and parameters exactly as they appear after the
/// label in a `Signature-Input` header and in the `@signature-params` line.
#[must_use]
pub fn signature_params_value(covered_components: &[String], params: &SignatureParams) -> String {
    let components =
        covered_components.iter().map(|c| quote(c)).collect::<Vec<_>>().join(" ");

    format!(
        "({components});created={};expires={};keyid={};alg={};nonce={};tag={}",
        params.created(),
        params.expires(),
        quote(params.key_id()),
        quote(params.alg()),
        quote(params.nonce()),
        quote(params.tag()),
    )
}

/// Wraps `value` in double quotes, escaping `\` and `"`.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn render_authority(ctx: &BaseContext<'_>) -> String {
    quote(&ctx.authority.trim().to_lowercase())
}

fn render_path(ctx: &BaseContext<'_>) -> String {
    quote(ctx.path.trim())
}

fn render_signature_params(ctx: &BaseContext<'_>) -> String {
    signature_params_value(ctx.covered_components, ctx.params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc9421::SignatureInputParser;

    const FIXTURE_INPUT: &str = "sig1=(\"@authority\" \"@path\" \"@signature-params\");\
                                 created=1700000000;expires=1700000480;keyid=\"k1\";\
                                 alg=\"ed25519\";nonce=\"n-123\";tag=\"t-1\"";

    const FIXTURE_BASE: &str = "\"@authority\": \"example.com\"\n\
                                \"@path\": \"/v1/agent/verify\"\n\
                                \"@signature-params\": (\"@authority\" \"@path\" \"@signature-params\");\
                                created=1700000000;expires=1700000480;keyid=\"k1\";alg=\"ed25519\";\
                                nonce=\"n-123\";tag=\"t-1\"";

    fn build(header: &str, authority: &str, path: &str) -> Result<String> {
        let input = SignatureInputParser::parse_single(header).unwrap();
        SignatureBaseBuilder::default().build(
            authority,
            path,
            input.covered_components(),
            input.params(),
        )
    }

    #[test]
    fn test_fixture_base_is_byte_exact() {
        let base = build(FIXTURE_INPUT, "Example.COM", "/v1/agent/verify").unwrap();
        assert_eq!(base, FIXTURE_BASE);
        assert!(!base.ends_with('\n'));
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = build(FIXTURE_INPUT, "Example.COM", "/v1/agent/verify").unwrap();
        let second = build(FIXTURE_INPUT, "Example.COM", "/v1/agent/verify").unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_authority_trimmed_and_lowercased_path_verbatim() {
        let header = FIXTURE_INPUT.replace(" \"@signature-params\")", ")");
        let base = build(&header, "  Shop.EXAMPLE:8443 ", " /Cart/Items?x=1 ").unwrap();
        assert_eq!(base, "\"@authority\": \"shop.example:8443\"\n\"@path\": \"/Cart/Items?x=1\"");
    }

    #[test]
    fn test_component_order_follows_input() {
        let header = FIXTURE_INPUT.replace(
            "(\"@authority\" \"@path\" \"@signature-params\")",
            "(\"@path\" \"@authority\")",
        );
        let base = build(&header, "example.com", "/a").unwrap();
        assert_eq!(base, "\"@path\": \"/a\"\n\"@authority\": \"example.com\"");
    }

    #[test]
    fn test_unsupported_component_rejected() {
        let header = FIXTURE_INPUT.replace("\"@path\"", "\"content-digest\"");
        let err = build(&header, "example.com", "/a").unwrap_err();
        assert!(err.to_string().contains("unsupported covered component: content-digest"));
    }

    #[test]
    fn test_blank_authority_and_path_rejected() {
        assert!(build(FIXTURE_INPUT, " ", "/a").unwrap_err().to_string().contains("authority"));
        assert!(build(FIXTURE_INPUT, "example.com", "").unwrap_err().to_string().contains("path"));
    }

    #[test]
    fn test_values_are_quote_escaped() {
        let header = FIXTURE_INPUT.replace("\"t-1\"", r#""a\"b\\c""#);
        let input = SignatureInputParser::parse_single(&header).unwrap();
        let value = signature_params_value(input.covered_components(), input.params());
        assert!(value.ends_with(r#";tag="a\"b\\c""#), "{value}");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_custom_renderer_extends_profile() {
        fn render_method(_: &BaseContext<'_>) -> String {
            quote("POST")
        }

        let builder = SignatureBaseBuilder::default().with_renderer("@method", render_method);
        assert!(builder.supports("@METHOD"));

        let header = FIXTURE_INPUT.replace(
            "(\"@authority\" \"@path\" \"@signature-params\")",
            "(\"@method\")",
        );
        let input = SignatureInputParser::parse_single(&header).unwrap();
        let base = builder
            .build("example.com", "/", input.covered_components(), input.params())
            .unwrap();
        assert_eq!(base, "\"@method\": \"POST\"");
    }
}
