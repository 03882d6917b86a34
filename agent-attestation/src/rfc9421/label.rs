//! Cross-check of the `Signature-Input` and `Signature` labels.

use crate::error::{AttestationError, Result};

/// Ensures both headers refer to the same, non-blank signature label.
///
/// # Errors
///
/// Returns [`AttestationError::InvalidLabel`] when either label is blank or
/// the two labels differ.
///
/// # Examples
///
/// ```
/// use agent_attestation::rfc9421::ensure_same_label;
///
/// assert!(ensure_same_label("sig1", "sig1").is_ok());
/// assert!(ensure_same_label("sig1", "sig2").is_err());
/// ```
pub fn ensure_same_label(signature_input_label: &str, signature_label: &str) -> Result<()> {
    if signature_input_label.trim().is_empty() {
        return Err(AttestationError::InvalidLabel("Signature-Input label is required".to_owned()));
    }
    if signature_label.trim().is_empty() {
        return Err(AttestationError::InvalidLabel("Signature label is required".to_owned()));
    }
    if signature_input_label != signature_label {
        return Err(AttestationError::InvalidLabel(
            "Signature label does not match Signature-Input label".to_owned(),
        ));
    }
    Ok(())
}
