//! Validation of trust anchor material.

use x509_parser::pem::Pem;

use crate::ambient::errors::ResolutionError;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Checks that `bytes` is either empty or a bundle of PEM-encoded X.509 certificates.
///
/// Returns the number of certificates found.
///
/// # Errors
///
/// Returns [`ResolutionError::InvalidTrustAnchor`] if the bytes contain no PEM block, a block
/// that is not a `CERTIFICATE`, or a certificate that does not parse.
pub fn validate_pem_bundle(bytes: &[u8]) -> Result<usize, ResolutionError> {
    if bytes.is_empty() {
        return Ok(0);
    }

    let mut count = 0;
    for pem in Pem::iter_from_buffer(bytes) {
        let pem = pem.map_err(|e| ResolutionError::InvalidTrustAnchor(e.to_string()))?;
        if pem.label != CERTIFICATE_LABEL {
            return Err(ResolutionError::InvalidTrustAnchor(format!(
                "unexpected PEM block {:?}",
                pem.label
            )));
        }
        pem.parse_x509()
            .map_err(|e| ResolutionError::InvalidTrustAnchor(e.to_string()))?;
        count += 1;
    }

    if count == 0 {
        return Err(ResolutionError::InvalidTrustAnchor(
            "no PEM certificate found".to_owned(),
        ));
    }
    Ok(count)
}
