use super::{Certificate, CredentialRef, PemBlock};
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use tracing::debug;
use x509_parser::{
    der_parser::asn1_rs::Tag,
    pem::parse_x509_pem,
    prelude::{ASN1Time, AttributeTypeAndValue, FromDer, X509Certificate, X509Name},
};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Decode one PEM block into certificate metadata owned by `owner`.
///
/// Only the envelope, the names and the validity window are looked at;
/// signatures, extensions and the chain of trust are not validated.
///
/// # Errors
///
/// Returns [`ScanError::PemDecode`] if the block is not a well formed
/// `CERTIFICATE` PEM envelope, and [`ScanError::CertParse`] if its content is
/// not a valid X.509 certificate.
pub fn decode(block: &PemBlock<'_>, owner: &CredentialRef) -> Result<Certificate, ScanError> {
    let pem_error = |reason: String| ScanError::PemDecode {
        owner: owner.clone(),
        index: block.index,
        reason,
    };
    let parse_error = |reason: String| ScanError::CertParse {
        owner: owner.clone(),
        index: block.index,
        reason,
    };

    let (_, pem) = parse_x509_pem(block.bytes).map_err(|e| pem_error(e.to_string()))?;
    if pem.label != CERTIFICATE_LABEL {
        return Err(pem_error(format!("unexpected PEM label {:?}", pem.label)));
    }

    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| parse_error(format!("failed to parse certificate: {e}")))?;

    let validity = cert.validity();
    let not_before = to_utc(&validity.not_before)
        .ok_or_else(|| parse_error("invalid notBefore timestamp".to_string()))?;
    let not_after = to_utc(&validity.not_after)
        .ok_or_else(|| parse_error("invalid notAfter timestamp".to_string()))?;

    Ok(Certificate {
        issuer_cn: common_name(cert.issuer()),
        subject_cn: common_name(cert.subject()),
        not_before,
        not_after,
        owner: owner.clone(),
    })
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| {
            let value = attribute_string(cn);
            if value.is_none() {
                debug!(tag = ?cn.attr_value().tag(), "undecodable common name");
            }
            value
        })
        .unwrap_or_default()
}

/// Attribute value as text, including the UCS-2 and UCS-4 string types
fn attribute_string(attr: &AttributeTypeAndValue<'_>) -> Option<String> {
    if let Ok(value) = attr.as_str() {
        return Some(value.to_string());
    }

    let value = attr.attr_value();
    match value.tag() {
        Tag::BmpString => {
            let units = value
                .data
                .chunks_exact(2)
                .map(|unit| <[u8; 2]>::try_from(unit).map(u16::from_be_bytes))
                .collect::<Result<Vec<u16>, _>>()
                .ok()?;
            String::from_utf16(&units).ok()
        }
        Tag::UniversalString => value
            .data
            .chunks_exact(4)
            .map(|unit| {
                <[u8; 4]>::try_from(unit)
                    .ok()
                    .map(u32::from_be_bytes)
                    .and_then(char::from_u32)
            })
            .collect(),
        _ => None,
    }
}

fn to_utc(time: &ASN1Time) -> Option<DateTime<Utc>> {
    let raw = time.to_datetime();
    DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond())
}
