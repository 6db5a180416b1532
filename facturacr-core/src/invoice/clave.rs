//! Generation of the 50-digit clave and the 20-digit consecutivo.
//!
//! The clave encodes issuer country, issue date, issuer identification,
//! consecutive number, a security code and the emission situation. Hacienda
//! rejects documents whose clave does not match the submitted payload, so
//! both generators keep their output in lockstep with the validator's
//! format rules.
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Errors from clave/consecutivo assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaveError {
    #[error("issuer identification must be 9 to 12 digits: {0}")]
    InvalidIdentification(String),
    #[error("consecutivo must be exactly 20 digits: {0}")]
    InvalidConsecutivo(String),
    #[error("branch number must be at most 999: {0}")]
    BranchOutOfRange(u16),
    #[error("security code must be at most 8 digits: {0}")]
    SecurityCodeOutOfRange(u32),
}

/// Document type catalog used in the consecutivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    FacturaElectronica,
    NotaDebito,
    NotaCredito,
    TiqueteElectronico,
    FacturaCompra,
    FacturaExportacion,
}

impl DocumentType {
    pub fn as_code(&self) -> &'static str {
        match self {
            DocumentType::FacturaElectronica => "01",
            DocumentType::NotaDebito => "02",
            DocumentType::NotaCredito => "03",
            DocumentType::TiqueteElectronico => "04",
            DocumentType::FacturaCompra => "08",
            DocumentType::FacturaExportacion => "09",
        }
    }
}

/// Emission situation digit of the clave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Situation {
    Normal,
    Contingencia,
    SinInternet,
}

impl Situation {
    pub fn as_code(&self) -> &'static str {
        match self {
            Situation::Normal => "1",
            Situation::Contingencia => "2",
            Situation::SinInternet => "3",
        }
    }
}

/// Assemble a 20-digit consecutivo: 3-digit branch, 5-digit terminal,
/// 2-digit document type, 10-digit sequence.
///
/// # Errors
/// Returns [`ClaveError::BranchOutOfRange`] if the branch does not fit in
/// three digits.
///
/// # Examples
/// ```rust
/// use facturacr_core::invoice::clave::{consecutivo, DocumentType};
///
/// let numero = consecutivo(1, 1, DocumentType::FacturaElectronica, 42)?;
/// assert_eq!(numero, "00100001010000000042");
/// # Ok::<(), facturacr_core::invoice::clave::ClaveError>(())
/// ```
pub fn consecutivo(
    sucursal: u16,
    terminal: u16,
    tipo_documento: DocumentType,
    secuencia: u32,
) -> Result<String, ClaveError> {
    if sucursal > 999 {
        return Err(ClaveError::BranchOutOfRange(sucursal));
    }
    Ok(format!(
        "{sucursal:03}{terminal:05}{}{secuencia:010}",
        tipo_documento.as_code()
    ))
}

/// Assemble a 50-digit clave for a Costa Rican issuer.
///
/// Layout: `506` + issue date as `ddmmyy` + identification zero-padded to
/// 12 digits + 20-digit consecutivo + 8-digit security code + situation
/// digit.
///
/// # Errors
/// Fails when the identification is not 9–12 digits, the consecutivo is not
/// 20 digits, or the security code exceeds 8 digits.
pub fn clave(
    fecha: NaiveDate,
    identificacion: &str,
    numero_consecutivo: &str,
    codigo_seguridad: u32,
    situacion: Situation,
) -> Result<String, ClaveError> {
    let id_ok = (9..=12).contains(&identificacion.len())
        && identificacion.bytes().all(|b| b.is_ascii_digit());
    if !id_ok {
        return Err(ClaveError::InvalidIdentification(identificacion.to_string()));
    }
    let consecutivo_ok = numero_consecutivo.len() == 20
        && numero_consecutivo.bytes().all(|b| b.is_ascii_digit());
    if !consecutivo_ok {
        return Err(ClaveError::InvalidConsecutivo(
            numero_consecutivo.to_string(),
        ));
    }
    if codigo_seguridad > 99_999_999 {
        return Err(ClaveError::SecurityCodeOutOfRange(codigo_seguridad));
    }
    Ok(format!(
        "506{:02}{:02}{:02}{identificacion:0>12}{numero_consecutivo}{codigo_seguridad:08}{}",
        fecha.day(),
        fecha.month(),
        fecha.year() % 100,
        situacion.as_code()
    ))
}
