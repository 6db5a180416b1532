//! Structural and numeric checks from the Anexo 4.4 rule set.
//!
//! Validation is a pre-flight gate: it either passes entirely or fails on
//! the first violated rule with the offending field path. Callers that need
//! a full error list must re-run after correcting each failure; Hacienda
//! itself only accepts single well-formed submissions.
use super::{ElectronicInvoice, Identification, InvoiceLine};
use rust_decimal::Decimal;
use std::collections::HashSet;
use thiserror::Error;

/// A violated v4.4 rule, carrying the machine-readable field path
/// (e.g. `"Emisor/Identificacion"`, `"ResumenFactura/TotalComprobante"`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({field})")]
pub struct ValidationError {
    field: &'static str,
    message: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}

fn ensure(
    predicate: bool,
    field: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    if predicate {
        Ok(())
    } else {
        Err(ValidationError::new(field, message))
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_identification_number(value: &str) -> bool {
    (9..=20).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn validate_identification(
    identificacion: &Identification,
    field: &'static str,
) -> Result<(), ValidationError> {
    // The type code is constrained by the catalog enum; only the number
    // format can be wrong at run time.
    ensure(
        is_identification_number(&identificacion.numero),
        field,
        "identification number must be 9 to 20 alphanumeric characters",
    )
}

fn validate_line(linea: &InvoiceLine) -> Result<(), ValidationError> {
    ensure(
        linea.numero_linea > 0,
        "NumeroLinea",
        "line number must be positive",
    )?;
    ensure(
        linea.cantidad >= Decimal::ZERO,
        "Cantidad",
        "quantity must not be negative",
    )?;
    ensure(
        linea.precio_unitario >= Decimal::ZERO,
        "PrecioUnitario",
        "unit price must not be negative",
    )?;
    ensure(
        linea.monto_total >= Decimal::ZERO,
        "MontoTotal",
        "line total must not be negative",
    )?;
    ensure(
        linea.sub_total >= Decimal::ZERO,
        "SubTotal",
        "subtotal must not be negative",
    )?;
    if let Some(base) = linea.base_imponible {
        ensure(
            base >= Decimal::ZERO,
            "BaseImponible",
            "taxable base must not be negative",
        )?;
    }
    if let Some(impuesto) = &linea.impuesto {
        ensure(
            impuesto.monto >= Decimal::ZERO,
            "Impuesto/Monto",
            "tax amount must not be negative",
        )?;
        ensure(
            impuesto.tarifa >= Decimal::ZERO && impuesto.tarifa <= Decimal::ONE_HUNDRED,
            "Impuesto/Tarifa",
            "tax rate must be between 0 and 100",
        )?;
        if let Some(exoneracion) = &impuesto.exoneracion {
            ensure(
                exoneracion.porcentaje_exoneracion >= Decimal::ZERO
                    && exoneracion.porcentaje_exoneracion <= Decimal::ONE_HUNDRED,
                "Impuesto/Exoneracion/PorcentajeExoneracion",
                "exoneration percentage must be between 0 and 100",
            )?;
        }
    }
    Ok(())
}

/// Validate an invoice against the v4.4 rule set, failing on the first
/// violation.
///
/// # Errors
/// Returns [`ValidationError`] with the field path of the first violated
/// rule. The rules run in a fixed order: clave, consecutivo, emisor and
/// receptor identification, payment methods, detail lines (including
/// line-number uniqueness across the whole sequence), then summary totals.
pub fn validate_invoice(invoice: &ElectronicInvoice) -> Result<(), ValidationError> {
    ensure(
        is_digits(&invoice.clave, 50),
        "Clave",
        "clave must be exactly 50 digits",
    )?;
    ensure(
        is_digits(&invoice.numero_consecutivo, 20),
        "NumeroConsecutivo",
        "consecutive number must be exactly 20 digits",
    )?;
    validate_identification(&invoice.emisor.identificacion, "Emisor/Identificacion")?;
    if let Some(identificacion) = invoice
        .receptor
        .as_ref()
        .and_then(|receptor| receptor.identificacion.as_ref())
    {
        validate_identification(identificacion, "Receptor/Identificacion")?;
    }
    ensure(
        !invoice.medios_pago.is_empty(),
        "MedioPago",
        "at least one payment method is required",
    )?;

    let mut numeros_linea: HashSet<u32> = HashSet::new();
    for linea in invoice.iter_detalle() {
        validate_line(linea)?;
        ensure(
            numeros_linea.insert(linea.numero_linea),
            "NumeroLinea",
            "duplicate line number",
        )?;
    }

    let resumen = &invoice.resumen;
    ensure(
        resumen.total_comprobante >= Decimal::ZERO,
        "ResumenFactura/TotalComprobante",
        "grand total must not be negative",
    )?;
    if let Some(tipo_cambio) = resumen.tipo_cambio {
        ensure(
            tipo_cambio > Decimal::ZERO,
            "ResumenFactura/TipoCambio",
            "exchange rate must be greater than zero",
        )?;
    }
    Ok(())
}
