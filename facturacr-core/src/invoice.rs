//! Invoice domain types and catalogs for the v4.4 comprobante electrónico.
pub mod clave;
pub mod sign;
pub mod validation;
pub mod xml;

pub use validation::{validate_invoice, ValidationError};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a wire code does not belong to its Anexo 3 catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown sale condition code: {0}")]
    UnknownSaleCondition(String),
    #[error("unknown payment method code: {0}")]
    UnknownPaymentMethod(String),
    #[error("unknown identification type code: {0}")]
    UnknownIdentificationType(String),
}

/// Sale condition catalog (Anexo 3).
///
/// # Examples
/// ```rust
/// use facturacr_core::invoice::SaleCondition;
///
/// assert_eq!(SaleCondition::Contado.as_code(), "01");
/// assert_eq!("02".parse::<SaleCondition>()?, SaleCondition::Credito);
/// # Ok::<(), facturacr_core::invoice::CatalogError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaleCondition {
    Contado,
    Credito,
    Consignacion,
    Apartado,
    Arrendamiento,
    Otro,
}

impl SaleCondition {
    pub fn as_code(&self) -> &'static str {
        match self {
            SaleCondition::Contado => "01",
            SaleCondition::Credito => "02",
            SaleCondition::Consignacion => "03",
            SaleCondition::Apartado => "04",
            SaleCondition::Arrendamiento => "05",
            SaleCondition::Otro => "99",
        }
    }
}

impl FromStr for SaleCondition {
    type Err = CatalogError;

    fn from_str(code: &str) -> Result<SaleCondition, CatalogError> {
        match code {
            "01" => Ok(SaleCondition::Contado),
            "02" => Ok(SaleCondition::Credito),
            "03" => Ok(SaleCondition::Consignacion),
            "04" => Ok(SaleCondition::Apartado),
            "05" => Ok(SaleCondition::Arrendamiento),
            "99" => Ok(SaleCondition::Otro),
            _ => Err(CatalogError::UnknownSaleCondition(code.to_string())),
        }
    }
}

/// Payment method catalog (Anexo 3).
///
/// `Ord` follows the wire-code order so that deduplicated sets sort the way
/// the XML output requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Efectivo,
    Tarjeta,
    Cheque,
    Transferencia,
    RecaudadoPorTerceros,
    Sinpe,
    Otros,
}

impl PaymentMethod {
    pub fn as_code(&self) -> &'static str {
        match self {
            PaymentMethod::Efectivo => "01",
            PaymentMethod::Tarjeta => "02",
            PaymentMethod::Cheque => "03",
            PaymentMethod::Transferencia => "04",
            PaymentMethod::RecaudadoPorTerceros => "05",
            PaymentMethod::Sinpe => "06",
            PaymentMethod::Otros => "99",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CatalogError;

    fn from_str(code: &str) -> Result<PaymentMethod, CatalogError> {
        match code {
            "01" => Ok(PaymentMethod::Efectivo),
            "02" => Ok(PaymentMethod::Tarjeta),
            "03" => Ok(PaymentMethod::Cheque),
            "04" => Ok(PaymentMethod::Transferencia),
            "05" => Ok(PaymentMethod::RecaudadoPorTerceros),
            "06" => Ok(PaymentMethod::Sinpe),
            "99" => Ok(PaymentMethod::Otros),
            _ => Err(CatalogError::UnknownPaymentMethod(code.to_string())),
        }
    }
}

/// Identification type catalog. A foreign receptor carries the free-text
/// [`Receptor::identificacion_extranjero`] field instead of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentificationType {
    CedulaFisica,
    CedulaJuridica,
    Dimex,
    Nite,
}

impl IdentificationType {
    pub fn as_code(&self) -> &'static str {
        match self {
            IdentificationType::CedulaFisica => "01",
            IdentificationType::CedulaJuridica => "02",
            IdentificationType::Dimex => "03",
            IdentificationType::Nite => "04",
        }
    }
}

impl FromStr for IdentificationType {
    type Err = CatalogError;

    fn from_str(code: &str) -> Result<IdentificationType, CatalogError> {
        match code {
            "01" => Ok(IdentificationType::CedulaFisica),
            "02" => Ok(IdentificationType::CedulaJuridica),
            "03" => Ok(IdentificationType::Dimex),
            "04" => Ok(IdentificationType::Nite),
            _ => Err(CatalogError::UnknownIdentificationType(code.to_string())),
        }
    }
}

/// Party identification: catalog type plus the registered number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    pub tipo: IdentificationType,
    pub numero: String,
}

impl Identification {
    pub fn new(tipo: IdentificationType, numero: impl Into<String>) -> Self {
        Self {
            tipo,
            numero: numero.into(),
        }
    }
}

/// Administrative location (provincia/cantón/distrito plus free text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub provincia: String,
    pub canton: String,
    pub distrito: String,
    pub barrio: Option<String>,
    pub otras_senas: Option<String>,
}

/// Phone or fax number. No numeric validation beyond presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub codigo_pais: String,
    pub numero: String,
}

/// Issuing party. Identification is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emisor {
    pub nombre: String,
    pub identificacion: Identification,
    pub nombre_comercial: Option<String>,
    pub ubicacion: Option<Location>,
    pub telefono: Option<Phone>,
    pub fax: Option<Phone>,
    pub correo_electronico: Option<String>,
}

/// Receiving party. A foreign receptor may carry
/// `identificacion_extranjero` instead of a catalog identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receptor {
    pub nombre: String,
    pub identificacion: Option<Identification>,
    pub identificacion_extranjero: Option<String>,
    pub nombre_comercial: Option<String>,
    pub ubicacion: Option<Location>,
    pub telefono: Option<Phone>,
    pub fax: Option<Phone>,
    pub correo_electronico: Option<String>,
}

/// Exoneration record attached to a tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxExoneration {
    pub tipo_documento: String,
    pub numero_documento: String,
    pub nombre_institucion: String,
    pub fecha_emision: NaiveDateTime,
    pub porcentaje_exoneracion: Decimal,
    pub monto_exoneracion: Decimal,
}

/// Line-level tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    pub codigo: String,
    pub codigo_tarifa: Option<String>,
    pub tarifa: Decimal,
    pub monto: Decimal,
    pub factor_iva: Option<Decimal>,
    pub exoneracion: Option<TaxExoneration>,
}

/// Charge collected on behalf of a third party or institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherCharge {
    pub tipo_documento: String,
    pub numero_documento: String,
    pub nombre_institucion: String,
    pub fecha_emision: NaiveDateTime,
    pub monto_cargo: Decimal,
}

/// Line discount: amount plus its nature (free text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub monto: Decimal,
    pub naturaleza: String,
}

/// One detail line of the comprobante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub numero_linea: u32,
    pub codigo: Option<String>,
    pub cantidad: Decimal,
    pub unidad_medida: String,
    pub detalle: String,
    pub precio_unitario: Decimal,
    pub monto_total: Decimal,
    pub sub_total: Decimal,
    pub base_imponible: Option<Decimal>,
    pub impuesto: Option<Tax>,
    pub impuesto_neto: Option<Decimal>,
    pub descuento: Option<Discount>,
    pub otros_cargos: Vec<OtherCharge>,
}

impl InvoiceLine {
    /// Line total including tax, discount and per-line charges.
    ///
    /// Always derived; the XML builder never takes this from input:
    /// `sub_total + (impuesto_neto | impuesto.monto | 0) - descuento
    /// + sum(otros_cargos)`.
    pub fn monto_total_linea(&self) -> Decimal {
        let impuesto = self
            .impuesto_neto
            .or_else(|| self.impuesto.as_ref().map(|tax| tax.monto))
            .unwrap_or(Decimal::ZERO);
        let descuento = self
            .descuento
            .as_ref()
            .map(|d| d.monto)
            .unwrap_or(Decimal::ZERO);
        let cargos: Decimal = self.otros_cargos.iter().map(|c| c.monto_cargo).sum();
        self.sub_total + impuesto - descuento + cargos
    }
}

/// Document totals (ResumenFactura) for the v4.4 schema.
///
/// All totals default to zero; the XML builder emits every field
/// unconditionally, as the schema requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub moneda: String,
    pub tipo_cambio: Option<Decimal>,
    pub total_serv_gravados: Decimal,
    pub total_serv_exentos: Decimal,
    pub total_serv_exonerado: Decimal,
    pub total_serv_no_sujeto: Decimal,
    pub total_serv_otros: Decimal,
    pub total_mercancias_gravadas: Decimal,
    pub total_mercancias_exentas: Decimal,
    pub total_mercancias_exoneradas: Decimal,
    pub total_mercancias_no_sujeto: Decimal,
    pub total_mercancias_otros: Decimal,
    pub total_gravado: Decimal,
    pub total_exento: Decimal,
    pub total_exonerado: Decimal,
    pub total_no_sujeto: Decimal,
    pub total_otros: Decimal,
    pub total_venta: Decimal,
    pub total_descuentos: Decimal,
    pub total_venta_neta: Decimal,
    pub total_impuestos: Decimal,
    pub total_iva_devuelto: Decimal,
    pub total_otros_cargos: Decimal,
    pub total_comprobante: Decimal,
}

impl InvoiceSummary {
    /// Zero-filled summary for the given currency.
    pub fn new(moneda: impl Into<String>, tipo_cambio: Option<Decimal>) -> Self {
        Self {
            moneda: moneda.into(),
            tipo_cambio,
            ..Self::default()
        }
    }
}

/// Reference to a prior document (credit/debit note linkage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInformation {
    pub tipo_documento: String,
    pub numero_documento: String,
    pub fecha_emision: NaiveDateTime,
    pub codigo: String,
    pub razon: String,
}

/// Aggregate root: one electronic invoice as submitted to Hacienda.
///
/// Instances are constructed once by the calling collaborator (typically an
/// accounting-record mapper, see [`InvoiceMapper`]) and flow read-only
/// through validation, XML generation and signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectronicInvoice {
    pub clave: String,
    pub codigo_actividad: String,
    pub numero_consecutivo: String,
    pub fecha_emision: NaiveDateTime,
    pub emisor: Emisor,
    pub receptor: Option<Receptor>,
    pub condicion_venta: SaleCondition,
    pub plazo_credito: Option<String>,
    pub medios_pago: Vec<PaymentMethod>,
    pub detalle_servicio: Vec<InvoiceLine>,
    pub resumen: InvoiceSummary,
    pub informacion_referencia: Vec<ReferenceInformation>,
    pub otros_cargos: Vec<OtherCharge>,
}

impl ElectronicInvoice {
    /// Payment methods deduplicated and sorted by wire code, the order the
    /// XML output emits them in.
    pub fn sorted_medios_pago(&self) -> Vec<PaymentMethod> {
        let set: BTreeSet<PaymentMethod> = self.medios_pago.iter().copied().collect();
        set.into_iter().collect()
    }

    pub fn iter_detalle(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.detalle_servicio.iter()
    }
}

/// Conversion seam between host records (ORM rows, accounting entries) and
/// the immutable invoice model. The core never depends on host types.
pub trait InvoiceMapper {
    type Record;
    type Error;

    fn map_record(&self, record: &Self::Record) -> Result<ElectronicInvoice, Self::Error>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payment_methods_dedup_and_sort_by_code() {
        let invoice = ElectronicInvoice {
            medios_pago: vec![
                PaymentMethod::Tarjeta,
                PaymentMethod::Efectivo,
                PaymentMethod::Efectivo,
            ],
            ..sample_invoice()
        };
        assert_eq!(
            invoice.sorted_medios_pago(),
            vec![PaymentMethod::Efectivo, PaymentMethod::Tarjeta]
        );
    }

    #[test]
    fn monto_total_linea_combines_tax_discount_and_charges() {
        let mut line = sample_line();
        line.impuesto = Some(Tax {
            codigo: "01".into(),
            codigo_tarifa: None,
            tarifa: dec!(13),
            monto: dec!(13),
            factor_iva: None,
            exoneracion: None,
        });
        line.descuento = Some(Discount {
            monto: dec!(10),
            naturaleza: "Descuento comercial".into(),
        });
        assert_eq!(line.monto_total_linea(), dec!(103));
    }

    #[test]
    fn monto_total_linea_prefers_net_tax_override() {
        let mut line = sample_line();
        line.impuesto = Some(Tax {
            codigo: "01".into(),
            codigo_tarifa: None,
            tarifa: dec!(13),
            monto: dec!(13),
            factor_iva: None,
            exoneracion: None,
        });
        line.impuesto_neto = Some(dec!(5));
        assert_eq!(line.monto_total_linea(), dec!(105));
    }

    #[test]
    fn catalog_codes_round_trip() {
        for method in [
            PaymentMethod::Efectivo,
            PaymentMethod::Tarjeta,
            PaymentMethod::Cheque,
            PaymentMethod::Transferencia,
            PaymentMethod::RecaudadoPorTerceros,
            PaymentMethod::Sinpe,
            PaymentMethod::Otros,
        ] {
            assert_eq!(method.as_code().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("07".parse::<PaymentMethod>().is_err());
        assert_eq!(
            "05".parse::<SaleCondition>().unwrap(),
            SaleCondition::Arrendamiento
        );
        assert!("00".parse::<IdentificationType>().is_err());
    }

    pub(crate) fn sample_line() -> InvoiceLine {
        InvoiceLine {
            numero_linea: 1,
            codigo: None,
            cantidad: dec!(1),
            unidad_medida: "Unid".into(),
            detalle: "Servicio profesional".into(),
            precio_unitario: dec!(100),
            monto_total: dec!(100),
            sub_total: dec!(100),
            base_imponible: None,
            impuesto: None,
            impuesto_neto: None,
            descuento: None,
            otros_cargos: Vec::new(),
        }
    }

    pub(crate) fn sample_invoice() -> ElectronicInvoice {
        ElectronicInvoice {
            clave: "50612122300310112345600100001010000000001111111111".into(),
            codigo_actividad: "620100".into(),
            numero_consecutivo: "00100001010000000001".into(),
            fecha_emision: chrono::NaiveDate::from_ymd_opt(2023, 8, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            emisor: Emisor {
                nombre: "Mi Empresa S.A.".into(),
                identificacion: Identification::new(
                    IdentificationType::CedulaJuridica,
                    "3101123456",
                ),
                nombre_comercial: None,
                ubicacion: None,
                telefono: None,
                fax: None,
                correo_electronico: None,
            },
            receptor: None,
            condicion_venta: SaleCondition::Contado,
            plazo_credito: None,
            medios_pago: vec![PaymentMethod::Efectivo],
            detalle_servicio: vec![sample_line()],
            resumen: InvoiceSummary::new("CRC", None),
            informacion_referencia: Vec::new(),
            otros_cargos: Vec::new(),
        }
    }
}
