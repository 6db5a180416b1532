//! XML serialization of the comprobante (v4.4 wire format).
use super::validation::{validate_invoice, ValidationError};
use super::{
    Discount, ElectronicInvoice, Emisor, Identification, InvoiceLine, InvoiceSummary, Location,
    OtherCharge, Phone, Receptor, ReferenceInformation, Tax, TaxExoneration,
};
use helpers::{amount, datetime_text};
use libxml::parser::Parser;
use libxml::tree::Document;
use quick_xml::se::{SeError, Serializer as QuickXmlSerializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// v4.4 document namespace published on the Hacienda CDN.
pub const NAMESPACE: &str =
    "https://cdn.comprobanteselectronicos.go.cr/xml-schemas/v4.4/facturaElectronica";
/// Schema location advertised in the root element.
pub const SCHEMA_LOCATION: &str =
    "https://cdn.comprobanteselectronicos.go.cr/xml-schemas/v4.4/facturaElectronica.xsd";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML generation error.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to serialize invoice to XML: {source}")]
    Serialize {
        #[from]
        source: SeError,
    },
    #[error("generated XML failed to parse: {0}")]
    Parse(String),
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub enum XmlFormat {
    /// No insignificant whitespace. The safe choice for documents that will
    /// be signed, since pretty-printed text nodes become part of the
    /// canonical form.
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

mod helpers {
    use chrono::NaiveDateTime;
    use rust_decimal::{Decimal, RoundingStrategy};
    use serde::ser::{Serialize, Serializer};
    use std::fmt::{self, Display, Formatter};

    pub(super) const AMOUNT_PLACES: u32 = 5;

    /// Render a decimal the way the schema expects: rounded half-up to
    /// `places` fraction digits, trailing zeros and any bare decimal point
    /// stripped. `Decimal` display never produces scientific notation.
    pub(super) fn decimal_text(value: Decimal, places: u32) -> String {
        value
            .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string()
    }

    pub(super) struct Amount {
        value: Decimal,
        places: u32,
    }

    pub(super) fn amount(value: Decimal) -> Amount {
        Amount {
            value,
            places: AMOUNT_PLACES,
        }
    }

    impl Display for Amount {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str(&decimal_text(self.value, self.places))
        }
    }

    impl Serialize for Amount {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_str(self)
        }
    }

    pub(super) fn datetime_text(value: &NaiveDateTime) -> String {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use rust_decimal_macros::dec;

        #[test]
        fn whole_amounts_drop_the_fraction() {
            assert_eq!(decimal_text(dec!(13), AMOUNT_PLACES), "13");
            assert_eq!(decimal_text(dec!(13.00000), AMOUNT_PLACES), "13");
            assert_eq!(decimal_text(dec!(0), AMOUNT_PLACES), "0");
        }

        #[test]
        fn trailing_zeros_are_stripped() {
            assert_eq!(decimal_text(dec!(10.50), AMOUNT_PLACES), "10.5");
            assert_eq!(decimal_text(dec!(535.12345), AMOUNT_PLACES), "535.12345");
        }

        #[test]
        fn sixth_decimal_rounds_half_up() {
            assert_eq!(decimal_text(dec!(1.000005), AMOUNT_PLACES), "1.00001");
            assert_eq!(decimal_text(dec!(1.0000049), AMOUNT_PLACES), "1");
            assert_eq!(decimal_text(dec!(0.123456), AMOUNT_PLACES), "0.12346");
        }
    }
}

struct IdentificacionXml<'a>(&'a Identification);

impl<'a> Serialize for IdentificacionXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("Identificacion", 0)?;
        st.serialize_field("Tipo", self.0.tipo.as_code())?;
        st.serialize_field("Numero", &self.0.numero)?;
        st.end()
    }
}

struct UbicacionXml<'a>(&'a Location);

impl<'a> Serialize for UbicacionXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ubicacion = self.0;
        let mut st = s.serialize_struct("Ubicacion", 0)?;
        st.serialize_field("Provincia", &ubicacion.provincia)?;
        st.serialize_field("Canton", &ubicacion.canton)?;
        st.serialize_field("Distrito", &ubicacion.distrito)?;
        if let Some(barrio) = &ubicacion.barrio {
            st.serialize_field("Barrio", barrio)?;
        }
        if let Some(otras_senas) = &ubicacion.otras_senas {
            st.serialize_field("OtrasSenas", otras_senas)?;
        }
        st.end()
    }
}

struct PhoneXml<'a> {
    tag: &'static str,
    phone: &'a Phone,
}

impl<'a> Serialize for PhoneXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct(self.tag, 0)?;
        st.serialize_field("CodigoPais", &self.phone.codigo_pais)?;
        st.serialize_field("NumTelefono", &self.phone.numero)?;
        st.end()
    }
}

struct EmisorXml<'a>(&'a Emisor);

impl<'a> Serialize for EmisorXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let emisor = self.0;
        let mut st = s.serialize_struct("Emisor", 0)?;
        st.serialize_field("Nombre", &emisor.nombre)?;
        st.serialize_field("Identificacion", &IdentificacionXml(&emisor.identificacion))?;
        if let Some(nombre_comercial) = &emisor.nombre_comercial {
            st.serialize_field("NombreComercial", nombre_comercial)?;
        }
        if let Some(ubicacion) = &emisor.ubicacion {
            st.serialize_field("Ubicacion", &UbicacionXml(ubicacion))?;
        }
        if let Some(telefono) = &emisor.telefono {
            st.serialize_field(
                "Telefono",
                &PhoneXml {
                    tag: "Telefono",
                    phone: telefono,
                },
            )?;
        }
        if let Some(fax) = &emisor.fax {
            st.serialize_field(
                "Fax",
                &PhoneXml {
                    tag: "Fax",
                    phone: fax,
                },
            )?;
        }
        if let Some(correo) = &emisor.correo_electronico {
            st.serialize_field("CorreoElectronico", correo)?;
        }
        st.end()
    }
}

struct ReceptorXml<'a>(&'a Receptor);

impl<'a> Serialize for ReceptorXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let receptor = self.0;
        let mut st = s.serialize_struct("Receptor", 0)?;
        st.serialize_field("Nombre", &receptor.nombre)?;
        if let Some(identificacion) = &receptor.identificacion {
            st.serialize_field("Identificacion", &IdentificacionXml(identificacion))?;
        }
        if let Some(extranjero) = &receptor.identificacion_extranjero {
            st.serialize_field("IdentificacionExtranjero", extranjero)?;
        }
        if let Some(nombre_comercial) = &receptor.nombre_comercial {
            st.serialize_field("NombreComercial", nombre_comercial)?;
        }
        if let Some(ubicacion) = &receptor.ubicacion {
            st.serialize_field("Ubicacion", &UbicacionXml(ubicacion))?;
        }
        if let Some(telefono) = &receptor.telefono {
            st.serialize_field(
                "Telefono",
                &PhoneXml {
                    tag: "Telefono",
                    phone: telefono,
                },
            )?;
        }
        if let Some(fax) = &receptor.fax {
            st.serialize_field(
                "Fax",
                &PhoneXml {
                    tag: "Fax",
                    phone: fax,
                },
            )?;
        }
        if let Some(correo) = &receptor.correo_electronico {
            st.serialize_field("CorreoElectronico", correo)?;
        }
        st.end()
    }
}

struct ExoneracionXml<'a>(&'a TaxExoneration);

impl<'a> Serialize for ExoneracionXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let exoneracion = self.0;
        let mut st = s.serialize_struct("Exoneracion", 0)?;
        st.serialize_field("TipoDocumento", &exoneracion.tipo_documento)?;
        st.serialize_field("NumeroDocumento", &exoneracion.numero_documento)?;
        st.serialize_field("NombreInstitucion", &exoneracion.nombre_institucion)?;
        st.serialize_field("FechaEmision", &datetime_text(&exoneracion.fecha_emision))?;
        st.serialize_field(
            "PorcentajeExoneracion",
            &amount(exoneracion.porcentaje_exoneracion),
        )?;
        st.serialize_field("MontoExoneracion", &amount(exoneracion.monto_exoneracion))?;
        st.end()
    }
}

struct ImpuestoXml<'a>(&'a Tax);

impl<'a> Serialize for ImpuestoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let impuesto = self.0;
        let mut st = s.serialize_struct("Impuesto", 0)?;
        st.serialize_field("Codigo", &impuesto.codigo)?;
        if let Some(codigo_tarifa) = &impuesto.codigo_tarifa {
            st.serialize_field("CodigoTarifa", codigo_tarifa)?;
        }
        st.serialize_field("Tarifa", &amount(impuesto.tarifa))?;
        st.serialize_field("Monto", &amount(impuesto.monto))?;
        if let Some(factor_iva) = impuesto.factor_iva {
            st.serialize_field("FactorIVA", &amount(factor_iva))?;
        }
        if let Some(exoneracion) = &impuesto.exoneracion {
            st.serialize_field("Exoneracion", &ExoneracionXml(exoneracion))?;
        }
        st.end()
    }
}

struct DescuentoXml<'a>(&'a Discount);

impl<'a> Serialize for DescuentoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("Descuento", 0)?;
        st.serialize_field("MontoDescuento", &amount(self.0.monto))?;
        st.serialize_field("NaturalezaDescuento", &self.0.naturaleza)?;
        st.end()
    }
}

struct OtroCargoXml<'a>(&'a OtherCharge);

impl<'a> Serialize for OtroCargoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let cargo = self.0;
        let mut st = s.serialize_struct("OtroCargo", 0)?;
        st.serialize_field("TipoDocumento", &cargo.tipo_documento)?;
        st.serialize_field("NumeroDocumento", &cargo.numero_documento)?;
        st.serialize_field("NombreInstitucion", &cargo.nombre_institucion)?;
        st.serialize_field("FechaEmision", &datetime_text(&cargo.fecha_emision))?;
        st.serialize_field("MontoCargo", &amount(cargo.monto_cargo))?;
        st.end()
    }
}

struct CodigoXml<'a>(&'a str);

impl<'a> Serialize for CodigoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Product codes are always emitted with the fixed "own code" type.
        let mut st = s.serialize_struct("Codigo", 0)?;
        st.serialize_field("Tipo", "01")?;
        st.serialize_field("Codigo", self.0)?;
        st.end()
    }
}

struct LineaDetalleXml<'a>(&'a InvoiceLine);

impl<'a> Serialize for LineaDetalleXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let linea = self.0;
        let mut st = s.serialize_struct("LineaDetalle", 0)?;
        st.serialize_field("NumeroLinea", &linea.numero_linea)?;
        if let Some(codigo) = &linea.codigo {
            st.serialize_field("Codigo", &CodigoXml(codigo))?;
        }
        st.serialize_field("Cantidad", &amount(linea.cantidad))?;
        st.serialize_field("UnidadMedida", &linea.unidad_medida)?;
        st.serialize_field("Detalle", &linea.detalle)?;
        st.serialize_field("PrecioUnitario", &amount(linea.precio_unitario))?;
        st.serialize_field("MontoTotal", &amount(linea.monto_total))?;
        if let Some(descuento) = &linea.descuento {
            st.serialize_field("Descuento", &DescuentoXml(descuento))?;
        }
        st.serialize_field("SubTotal", &amount(linea.sub_total))?;
        if let Some(base_imponible) = linea.base_imponible {
            st.serialize_field("BaseImponible", &amount(base_imponible))?;
        }
        if let Some(impuesto) = &linea.impuesto {
            st.serialize_field("Impuesto", &ImpuestoXml(impuesto))?;
        }
        if let Some(impuesto_neto) = linea.impuesto_neto {
            st.serialize_field("ImpuestoNeto", &amount(impuesto_neto))?;
        }
        for cargo in &linea.otros_cargos {
            st.serialize_field("OtroCargo", &OtroCargoXml(cargo))?;
        }
        st.serialize_field("MontoTotalLinea", &amount(linea.monto_total_linea()))?;
        st.end()
    }
}

struct DetalleServicioXml<'a>(&'a [InvoiceLine]);

impl<'a> Serialize for DetalleServicioXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("DetalleServicio", 0)?;
        for linea in self.0 {
            st.serialize_field("LineaDetalle", &LineaDetalleXml(linea))?;
        }
        st.end()
    }
}

struct ResumenFacturaXml<'a>(&'a InvoiceSummary);

impl<'a> Serialize for ResumenFacturaXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let resumen = self.0;
        let mut st = s.serialize_struct("ResumenFactura", 0)?;
        st.serialize_field("CodigoMoneda", &resumen.moneda)?;
        if let Some(tipo_cambio) = resumen.tipo_cambio {
            st.serialize_field("TipoCambio", &amount(tipo_cambio))?;
        }
        // Every total is emitted even when zero; the schema requires the
        // full fixed set.
        st.serialize_field("TotalServGravados", &amount(resumen.total_serv_gravados))?;
        st.serialize_field("TotalServExentos", &amount(resumen.total_serv_exentos))?;
        st.serialize_field("TotalServExonerado", &amount(resumen.total_serv_exonerado))?;
        st.serialize_field("TotalServNoSujeto", &amount(resumen.total_serv_no_sujeto))?;
        st.serialize_field("TotalServOtros", &amount(resumen.total_serv_otros))?;
        st.serialize_field(
            "TotalMercanciasGravadas",
            &amount(resumen.total_mercancias_gravadas),
        )?;
        st.serialize_field(
            "TotalMercanciasExentas",
            &amount(resumen.total_mercancias_exentas),
        )?;
        st.serialize_field(
            "TotalMercanciasExoneradas",
            &amount(resumen.total_mercancias_exoneradas),
        )?;
        st.serialize_field(
            "TotalMercanciasNoSujetas",
            &amount(resumen.total_mercancias_no_sujeto),
        )?;
        st.serialize_field(
            "TotalMercanciasOtros",
            &amount(resumen.total_mercancias_otros),
        )?;
        st.serialize_field("TotalGravado", &amount(resumen.total_gravado))?;
        st.serialize_field("TotalExento", &amount(resumen.total_exento))?;
        st.serialize_field("TotalExonerado", &amount(resumen.total_exonerado))?;
        st.serialize_field("TotalNoSujeto", &amount(resumen.total_no_sujeto))?;
        st.serialize_field("TotalOtros", &amount(resumen.total_otros))?;
        st.serialize_field("TotalVenta", &amount(resumen.total_venta))?;
        st.serialize_field("TotalDescuentos", &amount(resumen.total_descuentos))?;
        st.serialize_field("TotalVentaNeta", &amount(resumen.total_venta_neta))?;
        st.serialize_field("TotalImpuesto", &amount(resumen.total_impuestos))?;
        st.serialize_field("TotalIVADevuelto", &amount(resumen.total_iva_devuelto))?;
        st.serialize_field("TotalOtrosCargos", &amount(resumen.total_otros_cargos))?;
        st.serialize_field("TotalComprobante", &amount(resumen.total_comprobante))?;
        st.end()
    }
}

struct OtrosCargosXml<'a>(&'a [OtherCharge]);

impl<'a> Serialize for OtrosCargosXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("OtrosCargos", 0)?;
        for cargo in self.0 {
            st.serialize_field("OtroCargo", &OtroCargoXml(cargo))?;
        }
        st.end()
    }
}

struct ReferenciaXml<'a>(&'a ReferenceInformation);

impl<'a> Serialize for ReferenciaXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let referencia = self.0;
        let mut st = s.serialize_struct("Referencia", 0)?;
        st.serialize_field("TipoDocumento", &referencia.tipo_documento)?;
        st.serialize_field("Numero", &referencia.numero_documento)?;
        st.serialize_field("FechaEmision", &datetime_text(&referencia.fecha_emision))?;
        st.serialize_field("Codigo", &referencia.codigo)?;
        st.serialize_field("Razon", &referencia.razon)?;
        st.end()
    }
}

struct InformacionReferenciaXml<'a>(&'a [ReferenceInformation]);

impl<'a> Serialize for InformacionReferenciaXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("InformacionReferencia", 0)?;
        for referencia in self.0 {
            st.serialize_field("Referencia", &ReferenciaXml(referencia))?;
        }
        st.end()
    }
}

/// Wrapper for serializing an invoice to the v4.4 document.
pub struct InvoiceXml<'a>(pub &'a ElectronicInvoice);

impl<'a> Serialize for InvoiceXml<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let invoice = self.0;
        let mut root = serializer.serialize_struct("FacturaElectronica", 0)?;

        root.serialize_field("@xmlns", NAMESPACE)?;
        root.serialize_field("@xmlns:xsi", XSI_NAMESPACE)?;
        root.serialize_field(
            "@xsi:schemaLocation",
            &format!("{NAMESPACE} {SCHEMA_LOCATION}"),
        )?;

        root.serialize_field("Clave", &invoice.clave)?;
        root.serialize_field("CodigoActividad", &invoice.codigo_actividad)?;
        root.serialize_field("NumeroConsecutivo", &invoice.numero_consecutivo)?;
        root.serialize_field("FechaEmision", &datetime_text(&invoice.fecha_emision))?;
        root.serialize_field("Emisor", &EmisorXml(&invoice.emisor))?;
        if let Some(receptor) = &invoice.receptor {
            root.serialize_field("Receptor", &ReceptorXml(receptor))?;
        }
        root.serialize_field("CondicionVenta", invoice.condicion_venta.as_code())?;
        if let Some(plazo_credito) = &invoice.plazo_credito {
            root.serialize_field("PlazoCredito", plazo_credito)?;
        }
        for medio in invoice.sorted_medios_pago() {
            root.serialize_field("MedioPago", medio.as_code())?;
        }
        root.serialize_field(
            "DetalleServicio",
            &DetalleServicioXml(&invoice.detalle_servicio),
        )?;
        root.serialize_field("ResumenFactura", &ResumenFacturaXml(&invoice.resumen))?;
        if !invoice.otros_cargos.is_empty() {
            root.serialize_field("OtrosCargos", &OtrosCargosXml(&invoice.otros_cargos))?;
        }
        if !invoice.informacion_referencia.is_empty() {
            root.serialize_field(
                "InformacionReferencia",
                &InformacionReferenciaXml(&invoice.informacion_referencia),
            )?;
        }
        root.end()
    }
}

/// Serialize invoices to XML text without validating first.
///
/// [`render_invoice`] is the validating entry point; this trait mirrors it
/// for callers that have already validated (or deliberately skip it).
pub trait ToXml {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, XmlError>;

    fn to_xml(&self) -> Result<String, XmlError> {
        self.to_xml_with_format(XmlFormat::Compact)
    }

    fn to_xml_pretty(&self) -> Result<String, XmlError> {
        self.to_xml_with_format(XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 2,
        })
    }
}

impl ToXml for ElectronicInvoice {
    fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, XmlError> {
        let mut buffer = String::with_capacity(4096);
        buffer.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        buffer.push('\n');

        {
            let mut serializer = QuickXmlSerializer::new(&mut buffer);
            if let XmlFormat::Pretty {
                indent_char,
                indent_size,
            } = format
            {
                serializer.indent(indent_char, indent_size);
            }
            InvoiceXml(self).serialize(serializer)?;
        }

        Ok(buffer)
    }
}

/// Render an invoice to its serialized v4.4 XML form.
///
/// When `validate` is set, [`validate_invoice`] runs first and its failure
/// propagates unchanged.
///
/// # Errors
/// Returns [`XmlError::Validation`] on a violated rule, or
/// [`XmlError::Serialize`] if serialization itself fails.
pub fn render_invoice(invoice: &ElectronicInvoice, validate: bool) -> Result<String, XmlError> {
    render_invoice_with_format(invoice, validate, XmlFormat::Compact)
}

/// [`render_invoice`] with explicit formatting.
pub fn render_invoice_with_format(
    invoice: &ElectronicInvoice,
    validate: bool,
    format: XmlFormat,
) -> Result<String, XmlError> {
    if validate {
        validate_invoice(invoice)?;
    }
    invoice.to_xml_with_format(format)
}

/// Build the invoice as a document tree, ready for signing or inspection.
pub fn invoice_to_document(
    invoice: &ElectronicInvoice,
    validate: bool,
) -> Result<Document, XmlError> {
    let xml = render_invoice(invoice, validate)?;
    Parser::default()
        .parse_string(&xml)
        .map_err(|e| XmlError::Parse(format!("{e:?}")))
}
