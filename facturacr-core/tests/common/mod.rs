#![allow(dead_code)]
use chrono::{NaiveDate, NaiveDateTime};
use facturacr_core::invoice::{
    ElectronicInvoice, Emisor, Identification, IdentificationType, InvoiceLine, InvoiceSummary,
    PaymentMethod, Receptor, SaleCondition, Tax,
};
use rust_decimal_macros::dec;

pub const SAMPLE_CLAVE: &str = "50612122300310112345600100001010000000001111111111";

pub fn issue_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 8, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn sample_emisor() -> Emisor {
    Emisor {
        nombre: "Mi Empresa S.A.".into(),
        identificacion: Identification::new(IdentificationType::CedulaJuridica, "3101123456"),
        nombre_comercial: None,
        ubicacion: None,
        telefono: None,
        fax: None,
        correo_electronico: None,
    }
}

pub fn sample_receptor() -> Receptor {
    Receptor {
        nombre: "Cliente de Ejemplo".into(),
        identificacion: Some(Identification::new(
            IdentificationType::CedulaFisica,
            "101230123",
        )),
        identificacion_extranjero: None,
        nombre_comercial: None,
        ubicacion: None,
        telefono: None,
        fax: None,
        correo_electronico: None,
    }
}

pub fn sample_line() -> InvoiceLine {
    InvoiceLine {
        numero_linea: 1,
        codigo: Some("ABC-123".into()),
        cantidad: dec!(1),
        unidad_medida: "Unid".into(),
        detalle: "Servicio profesional".into(),
        precio_unitario: dec!(100.00),
        monto_total: dec!(100.00),
        sub_total: dec!(100.00),
        base_imponible: None,
        impuesto: Some(Tax {
            codigo: "01".into(),
            codigo_tarifa: None,
            tarifa: dec!(13),
            monto: dec!(13),
            factor_iva: None,
            exoneracion: None,
        }),
        impuesto_neto: None,
        descuento: None,
        otros_cargos: Vec::new(),
    }
}

pub fn sample_summary() -> InvoiceSummary {
    InvoiceSummary {
        total_serv_gravados: dec!(100.00),
        total_gravado: dec!(100.00),
        total_venta: dec!(100.00),
        total_venta_neta: dec!(100.00),
        total_impuestos: dec!(13.00),
        total_comprobante: dec!(113.00),
        ..InvoiceSummary::new("CRC", None)
    }
}

pub fn sample_invoice() -> ElectronicInvoice {
    ElectronicInvoice {
        clave: SAMPLE_CLAVE.into(),
        codigo_actividad: "620101".into(),
        numero_consecutivo: "00100001010000000001".into(),
        fecha_emision: issue_datetime(),
        emisor: sample_emisor(),
        receptor: Some(sample_receptor()),
        condicion_venta: SaleCondition::Contado,
        plazo_credito: None,
        medios_pago: vec![PaymentMethod::Efectivo],
        detalle_servicio: vec![sample_line()],
        resumen: sample_summary(),
        informacion_referencia: Vec::new(),
        otros_cargos: Vec::new(),
    }
}
