mod common;

use common::{sample_invoice, sample_line};
use facturacr_core::invoice::xml::{
    invoice_to_document, render_invoice, render_invoice_with_format, XmlError, XmlFormat,
    NAMESPACE,
};
use facturacr_core::invoice::{Discount, PaymentMethod};
use libxml::parser::Parser;
use libxml::tree::{Document, Node};
use libxml::xpath::Context;
use rust_decimal_macros::dec;

fn parse(xml: &str) -> Document {
    Parser::default().parse_string(xml).expect("well-formed XML")
}

fn xpath_texts(doc: &Document, expr: &str) -> Vec<String> {
    let ctx = Context::new(doc).expect("xpath context");
    ctx.register_namespace("fe", NAMESPACE).expect("register namespace");
    ctx.evaluate(expr)
        .expect("xpath evaluates")
        .get_nodes_as_vec()
        .iter()
        .map(|node| node.get_content())
        .collect()
}

fn first_text(doc: &Document, expr: &str) -> String {
    xpath_texts(doc, expr)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no match for {expr}"))
}

fn element_names(parent: &Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = parent.get_first_child();
    while let Some(node) = current {
        if node.is_element_node() {
            names.push(node.get_name());
        }
        current = node.get_next_sibling();
    }
    names
}

#[test]
fn rendered_invoice_round_trips_key_fields() {
    let invoice = sample_invoice();
    let xml = render_invoice(&invoice, true).unwrap();
    let doc = parse(&xml);

    let root = doc.get_root_element().unwrap();
    assert_eq!(root.get_name(), "FacturaElectronica");
    assert_eq!(first_text(&doc, "/fe:FacturaElectronica/fe:Clave"), invoice.clave);
    assert_eq!(
        first_text(&doc, "//fe:Emisor/fe:Identificacion/fe:Numero"),
        "3101123456"
    );
    assert_eq!(
        first_text(&doc, "//fe:Receptor/fe:Identificacion/fe:Numero"),
        "101230123"
    );
    assert_eq!(first_text(&doc, "//fe:FechaEmision"), "2023-08-01T12:00:00");
    assert_eq!(
        first_text(&doc, "//fe:ResumenFactura/fe:TotalComprobante"),
        "113"
    );
}

#[test]
fn root_children_follow_schema_order() {
    let xml = render_invoice(&sample_invoice(), true).unwrap();
    let doc = parse(&xml);
    let root = doc.get_root_element().unwrap();
    assert_eq!(
        element_names(&root),
        vec![
            "Clave",
            "CodigoActividad",
            "NumeroConsecutivo",
            "FechaEmision",
            "Emisor",
            "Receptor",
            "CondicionVenta",
            "MedioPago",
            "DetalleServicio",
            "ResumenFactura",
        ]
    );
}

#[test]
fn tax_amount_renders_without_trailing_zeros() {
    let xml = render_invoice(&sample_invoice(), true).unwrap();
    let doc = parse(&xml);
    assert_eq!(
        first_text(&doc, "//fe:LineaDetalle/fe:Impuesto/fe:Monto"),
        "13"
    );
}

#[test]
fn exchange_rate_keeps_five_places_and_rounds_half_up() {
    let mut invoice = sample_invoice();
    invoice.resumen.tipo_cambio = Some(dec!(535.12345));
    let doc = parse(&render_invoice(&invoice, true).unwrap());
    assert_eq!(
        first_text(&doc, "//fe:ResumenFactura/fe:TipoCambio"),
        "535.12345"
    );

    let mut invoice = sample_invoice();
    invoice.resumen.tipo_cambio = Some(dec!(2.000005));
    let doc = parse(&render_invoice(&invoice, true).unwrap());
    assert_eq!(
        first_text(&doc, "//fe:ResumenFactura/fe:TipoCambio"),
        "2.00001"
    );
}

#[test]
fn payment_methods_are_deduplicated_and_sorted() {
    let mut invoice = sample_invoice();
    invoice.medios_pago = vec![
        PaymentMethod::Tarjeta,
        PaymentMethod::Efectivo,
        PaymentMethod::Efectivo,
    ];
    let doc = parse(&render_invoice(&invoice, true).unwrap());
    assert_eq!(xpath_texts(&doc, "//fe:MedioPago"), vec!["01", "02"]);
}

#[test]
fn monto_total_linea_is_recomputed() {
    let mut invoice = sample_invoice();
    invoice.detalle_servicio[0].descuento = Some(Discount {
        monto: dec!(10),
        naturaleza: "Descuento comercial".into(),
    });
    let doc = parse(&render_invoice(&invoice, true).unwrap());
    // 100 + 13 - 10
    assert_eq!(
        first_text(&doc, "//fe:LineaDetalle/fe:MontoTotalLinea"),
        "103"
    );
    assert_eq!(
        first_text(&doc, "//fe:LineaDetalle/fe:Descuento/fe:MontoDescuento"),
        "10"
    );
}

#[test]
fn line_code_is_wrapped_with_fixed_type() {
    let doc = parse(&render_invoice(&sample_invoice(), true).unwrap());
    assert_eq!(first_text(&doc, "//fe:LineaDetalle/fe:Codigo/fe:Tipo"), "01");
    assert_eq!(
        first_text(&doc, "//fe:LineaDetalle/fe:Codigo/fe:Codigo"),
        "ABC-123"
    );
}

#[test]
fn summary_emits_every_total_even_when_zero() {
    let doc = parse(&render_invoice(&sample_invoice(), true).unwrap());
    // currency + 22 totals, no TipoCambio for a CRC invoice
    let resumen = xpath_texts(&doc, "//fe:ResumenFactura/*");
    assert_eq!(resumen.len(), 23);
    assert_eq!(
        first_text(&doc, "//fe:ResumenFactura/fe:TotalIVADevuelto"),
        "0"
    );
    assert_eq!(
        first_text(&doc, "//fe:ResumenFactura/fe:TotalMercanciasGravadas"),
        "0"
    );
}

#[test]
fn duplicate_line_numbers_fail_with_field_path() {
    let mut invoice = sample_invoice();
    let mut second = sample_line();
    second.numero_linea = 1;
    invoice.detalle_servicio.push(second);
    match render_invoice(&invoice, true) {
        Err(XmlError::Validation(err)) => assert_eq!(err.field(), "NumeroLinea"),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn validation_can_be_skipped() {
    let mut invoice = sample_invoice();
    invoice.clave = "123".into();
    let xml = render_invoice(&invoice, false).unwrap();
    assert!(xml.contains("<Clave>123</Clave>"));
}

#[test]
fn document_tree_matches_rendered_text() {
    let invoice = sample_invoice();
    let doc = invoice_to_document(&invoice, true).unwrap();
    assert_eq!(
        first_text(&doc, "/fe:FacturaElectronica/fe:Clave"),
        invoice.clave
    );
}

#[test]
fn pretty_format_still_parses() {
    let xml = render_invoice_with_format(
        &sample_invoice(),
        true,
        XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 2,
        },
    )
    .unwrap();
    let doc = parse(&xml);
    assert_eq!(first_text(&doc, "//fe:CondicionVenta"), "01");
}
