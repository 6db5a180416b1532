//! Enveloped XMLDSig signing with Hacienda PKCS#12 credentials.
//!
//! The profile is fixed and minimal: a single reference with empty URI,
//! enveloped-signature plus exclusive-c14n transforms, SHA-256 digests and
//! an RSA PKCS#1 v1.5 signature. Hacienda verifies the construction
//! byte-for-byte, so the `SignedInfo` fragment is built directly in its
//! exclusive-canonical form rather than relying on a serializer's choices.
use base64ct::{Base64, Encoding};
use libxml::parser::Parser;
use libxml::tree::{c14n, Document};
use p12_keystore::{KeyStore, Pkcs12ImportPolicy};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use thiserror::Error;
use x509_cert::der::Decode;
use x509_cert::Certificate;

/// XMLDSig namespace.
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const SHA256_METHOD: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Errors loading the PKCS#12 credential.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("PKCS#12 container is not valid base64")]
    InvalidBase64,
    #[error("could not decode PKCS#12 container: {0}")]
    Container(String),
    #[error("PKCS#12 container holds no private key")]
    MissingKey,
    #[error("PKCS#12 container holds no certificate")]
    MissingCertificate,
    #[error("an RSA private key is required: {0}")]
    UnsupportedKey(String),
    #[error("could not parse signing certificate: {0}")]
    Certificate(String),
}

/// Errors produced while signing a document.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error("malformed XML input: {0}")]
    MalformedXml(String),
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    #[error("failed to assemble signature element: {0}")]
    Assembly(String),
}

/// Signs serialized comprobantes with an issued Hacienda credential.
#[derive(Debug)]
pub struct XmlSigner {
    signing_key: SigningKey<Sha256>,
    certificate_der: Vec<u8>,
    chain_der: Vec<Vec<u8>>,
    key_name: String,
}

impl XmlSigner {
    /// Load a signer from raw PKCS#12 bytes.
    ///
    /// # Errors
    /// Returns [`CertificateError`] if the container cannot be decrypted
    /// with the given password, holds no private key or certificate, or the
    /// key is not RSA.
    pub fn from_pkcs12(p12: &[u8], password: &str) -> Result<Self, CertificateError> {
        let keystore = KeyStore::from_pkcs12(p12, password, Pkcs12ImportPolicy::default())
            .map_err(|e| CertificateError::Container(e.to_string()))?;
        let (_, key_chain) = keystore
            .private_key_chain()
            .ok_or(CertificateError::MissingKey)?;
        let mut chain = key_chain.certs().iter().map(|cert| cert.as_der().to_vec());
        let leaf = chain.next().ok_or(CertificateError::MissingCertificate)?;
        Self::from_der(&leaf, key_chain.key().as_der(), chain.collect())
    }

    /// Load a signer from a base64-encoded PKCS#12 container, the form in
    /// which credentials are commonly stored in configuration records.
    pub fn from_pkcs12_base64(p12: &str, password: &str) -> Result<Self, CertificateError> {
        let raw: String = p12.split_whitespace().collect();
        let bytes = Base64::decode_vec(&raw).map_err(|_| CertificateError::InvalidBase64)?;
        Self::from_pkcs12(&bytes, password)
    }

    /// Build a signer from already-extracted DER material: the leaf
    /// certificate, a PKCS#8 RSA private key, and any chain certificates.
    pub fn from_der(
        certificate_der: &[u8],
        private_key_der: &[u8],
        chain_der: Vec<Vec<u8>>,
    ) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_der(certificate_der)
            .map_err(|e| CertificateError::Certificate(e.to_string()))?;
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .map_err(|e| CertificateError::UnsupportedKey(e.to_string()))?;
        let key_name = certificate.tbs_certificate.subject.to_string();
        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            certificate_der: certificate_der.to_vec(),
            chain_der,
            key_name,
        })
    }

    /// RFC 4514 subject name of the leaf certificate, emitted as `KeyName`.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Sign a serialized document with an enveloped signature.
    ///
    /// The digest covers the exclusive-c14n form of the document as given,
    /// before the `Signature` element is appended as the last child of the
    /// root. The output carries an XML declaration and UTF-8 encoding.
    ///
    /// # Errors
    /// Returns [`SigningError::MalformedXml`] if the input does not parse.
    pub fn sign_xml(&self, xml: &str) -> Result<String, SigningError> {
        let mut doc = Parser::default()
            .parse_string(xml)
            .map_err(|e| SigningError::MalformedXml(format!("{e:?}")))?;

        let digest = document_digest_base64(&doc)?;
        let signed_info = canonical_signed_info(&digest);
        let signature = self.signing_key.sign(signed_info.as_bytes());
        let signature_b64 = Base64::encode_string(&signature.to_bytes());

        let signature_xml = self.signature_fragment(&signed_info, &signature_b64);
        append_signature(&mut doc, &signature_xml)?;
        Ok(doc.to_string())
    }

    fn signature_fragment(&self, signed_info: &str, signature_b64: &str) -> String {
        let mut certificates = String::new();
        let _ = write!(
            certificates,
            "<ds:X509Certificate>{}</ds:X509Certificate>",
            Base64::encode_string(&self.certificate_der)
        );
        for chain_cert in &self.chain_der {
            let _ = write!(
                certificates,
                "<ds:X509Certificate>{}</ds:X509Certificate>",
                Base64::encode_string(chain_cert)
            );
        }
        format!(
            "<ds:Signature xmlns:ds=\"{DS_NS}\">{signed_info}\
             <ds:SignatureValue>{signature_b64}</ds:SignatureValue>\
             <ds:KeyInfo><ds:KeyName>{}</ds:KeyName>\
             <ds:X509Data>{certificates}</ds:X509Data></ds:KeyInfo></ds:Signature>",
            escape_text(&self.key_name)
        )
    }
}

/// Base64 SHA-256 over the exclusive-c14n form of the document.
///
/// Verifiers reproduce `DigestValue` by stripping the `Signature` element
/// and calling this on what remains.
pub fn document_digest_base64(doc: &Document) -> Result<String, SigningError> {
    let canonical = canonicalize(doc)?;
    Ok(Base64::encode_string(&Sha256::digest(canonical.as_bytes())))
}

fn canonicalize(doc: &Document) -> Result<String, SigningError> {
    let options = c14n::CanonicalizationOptions {
        mode: c14n::CanonicalizationMode::ExclusiveCanonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    };
    doc.canonicalize(options, None)
        .map_err(|e| SigningError::Canonicalization(format!("{e:?}")))
}

/// The `SignedInfo` element in its exclusive-canonical form.
///
/// Whitespace is significant: the string is signed exactly as produced
/// here, and a verifier re-canonicalizing the parsed element must obtain
/// the same bytes. Empty elements therefore use expanded end tags and the
/// namespace declaration sits on `SignedInfo` itself.
pub fn canonical_signed_info(digest_b64: &str) -> String {
    format!(
        "<ds:SignedInfo xmlns:ds=\"{DS_NS}\">\
         <ds:CanonicalizationMethod Algorithm=\"{EXC_C14N}\"></ds:CanonicalizationMethod>\
         <ds:SignatureMethod Algorithm=\"{RSA_SHA256}\"></ds:SignatureMethod>\
         <ds:Reference URI=\"\">\
         <ds:Transforms>\
         <ds:Transform Algorithm=\"{ENVELOPED_SIGNATURE}\"></ds:Transform>\
         <ds:Transform Algorithm=\"{EXC_C14N}\"></ds:Transform>\
         </ds:Transforms>\
         <ds:DigestMethod Algorithm=\"{SHA256_METHOD}\"></ds:DigestMethod>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>\
         </ds:SignedInfo>"
    )
}

fn append_signature(doc: &mut Document, signature_xml: &str) -> Result<(), SigningError> {
    let fragment = Parser::default()
        .parse_string(signature_xml)
        .map_err(|e| SigningError::Assembly(format!("{e:?}")))?;
    let mut node = fragment
        .get_root_element()
        .ok_or_else(|| SigningError::Assembly("missing signature fragment root".into()))?;
    node.unlink();
    let mut imported = doc
        .import_node(&mut node)
        .map_err(|_| SigningError::Assembly("failed to import signature fragment".into()))?;
    let mut root = doc
        .get_root_element()
        .ok_or_else(|| SigningError::MalformedXml("document has no root element".into()))?;
    root.add_child(&mut imported)
        .map_err(|e| SigningError::Assembly(e.to_string()))?;
    Ok(())
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#xD;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
