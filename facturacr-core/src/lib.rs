//! Rust toolkit for Costa Rica's Hacienda v4.4 electronic invoicing
//! (comprobantes electrónicos): invoice model, Anexo 4.4 validation, XML
//! generation, enveloped XMLDSig signing and the reception API client.
//!
//! # Examples
//! ```rust
//! use facturacr_core::config::{Config, EnvironmentType};
//!
//! let config = Config::new(EnvironmentType::Sandbox);
//! # let _ = config;
//! ```
pub mod api;
pub mod config;
pub mod invoice;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] invoice::ValidationError),
    #[error(transparent)]
    Catalog(#[from] invoice::CatalogError),
    #[error(transparent)]
    Xml(#[from] invoice::xml::XmlError),
    #[error(transparent)]
    Signing(#[from] invoice::sign::SigningError),
    #[error(transparent)]
    Certificate(#[from] invoice::sign::CertificateError),
    #[error(transparent)]
    Clave(#[from] invoice::clave::ClaveError),
    #[error(transparent)]
    Api(#[from] api::HaciendaError),
    #[error(transparent)]
    Environment(#[from] config::EnvironmentParseError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::api::HaciendaError;
    use crate::config::EnvironmentParseError;
    use crate::invoice::clave::ClaveError;
    use crate::invoice::sign::{CertificateError, SigningError};
    use crate::invoice::xml::XmlError;
    use crate::invoice::{CatalogError, ValidationError};

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = ValidationError::new("Clave", "clave must be exactly 50 digits").into();
        assert!(matches!(err, Error::Validation(_)));

        let err: Error = CatalogError::UnknownPaymentMethod("42".into()).into();
        assert!(matches!(err, Error::Catalog(_)));

        let err: Error = XmlError::Parse("bad".into()).into();
        assert!(matches!(err, Error::Xml(_)));

        let err: Error = SigningError::MalformedXml("bad".into()).into();
        assert!(matches!(err, Error::Signing(_)));

        let err: Error = CertificateError::MissingKey.into();
        assert!(matches!(err, Error::Certificate(_)));

        let err: Error = ClaveError::InvalidConsecutivo("123".into()).into();
        assert!(matches!(err, Error::Clave(_)));

        let err: Error = HaciendaError::NotAuthenticated.into();
        assert!(matches!(err, Error::Api(_)));

        let err: Error = EnvironmentParseError::Unknown {
            input: "staging".into(),
        }
        .into();
        assert!(matches!(err, Error::Environment(_)));
    }
}
