//! Hacienda reception API client (v1).
//!
//! Thin boundary over the reception service: token acquisition, submission
//! of signed comprobantes and status lookup by clave. The client never
//! retries on its own — resubmitting an accepted comprobante has fiscal
//! consequences, so retry policy stays with the caller.
use base64ct::{Base64, Encoding};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::invoice::{ElectronicInvoice, Identification};

/// Errors returned by the reception API client.
#[derive(Debug, Error)]
pub enum HaciendaError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not authenticated with Hacienda")]
    NotAuthenticated,
    #[error("Hacienda auth response carried no token (status {status})")]
    MissingToken { status: u16, payload: Value },
    #[error("Hacienda rejected the request (status {status})")]
    Api { status: u16, payload: Value },
}

/// Reception API client.
///
/// # Examples
/// ```rust,no_run
/// use facturacr_core::api::HaciendaClient;
/// use facturacr_core::config::Config;
///
/// let client = HaciendaClient::new(Config::default())?;
/// # let _ = client;
/// # Ok::<(), facturacr_core::api::HaciendaError>(())
/// ```
#[derive(Debug)]
pub struct HaciendaClient {
    config: Config,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HaciendaClient {
    /// Create a new client using the provided configuration. The base URL
    /// can be overridden through `FACTURACR_BASE_URL` for test harnesses.
    ///
    /// # Errors
    /// Returns [`HaciendaError::Http`] if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, HaciendaError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let base_url = std::env::var("FACTURACR_BASE_URL")
            .ok()
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| config.env().endpoint_url().to_string());

        Ok(Self {
            config,
            client,
            base_url,
            token: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token currently in use, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Install an already-obtained bearer token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Request a bearer token and keep it for subsequent calls.
    ///
    /// # Errors
    /// Returns [`HaciendaError::Api`] on any status ≥ 400 and
    /// [`HaciendaError::MissingToken`] if the response lacks a token field.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<String, HaciendaError> {
        let response = self
            .client
            .post(format!("{}/auth", self.base_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let (status, payload) = read_payload(response).await;
        if status >= 400 {
            return Err(HaciendaError::Api { status, payload });
        }
        match payload.get("token").and_then(Value::as_str) {
            Some(token) => {
                let token = token.to_string();
                self.token = Some(token.clone());
                Ok(token)
            }
            None => Err(HaciendaError::MissingToken { status, payload }),
        }
    }

    /// Submit a signed comprobante.
    ///
    /// `signed_xml` is the self-contained signed document; it is
    /// base64-encoded into the request body together with the invoice's key
    /// fields.
    ///
    /// # Errors
    /// Returns [`HaciendaError::NotAuthenticated`] without a token and
    /// [`HaciendaError::Api`] on any status ≥ 400.
    pub async fn submit_invoice(
        &self,
        invoice: &ElectronicInvoice,
        signed_xml: &[u8],
        receptor_consecutivo: Option<&str>,
    ) -> Result<Value, HaciendaError> {
        let token = self.token.as_deref().ok_or(HaciendaError::NotAuthenticated)?;
        let payload = reception_payload(invoice, signed_xml, receptor_consecutivo);
        let response = self
            .client
            .post(format!("{}/recepcion", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        process_response(response).await
    }

    /// Look up the processing status of a comprobante by clave.
    pub async fn fetch_status(&self, clave: &str) -> Result<Value, HaciendaError> {
        let token = self.token.as_deref().ok_or(HaciendaError::NotAuthenticated)?;
        let response = self
            .client
            .get(format!("{}/recepcion/{clave}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        process_response(response).await
    }
}

/// Request body for `POST /recepcion`. Pure and side-effect free so the
/// shape can be asserted without a network.
pub fn reception_payload(
    invoice: &ElectronicInvoice,
    signed_xml: &[u8],
    receptor_consecutivo: Option<&str>,
) -> Value {
    let mut payload = json!({
        "clave": invoice.clave,
        "fecha": invoice.fecha_emision.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "emisor": identification_payload(&invoice.emisor.identificacion),
        "comprobanteXml": Base64::encode_string(signed_xml),
    });
    if let Some(identificacion) = invoice
        .receptor
        .as_ref()
        .and_then(|receptor| receptor.identificacion.as_ref())
    {
        payload["receptor"] = identification_payload(identificacion);
    }
    if let Some(consecutivo) = receptor_consecutivo {
        payload["consecutivoReceptor"] = Value::String(consecutivo.to_string());
    }
    payload
}

fn identification_payload(identificacion: &Identification) -> Value {
    json!({
        "tipoIdentificacion": identificacion.tipo.as_code(),
        "numeroIdentificacion": identificacion.numero,
    })
}

async fn read_payload(response: Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
    (status, payload)
}

async fn process_response(response: Response) -> Result<Value, HaciendaError> {
    let (status, payload) = read_payload(response).await;
    if status >= 400 {
        return Err(HaciendaError::Api { status, payload });
    }
    Ok(payload)
}
