//! HTTP client for the location history endpoints.
use crate::error::ClientError;
use crate::session::Session;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use triptrack_common::{
    AppendLocationRequest, ErrorResponse, LatestLocationResponse, LocationRecord,
};

/// Error code the server uses for "no sample stored"
const NO_LOCATION_CODE: &str = "LOCATION_001";

/// Upper bound on one history request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Durable location history
#[async_trait]
pub trait LocationApi: Send + Sync {
    /// Record a fix for a booking
    async fn append(&self, booking_id: &str, latitude: f64, longitude: f64) -> Result<(), ClientError>;

    /// Newest stored fix, `None` when the booking has no history
    async fn latest(&self, booking_id: &str) -> Result<Option<LocationRecord>, ClientError>;
}

/// [`LocationApi`] backed by the server's HTTP endpoints
#[derive(Clone)]
pub struct HttpLocationApi {
    client: Client,
    base_url: String,
    session: Session,
}

impl HttpLocationApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: &str, session: Session) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    async fn error_from(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => "unexpected response".to_string(),
        };
        ClientError::Status { status, message }
    }
}

#[async_trait]
impl LocationApi for HttpLocationApi {
    async fn append(&self, booking_id: &str, latitude: f64, longitude: f64) -> Result<(), ClientError> {
        let body = AppendLocationRequest {
            booking_id: Some(booking_id.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        };

        let response = self
            .client
            .post(format!("{}/locations", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn latest(&self, booking_id: &str) -> Result<Option<LocationRecord>, ClientError> {
        let response = self
            .client
            .get(format!("{}/locations/{booking_id}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: LatestLocationResponse = response.json().await?;
                Ok(Some(body.location))
            },
            StatusCode::NOT_FOUND => {
                let status = response.status().as_u16();
                let body: ErrorResponse = response.json().await?;
                if body.code.as_deref() == Some(NO_LOCATION_CODE) {
                    Ok(None)
                } else {
                    Err(ClientError::Status {
                        status,
                        message: body.message,
                    })
                }
            },
            _ => Err(Self::error_from(response).await),
        }
    }
}
