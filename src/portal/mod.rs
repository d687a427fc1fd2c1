pub mod document;

use serde_json::Value;
use tracing::debug;

use crate::auth::session::Session;
use crate::error::{PortalError, Result};

pub const LOGIN_TRIGGER_PATH: &str = "/services/doAuth.php";
pub const DATA_ENDPOINT: &str = "/services/data.php";
pub const INITIAL_DATA_QUERY: &str = "dataPremièreConnexion";
pub const GRADES_QUERY: &str = "relevéEtudiant";

/// Read access to the portal's JSON query endpoint. The gateway only
/// answers POST, even for reads.
pub struct PortalClient<'a> {
    session: &'a Session,
}

impl<'a> PortalClient<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn initial_data(&self) -> Result<Value> {
        self.query(INITIAL_DATA_QUERY, &[]).await
    }

    pub async fn grades(&self, semester_id: &str) -> Result<Value> {
        self.query(GRADES_QUERY, &[("semestre", semester_id)]).await
    }

    async fn query(&self, name: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = self.session.url(DATA_ENDPOINT);
        let mut query = vec![("q", name)];
        query.extend_from_slice(params);
        debug!("POST {url} q={name}");

        let response = self.session.post(url.as_str()).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::FetchFailed {
                query: name.to_string(),
                status,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
