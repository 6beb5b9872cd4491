//! Async facade over [`CoreState`].
//!
//! Every scheduling call touches SQLite and may block, so `ClinicService`
//! runs it on tokio's blocking pool. Failures convert to a structured JSON
//! body for whichever transport sits in front.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::authorization::Caller;
use crate::core_state::CoreState;
use crate::models::*;
use crate::scheduling::SchedulingError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Scheduling(err) => err.code(),
            Self::Join(_) => "INTERNAL",
        }
    }
}

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        let code = err.code();
        let message = if code == "INTERNAL" {
            tracing::error!(error = %err, "Scheduling internal error");
            "An internal error occurred".to_string()
        } else {
            err.to_string()
        };
        Self {
            error: ErrorDetail { code, message },
        }
    }
}

#[derive(Clone)]
pub struct ClinicService {
    core: Arc<CoreState>,
}

impl ClinicService {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Arc<CoreState> {
        &self.core
    }

    /// Run a blocking core call on a dedicated thread.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&CoreState) -> Result<T, SchedulingError> + Send + 'static,
        T: Send + 'static,
    {
        let core = Arc::clone(&self.core);
        Ok(tokio::task::spawn_blocking(move || f(&core)).await??)
    }

    pub async fn create_appointment(
        &self,
        caller: Caller,
        request: NewAppointment,
    ) -> Result<Appointment, ServiceError> {
        self.run(move |core| core.create_appointment(&caller, &request)).await
    }

    pub async fn approve_appointment(
        &self,
        caller: Caller,
        id: Uuid,
    ) -> Result<Appointment, ServiceError> {
        self.run(move |core| core.approve_appointment(&caller, &id)).await
    }

    pub async fn reject_appointment(
        &self,
        caller: Caller,
        id: Uuid,
        reason: String,
    ) -> Result<Appointment, ServiceError> {
        self.run(move |core| core.reject_appointment(&caller, &id, &reason)).await
    }

    pub async fn cancel_appointment(
        &self,
        caller: Caller,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, ServiceError> {
        self.run(move |core| core.cancel_appointment(&caller, &id, reason.as_deref()))
            .await
    }

    pub async fn find_appointment(
        &self,
        caller: Caller,
        id: Uuid,
    ) -> Result<AppointmentDetails, ServiceError> {
        self.run(move |core| core.find_appointment(&caller, &id)).await
    }

    pub async fn list_visible(
        &self,
        caller: Caller,
    ) -> Result<Vec<AppointmentDetails>, ServiceError> {
        self.run(move |core| core.list_visible(&caller)).await
    }
}
