use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use consultation_cell::{ConsultationError, ConsultationService, ConsultationStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{Call, CallError, CallStatus, EndCallRequest, InitiateCallRequest};
use crate::services::lifecycle::CallLifecycle;

/// Voice and video calls between the two participants of a consultation.
pub struct CallService {
    supabase: SupabaseClient,
    consultations: ConsultationService,
    lifecycle: CallLifecycle,
}

impl CallService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            consultations: ConsultationService::new(config),
            lifecycle: CallLifecycle::new(),
        }
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        // `Z` rather than `+00:00` so the value survives a query string.
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    async fn fetch_call(&self, call_id: Uuid, auth_token: &str) -> Result<Call, CallError> {
        let path = format!("/rest/v1/calls?id=eq.{}", call_id);
        let result: Vec<Call> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        result.into_iter().next().ok_or(CallError::CallNotFound)
    }

    /// Writes a transition guarded on the status the caller observed.
    async fn update_call(
        &self,
        call: &Call,
        body: Value,
        auth_token: &str,
    ) -> Result<Call, CallError> {
        let path = format!("/rest/v1/calls?id=eq.{}&status=eq.{}", call.id, call.status);
        let result: Vec<Call> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(CallError::StaleCall)
    }

    async fn mark_missed(&self, call: &Call, auth_token: &str) -> Result<Call, CallError> {
        self.lifecycle.validate_transition(call.status, CallStatus::Missed, "marked missed")?;

        let missed = self.update_call(
            call,
            json!({
                "status": CallStatus::Missed,
                "ended_at": Self::timestamp(Utc::now()),
                "duration_seconds": 0,
                "end_reason": "timeout",
            }),
            auth_token,
        ).await?;

        info!("Call {} rang out and was marked missed", call.id);
        Ok(missed)
    }

    pub async fn initiate_call(
        &self,
        user: &User,
        request: InitiateCallRequest,
        auth_token: &str,
    ) -> Result<Call, CallError> {
        let consultation = self.consultations
            .get_consultation(request.consultation_id, auth_token)
            .await?;

        let callee_id = consultation
            .counterpart_of(&user.id)
            .ok_or_else(|| CallError::unauthorized("only consultation participants can place calls"))?;

        if !self.consultations.lifecycle().allows_communication(consultation.status) {
            return Err(CallError::ConsultationClosed { status: consultation.status });
        }
        if !request.call_type.permitted_in(consultation.consultation_type) {
            return Err(CallError::CallTypeNotPermitted {
                call_type: request.call_type,
                consultation_type: consultation.consultation_type,
            });
        }

        let open_path = format!(
            "/rest/v1/calls?consultation_id=eq.{}&status=in.(initiated,active)",
            consultation.id
        );
        let open_calls: Vec<Call> = self.supabase.request(Method::GET, &open_path, Some(auth_token), None).await?;

        let now = Utc::now();
        for open in &open_calls {
            if self.lifecycle.ring_expired(open, now) {
                self.mark_missed(open, auth_token).await?;
            } else {
                return Err(CallError::CallInProgress);
            }
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "consultation_id": consultation.id,
            "caller_id": user.id,
            "callee_id": callee_id,
            "call_type": request.call_type,
            "status": CallStatus::Initiated,
            "initiated_at": Self::timestamp(now),
            "answered_at": null,
            "ended_at": null,
            "duration_seconds": null,
            "end_reason": null,
        });

        let result: Vec<Call> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/calls",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let call = result.into_iter().next().ok_or_else(|| CallError::DatabaseError {
            message: "Call was not stored".to_string(),
        })?;

        info!(
            "{} call {} placed by {} to {} in consultation {}",
            call.call_type, call.id, call.caller_id, call.callee_id, call.consultation_id
        );
        Ok(call)
    }

    pub async fn accept_call(&self, user: &User, call_id: Uuid, auth_token: &str) -> Result<Call, CallError> {
        let call = self.fetch_call(call_id, auth_token).await?;

        if !call.is_callee(&user.id) {
            return Err(CallError::unauthorized("only the callee can accept a call"));
        }
        self.lifecycle.validate_transition(call.status, CallStatus::Active, "accepted")?;

        if self.lifecycle.ring_expired(&call, Utc::now()) {
            self.mark_missed(&call, auth_token).await?;
            return Err(CallError::CallExpired);
        }

        let accepted = self.update_call(
            &call,
            json!({
                "status": CallStatus::Active,
                "answered_at": Self::timestamp(Utc::now()),
            }),
            auth_token,
        ).await?;

        let consultation = self.consultations
            .get_consultation(accepted.consultation_id, auth_token)
            .await?;
        if consultation.status == ConsultationStatus::Scheduled {
            match self.consultations
                .set_status(&consultation, ConsultationStatus::Active, None, auth_token)
                .await
            {
                Ok(_) => debug!("Consultation {} started by call {}", consultation.id, accepted.id),
                // Another request already moved it on.
                Err(ConsultationError::StaleConsultation) => {
                    warn!("Consultation {} changed while call {} was accepted", consultation.id, accepted.id)
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Call {} accepted by {}", accepted.id, user.id);
        Ok(accepted)
    }

    pub async fn reject_call(&self, user: &User, call_id: Uuid, auth_token: &str) -> Result<Call, CallError> {
        let call = self.fetch_call(call_id, auth_token).await?;

        if !call.is_callee(&user.id) {
            return Err(CallError::unauthorized("only the callee can reject a call"));
        }
        self.lifecycle.validate_transition(call.status, CallStatus::Rejected, "rejected")?;

        let rejected = self.update_call(
            &call,
            json!({
                "status": CallStatus::Rejected,
                "ended_at": Self::timestamp(Utc::now()),
                "duration_seconds": 0,
                "end_reason": "rejected",
            }),
            auth_token,
        ).await?;

        info!("Call {} rejected by {}", rejected.id, user.id);
        Ok(rejected)
    }

    pub async fn end_call(
        &self,
        user: &User,
        call_id: Uuid,
        request: EndCallRequest,
        auth_token: &str,
    ) -> Result<Call, CallError> {
        let call = self.fetch_call(call_id, auth_token).await?;

        if !call.is_participant(&user.id) {
            return Err(CallError::unauthorized("only call participants can end a call"));
        }
        self.lifecycle.validate_transition(call.status, CallStatus::Ended, "ended")?;

        let ended_at = Utc::now();
        let reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.lifecycle.default_end_reason(call.status).to_string());

        let ended = self.update_call(
            &call,
            json!({
                "status": CallStatus::Ended,
                "ended_at": Self::timestamp(ended_at),
                "duration_seconds": self.lifecycle.duration_seconds(&call, ended_at),
                "end_reason": reason,
            }),
            auth_token,
        ).await?;

        info!(
            "Call {} ended by {} after {}s ({})",
            ended.id,
            user.id,
            ended.duration_seconds.unwrap_or(0),
            reason
        );
        Ok(ended)
    }

    pub async fn get_call(&self, user: &User, call_id: Uuid, auth_token: &str) -> Result<Call, CallError> {
        let call = self.fetch_call(call_id, auth_token).await?;

        if !call.is_participant(&user.id) && !user.is_admin() {
            return Err(CallError::unauthorized("not a participant of this call"));
        }

        Ok(call)
    }

    pub async fn list_consultation_calls(
        &self,
        user: &User,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Call>, CallError> {
        let consultation = self.consultations
            .get_for_user(user, consultation_id, auth_token)
            .await?;

        let path = format!(
            "/rest/v1/calls?consultation_id=eq.{}&order=initiated_at.desc",
            consultation.id
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    /// The caller's ringing or connected call, if any. Calls that rang out
    /// are marked missed on the way.
    pub async fn get_active_call(&self, user: &User, auth_token: &str) -> Result<Option<Call>, CallError> {
        let path = format!(
            "/rest/v1/calls?or=(caller_id.eq.{0},callee_id.eq.{0})&status=in.(initiated,active)&order=initiated_at.desc",
            user.id
        );
        let open_calls: Vec<Call> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let now = Utc::now();
        for call in open_calls {
            if !self.lifecycle.ring_expired(&call, now) {
                return Ok(Some(call));
            }
            match self.mark_missed(&call, auth_token).await {
                Ok(_) => {}
                // Someone else answered or expired it first.
                Err(CallError::StaleCall) => debug!("Call {} changed while expiring", call.id),
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Marks every call that rang past the timeout as missed.
    pub async fn expire_stale_calls(&self, user: &User, auth_token: &str) -> Result<usize, CallError> {
        if !user.is_admin() {
            return Err(CallError::unauthorized("only administrators can expire calls"));
        }

        let now = Utc::now();
        let path = format!(
            "/rest/v1/calls?status=eq.initiated&initiated_at=lt.{}",
            Self::timestamp(self.lifecycle.stale_cutoff(now))
        );
        let expired: Vec<Call> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "status": CallStatus::Missed,
                "ended_at": Self::timestamp(now),
                "duration_seconds": 0,
                "end_reason": "timeout",
            })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        info!("Expired {} unanswered calls", expired.len());
        Ok(expired.len())
    }
}
