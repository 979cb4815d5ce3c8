//! Action request/response payloads consumed by the action processor.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::ActionKindEntity,
    dto::{personalized::PersonalizedState, validation::validate_match_id},
};

/// Kind of mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Start the tournament (owner only, two active participants required).
    Start,
    /// Submit a vote for the participant's current match.
    Pick,
    /// Leave the room.
    Leave,
    /// Refresh the room's idle/expiry timer; no-op on tournament state.
    Extend,
}

impl From<ActionKind> for ActionKindEntity {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Start => ActionKindEntity::Start,
            ActionKind::Pick => ActionKindEntity::Pick,
            ActionKind::Leave => ActionKindEntity::Leave,
            ActionKind::Extend => ActionKindEntity::Extend,
        }
    }
}

/// Vote payload carried by `pick` actions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PickPayload {
    /// The participant's current match, rendered as `r<round>m<position>`.
    pub match_id: String,
    /// Chosen candidate; must be one of the match's two slots.
    pub selected_candidate_id: i64,
    /// Client-reported decision latency in milliseconds.
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

impl Validate for PickPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(err) = validate_match_id(&self.match_id) {
            errors.add("match_id", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// A mutating request for one room.
///
/// `user_id` asserts the acting participant's identity; authentication is an
/// external concern at this boundary.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Acting participant.
    pub user_id: Uuid,
    /// What to do.
    pub action: ActionKind,
    /// Vote payload, required for `pick` actions.
    #[serde(default)]
    #[validate(nested)]
    pub payload: Option<PickPayload>,
    /// Client token making retries of this exact request no-ops.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

/// Result of processing an action.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    /// Whether the action was accepted (including idempotent no-ops).
    pub success: bool,
    /// Personalized state after processing, absent on rejection.
    pub state: Option<PersonalizedState>,
    /// Validation error description, present on rejection.
    pub error: Option<String>,
}

impl ActionResponse {
    /// Successful outcome carrying the caller's personalized state.
    pub fn ok(state: PersonalizedState) -> Self {
        Self {
            success: true,
            state: Some(state),
            error: None,
        }
    }

    /// Typed validation rejection; no state was mutated.
    pub fn rejected(error: String) -> Self {
        Self {
            success: false,
            state: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_payload_validates_the_match_id() {
        let good = PickPayload {
            match_id: "r1m0".into(),
            selected_candidate_id: 42,
            response_time_ms: None,
        };
        assert!(good.validate().is_ok());

        let bad = PickPayload {
            match_id: "first-match".into(),
            selected_candidate_id: 42,
            response_time_ms: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn action_request_accepts_camel_case_wire_format() {
        let raw = r#"{
            "userId": "6dbdee0e-3b54-4d52-8a9b-2b1e01f2a111",
            "action": "pick",
            "payload": {"matchId": "r2m1", "selectedCandidateId": 680, "responseTimeMs": 1500},
            "idempotencyKey": "retry-1"
        }"#;

        let request: ActionRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.action, ActionKind::Pick);
        let payload = request.payload.unwrap();
        assert_eq!(payload.match_id, "r2m1");
        assert_eq!(payload.selected_candidate_id, 680);
        assert_eq!(payload.response_time_ms, Some(1500));
        assert_eq!(request.idempotency_key.as_deref(), Some("retry-1"));
    }
}
