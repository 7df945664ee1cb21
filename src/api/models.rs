//! API request/response models
//!
//! Wire DTOs for the matchmaking endpoints. Field names stay camelCase
//! on the wire for client compatibility.

use serde::{Deserialize, Serialize};

/// Body of POST /match/join and POST /match/cancel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub user_id: String,
    pub bet: u64,
}

/// Response to POST /match/join
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl JoinResponse {
    pub fn waiting() -> Self {
        Self {
            matched: false,
            opponent: None,
            room_id: None,
        }
    }

    pub fn matched(opponent: String, room_id: String) -> Self {
        Self {
            matched: true,
            opponent: Some(opponent),
            room_id: Some(room_id),
        }
    }
}

/// Response to POST /match/cancel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Body of POST /match/result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    pub room_id: String,
    pub winner_id: String,
}

/// Response to POST /match/result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub winner_id: String,
    pub loser_id: String,
    pub win_amount: i64,
    pub lose_amount: i64,
    pub fee: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_response_omits_empty_fields() {
        let json = serde_json::to_string(&JoinResponse::waiting()).unwrap();
        assert_eq!(json, r#"{"matched":false}"#);

        let json =
            serde_json::to_string(&JoinResponse::matched("bob".into(), "r-1".into())).unwrap();
        assert!(json.contains(r#""matched":true"#));
        assert!(json.contains(r#""roomId":"r-1""#));
    }

    #[test]
    fn test_match_request_wire_names() {
        let request: MatchRequest =
            serde_json::from_str(r#"{"userId":"alice","bet":100}"#).unwrap();
        assert_eq!(request.user_id, "alice");
        assert_eq!(request.bet, 100);
    }

    #[test]
    fn test_result_request_wire_names() {
        let request: ResultRequest =
            serde_json::from_str(r#"{"roomId":"r-1","winnerId":"alice"}"#).unwrap();
        assert_eq!(request.room_id, "r-1");
        assert_eq!(request.winner_id, "alice");
    }
}
