use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::ValidJson;
use crate::sanitize::deserialize_email;
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[serde(deserialize_with = "deserialize_email")]
    #[garde(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// 受け渡し方法が `response` の場合のみ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    pub expires_in: i64,
}

/// POST /api/auth/forgot-password
///
/// # Security
/// 常に200を返す（ユーザー存在有無を漏洩しない）
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let outcome = state
        .password_reset_service()
        .request_reset(&request.email)
        .await?;

    Ok(Json(ForgotPasswordResponse {
        message: "メールアドレスが登録されている場合、パスワードリセット手順を発行しました"
            .to_string(),
        reset_token: outcome.ticket,
        expires_in: outcome.expires_in,
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[serde(alias = "token")]
    #[garde(length(min = 1))]
    pub reset_token: String,
    #[garde(length(bytes, min = 8))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub message: String,
}

/// POST /api/auth/reset-password
///
/// # Security
/// - reset_token, new_password はログに出力しない
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AppError> {
    state
        .password_reset_service()
        .reset_password(&request.reset_token, &request.new_password)
        .await?;

    Ok(Json(ResetPasswordResponse {
        message: "パスワードが更新されました".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_invalid_email() {
        let request = ForgotPasswordRequest {
            email: "invalid-email".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_valid_email() {
        let request: ForgotPasswordRequest =
            serde_json::from_str(r#"{"email":" Test@Example.com "}"#).unwrap();
        assert_eq!(request.email, "test@example.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_token() {
        let request = ResetPasswordRequest {
            reset_token: "".to_string(),
            new_password: "password123".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let request = ResetPasswordRequest {
            reset_token: "valid-token".to_string(),
            new_password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_token_alias_accepted() {
        let request: ResetPasswordRequest =
            serde_json::from_str(r#"{"token":"abc","new_password":"password123"}"#).unwrap();
        assert_eq!(request.reset_token, "abc");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_ticket_omitted_when_absent() {
        let body = serde_json::to_value(ForgotPasswordResponse {
            message: "ok".to_string(),
            reset_token: None,
            expires_in: 3600,
        })
        .unwrap();
        assert!(body.get("reset_token").is_none());
        assert_eq!(body["expires_in"], 3600);
    }
}
