use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    /// 冷却期内重复请求
    CooldownActive { remaining_secs: u64, count: u32 },
    /// 窗口内请求次数超限
    MaxAttemptsReached { remaining_secs: u64, count: u32 },
    GenerationFailed,
    AnalysisFailed,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(rename = "remainingTime", skip_serializing_if = "Option::is_none")]
    remaining_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::CooldownActive {
                remaining_secs,
                count,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse {
                    error: "Rate limit exceeded".to_string(),
                    remaining_time: Some(remaining_secs),
                    count: Some(count),
                },
            ),
            AppError::MaxAttemptsReached {
                remaining_secs,
                count,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse {
                    error: "Maximum attempts reached".to_string(),
                    remaining_time: Some(remaining_secs),
                    count: Some(count),
                },
            ),
            AppError::GenerationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "生成听力对话失败".to_string(),
                    remaining_time: None,
                    count: None,
                },
            ),
            AppError::AnalysisFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "分析答案失败".to_string(),
                    remaining_time: None,
                    count: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
