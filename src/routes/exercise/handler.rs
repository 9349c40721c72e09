use axum::{
    Json,
    extract::State,
};

use crate::{AppState, error::AppError};

use super::model::{CheckAnswerRequest, CheckAnswerResponse, ChoukaiExercise, GenerateRequest};

/// 根据话题生成一套听力练习。上游失败细节只进日志，
/// 客户端一律收到笼统错误。
#[axum::debug_handler]
pub async fn generate_choukai(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ChoukaiExercise>, AppError> {
    let exercise = state
        .llm
        .generate_exercise(&req.topic)
        .await
        .map_err(|e| {
            tracing::error!("Failed to generate choukai exercise: {}", e);
            AppError::GenerationFailed
        })?;

    Ok(Json(exercise))
}

/// 批改用户选择并返回纯文本解析
#[axum::debug_handler]
pub async fn check_answer(
    State(state): State<AppState>,
    Json(req): Json<CheckAnswerRequest>,
) -> Result<Json<CheckAnswerResponse>, AppError> {
    let analysis = state
        .llm
        .grade_answer(&req.dialog, &req.question, &req.user_answer)
        .await
        .map_err(|e| {
            tracing::error!("Failed to grade answer: {}", e);
            AppError::AnalysisFailed
        })?;

    Ok(Json(CheckAnswerResponse { analysis }))
}
