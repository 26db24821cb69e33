//! Symptom checker endpoints. Anonymous; nothing is stored.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::api::error::ApiError;
use crate::symptom_checker::{self, Assessment, Question, SymptomAnswers};

/// `GET /api/symptoms/questions`
pub async fn questions() -> Json<&'static [Question]> {
    Json(symptom_checker::QUESTIONS)
}

/// `POST /api/symptoms/assess`
pub async fn assess(
    payload: Result<Json<SymptomAnswers>, JsonRejection>,
) -> Result<Json<Assessment>, ApiError> {
    let Json(answers) = payload?;
    Ok(Json(symptom_checker::assess(&answers)?))
}
