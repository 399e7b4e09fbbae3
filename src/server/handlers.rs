use crate::server::error::ApiError;
use crate::server::AppContext;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub selected_date: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub aqi_prediction: f64,
    pub date: NaiveDate,
    pub analog_days: usize,
    pub fallback: bool,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// `POST /predict` with `selected_date` as a form field or in a JSON body.
pub async fn predict(
    State(ctx): State<AppContext>,
    request: Request,
) -> Result<Json<PredictResponse>, ApiError> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let body = if is_json {
        Json::<PredictRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?
            .0
    } else {
        Form::<PredictRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?
            .0
    };
    predict_for(&ctx, &body.selected_date).map(Json)
}

/// `GET /predict/:date`
pub async fn predict_date(
    State(ctx): State<AppContext>,
    Path(date): Path<String>,
) -> Result<Json<PredictResponse>, ApiError> {
    predict_for(&ctx, &date).map(Json)
}

fn predict_for(ctx: &AppContext, raw_date: &str) -> Result<PredictResponse, ApiError> {
    let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::InvalidDate(raw_date.to_string()))?;
    let predictor = ctx.predictor()?;
    let prediction = predictor
        .predict(date)
        .map_err(|e| ApiError::ModelUnavailable(e.to_string()))?;
    Ok(PredictResponse {
        aqi_prediction: prediction.aqi,
        date: prediction.date,
        analog_days: prediction.analog_days,
        fallback: prediction.fallback,
    })
}

/// `GET /data/:dataset`: the stored CSV of a pipeline output.
pub async fn dataset_csv(
    State(ctx): State<AppContext>,
    Path(dataset): Path<String>,
) -> Result<Response, ApiError> {
    let path = ctx
        .dataset_path(&dataset)
        .ok_or_else(|| ApiError::NotFound(format!("Dataset '{}'", dataset)))?;
    let bytes = ctx
        .store
        .get(path)
        .await
        .map_err(|e| ApiError::DataUnavailable(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "text/csv; charset=utf-8")], bytes).into_response())
}
