use crate::aggregation::build_dashboard;
use crate::errors::AppError;
use crate::models::{
    DashboardQuery, DashboardResponse, FilterCriteria, OptionsResponse, ReportRow,
    ReportSubmission,
};
use crate::state::AppState;
use crate::ui::render_index;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use tracing::info;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.branches, &state.reps))
}

pub async fn get_options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        branches: state.branches.to_vec(),
        reps: state.reps.to_vec(),
    })
}

pub async fn list_reports(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportRow>>, AppError> {
    Ok(Json(state.store.list_all().await?))
}

pub async fn create_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportSubmission>,
) -> Result<(StatusCode, Json<ReportRow>), AppError> {
    let row = store_submission(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn submit_report_form(
    State(state): State<AppState>,
    Form(payload): Form<ReportSubmission>,
) -> Result<Redirect, AppError> {
    store_submission(&state, payload).await?;
    Ok(Redirect::to("/"))
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let criteria = FilterCriteria::try_from(query)?;
    let rows = state.store.list_all().await?;
    Ok(Json(build_dashboard(&rows, &criteria)))
}

async fn store_submission(
    state: &AppState,
    payload: ReportSubmission,
) -> Result<ReportRow, AppError> {
    let row = payload.into_row()?;
    state.store.insert(row.clone()).await?;

    info!(
        date = %row.date,
        branch = %row.branch,
        rep = %row.rep,
        quotes = row.quotes(),
        sales = row.sales(),
        "report stored"
    );
    Ok(row)
}
