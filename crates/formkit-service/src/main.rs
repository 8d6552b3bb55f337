use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use formkit_api::{
    Actor, EditError, EditOutcome, FormsApi, LookupError, SubmissionView, SubmitError,
    TemplateDraft, API_CONTRACT_VERSION,
};
use formkit_core::{
    Answer, AnswerFailure, QuestionId, SubmissionId, Template, TemplateId, TemplateSummary,
};
use formkit_store_sqlite::IntegrityReport;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");
const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone)]
struct ServiceState {
    api: FormsApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    #[serde(skip)]
    status: StatusCode,
    service_contract_version: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<Vec<AnswerFailure>>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmitRequest {
    /// Answers keyed by question id.
    answers: BTreeMap<String, Answer>,
}

#[derive(Debug, Clone, Serialize)]
struct SubmitResponse {
    submission_id: SubmissionId,
}

#[derive(Debug, Parser)]
#[command(name = "formkit-service")]
#[command(about = "Local HTTP service for form templates and submissions")]
struct Args {
    #[arg(long, env = "FORMKIT_DB", default_value = "./formkit.sqlite3")]
    db: PathBuf,
    #[arg(long, env = "FORMKIT_BIND", default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn service_error(status: StatusCode, message: impl Into<String>) -> ServiceError {
    ServiceError {
        status,
        service_contract_version: SERVICE_CONTRACT_VERSION,
        error: message.into(),
        failures: None,
    }
}

impl From<EditError> for ServiceError {
    fn from(err: EditError) -> Self {
        let status = match &err {
            EditError::NotFound(_) => StatusCode::NOT_FOUND,
            EditError::Forbidden { .. } => StatusCode::FORBIDDEN,
            EditError::Structural(_) => StatusCode::BAD_REQUEST,
            EditError::IdConflict { .. } => StatusCode::CONFLICT,
            EditError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        service_error(status, err.to_string())
    }
}

impl From<SubmitError> for ServiceError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::TemplateNotFound(_) => {
                service_error(StatusCode::NOT_FOUND, err.to_string())
            }
            SubmitError::Validation(failures) => ServiceError {
                failures: Some(failures),
                ..service_error(StatusCode::UNPROCESSABLE_ENTITY, "answers failed validation")
            },
            SubmitError::Encoding(_) => {
                service_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            SubmitError::Storage(_) => {
                service_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl From<LookupError> for ServiceError {
    fn from(err: LookupError) -> Self {
        let status = match &err {
            LookupError::NotFound(_) => StatusCode::NOT_FOUND,
            LookupError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        service_error(status, err.to_string())
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

/// Identity is established upstream and forwarded in headers.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ServiceError> {
    let user_id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            service_error(StatusCode::UNAUTHORIZED, format!("missing {ACTOR_ID_HEADER} header"))
        })?;
    let is_admin = headers
        .get(ACTOR_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"));

    Ok(Actor { user_id: user_id.to_string(), is_admin })
}

fn parse_path_id<T>(raw: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
{
    raw.parse::<T>()
        .map_err(|_| service_error(StatusCode::BAD_REQUEST, format!("invalid id: {raw}")))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/db/integrity", get(db_integrity))
        .route("/v1/templates", get(templates_list).post(templates_create))
        .route("/v1/templates/:template_id", get(templates_show).put(templates_edit))
        .route(
            "/v1/templates/:template_id/submissions",
            get(submissions_list).post(submissions_create),
        )
        .route("/v1/submissions/:submission_id", get(submissions_show))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = ServiceState { api: FormsApi::new(args.db.clone()) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(bind = %args.bind, db = %args.db.display(), "formkit service listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn db_integrity(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<IntegrityReport>>, ServiceError> {
    let report = state
        .api
        .integrity_check()
        .map_err(|err| service_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))?;
    Ok(Json(envelope(report)))
}

async fn templates_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<TemplateSummary>>>, ServiceError> {
    Ok(Json(envelope(state.api.list_templates()?)))
}

async fn templates_create(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(draft): Json<TemplateDraft>,
) -> Result<(StatusCode, Json<ServiceEnvelope<Template>>), ServiceError> {
    let actor = actor_from_headers(&headers)?;
    let template = state.api.create_template(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(envelope(template))))
}

async fn templates_show(
    State(state): State<ServiceState>,
    Path(template_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Template>>, ServiceError> {
    let template_id: TemplateId = parse_path_id(&template_id)?;
    Ok(Json(envelope(state.api.get_template(template_id)?)))
}

async fn templates_edit(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
    Json(draft): Json<TemplateDraft>,
) -> Result<Json<ServiceEnvelope<EditOutcome>>, ServiceError> {
    let actor = actor_from_headers(&headers)?;
    let template_id: TemplateId = parse_path_id(&template_id)?;
    Ok(Json(envelope(state.api.edit_template(&actor, template_id, draft)?)))
}

async fn submissions_create(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ServiceEnvelope<SubmitResponse>>), ServiceError> {
    let template_id: TemplateId = parse_path_id(&template_id)?;
    // Anonymous submissions are allowed; a present actor becomes the submitter.
    let submitter = actor_from_headers(&headers).ok().map(|actor| actor.user_id);

    let mut answers = BTreeMap::new();
    for (key, answer) in request.answers {
        let question_id: QuestionId = parse_path_id(&key)?;
        answers.insert(question_id, answer);
    }

    let submission_id = state.api.submit_answers(template_id, submitter, answers)?;
    Ok((StatusCode::CREATED, Json(envelope(SubmitResponse { submission_id }))))
}

async fn submissions_list(
    State(state): State<ServiceState>,
    Path(template_id): Path<String>,
) -> Result<Json<ServiceEnvelope<Vec<SubmissionView>>>, ServiceError> {
    let template_id: TemplateId = parse_path_id(&template_id)?;
    Ok(Json(envelope(state.api.list_submissions(template_id)?)))
}

async fn submissions_show(
    State(state): State<ServiceState>,
    Path(submission_id): Path<String>,
) -> Result<Json<ServiceEnvelope<SubmissionView>>, ServiceError> {
    let submission_id: SubmissionId = parse_path_id(&submission_id)?;
    Ok(Json(envelope(state.api.read_submission(submission_id)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn unique_temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("formkit-service-{}.sqlite3", ulid::Ulid::new()))
    }

    fn cleanup(db_path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
        }
    }

    async fn response_json(response: Response) -> Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        actor: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().uri(uri).method(method);
        if let Some((user_id, role)) = actor {
            builder = builder.header(ACTOR_ID_HEADER, user_id).header(ACTOR_ROLE_HEADER, role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap_or_else(|err| panic!("failed to build request: {err}"));

        match router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        }
    }

    fn data_str<'a>(value: &'a Value, pointer: &str) -> &'a str {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("missing {pointer} in response: {value}"))
    }

    fn meeting_draft() -> Value {
        json!({
            "title": "Team offsite",
            "questions": [
                {
                    "text": "Which day?",
                    "question_type": "dropdown",
                    "order_index": 0,
                    "is_required": true,
                    "options": [
                        {"text": "Monday", "value": "mon", "order_index": 0},
                        {"text": "Friday", "value": "fri", "order_index": 1}
                    ]
                },
                {
                    "text": "Guests",
                    "question_type": "number",
                    "order_index": 1,
                    "validation_rules": {"min": 0, "max": 3}
                }
            ]
        })
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = app(ServiceState { api: FormsApi::new(unique_temp_db_path()) });
        let response = send(&router, "GET", "/v1/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(data_str(&value, "/service_contract_version"), SERVICE_CONTRACT_VERSION);
        assert_eq!(data_str(&value, "/data/status"), "ok");
    }

    #[tokio::test]
    async fn openapi_endpoint_returns_versioned_artifact() {
        let router = app(ServiceState { api: FormsApi::new(unique_temp_db_path()) });
        let response = send(&router, "GET", "/v1/openapi", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = String::from_utf8_lossy(&bytes);
        assert!(body.contains("openapi: 3.1.0"));
        assert!(body.contains("version: service.v1"));
        assert!(body.contains("/v1/templates/{template_id}/submissions"));
    }

    #[tokio::test]
    async fn service_create_edit_submit_and_read_flow() {
        let db_path = unique_temp_db_path();
        let router = app(ServiceState { api: FormsApi::new(db_path.clone()) });

        let created =
            send(&router, "POST", "/v1/templates", Some(("alice", "user")), Some(meeting_draft())).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = response_json(created).await;
        let template_id = data_str(&created, "/data/template_id").to_string();
        let day_id = data_str(&created, "/data/questions/0/question_id").to_string();
        assert_eq!(data_str(&created, "/data/author_id"), "alice");

        let mut edit = created["data"].clone();
        edit["title"] = json!("Team offsite 2026");
        edit["author_id"] = json!("mallory");
        let edited = send(
            &router,
            "PUT",
            &format!("/v1/templates/{template_id}"),
            Some(("alice", "user")),
            Some(edit),
        )
        .await;
        assert_eq!(edited.status(), StatusCode::OK);
        let edited = response_json(edited).await;
        assert_eq!(edited.pointer("/data/committed"), Some(&json!(true)));
        assert_eq!(data_str(&edited, "/data/template/author_id"), "alice");
        assert_eq!(data_str(&edited, "/data/template/questions/0/question_id"), day_id);

        let submitted = send(
            &router,
            "POST",
            &format!("/v1/templates/{template_id}/submissions"),
            Some(("bob", "user")),
            Some(json!({"answers": {
                day_id.clone(): {"shape": "single_selection", "value": "fri"}
            }})),
        )
        .await;
        assert_eq!(submitted.status(), StatusCode::CREATED);
        let submitted = response_json(submitted).await;
        let submission_id = data_str(&submitted, "/data/submission_id").to_string();

        let shown =
            send(&router, "GET", &format!("/v1/submissions/{submission_id}"), None, None).await;
        assert_eq!(shown.status(), StatusCode::OK);
        let shown = response_json(shown).await;
        assert_eq!(data_str(&shown, "/data/submission/submitter_user_id"), "bob");
        assert_eq!(
            shown.pointer(&format!("/data/decoded/answers/{day_id}")),
            Some(&json!({"shape": "single_selection", "value": "fri"}))
        );

        let listed =
            send(&router, "GET", &format!("/v1/templates/{template_id}/submissions"), None, None)
                .await;
        assert_eq!(listed.status(), StatusCode::OK);
        let listed = response_json(listed).await;
        assert_eq!(listed.pointer("/data").and_then(Value::as_array).map(Vec::len), Some(1));

        let templates = response_json(send(&router, "GET", "/v1/templates", None, None).await).await;
        assert_eq!(templates.pointer("/data/0/question_count"), Some(&json!(2)));

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn invalid_answers_return_every_failure() {
        let db_path = unique_temp_db_path();
        let router = app(ServiceState { api: FormsApi::new(db_path.clone()) });
        let created = response_json(
            send(&router, "POST", "/v1/templates", Some(("alice", "user")), Some(meeting_draft()))
                .await,
        )
        .await;
        let template_id = data_str(&created, "/data/template_id").to_string();
        let guests_id = data_str(&created, "/data/questions/1/question_id").to_string();

        let response = send(
            &router,
            "POST",
            &format!("/v1/templates/{template_id}/submissions"),
            None,
            Some(json!({"answers": {
                guests_id: {"shape": "number_value", "value": 9}
            }})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let value = response_json(response).await;
        let failures = value.pointer("/failures").and_then(Value::as_array).cloned().unwrap_or_default();
        let kinds = failures
            .iter()
            .filter_map(|failure| failure.get("kind").and_then(Value::as_str))
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["missing_required_answer", "rule_violation"]);

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn edit_errors_map_to_status_codes() {
        let db_path = unique_temp_db_path();
        let router = app(ServiceState { api: FormsApi::new(db_path.clone()) });
        let created = response_json(
            send(&router, "POST", "/v1/templates", Some(("alice", "user")), Some(meeting_draft()))
                .await,
        )
        .await;
        let template_id = data_str(&created, "/data/template_id").to_string();
        let uri = format!("/v1/templates/{template_id}");

        let anonymous = send(&router, "PUT", &uri, None, Some(meeting_draft())).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let forbidden = send(&router, "PUT", &uri, Some(("mallory", "user")), Some(meeting_draft())).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let mut colliding = meeting_draft();
        colliding["questions"][1]["order_index"] = json!(0);
        let structural = send(&router, "PUT", &uri, Some(("ops", "admin")), Some(colliding)).await;
        assert_eq!(structural.status(), StatusCode::BAD_REQUEST);

        let missing = send(
            &router,
            "PUT",
            &format!("/v1/templates/{}", TemplateId::new()),
            Some(("ops", "admin")),
            Some(meeting_draft()),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let mut borrowing = meeting_draft();
        borrowing["questions"][0]["question_id"] = created["data"]["questions"][0]["question_id"].clone();
        let second = send(&router, "POST", "/v1/templates", Some(("alice", "user")), Some(borrowing)).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let bad_id = send(&router, "GET", "/v1/templates/not-a-ulid", None, None).await;
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

        cleanup(&db_path);
    }

    #[tokio::test]
    async fn integrity_endpoint_reports_migrated_database() {
        let db_path = unique_temp_db_path();
        let router = app(ServiceState { api: FormsApi::new(db_path.clone()) });

        let response = send(&router, "GET", "/v1/db/integrity", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response_json(response).await;
        assert_eq!(value.pointer("/data/quick_check_ok"), Some(&json!(true)));

        cleanup(&db_path);
    }
}
