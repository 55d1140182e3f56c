use crate::{
    api::ListingApi,
    catalog::{
        CategoryNode, has_dynamic_fields,
        regions::{REGIONS, Region},
        resolve,
        schema::catalog_slugs,
    },
    idempotency::IdempotencyCache,
    models::{
        ApiError, CategoryOutcome, CategoryRequest, JumpRequest, OpenWizardRequest,
        PhotoBatchRequest, PhotoBatchResponse, PhotoUpload, SchemaResponse, SubmitResponse,
        WizardEnvelope,
    },
    photos::PhotoFile,
    sessions::{SessionStore, SharedWizard},
    wizard::{
        DetailsSlice, ListingWizard, LocationSlice, WizardError, WizardErrorKind,
    },
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub struct AppState<A> {
    pub sessions: SessionStore,
    pub api: Arc<A>,
    pub idempotency: IdempotencyCache,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            api: self.api.clone(),
            idempotency: self.idempotency.clone(),
        }
    }
}

impl<A> AppState<A> {
    async fn session(&self, id: Uuid) -> Result<SharedWizard, AppError> {
        self.sessions
            .get(id)
            .await
            .ok_or(AppError::SessionNotFound(id))
    }
}

pub fn router<A: ListingApi + 'static>(state: AppState<A>) -> Router {
    Router::new()
        .route("/categories", get(list_categories::<A>))
        .route("/regions", get(list_regions))
        .route("/schema", get(list_schema_slugs))
        .route("/schema/{*slug}", get(get_schema))
        .route("/wizards", post(open_wizard::<A>))
        .route(
            "/wizards/{id}",
            get(get_wizard::<A>).delete(close_wizard::<A>),
        )
        .route("/wizards/{id}/category", post(choose_category::<A>))
        .route("/wizards/{id}/category/up", post(category_up::<A>))
        .route("/wizards/{id}/category/confirm", post(confirm_category::<A>))
        .route(
            "/wizards/{id}/details",
            get(details_form::<A>).post(submit_details::<A>),
        )
        .route("/wizards/{id}/photos", post(add_photos::<A>))
        .route("/wizards/{id}/photos/next", post(photos_next::<A>))
        .route("/wizards/{id}/photos/{index}", delete(remove_photo::<A>))
        .route("/wizards/{id}/location", post(submit_location::<A>))
        .route("/wizards/{id}/back", post(back::<A>))
        .route("/wizards/{id}/jump", post(jump::<A>))
        .route("/wizards/{id}/submit", post(submit::<A>))
        .with_state(state)
}

fn envelope(id: Uuid, wizard: &ListingWizard) -> WizardEnvelope {
    WizardEnvelope {
        id,
        view: wizard.view(),
    }
}

async fn list_categories<A>(State(state): State<AppState<A>>) -> Json<Vec<CategoryNode>> {
    crate::metrics::inc_requests("/categories");
    Json(state.sessions.tree().nodes().to_vec())
}

async fn list_regions() -> Json<&'static [Region]> {
    Json(REGIONS)
}

async fn list_schema_slugs() -> Json<Vec<&'static str>> {
    Json(catalog_slugs().collect())
}

async fn get_schema(Path(slug): Path<String>) -> Json<SchemaResponse> {
    Json(SchemaResponse {
        has_dynamic_fields: has_dynamic_fields(&slug),
        fields: resolve(&slug),
        slug,
    })
}

async fn open_wizard<A>(
    State(state): State<AppState<A>>,
    body: Option<Json<OpenWizardRequest>>,
) -> (StatusCode, Json<WizardEnvelope>) {
    crate::metrics::inc_requests("/wizards");
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let (id, wizard) = state.sessions.open(request.existing).await;
    let guard = wizard.lock().await;
    (StatusCode::CREATED, Json(envelope(id, &guard)))
}

async fn get_wizard<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardEnvelope>, AppError> {
    let wizard = state.session(id).await?;
    let guard = wizard.lock().await;
    Ok(Json(envelope(id, &guard)))
}

async fn close_wizard<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::SessionNotFound(id))
    }
}

/// Applies one controller operation under the session lock and returns the fresh view.
async fn with_wizard<A, F>(state: &AppState<A>, id: Uuid, op: F) -> Result<Json<WizardEnvelope>, AppError>
where
    F: FnOnce(&mut ListingWizard) -> Result<(), WizardError>,
{
    let wizard = state.session(id).await?;
    let mut guard = wizard.lock().await;
    op(&mut guard)?;
    Ok(Json(envelope(id, &guard)))
}

/// Leaves select and advance; parents open one level deeper.
async fn choose_category<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<CategoryOutcome>, AppError> {
    crate::metrics::inc_requests("/wizards/category");
    let wizard = state.session(id).await?;
    let mut guard = wizard.lock().await;
    let advanced = if guard.tree().is_leaf(&request.id) && guard.tree().get(&request.id).is_some() {
        guard.choose_category(&request.id)?;
        true
    } else {
        guard.open_category(&request.id)?
    };
    Ok(Json(CategoryOutcome {
        advanced,
        wizard: envelope(id, &guard),
    }))
}

async fn category_up<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, |wizard| wizard.category_up().map(|_| ())).await
}

async fn confirm_category<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, ListingWizard::confirm_category).await
}

/// Details form rehydrated from the draft, for re-rendering after back-navigation.
async fn details_form<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DetailsSlice>, AppError> {
    let wizard = state.session(id).await?;
    let guard = wizard.lock().await;
    Ok(Json(guard.details_form()))
}

async fn submit_details<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    Json(form): Json<DetailsSlice>,
) -> Result<Json<WizardEnvelope>, AppError> {
    crate::metrics::inc_requests("/wizards/details");
    with_wizard(&state, id, |wizard| wizard.submit_details(form)).await
}

fn decode_upload(upload: PhotoUpload) -> Result<PhotoFile, AppError> {
    let (mime_from_uri, encoded) = match upload.data.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest.split_once(',').ok_or_else(|| AppError::BadRequest {
                error: "invalid_photo_data",
                detail: format!("{} is not a valid data URI", upload.name),
            })?;
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(mime.to_string()), data)
        }
        None => (None, upload.data.as_str()),
    };
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|err| AppError::BadRequest {
            error: "invalid_photo_data",
            detail: format!("{}: {err}", upload.name),
        })?;
    let mime_type = upload
        .mime_type
        .clone()
        .or(mime_from_uri)
        .unwrap_or_default();
    Ok(PhotoFile::from_bytes(upload.name, mime_type, bytes))
}

async fn add_photos<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    Json(batch): Json<PhotoBatchRequest>,
) -> Result<Json<PhotoBatchResponse>, AppError> {
    crate::metrics::inc_requests("/wizards/photos");
    let mut files = batch
        .files
        .into_iter()
        .map(decode_upload)
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(dir) = crate::config::photo_spool_dir() {
        let mut spooled = Vec::with_capacity(files.len());
        for file in files {
            spooled.push(file.spool(&dir).await.map_err(|err| {
                AppError::Internal(format!("spooling upload failed: {err}"))
            })?);
        }
        files = spooled;
    }
    let wizard = state.session(id).await?;
    let mut guard = wizard.lock().await;
    let report = guard.add_photos(files)?;
    Ok(Json(PhotoBatchResponse {
        report,
        wizard: envelope(id, &guard),
    }))
}

async fn remove_photo<A>(
    State(state): State<AppState<A>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, |wizard| wizard.remove_photo(index)).await
}

async fn photos_next<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, ListingWizard::photos_next).await
}

async fn submit_location<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    Json(location): Json<LocationSlice>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, |wizard| wizard.submit_location(location)).await
}

async fn back<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, |wizard| wizard.back().map(|_| ())).await
}

async fn jump<A>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    Json(request): Json<JumpRequest>,
) -> Result<Json<WizardEnvelope>, AppError> {
    with_wizard(&state, id, |wizard| wizard.jump_to(request.step)).await
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Review confirmation. A repeated `Idempotency-Key` replays the cached receipt.
async fn submit<A: ListingApi>(
    State(state): State<AppState<A>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SubmitResponse>, AppError> {
    crate::metrics::inc_requests("/wizards/submit");
    let key = idempotency_key(&headers).map(|key| format!("{id}:{key}"));
    if let Some(key) = &key
        && let Some(receipt) = state.idempotency.get(key).await
    {
        info!(target = "wizard.submit", session = %id, "idempotent_replay");
        return Ok(Json(SubmitResponse {
            receipt,
            replayed: true,
        }));
    }

    let wizard = state.session(id).await?;
    let mut guard = wizard.lock().await;
    let replayed = guard.receipt().is_some();
    let receipt = guard.submit(state.api.as_ref()).await?;
    if let Some(key) = &key {
        state.idempotency.put(key, &receipt).await;
    }
    Ok(Json(SubmitResponse { receipt, replayed }))
}

#[derive(Debug)]
pub enum AppError {
    Wizard(WizardError),
    SessionNotFound(Uuid),
    BadRequest { error: &'static str, detail: String },
    Internal(String),
}

impl From<WizardError> for AppError {
    fn from(value: WizardError) -> Self {
        Self::Wizard(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Wizard(err) => {
                let status = match err.kind() {
                    WizardErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    WizardErrorKind::Conflict => StatusCode::CONFLICT,
                    WizardErrorKind::NotFound => StatusCode::NOT_FOUND,
                    WizardErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                };
                let payload = ApiError {
                    error: err.code().to_string(),
                    detail: Some(err.to_string()),
                    fields: err.field_errors().cloned(),
                };
                (status, payload)
            }
            AppError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: "session_not_found".into(),
                    detail: Some(format!("no wizard session {id}")),
                    fields: None,
                },
            ),
            AppError::BadRequest { error, detail } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error.into(),
                    detail: Some(detail),
                    fields: None,
                },
            ),
            AppError::Internal(detail) => {
                error!(target = "wizard.api", %detail, "internal_error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: "internal_error".into(),
                        detail: Some(detail),
                        fields: None,
                    },
                )
            }
        };
        (status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::listings::testing::RecordingApi,
        catalog::categories::demo_tree,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(api: RecordingApi) -> Router {
        router(AppState {
            sessions: SessionStore::new(demo_tree()),
            api: Arc::new(api),
            idempotency: IdempotencyCache::memory(),
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        send(app, request.body(body).unwrap()).await
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn open(app: &Router) -> String {
        let (status, body) = call(app, Method::POST, "/wizards", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    /// Walks a session to REVIEW through the HTTP surface.
    async fn walk_to_review(app: &Router) -> String {
        let id = open(app).await;
        let (status, body) = call(
            app,
            Method::POST,
            &format!("/wizards/{id}/category"),
            Some(json!({"id": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["advanced"], false);

        let (_, body) = call(
            app,
            Method::POST,
            &format!("/wizards/{id}/category"),
            Some(json!({"id": "101"})),
        )
        .await;
        assert_eq!(body["advanced"], true);
        assert_eq!(body["wizard"]["step"], "DETAILS");
        assert_eq!(body["wizard"]["has_dynamic_fields"], true);

        let (status, _) = call(
            app,
            Method::POST,
            &format!("/wizards/{id}/details"),
            Some(json!({
                "title": "Appartement meublé Bonapriso",
                "description": "Bel appartement lumineux, proche de toutes commodités",
                "price": "250000",
                "condition": "USED",
                "attributes": {"type_bien": "APPARTEMENT", "surface": 120, "pieces": 4, "chambres": 2}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            app,
            Method::POST,
            &format!("/wizards/{id}/photos"),
            Some(json!({"files": [
                {"name": "salon.jpg", "data": "data:image/jpeg;base64,AQID"},
                {"name": "plan.pdf", "mime_type": "application/pdf", "data": "AQID"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["accepted"].as_array().unwrap().len(), 1);
        assert_eq!(body["report"]["rejected"][0]["status"], "failed");

        call(app, Method::POST, &format!("/wizards/{id}/photos/next"), None).await;
        let (status, body) = call(
            app,
            Method::POST,
            &format!("/wizards/{id}/location"),
            Some(json!({"region": "Littoral", "city": "Douala"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "REVIEW");
        assert_eq!(body["progress"], 100);
        assert_eq!(body["review"]["attributes"][1]["value"], 120);
        id
    }

    #[tokio::test]
    async fn full_flow_submits_once_and_replays_by_key() {
        let api = RecordingApi::default();
        let app = app(api.clone());
        let id = walk_to_review(&app).await;

        let submit = || {
            Request::builder()
                .method(Method::POST)
                .uri(format!("/wizards/{id}/submit"))
                .header("Idempotency-Key", "abc")
                .body(Body::empty())
                .unwrap()
        };
        let (status, body) = send(&app, submit()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["id"], "lst-1");
        assert_eq!(body["replayed"], false);

        let (_, body) = send(&app, submit()).await;
        assert_eq!(body["replayed"], true);
        assert_eq!(api.calls().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &format!("/wizards/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, Method::GET, &format!("/wizards/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "session_not_found");
    }

    #[tokio::test]
    async fn resubmitting_without_key_returns_the_first_receipt() {
        let api = RecordingApi::default();
        let app = app(api.clone());
        let id = walk_to_review(&app).await;

        let (status, first) = call(&app, Method::POST, &format!("/wizards/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["replayed"], false);

        let (status, second) = call(&app, Method::POST, &format!("/wizards/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["replayed"], true);
        assert_eq!(second["receipt"], first["receipt"]);
        assert_eq!(api.calls().len(), 1);

        let (status, body) = call(&app, Method::POST, &format!("/wizards/{id}/back"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already_submitted");

        let (_, view) = call(&app, Method::GET, &format!("/wizards/{id}"), None).await;
        assert_eq!(view["draft"]["receipt"]["id"], "lst-1");
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway_and_kept_in_view() {
        let app = app(RecordingApi::failing("network error"));
        let id = walk_to_review(&app).await;

        let (status, body) = call(&app, Method::POST, &format!("/wizards/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["detail"], "network error");

        let (_, view) = call(&app, Method::GET, &format!("/wizards/{id}"), None).await;
        assert_eq!(view["draft"]["last_error"], "network error");
        assert_eq!(view["draft"]["is_submitting"], false);
        assert_eq!(view["draft"]["details"]["attributes"]["surface"], 120);
    }

    #[tokio::test]
    async fn invalid_details_return_field_map() {
        let app = app(RecordingApi::default());
        let id = open(&app).await;
        call(
            &app,
            Method::POST,
            &format!("/wizards/{id}/category"),
            Some(json!({"id": "201"})),
        )
        .await;
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/wizards/{id}/details"),
            Some(json!({"title": "Car", "description": "short", "price": "abc",
                        "attributes": {"annee": 1800}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_fields");
        for field in ["title", "description", "price", "annee", "marque"] {
            assert!(body["fields"][field].is_string(), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn wrong_step_and_unknown_category_map_to_statuses() {
        let app = app(RecordingApi::default());
        let id = open(&app).await;
        let (status, body) = call(&app, Method::POST, &format!("/wizards/{id}/photos/next"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "wrong_step");

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/wizards/{id}/category"),
            Some(json!({"id": "999"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn too_many_photos_is_rejected() {
        let app = app(RecordingApi::default());
        let id = open(&app).await;
        call(&app, Method::POST, &format!("/wizards/{id}/category"), Some(json!({"id": "13"}))).await;
        call(
            &app,
            Method::POST,
            &format!("/wizards/{id}/details"),
            Some(json!({"title": "Lot de chaises", "price": "30000",
                        "description": "Six chaises en bois massif, très bon état"})),
        )
        .await;
        let files: Vec<Value> = (0..11)
            .map(|i| json!({"name": format!("{i}.png"), "mime_type": "image/png", "data": "AQID"}))
            .collect();
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/wizards/{id}/photos"),
            Some(json!({"files": files})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "too_many_photos");

        let (_, view) = call(&app, Method::GET, &format!("/wizards/{id}"), None).await;
        assert_eq!(view["draft"]["photos"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn reference_data_endpoints() {
        let app = app(RecordingApi::default());
        let (_, regions) = call(&app, Method::GET, "/regions", None).await;
        assert_eq!(regions.as_array().unwrap().len(), 10);

        let (_, schema) = call(&app, Method::GET, "/schema/vehicules/voitures", None).await;
        assert_eq!(schema["slug"], "vehicules/voitures");
        assert_eq!(schema["fields"][0]["name"], "marque");
        assert_eq!(schema["fields"][0]["required"], true);

        let (_, slugs) = call(&app, Method::GET, "/schema", None).await;
        assert_eq!(slugs.as_array().unwrap().len(), 12);

        let (_, categories) = call(&app, Method::GET, "/categories", None).await;
        assert_eq!(categories.as_array().unwrap().len(), 20);
    }
}
