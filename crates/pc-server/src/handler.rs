use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use pc_core::core::{
    AnnotationSession, BatchProgress, Notice, PreferencePair, ProgressObserver, SessionError,
    ViewModel,
};

use crate::bootstrap::{self, RuntimeConfig};
use crate::ui::{render_busy_page, render_page, UiDefaults};

// ---------------------------------------------------------------------------
// AppState — session, notice queue and progress shared by all routes
// ---------------------------------------------------------------------------

/// Every transition runs under `session`; a generation batch holds it for its
/// whole duration. Progress is published on a separate channel so it can be
/// read while the session is busy.
pub struct AppState {
    pub session: Arc<Mutex<AnnotationSession>>,
    pub notices: Mutex<Vec<Notice>>,
    pub progress: watch::Receiver<BatchProgress>,
    pub defaults: UiDefaults,
}

struct WatchProgress(watch::Sender<BatchProgress>);

impl ProgressObserver for WatchProgress {
    fn on_progress(&self, progress: BatchProgress) {
        self.0.send_replace(progress);
    }
}

impl AppState {
    pub fn from_runtime(runtime: &RuntimeConfig) -> Result<Self, anyhow::Error> {
        let (tx, rx) = watch::channel(BatchProgress::default());
        let session = bootstrap::build_session(runtime, Arc::new(WatchProgress(tx)))?;
        let defaults = UiDefaults {
            initial_user_prompt: runtime.initial_user_prompt.clone(),
            limits: runtime.limits,
            output_file: runtime.output_file.display().to_string(),
        };
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            notices: Mutex::new(Vec::new()),
            progress: rx,
            defaults,
        })
    }

    async fn push_notices(&self, notices: Vec<Notice>) {
        self.notices.lock().await.extend(notices);
    }

    async fn push_result(&self, result: Result<Vec<Notice>, SessionError>) {
        let notices = match result {
            Ok(notices) => notices,
            Err(err) => vec![session_error_notice(&err)],
        };
        self.push_notices(notices).await;
    }
}

fn session_error_notice(err: &SessionError) -> Notice {
    tracing::warn!(error = %err, "transition rejected");
    if err.is_configuration() {
        Notice::warning(err.to_string())
    } else {
        Notice::error(err.to_string())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start", post(start))
        .route("/resume", post(resume))
        .route("/regenerate", post(regenerate))
        .route("/confirm", post(confirm))
        .route("/skip", post(skip))
        .route("/new-round", post(new_round))
        .route("/api/state", get(api_state))
        .route("/api/progress", get(api_progress))
        .route("/api/dataset", get(api_dataset))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

async fn index(State(state): State<Arc<AppState>>) -> Response {
    let model = match state.session.try_lock() {
        Ok(session) => session.view(),
        Err(_) => {
            let progress = *state.progress.borrow();
            return Html(render_busy_page(progress)).into_response();
        }
    };
    let notices = std::mem::take(&mut *state.notices.lock().await);
    Html(render_page(&model, &notices, &state.defaults)).into_response()
}

// ---------------------------------------------------------------------------
// Form parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartForm {
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub num_responses: String,
}

/// Fields of the review form: the cursor it was rendered for, the (possibly
/// edited) response texts and the best-answer checkboxes.
#[derive(Debug, Default, PartialEq)]
pub struct ReviewForm {
    pub cursor: Option<usize>,
    pub edited: Vec<String>,
    pub flags: Vec<bool>,
}

/// Browsers submit textarea content with CRLF line breaks.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Indexes at or above `max_slots` cannot belong to any group and are
/// dropped.
pub fn parse_review_form(fields: &[(String, String)], max_slots: usize) -> ReviewForm {
    let mut cursor = None;
    let mut responses = BTreeMap::new();
    let mut chosen = BTreeSet::new();

    for (name, value) in fields {
        if name == "cursor" {
            cursor = value.trim().parse().ok();
        } else if let Some(index) = name.strip_prefix("response_") {
            match index.parse::<usize>() {
                Ok(index) if index < max_slots => {
                    responses.insert(index, normalize_newlines(value));
                }
                _ => {}
            }
        } else if let Some(index) = name.strip_prefix("chosen_") {
            match index.parse::<usize>() {
                Ok(index) if index < max_slots => {
                    chosen.insert(index);
                }
                _ => {}
            }
        }
    }

    // Only a gap-free prefix counts as edited text; the rest falls back to
    // the generated responses.
    let edited: Vec<String> = (0..).map_while(|i| responses.remove(&i)).collect();
    let len = chosen
        .iter()
        .next_back()
        .map_or(edited.len(), |&last| edited.len().max(last + 1));
    let flags = (0..len).map(|i| chosen.contains(&i)).collect();

    ReviewForm {
        cursor,
        edited,
        flags,
    }
}

/// An empty count means "use the default".
fn parse_response_count(raw: &str, default: usize) -> Option<usize> {
    let raw = raw.trim();
    if raw.is_empty() {
        Some(default)
    } else {
        raw.parse().ok()
    }
}

/// Returns a warning when the form was rendered for a different group than
/// the one now under review.
fn stale_form_notice(session: &AnnotationSession, form: &ReviewForm) -> Option<Notice> {
    let current = session.cursor()?;
    if form.cursor == Some(current) {
        return None;
    }
    tracing::warn!(
        submitted = ?form.cursor,
        current,
        "stale review form rejected"
    );
    Some(Notice::warning(
        "That form was for an earlier group and was ignored. Review the current group below.",
    ))
}

// ---------------------------------------------------------------------------
// Transitions (post/redirect/get)
// ---------------------------------------------------------------------------

async fn start(State(state): State<Arc<AppState>>, Form(form): Form<StartForm>) -> Redirect {
    let Some(n) = parse_response_count(&form.num_responses, state.defaults.limits.default) else {
        state
            .push_notices(vec![Notice::warning(format!(
                "Number of responses must be a whole number, got {:?}.",
                form.num_responses
            ))])
            .await;
        return Redirect::to("/");
    };

    let guard = state.session.clone().lock_owned().await;
    let user_prompt = normalize_newlines(&form.user_prompt);
    spawn_generation(state, guard, move |session| {
        Box::pin(async move { session.start_batch(&user_prompt, n).await })
    });
    Redirect::to("/")
}

async fn regenerate(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = parse_review_form(&fields, state.defaults.limits.max);
    let guard = state.session.clone().lock_owned().await;
    if let Some(notice) = stale_form_notice(&guard, &form) {
        drop(guard);
        state.push_notices(vec![notice]).await;
        return Redirect::to("/");
    }
    spawn_generation(state, guard, |session| {
        Box::pin(async move { session.regenerate_current().await })
    });
    Redirect::to("/")
}

type TransitionFuture<'a> = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Vec<Notice>, SessionError>> + Send + 'a>,
>;

/// Runs a generating transition on a background task that already owns the
/// session lock, so the redirect that follows sees the busy page.
fn spawn_generation<F>(state: Arc<AppState>, mut guard: OwnedMutexGuard<AnnotationSession>, op: F)
where
    F: for<'a> FnOnce(&'a mut AnnotationSession) -> TransitionFuture<'a> + Send + 'static,
{
    tokio::spawn(async move {
        let result = op(&mut *guard).await;
        state.push_result(result).await;
        drop(guard);
    });
}

async fn resume(State(state): State<Arc<AppState>>) -> Redirect {
    let notices = state.session.lock().await.resume();
    state.push_notices(notices).await;
    Redirect::to("/")
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = parse_review_form(&fields, state.defaults.limits.max);
    let result = {
        let mut session = state.session.lock().await;
        match stale_form_notice(&session, &form) {
            Some(notice) => Ok(vec![notice]),
            None => session.confirm_or_skip(&form.edited, &form.flags),
        }
    };
    state.push_result(result).await;
    Redirect::to("/")
}

async fn skip(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = parse_review_form(&fields, state.defaults.limits.max);
    let result = {
        let mut session = state.session.lock().await;
        match stale_form_notice(&session, &form) {
            Some(notice) => Ok(vec![notice]),
            None => session.skip(),
        }
    };
    state.push_result(result).await;
    Redirect::to("/")
}

async fn new_round(State(state): State<Arc<AppState>>) -> Redirect {
    let notices = state.session.lock().await.start_new_round();
    state.push_notices(notices).await;
    Redirect::to("/")
}

// ---------------------------------------------------------------------------
// JSON API
// ---------------------------------------------------------------------------

/// Waits for any running transition to finish.
async fn api_state(State(state): State<Arc<AppState>>) -> Json<ViewModel> {
    Json(state.session.lock().await.view())
}

async fn api_progress(State(state): State<Arc<AppState>>) -> Json<BatchProgress> {
    Json(*state.progress.borrow())
}

async fn api_dataset(State(state): State<Arc<AppState>>) -> Json<Vec<PreferencePair>> {
    let session = state.session.lock().await;
    Json(
        session
            .snapshot()
            .map(|snapshot| snapshot.dataset.clone())
            .unwrap_or_default(),
    )
}
