//! HTML pages
//!
//! Server-rendered public site: home, topic index and detail, post detail
//! with the comment form, and the photo contest. Every page extends
//! `base.html` and receives the standard template variables.

use axum::{
    extract::{multipart::MultipartError, Form, Multipart, Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::middleware::AppState;
use crate::models::{CommentWithMeta, CreateCommentInput, Post};
use crate::services::{
    CommentServiceError, ContestForm, ContestServiceError, FormErrors, PhotoUpload,
    HOME_TOPIC_LIMIT, SIDEBAR_TOPIC_LIMIT,
};
use crate::theme::{simple_error_page, StandardTemplateVars};

/// Characters of post text shown in topic listings
const EXCERPT_CHARS: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/home/", get(home))
        .route("/topics/", get(topic_list))
        .route("/topic/{slug}", get(topic_detail))
        .route("/post/{slug}", get(post_detail))
        .route("/post/{slug}/comments", axum::routing::post(submit_comment))
        .route("/contest/", get(contest).post(submit_contest))
}

// ============================================================================
// Rendering
// ============================================================================

/// Error shown to a visitor as an HTML page
#[derive(Debug)]
pub struct PageError {
    pub status: StatusCode,
    pub title: String,
    pub message: String,
}

impl PageError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            title: "Page Not Found".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(error: impl std::fmt::Display) -> Self {
        tracing::error!("Page handler failed: {}", error);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            title: "Server Error".to_string(),
            message: "Something went wrong on our side. Please try again later.".to_string(),
        }
    }
}

async fn standard_vars(state: &AppState, path: &str) -> StandardTemplateVars {
    let top_topics = match state.topic_service.top_topics(SIDEBAR_TOPIC_LIMIT).await {
        Ok(topics) => topics,
        Err(e) => {
            tracing::warn!("Sidebar topics unavailable: {}", e);
            Vec::new()
        }
    };

    StandardTemplateVars::new(
        &state.config.site.name,
        &state.config.site.description,
        path,
        state.clock.now().year(),
    )
    .with_top_topics(top_topics)
}

/// Render `template` with the standard variables, as an HTML response
async fn render(
    state: &AppState,
    path: &str,
    status: StatusCode,
    template: &str,
    context: TeraContext,
) -> Response {
    let vars = standard_vars(state, path).await;
    let rendered = match state.theme_engine.read() {
        Ok(engine) => engine.render_with_standard_vars(template, &context, &vars),
        Err(_) => Err(anyhow::anyhow!("theme engine lock poisoned")),
    };

    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            let error = PageError::internal(format!("template '{}': {:#}", template, e));
            error_page(state, path, error).await
        }
    }
}

/// Render `error.html`, or the built-in error page when the theme cannot
async fn error_page(state: &AppState, path: &str, error: PageError) -> Response {
    let vars = standard_vars(state, path).await;
    let mut context = TeraContext::new();
    context.insert("status", &error.status.as_u16());
    context.insert("error_title", &error.title);
    context.insert("error_message", &error.message);

    let html = state
        .theme_engine
        .read()
        .ok()
        .and_then(|engine| {
            engine
                .render_with_standard_vars("error.html", &context, &vars)
                .map_err(|e| tracing::warn!("Error template failed: {:#}", e))
                .ok()
        })
        .unwrap_or_else(|| simple_error_page(&error.title, &error.message));

    (error.status, Html(html)).into_response()
}

/// Fallback for unknown paths
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    let message = format!("Nothing lives at {}.", uri.path());
    error_page(&state, uri.path(), PageError::not_found(message)).await
}

// ============================================================================
// Views
// ============================================================================

fn display_date(at: &DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

#[derive(Debug, Serialize)]
struct PostView {
    title: String,
    slug: String,
    url: String,
    published: Option<String>,
    published_iso: Option<String>,
    excerpt: String,
}

impl PostView {
    fn new(post: &Post, excerpt: String) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
            url: post.absolute_url(),
            published: post.published_at.as_ref().map(display_date),
            published_iso: post.published_at.map(|at| at.to_rfc3339()),
            excerpt,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommentView {
    name: String,
    text: String,
    avatar_url: String,
    created: String,
}

impl From<CommentWithMeta> for CommentView {
    fn from(comment: CommentWithMeta) -> Self {
        Self {
            created: display_date(&comment.created_at),
            name: comment.name,
            text: comment.text,
            avatar_url: comment.avatar_url,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct CommentFormView {
    name: String,
    email: String,
    text: String,
}

#[derive(Debug, Default, Serialize)]
struct ContestFormView {
    name: String,
    email: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / and GET /home/
async fn home(State(state): State<AppState>, uri: Uri) -> Response {
    let topics = match state.topic_service.top_topics(HOME_TOPIC_LIMIT).await {
        Ok(topics) => topics,
        Err(e) => return error_page(&state, uri.path(), PageError::internal(e)).await,
    };

    let mut context = TeraContext::new();
    context.insert("topics", &topics);
    render(&state, uri.path(), StatusCode::OK, "home.html", context).await
}

/// GET /topics/
async fn topic_list(State(state): State<AppState>, uri: Uri) -> Response {
    let topics = match state.topic_service.list().await {
        Ok(topics) => topics,
        Err(e) => return error_page(&state, uri.path(), PageError::internal(e)).await,
    };

    let mut context = TeraContext::new();
    context.insert("topics", &topics);
    render(&state, uri.path(), StatusCode::OK, "topic_list.html", context).await
}

/// GET /topic/{slug}
async fn topic_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    uri: Uri,
) -> Response {
    let topic = match state.topic_service.get_by_slug(&slug).await {
        Ok(Some(topic)) => topic,
        Ok(None) => {
            let error = PageError::not_found(format!("There is no topic called \"{}\".", slug));
            return error_page(&state, uri.path(), error).await;
        }
        Err(e) => return error_page(&state, uri.path(), PageError::internal(e)).await,
    };

    let posts = match state.post_service.published_for_topic(topic.id).await {
        Ok(posts) => posts,
        Err(e) => return error_page(&state, uri.path(), PageError::internal(e)).await,
    };
    let posts: Vec<PostView> = posts
        .iter()
        .map(|post| PostView::new(post, state.markdown.excerpt(&post.content, EXCERPT_CHARS)))
        .collect();

    let mut context = TeraContext::new();
    context.insert("topic", &topic);
    context.insert("posts", &posts);
    render(&state, uri.path(), StatusCode::OK, "topic_detail.html", context).await
}

#[derive(Debug, Deserialize)]
struct PostQuery {
    comment: Option<String>,
}

/// GET /post/{slug}
async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PostQuery>,
    uri: Uri,
) -> Response {
    let pending = query.comment.as_deref() == Some("pending");
    render_post(&state, &slug, uri.path(), CommentFormView::default(), FormErrors::new(), pending)
        .await
}

/// Post page with its comment form filled from `form`
async fn render_post(
    state: &AppState,
    slug: &str,
    path: &str,
    form: CommentFormView,
    errors: FormErrors,
    comment_pending: bool,
) -> Response {
    let post = match state.post_service.published_by_slug(slug).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            let error = PageError::not_found("The post you are looking for does not exist.");
            return error_page(state, path, error).await;
        }
        Err(e) => return error_page(state, path, PageError::internal(e)).await,
    };

    let details = async {
        let author = state.post_service.author(&post).await?;
        let topics = state.post_service.topics_for_post(post.id).await?;
        Ok::<_, anyhow::Error>((author, topics))
    };
    let (author, topics) = match details.await {
        Ok(details) => details,
        Err(e) => return error_page(state, path, PageError::internal(e)).await,
    };
    let comments: Vec<CommentView> = match state.comment_service.approved_for_post(post.id).await
    {
        Ok(comments) => comments.into_iter().map(CommentView::from).collect(),
        Err(e) => return error_page(state, path, PageError::internal(e)).await,
    };

    let mut context = TeraContext::new();
    context.insert("post", &PostView::new(&post, String::new()));
    context.insert("author", &author.as_ref().map(|user| user.byline()));
    context.insert("topics", &topics);
    context.insert("content_html", &state.markdown.render(&post.content));
    context.insert("comments", &comments);
    context.insert("comment_pending", &comment_pending);
    context.insert("form", &form);
    context.insert("errors", &errors);
    render(state, path, StatusCode::OK, "post_detail.html", context).await
}

/// POST /post/{slug}/comments
async fn submit_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(input): Form<CreateCommentInput>,
) -> Response {
    let post_path = format!("/post/{}", slug);
    let form = CommentFormView {
        name: input.name.clone(),
        email: input.email.clone(),
        text: input.text.clone(),
    };

    match state.comment_service.submit(&slug, input).await {
        Ok(_) => Redirect::to(&format!("{}?comment=pending", post_path)).into_response(),
        Err(CommentServiceError::InvalidForm(errors)) => {
            render_post(&state, &slug, &post_path, form, errors, false).await
        }
        Err(CommentServiceError::PostNotFound(_)) => {
            let error = PageError::not_found("The post you are looking for does not exist.");
            error_page(&state, &post_path, error).await
        }
        Err(e) => error_page(&state, &post_path, PageError::internal(e)).await,
    }
}

#[derive(Debug, Deserialize)]
struct ContestQuery {
    submitted: Option<String>,
}

/// GET /contest/
async fn contest(
    State(state): State<AppState>,
    Query(query): Query<ContestQuery>,
    uri: Uri,
) -> Response {
    let submitted = query.submitted.as_deref() == Some("1");
    render_contest(&state, uri.path(), ContestFormView::default(), FormErrors::new(), submitted)
        .await
}

async fn render_contest(
    state: &AppState,
    path: &str,
    form: ContestFormView,
    errors: FormErrors,
    submitted: bool,
) -> Response {
    let mut context = TeraContext::new();
    context.insert("submitted", &submitted);
    context.insert("form", &form);
    context.insert("errors", &errors);
    render(state, path, StatusCode::OK, "contest.html", context).await
}

/// Collect the contest fields from a multipart body
async fn read_contest_form(multipart: &mut Multipart) -> Result<ContestForm, MultipartError> {
    let mut form = ContestForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = field.text().await?,
            "email" => form.email = field.text().await?,
            "photo" => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await?.to_vec();
                // Browsers send an unnamed empty part when no file was chosen
                if bytes.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                form.photo = Some(PhotoUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// POST /contest/
async fn submit_contest(State(state): State<AppState>, uri: Uri, mut multipart: Multipart) -> Response {
    let form = match read_contest_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Unreadable contest upload: {}", e);
            let mut errors = FormErrors::new();
            errors.add("photo", "The upload could not be read. Please try again.");
            return render_contest(&state, uri.path(), ContestFormView::default(), errors, false).await;
        }
    };

    let view = ContestFormView {
        name: form.name.clone(),
        email: form.email.clone(),
    };

    match state.contest_service.submit(form).await {
        Ok(_) => Redirect::to("/contest/?submitted=1").into_response(),
        Err(ContestServiceError::InvalidForm(errors)) => {
            render_contest(&state, uri.path(), view, errors, false).await
        }
        Err(e) => error_page(&state, uri.path(), PageError::internal(e)).await,
    }
}
