//! Slack-facing HTTP routes.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Form, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

use newsbot_core::config::SlackConfig;
use newsbot_slack::api::SlackConnector;
use newsbot_slack::commands::{normalize_popular_command, CommandRouter, SlashCommandPayload};
use newsbot_slack::events::{newsroom_dispatcher, EventContext, EventDispatcher, EventsApiPayload};
use newsbot_slack::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use crate::health::{self, HealthState};
use crate::newsroom::Newsroom;
use crate::tenancy::TenantResolver;

pub const BOT_SCOPES: &str = "app_mentions:read,channels:history,chat:write,commands,reactions:read";
pub const OAUTH_SUCCESS_TEXT: &str = "Successfully installed app to your Slack team!";
pub const OAUTH_FAILURE_TEXT: &str = "Something went wrong with OAuth";

const MAX_SLACK_BODY_BYTES: usize = 1024 * 1024;
const INSTALL_TEMPLATE: &str = "install.html";

#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Clone)]
pub struct AppState {
    commands: Arc<CommandRouter<Newsroom>>,
    dispatcher: Arc<EventDispatcher>,
    tenants: TenantResolver,
    connector: Arc<dyn SlackConnector>,
    verifier: SignatureVerifier,
    oauth: Option<OAuthClient>,
    command_name: String,
    templates: Arc<Tera>,
}

impl AppState {
    pub fn new(
        newsroom: Newsroom,
        connector: Arc<dyn SlackConnector>,
        slack: &SlackConfig,
    ) -> Result<Self, tera::Error> {
        let shared = Arc::new(newsroom.clone());
        let dispatcher = newsroom_dispatcher(shared.clone(), shared);
        let oauth = match (&slack.client_id, &slack.client_secret) {
            (Some(client_id), Some(client_secret)) => {
                Some(OAuthClient { client_id: client_id.clone(), client_secret: client_secret.clone() })
            }
            _ => None,
        };

        Ok(Self {
            tenants: newsroom.tenants().clone(),
            commands: Arc::new(CommandRouter::new(newsroom)),
            dispatcher: Arc::new(dispatcher),
            connector,
            verifier: SignatureVerifier::new(slack.signing_secret.clone()),
            oauth,
            command_name: slack.command_name.clone(),
            templates: init_templates()?,
        })
    }
}

fn init_templates() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(INSTALL_TEMPLATE, include_str!("../../../templates/install.html"))?;
    Ok(Arc::new(tera))
}

pub fn router(state: AppState, health: HealthState) -> Router {
    let signed = Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/commands/popular_news", post(popular_news))
        .route_layer(middleware::from_fn_with_state(state.clone(), verify_slack_signature));

    Router::new()
        .merge(signed)
        .route("/install", get(install_page))
        .route("/oauth", get(oauth_callback))
        .with_state(state)
        .merge(health::router(health))
}

async fn verify_slack_signature(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_SLACK_BODY_BYTES).await else {
        return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
    };

    let validation = state.verifier.verify(
        header_value(&parts.headers, TIMESTAMP_HEADER),
        header_value(&parts.headers, SIGNATURE_HEADER),
        &bytes,
        Utc::now(),
    );
    if !validation.is_valid() {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            path = %parts.uri.path(),
            validation = ?validation,
            "rejected unsigned or stale slack request"
        );
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn slack_events(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match EventsApiPayload::parse(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(event_name = "ingress.slack.bad_payload", error = %error, "could not decode event");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    if let EventsApiPayload::UrlVerification { challenge } = &payload {
        return Json(json!({ "challenge": challenge })).into_response();
    }
    let Some(envelope) = payload.into_envelope() else {
        return StatusCode::OK.into_response();
    };

    let correlation_id = if envelope.envelope_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        envelope.envelope_id.clone()
    };
    info!(
        event_name = "ingress.slack.event",
        correlation_id = %correlation_id,
        event_type = envelope.event.event_type().as_str(),
        "accepted slack event"
    );

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let ctx = EventContext { correlation_id };
        if let Err(dispatch_error) = dispatcher.dispatch(&envelope, &ctx).await {
            error!(
                event_name = "ingress.slack.dispatch_failed",
                correlation_id = %ctx.correlation_id,
                error = %dispatch_error,
                "event handler failed"
            );
        }
    });

    StatusCode::OK.into_response()
}

async fn popular_news(
    State(state): State<AppState>,
    Form(payload): Form<SlashCommandPayload>,
) -> String {
    let mut envelope = match normalize_popular_command(payload, &state.command_name) {
        Ok(envelope) => envelope,
        Err(parse_error) => {
            let request_id = Uuid::new_v4().to_string();
            warn!(
                event_name = "ingress.slack.command_rejected",
                correlation_id = %request_id,
                error = %parse_error,
                "slash command could not be normalized"
            );
            return parse_error.into_interface(request_id).user_message().to_string();
        }
    };
    if envelope.request_id.is_empty() {
        envelope.request_id = Uuid::new_v4().to_string();
    }
    info!(
        event_name = "ingress.slack.command",
        correlation_id = %envelope.request_id,
        channel_id = %envelope.channel_id.0,
        "received popular_news command"
    );

    match state.commands.route(&envelope).await {
        Ok(reply) => reply,
        Err(route_error) => {
            error!(
                event_name = "ingress.slack.command_failed",
                correlation_id = %envelope.request_id,
                error = %route_error,
                "popular_news failed"
            );
            route_error.into_interface(&envelope.request_id).user_message().to_string()
        }
    }
}

async fn install_page(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let Some(oauth) = &state.oauth else {
        return Err((StatusCode::NOT_FOUND, Html("<h1>Installation is not enabled</h1>".to_string())));
    };

    let mut context = Context::new();
    context.insert("client_id", &oauth.client_id);
    context.insert("scopes", BOT_SCOPES);
    context.insert("command_name", &state.command_name);

    state.templates.render(INSTALL_TEMPLATE, &context).map(Html).map_err(|render_error| {
        error!(event_name = "install.render_failed", error = %render_error, "install page failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
    })
}

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    code: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthQuery>,
) -> (StatusCode, &'static str) {
    let Some(code) = query.code.filter(|code| !code.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Bad Request");
    };
    let Some(oauth) = &state.oauth else {
        warn!(event_name = "oauth.disabled", "oauth callback hit without client credentials");
        return (StatusCode::INTERNAL_SERVER_ERROR, OAUTH_FAILURE_TEXT);
    };

    let access =
        match state.connector.exchange_oauth_code(&oauth.client_id, &oauth.client_secret, &code).await {
            Ok(access) => access,
            Err(exchange_error) => {
                warn!(event_name = "oauth.exchange_failed", error = %exchange_error, "oauth exchange failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, OAUTH_FAILURE_TEXT);
            }
        };

    match state.tenants.install(access).await {
        Ok(_) => (StatusCode::OK, OAUTH_SUCCESS_TEXT),
        Err(install_error) => {
            warn!(event_name = "oauth.install_failed", error = %install_error, "could not store tenant");
            (StatusCode::INTERNAL_SERVER_ERROR, OAUTH_FAILURE_TEXT)
        }
    }
}
