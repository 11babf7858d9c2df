//! HTTP handlers for the three authorization entry points.

use std::sync::Arc;

use axum::{
    Form,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use super::pages;
use crate::crypto::{Cookies, SetCookie};
use crate::error::FlowError;
use crate::flow::{
    AuthorizationFlow, AuthorizeOutcome, AuthorizeQuery, CallbackQuery, ConsentForm, FlowFailure,
    FlowRedirect, FlowStage,
};

/// `GET /authorize`
///
/// Redirects to the IdP if the client is already approved, otherwise renders
/// the consent page.
pub async fn handle_authorize_get(
    State(flow): State<Arc<AuthorizationFlow>>,
    headers: HeaderMap,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unparseable authorize query");
            return malformed(FlowStage::Start, "Malformed authorization request")
                .into_response();
        }
    };
    let cookies = Cookies::from_headers(&headers);

    match flow.authorize(query, &cookies).await {
        Ok(AuthorizeOutcome::Redirect(redirect)) => redirect.into_response(),
        Ok(AuthorizeOutcome::Consent { page, csrf_cookie }) => {
            let mut response = Html(pages::render_consent_page(&page)).into_response();
            let headers = response.headers_mut();
            append_cookies(headers, std::slice::from_ref(&csrf_cookie));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("frame-ancestors 'none'"),
            );
            response
        }
        Err(failure) => failure.into_response(),
    }
}

/// `POST /authorize`
///
/// Accepts the consent form and redirects to the IdP.
pub async fn handle_authorize_post(
    State(flow): State<Arc<AuthorizationFlow>>,
    headers: HeaderMap,
    form: Result<Form<ConsentForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unparseable consent form");
            return malformed(FlowStage::ShowConsent, "Malformed approval form")
                .into_response();
        }
    };
    let cookies = Cookies::from_headers(&headers);

    match flow.approve(form, &cookies).await {
        Ok(redirect) => redirect.into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// `GET /callback`
///
/// Completes the login after the IdP redirects back.
pub async fn handle_callback(
    State(flow): State<Arc<AuthorizationFlow>>,
    headers: HeaderMap,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Unparseable callback query");
            return flow
                .callback_rejected("Malformed callback request")
                .into_response();
        }
    };
    let cookies = Cookies::from_headers(&headers);

    match flow.callback(query, &cookies).await {
        Ok(redirect) => redirect.into_response(),
        Err(failure) => failure.into_response(),
    }
}

fn malformed(stage: FlowStage, message: &str) -> FlowFailure {
    FlowFailure::new(stage, FlowError::invalid_request(message))
}

impl IntoResponse for FlowRedirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::FOUND.into_response();
        let headers = response.headers_mut();

        match HeaderValue::try_from(self.location) {
            Ok(location) => {
                headers.insert(header::LOCATION, location);
            }
            Err(e) => {
                tracing::error!(error = %e, "Redirect location is not a valid header value");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect")
                    .into_response();
            }
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        append_cookies(headers, &self.cookies);
        response
    }
}

impl IntoResponse for FlowFailure {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if status.is_server_error() {
            tracing::error!(
                stage = %self.stage,
                code = self.error.error_code(),
                error = %self.error,
                "Authorization flow failed"
            );
        } else {
            tracing::warn!(
                stage = %self.stage,
                code = self.error.error_code(),
                error = %self.error,
                "Authorization request rejected"
            );
        }

        let body = pages::render_error_page(self.error.error_code(), &self.error.user_message());
        let mut response = (status, Html(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(
            HeaderName::from_static("x-error-code"),
            HeaderValue::from_static(self.error.error_code()),
        );
        append_cookies(headers, &self.cookies);
        response
    }
}

fn append_cookies(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match HeaderValue::try_from(cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(
                cookie = cookie.name(),
                error = %e,
                "Invalid Set-Cookie value"
            ),
        }
    }
}
