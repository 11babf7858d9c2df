//! HTML pages: consent dialog and error page.

use crate::flow::ConsentPage;

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f5f5f5; margin: 0; display: flex; justify-content: center; align-items: center; min-height: 100vh; }
.card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; max-width: 420px; width: 100%; }
h1 { font-size: 20px; margin: 0 0 8px; color: #333; }
.subtitle { color: #666; font-size: 14px; margin: 0 0 24px; }
.logo { max-height: 48px; margin-bottom: 12px; }
.detail { font-size: 13px; color: #555; margin: 4px 0; word-break: break-all; }
.actions { display: flex; gap: 8px; margin-top: 24px; }
button { flex: 1; padding: 10px; border: none; border-radius: 4px; font-size: 14px; font-weight: 500; cursor: pointer; }
.approve { background: #06c755; color: #fff; }
.approve:hover { background: #05a647; }
.cancel { background: #eee; color: #333; }
.error { color: #c00; }
code { font-size: 12px; color: #999; }
</style>"#;

/// Render the consent page.
///
/// All values are HTML-escaped to prevent XSS. The form posts back
/// `csrf_token` and `state` to `/authorize`.
#[must_use]
pub fn render_consent_page(page: &ConsentPage) -> String {
    let logo_html = page
        .server
        .logo_url
        .as_deref()
        .map(|url| format!(r#"<img class="logo" src="{}" alt="">"#, html_escape(url)))
        .unwrap_or_default();

    let description_html = page
        .server
        .description
        .as_deref()
        .map(|d| format!(r#"<p class="subtitle">{}</p>"#, html_escape(d)))
        .unwrap_or_default();

    let client_logo_html = page
        .client_logo_uri
        .as_deref()
        .map(|url| format!(r#"<img class="logo" src="{}" alt="">"#, html_escape(url)))
        .unwrap_or_default();

    let client_uri_html = page
        .client_uri
        .as_deref()
        .map(|uri| format!(r#"<p class="detail">Website: {}</p>"#, html_escape(uri)))
        .unwrap_or_default();

    let scope_html = if page.scope.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="detail">Scope: {}</p>"#, html_escape(&page.scope.join(" ")))
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Authorize {client_name} - {server_name}</title>
{style}
</head>
<body>
<div class="card">
{logo_html}
<h1>{server_name}</h1>
{description_html}
{client_logo_html}
<p class="subtitle"><strong>{client_name}</strong> is requesting access to your account</p>
<p class="detail">Redirects to: {redirect_uri}</p>
{client_uri_html}
{scope_html}
<form method="POST" action="/authorize">
<input type="hidden" name="csrf_token" value="{csrf_token}">
<input type="hidden" name="state" value="{state}">
<div class="actions">
<button type="button" class="cancel" onclick="window.history.back()">Cancel</button>
<button type="submit" class="approve">Approve</button>
</div>
</form>
</div>
</body>
</html>"#,
        style = STYLE,
        logo_html = logo_html,
        description_html = description_html,
        client_logo_html = client_logo_html,
        client_uri_html = client_uri_html,
        scope_html = scope_html,
        client_name = html_escape(&page.client_name),
        server_name = html_escape(&page.server.name),
        redirect_uri = html_escape(&page.redirect_uri),
        csrf_token = html_escape(&page.csrf_token),
        state = html_escape(&page.encoded_state),
    )
}

/// Render an error page with a user-facing message and a stable error code.
#[must_use]
pub fn render_error_page(error_code: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Authorization failed</title>
{style}
</head>
<body>
<div class="card">
<h1>Authorization failed</h1>
<p class="error">{message}</p>
<code>{error_code}</code>
</div>
</body>
</html>"#,
        style = STYLE,
        message = html_escape(message),
        error_code = html_escape(error_code),
    )
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
