//! Server-rendered callback pages
//!
//! All dynamic text goes through [`html_escape`]; error messages can come
//! straight from a redirect URL.

use chrono::{Datelike, Utc};

use crate::callback::{OutcomeMessage, ReconciliationOutcome};
use super::{CALLBACK_PATH, PASSWORD_PATH};

/// Values every page needs besides the outcome
pub struct PageContext<'a> {
    pub site_name: &'a str,
    pub min_password_length: usize,
}

/// Escape text for use in HTML element content and quoted attributes
#[must_use]
pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the page for an outcome
#[must_use]
pub fn render_page(outcome: &ReconciliationOutcome, ctx: &PageContext<'_>) -> String {
    let content = outcome.content();
    let title = html_escape(content.title);
    let icon = status_icon(outcome);

    let body = match outcome {
        ReconciliationOutcome::Loading => loading_body(),
        ReconciliationOutcome::ShowRecoveryForm { form_error } => {
            recovery_form(form_error.as_deref(), ctx.min_password_length)
        }
        _ => {
            let message = match content.message {
                OutcomeMessage::Static(text) => html_escape(text),
                OutcomeMessage::Carried => html_escape(outcome.message()),
            };
            format!(r#"<p class="message">{message}</p>"#)
        }
    };

    let actions = if outcome.is_terminal() {
        terminal_actions(outcome, ctx.site_name)
    } else {
        String::new()
    };

    let site_name = html_escape(ctx.site_name);
    let year = Utc::now().year();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="robots" content="noindex">
    <title>{title} - {site_name}</title>
    <style>{styles}</style>
</head>
<body>
    <main class="container">
        <div class="brand"><a href="/">{site_name}</a></div>
        <div class="card">
            <div class="icon">{icon}</div>
            <h1>{title}</h1>
            {body}
            {actions}
        </div>
        <p class="footer">&copy; {year} {site_name}. All rights reserved.</p>
    </main>
</body>
</html>"#,
        styles = get_page_styles(),
    )
}

fn status_icon(outcome: &ReconciliationOutcome) -> &'static str {
    match outcome {
        ReconciliationOutcome::Loading => r#"<div class="spinner"></div>"#,
        ReconciliationOutcome::Error(_) => {
            r#"<svg class="error" fill="none" viewBox="0 0 24 24" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M6 18L18 6M6 6l12 12"/></svg>"#
        }
        ReconciliationOutcome::Success(_) => {
            r#"<svg class="success" fill="none" viewBox="0 0 24 24" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M5 13l4 4L19 7"/></svg>"#
        }
        ReconciliationOutcome::ShowRecoveryForm { .. } => {
            r#"<svg class="key" fill="none" viewBox="0 0 24 24" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M15 7a2 2 0 012 2m4 0a6 6 0 01-7.743 5.743L11 17H9v2H7v2H4a1 1 0 01-1-1v-2.586a1 1 0 01.293-.707l5.964-5.964A6 6 0 1121 9z"/></svg>"#
        }
        ReconciliationOutcome::Unresolved => "",
    }
}

/// Copies the fragment and query into a form and posts them back; the
/// fragment never reaches the server otherwise
fn loading_body() -> String {
    format!(
        r#"<p class="message">{message}</p>
            <form id="callback-form" method="post" action="{action}">
                <input type="hidden" name="fragment" value="">
                <input type="hidden" name="query" value="">
                <noscript><p class="message">JavaScript is required to finish this step.</p><button type="submit">Continue</button></noscript>
            </form>
            <script>
            (function () {{
                var form = document.getElementById("callback-form");
                form.elements.fragment.value = window.location.hash.substring(1);
                form.elements.query.value = window.location.search.substring(1);
                if (window.history && window.history.replaceState) {{
                    window.history.replaceState(null, "", window.location.pathname);
                }}
                form.submit();
            }})();
            </script>"#,
        message = html_escape(ReconciliationOutcome::Loading.message()),
        action = CALLBACK_PATH,
    )
}

fn recovery_form(form_error: Option<&str>, min_length: usize) -> String {
    let error = form_error.map_or_else(String::new, |message| {
        format!(r#"<p class="form-error" role="alert">{}</p>"#, html_escape(message))
    });

    format!(
        r#"<form method="post" action="{PASSWORD_PATH}" class="password-form">
                <input type="password" name="password" placeholder="New password" autocomplete="new-password" required minlength="{min_length}">
                <input type="password" name="confirm_password" placeholder="Confirm new password" autocomplete="new-password" required minlength="{min_length}">
                {error}
                <button type="submit">Update Password</button>
            </form>"#
    )
}

fn terminal_actions(outcome: &ReconciliationOutcome, site_name: &str) -> String {
    let hint = if matches!(outcome, ReconciliationOutcome::Success(_)) {
        format!(
            "You can now return to the {} app to continue.",
            html_escape(site_name)
        )
    } else {
        "Please try again or contact support if the issue persists.".to_string()
    };

    format!(
        r#"<div class="actions">
                <p class="hint">{hint}</p>
                <a href="/" class="button">Back to Home</a>
            </div>"#
    )
}

#[allow(clippy::too_many_lines)]
const fn get_page_styles() -> &'static str {
    r"
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            background: radial-gradient(circle at 20% 20%, #1e1b4b 0%, #0b1020 60%);
            color: #e5e7eb;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            width: 100%;
            max-width: 420px;
        }

        .brand {
            text-align: center;
            margin-bottom: 32px;
        }

        .brand a {
            color: #fff;
            font-size: 30px;
            font-weight: 700;
            text-decoration: none;
        }

        .card {
            background: rgba(255, 255, 255, 0.06);
            border: 1px solid rgba(255, 255, 255, 0.12);
            border-radius: 16px;
            box-shadow: 0 0 40px rgba(99, 102, 241, 0.15);
            padding: 32px;
            text-align: center;
        }

        .icon {
            display: flex;
            justify-content: center;
            margin-bottom: 24px;
        }

        .icon svg {
            width: 64px;
            height: 64px;
        }

        .icon .success { color: #4ade80; }
        .icon .error { color: #f87171; }
        .icon .key { color: #a5b4fc; }

        .spinner {
            width: 64px;
            height: 64px;
            border: 4px solid rgba(129, 140, 248, 0.3);
            border-top-color: #818cf8;
            border-radius: 50%;
            animation: spin 1s linear infinite;
        }

        @keyframes spin {
            to { transform: rotate(360deg); }
        }

        h1 {
            color: #fff;
            font-size: 24px;
            font-weight: 700;
            margin-bottom: 12px;
        }

        .message {
            color: #d1d5db;
            line-height: 1.6;
        }

        .password-form {
            display: flex;
            flex-direction: column;
            gap: 16px;
            margin-top: 24px;
        }

        .password-form input {
            padding: 12px 16px;
            border-radius: 12px;
            border: 1px solid rgba(255, 255, 255, 0.15);
            background: rgba(255, 255, 255, 0.05);
            color: #fff;
            font-size: 16px;
        }

        .form-error {
            color: #f87171;
            font-size: 14px;
        }

        button, .button {
            display: inline-block;
            padding: 12px 24px;
            border-radius: 12px;
            border: none;
            background: #6366f1;
            color: #fff;
            font-size: 15px;
            font-weight: 500;
            text-decoration: none;
            cursor: pointer;
        }

        button:hover, .button:hover {
            background: #5558e3;
        }

        .actions {
            margin-top: 32px;
        }

        .hint {
            color: #9ca3af;
            font-size: 14px;
            margin-bottom: 16px;
        }

        .footer {
            text-align: center;
            color: #6b7280;
            font-size: 14px;
            margin-top: 32px;
        }

        @media (max-width: 480px) {
            .card {
                padding: 24px 16px;
            }
        }
    "
}
