// =============================================================================
// HTML pages — MiniJinja templates compiled into the binary
// =============================================================================
//
// Templates are embedded with `include_str!` and registered under `.html`
// names, so MiniJinja auto-escapes every value except the analysis fragment,
// which is passed through the `safe` filter.
// =============================================================================

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::{context, Environment};
use tracing::error;

use crate::types::{AuthState, Interval};

pub struct Pages {
    env: Environment<'static>,
}

/// Values shown on the home page.
pub struct IndexView<'a> {
    pub app_name: &'a str,
    pub auth_state: AuthState,
    pub exchange: &'a str,
    pub instruments: usize,
}

/// Either the rendered analysis or the message explaining why there is none.
pub enum ResultBody {
    Analysis(String),
    Error(String),
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("base.html", include_str!("../../templates/base.html"))?;
        env.add_template("index.html", include_str!("../../templates/index.html"))?;
        env.add_template("result.html", include_str!("../../templates/result.html"))?;
        Ok(Self { env })
    }

    pub fn index(&self, view: IndexView<'_>) -> Response {
        let intervals: Vec<&str> = Interval::ALL.iter().map(Interval::as_str).collect();
        self.render(
            "index.html",
            context! {
                app_name => view.app_name,
                authenticated => view.auth_state == AuthState::Authenticated,
                auth_state => view.auth_state.to_string(),
                exchange => view.exchange,
                instruments => view.instruments,
                intervals => intervals,
            },
        )
    }

    pub fn result(&self, app_name: &str, stock: &str, body: ResultBody) -> Response {
        let (analysis_html, error) = match body {
            ResultBody::Analysis(html) => (Some(html), None),
            ResultBody::Error(msg) => (None, Some(msg)),
        };
        self.render(
            "result.html",
            context! {
                app_name => app_name,
                stock => stock,
                analysis_html => analysis_html,
                error => error,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Response {
        let rendered = self
            .env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(ctx));
        match rendered {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!(template = name, error = %e, "template render failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "page rendering failed").into_response()
            }
        }
    }
}
