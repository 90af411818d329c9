use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rolegate::config::{generate_key, CookieSettings};
use rolegate::web::{handler_fn, Handler, Request, Router};
use rolegate::{AccessConfig, AccessController, Directory, LoginDecider, LoginDecision, RequestContext, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
}

/// Demo login: "admin" edits, anyone else with a non-empty name views.
struct DemoLogin {
    viewer: Role,
    editor: Role,
}

impl LoginDecider<User> for DemoLogin {
    fn decide<'a>(&'a self, _ctx: &'a RequestContext, req: Request) -> BoxFuture<'a, anyhow::Result<LoginDecision<User>>> {
        Box::pin(async move {
            let body = axum::body::to_bytes(req.into_body(), 16 * 1024).await?;
            let Ok(payload) = serde_json::from_slice::<LoginPayload>(&body) else {
                return Ok(LoginDecision::deny());
            };
            let role = match payload.username.as_str() {
                "" => return Ok(LoginDecision::deny()),
                "admin" => self.editor.clone(),
                _ => self.viewer.clone(),
            };
            Ok(LoginDecision::issue(User { name: payload.username }, role))
        })
    }
}

fn whoami() -> Handler {
    handler_fn(|ctx, _req| async move {
        let claims = ctx.claims().ok_or_else(|| anyhow::anyhow!("no claims in context"))?;
        let user: User = claims.decode()?;
        Ok::<_, anyhow::Error>(Json(serde_json::json!({"status": "ok", "user": user.name})).into_response())
    })
}

fn write_doc() -> Handler {
    handler_fn(|_ctx, _req| async { Ok::<_, anyhow::Error>(StatusCode::NO_CONTENT.into_response()) })
}

fn load_config() -> anyhow::Result<AccessConfig> {
    match AccessConfig::from_env() {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            warn!(target: "rolegate", "{e}; using a random key, sessions will not survive a restart");
            let key = generate_key()?;
            Ok(AccessConfig {
                name: "rolegate-demo".to_string(),
                key: rolegate::config::encode_key(&key),
                cookie: CookieSettings { secure: false, ..CookieSettings::default() },
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let http_port = std::env::var("ROLEGATE_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let config = load_config()?;
    info!(target: "rolegate", "rolegate demo starting: http_port={}, controller={}", http_port, config.name);

    let directory = Directory::global();
    let controller = AccessController::from_config(directory, &config)?;
    let docs = directory.create_manager("docs")?;
    let read = docs.create_permission("read")?;
    let write = docs.create_permission("write")?;
    let viewer = docs.create_role("viewer", &[read.clone()])?;
    let editor = docs.create_role("editor", &[read.clone(), write.clone()])?;

    let mut router = Router::new(Vec::new());
    router.handle(Method::POST, "/login", controller.login::<User, _>(DemoLogin { viewer, editor }).into_handler(), &[])?;
    {
        let mut docs_routes = router.group("/docs", vec![controller.verify(&[read])?.middleware()]);
        docs_routes.handle(Method::GET, "/whoami", whoami(), &[])?;
        docs_routes.handle(Method::POST, "/", write_doc(), &[controller.verify(&[write])?.middleware()])?;
    }
    let app = router.into_axum();

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!(target: "rolegate", "HTTP listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
