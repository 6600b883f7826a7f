//! Todo リソースの HTTP API（axum）
//!
//! ルート一覧:
//! - `GET /` サービス情報
//! - `GET /health` ヘルスチェック（ストア接続状態を含む）
//! - `GET|POST /api/todos`
//! - `PUT|DELETE /api/todos/:id`
//!
//! 未知のパスは 404、既知のパスへの未対応メソッドは 405 をいずれも JSON で返します。

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use infrastructure::{InMemoryTodoStore, TodoStore};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod error;
pub mod handlers;

use error::{ErrorBody, ErrorDetail};

/// アプリケーションの共有状態
///
/// ストアは起動時に一度だけ確立し、全リクエストで共有します。
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TodoStore>,
    expose_error_details: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self {
            store,
            expose_error_details: false,
        }
    }

    /// 開発環境向けに、エラーレスポンスへ内部詳細を含めるかどうか
    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    pub fn store(&self) -> &Arc<dyn TodoStore> {
        &self.store
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryTodoStore::new()))
    }
}

/// InMemory ストアでルータを構築して返します。
pub fn app() -> Router {
    app_with_state(AppState::default())
}

/// 外部から状態を注入できる版
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::root).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/todos",
            get(handlers::list_todos)
                .post(handlers::create_todo)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/todos/:id",
            put(handlers::update_todo)
                .delete(handlers::delete_todo)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            render_error_detail,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// リスナー上でサーバを起動し、`shutdown` が完了したら新規接続の受付を止めて
/// 処理中のリクエストを待ってから戻ります。
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app_with_state(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// リクエスト元のオリジンをそのまま許可する（資格情報付き）
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );
    response
}

/// 開発環境ではエラーレスポンスに `detail` を付与する
async fn render_error_detail(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let Some(ErrorDetail { message, detail }) = response.extensions_mut().remove::<ErrorDetail>()
    else {
        return response;
    };
    if !state.expose_error_details {
        return response;
    }

    let body = ErrorBody {
        message,
        detail: Some(detail),
    };
    (response.status(), Json(body)).into_response()
}

/// 想定外のパニックも整形済みの 500 JSON として返す
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Unhandled error");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: "Something went wrong!".to_string(),
            detail: None,
        }),
    )
        .into_response()
}
