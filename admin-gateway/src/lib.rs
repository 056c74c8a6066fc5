//! 数据库管理 REST 网关
//!
//! 在一个运行时可切换的连接之上，为 MySQL、PostgreSQL 和 MongoDB 提供统一的
//! 增删改查接口：
//! - 连接管理（连接、查看、断开）
//! - 表数据分页、排序、搜索、过滤
//! - 按 ID 插入、更新、批量删除
//! - JSON / CSV 导出与原生查询

pub mod adapters;
pub mod export;
pub mod handlers;
pub mod middleware;
pub mod normalizer;
pub mod registry;
pub mod routes;
pub mod service;
pub mod state;

use axum::{middleware as axum_middleware, routing::get, Json, Router};
use common::middleware::request_id_middleware;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use state::AppState;

pub const SERVICE_NAME: &str = "admin-gateway";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "数据库管理网关 API",
        version = "0.1.0",
        description = "MySQL / PostgreSQL / MongoDB 统一管理接口"
    ),
    paths(
        handlers::root,
        handlers::health_check,
        handlers::connect,
        handlers::current_connection,
        handlers::disconnect,
        handlers::get_columns,
        handlers::get_table_data,
        handlers::insert_row,
        handlers::update_row,
        handlers::delete_rows,
        handlers::export_table,
        handlers::run_query,
    ),
    components(schemas(
        common::models::ConnectRequest,
        common::models::ConnectionItem,
        common::models::DbType,
        common::models::QueryRequest,
        common::models::QueryResult,
        common::response::ErrorBody,
        common::response::StatusResponse,
        common::response::HealthResponse,
        common::response::ConnectResponse,
        common::response::ColumnsResponse,
        common::response::SuccessResponse,
        common::response::InsertResponse,
        common::response::DeleteResponse,
        common::response::TableDataResponse,
        handlers::DeleteRequest,
    )),
    tags(
        (name = "connection", description = "连接管理端点"),
        (name = "tables", description = "表数据端点"),
        (name = "query", description = "原生查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 组装完整的应用路由
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(state.clone()))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
