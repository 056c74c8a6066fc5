//! 路由模块

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::middleware::require_connection;
use crate::state::AppState;

/// 创建网关路由
///
/// 表相关的路由都要求已有活动连接。
pub fn router(state: AppState) -> Router<AppState> {
    let scoped = Router::new()
        .route(
            "/connection",
            get(handlers::current_connection).delete(handlers::disconnect),
        )
        .route("/columns/{table}", get(handlers::get_columns))
        .route(
            "/data/{table}",
            get(handlers::get_table_data)
                .post(handlers::insert_row)
                .delete(handlers::delete_rows),
        )
        .route("/data/{table}/{id}", put(handlers::update_row))
        .route("/export/{table}", get(handlers::export_table))
        .route("/query", post(handlers::run_query))
        .route_layer(middleware::from_fn_with_state(state, require_connection));

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health_check))
        .route("/connect", post(handlers::connect))
        .merge(scoped)
}
