//! Handler模块

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use common::errors::AppError;
use common::extract::AppJson;
use common::models::{ConnectRequest, ConnectionItem, QueryRequest, QueryResult, Row};
use common::response::{
    ColumnsResponse, ConnectResponse, DeleteResponse, HealthResponse, InsertResponse,
    StatusResponse, SuccessResponse, TableDataResponse,
};

use crate::export::{self, ExportFormat};
use crate::normalizer::{normalize_ids, ListParams};
use crate::registry::ActiveConnection;
use crate::service::{ConnectionService, TableService};
use crate::state::AppState;

/// 批量删除请求
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteRequest {
    /// 待删除行的 ID（字符串或数字）
    #[serde(default)]
    #[validate(length(min = 1, message = "No IDs provided for deletion"))]
    #[schema(value_type = Vec<Object>)]
    pub ids: Vec<serde_json::Value>,
}

/// 导出参数
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    /// `json`（默认）或 `csv`
    pub format: Option<String>,
}

/// 服务存活检查
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "服务运行中", body = StatusResponse)
    )
)]
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse::ok("Database admin gateway is running"))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state
        .registry
        .current()
        .await
        .map(|conn| conn.engine().to_string());
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        engine,
    })
}

/// 建立数据库连接（替换当前连接）
#[utoipa::path(
    post,
    path = "/connect",
    tag = "connection",
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "连接成功，返回表列表", body = ConnectResponse),
        (status = 400, description = "参数错误或不支持的数据库类型", body = common::response::ErrorBody),
        (status = 500, description = "连接失败", body = common::response::ErrorBody)
    )
)]
pub async fn connect(
    State(state): State<AppState>,
    AppJson(req): AppJson<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    let service = ConnectionService::new(state.registry);
    let tables = service.connect(req).await?;
    Ok(Json(ConnectResponse::connected(tables)))
}

/// 当前连接信息
#[utoipa::path(
    get,
    path = "/connection",
    tag = "connection",
    responses(
        (status = 200, description = "当前连接（不含密码）", body = ConnectionItem),
        (status = 400, description = "没有活动连接", body = common::response::ErrorBody)
    )
)]
pub async fn current_connection(
    State(state): State<AppState>,
) -> Result<Json<ConnectionItem>, AppError> {
    let service = ConnectionService::new(state.registry);
    Ok(Json(service.current().await?))
}

/// 断开当前连接
#[utoipa::path(
    delete,
    path = "/connection",
    tag = "connection",
    responses(
        (status = 200, description = "已断开", body = SuccessResponse),
        (status = 400, description = "没有活动连接", body = common::response::ErrorBody)
    )
)]
pub async fn disconnect(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    let service = ConnectionService::new(state.registry);
    service.disconnect().await?;
    Ok(Json(SuccessResponse::ok()))
}

/// 获取表的列名
#[utoipa::path(
    get,
    path = "/columns/{table}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名")
    ),
    responses(
        (status = 200, description = "列名列表", body = ColumnsResponse),
        (status = 400, description = "没有活动连接", body = common::response::ErrorBody)
    )
)]
pub async fn get_columns(
    Extension(connection): Extension<ActiveConnection>,
    Path(table): Path<String>,
) -> Result<Json<ColumnsResponse>, AppError> {
    let service = TableService::new(connection);
    let columns = service.columns(&table).await?;
    Ok(Json(ColumnsResponse { columns }))
}

/// 分页、排序、搜索、过滤查询表数据
#[utoipa::path(
    get,
    path = "/data/{table}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名"),
        ListParams
    ),
    responses(
        (status = 200, description = "当前页数据和过滤后的总数", body = TableDataResponse),
        (status = 400, description = "参数错误或列不存在", body = common::response::ErrorBody),
        (status = 500, description = "数据库错误", body = common::response::ErrorBody)
    )
)]
pub async fn get_table_data(
    Extension(connection): Extension<ActiveConnection>,
    Path(table): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<TableDataResponse>, AppError> {
    let service = TableService::new(connection);
    let (data, total) = service.list(&table, &params).await?;
    Ok(Json(TableDataResponse { data, total }))
}

/// 插入一行
#[utoipa::path(
    post,
    path = "/data/{table}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名")
    ),
    request_body(content = Object, description = "列名到值的映射"),
    responses(
        (status = 200, description = "插入成功", body = InsertResponse),
        (status = 500, description = "数据库错误", body = common::response::ErrorBody)
    )
)]
pub async fn insert_row(
    Extension(connection): Extension<ActiveConnection>,
    Path(table): Path<String>,
    AppJson(row): AppJson<Row>,
) -> Result<Json<InsertResponse>, AppError> {
    let service = TableService::new(connection);
    let inserted_id = service.insert(&table, row).await?;
    Ok(Json(InsertResponse {
        success: true,
        inserted_id,
    }))
}

/// 按 ID 更新一行
#[utoipa::path(
    put,
    path = "/data/{table}/{id}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名"),
        ("id" = String, Path, description = "行 ID")
    ),
    request_body(content = Object, description = "要修改的列"),
    responses(
        (status = 200, description = "更新成功", body = SuccessResponse),
        (status = 400, description = "ID 格式错误", body = common::response::ErrorBody),
        (status = 500, description = "没有匹配的行或数据库错误", body = common::response::ErrorBody)
    )
)]
pub async fn update_row(
    Extension(connection): Extension<ActiveConnection>,
    Path((table, id)): Path<(String, String)>,
    AppJson(changes): AppJson<Row>,
) -> Result<Json<SuccessResponse>, AppError> {
    let service = TableService::new(connection);
    service.update(&table, &id, changes).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// 按 ID 批量删除
#[utoipa::path(
    delete,
    path = "/data/{table}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名")
    ),
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "删除完成（可能为 0 行）", body = DeleteResponse),
        (status = 400, description = "未提供 ID", body = common::response::ErrorBody)
    )
)]
pub async fn delete_rows(
    Extension(connection): Extension<ActiveConnection>,
    Path(table): Path<String>,
    AppJson(req): AppJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, AppError> {
    req.validate()?;
    let ids = normalize_ids(&req.ids)?;
    let service = TableService::new(connection);
    let deleted_count = service.delete(&table, ids).await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted_count,
    }))
}

/// 导出整表
#[utoipa::path(
    get,
    path = "/export/{table}",
    tag = "tables",
    params(
        ("table" = String, Path, description = "表名或集合名"),
        ExportParams
    ),
    responses(
        (status = 200, description = "附件下载（JSON 或 CSV）"),
        (status = 400, description = "不支持的导出格式", body = common::response::ErrorBody)
    )
)]
pub async fn export_table(
    Extension(connection): Extension<ActiveConnection>,
    Path(table): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let format: ExportFormat = params.format.as_deref().unwrap_or_default().parse()?;
    let service = TableService::new(connection);
    let rows = service.export(&table).await?;
    export::render(&table, format, &rows)
}

/// 执行原生查询
#[utoipa::path(
    post,
    path = "/query",
    tag = "query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询执行成功", body = QueryResult),
        (status = 400, description = "语句被拒绝或校验错误", body = common::response::ErrorBody),
        (status = 500, description = "数据库错误", body = common::response::ErrorBody)
    )
)]
pub async fn run_query(
    Extension(connection): Extension<ActiveConnection>,
    AppJson(req): AppJson<QueryRequest>,
) -> Result<Json<QueryResult>, AppError> {
    let service = TableService::new(connection);
    Ok(Json(service.raw(req).await?))
}
