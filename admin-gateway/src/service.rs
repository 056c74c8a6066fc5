//! 业务服务模块
//!
//! 把 HTTP 层的请求翻译成规范化操作，交给当前连接的适配器执行。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::info;

use common::errors::{AppError, AppResult};
use common::models::row::{column_names, scalar_value};
use common::models::{
    ConnectRequest, ConnectionItem, QueryRequest, QueryResult, Row, RowSet,
};
use common::utils::SqlValidator;
use validator::Validate;

use crate::adapters::{
    Operation, OperationKind, AFFECTED_ROWS, DELETED_COUNT, INSERTED_ID, TOTAL,
};
use crate::normalizer::{FindParams, ListParams};
use crate::registry::{ActiveConnection, ConnectionRegistry};

/// 连接管理服务
pub struct ConnectionService {
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 建立新连接并替换当前连接，返回表（集合）列表
    pub async fn connect(&self, req: ConnectRequest) -> AppResult<Vec<String>> {
        let config = req.into_config()?;
        self.registry.connect(config).await
    }

    /// 当前连接信息（不含密码）
    pub async fn current(&self) -> AppResult<ConnectionItem> {
        self.registry
            .current()
            .await
            .map(|conn| ConnectionItem::from(conn.config()))
            .ok_or(AppError::NoActiveConnection)
    }

    /// 断开当前连接
    pub async fn disconnect(&self) -> AppResult<()> {
        self.registry.disconnect().await?;
        info!("Connection dropped by request");
        Ok(())
    }
}

/// 表数据服务，绑定在请求开始时固定下来的连接上
pub struct TableService {
    connection: ActiveConnection,
}

impl TableService {
    pub fn new(connection: ActiveConnection) -> Self {
        Self { connection }
    }

    async fn run(&self, table: &str, kind: OperationKind) -> AppResult<RowSet> {
        self.connection
            .adapter()
            .execute(&Operation::new(table, kind))
            .await
    }

    async fn run_scalar(&self, table: &str, kind: OperationKind, key: &str) -> AppResult<Value> {
        let rows = self.run(table, kind).await?;
        Ok(scalar_value(&rows, key).cloned().unwrap_or(Value::Null))
    }

    async fn run_count(&self, table: &str, kind: OperationKind, key: &str) -> AppResult<u64> {
        let value = self.run_scalar(table, kind, key).await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    /// 列名列表
    pub async fn columns(&self, table: &str) -> AppResult<Vec<String>> {
        let rows = self.run(table, OperationKind::Describe).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("column").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// 分页查询，返回当前页数据和过滤后的总数
    ///
    /// 列集合取自一行样本，过滤条件只能引用样本里出现过的列。
    pub async fn list(&self, table: &str, params: &ListParams) -> AppResult<(RowSet, u64)> {
        let sample = self.run(table, OperationKind::Find(FindParams::sample())).await?;
        let columns = column_names(&sample);
        let find = FindParams::from_list_params(table, params, &columns)?;
        let criteria = find.criteria.clone();

        let rows = self.run(table, OperationKind::Find(find)).await?;
        let total = self.run_count(table, OperationKind::Count(criteria), TOTAL).await?;
        Ok((rows, total))
    }

    /// 插入一行，返回生成的 ID（引擎不报告时为 null）
    pub async fn insert(&self, table: &str, row: Row) -> AppResult<Value> {
        self.run_scalar(table, OperationKind::Insert(row), INSERTED_ID)
            .await
    }

    /// 按 ID 更新一行
    pub async fn update(&self, table: &str, id: &str, changes: Row) -> AppResult<()> {
        let kind = OperationKind::Update {
            id: id.to_string(),
            changes,
        };
        let affected = self.run_count(table, kind, AFFECTED_ROWS).await?;
        if affected == 0 {
            return Err(AppError::NoRowsAffected(format!(
                "Update failed: no row with id \"{}\" in \"{}\"",
                id, table
            )));
        }
        Ok(())
    }

    /// 按 ID 批量删除，返回删除行数（0 也算成功）
    pub async fn delete(&self, table: &str, ids: Vec<String>) -> AppResult<u64> {
        self.run_count(table, OperationKind::Delete { ids }, DELETED_COUNT)
            .await
    }

    /// 导出整表
    pub async fn export(&self, table: &str) -> AppResult<RowSet> {
        self.run(table, OperationKind::Find(FindParams::all())).await
    }

    /// 执行原生查询
    pub async fn raw(&self, req: QueryRequest) -> AppResult<QueryResult> {
        req.validate()?;
        let start = Instant::now();
        let relational = self.connection.engine().is_relational();
        let modifies = relational && !SqlValidator::returns_rows(&req.query);

        let kind = OperationKind::Raw {
            statement: req.query,
            limit: req.limit,
        };
        let rows = self.run("", kind).await?;
        let elapsed = start.elapsed().as_millis() as u64;

        if modifies {
            let affected = scalar_value(&rows, AFFECTED_ROWS)
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Ok(QueryResult::affected(affected, elapsed))
        } else {
            Ok(QueryResult::rows(rows, elapsed))
        }
    }
}
