use crate::error::{FiscalError, Result};
use crate::models::Dataset;
use crate::service::agent::TabularAgent;
use crate::service::builder::DatasetBuilder;
use crate::service::prompt;
use crate::storage::DatasetCache;
use std::sync::Arc;
use std::time::Instant;

/// 问答网关: 取表 (缓存优先) -> 系统指令 -> Agent
pub struct QuestionGateway {
    builder: DatasetBuilder,
    cache: DatasetCache,
    agent: Arc<dyn TabularAgent>,
}

impl QuestionGateway {
    pub fn new(builder: DatasetBuilder, cache: DatasetCache, agent: Arc<dyn TabularAgent>) -> Self {
        Self {
            builder,
            cache,
            agent,
        }
    }

    /// 回答一个问题, Agent 的最终文本原样返回
    pub async fn answer(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(FiscalError::BadRequest);
        }

        let started = Instant::now();
        tracing::info!("收到问题 ({} 字符)", question.chars().count());

        let table = self.obtain_dataset().await?;
        let system = prompt::system_instruction(table.columns());
        let answer = self.agent.run(&system, &table, question).await?;

        tracing::info!(
            "问题处理完成, 回答 {} 字符, 总耗时: {:?}",
            answer.chars().count(),
            started.elapsed()
        );
        Ok(answer)
    }

    /// 缓存命中直接读取; 未命中则构建 -> 写入 -> 从存储重新读取
    pub async fn obtain_dataset(&self) -> Result<Dataset> {
        if self.cache.exists().await? {
            tracing::info!("cache hit: {}", self.cache.url());
            return self.cache.load().await;
        }

        tracing::info!("cache miss: {}, 开始构建", self.cache.url());
        let started = Instant::now();
        let table = self.builder.build().await?;
        tracing::info!(
            "合并表构建完成: {} 行, 耗时: {:?}",
            table.row_count(),
            started.elapsed()
        );
        self.cache.store(&table).await?;
        self.cache.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::builder::BuildOptions;
    use crate::service::source::ArchiveSource;
    use crate::storage::FsBlobStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArchiveSource for FailingSource {
        async fn fetch(&self) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FiscalError::SourceUnavailable("offline".to_string()))
        }

        fn location(&self) -> &str {
            "offline"
        }
    }

    struct EchoAgent;

    #[async_trait]
    impl TabularAgent for EchoAgent {
        async fn run(&self, _system: &str, table: &Dataset, question: &str) -> Result<String> {
            Ok(format!("{}:{}", question, table.row_count()))
        }
    }

    fn gateway(dir: &std::path::Path, source: Arc<FailingSource>) -> QuestionGateway {
        let store = Arc::new(FsBlobStore::new(dir));
        QuestionGateway::new(
            DatasetBuilder::new(source, BuildOptions::default()),
            DatasetCache::new(store, "df.parquet"),
            Arc::new(EchoAgent),
        )
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_building() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FailingSource {
            calls: AtomicUsize::new(0),
        });
        let gw = gateway(dir.path(), source.clone());

        assert!(matches!(gw.answer("   ").await, Err(FiscalError::BadRequest)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FailingSource {
            calls: AtomicUsize::new(0),
        });
        let gw = gateway(dir.path(), source.clone());

        assert!(matches!(
            gw.answer("quantas notas?").await,
            Err(FiscalError::SourceUnavailable(_))
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
