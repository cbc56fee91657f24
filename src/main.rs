use chat_fiscal::api::{self, AppState};
use chat_fiscal::service::{BuildOptions, DatasetBuilder, HttpArchiveSource, OpenAiTableAgent, QuestionGateway};
use chat_fiscal::storage::{open_blob_store, DatasetCache};
use chat_fiscal::{telemetry, AppConfig};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "chat-fiscal-server", about = "Gateway de perguntas sobre notas fiscais")]
struct Args {
    /// 启动时删除缓存的合并表, 下次请求重新构建
    #[arg(long)]
    invalidate_cache: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    telemetry::init_tracing();
    let args = Args::parse();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config.redacted());

    // 缓存
    let store = open_blob_store(&config.cache)?;
    let cache = DatasetCache::new(store, config.cache.blob_name.clone());
    if args.invalidate_cache {
        cache.invalidate().await?;
    }

    // 数据源 + 构建器 + Agent
    let source = Arc::new(HttpArchiveSource::new(config.source.archive_url.clone())?);
    let builder = DatasetBuilder::new(source, BuildOptions::try_from(&config.source)?);
    let agent = Arc::new(OpenAiTableAgent::new(config.agent.clone())?);
    let gateway = Arc::new(QuestionGateway::new(builder, cache, agent));

    let app = api::router(AppState {
        gateway,
        function_key: config.server.function_key.clone(),
    });

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST {}  - perguntas sobre notas fiscais", api::FISCAL_ENDPOINT);
    info!("  GET  /health");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
