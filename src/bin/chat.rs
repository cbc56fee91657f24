use chat_fiscal::chat::{base_preview, run_relay, ChatSession, GatewayClient, BASE_PREVIEW_ROWS};
use chat_fiscal::storage::{open_blob_store, DatasetCache};
use chat_fiscal::{telemetry, AppConfig};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, warn};

/// 终端对话客户端
#[derive(Debug, Parser)]
#[command(name = "chat-fiscal", about = "Chat sobre notas fiscais")]
struct Args {
    /// 网关地址
    #[arg(
        long,
        env = "FISCAL_FUNCTION_URL",
        default_value = "http://127.0.0.1:7071/api/fiscal_llm_endpoint"
    )]
    url: String,

    /// x-functions-key
    #[arg(long, env = "FISCAL_FUNCTION_KEY")]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();
    let args = Args::parse();

    let client = GatewayClient::new(args.url, args.key);
    info!("chat conectado a {}", client.url());

    // `/base` 读取与服务端相同的缓存位置; 打不开时只显示提示
    let cache = match AppConfig::load() {
        Ok(config) => match open_blob_store(&config.cache) {
            Ok(store) => Some(DatasetCache::new(store, config.cache.blob_name.clone())),
            Err(e) => {
                warn!("缓存存储不可用: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("配置加载失败: {}", e);
            None
        }
    };

    let mut session = ChatSession::new();
    let client = &client;
    let cache = cache.as_ref();
    run_relay(
        &mut session,
        move |question: String| async move { client.ask(&question).await },
        move || base_preview(cache, BASE_PREVIEW_ROWS),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    info!("sessão encerrada ({} mensagens)", session.len());
    Ok(())
}
