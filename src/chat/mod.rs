//! 对话中继: 读取用户输入 -> 调用网关 -> 显示回答

pub mod client;
pub mod session;

pub use client::GatewayClient;
pub use session::{ChatEntry, ChatSession, Role};

use crate::storage::DatasetCache;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const HISTORY_COMMAND: &str = "/historico";
pub const BASE_COMMAND: &str = "/base";
pub const EXIT_COMMAND: &str = "/sair";
pub const BASE_UNAVAILABLE: &str = "Não foi possível carregar a base de conhecimento.";
pub const BASE_PREVIEW_ROWS: usize = 10;

/// 知识库预览 (`/base`): 读取缓存的合并表, 失败时返回固定提示
pub async fn base_preview(cache: Option<&DatasetCache>, rows: usize) -> String {
    let Some(cache) = cache else {
        return BASE_UNAVAILABLE.to_string();
    };
    match cache.load().await {
        Ok(table) => format!(
            "Base de Notas Fiscais ({} linhas, {} colunas):\n{}",
            table.row_count(),
            table.columns().len(),
            table.preview(rows)
        ),
        Err(e) => {
            tracing::warn!("无法加载知识库 {}: {}", cache.url(), e);
            BASE_UNAVAILABLE.to_string()
        }
    }
}

/// 中继循环, 直到输入结束或 `/sair`
///
/// `ask` 负责把问题送到网关并返回要显示的文本; `base` 生成 `/base` 的输出。
pub async fn run_relay<R, W, F, Fut, B, BFut>(
    session: &mut ChatSession,
    ask: F,
    base: B,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(String) -> Fut,
    Fut: Future<Output = String>,
    B: Fn() -> BFut,
    BFut: Future<Output = String>,
{
    let mut lines = input.lines();
    output
        .write_all(
            format!(
                "Pergunte sobre as notas fiscais ({} mostra a base, {} para sair).\n> ",
                BASE_COMMAND, EXIT_COMMAND
            )
            .as_bytes(),
        )
        .await?;
    output.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            EXIT_COMMAND => break,
            BASE_COMMAND => {
                let preview = base().await;
                output.write_all(preview.as_bytes()).await?;
                if !preview.ends_with('\n') {
                    output.write_all(b"\n").await?;
                }
            }
            HISTORY_COMMAND => {
                for entry in session.entries() {
                    output.write_all(render(entry).as_bytes()).await?;
                }
            }
            question => {
                let reply = session.exchange(question, &ask).await;
                output.write_all(render(reply).as_bytes()).await?;
            }
        }
        output.write_all(b"> ").await?;
        output.flush().await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await
}

fn render(entry: &ChatEntry) -> String {
    let who = match entry.role {
        Role::User => "Você",
        Role::Bot => "Bot",
    };
    format!("{}: {}\n", who, entry.content)
}
