use thiserror::Error;

/// 对外错误类型
///
/// 所有错误在请求边界统一转成 500 + 固定模板 (BadRequest 除外),
/// 调用方无法仅凭响应区分错误种类。
#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("Parâmetro 'pergunta' não encontrado no corpo da requisição")]
    BadRequest,

    #[error("não foi possível baixar o arquivo de origem: {0}")]
    SourceUnavailable(String),

    #[error("arquivo de origem inválido: {0}")]
    MalformedArchive(String),

    #[error("falha ao ler a base em cache: {0}")]
    CacheReadError(String),

    #[error("falha ao gravar a base em cache: {0}")]
    CacheWriteError(String),

    #[error("falha na chamada ao modelo: {0}")]
    UpstreamAgentError(String),
}

pub type Result<T> = std::result::Result<T, FiscalError>;
