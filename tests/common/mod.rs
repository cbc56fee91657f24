#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chat_fiscal::models::Dataset;
use chat_fiscal::service::{ArchiveSource, TabularAgent};
use chat_fiscal::Result;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;

pub const HEADERS: &str = "\
CHAVE DE ACESSO,RAZÃO SOCIAL EMITENTE,DATA EMISSÃO
AA,X,2024-01-15 10:30:00
BB,Y,2024-02-01 08:00:00
";

pub const ITEMS: &str = "\
CHAVE DE ACESSO,DESCRIÇÃO DO PRODUTO/SERVIÇO,QUANTIDADE
AA,cement,10
AA,sand,5
BB,cement,3
";

pub fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn sample_archive() -> Vec<u8> {
    zip_of(&[("2024_NFe_Cabecalho.csv", HEADERS), ("2024_NFe_Itens.csv", ITEMS)])
}

/// 记录下载次数的内存数据源
pub struct CountingSource {
    bytes: Bytes,
    pub fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSource for CountingSource {
    async fn fetch(&self) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }

    fn location(&self) -> &str {
        "memory"
    }
}

/// 固定回答的 Agent, 记录收到的系统指令和表行数
pub struct StubAgent {
    pub answer: String,
    pub seen: Mutex<Vec<(String, usize)>>,
}

impl StubAgent {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TabularAgent for StubAgent {
    async fn run(&self, system: &str, table: &Dataset, _question: &str) -> Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((system.to_string(), table.row_count()));
        Ok(self.answer.clone())
    }
}
