use crate::config::SourceConfig;
use crate::error::{FiscalError, Result};
use crate::models::{Column, Dataset, ALL_COLUMNS, CACHED_COLUMNS};
use crate::service::source::ArchiveSource;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use config::ConfigError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

const DATETIME_FORMATS: [&str; 5] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

/// 构建参数
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub header_pattern: String,
    pub items_pattern: String,
    pub delimiter: u8,
    /// 拆分/重排日期时间列 (DD/MM/YYYY, 24 小时制)
    pub format_timestamps: bool,
    /// 丢弃 invoice_total_value (可由明细推导)
    pub drop_invoice_total: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            header_pattern: "Cabecalho".to_string(),
            items_pattern: "Itens".to_string(),
            delimiter: b',',
            format_timestamps: true,
            drop_invoice_total: true,
        }
    }
}

impl TryFrom<&SourceConfig> for BuildOptions {
    type Error = ConfigError;

    fn try_from(config: &SourceConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            header_pattern: config.header_pattern.clone(),
            items_pattern: config.items_pattern.clone(),
            delimiter: config.delimiter_byte()?,
            format_timestamps: config.format_timestamps,
            drop_invoice_total: config.drop_invoice_total,
        })
    }
}

/// 解析后的原始 CSV (表头已规范化为大写)
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn parse(bytes: &[u8], delimiter: u8, name: &str) -> Result<Self> {
        let text = decode_text(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| FiscalError::MalformedArchive(format!("{}: {}", name, e)))?
            .iter()
            .map(normalize_header)
            .collect();

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                FiscalError::MalformedArchive(format!("{}: linha {}: {}", name, idx + 2, e))
            })?;
            rows.push(
                record
                    .iter()
                    .map(|c| (!c.is_empty()).then(|| c.to_string()))
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 按源表头 (葡语) 或英文别名查找列位置
    pub fn find(&self, column: Column) -> Option<usize> {
        let header = normalize_header(column.source_header());
        let alias = normalize_header(column.source_alias());
        self.headers.iter().position(|h| *h == header || *h == alias)
    }
}

/// 合并表构建器: 下载 -> 解压 -> 左连接 -> 规范化
pub struct DatasetBuilder {
    source: Arc<dyn ArchiveSource>,
    options: BuildOptions,
}

impl DatasetBuilder {
    pub fn new(source: Arc<dyn ArchiveSource>, options: BuildOptions) -> Self {
        Self { source, options }
    }

    pub async fn build(&self) -> Result<Dataset> {
        tracing::info!("开始构建合并表, 来源: {}", self.source.location());
        let bytes = self.source.fetch().await?;
        self.build_from_archive(&bytes)
    }

    pub fn build_from_archive(&self, bytes: &[u8]) -> Result<Dataset> {
        let (header_name, header_bytes, items_name, items_bytes) = extract_pair(
            bytes,
            &self.options.header_pattern,
            &self.options.items_pattern,
        )?;
        let headers = RawTable::parse(&header_bytes, self.options.delimiter, &header_name)?;
        let items = RawTable::parse(&items_bytes, self.options.delimiter, &items_name)?;
        tracing::info!(
            "解析完成: {} ({} 行), {} ({} 行)",
            header_name,
            headers.row_count(),
            items_name,
            items.row_count()
        );
        merge(&headers, &items, &self.options)
    }
}

/// 从压缩包中取出表头文件和明细文件 (名字各自必须唯一匹配)
pub fn extract_pair(
    bytes: &[u8],
    header_pattern: &str,
    items_pattern: &str,
) -> Result<(String, Vec<u8>, String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FiscalError::MalformedArchive(format!("zip ilegível: {}", e)))?;
    let names: Vec<String> = archive.file_names().map(String::from).collect();

    let header_name = single_match(&names, header_pattern)?;
    let items_name = single_match(&names, items_pattern)?;
    let header_bytes = read_entry(&mut archive, &header_name)?;
    let items_bytes = read_entry(&mut archive, &items_name)?;
    Ok((header_name, header_bytes, items_name, items_bytes))
}

fn single_match(names: &[String], pattern: &str) -> Result<String> {
    let matches: Vec<&String> = names
        .iter()
        .filter(|n| !n.ends_with('/') && n.contains(pattern))
        .collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(FiscalError::MalformedArchive(format!(
            "nenhum arquivo contendo '{}'",
            pattern
        ))),
        many => Err(FiscalError::MalformedArchive(format!(
            "{} arquivos contendo '{}'",
            many.len(),
            pattern
        ))),
    }
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| FiscalError::MalformedArchive(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .map_err(|e| FiscalError::MalformedArchive(format!("{}: {}", name, e)))?;
    Ok(out)
}

/// Windows-1252 在 0x80..=0x9F 与 Latin-1 不同; 未定义的字节保持 Latin-1
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// UTF-8 优先, 失败时按 Windows-1252 解码 (政府导出文件常见)
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("arquivo não é UTF-8, decodificando como Windows-1252");
            bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => char::from(b),
                })
                .collect()
        }
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_uppercase()
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Item(usize),
    Header(usize),
    Missing,
}

/// 两边都有的列取明细侧
fn resolve(column: Column, headers: &RawTable, items: &RawTable) -> Source {
    if let Some(idx) = items.find(column) {
        Source::Item(idx)
    } else if let Some(idx) = headers.find(column) {
        Source::Header(idx)
    } else {
        Source::Missing
    }
}

fn cell(row: &[Option<String>], idx: usize) -> Option<String> {
    row.get(idx).cloned().flatten()
}

/// 明细左连接表头 (以明细为锚, 每条明细恰好出现一次)
pub fn merge(headers: &RawTable, items: &RawTable, options: &BuildOptions) -> Result<Dataset> {
    let header_key = headers.find(Column::AccessKey).ok_or_else(|| {
        FiscalError::MalformedArchive("arquivo de cabeçalho sem coluna CHAVE DE ACESSO".to_string())
    })?;
    let item_key = items.find(Column::AccessKey).ok_or_else(|| {
        FiscalError::MalformedArchive("arquivo de itens sem coluna CHAVE DE ACESSO".to_string())
    })?;

    // 重复的表头 key 只取第一行
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(headers.rows.len());
    let mut duplicates = 0usize;
    for (i, row) in headers.rows.iter().enumerate() {
        let Some(key) = row.get(header_key).and_then(|v| v.as_deref()) else {
            continue;
        };
        match index.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }
    if duplicates > 0 {
        tracing::warn!("{} linhas de cabeçalho com chave duplicada ignoradas", duplicates);
    }

    let matched: Vec<Option<&Vec<Option<String>>>> = items
        .rows
        .iter()
        .map(|row| {
            row.get(item_key)
                .and_then(|v| v.as_deref())
                .and_then(|key| index.get(key))
                .map(|&i| &headers.rows[i])
        })
        .collect();
    let orphans = matched.iter().filter(|m| m.is_none()).count();
    if orphans > 0 {
        tracing::debug!("{} itens sem cabeçalho correspondente", orphans);
    }

    let output: &[Column] = if options.drop_invoice_total {
        &CACHED_COLUMNS
    } else {
        &ALL_COLUMNS
    };

    let mut data = Vec::with_capacity(output.len());
    for &column in output {
        let source = resolve(column, headers, items);
        if matches!(source, Source::Missing) {
            tracing::warn!("coluna {} ausente nos dois arquivos", column.source_header());
        }
        let values: Vec<Option<String>> = items
            .rows
            .iter()
            .zip(&matched)
            .map(|(item_row, header_row)| {
                let raw = match source {
                    Source::Item(i) => cell(item_row, i),
                    Source::Header(i) => header_row.and_then(|r| cell(r, i)),
                    Source::Missing => None,
                };
                render(column, raw, options.format_timestamps)
            })
            .collect();
        data.push((column, values));
    }

    let table = Dataset::from_columns(data).map_err(FiscalError::MalformedArchive)?;
    tracing::info!(
        "合并完成: {} 行, {} 列, {} 张发票",
        table.row_count(),
        table.columns().len(),
        table.distinct_count(Column::AccessKey)
    );
    Ok(table)
}

fn parse_timestamp(text: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .map(|dt| (dt.date(), Some(dt.time())))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| (d, None))
        })
}

/// 日期时间列重排; 无法解析时保留原文
fn render(column: Column, raw: Option<String>, format_timestamps: bool) -> Option<String> {
    if !format_timestamps {
        return match column {
            Column::EmissionTime => None,
            _ => raw,
        };
    }
    match column {
        Column::EmissionDate => raw.map(|v| match parse_timestamp(&v) {
            Some((date, _)) => date.format("%d/%m/%Y").to_string(),
            None => v,
        }),
        Column::EmissionTime => raw
            .as_deref()
            .and_then(parse_timestamp)
            .and_then(|(_, time)| time)
            .map(|t| t.format("%H:%M:%S").to_string()),
        Column::LatestEventDatetime => raw.map(|v| match parse_timestamp(&v) {
            Some((date, Some(time))) => date.and_time(time).format("%d/%m/%Y %H:%M:%S").to_string(),
            Some((date, None)) => date.format("%d/%m/%Y").to_string(),
            None => v,
        }),
        _ => raw,
    }
}
