use crate::models::column::Column;
use bigdecimal::BigDecimal;
use indexmap::IndexSet;
use std::str::FromStr;

/// 合并后的明细表 (列式存储)
///
/// 单元格统一保存为文本, 空值为 `None`; 数值在查询时按需解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
    cells: Vec<Vec<Option<String>>>,
    rows: usize,
}

impl Dataset {
    /// 按列构建, 所有列长度必须一致
    pub fn from_columns(data: Vec<(Column, Vec<Option<String>>)>) -> Result<Self, String> {
        let rows = data.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut columns = Vec::with_capacity(data.len());
        let mut cells = Vec::with_capacity(data.len());
        for (column, values) in data {
            if values.len() != rows {
                return Err(format!(
                    "coluna {} tem {} linhas, esperado {}",
                    column.name(),
                    values.len(),
                    rows
                ));
            }
            if columns.contains(&column) {
                return Err(format!("coluna {} duplicada", column.name()));
            }
            columns.push(column);
            cells.push(values);
        }
        Ok(Self {
            columns,
            cells,
            rows,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_index(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub fn column_values(&self, column: Column) -> Option<&[Option<String>]> {
        self.column_index(column).map(|idx| self.cells[idx].as_slice())
    }

    pub fn cell(&self, col_idx: usize, row: usize) -> Option<&str> {
        self.cells
            .get(col_idx)
            .and_then(|values| values.get(row))
            .and_then(|v| v.as_deref())
    }

    pub fn value(&self, row: usize, column: Column) -> Option<&str> {
        self.column_index(column)
            .and_then(|idx| self.cell(idx, row))
    }

    /// 某列非空不同值的数量
    pub fn distinct_count(&self, column: Column) -> usize {
        let Some(values) = self.column_values(column) else {
            return 0;
        };
        values
            .iter()
            .flatten()
            .collect::<IndexSet<_>>()
            .len()
    }

    /// 按列去重 (保留首次出现的行)
    pub fn dedup_by(&self, column: Column) -> Dataset {
        let Some(idx) = self.column_index(column) else {
            return self.clone();
        };
        let mut seen: IndexSet<Option<&str>> = IndexSet::new();
        let keep: Vec<usize> = (0..self.rows)
            .filter(|&row| seen.insert(self.cell(idx, row)))
            .collect();
        self.select_rows(&keep)
    }

    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        let cells = self
            .cells
            .iter()
            .map(|values| rows.iter().map(|&r| values[r].clone()).collect())
            .collect();
        Dataset {
            columns: self.columns.clone(),
            cells,
            rows: rows.len(),
        }
    }

    /// 前 n 行的 CSV 预览 (给模型看表结构用)
    pub fn preview(&self, n: usize) -> String {
        match self.write_preview(n) {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(e) => {
                tracing::warn!("preview 生成失败: {}", e);
                String::new()
            }
        }
    }

    fn write_preview(&self, n: usize) -> csv::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.column_names())?;
        for row in 0..self.rows.min(n) {
            let record: Vec<&str> = (0..self.columns.len())
                .map(|idx| self.cell(idx, row).unwrap_or(""))
                .collect();
            writer.write_record(&record)?;
        }
        let buf = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()))?;
        Ok(buf)
    }
}

/// 解析数值, 兼容巴西格式 ("1.234,56") 与普通格式 ("1234.56")
pub fn parse_decimal(text: &str) -> Option<BigDecimal> {
    let trimmed = text.trim().trim_start_matches("R$").trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    BigDecimal::from_str(&normalized).ok()
}
