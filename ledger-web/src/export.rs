//! Tabular export to CSV, XLSX and DOCX
//!
//! Rendering is fully buffered. Every format always carries the header row,
//! even for an empty result set.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table, TableCell, TableRow};
use ledger_core::{AuditEntry, LedgerEntry, LedgerError, LedgerResult};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use std::io::Cursor;

const UTF8_BOM: &str = "\u{feff}";

/// Font sizes in half-points
const DOCX_TITLE_SIZE: usize = 32;
const DOCX_HEADER_SIZE: usize = 22;
const DOCX_BODY_SIZE: usize = 20;

/// Requested output format. Unknown values fall back to CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Excel,
    Word,
}

impl ExportFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("excel") | Some("xlsx") => ExportFormat::Excel,
            Some("word") | Some("docx") => ExportFormat::Word,
            _ => ExportFormat::Csv,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Word => "docx",
        }
    }
}

/// A titled grid of strings
#[derive(Debug, Clone)]
pub struct ExportTable {
    pub title: String,
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn ledger(entries: &[LedgerEntry]) -> Self {
        let headers = [
            "ID", "录入人员", "省份", "项目名称", "日期", "地点", "涉及人员", "性质", "具体事项",
            "后续要点", "创建时间",
        ];
        let rows = entries
            .iter()
            .map(|e| {
                vec![
                    e.id.to_string(),
                    e.recorder.clone().unwrap_or_default(),
                    e.province.clone(),
                    e.project_name.clone(),
                    e.date.format("%Y-%m-%d").to_string(),
                    e.location.clone(),
                    e.personnel.clone(),
                    e.nature.clone(),
                    e.specific_matters.clone(),
                    e.follow_up_points.clone().unwrap_or_default(),
                    e.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]
            })
            .collect();

        Self {
            title: "台账导出".to_string(),
            sheet_name: "Ledger".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn activity(logs: &[AuditEntry]) -> Self {
        let headers = ["ID", "时间", "级别", "用户", "消息", "IP地址", "详情"];
        let rows = logs
            .iter()
            .map(|log| {
                vec![
                    log.id.to_string(),
                    log.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    log.level.to_string(),
                    log.username.clone().unwrap_or_default(),
                    log.message.clone(),
                    log.ip_address.clone().unwrap_or_default(),
                    log.details.clone().unwrap_or_default(),
                ]
            })
            .collect();

        Self {
            title: "系统日志导出".to_string(),
            sheet_name: "Logs".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn render(&self, format: ExportFormat) -> LedgerResult<Vec<u8>> {
        match format {
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Excel => self.to_xlsx(),
            ExportFormat::Word => self.to_docx(),
        }
    }

    fn to_csv(&self) -> LedgerResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(UTF8_BOM.as_bytes().to_vec());
        writer
            .write_record(&self.headers)
            .map_err(|e| LedgerError::export("Failed to write CSV header", "export", e))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| LedgerError::export("Failed to write CSV row", "export", e))?;
        }
        writer.into_inner().map_err(|e| {
            LedgerError::export("Failed to flush CSV output", "export", e.into_error())
        })
    }

    fn to_xlsx(&self) -> LedgerResult<Vec<u8>> {
        let xlsx_error = |e: XlsxError| LedgerError::export("Failed to build workbook", "export", e);

        let mut workbook = Workbook::new();
        let header_format = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name).map_err(xlsx_error)?;

        for (col, header) in self.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &header_format)
                .map_err(xlsx_error)?;
        }
        for (row_index, row) in self.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                worksheet
                    .write_string(row_index as u32 + 1, col as u16, value)
                    .map_err(xlsx_error)?;
            }
        }
        worksheet.autofit();

        workbook.save_to_buffer().map_err(xlsx_error)
    }

    fn to_docx(&self) -> LedgerResult<Vec<u8>> {
        let cell = |text: &str, size: usize, bold: bool| {
            let mut run = Run::new().add_text(text).size(size);
            if bold {
                run = run.bold();
            }
            TableCell::new().add_paragraph(Paragraph::new().add_run(run))
        };

        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        rows.push(TableRow::new(
            self.headers
                .iter()
                .map(|h| cell(h, DOCX_HEADER_SIZE, true))
                .collect(),
        ));
        for row in &self.rows {
            rows.push(TableRow::new(
                row.iter().map(|v| cell(v, DOCX_BODY_SIZE, false)).collect(),
            ));
        }

        let title = Paragraph::new()
            .add_run(Run::new().add_text(&self.title).bold().size(DOCX_TITLE_SIZE))
            .align(AlignmentType::Center);

        let mut buffer = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(title)
            .add_table(Table::new(rows))
            .build()
            .pack(&mut buffer)
            .map_err(|e| LedgerError::export("Failed to build document", "export", e))?;
        Ok(buffer.into_inner())
    }
}

/// A rendered file served as an attachment
#[derive(Debug)]
pub struct ExportFile {
    pub format: ExportFormat,
    pub basename: String,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn render(table: &ExportTable, format: ExportFormat, basename: &str) -> LedgerResult<Self> {
        Ok(Self {
            format,
            basename: basename.to_string(),
            bytes: table.render(format)?,
        })
    }

    pub fn filename(&self) -> String {
        format!("{}.{}", self.basename, self.format.extension())
    }
}

impl IntoResponse for ExportFile {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename={}", self.filename());
        let mut response = self.bytes.into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.format.content_type()),
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        response
    }
}
