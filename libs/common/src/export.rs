//! CSV export of completed items

use tracing::info;

use crate::error::ExportError;
use crate::models::{MediaItemView, MediaStatus};

/// Download name of the export
pub const EXPORT_FILENAME: &str = "matanest_export.csv";

const HEADER: [&str; 5] = ["Filename", "Title", "Keywords", "Category", "Releases"];

/// A rendered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: &'static str,
    pub rows: usize,
    pub content: String,
}

/// Wrap a field in double quotes, doubling embedded quotes
pub fn escape_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render every completed item as one CSV row
///
/// Category and Releases are always empty. Rows are separated by `\n`.
pub fn render_csv(items: &[MediaItemView]) -> Result<CsvExport, ExportError> {
    let mut lines = vec![HEADER.join(",")];

    for item in items {
        if item.status != MediaStatus::Completed {
            continue;
        }
        let Some(metadata) = &item.metadata else {
            continue;
        };

        let row = [
            escape_field(&item.filename),
            escape_field(&metadata.title),
            escape_field(&metadata.keywords.join(", ")),
            String::new(),
            String::new(),
        ];
        lines.push(row.join(","));
    }

    let rows = lines.len() - 1;
    if rows == 0 {
        return Err(ExportError::NothingToExport);
    }

    info!("Exported {} rows to CSV", rows);
    Ok(CsvExport {
        filename: EXPORT_FILENAME,
        rows,
        content: lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaId, Metadata};
    use chrono::Utc;

    fn view(filename: &str, status: MediaStatus, metadata: Option<Metadata>) -> MediaItemView {
        MediaItemView {
            id: MediaId::from(filename),
            filename: filename.to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 1,
            preview_url: "/previews/x".to_string(),
            status,
            metadata,
            error: None,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    fn metadata(title: &str, keywords: &[&str]) -> Metadata {
        Metadata {
            title: title.to_string(),
            description: "unused".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_escape_field_doubles_quotes() {
        assert_eq!(escape_field(r#"He said "hi""#), r#""He said ""hi""""#);
        assert_eq!(escape_field(""), r#""""#);
    }

    #[test]
    fn test_render_csv_rows() {
        let items = vec![
            view("a.jpg", MediaStatus::Completed, Some(metadata("Cat, sleeping", &["cat", "nap"]))),
            view("b.jpg", MediaStatus::Pending, None),
            view("c.jpg", MediaStatus::Error, None),
            view("d.png", MediaStatus::Completed, Some(metadata(r#"He said "hi""#, &[]))),
        ];

        let export = render_csv(&items).unwrap();
        assert_eq!(export.filename, "matanest_export.csv");
        assert_eq!(export.rows, 2);
        assert_eq!(
            export.content,
            "Filename,Title,Keywords,Category,Releases\n\
             \"a.jpg\",\"Cat, sleeping\",\"cat, nap\",,\n\
             \"d.png\",\"He said \"\"hi\"\"\",\"\",,"
        );
        assert!(!export.content.ends_with('\n'));
    }

    #[test]
    fn test_nothing_to_export() {
        let items = vec![
            view("b.jpg", MediaStatus::Pending, None),
            view("c.jpg", MediaStatus::Processing, None),
        ];
        assert_eq!(render_csv(&items), Err(ExportError::NothingToExport));
        assert_eq!(render_csv(&[]), Err(ExportError::NothingToExport));
    }
}
