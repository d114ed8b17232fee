use chrono::{DateTime, Utc};

use crate::models::{ChatResponse, ChatTurn, Citation, FileRecord, Role, UploadedFile};

/// `Latency 0.45s · Confidence 87%`
pub fn exchange_summary(response: &ChatResponse) -> String {
    format!(
        "Latency {:.2}s · Confidence {:.0}%",
        response.latency_ms / 1000.0,
        response.confidence * 100.0
    )
}

pub fn citation_chip(citation: &Citation) -> String {
    format!("{} · {:.2}", citation.source_document, citation.score)
}

pub fn answer(response: &ChatResponse) -> String {
    let mut out = format!("{}\n\n{}", response.answer, exchange_summary(response));
    if !response.citations.is_empty() {
        out.push_str(&format!(
            "\n\nReferences & supporting snippets ({})",
            response.citations.len()
        ));
        for citation in &response.citations {
            out.push_str(&format!(
                "\n  [{}]\n    {}",
                citation_chip(citation),
                citation.snippet.trim()
            ));
        }
    }
    out
}

pub fn turn(turn: &ChatTurn) -> String {
    let who = match turn.role {
        Role::User => "You",
        Role::Assistant => "Answer",
    };
    format!("{who}: {}", turn.content)
}

pub fn file_size(size_bytes: u64) -> String {
    format!("{:.1} KB", size_bytes as f64 / 1024.0)
}

pub fn file_record(record: &FileRecord) -> String {
    let mut line = format!("{}  {}", record.name, file_size(record.size_bytes));
    if let Some(at) = record.uploaded_at.as_deref() {
        match at.parse::<DateTime<Utc>>() {
            Ok(ts) => line.push_str(&format!("  {}", ts.format("%Y-%m-%d %H:%M"))),
            Err(_) => line.push_str(&format!("  {at}")),
        }
    }
    if let Some(status) = record.status.as_deref() {
        line.push_str(&format!("  [{status}]"));
    }
    line
}

pub fn upload_summary(files: &[UploadedFile]) -> String {
    let plural = if files.len() == 1 { "" } else { "s" };
    format!("Uploaded {} file{plural} to storage.", files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> ChatResponse {
        ChatResponse {
            answer: "X is...".to_string(),
            citations: vec![Citation {
                chunk_id: "c1".to_string(),
                source_document: "doc.pdf".to_string(),
                score: 0.92,
                snippet: " relevant text ".to_string(),
            }],
            latency_ms: 450.0,
            confidence: 0.87,
        }
    }

    #[test]
    fn summary_formats_latency_and_confidence() {
        assert_eq!(exchange_summary(&response()), "Latency 0.45s · Confidence 87%");
    }

    #[test]
    fn answer_lists_citations() {
        let text = answer(&response());
        assert!(text.starts_with("X is..."));
        assert!(text.contains("(1)"));
        assert!(text.contains("[doc.pdf · 0.92]"));
        assert!(text.contains("    relevant text"));
    }

    #[test]
    fn file_record_line() {
        let record = FileRecord {
            name: "a.pdf".to_string(),
            size_bytes: 2048,
            uploaded_at: Some("2024-05-01T10:30:00+00:00".to_string()),
            container: "raw-documents".to_string(),
            status: Some("pending".to_string()),
        };
        assert_eq!(file_record(&record), "a.pdf  2.0 KB  2024-05-01 10:30  [pending]");
    }

    #[test]
    fn unparseable_upload_time_is_shown_raw() {
        let record = FileRecord {
            name: "b.txt".to_string(),
            size_bytes: 0,
            uploaded_at: Some("yesterday".to_string()),
            container: "raw-documents".to_string(),
            status: None,
        };
        assert_eq!(file_record(&record), "b.txt  0.0 KB  yesterday");
    }

    #[test]
    fn upload_summary_pluralizes() {
        let file = UploadedFile {
            blob_name: "a.pdf".to_string(),
            original_name: "a.pdf".to_string(),
            size_bytes: 1,
            container: "raw-documents".to_string(),
        };
        assert_eq!(upload_summary(&[file.clone()]), "Uploaded 1 file to storage.");
        assert_eq!(upload_summary(&[file.clone(), file]), "Uploaded 2 files to storage.");
    }
}
