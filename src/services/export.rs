use std::io;
use std::path::Path;

use chrono::Utc;

use crate::services::catalog;
use crate::services::gateway::ExportFormat;
use crate::services::settings::FlashcardSettings;
use crate::services::word_record::{AudioSlot, WordRecord};

const CSV_HEADER: [&str; 9] = [
    "source_word",
    "target_word",
    "definition",
    "example_sentence_1",
    "example_sentence_2",
    "audio_target_word",
    "audio_definition",
    "audio_example_sentence_1",
    "audio_example_sentence_2",
];

pub fn render_export(
    records: &[WordRecord],
    format: ExportFormat,
    settings: &FlashcardSettings,
) -> io::Result<String> {
    match format {
        ExportFormat::Html => Ok(render_html(records, settings)),
        ExportFormat::Csv => render_csv(records),
        ExportFormat::Anki => Ok(render_anki(records)),
    }
}

/// Renders and writes an export under `dir`, returning the file name.
pub async fn write_export(
    dir: &Path,
    records: &[WordRecord],
    format: ExportFormat,
    settings: &FlashcardSettings,
) -> io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;

    let file_name = format!(
        "flashcards-{}.{}",
        Utc::now().format("%Y%m%d-%H%M%S%3f"),
        format.extension()
    );
    let body = render_export(records, format, settings)?;
    tokio::fs::write(dir.join(&file_name), body).await?;

    Ok(file_name)
}

fn render_csv(records: &[WordRecord]) -> io::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for record in records {
        let mut row = vec![
            record.source_word.as_str(),
            record.target_word.as_str(),
            record.definition.as_str(),
            record.example_sentence1.as_str(),
            record.example_sentence2.as_str(),
        ];
        row.extend(AudioSlot::ALL.iter().map(|s| record.audio_urls.get(*s).unwrap_or("")));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn render_anki(records: &[WordRecord]) -> String {
    let mut out = String::from("#separator:tab\n#html:true\n");

    for record in records {
        let front = anki_field(&record.target_word);
        let back = [
            anki_field(&record.source_word),
            anki_field(&record.definition),
            anki_field(&record.example_sentence1),
            anki_field(&record.example_sentence2),
        ]
        .join("<br>");
        out.push_str(&front);
        out.push('\t');
        out.push_str(&back);
        out.push('\n');
    }

    out
}

fn anki_field(value: &str) -> String {
    html_escape(value).replace(['\t', '\n', '\r'], " ")
}

fn render_html(records: &[WordRecord], settings: &FlashcardSettings) -> String {
    let target_name = catalog::language_name(&settings.target_language)
        .unwrap_or(settings.target_language.as_str());

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>Flashcards ({})</title>\n", html_escape(target_name)));
    out.push_str("</head>\n<body>\n");

    for record in records {
        out.push_str("<section class=\"card\">\n");
        out.push_str(&format!("  <h2>{}</h2>\n", html_escape(&record.target_word)));
        out.push_str(&format!("  <p class=\"source\">{}</p>\n", html_escape(&record.source_word)));
        out.push_str(&format!(
            "  <p class=\"definition\">{}</p>\n",
            html_escape(&record.definition)
        ));
        out.push_str("  <ul>\n");
        for sentence in [&record.example_sentence1, &record.example_sentence2] {
            out.push_str(&format!("    <li>{}</li>\n", html_escape(sentence)));
        }
        out.push_str("  </ul>\n");
        for slot in AudioSlot::ALL {
            if let Some(url) = record.audio_urls.get(slot) {
                out.push_str(&format!(
                    "  <audio controls src=\"{}\" data-slot=\"{}\"></audio>\n",
                    html_escape(url),
                    slot.file_tag()
                ));
            }
        }
        out.push_str("</section>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::word_record::WordStatus;

    fn card(source: &str, target: &str) -> WordRecord {
        let mut record = WordRecord::pending(format!("{source}-1"), source);
        record.target_word = target.to_string();
        record.definition = format!("to {source}");
        record.example_sentence1 = "One, two".to_string();
        record.example_sentence2 = "Say \"hi\"".to_string();
        for slot in AudioSlot::ALL {
            record.audio_urls.set(slot, format!("/a/{}.mp3", slot.file_tag()));
        }
        record.status = WordStatus::Completed;
        record
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let csv = render_csv(&[card("run", "correr")]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("run,correr,to run,\"One, two\",\"Say \"\"hi\"\"\","));
        assert!(row.ends_with("/a/example2.mp3"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_keeps_embedded_newlines_in_one_record() {
        let mut record = card("run", "correr");
        record.definition = "to move\nquickly".to_string();
        let csv = render_csv(&[record]).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), CSV_HEADER.len());
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][2], "to move\nquickly");
        assert_eq!(&rows[0][4], "Say \"hi\"");
    }

    #[test]
    fn test_anki_is_tab_separated() {
        let out = render_anki(&[card("run", "correr"), card("jump", "saltar")]);
        let rows: Vec<&str> = out.lines().skip(2).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("correr\trun<br>to run"));
        assert!(rows[1].contains("Say &quot;hi&quot;"));
    }

    #[test]
    fn test_html_escapes_and_names_language() {
        let mut record = card("run", "<b>correr</b>");
        record.audio_urls = Default::default();
        let html = render_html(&[record], &FlashcardSettings::default());
        assert!(html.contains("<title>Flashcards (Spanish)</title>"));
        assert!(html.contains("&lt;b&gt;correr&lt;/b&gt;"));
        assert!(!html.contains("<audio"));
    }

    #[tokio::test]
    async fn test_write_export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        let name = write_export(
            &target,
            &[card("run", "correr")],
            ExportFormat::Anki,
            &FlashcardSettings::default(),
        )
        .await
        .unwrap();

        assert!(name.starts_with("flashcards-") && name.ends_with(".txt"));
        let body = std::fs::read_to_string(target.join(&name)).unwrap();
        assert!(body.starts_with("#separator:tab"));
    }
}
