use std::path::PathBuf;

use rust_xlsxwriter::*;
use tokio::fs;

use crate::dto::analytics_dto::{Discrimination, QuizAnalytics};
use crate::error::{Error, Result};
use crate::models::attempt::QuizAttempt;
use crate::models::quiz::Quiz;
use crate::services::analytics_service::option_letter;
use crate::services::extract_service::ExtractService;
use crate::utils::time::{format_compact, format_timestamp};

const ATTEMPT_COLUMNS: [(&str, f64); 8] = [
    ("Student Name", 26.0),
    ("Email", 30.0),
    ("Score", 10.0),
    ("Total Questions", 16.0),
    ("Percentage", 13.0),
    ("Time Taken (seconds)", 20.0),
    ("Time Taken (formatted)", 22.0),
    ("Submitted At", 21.0),
];

const QUESTION_SECTION: &str = "Question Analysis";
const OPTION_SECTION: &str = "Option Breakdown";

const QUESTION_HEADER: [&str; 10] = [
    "Question #",
    "Question Text",
    "Attempts",
    "Correct %",
    "Incorrect %",
    "Skip Rate %",
    "Avg Time (s)",
    "Discrimination Index",
    "Most Chosen Option",
    "Flags",
];

const OPTION_HEADER: [&str; 6] = [
    "Question #",
    "Option",
    "Option Text",
    "Correct",
    "Selected Count",
    "Selection %",
];

/// Per-question values read back from an analytics CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestionRow {
    pub question_number: usize,
    pub question_text: String,
    pub attempts: usize,
    pub correct_percentage: f64,
    pub incorrect_percentage: f64,
    pub skip_rate: f64,
    pub average_time_spent: f64,
    pub discrimination_index: Discrimination,
    pub most_chosen_option: String,
}

/// Title with spaces turned into underscores and path-hostile characters dropped.
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => Some(c),
            _ => None,
        })
        .collect();
    if stem.is_empty() {
        "quiz".to_string()
    } else {
        stem
    }
}

pub fn attempts_csv_filename(title: &str) -> String {
    format!("{}_attempts.csv", file_stem(title))
}

pub fn attempts_xlsx_filename(title: &str) -> String {
    format!("{}_attempts.xlsx", file_stem(title))
}

pub fn analytics_csv_filename(title: &str) -> String {
    format!("{}_analytics.csv", file_stem(title))
}

pub fn quiz_pdf_filename(title: &str) -> String {
    format!("{}_with_answers.pdf", file_stem(title))
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct ExportService;

impl ExportService {
    pub fn attempts_csv(attempts: &[QuizAttempt]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(ATTEMPT_COLUMNS.iter().map(|(name, _)| *name))?;
        for a in attempts {
            writer.write_record([
                a.student_name.clone(),
                a.student_email.clone(),
                a.score.to_string(),
                a.total_questions.to_string(),
                format!("{:.1}%", a.percentage),
                a.time_taken.to_string(),
                format_compact(a.time_taken as i64),
                format_timestamp(a.submitted_at),
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("Failed to finish CSV: {}", e)))
    }

    /// Styled workbook with the same columns as the CSV export.
    pub fn attempts_xlsx(quiz_title: &str, attempts: &[QuizAttempt]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Attempts")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);
        let pass_color = Color::RGB(0x10B981);
        let mid_color = Color::RGB(0xF59E0B);
        let fail_color = Color::RGB(0xEF4444);

        for (i, (_, width)) in ATTEMPT_COLUMNS.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }
        let last_col = (ATTEMPT_COLUMNS.len() - 1) as u16;

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        worksheet.merge_range(0, 0, 0, last_col, quiz_title, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(1, 22)?;
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
        let subtitle = format!("Exported: {}  •  Attempts: {}", now, attempts.len());
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 28)?;
        for (i, (name, _)) in ATTEMPT_COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        for (idx, a) in attempts.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);

            worksheet.set_row_height(row, 20)?;
            worksheet.write_string_with_format(row, 0, &a.student_name, &base_fmt.clone().set_bold())?;
            worksheet.write_string_with_format(row, 1, &a.student_email, &base_fmt)?;
            worksheet.write_number_with_format(row, 2, a.score as f64, &center_fmt)?;
            worksheet.write_number_with_format(row, 3, a.total_questions as f64, &center_fmt)?;

            let pct_color = if a.percentage >= 70.0 {
                pass_color
            } else if a.percentage >= 40.0 {
                mid_color
            } else {
                fail_color
            };
            let pct_fmt = center_fmt.clone().set_bold().set_font_color(pct_color);
            worksheet.write_string_with_format(row, 4, &format!("{:.1}%", a.percentage), &pct_fmt)?;

            worksheet.write_number_with_format(row, 5, a.time_taken as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 6, &format_compact(a.time_taken as i64), &center_fmt)?;
            worksheet.write_string_with_format(row, 7, &format_timestamp(a.submitted_at), &center_fmt)?;
        }

        let total_row = data_start_row + attempts.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let average = if attempts.is_empty() {
            0.0
        } else {
            attempts.iter().map(|a| a.percentage).sum::<f64>() / attempts.len() as f64
        };
        worksheet.set_row_height(total_row, 24)?;
        worksheet.merge_range(
            total_row,
            0,
            total_row,
            last_col,
            &format!("Total attempts: {}  |  Average: {:.1}%", attempts.len(), average),
            &summary_fmt,
        )?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(
            header_row,
            0,
            (data_start_row + attempts.len() as u32).saturating_sub(1).max(header_row),
            last_col,
        )?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }

    /// Summary block, per-question rows, then the option breakdown; sections separated by blank rows.
    pub fn analytics_csv(report: &QuizAnalytics) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer.write_record(["Quiz Analytics Report"])?;
        writer.write_record(["Quiz", report.quiz_title.as_str()])?;
        writer.write_record(["Total Attempts", &report.total_attempts.to_string()])?;
        writer.write_record(["Total Students", &report.total_students.to_string()])?;
        writer.write_record(["Total Questions", &report.total_questions.to_string()])?;
        writer.write_record(["Average Score", &format!("{:.2}", report.average_score)])?;
        writer.write_record(["Average Percentage", &format!("{:.2}", report.average_percentage)])?;
        writer.write_record([
            "Average Time per Question (s)",
            &format!("{:.1}", report.average_time_per_question),
        ])?;
        for (bucket, count) in report.score_distribution.buckets() {
            writer.write_record([format!("Score {}", bucket), count.to_string()])?;
        }
        if let Some(message) = &report.message {
            writer.write_record(["Note", message.as_str()])?;
        }

        writer.write_record([""])?;
        writer.write_record([QUESTION_SECTION])?;
        writer.write_record(QUESTION_HEADER)?;
        for q in &report.questions {
            let flags = q
                .flags
                .iter()
                .map(|f| f.label())
                .collect::<Vec<_>>()
                .join("; ");
            writer.write_record([
                q.question_number.to_string(),
                q.question_text.clone(),
                q.attempts.to_string(),
                format!("{:.1}", q.correct_percentage),
                format!("{:.1}", q.incorrect_percentage),
                format!("{:.1}", q.skip_rate),
                format!("{:.1}", q.average_time_spent),
                q.discrimination_index.to_string(),
                q.most_chosen_option.clone(),
                flags,
            ])?;
        }

        writer.write_record([""])?;
        writer.write_record([OPTION_SECTION])?;
        writer.write_record(OPTION_HEADER)?;
        for q in &report.questions {
            for o in &q.options {
                writer.write_record([
                    q.question_number.to_string(),
                    o.option_letter.clone(),
                    o.option_text.clone(),
                    if o.is_correct { "Yes" } else { "No" }.to_string(),
                    o.selected_count.to_string(),
                    format!("{:.1}", o.selection_percentage),
                ])?;
            }
        }

        writer
            .into_inner()
            .map_err(|e| Error::Internal(format!("Failed to finish CSV: {}", e)))
    }

    /// Reads the per-question block of an analytics CSV.
    pub fn parse_question_rows(data: &[u8]) -> Result<Vec<ParsedQuestionRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        let mut in_section = false;
        let mut header_seen = false;
        for record in reader.records() {
            let record = record?;
            let first = record.get(0).unwrap_or_default();
            if !in_section {
                in_section = first == QUESTION_SECTION;
                continue;
            }
            if !header_seen {
                header_seen = true;
                continue;
            }
            if first.is_empty() || first == OPTION_SECTION {
                break;
            }

            let field = |i: usize| record.get(i).unwrap_or_default();
            let number = |i: usize| -> Result<f64> {
                field(i).trim().parse::<f64>().map_err(|_| {
                    Error::BadRequest(format!("Invalid number in column {}: {:?}", i + 1, field(i)))
                })
            };
            let count = |i: usize| -> Result<usize> {
                field(i).trim().parse::<usize>().map_err(|_| {
                    Error::BadRequest(format!("Invalid count in column {}: {:?}", i + 1, field(i)))
                })
            };

            rows.push(ParsedQuestionRow {
                question_number: count(0)?,
                question_text: field(1).to_string(),
                attempts: count(2)?,
                correct_percentage: number(3)?,
                incorrect_percentage: number(4)?,
                skip_rate: number(5)?,
                average_time_spent: number(6)?,
                discrimination_index: field(7).parse().map_err(|_| {
                    Error::BadRequest(format!("Invalid discrimination index: {:?}", field(7)))
                })?,
                most_chosen_option: field(8).to_string(),
            });
        }

        if !in_section {
            return Err(Error::BadRequest("No question analysis section found".into()));
        }
        Ok(rows)
    }

    /// Printable answer key: correct options in bold green with a check mark.
    pub fn quiz_html(quiz: &Quiz) -> String {
        let mut html = String::new();
        html.push_str(&format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{title}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 32px; color: #1e293b; }}
h1 {{ margin-bottom: 4px; }}
.meta {{ color: #64748b; margin-bottom: 24px; }}
.question {{ margin-bottom: 20px; page-break-inside: avoid; }}
.option {{ margin-left: 20px; }}
.correct {{ color: #059669; font-weight: bold; }}
.explanation {{ margin-left: 20px; font-style: italic; color: #475569; }}
</style></head><body>
<h1>{title}</h1>
<div class="meta">Created: {created}<br>Questions: {count}</div>
"#,
            title = escape_html(&quiz.title),
            created = quiz.created_at.format("%Y-%m-%d"),
            count = quiz.question_count(),
        ));

        for (i, q) in quiz.questions.0.iter().enumerate() {
            html.push_str(&format!(
                "<div class=\"question\"><p><strong>{}. {}</strong></p>\n",
                i + 1,
                escape_html(&q.question)
            ));
            for (j, o) in q.options.iter().enumerate() {
                if o.is_correct {
                    html.push_str(&format!(
                        "<div class=\"option correct\">{}. {} ✓</div>\n",
                        option_letter(j),
                        escape_html(&o.text)
                    ));
                } else {
                    html.push_str(&format!(
                        "<div class=\"option\">{}. {}</div>\n",
                        option_letter(j),
                        escape_html(&o.text)
                    ));
                }
            }
            if let Some(explanation) = q.explanation.as_deref().filter(|e| !e.trim().is_empty()) {
                html.push_str(&format!(
                    "<p class=\"explanation\">Explanation: {}</p>\n",
                    escape_html(explanation)
                ));
            }
            html.push_str("</div>\n");
        }
        html.push_str("</body></html>\n");
        html
    }

    pub async fn quiz_pdf(quiz: &Quiz) -> Result<Vec<u8>> {
        let work_dir = PathBuf::from(format!("/tmp/quizzify_export_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&work_dir).await?;

        let result = async {
            let html_path = work_dir.join("quiz.html");
            fs::write(&html_path, Self::quiz_html(quiz)).await?;
            let pdf = ExtractService::convert_to_pdf(&html_path, &work_dir).await?;
            Ok::<_, Error>(fs::read(pdf).await?)
        }
        .await;

        let _ = fs::remove_dir_all(&work_dir).await;
        result.map_err(|e| {
            tracing::error!(error = ?e, quiz_id = %quiz.id, "quiz PDF export failed");
            Error::Internal("Failed to generate PDF".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{McqOption, Question};
    use crate::services::analytics_service::build_report;
    use crate::services::analytics_service::tests::{question, AttemptBuilder};
    use chrono::Utc;
    use sqlx::types::Json;

    fn sample_quiz() -> Quiz {
        Quiz {
            id: uuid::Uuid::new_v4(),
            title: "Cell <Biology>".into(),
            questions: Json(vec![Question {
                question: "Powerhouse of the cell?".into(),
                options: vec![
                    McqOption { text: "Nucleus".into(), is_correct: false },
                    McqOption { text: "Mitochondria".into(), is_correct: true },
                ],
                explanation: Some("Mitochondria produce ATP.".into()),
            }]),
            created_by: uuid::Uuid::new_v4(),
            source: "manual".into(),
            source_file: None,
            difficulty: None,
            share_settings: None,
            timer_settings: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filenames_replace_spaces() {
        assert_eq!(attempts_csv_filename("World History 101"), "World_History_101_attempts.csv");
        assert_eq!(quiz_pdf_filename("Cells / Tissues"), "Cells__Tissues_with_answers.pdf");
        assert_eq!(file_stem("   "), "quiz");
    }

    #[test]
    fn attempts_csv_columns_and_formatting() {
        let mut attempt = AttemptBuilder::new(7).email("ana@example.com").build();
        attempt.time_taken = 125;
        let bytes = ExportService::attempts_csv(&[attempt]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Student Name,Email,Score,Total Questions,Percentage,Time Taken (seconds),Time Taken (formatted),Submitted At"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("ana@example.com,7,"));
        assert!(row.contains(",125,2m 5s,"));
    }

    #[test]
    fn attempts_workbook_is_a_zip() {
        let attempt = AttemptBuilder::new(3).build();
        let bytes = ExportService::attempts_xlsx("Quiz", &[attempt]).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(ExportService::attempts_xlsx("Empty", &[]).is_ok());
    }

    #[test]
    fn analytics_csv_question_rows_round_trip() {
        let questions = vec![
            question("Which gas do plants absorb?", 4, 1),
            question("Which, if any, is a noble gas?", 4, 2),
        ];
        let attempts: Vec<_> = (0..24)
            .map(|i| {
                let mut b = AttemptBuilder::new(24 - i as i32);
                b = if i < 9 { b.correct(0, &[1]) } else if i < 20 { b.incorrect(0, &[3]) } else { b.skipped(0) };
                b = if i % 3 == 0 { b.correct(1, &[2]) } else { b.incorrect(1, &[0]) };
                b.time(0, 30.0).time(1, 30.0).build()
            })
            .collect();
        let report = build_report("Gases", &questions, &attempts);
        assert!(!report.insufficient_data);

        let bytes = ExportService::analytics_csv(&report).unwrap();
        let parsed = ExportService::parse_question_rows(&bytes).unwrap();
        assert_eq!(parsed.len(), report.questions.len());
        for (row, q) in parsed.iter().zip(&report.questions) {
            assert_eq!(row.question_number, q.question_number);
            assert_eq!(row.question_text, q.question_text);
            assert_eq!(row.correct_percentage, q.correct_percentage);
            assert_eq!(row.skip_rate, q.skip_rate);
            assert_eq!(row.discrimination_index, q.discrimination_index);
            assert_eq!(row.most_chosen_option, q.most_chosen_option);
        }
    }

    #[test]
    fn analytics_csv_for_small_sample_parses_to_no_rows() {
        let questions = vec![question("Only one?", 4, 0)];
        let attempts = vec![AttemptBuilder::new(1).correct(0, &[0]).build()];
        let report = build_report("Tiny", &questions, &attempts);
        let bytes = ExportService::analytics_csv(&report).unwrap();
        assert!(ExportService::parse_question_rows(&bytes).unwrap().is_empty());
        assert!(ExportService::parse_question_rows(b"a,b\n1,2\n").is_err());
    }

    #[test]
    fn quiz_html_marks_correct_option_and_escapes() {
        let html = ExportService::quiz_html(&sample_quiz());
        assert!(html.contains("<h1>Cell &lt;Biology&gt;</h1>"));
        assert!(html.contains("<div class=\"option correct\">B. Mitochondria ✓</div>"));
        assert!(html.contains("<div class=\"option\">A. Nucleus</div>"));
        assert!(html.contains("Explanation: Mitochondria produce ATP."));
        assert!(html.contains("Questions: 1"));
    }
}
