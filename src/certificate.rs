use camino::Utf8Path;
use chrono::NaiveDate;
use genpdf::elements::{Break, Paragraph};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Document, SimplePageDecorator};
use serde::Serialize;

use crate::domain::DATE_FORMAT;
use crate::error::PortalError;

pub const PROJECT_NAME: &str = "NCCR Marine Water Quality Project";
pub const FILE_NAME: &str = "NCCR_Cert.pdf";
const NAVY: Color = Color::Rgb(0, 0, 128);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub name: String,
    pub contributions: usize,
    pub issued_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Plain,
    Recipient,
    Body,
    Footer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLine {
    pub text: String,
    pub style: LineStyle,
    pub gap_after: u8,
}

impl LineStyle {
    fn style(self) -> Style {
        match self {
            LineStyle::Title => Style::new().bold().with_font_size(24),
            LineStyle::Plain => Style::new().with_font_size(16),
            LineStyle::Recipient => Style::new().bold().with_font_size(30).with_color(NAVY),
            LineStyle::Body => Style::new().with_font_size(14),
            LineStyle::Footer => Style::new().italic().with_font_size(12),
        }
    }
}

impl Certificate {
    pub fn new(name: impl Into<String>, contributions: usize, issued_on: NaiveDate) -> Self {
        Self {
            name: name.into(),
            contributions,
            issued_on,
        }
    }

    pub fn file_name(&self) -> &'static str {
        FILE_NAME
    }

    pub fn lines(&self) -> Vec<CertificateLine> {
        let line = |text: String, style, gap_after| CertificateLine {
            text,
            style,
            gap_after,
        };
        vec![
            line("Certificate of Contribution".to_string(), LineStyle::Title, 2),
            line("Presented to".to_string(), LineStyle::Plain, 1),
            line(self.name.clone(), LineStyle::Recipient, 1),
            line(
                format!("For contributing {} valuable data points", self.contributions),
                LineStyle::Body,
                0,
            ),
            line(format!("to the {PROJECT_NAME}."), LineStyle::Body, 2),
            line(
                format!("Issued on: {}", self.issued_on.format(DATE_FORMAT)),
                LineStyle::Footer,
                0,
            ),
        ]
    }

    pub fn render_pdf(&self, font_dir: &Utf8Path, family: &str) -> Result<Vec<u8>, PortalError> {
        let fonts = genpdf::fonts::from_files(font_dir, family, None).map_err(|err| {
            PortalError::Certificate(format!("fonts {family} in {font_dir}: {err}"))
        })?;
        let mut doc = Document::new(fonts);
        doc.set_title("Certificate of Contribution");
        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(20);
        doc.set_page_decorator(decorator);

        doc.push(Break::new(2));
        for line in self.lines() {
            let text = StyledString::new(line.text, line.style.style());
            doc.push(Paragraph::new(text).aligned(Alignment::Center));
            if line.gap_after > 0 {
                doc.push(Break::new(line.gap_after));
            }
        }

        let mut out = Vec::new();
        doc.render(&mut out)
            .map_err(|err| PortalError::Certificate(err.to_string()))?;
        tracing::debug!(name = %self.name, bytes = out.len(), "certificate rendered");
        Ok(out)
    }
}

pub fn issue(
    name: &str,
    contributions: usize,
    threshold: usize,
    today: NaiveDate,
) -> Option<Certificate> {
    (contributions >= threshold).then(|| Certificate::new(name, contributions, today))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn issued_only_at_threshold() {
        assert!(issue("Meera", 4, 5, day()).is_none());
        let certificate = issue("Meera", 5, 5, day()).unwrap();
        assert_eq!(certificate.contributions, 5);
        assert_eq!(certificate.file_name(), "NCCR_Cert.pdf");
    }

    #[test]
    fn layout_carries_name_count_and_date() {
        let lines = Certificate::new("Meera", 7, day()).lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].style, LineStyle::Title);
        assert_eq!(lines[2].text, "Meera");
        assert_eq!(lines[2].style, LineStyle::Recipient);
        assert_eq!(lines[3].text, "For contributing 7 valuable data points");
        assert_eq!(lines[5].text, "Issued on: 2024-03-09");
    }

    #[test]
    fn missing_fonts_fail_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let err = Certificate::new("Meera", 7, day())
            .render_pdf(&dir, "LiberationSans")
            .unwrap_err();
        assert_matches!(err, PortalError::Certificate(_));
    }

    #[test]
    fn renders_pdf_when_fonts_are_installed() {
        let dir = Utf8Path::new("/usr/share/fonts/truetype/liberation");
        if !dir.join("LiberationSans-Regular.ttf").exists() {
            return;
        }
        let bytes = Certificate::new("Meera", 7, day())
            .render_pdf(dir, "LiberationSans")
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
