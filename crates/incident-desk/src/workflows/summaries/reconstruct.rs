//! Itemisation of loosely structured narrative text.
//!
//! The splitter is a best-effort heuristic: numbered and bulleted lines
//! always open an item, and un-marked prose is split where a sentence ends
//! with a period and the next line starts with an uppercase letter.

use std::sync::OnceLock;

use regex::Regex;

/// Which header the splitter strips from the start of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemHeader {
    /// General report sections: `RESUMEN`, `RECOMENDACIONES`.
    Report,
    /// Incident-level advice: `RECOMENDACIONES`, `RECOMENDACIÓN`, `SUGERENCIAS`,
    /// `ACCIONES SUGERIDAS`.
    Incident,
}

/// What may follow a header word: a colon, the end of the line, or a space and
/// an uppercase letter, which is captured as `next` and put back.
const HEADER_END: &str = r"(?:[ \t]*:[ \t]*|[ \t]*\r?\n|[ \t]*\z|[ \t]+(?P<next>\p{Lu}))";

impl ItemHeader {
    fn pattern(self) -> &'static Regex {
        static REPORT: OnceLock<Regex> = OnceLock::new();
        static INCIDENT: OnceLock<Regex> = OnceLock::new();
        match self {
            Self::Report => REPORT.get_or_init(|| {
                Regex::new(&format!(r"\A\s*(?i:RESUMEN|RECOMENDACIONES){HEADER_END}"))
                    .expect("report header pattern compiles")
            }),
            Self::Incident => INCIDENT.get_or_init(|| {
                Regex::new(&format!(
                    r"\A\s*(?i:RECOMENDACIONES|RECOMENDACI[OÓ]N|SUGERENCIAS|ACCIONES SUGERIDAS){HEADER_END}"
                ))
                .expect("incident header pattern compiles")
            }),
        }
    }
}

fn list_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\d+[.)\-]|[-•*])\s*").expect("list marker pattern compiles")
    })
}

/// Drop emphasis markers and heading hashes from one line.
fn strip_markdown(line: &str) -> String {
    let line = line.trim().trim_start_matches('#').trim_start();
    line.replace("**", "").replace("__", "").trim().to_string()
}

fn starts_uppercase(line: &str) -> bool {
    line.chars()
        .find(|c| !matches!(c, '¿' | '¡' | '"' | '«' | '('))
        .is_some_and(char::is_uppercase)
}

fn capitalize(item: &str) -> String {
    let mut chars = item.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn flush(open: &mut Option<String>, items: &mut Vec<String>) {
    if let Some(item) = open.take() {
        let item = item.trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }
    }
}

/// Split `raw` into discrete items. Never discards content: text that yields
/// no items comes back as a single item.
pub fn split_into_items(raw: &str, header: ItemHeader) -> Vec<String> {
    let cleaned: String = raw
        .trim()
        .lines()
        .map(strip_markdown)
        .collect::<Vec<_>>()
        .join("\n");
    if cleaned.trim().is_empty() {
        return Vec::new();
    }

    let body = header.pattern().replace(&cleaned, "${next}");
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut items = Vec::new();
    let mut open: Option<String> = None;

    for line in &lines {
        if let Some(marker) = list_marker().find(line) {
            flush(&mut open, &mut items);
            open = Some(line[marker.end()..].trim().to_string());
            continue;
        }

        match open.as_mut() {
            Some(current) if current.ends_with('.') && starts_uppercase(line) => {
                flush(&mut open, &mut items);
                open = Some(line.to_string());
            }
            Some(current) => {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(line);
            }
            None => open = Some(line.to_string()),
        }
    }
    flush(&mut open, &mut items);

    if items.is_empty() {
        let whole = lines.join(" ");
        if !whole.is_empty() {
            items.push(whole);
        }
    }

    items.iter().map(|item| capitalize(item)).collect()
}
