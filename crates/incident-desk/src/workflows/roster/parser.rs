use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::normalizer::{normalize_name, normalize_optional};

/// One roster row after normalisation, or the reason it could not be read.
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) line: u64,
    pub(crate) record: Result<RosterRecord, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RosterRecord {
    pub(crate) id: Option<String>,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) grade: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) guardian_name: Option<String>,
    pub(crate) guardian_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    id: Option<String>,
    #[serde(alias = "firstName", default)]
    first_name: String,
    #[serde(alias = "lastName", default)]
    last_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    grade: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    section: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(
        alias = "guardianName",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    guardian_name: Option<String>,
    #[serde(
        alias = "guardianPhone",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    guardian_phone: Option<String>,
}

impl From<RosterRow> for RosterRecord {
    fn from(row: RosterRow) -> Self {
        Self {
            id: normalize_optional(row.id),
            first_name: normalize_name(&row.first_name),
            last_name: normalize_name(&row.last_name),
            grade: normalize_optional(row.grade),
            section: normalize_optional(row.section),
            email: normalize_optional(row.email),
            phone: normalize_optional(row.phone),
            guardian_name: normalize_optional(row.guardian_name),
            guardian_phone: normalize_optional(row.guardian_phone),
        }
    }
}

/// Read every data row. Malformed rows are reported per line; an unreadable
/// source or header fails the whole parse.
pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ParsedRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(normalize_name)
        .collect();
    let mut rows = Vec::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |position| position.line());
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let record = record
            .deserialize::<RosterRow>(Some(&headers))
            .map(RosterRecord::from)
            .map_err(|err| format!("unreadable row: {err}"));
        rows.push(ParsedRow { line, record });
    }

    Ok(rows)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
