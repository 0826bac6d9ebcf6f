use crate::config::GradeLabel;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::PricingQuery;
use crate::scraper::parsers::parse_grade;
use csv::StringRecord;

// ── Column resolution ─────────────────────────────────────────────────────────

/// Accepted header spellings per canonical field, resolved once per batch
/// into index positions instead of re-scanning headers for every row.
const YEAR_SYNONYMS: &[&str] = &["year", "season"];
const SET_SYNONYMS: &[&str] = &["set", "product", "brand", "set name"];
const PLAYER_SYNONYMS: &[&str] = &["player", "name", "card name", "subject"];
const NUMBER_SYNONYMS: &[&str] = &["card number", "card #", "card no", "number", "no."];
const DESCRIPTION_SYNONYMS: &[&str] = &["description", "item", "title", "card"];
const GRADE_SYNONYMS: &[&str] = &["grade", "grade number"];
const GRADER_SYNONYMS: &[&str] = &["grader", "grading company", "company"];

/// Canonical-field → column-index mapping for one sheet.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    pub year: Option<usize>,
    pub set: Option<usize>,
    pub player: Option<usize>,
    pub card_number: Option<usize>,
    pub description: Option<usize>,
    pub grade: Option<usize>,
    pub grader: Option<usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &StringRecord) -> Self {
        let norm: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |syns: &[&str]| norm.iter().position(|h| syns.contains(&h.as_str()));

        Self {
            year: find(YEAR_SYNONYMS),
            set: find(SET_SYNONYMS),
            player: find(PLAYER_SYNONYMS),
            card_number: find(NUMBER_SYNONYMS),
            description: find(DESCRIPTION_SYNONYMS),
            grade: find(GRADE_SYNONYMS),
            grader: find(GRADER_SYNONYMS),
        }
    }

    /// At least one column that can identify a card.
    pub fn has_identity(&self) -> bool {
        self.year.is_some()
            || self.set.is_some()
            || self.player.is_some()
            || self.card_number.is_some()
            || self.description.is_some()
    }
}

// ── Query builder ─────────────────────────────────────────────────────────────

pub struct QueryBuilder {
    base_url: String,
    grade_label: GradeLabel,
}

impl QueryBuilder {
    pub fn new(base_url: impl Into<String>, grade_label: GradeLabel) -> Self {
        Self {
            base_url: base_url.into(),
            grade_label,
        }
    }

    /// Build a query from structured row fields: year, set, player,
    /// card number (normalised to a leading `#`), with the free-text
    /// description as fallback and the grade label appended.
    ///
    /// Returns `None` only when the row has no content at all; a row with
    /// any non-empty cell still yields a query (last-resort fallback).
    pub fn build_from_row(&self, record: &StringRecord, cols: &ColumnMap) -> Option<PricingQuery> {
        let cell = |idx: Option<usize>| -> Option<&str> {
            idx.and_then(|i| record.get(i)).map(str::trim).filter(|s| !s.is_empty())
        };

        let mut tokens: Vec<String> = Vec::new();
        if let Some(year) = cell(cols.year) {
            tokens.push(year.to_string());
        }
        if let Some(set) = cell(cols.set) {
            tokens.push(set.to_string());
        }
        if let Some(player) = cell(cols.player) {
            tokens.push(player.to_string());
        }
        if let Some(num) = cell(cols.card_number) {
            tokens.push(format!("#{}", num.trim_start_matches('#')));
        }
        if tokens.is_empty() {
            if let Some(desc) = cell(cols.description) {
                tokens.push(desc.to_string());
            }
        }
        // Last resort: any non-empty cell anywhere in the row.
        if tokens.is_empty() {
            let first = record.iter().map(str::trim).find(|s| !s.is_empty())?;
            tokens.push(first.to_string());
        }

        if let Some(label) = self.grade_token(cell(cols.grade), cell(cols.grader)) {
            tokens.push(label);
        }

        Some(self.finish(tokens.join(" ")))
    }

    /// Build a query from a free-text description plus an optional grade cell.
    pub fn build_from_text(&self, text: &str, grade: Option<&str>) -> Option<PricingQuery> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut raw = text.to_string();
        if let Some(label) = self.grade_token(grade, None) {
            raw.push(' ');
            raw.push_str(&label);
        }
        Some(self.finish(raw))
    }

    fn grade_token(&self, grade: Option<&str>, grader: Option<&str>) -> Option<String> {
        let grade = parse_grade(grade?)?;
        match self.grade_label {
            GradeLabel::Psa => Some(format!("PSA {grade}")),
            GradeLabel::Grader => match grader {
                Some(g) => Some(format!("{} {grade}", g.to_uppercase())),
                None => Some(grade),
            },
        }
    }

    fn finish(&self, raw: String) -> PricingQuery {
        // Collapse whitespace runs so the URL gets a single delimiter each.
        let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let encoded: String = url::form_urlencoded::byte_serialize(raw.as_bytes()).collect();
        let url = format!("{}?query={}", self.base_url, encoded);
        PricingQuery { raw_text: raw, url }
    }
}

// ── Cert validation ───────────────────────────────────────────────────────────

/// Validate a PSA cert identifier before any network call is attempted.
/// Trims, then rejects empty, non-digit, and implausibly short input.
pub fn validate_cert(raw: &str) -> ScrapeResult<String> {
    let cert = raw.trim();
    if cert.is_empty() {
        return Err(ScrapeError::InvalidInput("cert number is empty".into()));
    }
    if !cert.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScrapeError::InvalidInput("cert must be numeric".into()));
    }
    if cert.len() < 5 {
        return Err(ScrapeError::InvalidInput("cert looks too short".into()));
    }
    Ok(cert.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(label: GradeLabel) -> QueryBuilder {
        QueryBuilder::new("https://example.com/sales/", label)
    }

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_structured_row_query() {
        let headers = record(&["Year", "Set", "Player", "Card Number", "Grade"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["1986", "Fleer", "Isiah Thomas", "109", "10"]);

        let q = builder(GradeLabel::Psa).build_from_row(&row, &cols).unwrap();
        assert_eq!(q.raw_text, "1986 Fleer Isiah Thomas #109 PSA 10");
        assert!(q.url.contains("1986+Fleer+Isiah+Thomas+%23109+PSA+10"));
    }

    #[test]
    fn test_synonym_headers() {
        let headers = record(&["Season", "Product", "Subject"]);
        let cols = ColumnMap::resolve(&headers);
        assert_eq!(cols.year, Some(0));
        assert_eq!(cols.set, Some(1));
        assert_eq!(cols.player, Some(2));
        assert!(cols.has_identity());
    }

    #[test]
    fn test_no_identity_columns() {
        let headers = record(&["Purchase Price", "Location"]);
        let cols = ColumnMap::resolve(&headers);
        assert!(!cols.has_identity());
    }

    #[test]
    fn test_description_fallback() {
        let headers = record(&["Description", "Grade"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["2003 Topps Chrome LeBron James #111", "PSA 9"]);

        let q = builder(GradeLabel::Psa).build_from_row(&row, &cols).unwrap();
        assert_eq!(q.raw_text, "2003 Topps Chrome LeBron James #111 PSA 9");
    }

    #[test]
    fn test_last_resort_any_cell() {
        let headers = record(&["Notes", "Misc"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["", "1999 Pokemon Charizard"]);

        let q = builder(GradeLabel::Psa).build_from_row(&row, &cols).unwrap();
        assert_eq!(q.raw_text, "1999 Pokemon Charizard");
    }

    #[test]
    fn test_empty_row_is_none() {
        let headers = record(&["Year", "Set"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["", ""]);
        assert!(builder(GradeLabel::Psa).build_from_row(&row, &cols).is_none());
    }

    #[test]
    fn test_grader_label_policy() {
        let headers = record(&["Player", "Grade", "Grader"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["Ken Griffey Jr", "9", "BGS"]);

        let q = builder(GradeLabel::Grader).build_from_row(&row, &cols).unwrap();
        assert_eq!(q.raw_text, "Ken Griffey Jr BGS 9");

        // No grader column: degrade to the bare number.
        let headers = record(&["Player", "Grade"]);
        let cols = ColumnMap::resolve(&headers);
        let row = record(&["Ken Griffey Jr", "9"]);
        let q = builder(GradeLabel::Grader).build_from_row(&row, &cols).unwrap();
        assert_eq!(q.raw_text, "Ken Griffey Jr 9");
    }

    #[test]
    fn test_free_text_query() {
        let q = builder(GradeLabel::Psa)
            .build_from_text("  1986   Fleer  Jordan ", Some("PSA 10"))
            .unwrap();
        assert_eq!(q.raw_text, "1986 Fleer Jordan PSA 10");
        assert!(builder(GradeLabel::Psa).build_from_text("   ", None).is_none());
    }

    #[test]
    fn test_validate_cert() {
        assert_eq!(validate_cert("12345").unwrap(), "12345");
        assert_eq!(validate_cert(" 123456 ").unwrap(), "123456");
        assert!(matches!(validate_cert(""), Err(ScrapeError::InvalidInput(_))));
        assert!(matches!(validate_cert("12a45"), Err(ScrapeError::InvalidInput(_))));
        assert!(matches!(validate_cert("123"), Err(ScrapeError::InvalidInput(_))));
    }
}
