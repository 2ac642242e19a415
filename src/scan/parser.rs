//! Scan report parser
//!
//! Turns the analysis service's loosely formatted reply into an
//! [`AnalysisResult`]. Each field runs from its label to the next label of
//! *any* field followed by a colon, so fields may appear in any order.
//!
//! Known limitation: a field label followed by a colon inside another
//! field's prose ends that field early. Missing labels give empty strings.
//!
//! Every trailing run of hyphens is dropped, not just the last one, so list
//! markup such as `- Scan Type: MRI -\n- Organ: ...` leaves `MRI` rather
//! than `MRI -`. A value like `a - - -` therefore cleans to `a`.

use super::types::AnalysisResult;
use once_cell::sync::Lazy;
use regex::Regex;

/// The seven report fields, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportField {
    ScanType,
    Organ,
    TumorType,
    TumorSubclass,
    DetailedDescription,
    PossibleCauses,
    ClinicalInsights,
}

impl ReportField {
    pub const ALL: [ReportField; 7] = [
        Self::ScanType,
        Self::Organ,
        Self::TumorType,
        Self::TumorSubclass,
        Self::DetailedDescription,
        Self::PossibleCauses,
        Self::ClinicalInsights,
    ];

    /// Label as it appears in the report
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScanType => "Scan Type",
            Self::Organ => "Organ",
            Self::TumorType => "Tumor Type",
            Self::TumorSubclass => "Tumor Subclass",
            Self::DetailedDescription => "Detailed Description",
            Self::PossibleCauses => "Possible Causes",
            Self::ClinicalInsights => "Clinical Insights",
        }
    }

    /// Output key: lowercase, spaces to underscores
    pub fn key(&self) -> String {
        self.label().to_lowercase().replace(' ', "_")
    }

    fn slot<'a>(&self, result: &'a mut AnalysisResult) -> &'a mut String {
        match self {
            Self::ScanType => &mut result.scan_type,
            Self::Organ => &mut result.organ,
            Self::TumorType => &mut result.tumor_type,
            Self::TumorSubclass => &mut result.tumor_subclass,
            Self::DetailedDescription => &mut result.detailed_description,
            Self::PossibleCauses => &mut result.possible_causes,
            Self::ClinicalInsights => &mut result.clinical_insights,
        }
    }
}

/// Label of one field, with optional `**` on either side.
///
/// The first pattern requires a colon after the label; the second accepts a
/// bare label and is only tried when no colon form exists.
static FIELD_ANCHORS: Lazy<Vec<(ReportField, Regex, Regex)>> = Lazy::new(|| {
    ReportField::ALL
        .iter()
        .map(|field| {
            let label = regex::escape(field.label());
            let strict = format!(r"\*{{0,2}}\s*{}\s*\*{{0,2}}\s*:\s*\*{{0,2}}\s*", label);
            let lenient = format!(r"\*{{0,2}}\s*{}\s*\*{{0,2}}\s*:?\s*\*{{0,2}}\s*", label);
            (
                *field,
                Regex::new(&strict).expect("Invalid field anchor regex"),
                Regex::new(&lenient).expect("Invalid field anchor regex"),
            )
        })
        .collect()
});

/// Start of any field label that is followed by a colon
static FIELD_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    let labels = ReportField::ALL
        .iter()
        .map(|f| regex::escape(f.label()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\*{{0,2}}\s*(?:{})\s*\*{{0,2}}\s*:", labels))
        .expect("Invalid field boundary regex")
});

static DISCLAIMER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:Important\s+Disclaimer|Disclaimer)\s*:?\s*(.*)")
        .expect("Invalid disclaimer regex")
});

static USER_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?:To answer your question|In response to your question|Regarding your question).*?:(.*)",
    )
    .expect("Invalid answer regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Parse a free-form scan report into the fixed field schema
pub fn parse_scan_report(text: &str) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    for (field, strict, lenient) in FIELD_ANCHORS.iter() {
        let raw = capture_field(text, strict).or_else(|| capture_field(text, lenient));
        if let Some(raw) = raw {
            *field.slot(&mut result) = clean_value(raw);
        }
    }

    result.disclaimer = DISCLAIMER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_value(m.as_str()));

    result.llm_response = USER_ANSWER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()));

    result
}

/// Text after the field's label up to the next label of any field
fn capture_field<'t>(text: &'t str, anchor: &Regex) -> Option<&'t str> {
    let start = anchor.find(text)?.end();
    let rest = &text[start..];
    let end = FIELD_BOUNDARY
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Strip emphasis markers, collapse whitespace and drop all trailing hyphen runs
fn clean_value(raw: &str) -> String {
    let without_markup = raw.replace('*', "");
    collapse_whitespace(&without_markup)
        .trim_end_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

fn collapse_whitespace(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}
