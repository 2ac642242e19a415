//! Post-parse checks: is this a medical scan, and which organ model to use

use super::types::{AnalysisResult, Organ};

/// Terms that mark a parsed scan type as a medical scan
pub const DEFAULT_SCAN_TYPE_TERMS: [&str; 5] = ["mri", "ct", "x-ray", "scan", "medical"];

/// Validation and organ-routing policy applied after parsing
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Lowercase substrings accepted in `scan_type`
    pub scan_type_terms: Vec<String>,

    /// Organ used when the parsed organ is empty or unknown.
    ///
    /// Unknown organs are still classified, with this organ's model.
    pub default_organ: Organ,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            scan_type_terms: DEFAULT_SCAN_TYPE_TERMS.iter().map(|t| t.to_string()).collect(),
            default_organ: Organ::Brain,
        }
    }
}

impl ScanPolicy {
    /// Substring check of the parsed scan type against the accepted terms
    pub fn is_medical_scan(&self, analysis: &AnalysisResult) -> bool {
        let scan_type = analysis.scan_type.to_lowercase();
        self.scan_type_terms
            .iter()
            .any(|term| scan_type.contains(term.as_str()))
    }

    /// Organ to classify with
    pub fn resolve_organ(&self, analysis: &AnalysisResult) -> Organ {
        Organ::parse(&analysis.organ).unwrap_or(self.default_organ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(scan_type: &str, organ: &str) -> AnalysisResult {
        AnalysisResult {
            scan_type: scan_type.to_string(),
            organ: organ.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_recognized_scan_types() {
        let policy = ScanPolicy::default();
        for scan_type in ["MRI", "CT Scan", "Chest X-ray", "Medical image", "PET scan"] {
            assert!(policy.is_medical_scan(&analysis(scan_type, "")), "{}", scan_type);
        }
    }

    #[test]
    fn test_rejected_scan_types() {
        let policy = ScanPolicy::default();
        assert!(!policy.is_medical_scan(&analysis("Photograph", "")));
        assert!(!policy.is_medical_scan(&analysis("", "")));
    }

    #[test]
    fn test_known_organ_is_used() {
        let policy = ScanPolicy::default();
        assert_eq!(policy.resolve_organ(&analysis("MRI", " lung ")), Organ::Lung);
        assert_eq!(policy.resolve_organ(&analysis("MRI", "BREAST")), Organ::Breast);
    }

    #[test]
    fn test_unknown_or_empty_organ_falls_back_to_default() {
        let policy = ScanPolicy::default();
        assert_eq!(policy.resolve_organ(&analysis("CT", "Heart")), Organ::Brain);
        assert_eq!(policy.resolve_organ(&analysis("CT", "")), Organ::Brain);

        let policy = ScanPolicy {
            default_organ: Organ::Lung,
            ..Default::default()
        };
        assert_eq!(policy.resolve_organ(&analysis("CT", "Liver")), Organ::Lung);
    }
}
