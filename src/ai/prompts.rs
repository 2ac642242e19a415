use crate::scan::parser::ReportField;

/// Instructions sent with every scan image
pub const SCAN_ANALYSIS_PROMPT: &str = r#"You are reviewing a single medical scan image. Reply with EXACTLY the following fields, each written as the field name followed by a colon:

- Scan Type: the imaging modality (MRI, CT Scan, X-ray)
- Organ: the organ shown (Brain, Lung, Heart, Breast)
- Tumor Type: the tumor type, if one is visible
- Tumor Subclass: the subclass, when it applies
- Detailed Description: size, shape and location of any finding
- Possible Causes: genetic, environmental or lifestyle factors
- Clinical Insights: other medical observations

Use these field names verbatim."#;

/// System prompt for questions asked without an image
pub const ASSISTANT_SYSTEM_PROMPT: &str = r#"You are a medical imaging assistant focused on MRI, CT and other imaging technologies.
You help users understand medical scans, tumor detection and related medical concepts.

Guidelines:
1. Give accurate, helpful information about medical imaging, tumors and scan interpretation.
2. If asked who you are, say you are a medical imaging assistant. Do not name the underlying model.
3. Decline personal questions and topics unrelated to medical imaging.
4. When discussing scan results, stress that they are computational analyses, not diagnoses.
5. Always recommend consulting a healthcare professional for medical advice."#;

/// Prompt for an image request, with the user's question appended when present
pub fn build_scan_prompt(message: Option<&str>) -> String {
    match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(question) => format!(
            "{}\n\nThe user also asked: {}\n\nGive the structured analysis first. Then answer the question, starting that part with \"To answer your question:\".",
            SCAN_ANALYSIS_PROMPT, question
        ),
        None => SCAN_ANALYSIS_PROMPT.to_string(),
    }
}

/// Prompt for a text-only request
pub fn build_chat_prompt(message: &str) -> String {
    format!("{}\n\nUser: {}", ASSISTANT_SYSTEM_PROMPT, message.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_prompt_names_every_field() {
        for field in ReportField::ALL {
            assert!(
                SCAN_ANALYSIS_PROMPT.contains(&format!("{}:", field.label())),
                "{}",
                field.label()
            );
        }
    }

    #[test]
    fn test_question_is_appended() {
        let prompt = build_scan_prompt(Some("Is this benign?"));
        assert!(prompt.starts_with(SCAN_ANALYSIS_PROMPT));
        assert!(prompt.contains("Is this benign?"));
        assert!(prompt.contains("To answer your question:"));
    }

    #[test]
    fn test_blank_question_is_ignored() {
        assert_eq!(build_scan_prompt(Some("  ")), SCAN_ANALYSIS_PROMPT);
        assert_eq!(build_scan_prompt(None), SCAN_ANALYSIS_PROMPT);
    }

    #[test]
    fn test_chat_prompt() {
        let prompt = build_chat_prompt(" What is a glioma? ");
        assert!(prompt.ends_with("User: What is a glioma?"));
    }
}
