use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Safe,
    Phishing,
    Malware,
    Defacement,
    // classification failed or the service was unreachable
    Unknown,
    // a label the service returned that we do not know about
    Other(String),
}

impl Label {
    pub fn from_prediction(raw: &str) -> Label {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Label::Safe,
            "PHISHING" => Label::Phishing,
            "MALWARE" => Label::Malware,
            "DEFACEMENT" => Label::Defacement,
            other => Label::Other(other.to_string()),
        }
    }

    // UNKNOWN deliberately counts as non-risky: a failed lookup leaves the
    // link unmarked rather than flagging it
    pub fn is_risky(&self) -> bool {
        !matches!(self, Label::Safe | Label::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Safe => "SAFE",
            Label::Phishing => "PHISHING",
            Label::Malware => "MALWARE",
            Label::Defacement => "DEFACEMENT",
            Label::Unknown => "UNKNOWN",
            Label::Other(other) => other,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub url: String,
    #[serde(rename = "prediction")]
    pub label: Label,
    #[serde(rename = "malicious")]
    pub risky: bool,
    pub probabilities: HashMap<String, f64>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ClassificationResult {
    pub fn classified(
        url: impl Into<String>,
        label: Label,
        probabilities: HashMap<String, f64>,
    ) -> Self {
        let risky = label.is_risky();
        ClassificationResult {
            url: url.into(),
            label,
            risky,
            probabilities,
            error_detail: None,
        }
    }

    pub fn failed(url: impl Into<String>, detail: impl Into<String>) -> Self {
        ClassificationResult {
            url: url.into(),
            label: Label::Unknown,
            risky: false,
            probabilities: HashMap::new(),
            error_detail: Some(detail.into()),
        }
    }
}

// one generation of classification results, replaced wholesale on every scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResultSet {
    pub generated_at: DateTime<Utc>,
    results: Vec<ClassificationResult>,
}

impl BatchResultSet {
    pub fn empty() -> Self {
        Self::from_results(vec![])
    }

    pub fn from_results(results: Vec<ClassificationResult>) -> Self {
        BatchResultSet {
            generated_at: Utc::now(),
            results,
        }
    }

    pub fn get(&self, url: &str) -> Option<&ClassificationResult> {
        self.results.iter().find(|r| r.url == url)
    }

    pub fn results(&self) -> &[ClassificationResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn risky(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|r| r.risky)
    }

    pub fn risky_count(&self) -> usize {
        self.risky().count()
    }
}

impl Default for BatchResultSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prediction_labels_map_case_insensitively() {
        assert_eq!(Label::from_prediction("safe"), Label::Safe);
        assert_eq!(Label::from_prediction("Phishing"), Label::Phishing);
        assert_eq!(Label::from_prediction("MALWARE"), Label::Malware);
        assert_eq!(Label::from_prediction(" defacement "), Label::Defacement);
        assert_eq!(
            Label::from_prediction("cryptojacking"),
            Label::Other("CRYPTOJACKING".into())
        );
    }

    #[test]
    fn unrecognized_labels_count_as_risky() {
        assert!(Label::Other("CRYPTOJACKING".into()).is_risky());
        assert!(Label::Phishing.is_risky());
        assert!(!Label::Safe.is_risky());
    }

    // policy carried over from the original: a failed classification is not
    // treated as malicious, so the link stays unmarked
    #[test]
    fn unknown_label_stays_non_risky() {
        assert!(!Label::Unknown.is_risky());
        let result = ClassificationResult::failed("http://x.test", "connection refused");
        assert_eq!(result.label, Label::Unknown);
        assert!(!result.risky);
        assert!(result.error_detail.is_some());
    }

    #[test]
    fn results_serialize_with_wire_field_names() {
        let result = ClassificationResult::classified(
            "http://evil.example/login",
            Label::Phishing,
            HashMap::from([("PHISHING".to_string(), 0.91)]),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["prediction"], "PHISHING");
        assert_eq!(value["malicious"], true);
        assert_eq!(value["url"], "http://evil.example/login");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn batch_lookup_is_by_exact_url() {
        let set = BatchResultSet::from_results(vec![
            ClassificationResult::classified("http://a.test", Label::Safe, HashMap::new()),
            ClassificationResult::classified("http://b.test", Label::Malware, HashMap::new()),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("http://b.test").unwrap().label, Label::Malware);
        assert!(set.get("http://b.test/").is_none());
        assert_eq!(set.risky_count(), 1);
    }
}
