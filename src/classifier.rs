use std::collections::HashMap;
use std::future::Future;

use serde::Deserialize;

use crate::types::{ClassificationResult, Label};

pub trait Classify: Send + Sync {
    // total: every failure mode must come back as an UNKNOWN result
    fn classify(&self, url: &str) -> impl Future<Output = ClassificationResult> + Send;
}

// what the classification service answers to a POST {"url": ...}
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    prediction: Option<String>,
    #[serde(default)]
    probabilities: HashMap<String, f64>,
}

pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        Ok(HttpClassifier {
            http: reqwest::Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }

    async fn request(&self, url: &str) -> anyhow::Result<PredictionResponse> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<PredictionResponse>().await?)
    }
}

impl Classify for HttpClassifier {
    fn classify(&self, url: &str) -> impl Future<Output = ClassificationResult> + Send {
        async move {
            match self.request(url).await {
                Ok(response) => result_from_response(url, response),
                Err(e) => {
                    warn!("classification of {} failed: {:#}", url, e);
                    ClassificationResult::failed(url, format!("{:#}", e))
                }
            }
        }
    }
}

fn result_from_response(url: &str, response: PredictionResponse) -> ClassificationResult {
    // a missing prediction field is an unrecognized label, not a failure
    let label = Label::from_prediction(response.prediction.as_deref().unwrap_or(""));
    ClassificationResult::classified(url, label, response.probabilities)
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    #[test]
    fn known_prediction_maps_to_risky_result() {
        let response: PredictionResponse = serde_json::from_str(
            r#"{"prediction": "PHISHING", "probabilities": {"PHISHING": 0.91, "SAFE": 0.09}}"#,
        )
        .unwrap();
        let result = result_from_response("http://evil.example/login", response);
        assert_eq!(result.label, Label::Phishing);
        assert!(result.risky);
        assert_eq!(result.probabilities["PHISHING"], 0.91);
        assert!(result.error_detail.is_none());
    }

    #[test]
    fn unrecognized_prediction_falls_back_to_other() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"prediction": "spam"}"#).unwrap();
        let result = result_from_response("http://x.test", response);
        assert_eq!(result.label, Label::Other("SPAM".into()));
        assert!(result.risky);
    }

    #[test]
    fn missing_prediction_field_is_treated_as_suspicious() {
        let response: PredictionResponse = serde_json::from_str(r#"{}"#).unwrap();
        let result = result_from_response("http://x.test", response);
        assert_eq!(result.label, Label::Other("".into()));
        assert!(result.risky);
    }

    #[test]
    fn transport_failure_becomes_unknown_result() {
        // nothing listens on the discard port, the request fails fast
        let classifier = HttpClassifier::new("http://127.0.0.1:9/predict").unwrap();
        let result = aw!(classifier.classify("http://x.test"));
        assert_eq!(result.url, "http://x.test");
        assert_eq!(result.label, Label::Unknown);
        assert!(!result.risky);
        assert!(!result.error_detail.unwrap().is_empty());
    }
}
