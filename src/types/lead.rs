//! Lead payload types exchanged with the lead API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One client question/answer pair captured from a Q&A column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientQa {
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub answer: String,
}

/// Normalized lead ready to be sent to `createLead`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    pub first_name: String,
    pub last_name: String,
    /// Exactly `PHONE_DIGITS` digits
    pub phone: String,
    pub lead_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approach_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_qa: Option<Vec<ClientQa>>,
}

impl LeadInput {
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> LeadInput {
        LeadInput {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            phone: "9876543210".to_string(),
            lead_source: "meta".to_string(),
            email: None,
            remark: None,
            location: Some("Chennai".to_string()),
            approach_at: None,
            client_qa: Some(vec![ClientQa {
                question: "Budget".to_string(),
                answer: "10-25L".to_string(),
            }]),
        }
    }

    #[test]
    fn test_lead_input_serializes_camel_case_and_skips_none() {
        let json = serde_json::to_value(lead()).unwrap();
        assert_eq!(json["firstName"], "Asha");
        assert_eq!(json["leadSource"], "meta");
        assert!(json.get("email").is_none());
        assert!(json.get("approachAt").is_none());
        assert_eq!(json["clientQa"][0]["q"], "Budget");
        assert_eq!(json["clientQa"][0]["a"], "10-25L");
    }

    #[test]
    fn test_display_name_single_token() {
        let mut l = lead();
        l.last_name.clear();
        assert_eq!(l.display_name(), "Asha");
        assert_eq!(lead().display_name(), "Asha Rao");
    }
}
