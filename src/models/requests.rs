use serde::{Deserialize, Serialize};
use validator::Validate;

/// Optional body of the commit endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommitRequest {
    /// Actor recorded on the attempt; defaults to the token subject
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "triggered_by", rename = "triggeredBy", default)]
    pub triggered_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_request_validation() {
        let ok = CommitRequest { triggered_by: Some("ops@example.com".into()) };
        assert!(ok.validate().is_ok());

        let empty = CommitRequest { triggered_by: Some(String::new()) };
        assert!(empty.validate().is_err());

        assert!(CommitRequest::default().validate().is_ok());
    }
}
