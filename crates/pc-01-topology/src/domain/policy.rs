//! # Queue Policies
//!
//! The access policy lets topics of this environment send to a queue; the
//! redrive policy moves a message to the dead-letter queue after too many
//! receives. Both are attached as JSON queue attributes.

use serde::Serialize;

use crate::domain::errors::TopologyError;

const POLICY_VERSION: &str = "2012-10-17";

/// Service segment of topic ARNs.
const TOPIC_SERVICE: &str = "sns";

/// Access policy allowing topics whose ARN matches a pattern to send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessPolicy {
    version: &'static str,
    id: String,
    statement: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Statement {
    sid: &'static str,
    effect: &'static str,
    principal: Principal,
    action: &'static str,
    resource: String,
    condition: Condition,
}

#[derive(Debug, Clone, Serialize)]
struct Principal {
    #[serde(rename = "AWS")]
    aws: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct Condition {
    #[serde(rename = "ArnLike")]
    arn_like: SourceArn,
}

#[derive(Debug, Clone, Serialize)]
struct SourceArn {
    #[serde(rename = "aws:SourceArn")]
    source_arn: String,
}

impl AccessPolicy {
    pub fn allow_topics(queue_arn: &str, source_arn_pattern: String) -> Self {
        Self {
            version: POLICY_VERSION,
            id: format!("{queue_arn}/SendPolicy"),
            statement: vec![Statement {
                sid: "AllowTopicSend",
                effect: "Allow",
                principal: Principal { aws: "*" },
                action: "SQS:SendMessage",
                resource: queue_arn.to_string(),
                condition: Condition {
                    arn_like: SourceArn {
                        source_arn: source_arn_pattern,
                    },
                },
            }],
        }
    }

    /// The ARN pattern topics must match to send.
    pub fn source_arn_pattern(&self) -> Option<&str> {
        self.statement
            .first()
            .map(|s| s.condition.arn_like.source_arn.as_str())
    }

    pub fn to_json(&self) -> Result<String, TopologyError> {
        serde_json::to_string(self).map_err(|e| TopologyError::Policy(e.to_string()))
    }
}

/// Dead-letter redrive settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    /// Encoded as a string, as the broker reports it back.
    pub max_receive_count: String,
}

impl RedrivePolicy {
    pub fn new(dead_letter_target_arn: impl Into<String>, max_receive_count: u32) -> Self {
        Self {
            dead_letter_target_arn: dead_letter_target_arn.into(),
            max_receive_count: max_receive_count.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, TopologyError> {
        serde_json::to_string(self).map_err(|e| TopologyError::Policy(e.to_string()))
    }
}

/// Topic ARN pattern in the queue's partition, region and account.
///
/// `arn:aws:sqs:us-east-1:123:q` with `dev_*` gives
/// `arn:aws:sns:us-east-1:123:dev_*`. Falls back to the bare pattern when
/// the queue ARN is not in the expected form.
pub fn topic_arn_pattern(queue_arn: &str, topic_pattern: &str) -> String {
    let parts: Vec<&str> = queue_arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", partition, _, region, account, _] => {
            format!("arn:{partition}:{TOPIC_SERVICE}:{region}:{account}:{topic_pattern}")
        }
        _ => topic_pattern.to_string(),
    }
}
