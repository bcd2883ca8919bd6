use serde::{Deserialize, Serialize};

use crate::domain::{Availability, ExperienceTier, PersonId, StageKey, StageState};

/// Body of `POST /optimize-team`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub requirements: RequirementsBody,
    pub personnel: Vec<PersonBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsBody {
    pub project_name: String,
    pub team_size: u32,
    pub skills: Vec<String>,
    pub project_type: String,
    pub priority: String,
    pub timeline: Option<String>,
    pub budget: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonBody {
    pub id: PersonId,
    pub name: String,
    pub skills: Vec<String>,
    pub experience: ExperienceTier,
    pub personality: String,
    pub mbti_type: Option<String>,
    pub experience_years: u32,
    pub availability: Availability,
    pub hourly_rate: f64,
}

/// Who a push message is about: one of the four stages, or the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentKind {
    Stage(StageKey),
    Orchestrator,
}

impl TryFrom<String> for AgentKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "orchestrator" {
            return Ok(AgentKind::Orchestrator);
        }
        value.parse::<StageKey>().map(AgentKind::Stage)
    }
}

impl From<AgentKind> for String {
    fn from(value: AgentKind) -> Self {
        match value {
            AgentKind::Stage(key) => key.as_str().to_string(),
            AgentKind::Orchestrator => "orchestrator".to_string(),
        }
    }
}

/// Inbound push-channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentUpdate {
    pub agent_type: AgentKind,
    pub status: StageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultPayload>,
}

/// Final optimizer output. Treated as an immutable value once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub recommendations: Vec<Recommendation>,
    pub metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub rank: u32,
    #[serde(default)]
    pub team: serde_json::Value,
    #[serde(default)]
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub ai_insights: Option<String>,
}

impl Recommendation {
    /// Names of the recommended members, when the team block carries them.
    pub fn member_names(&self) -> Vec<String> {
        self.team
            .get("members")
            .and_then(|members| members.as_array())
            .map(|members| {
                members
                    .iter()
                    .filter_map(|member| member.pointer("/person/name"))
                    .filter_map(|name| name.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.team.get("overallScore").and_then(|v| v.as_f64())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    #[serde(default)]
    pub total_candidates: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Success body of `POST /optimize-team`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeResponse {
    #[serde(default)]
    pub data: Option<ResultPayload>,
}

/// Error body the optimizer returns on non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub agents: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_update_with_legacy_stage_key_and_lowercase_status() {
        let update: AgentUpdate = serde_json::from_str(
            r#"{"agent_type":"hrSkillsAnalyst","status":"running","progress":25,"message":"Analyzing"}"#,
        )
        .expect("parse");
        assert_eq!(update.agent_type, AgentKind::Stage(StageKey::SkillsAnalyst));
        assert_eq!(update.status, StageState::Running);
        assert_eq!(update.progress, Some(25));
        assert!(update.results.is_none());
    }

    #[test]
    fn parses_capitalized_status_and_missing_progress() {
        let update: AgentUpdate = serde_json::from_str(
            r#"{"agent_type":"techArchitect","status":"Completed","message":"done"}"#,
        )
        .expect("parse");
        assert_eq!(update.status, StageState::Completed);
        assert_eq!(update.progress, None);
    }

    #[test]
    fn orchestrator_messages_carry_results() {
        let update: AgentUpdate = serde_json::from_str(
            r#"{"agent_type":"orchestrator","status":"completed","progress":100,"message":"ok",
                "results":{"recommendations":[{"rank":1,"team":{"overallScore":0.94}}],
                           "metadata":{"confidence":0.94,"aiAgentsUsed":4},"aiAnalysis":"text"}}"#,
        )
        .expect("parse");
        assert_eq!(update.agent_type, AgentKind::Orchestrator);
        let results = update.results.expect("results");
        assert_eq!(results.recommendations[0].overall_score(), Some(0.94));
        assert_eq!(results.metadata.confidence, Some(0.94));
        assert_eq!(results.metadata.extra.get("aiAgentsUsed"), Some(&serde_json::json!(4)));
        assert_eq!(results.ai_analysis.as_deref(), Some("text"));
    }

    #[test]
    fn rejects_unknown_agent_type() {
        let err = serde_json::from_str::<AgentUpdate>(
            r#"{"agent_type":"janitor","status":"running","progress":1,"message":""}"#,
        )
        .expect_err("unknown agent");
        assert!(err.to_string().contains("unknown stage key"));
    }

    #[test]
    fn request_body_uses_camel_case_wire_names() {
        let body = OptimizeRequest {
            requirements: RequirementsBody {
                project_name: "Atlas".into(),
                team_size: 3,
                skills: vec!["Rust".into()],
                project_type: "web".into(),
                priority: "high".into(),
                timeline: None,
                budget: None,
            },
            personnel: vec![PersonBody {
                id: PersonId(1),
                name: "Alice".into(),
                skills: vec![],
                experience: ExperienceTier::Senior,
                personality: "leadership".into(),
                mbti_type: Some("ENTJ".into()),
                experience_years: 8,
                availability: Availability::FullTime,
                hourly_rate: 85.0,
            }],
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["requirements"]["projectName"], "Atlas");
        assert_eq!(value["requirements"]["teamSize"], 3);
        assert!(value["requirements"]["timeline"].is_null());
        assert_eq!(value["personnel"][0]["mbtiType"], "ENTJ");
        assert_eq!(value["personnel"][0]["availability"], "full-time");
        assert_eq!(value["personnel"][0]["hourlyRate"], 85.0);
    }

    #[test]
    fn error_detail_falls_back_to_json_for_structured_details() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body"],"msg":"bad"}]}"#).expect("parse");
        assert_eq!(
            body.detail_text().as_deref(),
            Some(r#"[{"loc":["body"],"msg":"bad"}]"#)
        );
        let empty: ErrorBody = serde_json::from_str("{}").expect("parse");
        assert_eq!(empty.detail_text(), None);
    }
}
