//! Typed shapes for the GitHub REST and GraphQL responses this service
//! consumes. Only the fields actually read are modeled; decode failures on
//! required fields surface as client errors rather than silent defaults.
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
    pub head: Branch,
    // List responses carry merged_at rather than a merged boolean.
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentStatus {
    pub state: String,
    #[serde(default)]
    pub environment_url: Option<String>,
}

// GraphQL envelope and per-query payloads.

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestedActorsData {
    pub repository: SuggestedActorsRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedActorsRepository {
    pub suggested_actors: ActorConnection,
}

#[derive(Debug, Deserialize)]
pub struct ActorConnection {
    pub nodes: Vec<Actor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    pub login: String,
    #[serde(rename = "__typename")]
    pub typename: String,
    // Only present for Bot/User nodes via inline fragments.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueNodeData {
    pub repository: IssueNodeRepository,
}

#[derive(Debug, Deserialize)]
pub struct IssueNodeRepository {
    pub issue: NodeId,
}

#[derive(Debug, Deserialize)]
pub struct NodeId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PullNodeData {
    pub repository: PullNodeRepository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullNodeRepository {
    pub pull_request: PullNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullNode {
    pub id: String,
    pub is_draft: bool,
}
