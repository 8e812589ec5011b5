//! Thin HTTP client for the GitHub REST and GraphQL APIs.
//!
//! Bot assignees cannot be set over REST, so assignment (and the draft-PR
//! ready transition) goes through GraphQL; everything else is plain REST.
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::github::types::{
    Actor, Deployment, DeploymentStatus, GraphQlResponse, Issue, IssueNodeData, PullNode,
    PullNodeData, PullRequest, SuggestedActorsData,
};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "webcomic-api";

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Self {
        GitHubClient {
            client: Client::new(),
            token: config.github_token.clone(),
            owner: config.github_owner.clone(),
            repo: config.github_repo.clone(),
        }
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("{}/repos/{}/{}{}", API_BASE, self.owner, self.repo, rest)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> AppResult<T> {
        let response = builder.send().await.map_err(AppError::HttpClient)?;
        if response.status().is_success() {
            response.json().await.map_err(AppError::HttpClient)
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AppError::GitHub(format!("{} {}", status, body)))
        }
    }

    // Responses we don't decode (close/merge acknowledgements) still get
    // drained for an error body on failure.
    async fn send_unit(&self, builder: reqwest::RequestBuilder) -> AppResult<()> {
        let response = builder.send().await.map_err(AppError::HttpClient)?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(AppError::GitHub(format!("{} {}", status, body)))
        }
    }

    /// Run a GraphQL query/mutation and decode its `data` payload. GraphQL
    /// errors arrive on a 200, so they are checked explicitly.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> AppResult<T> {
        let response = self
            .client
            .post(format!("{}/graphql", API_BASE))
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(AppError::GitHub(format!("graphql: {} {}", status, body)));
        }

        let wrapped: GraphQlResponse<T> =
            response.json().await.map_err(AppError::HttpClient)?;
        if let Some(err) = wrapped.errors.first() {
            return Err(AppError::GitHub(format!("graphql: {}", err.message)));
        }
        wrapped
            .data
            .ok_or_else(|| AppError::GitHub("graphql: empty data".to_string()))
    }

    pub async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> AppResult<Issue> {
        let builder = self
            .request(reqwest::Method::POST, self.repo_path("/issues"))
            .json(&json!({ "title": title, "body": body, "labels": labels }));
        self.send_json(builder).await
    }

    pub async fn get_issue(&self, number: u64) -> AppResult<Issue> {
        let builder = self.request(
            reqwest::Method::GET,
            self.repo_path(&format!("/issues/{}", number)),
        );
        self.send_json(builder).await
    }

    /// Issues carrying a label, newest first.
    pub async fn list_label_issues(&self, label: &str) -> AppResult<Vec<Issue>> {
        let builder = self
            .request(reqwest::Method::GET, self.repo_path("/issues"))
            .query(&[
                ("labels", label),
                ("state", "all"),
                ("per_page", "20"),
                ("sort", "created"),
                ("direction", "desc"),
            ]);
        self.send_json(builder).await
    }

    /// Most recent pull requests in any state.
    pub async fn list_pulls(&self, per_page: u32) -> AppResult<Vec<PullRequest>> {
        let per_page = per_page.to_string();
        let builder = self
            .request(reqwest::Method::GET, self.repo_path("/pulls"))
            .query(&[("state", "all"), ("per_page", per_page.as_str())]);
        self.send_json(builder).await
    }

    pub async fn close_issue(&self, number: u64) -> AppResult<()> {
        let builder = self
            .request(
                reqwest::Method::PATCH,
                self.repo_path(&format!("/issues/{}", number)),
            )
            .json(&json!({ "state": "closed" }));
        self.send_unit(builder).await
    }

    pub async fn close_pull(&self, number: u64) -> AppResult<()> {
        let builder = self
            .request(
                reqwest::Method::PATCH,
                self.repo_path(&format!("/pulls/{}", number)),
            )
            .json(&json!({ "state": "closed" }));
        self.send_unit(builder).await
    }

    pub async fn merge_pull_squash(&self, number: u64) -> AppResult<()> {
        let builder = self
            .request(
                reqwest::Method::PUT,
                self.repo_path(&format!("/pulls/{}/merge", number)),
            )
            .json(&json!({ "merge_method": "squash" }));
        self.send_unit(builder).await
    }

    pub async fn list_deployments(&self, branch_ref: &str) -> AppResult<Vec<Deployment>> {
        let builder = self
            .request(reqwest::Method::GET, self.repo_path("/deployments"))
            .query(&[("ref", branch_ref), ("per_page", "5")]);
        self.send_json(builder).await
    }

    pub async fn deployment_statuses(
        &self,
        deployment_id: u64,
    ) -> AppResult<Vec<DeploymentStatus>> {
        let builder = self.request(
            reqwest::Method::GET,
            self.repo_path(&format!("/deployments/{}/statuses", deployment_id)),
        );
        self.send_json(builder).await
    }

    /// Actors the repository suggests as assignable (bots included).
    pub async fn suggested_actors(&self) -> AppResult<Vec<Actor>> {
        let data: SuggestedActorsData = self
            .graphql(
                "query($owner: String!, $name: String!) {
                  repository(owner: $owner, name: $name) {
                    suggestedActors(capabilities: [CAN_BE_ASSIGNED], first: 20) {
                      nodes {
                        login
                        __typename
                        ... on Bot { id }
                        ... on User { id }
                      }
                    }
                  }
                }",
                json!({ "owner": self.owner, "name": self.repo }),
            )
            .await?;
        Ok(data.repository.suggested_actors.nodes)
    }

    pub async fn issue_node_id(&self, number: u64) -> AppResult<String> {
        let data: IssueNodeData = self
            .graphql(
                "query($owner: String!, $name: String!, $number: Int!) {
                  repository(owner: $owner, name: $name) {
                    issue(number: $number) { id }
                  }
                }",
                json!({ "owner": self.owner, "name": self.repo, "number": number }),
            )
            .await?;
        Ok(data.repository.issue.id)
    }

    pub async fn add_assignee(&self, assignable_id: &str, assignee_id: &str) -> AppResult<()> {
        self.graphql::<Value>(
            "mutation($issueId: ID!, $assigneeIds: [ID!]!) {
              addAssigneesToAssignable(input: {
                assignableId: $issueId,
                assigneeIds: $assigneeIds
              }) {
                assignable { ... on Issue { id } }
              }
            }",
            json!({ "issueId": assignable_id, "assigneeIds": [assignee_id] }),
        )
        .await?;
        Ok(())
    }

    pub async fn pull_node(&self, number: u64) -> AppResult<PullNode> {
        let data: PullNodeData = self
            .graphql(
                "query($owner: String!, $name: String!, $number: Int!) {
                  repository(owner: $owner, name: $name) {
                    pullRequest(number: $number) { id isDraft }
                  }
                }",
                json!({ "owner": self.owner, "name": self.repo, "number": number }),
            )
            .await?;
        Ok(data.repository.pull_request)
    }

    pub async fn mark_pull_ready(&self, pull_id: &str) -> AppResult<()> {
        self.graphql::<Value>(
            "mutation($pullRequestId: ID!) {
              markPullRequestReadyForReview(input: { pullRequestId: $pullRequestId }) {
                pullRequest { id }
              }
            }",
            json!({ "pullRequestId": pull_id }),
        )
        .await?;
        Ok(())
    }
}
