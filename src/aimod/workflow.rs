//! AI-modification workflow over GitHub issues and pull requests.
//!
//! A request becomes a labeled issue; an automation bot is assigned
//! best-effort and later opens a PR. Nothing is cached: status and listings
//! are reconstructed on every read from the issue/PR state the platform
//! returns. Linkage between an issue and its PR is string convention only
//! (branch name containing the issue number, or a "fixes/closes/resolves #N"
//! body marker), since the platform offers no structured link.
use futures::future::join_all;
use regex::Regex;
use serde::Serialize;

use crate::error::AppResult;
use crate::github::client::GitHubClient;
use crate::github::types::{Issue, PullRequest};

pub const MOD_LABEL: &str = "ai-modification";
pub const BOT_LOGIN: &str = "copilot-swe-agent";

// Hosting provider truncates long branch names when forming preview
// subdomains; mirror that limit in the fallback URL.
const PREVIEW_SLUG_MAX: usize = 28;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModReceipt {
    pub issue_number: u64,
    pub issue_url: String,
    pub status: &'static str,
    pub copilot_assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_issue: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModStatusReport {
    pub issue_number: u64,
    pub issue_state: String,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub pr_state: String,
    pub preview_url: Option<String>,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModSummary {
    pub issue_number: u64,
    pub issue_url: String,
    pub issue_state: String,
    pub description: String,
    pub created_at: String,
    pub pr_number: Option<u64>,
    pub pr_url: Option<String>,
    pub pr_state: Option<String>,
    pub preview_url: Option<String>,
    pub status: &'static str,
    pub is_revision: bool,
    pub is_revert: bool,
}

/// Where a modification request stands, reconstructed from issue/PR state.
/// `Replaced` and `Discarded` outrank the PR-derived states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDisposition {
    Replaced,
    Discarded,
    Applied,
    InReview,
    Pending,
}

pub struct ModWorkflow {
    github: GitHubClient,
    preview_host: String,
}

impl ModWorkflow {
    pub fn new(github: GitHubClient, preview_host: String) -> Self {
        ModWorkflow {
            github,
            preview_host,
        }
    }

    /// Create a modification request: file a labeled issue and attempt bot
    /// assignment. Assignment failure degrades to `copilot_assigned: false`
    /// rather than failing the request.
    pub async fn request(&self, description: &str) -> AppResult<ModReceipt> {
        let title = format!("[AI] {}", truncate_ellipsis(description, 60));
        let body = format!(
            "## Site Modification Request\n\n{}\n\n---\n*This issue was created from the admin panel. Copilot will work on this and create a PR.*\n",
            description
        );
        let issue = self.github.create_issue(&title, &body, &[MOD_LABEL]).await?;
        let copilot_assigned = self.try_assign_bot(issue.number).await;
        Ok(ModReceipt {
            issue_number: issue.number,
            issue_url: issue.html_url,
            status: "pending",
            copilot_assigned,
            replaced_issue: None,
        })
    }

    /// Resolve the current state of one request by issue number.
    pub async fn status(&self, issue_number: u64) -> AppResult<ModStatusReport> {
        let issue = self.github.get_issue(issue_number).await?;
        let pulls = self.github.list_pulls(20).await?;
        let linked = find_linked_pull(&pulls, issue_number);

        // Preview URL is only computed for a non-merged linked PR; the
        // constructed fallback makes derivation infallible.
        let preview = match linked {
            Some(pr) if !pr.is_merged() => {
                Some(self.preview_url_for_branch(&pr.head.name).await)
            }
            _ => None,
        };
        let (pr_state, preview_url, status) = status_fields(linked, preview);

        Ok(ModStatusReport {
            issue_number,
            issue_state: issue.state,
            pr_number: linked.map(|pr| pr.number),
            pr_url: linked.map(|pr| pr.html_url.clone()),
            pr_state,
            preview_url,
            status,
        })
    }

    /// List every labeled request with its derived state. Per-issue PR and
    /// preview resolution fans out concurrently.
    pub async fn list(&self) -> AppResult<Vec<ModSummary>> {
        let issues = self.github.list_label_issues(MOD_LABEL).await?;
        let pulls = self.github.list_pulls(30).await?;

        let summaries = issues
            .iter()
            .map(|issue| self.summarize(issue, &pulls));
        Ok(join_all(summaries).await)
    }

    async fn summarize(&self, issue: &Issue, pulls: &[PullRequest]) -> ModSummary {
        let linked = find_linked_pull(pulls, issue.number);
        let disposition = classify_request(issue, linked);

        let (status, preview_url) = match disposition {
            RequestDisposition::Replaced => ("replaced", None),
            RequestDisposition::Discarded => ("discarded", None),
            RequestDisposition::Applied => ("applied", None),
            RequestDisposition::InReview => {
                let branch = linked.map(|pr| pr.head.name.as_str()).unwrap_or("");
                ("preview_ready", Some(self.preview_url_for_branch(branch).await))
            }
            RequestDisposition::Pending => ("pending", None),
        };

        let (description, is_revision, is_revert) = classify_title(&issue.title);

        ModSummary {
            issue_number: issue.number,
            issue_url: issue.html_url.clone(),
            issue_state: issue.state.clone(),
            description,
            created_at: issue.created_at.clone(),
            pr_number: linked.map(|pr| pr.number),
            pr_url: linked.map(|pr| pr.html_url.clone()),
            pr_state: linked.map(|pr| {
                if pr.is_merged() {
                    "merged".to_string()
                } else {
                    pr.state.clone()
                }
            }),
            preview_url,
            status,
            is_revision,
            is_revert,
        }
    }

    /// Approve a PR: if it is still a draft, mark it ready first
    /// (best-effort), then squash-merge. Merge failures propagate.
    pub async fn approve(&self, pr_number: u64) -> AppResult<()> {
        if let Err(err) = self.mark_ready_if_draft(pr_number).await {
            tracing::warn!(
                "could not mark PR #{} ready for review, merging anyway: {}",
                pr_number,
                err
            );
        }
        self.github.merge_pull_squash(pr_number).await
    }

    async fn mark_ready_if_draft(&self, pr_number: u64) -> AppResult<()> {
        let node = self.github.pull_node(pr_number).await?;
        if node.is_draft {
            self.github.mark_pull_ready(&node.id).await?;
        }
        Ok(())
    }

    /// Reject a PR (close it); optionally close the originating issue too.
    pub async fn reject(&self, pr_number: u64, issue_number: Option<u64>) -> AppResult<()> {
        self.github.close_pull(pr_number).await?;
        if let Some(issue) = issue_number {
            self.github.close_issue(issue).await?;
        }
        Ok(())
    }

    /// Supersede a request: close the old PR and issue, then open a revision
    /// issue embedding the original description plus feedback. The body
    /// carries a "This replaces issue #N" marker that `list()` detects.
    pub async fn revise(
        &self,
        issue_number: u64,
        pr_number: u64,
        original_description: &str,
        feedback: &str,
    ) -> AppResult<ModReceipt> {
        self.github.close_pull(pr_number).await?;
        self.github.close_issue(issue_number).await?;

        let title = format!(
            "[AI] Revision: {}",
            truncate_ellipsis(original_description, 50)
        );
        let body = format!(
            "## Site Modification Request\n\n{}\n\n### Additional Changes Requested:\n{}\n\n---\n*This replaces issue #{}. Copilot will work on this and create a PR.*\n",
            original_description, feedback, issue_number
        );
        let issue = self.github.create_issue(&title, &body, &[MOD_LABEL]).await?;
        let copilot_assigned = self.try_assign_bot(issue.number).await;
        Ok(ModReceipt {
            issue_number: issue.number,
            issue_url: issue.html_url,
            status: "pending",
            copilot_assigned,
            replaced_issue: Some(issue_number),
        })
    }

    /// File an issue instructing the bot to undo a merged PR's changes.
    pub async fn revert(
        &self,
        pr_number: u64,
        description: Option<&str>,
    ) -> AppResult<ModReceipt> {
        let title = revert_title(pr_number, description);
        let body = format!(
            "## Site Modification Request\n\nUndo the changes from PR #{}.\n\nOriginal change: {}\n\nPlease revert the code changes made in that PR to restore the previous behavior.\n\n---\n*This is a revert request created from the admin panel. Copilot will work on this and create a PR.*\n",
            pr_number,
            description.filter(|d| !d.is_empty()).unwrap_or("No description available")
        );
        let issue = self.github.create_issue(&title, &body, &[MOD_LABEL]).await?;
        let copilot_assigned = self.try_assign_bot(issue.number).await;
        Ok(ModReceipt {
            issue_number: issue.number,
            issue_url: issue.html_url,
            status: "pending",
            copilot_assigned,
            replaced_issue: None,
        })
    }

    /// Best-effort bot assignment: any failure in the lookup/assign sequence
    /// degrades to `false` instead of failing the surrounding operation.
    pub async fn try_assign_bot(&self, issue_number: u64) -> bool {
        match self.assign_bot(issue_number).await {
            Ok(assigned) => assigned,
            Err(err) => {
                tracing::warn!(
                    "bot assignment degraded for issue #{}: {}",
                    issue_number,
                    err
                );
                false
            }
        }
    }

    async fn assign_bot(&self, issue_number: u64) -> AppResult<bool> {
        let actors = self.github.suggested_actors().await?;
        let bot = actors
            .iter()
            .find(|actor| actor.login == BOT_LOGIN && actor.typename == "Bot");
        let bot_id = match bot.and_then(|b| b.id.as_deref()) {
            Some(id) => id.to_string(),
            None => return Ok(false),
        };
        let issue_id = self.github.issue_node_id(issue_number).await?;
        self.github.add_assignee(&issue_id, &bot_id).await?;
        Ok(true)
    }

    /// Preview URL for a PR branch: prefer a successful deployment's
    /// environment URL, fall back to the provider's branch-subdomain
    /// convention. The fallback is a guess, not a contract.
    pub async fn preview_url_for_branch(&self, branch: &str) -> String {
        if let Some(url) = self.deployment_preview(branch).await {
            return url;
        }
        format!(
            "https://{}.{}",
            branch_preview_slug(branch),
            self.preview_host
        )
    }

    async fn deployment_preview(&self, branch: &str) -> Option<String> {
        let deployments = match self.github.list_deployments(branch).await {
            Ok(deployments) => deployments,
            Err(err) => {
                tracing::warn!("deployment lookup degraded for {}: {}", branch, err);
                return None;
            }
        };
        for deployment in deployments {
            let statuses = match self.github.deployment_statuses(deployment.id).await {
                Ok(statuses) => statuses,
                Err(err) => {
                    tracing::warn!(
                        "deployment status lookup degraded for {}: {}",
                        deployment.id,
                        err
                    );
                    continue;
                }
            };
            if let Some(url) = statuses
                .into_iter()
                .find(|s| s.state == "success" && s.environment_url.is_some())
                .and_then(|s| s.environment_url)
            {
                return Some(url);
            }
        }
        None
    }
}

/// Truncate to `max` characters, appending an ellipsis when shortened.
pub fn truncate_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Revert issue title: a plain 50-character cut of the description (no
/// ellipsis, unlike request/revision titles), falling back to the PR number.
pub fn revert_title(pr_number: u64, description: Option<&str>) -> String {
    match description.filter(|d| !d.is_empty()) {
        Some(desc) => {
            let cut: String = desc.chars().take(50).collect();
            format!("[AI] Revert: {}", cut)
        }
        None => format!("[AI] Revert: PR #{}", pr_number),
    }
}

/// Slugify a branch name the way the hosting provider forms preview
/// subdomains: slashes become dashes, lowercased, cut at 28 characters.
pub fn branch_preview_slug(branch: &str) -> String {
    let slug = branch.replace('/', "-").to_lowercase();
    slug.chars().take(PREVIEW_SLUG_MAX).collect()
}

/// Does a PR belong to an issue? Matches the branch name embedding the issue
/// number, or a case-insensitive "fixes/closes/resolves ... #N" body marker.
pub fn pull_matches_issue(pr: &PullRequest, issue_number: u64) -> bool {
    let number = issue_number.to_string();
    if pr.head.name.contains(&number) || pr.head.name.contains(&format!("issue-{}", number)) {
        return true;
    }
    if let Some(body) = &pr.body {
        let pattern = format!(r"(?i)(fixes|closes|resolves)\s+.*#{}\b", issue_number);
        if let Ok(re) = Regex::new(&pattern) {
            return re.is_match(body);
        }
    }
    false
}

/// First matching PR in list order; ambiguity beyond that is not broken.
pub fn find_linked_pull(pulls: &[PullRequest], issue_number: u64) -> Option<&PullRequest> {
    pulls.iter().find(|pr| pull_matches_issue(pr, issue_number))
}

/// Status-endpoint fields for a request: PR state label, preview URL, and
/// derived status. Merged always wins over matching ambiguity; an open PR is
/// `preview_ready` when a URL was derived, `pr_created` otherwise.
pub fn status_fields(
    linked: Option<&PullRequest>,
    preview_url: Option<String>,
) -> (String, Option<String>, &'static str) {
    match linked {
        None => ("not_found".to_string(), None, "pending"),
        Some(pr) if pr.is_merged() => ("merged".to_string(), None, "merged"),
        Some(pr) => {
            let status = if preview_url.is_some() {
                "preview_ready"
            } else {
                "pr_created"
            };
            (pr.state.clone(), preview_url, status)
        }
    }
}

/// Derive a request's disposition. Replaced (closed issue carrying the
/// revision marker) and discarded (linked PR closed without merging) take
/// priority over the PR-derived states.
pub fn classify_request(issue: &Issue, linked: Option<&PullRequest>) -> RequestDisposition {
    let replaced = issue.state == "closed"
        && issue
            .body
            .as_deref()
            .map_or(false, |body| body.contains("This replaces issue #"));
    if replaced {
        return RequestDisposition::Replaced;
    }
    match linked {
        Some(pr) if pr.state == "closed" && !pr.is_merged() => RequestDisposition::Discarded,
        Some(pr) if pr.is_merged() => RequestDisposition::Applied,
        Some(pr) if pr.state == "open" => RequestDisposition::InReview,
        _ => RequestDisposition::Pending,
    }
}

/// Strip the `[AI] ` prefix, then detect and strip the `Revision:`/`Revert:`
/// display prefixes. Order matters: the `[AI]` marker always comes first.
pub fn classify_title(title: &str) -> (String, bool, bool) {
    let stripped = title.strip_prefix("[AI]").unwrap_or(title).trim_start();
    let is_revision = stripped.starts_with("Revision:");
    let is_revert = stripped.starts_with("Revert:");
    let description = stripped
        .strip_prefix("Revision:")
        .or_else(|| stripped.strip_prefix("Revert:"))
        .unwrap_or(stripped)
        .trim_start()
        .to_string();
    (description, is_revision, is_revert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::Branch;

    fn pr(number: u64, branch: &str, state: &str, merged: bool, body: Option<&str>) -> PullRequest {
        PullRequest {
            number,
            html_url: format!("https://github.com/o/r/pull/{}", number),
            state: state.to_string(),
            body: body.map(String::from),
            head: Branch {
                name: branch.to_string(),
            },
            merged_at: merged.then(|| "2026-01-01T00:00:00Z".to_string()),
            draft: false,
        }
    }

    fn issue(number: u64, state: &str, body: Option<&str>) -> Issue {
        Issue {
            number,
            title: format!("[AI] request {}", number),
            body: body.map(String::from),
            state: state.to_string(),
            html_url: format!("https://github.com/o/r/issues/{}", number),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn branch_slug_truncates_to_twenty_eight_chars() {
        let slug = branch_preview_slug("feature/a-very-long-branch-name-exceeding-limit");
        assert_eq!(slug.chars().count(), 28);
        assert_eq!(slug, "feature-a-very-long-branch-n");
    }

    #[test]
    fn branch_slug_lowercases_and_replaces_slashes() {
        assert_eq!(branch_preview_slug("Copilot/Fix-42"), "copilot-fix-42");
    }

    #[test]
    fn short_branch_slug_is_unchanged() {
        assert_eq!(branch_preview_slug("fix-7"), "fix-7");
    }

    #[test]
    fn pull_matches_by_branch_number() {
        assert!(pull_matches_issue(&pr(1, "copilot/fix-42", "open", false, None), 42));
        assert!(pull_matches_issue(&pr(1, "issue-42-fix", "open", false, None), 42));
        assert!(!pull_matches_issue(&pr(1, "copilot/fix-7", "open", false, None), 42));
    }

    #[test]
    fn pull_matches_by_body_marker_case_insensitive() {
        let with_body = |body: &str| pr(1, "some-branch", "open", false, Some(body));
        assert!(pull_matches_issue(&with_body("Fixes #42"), 42));
        assert!(pull_matches_issue(&with_body("closes the bug in #42"), 42));
        assert!(pull_matches_issue(&with_body("RESOLVES #42"), 42));
        assert!(!pull_matches_issue(&with_body("mentions #42 casually"), 42));
        // #421 must not match #42
        assert!(!pull_matches_issue(&with_body("Fixes #421"), 42));
    }

    #[test]
    fn first_matching_pull_wins() {
        let pulls = vec![
            pr(1, "unrelated", "open", false, None),
            pr(2, "copilot/fix-9", "open", false, None),
            pr(3, "also-fix-9", "open", false, None),
        ];
        assert_eq!(find_linked_pull(&pulls, 9).map(|p| p.number), Some(2));
    }

    #[test]
    fn merged_pull_classifies_applied_regardless_of_ambiguity() {
        let merged = pr(5, "fix-3", "closed", true, Some("Fixes #3"));
        assert_eq!(
            classify_request(&issue(3, "open", None), Some(&merged)),
            RequestDisposition::Applied
        );
    }

    #[test]
    fn replaced_outranks_open_pull() {
        let open_pr = pr(5, "fix-3", "open", false, None);
        let replaced = issue(3, "closed", Some("This replaces issue #2. Copilot will work on this."));
        assert_eq!(
            classify_request(&replaced, Some(&open_pr)),
            RequestDisposition::Replaced
        );
    }

    #[test]
    fn replaced_marker_on_open_issue_does_not_apply() {
        let open_issue = issue(3, "open", Some("This replaces issue #2."));
        assert_eq!(
            classify_request(&open_issue, None),
            RequestDisposition::Pending
        );
    }

    #[test]
    fn closed_unmerged_pull_is_discarded_even_over_merge_checks() {
        let discarded_pr = pr(5, "fix-3", "closed", false, None);
        assert_eq!(
            classify_request(&issue(3, "open", None), Some(&discarded_pr)),
            RequestDisposition::Discarded
        );
    }

    #[test]
    fn open_pull_is_in_review_and_no_pull_is_pending() {
        let open_pr = pr(5, "fix-3", "open", false, None);
        assert_eq!(
            classify_request(&issue(3, "open", None), Some(&open_pr)),
            RequestDisposition::InReview
        );
        assert_eq!(
            classify_request(&issue(3, "open", None), None),
            RequestDisposition::Pending
        );
    }

    #[test]
    fn title_classification_strips_prefixes_in_order() {
        assert_eq!(
            classify_title("[AI] Revision: darker background"),
            ("darker background".to_string(), true, false)
        );
        assert_eq!(
            classify_title("[AI] Revert: add banner"),
            ("add banner".to_string(), false, true)
        );
        assert_eq!(
            classify_title("[AI] add banner"),
            ("add banner".to_string(), false, false)
        );
        // Without the [AI] marker the revision prefix is still recognized.
        assert_eq!(
            classify_title("Revision: tweak header"),
            ("tweak header".to_string(), true, false)
        );
    }

    #[test]
    fn status_fields_prioritize_merged_then_preview() {
        // No linked PR at all.
        assert_eq!(
            status_fields(None, None),
            ("not_found".to_string(), None, "pending")
        );
        // Merged wins even when a preview URL was somehow derived.
        let merged = pr(5, "fix-3", "closed", true, None);
        assert_eq!(
            status_fields(Some(&merged), Some("https://x".to_string())),
            ("merged".to_string(), None, "merged")
        );
        // Open PR with a preview is ready; without one it is just created.
        let open_pr = pr(5, "fix-3", "open", false, None);
        assert_eq!(
            status_fields(Some(&open_pr), Some("https://x".to_string())),
            (
                "open".to_string(),
                Some("https://x".to_string()),
                "preview_ready"
            )
        );
        assert_eq!(
            status_fields(Some(&open_pr), None),
            ("open".to_string(), None, "pr_created")
        );
    }

    #[test]
    fn revert_title_cuts_at_fifty_chars_without_ellipsis() {
        let long = "y".repeat(80);
        let title = revert_title(12, Some(&long));
        assert_eq!(title, format!("[AI] Revert: {}", "y".repeat(50)));
        assert!(!title.ends_with("..."));
        assert_eq!(revert_title(12, Some("short one")), "[AI] Revert: short one");
    }

    #[test]
    fn revert_title_falls_back_to_pr_number() {
        assert_eq!(revert_title(7, None), "[AI] Revert: PR #7");
        assert_eq!(revert_title(7, Some("")), "[AI] Revert: PR #7");
    }

    #[test]
    fn truncate_ellipsis_only_when_over_limit() {
        assert_eq!(truncate_ellipsis("short", 60), "short");
        let long = "x".repeat(61);
        let truncated = truncate_ellipsis(&long, 60);
        assert_eq!(truncated.len(), 63);
        assert!(truncated.ends_with("..."));
    }
}
