use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use webcomic_api::Config;

#[derive(Parser, Debug)]
#[command(name = "comicctl", about = "CLI for the webcomic edge API", version)]
struct Cli {
    /// Override the edge API base URL (defaults to API_HOST/API_PORT)
    #[arg(global = true, long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the API health endpoint
    Health,
    /// Comic episode management
    Comic {
        #[command(subcommand)]
        cmd: ComicCmd,
    },
    /// AI modification requests
    Mod {
        #[command(subcommand)]
        cmd: ModCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ComicCmd {
    /// Create an episode from an image file plus metadata
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        /// Path to the comic image (png, jpg, webp, gif, avif)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,
        /// ISO datetime; defaults to now server-side
        #[arg(long)]
        published_at: Option<String>,
        #[arg(long)]
        alt_text: Option<String>,
        #[arg(long)]
        transcript: Option<String>,
    },
    /// Patch an episode; only supplied fields change
    Patch {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        published_at: Option<String>,
        #[arg(long)]
        alt_text: Option<String>,
        #[arg(long)]
        transcript: Option<String>,
        #[arg(long)]
        hidden: Option<bool>,
        /// Replacement image path
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    /// Delete an episode by document id
    Delete { id: String },
    /// List all episodes (admin view, hidden included)
    List,
}

#[derive(Subcommand, Debug)]
enum ModCmd {
    /// Request a site modification
    Request {
        /// Free-text description of the change
        description: String,
    },
    /// List all modification requests with derived status
    List,
    /// Status of one request by issue number
    Status {
        #[arg(long)]
        issue: u64,
    },
    /// Approve (squash-merge) a PR
    Approve {
        #[arg(long)]
        pr: u64,
    },
    /// Reject a PR, optionally closing its issue
    Reject {
        #[arg(long)]
        pr: u64,
        #[arg(long)]
        issue: Option<u64>,
    },
    /// Supersede a request with feedback
    Revise {
        #[arg(long)]
        issue: u64,
        #[arg(long)]
        pr: u64,
        #[arg(long, default_value = "")]
        original_description: String,
        #[arg(long)]
        feedback: String,
    },
    /// Ask the bot to undo a PR's changes
    Revert {
        #[arg(long)]
        pr: u64,
        #[arg(long)]
        description: Option<String>,
    },
}

fn guess_image_type(path: &PathBuf) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

fn image_part(path: &PathBuf, bytes: Vec<u8>) -> reqwest::multipart::Part {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    reqwest::multipart::Part::bytes(bytes)
        .file_name(filename)
        .mime_str(guess_image_type(path))
        .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new()))
}

async fn print_response(response: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();

    let conf = Config::new().expect("Failed to load config");
    let api_url = cli
        .api_url
        .unwrap_or_else(|| format!("http://{}:{}", conf.api_host, conf.api_port));
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let response = client.get(format!("{}/health", api_url)).send().await?;
            print_response(response).await
        }
        Commands::Comic { cmd } => match cmd {
            ComicCmd::Create {
                title,
                slug,
                image,
                published_at,
                alt_text,
                transcript,
            } => {
                let bytes = tokio::fs::read(&image).await?;
                let mut fields = json!({ "title": title, "slug": slug });
                if let Some(v) = published_at {
                    fields["publishedAt"] = json!(v);
                }
                if let Some(v) = alt_text {
                    fields["altText"] = json!(v);
                }
                if let Some(v) = transcript {
                    fields["transcript"] = json!(v);
                }
                let form = reqwest::multipart::Form::new()
                    .text("json", fields.to_string())
                    .part("image", image_part(&image, bytes));
                let response = client
                    .post(format!("{}/api/comics", api_url))
                    .multipart(form)
                    .send()
                    .await?;
                print_response(response).await
            }
            ComicCmd::Patch {
                id,
                title,
                slug,
                published_at,
                alt_text,
                transcript,
                hidden,
                image,
            } => {
                let mut fields = serde_json::Map::new();
                if let Some(v) = title {
                    fields.insert("title".into(), json!(v));
                }
                if let Some(v) = slug {
                    fields.insert("slug".into(), json!(v));
                }
                if let Some(v) = published_at {
                    fields.insert("publishedAt".into(), json!(v));
                }
                if let Some(v) = alt_text {
                    fields.insert("altText".into(), json!(v));
                }
                if let Some(v) = transcript {
                    fields.insert("transcript".into(), json!(v));
                }
                if let Some(v) = hidden {
                    fields.insert("hidden".into(), json!(v));
                }
                let url = format!("{}/api/comics/{}", api_url, id);
                let response = match image {
                    Some(path) => {
                        let bytes = tokio::fs::read(&path).await?;
                        let form = reqwest::multipart::Form::new()
                            .text("json", Value::Object(fields).to_string())
                            .part("image", image_part(&path, bytes));
                        client.patch(url).multipart(form).send().await?
                    }
                    None => {
                        client
                            .patch(url)
                            .json(&Value::Object(fields))
                            .send()
                            .await?
                    }
                };
                print_response(response).await
            }
            ComicCmd::Delete { id } => {
                let response = client
                    .delete(format!("{}/api/comics/{}", api_url, id))
                    .send()
                    .await?;
                print_response(response).await
            }
            ComicCmd::List => {
                let response = client.get(format!("{}/api/comics", api_url)).send().await?;
                print_response(response).await
            }
        },
        Commands::Mod { cmd } => match cmd {
            ModCmd::Request { description } => {
                let response = client
                    .post(format!("{}/api/ai-mod/request", api_url))
                    .json(&json!({ "description": description }))
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::List => {
                let response = client
                    .get(format!("{}/api/ai-mod/list", api_url))
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::Status { issue } => {
                let response = client
                    .get(format!("{}/api/ai-mod/status", api_url))
                    .query(&[("issue", issue.to_string())])
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::Approve { pr } => {
                let response = client
                    .post(format!("{}/api/ai-mod/approve", api_url))
                    .json(&json!({ "prNumber": pr }))
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::Reject { pr, issue } => {
                let mut body = json!({ "prNumber": pr });
                if let Some(issue) = issue {
                    body["issueNumber"] = json!(issue);
                }
                let response = client
                    .post(format!("{}/api/ai-mod/reject", api_url))
                    .json(&body)
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::Revise {
                issue,
                pr,
                original_description,
                feedback,
            } => {
                let response = client
                    .post(format!("{}/api/ai-mod/revise", api_url))
                    .json(&json!({
                        "issueNumber": issue,
                        "prNumber": pr,
                        "originalDescription": original_description,
                        "feedback": feedback,
                    }))
                    .send()
                    .await?;
                print_response(response).await
            }
            ModCmd::Revert { pr, description } => {
                let mut body = json!({ "prNumber": pr });
                if let Some(description) = description {
                    body["description"] = json!(description);
                }
                let response = client
                    .post(format!("{}/api/ai-mod/revert", api_url))
                    .json(&body)
                    .send()
                    .await?;
                print_response(response).await
            }
        },
    }
}
