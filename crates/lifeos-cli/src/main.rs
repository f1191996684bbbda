//! Life OS terminal client.
//!
//! Provides the `lifeos` binary: list the knowledge tree, inspect a node,
//! edit the tree, or watch pushed changes live.
//!
//! Configuration comes from the `LIFEOS_*` environment variables read by
//! [`SyncConfig::from_env`]; `--api-url` and `--token` (or `LIFEOS_TOKEN`)
//! override them.

use std::collections::BTreeMap;
use std::process;

use clap::{Parser, Subcommand};

use lifeos_core::{tree, MessageRole, NodeId, Outcome, TreeNode, TreeState};
use lifeos_sync::{SyncConfig, SyncError, SyncGateway};

/// Life OS knowledge tree client.
#[derive(Parser)]
#[command(name = "lifeos", about = "Life OS knowledge tree client")]
struct Cli {
    /// Backend base URL (overrides LIFEOS_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token.
    #[arg(long, env = "LIFEOS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tree as an outline.
    Tree {
        /// Expand every node, not only the roots.
        #[arg(short, long)]
        all: bool,
    },
    /// Show one node with its content.
    Show {
        id: String,
        /// Print the node as JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Create a node. Its kind follows from the parent.
    Create {
        label: String,
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },
    Rename { id: String, label: String },
    /// Delete a node and everything under it.
    Delete { id: String },
    /// Move a node under another parent (root level without --to).
    Move {
        id: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Stay connected and reprint the tree on every pushed change.
    Watch,
    /// Check that the backend is reachable.
    Health,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err.user_message());
            exit_code(&err)
        }
    };
    process::exit(code);
}

/// 0 = success, 1 = application or not-found error, 2 = authentication
/// failure, 3 = network or configuration error.
fn exit_code(err: &SyncError) -> i32 {
    match err {
        SyncError::Application { .. } | SyncError::NotFound(_) => 1,
        SyncError::AuthFailure(_) => 2,
        SyncError::Network(_)
        | SyncError::Config(_)
        | SyncError::InvalidResponse(_)
        | SyncError::Serialization(_) => 3,
    }
}

async fn run(cli: Cli) -> Result<(), SyncError> {
    let mut config = SyncConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        let derived = SyncConfig::for_api(api_url);
        config.api_url = derived.api_url;
        if std::env::var("LIFEOS_SOCKET_URL").is_err() {
            config.socket_url = derived.socket_url;
        }
    }

    let gateway = SyncGateway::new(config)?;
    if let Commands::Health = cli.command {
        println!("{}", gateway.rest().health().await?);
        return Ok(());
    }

    let token = cli
        .token
        .ok_or_else(|| SyncError::AuthFailure("no token (set LIFEOS_TOKEN or --token)".into()))?;
    gateway.session().set_token(Some(token.clone())).await;

    match cli.command {
        Commands::Tree { all } => {
            gateway.load_tree().await?;
            let state = gateway.store().snapshot();
            println!("{}", outline(&state, all));
        }
        Commands::Show { id, json } => {
            gateway.load_tree().await?;
            let id = NodeId::from(id);
            gateway.open_node(&id).await?;
            let node = gateway
                .store()
                .find_node(&id)
                .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                print_node(&gateway.store().snapshot(), &node);
            }
        }
        Commands::Create {
            label,
            parent,
            icon,
        } => {
            gateway.load_tree().await?;
            let draft = gateway.draft(parent.map(NodeId::from), &label, icon.as_deref());
            let id = draft.id.clone();
            applied(gateway.create_node(draft).await?)?;
            println!("{id}");
        }
        Commands::Rename { id, label } => {
            gateway.load_tree().await?;
            applied(gateway.rename_node(&NodeId::from(id), &label).await?)?;
        }
        Commands::Delete { id } => {
            gateway.load_tree().await?;
            applied(gateway.delete_node(&NodeId::from(id)).await?)?;
        }
        Commands::Move { id, to } => {
            gateway.load_tree().await?;
            applied(
                gateway
                    .move_node(&NodeId::from(id), to.map(NodeId::from))
                    .await?,
            )?;
        }
        Commands::Watch => watch(&gateway, &token).await?,
        Commands::Health => {}
    }
    Ok(())
}

/// Turns a local rejection of a server-accepted change into an error.
fn applied(outcome: Outcome) -> Result<(), SyncError> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Rejected(reason) => Err(reason.into()),
    }
}

async fn watch(gateway: &SyncGateway, token: &str) -> Result<(), SyncError> {
    let mut pump = gateway.connect(token).await?;
    gateway.load_tree().await?;

    let mut changes = gateway.store().subscribe();
    let mut notices = gateway.subscribe_notices();
    println!("{}", outline(&changes.borrow_and_update(), false));

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                if let Some(error) = &state.error {
                    eprintln!("server error: {error}");
                }
                println!("\n{}", outline(&state, false));
            }
            Ok(notice) = notices.recv() => {
                tracing::info!(?notice, "notice");
            }
            _ = &mut pump => {
                tracing::warn!("push channel closed");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    gateway.disconnect().await;
    Ok(())
}

fn outline(state: &TreeState, all: bool) -> String {
    if state.tree.is_empty() {
        return "(empty tree)".to_string();
    }
    if !all {
        return tree::render_outline(&state.tree, &state.expanded);
    }
    let expanded: BTreeMap<NodeId, bool> = tree::walk(&state.tree)
        .map(|node| (node.id.clone(), true))
        .collect();
    tree::render_outline(&state.tree, &expanded)
}

fn print_node(state: &TreeState, node: &TreeNode) {
    let path: Vec<String> = tree::ancestors(&state.tree, &node.id)
        .unwrap_or_default()
        .iter()
        .map(|n| n.label.clone())
        .collect();
    println!("{} {} [{}]", node.icon, node.label, node.id);
    println!("  kind:     {}", node.kind);
    println!("  path:     {}", path.join(" / "));
    if !node.date_modified.is_empty() {
        println!("  modified: {}", node.date_modified);
    }
    if let Some(summary) = &node.summary {
        println!("  summary:  {summary}");
    }
    if let Some(prompt) = &node.prompt {
        println!("  prompt:   {prompt}");
    }

    let messages = node.messages.as_deref().unwrap_or_default();
    if !messages.is_empty() {
        println!("\nmessages:");
        for message in messages {
            let role = match message.role {
                MessageRole::User => "you",
                MessageRole::Ai => "ai",
            };
            println!("  [{}] {}: {}", message.timestamp, role, message.text);
        }
    }

    let artifacts = node.artifacts.as_deref().unwrap_or_default();
    if !artifacts.is_empty() {
        println!("\nartifacts:");
        for artifact in artifacts {
            println!("  {} {}", artifact.name, artifact.url.as_deref().unwrap_or(""));
        }
    }

    let summaries = tree::summaries_under(node);
    if !summaries.is_empty() {
        println!("\nsummaries below:");
        for entry in summaries {
            println!("  {} ({}): {}", entry.label, entry.date_modified, entry.summary);
        }
    }
}
