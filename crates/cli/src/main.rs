//! HankoSign CLI - Main entry point

use clap::{Args, Parser, Subcommand};
use hankosign_catalog::ActionFlags;
use hankosign_cli::{commands, AppContext};
use hankosign_core::TargetRef;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hankosign")]
#[command(about = "HankoSign - Workflow attestation engine", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and generate a service secret
    Init,

    /// Generate a new service secret
    Keygen {
        /// Optional output file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Manage actions and policies
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Manage signatories
    #[command(subcommand)]
    Signatory(SignatoryCommand),

    /// Check whether a principal may perform an action
    CanAct {
        /// Principal ID
        principal: String,
        /// Action code (VERB:STAGE@app.model)
        action: String,
        /// Target (type#id)
        target: TargetRef,
    },

    /// Record a signature
    Sign {
        /// Principal ID
        principal: String,
        /// Action code (VERB:STAGE@app.model)
        action: String,
        /// Target (type#id)
        target: TargetRef,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Record a signature at most once per request ID
    SignOnce {
        /// Principal ID
        principal: String,
        /// Action code (VERB:STAGE@app.model)
        action: String,
        /// Target (type#id)
        target: TargetRef,
        /// Idempotency request ID (generated if omitted)
        #[arg(long)]
        request_id: Option<String>,
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show the derived workflow state of a target
    Snapshot {
        /// Target (type#id)
        target: TargetRef,
    },

    /// Show the status of a target
    Status {
        /// Target (type#id)
        target: TargetRef,
        /// Stage whose approval means final
        #[arg(long)]
        final_stage: Option<String>,
        /// Stage whose approval means first-tier approved
        #[arg(long)]
        tier1_stage: Option<String>,
    },

    /// Show the signature box of a target
    Seals {
        /// Target (type#id)
        target: TargetRef,
    },

    /// Recompute attestation digests
    Audit {
        /// Limit to one target (type#id)
        target: Option<TargetRef>,
    },
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Define a new action
    Define {
        /// Action code (VERB:STAGE@app.model, '-' for no stage)
        code: String,
        /// Allow several signatures per target/verb/stage
        #[arg(long)]
        repeatable: bool,
        /// Require a signer who has not signed anything else on the target
        #[arg(long)]
        distinct_signer: bool,
        /// Human label
        #[arg(long, default_value = "")]
        label: String,
        /// Help text
        #[arg(long)]
        comment: Option<String>,
    },

    /// Grant actions to a role
    Grant {
        /// Role name
        role: String,
        /// Action codes
        #[arg(required = true)]
        actions: Vec<String>,
        /// Policy notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Synchronize a JSON manifest into the catalog
    Sync {
        /// Manifest path
        manifest: PathBuf,
        /// Report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// List actions and policies
    List,
}

#[derive(Subcommand)]
enum SignatoryCommand {
    /// Enroll a principal/role as an unverified signatory
    Enroll {
        /// Principal ID
        principal: String,
        /// Role name
        role: String,
        /// Display name printed on seals
        #[arg(long)]
        name: String,
    },

    /// Mark a signatory verified
    Verify {
        /// Signatory ID
        id: i64,
        /// Revoke verification instead
        #[arg(long)]
        revoke: bool,
    },

    /// Deactivate a signatory
    Deactivate {
        /// Signatory ID
        id: i64,
    },

    /// List signatories
    List,
}

#[derive(Args)]
struct RequestArgs {
    /// Free-text note
    #[arg(long)]
    note: Option<String>,
    /// JSON payload
    #[arg(long)]
    payload: Option<String>,
    /// Direct peer address
    #[arg(long)]
    remote_addr: Option<String>,
    /// Raw X-Forwarded-For header
    #[arg(long)]
    forwarded_for: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Create application context
    let mut ctx = AppContext::new(&cli.data)?;

    match cli.command {
        Commands::Init => {
            commands::init(&mut ctx)?;
        }

        Commands::Keygen { output } => {
            commands::keygen(output.as_deref())?;
        }

        Commands::Catalog(command) => match command {
            CatalogCommand::Define {
                code,
                repeatable,
                distinct_signer,
                label,
                comment,
            } => {
                let flags = ActionFlags {
                    repeatable,
                    require_distinct_signer: distinct_signer,
                };
                commands::define_action(&mut ctx, &code, flags, &label, comment.as_deref())?;
            }
            CatalogCommand::Grant { role, actions, notes } => {
                commands::grant(&mut ctx, &role, &actions, &notes)?;
            }
            CatalogCommand::Sync { manifest, dry_run } => {
                commands::sync(&mut ctx, &manifest, dry_run)?;
            }
            CatalogCommand::List => {
                commands::list_catalog(&ctx)?;
            }
        },

        Commands::Signatory(command) => match command {
            SignatoryCommand::Enroll { principal, role, name } => {
                commands::enroll(&ctx, &principal, &role, &name)?;
            }
            SignatoryCommand::Verify { id, revoke } => {
                commands::verify(&ctx, id, !revoke)?;
            }
            SignatoryCommand::Deactivate { id } => {
                commands::deactivate(&ctx, id)?;
            }
            SignatoryCommand::List => {
                commands::list_signatories(&ctx)?;
            }
        },

        Commands::CanAct {
            principal,
            action,
            target,
        } => {
            commands::can_act(&ctx, &principal, &action, &target)?;
        }

        Commands::Sign {
            principal,
            action,
            target,
            request,
        } => {
            let request = commands::sign_request(
                request.note,
                request.payload.as_deref(),
                request.remote_addr,
                request.forwarded_for,
            )?;
            commands::sign(&ctx, &principal, &action, &target, request)?;
        }

        Commands::SignOnce {
            principal,
            action,
            target,
            request_id,
            request,
        } => {
            let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let request = commands::sign_request(
                request.note,
                request.payload.as_deref(),
                request.remote_addr,
                request.forwarded_for,
            )?;
            commands::sign_once(&ctx, &principal, &action, &target, &request_id, request)?;
        }

        Commands::Snapshot { target } => {
            commands::snapshot(&ctx, &target)?;
        }

        Commands::Status {
            target,
            final_stage,
            tier1_stage,
        } => {
            commands::status(&ctx, &target, final_stage.as_deref(), tier1_stage.as_deref())?;
        }

        Commands::Seals { target } => {
            commands::seals(&ctx, &target)?;
        }

        Commands::Audit { target } => {
            commands::audit(&ctx, target.as_ref())?;
        }
    }

    Ok(())
}
