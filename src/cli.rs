//! Command-line surface.
//!
//! Argument parsing lives here so the binary stays a thin wrapper and the
//! parser can be tested. Listings go to stdout; diagnostics go through
//! `tracing` to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::hub::{HeadRef, HubStore, PipeId, PipeRef, Sha256Digest, TagName, TagState};
use crate::registry::Registry;
use crate::sync::{self, PushOptions, PushSource, TagEntry};

/// Pull, push and manage pipeline definitions in a local hub.
#[derive(Parser, Debug)]
#[command(name = "pipehub", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a pipe tag into the hub and check it out.
    Pull(PullArgs),

    /// Publish a pipe to the registry.
    Push(PushArgs),

    /// List, create or delete local tags.
    Tag(TagArgs),

    /// Check out another tag, or a blob by digest.
    Switch(SwitchArgs),

    /// Show the hub state of a pipe.
    Inspect(PipeArgs),

    /// Remove blobs no tag or HEAD references.
    Gc(PipeArgs),
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// `<owner>/<name>[:<tag>]`
    pub reference: PipeRef,

    /// Overwrite local changes.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// `<owner>/<name>[:<tag>]`
    pub reference: PipeRef,

    /// Tag to publish under; repeatable.
    #[arg(short, long = "tag")]
    pub tags: Vec<TagName>,

    /// Make the registry pipe public when it is created.
    #[arg(long)]
    pub public: bool,
}

#[derive(Args, Debug)]
pub struct TagArgs {
    /// `<owner>/<name>`
    pub pipe: PipeId,

    /// Tag to create or delete. Lists tags when omitted.
    pub tag: Option<TagName>,

    /// Delete the tag instead of creating it.
    #[arg(short, long, requires = "tag")]
    pub delete: bool,

    /// Replace an existing tag.
    #[arg(short, long, conflicts_with = "delete")]
    pub force: bool,

    /// Keep the tag as a directly editable file.
    #[arg(short, long, conflicts_with = "delete")]
    pub editable: bool,
}

#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// `<owner>/<name>`
    pub pipe: PipeId,

    /// Tag to make active.
    #[arg(required_unless_present = "detach", conflicts_with = "detach")]
    pub tag: Option<TagName>,

    /// Check out a blob digest directly.
    #[arg(long, value_name = "DIGEST")]
    pub detach: Option<Sha256Digest>,
}

#[derive(Args, Debug)]
pub struct PipeArgs {
    /// `<owner>/<name>`
    pub pipe: PipeId,
}

impl Cli {
    /// Default log directive for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Load settings and execute the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let store = HubStore::open(settings.store_config()).context("opening hub store")?;
    tracing::debug!(home = %settings.home.display(), "settings loaded");

    let connect = || -> Result<Box<dyn Registry>> { Ok(Box::new(settings.http_registry()?)) };
    let stdout = std::io::stdout();
    execute(cli.command, &store, &settings.files_dir(), connect, &mut stdout.lock())
}

/// Execute one command against a store.
///
/// The registry is only built for commands that need it.
pub fn execute<F>(
    command: Commands,
    store: &HubStore,
    files_dir: &Path,
    connect: F,
    out: &mut dyn Write,
) -> Result<()>
where
    F: FnOnce() -> Result<Box<dyn Registry>>,
{
    match command {
        Commands::Pull(args) => {
            let registry = connect()?;
            let outcome = sync::pull(store, registry.as_ref(), &args.reference, args.force)?;
            writeln!(
                out,
                "pulled {}:{} sha256:{} ({} bytes)",
                outcome.pipe,
                outcome.tag,
                outcome.digest.short(),
                outcome.size_bytes
            )?;
        }
        Commands::Push(args) => {
            let registry = connect()?;
            let options = PushOptions::new()
                .tags(args.tags)
                .local_files_dir(files_dir)
                .public(args.public);
            let outcome = sync::push(store, registry.as_ref(), &args.reference, &options)?;
            let source = match &outcome.source {
                PushSource::Tag(tag) => format!("tag {}", tag),
                PushSource::File(path) => path.display().to_string(),
            };
            let tags: Vec<&str> = outcome.tags.iter().map(TagName::as_str).collect();
            writeln!(
                out,
                "pushed {} [{}] sha256:{} from {}{}",
                outcome.pipe,
                tags.join(", "),
                outcome.digest.short(),
                source,
                if outcome.created { "" } else { " (unchanged)" }
            )?;
        }
        Commands::Tag(args) => match (args.tag, args.delete) {
            (None, _) => {
                let listing = sync::list_tags(store, &args.pipe)?;
                write_tag_table(out, &listing.tags)?;
                if let Some(digest) = listing.detached() {
                    writeln!(out, "HEAD detached at {}", digest.short())?;
                }
            }
            (Some(tag), true) => {
                sync::delete_tag(store, &args.pipe, &tag)?;
                writeln!(out, "deleted {}:{}", args.pipe, tag)?;
            }
            (Some(tag), false) => {
                let created = sync::create_tag(store, &args.pipe, &tag, args.force, args.editable)?;
                writeln!(
                    out,
                    "tagged {}:{} sha256:{} from {}",
                    args.pipe,
                    created.tag,
                    created.digest.short(),
                    created.source
                )?;
            }
        },
        Commands::Switch(args) => match (args.tag, args.detach) {
            (Some(tag), None) => {
                sync::switch_tag(store, &args.pipe, &tag)?;
                writeln!(out, "switched {} to {}", args.pipe, tag)?;
            }
            (None, Some(digest)) => {
                sync::detach_head(store, &args.pipe, &digest)?;
                writeln!(out, "HEAD of {} detached at {}", args.pipe, digest.short())?;
            }
            _ => bail!("give either a tag or --detach <digest>"),
        },
        Commands::Inspect(args) => {
            let report = sync::inspect(store, &args.pipe)?;
            writeln!(out, "pipe:     {}", report.pipe)?;
            writeln!(out, "path:     {}", report.root.display())?;
            let content = report
                .content_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(out, "content:  {}", content)?;
            let head = match &report.head {
                Some(HeadRef::Tag(tag)) if report.head_dangling => format!("{} (dangling)", tag),
                Some(HeadRef::Tag(tag)) => tag.to_string(),
                Some(HeadRef::Blob(digest)) => format!("detached at {}", digest.short()),
                None => "-".to_string(),
            };
            writeln!(out, "head:     {}", head)?;
            let active = match (&report.active_tag, &report.active_dangling) {
                (Some(tag), _) => tag.to_string(),
                (None, Some(name)) => format!("{} (dangling)", name),
                (None, None) => "-".to_string(),
            };
            writeln!(out, "active:   {}", active)?;
            writeln!(
                out,
                "blobs:    {} ({} bytes)",
                report.blobs.len(),
                report.total_blob_bytes()
            )?;
            writeln!(out)?;
            write_tag_table(out, &report.tags)?;
            for entry in &report.tags {
                writeln!(
                    out,
                    "  {}: created {}, pulled {}",
                    entry.tag,
                    timestamp(entry.record.created_at),
                    timestamp(entry.record.pulled_at)
                )?;
            }
        }
        Commands::Gc(args) => {
            let summary = sync::collect_garbage(store, &args.pipe)?;
            writeln!(
                out,
                "scanned {} blobs, removed {}, failed {}",
                summary.scanned,
                summary.removed_count(),
                summary.failed
            )?;
        }
    }
    Ok(())
}

fn write_tag_table(out: &mut dyn Write, tags: &[TagEntry]) -> std::io::Result<()> {
    writeln!(
        out,
        "  {:<20} {:<9} {:<12} {:>8}  {}",
        "TAG", "KIND", "DIGEST", "SIZE", "STATE"
    )?;
    for entry in tags {
        let marker = if entry.is_active { '*' } else { ' ' };
        let kind = entry.pointer.as_ref().map(|p| p.kind_label()).unwrap_or("none");
        let head = if entry.is_head { " (HEAD)" } else { "" };
        writeln!(
            out,
            "{} {:<20} {:<9} {:<12} {:>8}  {}{}",
            marker,
            entry.tag,
            kind,
            entry.record.primary_digest.short(),
            entry.record.size_bytes,
            state_label(&entry.state),
            head
        )?;
    }
    Ok(())
}

fn state_label(state: &TagState) -> &'static str {
    match state {
        TagState::Clean => "clean",
        TagState::Dirty { .. } => "modified",
        TagState::Missing => "missing",
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::StoreConfig;
    use crate::registry::MemoryRegistry;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn cli_parse_pull() {
        let cli = Cli::try_parse_from(["pipehub", "pull", "alice/deploy:v2", "--force"]).unwrap();
        if let Commands::Pull(args) = cli.command {
            assert_eq!(args.reference.pipe, PipeId::new("alice", "deploy").unwrap());
            assert_eq!(args.reference.tag, Some(TagName::new("v2").unwrap()));
            assert!(args.force);
        } else {
            panic!("expected pull");
        }
    }

    #[test]
    fn cli_parse_pull_requires_owner() {
        assert!(Cli::try_parse_from(["pipehub", "pull", "deploy"]).is_err());
        assert!(Cli::try_parse_from(["pipehub", "pull", "alice/../etc"]).is_err());
    }

    #[test]
    fn cli_parse_push_tags() {
        let cli =
            Cli::try_parse_from(["pipehub", "push", "alice/deploy", "-t", "v1", "--tag", "stable"])
                .unwrap();
        if let Commands::Push(args) = cli.command {
            assert_eq!(
                args.tags,
                vec![TagName::new("v1").unwrap(), TagName::new("stable").unwrap()]
            );
            assert!(args.reference.tag.is_none());
            assert!(!args.public);
        } else {
            panic!("expected push");
        }
    }

    #[test]
    fn cli_parse_tag_variants() {
        let cli = Cli::try_parse_from(["pipehub", "tag", "alice/deploy"]).unwrap();
        if let Commands::Tag(args) = cli.command {
            assert!(args.tag.is_none());
        }

        let cli = Cli::try_parse_from(["pipehub", "tag", "alice/deploy", "dev", "--editable"])
            .unwrap();
        if let Commands::Tag(args) = cli.command {
            assert!(args.editable);
            assert!(!args.delete);
        }

        assert!(Cli::try_parse_from(["pipehub", "tag", "alice/deploy", "--delete"]).is_err());
        assert!(
            Cli::try_parse_from(["pipehub", "tag", "alice/deploy", "v1", "-d", "--force"]).is_err()
        );
    }

    #[test]
    fn cli_parse_switch() {
        assert!(Cli::try_parse_from(["pipehub", "switch", "alice/deploy"]).is_err());

        let digest = crate::hub::sha256(b"echo hi");
        let detach = digest.prefixed();
        let cli = Cli::try_parse_from(["pipehub", "switch", "alice/deploy", "--detach", &detach])
            .unwrap();
        if let Commands::Switch(args) = cli.command {
            assert_eq!(args.detach, Some(digest));
            assert!(args.tag.is_none());
        }
    }

    #[test]
    fn cli_log_levels() {
        let cli = Cli::try_parse_from(["pipehub", "gc", "alice/deploy"]).unwrap();
        assert_eq!(cli.log_level(), "info");
        let cli = Cli::try_parse_from(["pipehub", "-vv", "gc", "alice/deploy"]).unwrap();
        assert_eq!(cli.log_level(), "trace");
        let cli = Cli::try_parse_from(["pipehub", "gc", "alice/deploy", "-q"]).unwrap();
        assert_eq!(cli.log_level(), "warn");
    }

    fn exec(
        args: &[&str],
        store: &HubStore,
        files: &Path,
        registry: &Arc<MemoryRegistry>,
    ) -> Result<String> {
        let mut argv = vec!["pipehub"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        let registry = Arc::clone(registry);
        let mut out = Vec::new();
        execute(
            cli.command,
            store,
            files,
            move || Ok(Box::new(registry) as Box<dyn Registry>),
            &mut out,
        )?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn cli_end_to_end_with_memory_registry() {
        let dir = TempDir::new().unwrap();
        let store = HubStore::open(StoreConfig::new(dir.path().join("hub"))).unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir_all(&files).unwrap();
        std::fs::write(files.join("deploy.yaml"), b"echo hi").unwrap();
        let registry = Arc::new(MemoryRegistry::new());

        let out = exec(&["push", "alice/deploy"], &store, &files, &registry).unwrap();
        assert!(out.starts_with("pushed alice/deploy [latest]"));

        let out = exec(&["pull", "alice/deploy"], &store, &files, &registry).unwrap();
        assert!(out.starts_with("pulled alice/deploy:latest"));

        exec(&["tag", "alice/deploy", "stable"], &store, &files, &registry).unwrap();
        let out = exec(&["tag", "alice/deploy"], &store, &files, &registry).unwrap();
        assert!(out.contains("* latest"));
        assert!(out.contains("stable"));
        assert!(out.contains("(HEAD)"));

        exec(&["switch", "alice/deploy", "stable"], &store, &files, &registry).unwrap();
        let out = exec(&["inspect", "alice/deploy"], &store, &files, &registry).unwrap();
        assert!(out.contains("active:   stable"));

        let out = exec(&["gc", "alice/deploy"], &store, &files, &registry).unwrap();
        assert!(out.contains("removed 0"));

        let err = exec(&["tag", "alice/deploy", "stable"], &store, &files, &registry).unwrap_err();
        assert!(err.to_string().contains("--force"));
    }
}
