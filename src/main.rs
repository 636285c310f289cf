//! bootgit CLI - git-compatible plumbing over the bootgit core

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::TimeZone;
use clap::{Parser, Subcommand};

use bootgit::ops::{
    add, checkout, commit, create_tag, list_tags, log_dot, ls_tree, rm, status,
};
use bootgit::{
    check_ignore, find_object, list_refs, read_ignore_rules, read_index, require_object,
    user_identity, Error, Object, ObjectKind, Repository, MODE_GITLINK, MODE_REGULAR,
    MODE_SYMLINK,
};

#[derive(Parser)]
#[command(name = "bootgit")]
#[command(about = "content-addressed version control, git-compatible on disk")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// create an empty repository
    Init {
        /// where to create it
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// print an object's payload
    CatFile {
        /// expected object type
        #[arg(value_name = "TYPE")]
        object_type: String,

        /// name of the object to show
        object: String,
    },

    /// compute an object id, optionally storing the object
    HashObject {
        /// object type
        #[arg(short = 't', long = "type", default_value = "blob", value_name = "TYPE")]
        object_type: String,

        /// actually write the object into the store
        #[arg(short, long)]
        write: bool,

        /// file to hash
        path: PathBuf,
    },

    /// render commit ancestry as a graphviz digraph
    Log {
        /// commit to start at
        #[arg(default_value = "HEAD")]
        commit: String,
    },

    /// list a tree object
    LsTree {
        /// recurse into subtrees
        #[arg(short, long)]
        recursive: bool,

        /// tree-ish to list
        tree: String,
    },

    /// materialize a commit's tree into an empty directory
    Checkout {
        /// commit or tree to materialize
        commit: String,

        /// destination directory (created or empty)
        path: PathBuf,
    },

    /// list references with their resolved ids
    ShowRef,

    /// list tags, or create one
    Tag {
        /// create an annotated tag object
        #[arg(short = 'a')]
        annotate: bool,

        /// tag name; without it, existing tags are listed
        name: Option<String>,

        /// what the tag points at
        #[arg(default_value = "HEAD")]
        object: String,
    },

    /// resolve a name to an object id
    RevParse {
        /// follow to an object of this type
        #[arg(long = "bootgit-type", value_name = "TYPE")]
        object_type: Option<String>,

        /// name to resolve
        name: String,
    },

    /// list staging index entries
    LsFiles {
        /// show entry details
        #[arg(long)]
        verbose: bool,
    },

    /// print the given paths that the ignore rules match
    CheckIgnore {
        #[arg(required = true)]
        path: Vec<String>,
    },

    /// summarize branch, staged and unstaged changes
    Status,

    /// remove paths from the index and the worktree
    Rm {
        #[arg(required = true)]
        path: Vec<PathBuf>,
    },

    /// stage paths for the next commit
    Add {
        #[arg(required = true)]
        path: Vec<PathBuf>,
    },

    /// record the staged tree as a new commit
    Commit {
        /// commit message
        #[arg(short, long)]
        message: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> bootgit::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let repo = Repository::create(&path)?;
            println!(
                "Initialized empty repository in {}",
                repo.gitdir().display()
            );
        }

        Commands::CatFile {
            object_type,
            object,
        } => {
            let repo = Repository::find(Path::new("."))?;
            let kind: ObjectKind = object_type.parse()?;
            let oid = require_object(&repo, &object, kind)?;
            let obj = bootgit::read_object(&repo, &oid)?;
            io::stdout()
                .write_all(&obj.payload())
                .map_err(|source| Error::Io {
                    path: "stdout".into(),
                    source,
                })?;
        }

        Commands::HashObject {
            object_type,
            write,
            path,
        } => {
            let kind: ObjectKind = object_type.parse()?;
            let data = std::fs::read(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            let obj = Object::from_payload(kind, data)?;

            let oid = if write {
                let repo = Repository::find(Path::new("."))?;
                bootgit::write_object(&repo, &obj)?
            } else {
                obj.id()
            };
            println!("{}", oid);
        }

        Commands::Log { commit } => {
            let repo = Repository::find(Path::new("."))?;
            print!("{}", log_dot(&repo, &commit)?);
        }

        Commands::LsTree { recursive, tree } => {
            let repo = Repository::find(Path::new("."))?;
            for line in ls_tree(&repo, &tree, recursive)? {
                println!("{}", line);
            }
        }

        Commands::Checkout { commit, path } => {
            let repo = Repository::find(Path::new("."))?;
            checkout(&repo, &commit, &path)?;
        }

        Commands::ShowRef => {
            let repo = Repository::find(Path::new("."))?;
            for (name, oid) in list_refs(&repo)? {
                println!("{} {}", oid, name);
            }
        }

        Commands::Tag {
            annotate,
            name,
            object,
        } => {
            let repo = Repository::find(Path::new("."))?;
            match name {
                Some(name) => {
                    let identity = user_identity().ok();
                    create_tag(&repo, &name, &object, annotate, identity.as_ref())?;
                }
                None => {
                    for tag in list_tags(&repo)? {
                        println!("{}", tag);
                    }
                }
            }
        }

        Commands::RevParse { object_type, name } => {
            let repo = Repository::find(Path::new("."))?;
            let kind = object_type
                .as_deref()
                .map(str::parse::<ObjectKind>)
                .transpose()?;
            match find_object(&repo, &name, kind, true)? {
                Some(oid) => println!("{}", oid),
                None => {
                    return Err(Error::WrongType {
                        name,
                        expected: kind.map(|k| k.as_str()).unwrap_or("object"),
                    })
                }
            }
        }

        Commands::LsFiles { verbose } => {
            let repo = Repository::find(Path::new("."))?;
            let index = read_index(&repo)?;
            if verbose {
                println!(
                    "Index file format v2, containing {} entries.",
                    index.entries.len()
                );
            }
            for entry in &index.entries {
                println!("{}", entry.name);
                if verbose {
                    let entry_type = match entry.mode_type {
                        MODE_REGULAR => "regular file",
                        MODE_SYMLINK => "symlink",
                        MODE_GITLINK => "git link",
                        _ => "unknown",
                    };
                    println!("  {} with perms: {:o}", entry_type, entry.mode_perms);
                    println!("  on blob: {}", entry.sha);
                    println!(
                        "  created: {}.{:09}, modified: {}.{:09}",
                        local_time(entry.ctime.0),
                        entry.ctime.1,
                        local_time(entry.mtime.0),
                        entry.mtime.1
                    );
                    println!("  device: {}, inode: {}", entry.dev, entry.ino);
                    println!("  user: {}, group: {}", entry.uid, entry.gid);
                    println!(
                        "  flags: stage={} assume_valid={}",
                        entry.flag_stage, entry.flag_assume_valid
                    );
                }
            }
        }

        Commands::CheckIgnore { path } => {
            let repo = Repository::find(Path::new("."))?;
            let rules = read_ignore_rules(&repo)?;
            for path in path {
                if check_ignore(&rules, &path)? {
                    println!("{}", path);
                }
            }
        }

        Commands::Status => {
            let repo = Repository::find(Path::new("."))?;
            let st = status(&repo)?;

            if let Some(branch) = &st.branch {
                println!("On branch {}.", branch);
            } else if let Some(head) = &st.head {
                println!("HEAD detached at {}", head);
            } else {
                println!("Not currently on any branch.");
            }

            println!("Changes to be committed:");
            for (name, kind) in &st.staged {
                println!("  {} {}", kind.as_str(), name);
            }
            println!();
            println!("Changes not staged for commit:");
            for (name, kind) in &st.unstaged {
                println!("  {} {}", kind.as_str(), name);
            }
            println!();
            println!("Untracked files:");
            for name in &st.untracked {
                println!("  {}", name);
            }
        }

        Commands::Rm { path } => {
            let repo = Repository::find(Path::new("."))?;
            rm(&repo, &path, true, false)?;
        }

        Commands::Add { path } => {
            let repo = Repository::find(Path::new("."))?;
            add(&repo, &path)?;
        }

        Commands::Commit { message } => {
            let repo = Repository::find(Path::new("."))?;
            let identity = user_identity()?;
            let oid = commit(&repo, &message, &identity)?;
            println!("{}", oid);
        }
    }

    Ok(())
}

fn local_time(secs: u32) -> String {
    match chrono::Local.timestamp_opt(i64::from(secs), 0).single() {
        Some(stamp) => stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => secs.to_string(),
    }
}
