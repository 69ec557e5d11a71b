//! Thin CLI surface over the `pmidx` library (spec. 1, 6): the dispatcher,
//! help text, and environment-variable handling are out of scope for the
//! core, so this binary only wires the verbs onto library calls.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use structopt::StructOpt;

use pmidx::{archive::Archive, index::IndexerConfig, query};

#[derive(Clone, StructOpt)]
pub struct Opt {
    #[structopt(subcommand)]
    subcmd: SubCommand,
}

#[derive(Clone, StructOpt)]
pub enum SubCommand {
    /// Stash each record read on stdin, keyed by the id found at `id_path`.
    Archive {
        #[structopt(long = "archive-root")]
        archive_root: PathBuf,
        #[structopt(long = "incr-root")]
        incr_root: PathBuf,
        #[structopt(long = "gzip")]
        gzip: bool,
    },
    /// Delete the ids read from stdin.
    Delete {
        #[structopt(long = "archive-root")]
        archive_root: PathBuf,
        #[structopt(long = "incr-root")]
        incr_root: PathBuf,
    },
    /// Stream records for the ids read from stdin.
    Fetch {
        #[structopt(long = "archive-root")]
        archive_root: PathBuf,
        #[structopt(long = "incr-root")]
        incr_root: PathBuf,
        /// Wrap the fetched records in `<ROOT>...</ROOT>`, one well-formed
        /// set document on stdout instead of raw concatenated bytes.
        #[structopt(long = "wrap")]
        wrap: Option<String>,
    },
    /// List ids absent from the archive, from the ids read on stdin.
    Missing {
        #[structopt(long = "archive-root")]
        archive_root: PathBuf,
        #[structopt(long = "incr-root")]
        incr_root: PathBuf,
    },
    /// Evaluate a Boolean/phrase/proximity query against a promoted index.
    Query {
        #[structopt(long = "base")]
        base: PathBuf,
        #[structopt(long = "expression")]
        expression: String,
    },
}

fn main() {
    let opt = Opt::from_iter(std::env::args_os());
    let result = match opt.subcmd {
        SubCommand::Archive { archive_root, incr_root, gzip } => {
            cmd_archive(&archive_root, &incr_root, gzip)
        }
        SubCommand::Delete { archive_root, incr_root } => cmd_delete(&archive_root, &incr_root),
        SubCommand::Fetch { archive_root, incr_root, wrap } => {
            cmd_fetch(&archive_root, &incr_root, wrap.as_deref())
        }
        SubCommand::Missing { archive_root, incr_root } => cmd_missing(&archive_root, &incr_root),
        SubCommand::Query { base, expression } => cmd_query(&base, &expression),
    };
    if let Err(err) = result {
        eprintln!("pmidx: {}", err);
        std::process::exit(1);
    }
}

fn read_ids() -> Vec<String> {
    io::stdin().lock().lines().map_while(Result::ok).filter(|l| !l.is_empty()).collect()
}

/// Expects `id` and record bytes on alternating lines. The real ingestion
/// path (partitioning a multi-gigabyte stream by pattern/id-path) is the
/// converter's job, out of scope here; this verb only demonstrates wiring
/// the archive onto a pre-split record source.
fn cmd_archive(archive_root: &PathBuf, incr_root: &PathBuf, gzip: bool) -> pmidx::Result<()> {
    let archive = Archive::new(archive_root, incr_root, gzip);
    let stdin = io::stdin();
    let mut id = String::new();
    for line in stdin.lock().lines().map_while(Result::ok) {
        if id.is_empty() {
            id = line;
            continue;
        }
        archive.stash(&id, line.as_bytes())?;
        id.clear();
    }
    Ok(())
}

fn cmd_delete(archive_root: &PathBuf, incr_root: &PathBuf) -> pmidx::Result<()> {
    let archive = Archive::new(archive_root, incr_root, false);
    for id in read_ids() {
        archive.delete(&id)?;
    }
    Ok(())
}

fn cmd_fetch(archive_root: &PathBuf, incr_root: &PathBuf, wrap: Option<&str>) -> pmidx::Result<()> {
    let archive = Archive::new(archive_root, incr_root, false);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match wrap {
        None => {
            for id in read_ids() {
                let bytes = archive.fetch(&id)?;
                out.write_all(&bytes)
                    .map_err(|e| pmidx::Error::IOError("stdout".to_string(), e.to_string()))?;
            }
        }
        Some(root) => {
            let mut fragments = Vec::new();
            for id in read_ids() {
                let bytes = archive.fetch(&id)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| pmidx::Error::DecodeFail("fetch".to_string(), e.to_string()))?;
                fragments.push(text);
            }
            let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
            let wrapped = pmidx::format::wrap_set(root, refs);
            out.write_all(wrapped.as_bytes())
                .map_err(|e| pmidx::Error::IOError("stdout".to_string(), e.to_string()))?;
        }
    }
    Ok(())
}

fn cmd_missing(archive_root: &PathBuf, incr_root: &PathBuf) -> pmidx::Result<()> {
    let archive = Archive::new(archive_root, incr_root, false);
    let ids = read_ids();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    for id in archive.missing(refs)? {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_query(base: &PathBuf, expression: &str) -> pmidx::Result<()> {
    let postings =
        query::FsPostings { root: base, config: IndexerConfig::default(), default_fields: Vec::new() };
    let ids = query::run(expression, &postings)?;
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}
