mod shell;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use karyfs_core::{logging, snapshot, FileSystemTree, Limits};
use karyfs_core::{DEFAULT_MAX_CHILDREN, DEFAULT_MAX_DISK_SIZE};
use shell::{Flow, Shell};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "karyfs", about = "Shell over a simulated K-ary drive")]
struct Args {
    /// Children allowed per directory
    #[arg(long, default_value_t = DEFAULT_MAX_CHILDREN)]
    max_children: usize,
    /// Disk quota in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_DISK_SIZE)]
    max_disk_size: u64,
    /// Let the trash hold any number of entries
    #[arg(long)]
    exempt_trash: bool,
    /// Snapshot loaded at start when it exists, and written on exit
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(&args.log);

    let tree = match &args.snapshot {
        Some(path) if path.exists() => {
            let tree = snapshot::load_from_path(path)?;
            info!(limits = ?tree.limits(), "limits taken from snapshot");
            tree
        }
        _ => FileSystemTree::new(
            Limits::new(args.max_children, args.max_disk_size).with_exempt_trash(args.exempt_trash),
        )?,
    };

    let mut shell = Shell::new(tree, args.snapshot);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        eprint!("{}", shell.prompt());
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            shell.finish()?;
            break;
        }
        match shell.execute(&line, &mut stdout) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("error: {e:#}"),
        }
        stdout.flush()?;
    }
    Ok(())
}
