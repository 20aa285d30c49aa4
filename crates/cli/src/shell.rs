use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use karyfs_core::human::{human_bytes, usage_line};
use karyfs_core::{export, snapshot, Content, EntryKind, FileSystemTree, NodeId};
use tracing::info;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a directory
    Mkdir { name: String },
    /// Create a file of SIZE bytes with no content
    Touch { name: String, size: u64 },
    /// Create a text file; its size is the text length
    Write {
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Replace the text of an existing file
    Edit {
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Print a file's content
    Cat { name: String },
    /// List the current directory
    Ls,
    /// Enter a directory, or `..` for the parent
    Cd { name: String },
    /// Show metadata of a child of the current directory
    Stat { name: String },
    /// Move to the trash, or delete for good with -p
    Rm {
        #[arg(short, long)]
        permanent: bool,
        name: String,
    },
    /// List the trash
    Trash,
    /// Bring a node back from the trash
    Restore { name: String, target: Option<String> },
    /// Discard everything in the trash, or only the given names
    EmptyTrash { names: Vec<String> },
    /// Remember a node (name or path) for `paste`
    Copy { name: String },
    /// Paste the remembered node here or into TARGET
    Paste { target: Option<String> },
    /// Case-insensitive name search from the root
    Find { query: String },
    /// Fuzzy name search from the root, best match first
    Fuzzy { query: String },
    /// Print the current path
    Pwd,
    /// Show disk usage
    Df,
    /// Dump the tree as CSV
    ExportCsv,
    /// Dump the tree as JSON
    ExportJson,
    /// Write a snapshot (defaults to --snapshot)
    Save { path: Option<PathBuf> },
    /// Replace the tree with a snapshot
    Load { path: PathBuf },
    /// Leave, saving to --snapshot if set
    #[command(alias = "quit")]
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    pub tree: FileSystemTree,
    clipboard: Option<NodeId>,
    snapshot: Option<PathBuf>,
}

impl Shell {
    pub fn new(tree: FileSystemTree, snapshot: Option<PathBuf>) -> Self {
        Self {
            tree,
            clipboard: None,
            snapshot,
        }
    }

    pub fn prompt(&self) -> String {
        format!("{}{}> ", karyfs_core::ROOT_NAME, self.tree.cwd_path())
    }

    /// Runs one input line. Blank lines do nothing.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> anyhow::Result<Flow> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(Flow::Continue);
        }
        let parsed = match Line::try_parse_from(words) {
            Ok(l) => l,
            Err(e) if !e.use_stderr() => {
                // help output
                write!(out, "{e}")?;
                return Ok(Flow::Continue);
            }
            Err(e) => bail!("{}", e.render().to_string().trim_end()),
        };
        self.run(parsed.cmd, out)
    }

    fn run(&mut self, cmd: Cmd, out: &mut impl Write) -> anyhow::Result<Flow> {
        let tree = &mut self.tree;
        match cmd {
            Cmd::Mkdir { name } => {
                tree.mkdir(&name)?;
            }
            Cmd::Touch { name, size } => {
                tree.touch(&name, size, None)?;
            }
            Cmd::Write { name, text } => {
                tree.touch_with(&name, text.join(" "))?;
            }
            Cmd::Edit { name, text } => {
                tree.edit(&name, text.join(" "))?;
            }
            Cmd::Cat { name } => match tree.cat(&name)? {
                Some(Content::Text(t)) => writeln!(out, "{t}")?,
                Some(Content::Bytes(b)) => writeln!(out, "<{} bytes of binary data>", b.len())?,
                None => writeln!(out, "<no content>")?,
            },
            Cmd::Ls => {
                for name in tree.ls() {
                    let id = tree.resolve_path(&name)?;
                    let is_dir = tree.node(id).is_some_and(|n| n.is_dir());
                    writeln!(out, "{name}{}", if is_dir { "/" } else { "" })?;
                }
            }
            Cmd::Cd { name } => tree.cd(&name)?,
            Cmd::Stat { name } => {
                let st = tree.stat(&name)?;
                writeln!(out, "name:     {}", st.name)?;
                writeln!(out, "path:     {}", st.path)?;
                writeln!(
                    out,
                    "kind:     {}",
                    match st.kind {
                        EntryKind::File => "file",
                        EntryKind::Dir => "dir",
                    }
                )?;
                writeln!(out, "size:     {} ({} bytes)", human_bytes(st.size), st.size)?;
                writeln!(out, "created:  {}", st.created.to_rfc3339())?;
                writeln!(out, "modified: {}", st.modified.to_rfc3339())?;
                writeln!(out, "accessed: {}", st.accessed.to_rfc3339())?;
                if st.kind == EntryKind::Dir {
                    writeln!(out, "children: {}", st.children.join(", "))?;
                }
            }
            Cmd::Rm { permanent, name } => tree.rm(&name, !permanent)?,
            Cmd::Trash => {
                for name in tree.ls_trash() {
                    writeln!(out, "{name}")?;
                }
            }
            Cmd::Restore { name, target } => {
                let target = target.map(|t| tree.resolve_path(&t)).transpose()?;
                let id = tree.restore(&name, target)?;
                writeln!(out, "restored to {}", tree.path_of(id)?)?;
            }
            Cmd::EmptyTrash { names } => {
                let freed = if names.is_empty() {
                    tree.empty_trash(None)?
                } else {
                    tree.empty_trash(Some(&names))?
                };
                writeln!(out, "freed {}", human_bytes(freed))?;
            }
            Cmd::Copy { name } => {
                let id = tree.resolve_path(&name)?;
                self.clipboard = Some(id);
                writeln!(out, "copied '{name}'; use paste in the destination")?;
            }
            Cmd::Paste { target } => {
                let Some(src) = self.clipboard else {
                    bail!("nothing to paste");
                };
                let target = target.map(|t| tree.resolve_path(&t)).transpose()?;
                let id = tree.copy_node(src, target)?;
                writeln!(out, "pasted {}", tree.path_of(id)?)?;
            }
            Cmd::Find { query } => {
                for hit in tree.search(&query, None)? {
                    writeln!(out, "{}", hit.path)?;
                }
            }
            Cmd::Fuzzy { query } => {
                for hit in tree.fuzzy_search(&query, None)? {
                    writeln!(out, "{}", hit.path)?;
                }
            }
            Cmd::Pwd => writeln!(out, "{}", tree.cwd_path())?,
            Cmd::Df => {
                let limits = tree.limits();
                writeln!(out, "{}", usage_line(tree.get_disk_usage(), limits.max_disk_size))?;
            }
            Cmd::ExportCsv => export::to_csv(tree, &mut *out)?,
            Cmd::ExportJson => {
                writeln!(out, "{}", serde_json::to_string_pretty(&export::to_json(tree))?)?;
            }
            Cmd::Save { path } => {
                let Some(path) = path.or_else(|| self.snapshot.clone()) else {
                    bail!("no snapshot path given");
                };
                snapshot::save_to_path(tree, &path)?;
                writeln!(out, "saved {}", path.display())?;
            }
            Cmd::Load { path } => {
                *tree = snapshot::load_from_path(&path)
                    .with_context(|| format!("loading {}", path.display()))?;
                self.clipboard = None;
                writeln!(out, "loaded {}", path.display())?;
            }
            Cmd::Exit => {
                self.finish()?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Writes the snapshot file, if one was configured.
    pub fn finish(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.snapshot {
            snapshot::save_to_path(&self.tree, path)
                .with_context(|| format!("saving {}", path.display()))?;
            info!(path = %path.display(), "saved on exit");
        }
        Ok(())
    }
}

/// Splits on whitespace; double quotes group words and `\"` escapes a quote.
fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut cur));
                    in_word = false;
                }
            }
            c => {
                cur.push(c);
                in_word = true;
            }
        }
    }
    if quoted {
        bail!("unterminated quote");
    }
    if in_word {
        words.push(cur);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use karyfs_core::Limits;

    fn shell() -> Shell {
        Shell::new(FileSystemTree::new(Limits::new(5, 1000)).unwrap(), None)
    }

    fn run(sh: &mut Shell, line: &str) -> String {
        let mut out = Vec::new();
        sh.execute(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn splits_quoted_words() {
        assert_eq!(
            split_words(r#"write "my notes" hello   world"#).unwrap(),
            vec!["write", "my notes", "hello", "world"]
        );
        assert_eq!(split_words(r#"cd """#).unwrap(), vec!["cd", ""]);
        assert_eq!(split_words(r#"x "a \"b\"""#).unwrap(), vec!["x", r#"a "b""#]);
        assert!(split_words(r#"cd "oops"#).is_err());
        assert!(split_words("   ").unwrap().is_empty());
    }

    #[test]
    fn basic_session() {
        let mut sh = shell();
        run(&mut sh, "mkdir docs");
        run(&mut sh, "cd docs");
        run(&mut sh, r#"write "read me" hello there"#);
        assert_eq!(run(&mut sh, "pwd"), "/docs\n");
        assert_eq!(run(&mut sh, "ls"), "read me\n");
        assert_eq!(run(&mut sh, r#"cat "read me""#), "hello there\n");
        assert_eq!(sh.prompt(), "C:/docs> ");
        assert_eq!(sh.tree.get_disk_usage(), 11);
        run(&mut sh, "cd ..");
        assert_eq!(run(&mut sh, "ls"), ".trash/\ndocs/\n");
    }

    #[test]
    fn trash_and_restore() {
        let mut sh = shell();
        run(&mut sh, "touch f 50");
        run(&mut sh, "rm f");
        run(&mut sh, "touch f 20");
        assert_eq!(run(&mut sh, "trash"), "f\n");
        assert_eq!(run(&mut sh, "restore f"), "restored to /f_1\n");
        run(&mut sh, "rm -p f_1");
        assert_eq!(sh.tree.get_disk_usage(), 20);
    }

    #[test]
    fn copy_paste_into_other_dir() {
        let mut sh = shell();
        run(&mut sh, "mkdir dest");
        run(&mut sh, "touch f 5");
        run(&mut sh, "copy f");
        assert_eq!(run(&mut sh, "paste"), "pasted /f - Copy\n");
        assert_eq!(run(&mut sh, "paste dest"), "pasted /dest/f\n");
        assert_eq!(sh.tree.get_disk_usage(), 15);
    }

    #[test]
    fn errors_are_reported_not_fatal() {
        let mut sh = shell();
        let mut out = Vec::new();
        run(&mut sh, "touch a 600");
        let err = sh.execute("touch b 500", &mut out).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(sh.execute("paste", &mut out).is_err());
        assert!(sh.execute("frobnicate", &mut out).is_err());
        assert!(sh.execute("touch x notanumber", &mut out).is_err());
        assert_eq!(sh.execute("ls", &mut out).unwrap(), Flow::Continue);
    }

    #[test]
    fn help_is_printed() {
        let mut sh = shell();
        let text = run(&mut sh, "help");
        assert!(text.contains("mkdir"));
        assert!(text.contains("empty-trash"));
    }

    #[test]
    fn find_and_df() {
        let mut sh = shell();
        run(&mut sh, "mkdir Music");
        run(&mut sh, "cd Music");
        run(&mut sh, "touch song.mp3 512");
        assert_eq!(run(&mut sh, "find SONG"), "/Music/song.mp3\n");
        assert!(run(&mut sh, "df").contains("51.2%"));
    }

    #[test]
    fn save_load_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.json");
        let mut sh = Shell::new(
            FileSystemTree::new(Limits::new(5, 1000)).unwrap(),
            Some(path.clone()),
        );
        run(&mut sh, "touch keep 7");
        let mut out = Vec::new();
        assert_eq!(sh.execute("exit", &mut out).unwrap(), Flow::Exit);

        let mut other = shell();
        run(&mut other, &format!(r#"load "{}""#, path.display()));
        assert_eq!(other.tree.get_disk_usage(), 7);
        assert_eq!(other.tree.ls(), vec![".trash", "keep"]);
    }
}
