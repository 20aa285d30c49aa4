use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::arena::Arena;
use crate::error::{FsError, FsResult};
use crate::model::{NodeId, SearchHit};

fn check_query(query: &str) -> FsResult<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(FsError::InvalidArgument("search query is empty".into()));
    }
    Ok(query)
}

/// Pre-order walk from `from`, keeping nodes whose name contains `query`
/// ignoring case. The starting node is a candidate too.
pub fn substring(arena: &Arena, from: NodeId, query: &str) -> FsResult<Vec<SearchHit>> {
    let needle = check_query(query)?.to_lowercase();
    let mut hits = Vec::new();
    walk(arena, from, |id, path| {
        if arena[id].name.to_lowercase().contains(&needle) {
            hits.push(SearchHit { id, path: path.to_string() });
        }
    });
    Ok(hits)
}

/// Same walk, scored with the skim matcher and sorted best first.
/// Ties keep traversal order.
pub fn fuzzy(arena: &Arena, from: NodeId, query: &str) -> FsResult<Vec<SearchHit>> {
    let needle = check_query(query)?;
    let m = SkimMatcherV2::default().ignore_case();
    let mut scored = Vec::new();
    walk(arena, from, |id, path| {
        if let Some(score) = m.fuzzy_match(&arena[id].name, needle) {
            scored.push((score, SearchHit { id, path: path.to_string() }));
        }
    });
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(scored.into_iter().map(|(_, hit)| hit).collect())
}

// Pre-order with an explicit stack; children are pushed in reverse so they
// pop in listing order. Paths are extended per level instead of being rebuilt
// from parent links.
fn walk(arena: &Arena, from: NodeId, mut visit: impl FnMut(NodeId, &str)) {
    let mut stack = vec![(from, arena.path(from))];
    while let Some((id, path)) = stack.pop() {
        visit(id, &path);
        for child in arena[id].children().iter().rev() {
            let name = &arena[*child].name;
            let child_path = if path.ends_with('/') {
                format!("{path}{name}")
            } else {
                format!("{path}/{name}")
            };
            stack.push((*child, child_path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileSystemTree, Limits};
    use pretty_assertions::assert_eq;

    fn sample() -> FileSystemTree {
        let mut t = FileSystemTree::new(Limits::new(5, 10_000)).unwrap();
        t.mkdir("Docs").unwrap();
        t.cd("Docs").unwrap();
        t.touch("report.TXT", 10, None).unwrap();
        t.mkdir("old reports").unwrap();
        t.cd("old reports").unwrap();
        t.touch("q1.txt", 5, None).unwrap();
        t.cd("..").unwrap();
        t.cd("..").unwrap();
        t.touch("notes.txt", 1, None).unwrap();
        t
    }

    #[test]
    fn substring_is_case_insensitive_preorder() {
        let t = sample();
        let paths: Vec<_> = t
            .search("REPORT", None)
            .unwrap()
            .into_iter()
            .map(|h| h.path)
            .collect();
        assert_eq!(paths, vec!["/Docs/report.TXT", "/Docs/old reports"]);

        let txt: Vec<_> = t.search(".txt", None).unwrap().into_iter().map(|h| h.path).collect();
        assert_eq!(txt, vec!["/Docs/report.TXT", "/Docs/old reports/q1.txt", "/notes.txt"]);
    }

    #[test]
    fn search_can_start_below_root() {
        let t = sample();
        let docs = t.resolve_path("/Docs/old reports").unwrap();
        let hits = t.search("t", Some(docs)).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "/Docs/old reports");
        assert_eq!(hits[1].path, "/Docs/old reports/q1.txt");
    }

    #[test]
    fn empty_query_is_rejected() {
        let t = sample();
        assert!(matches!(t.search("  ", None), Err(FsError::InvalidArgument(_))));
        assert!(matches!(t.fuzzy_search("", None), Err(FsError::InvalidArgument(_))));
    }

    #[test]
    fn fuzzy_ranks_closer_names_first() {
        let t = sample();
        let hits = t.fuzzy_search("notes", None).unwrap();
        assert_eq!(hits[0].path, "/notes.txt");

        let abbrev: Vec<_> = t
            .fuzzy_search("rpt", None)
            .unwrap()
            .into_iter()
            .map(|h| h.path)
            .collect();
        assert!(abbrev.contains(&"/Docs/report.TXT".to_string()));
        assert!(t.fuzzy_search("xyz", None).unwrap().is_empty());
    }

    #[test]
    fn deep_chains_are_walked_in_order() {
        const DEPTH: usize = 20_000;
        let mut t = FileSystemTree::new(Limits::new(2, 100)).unwrap();
        let mut parent = t.root_id();
        for _ in 0..DEPTH {
            let d = t.arena.alloc_dir("d");
            t.arena.add_child(parent, d, Some(2)).unwrap();
            parent = d;
        }
        let leaf = t.arena.alloc_file("leaf", 1, None);
        t.arena.add_child(parent, leaf, Some(2)).unwrap();
        t.disk_usage = 1;

        let hits = t.search("leaf", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, leaf);
        assert_eq!(hits[0].path.len(), "/d".len() * DEPTH + "/leaf".len());
        assert!(t.search("zzz", None).unwrap().is_empty());
        t.check_consistency().unwrap();
    }
}
