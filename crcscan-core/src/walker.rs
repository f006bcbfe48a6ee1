use std::{
    ffi::OsString,
    fs::{self, Metadata},
    io,
    path::{Path, PathBuf},
};

use crate::{
    error_handling::{EntryKind, ScanError, ScanResult},
    scanner::WalkContext,
    scheduler::Job,
    ScanEvent,
};

/// Depth-first, lexically ordered walk of `root` without following links.
///
/// Only an unreadable root is an error; everything below it is reported
/// and skipped.
pub fn walk_root(ctx: &WalkContext, root: &Path) -> ScanResult<()> {
    let md = fs::symlink_metadata(root).map_err(|source| ScanError::WalkInit {
        path: root.to_path_buf(),
        source,
    })?;
    let mut stack: Vec<PathBuf> = Vec::new();
    if !visit(ctx, root.to_path_buf(), &md, &mut stack) {
        return Ok(());
    }
    while let Some(path) = stack.pop() {
        let md = match fs::symlink_metadata(&path) {
            Ok(md) => md,
            Err(source) => {
                ctx.record_error(ScanError::Metadata {
                    path,
                    kind: EntryKind::File,
                    source,
                });
                continue;
            }
        };
        if !visit(ctx, path, &md, &mut stack) {
            break;
        }
    }
    Ok(())
}

/// Classify one entry. Returns false once the queue has no receivers left.
fn visit(ctx: &WalkContext, path: PathBuf, md: &Metadata, stack: &mut Vec<PathBuf>) -> bool {
    let ft = md.file_type();
    if ft.is_dir() {
        ctx.report(ScanEvent::EnterDir(path.clone()));
        match sorted_names(&path) {
            // reversed so the smallest name is popped first
            Ok(names) => stack.extend(names.into_iter().rev().map(|n| path.join(n))),
            Err(source) => ctx.record_error(ScanError::Metadata {
                path,
                kind: EntryKind::Dir,
                source,
            }),
        }
        true
    } else if ft.is_file() {
        ctx.enqueue(Job {
            size: md.len(),
            path,
        })
    } else {
        ctx.report(ScanEvent::Ignored(path));
        true
    }
}

fn sorted_names(dir: &Path) -> io::Result<Vec<OsString>> {
    let mut names = fs::read_dir(dir)?
        .map(|ent| ent.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}
