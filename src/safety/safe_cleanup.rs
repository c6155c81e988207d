//! Recursive tree removal without following symlinks.
//!
//! Traversal is fd-relative (`openat`/`fstatat`/`unlinkat`) and iterative,
//! so neither path length nor stack size limits depth, and a symlink is
//! always unlinked, never entered. One failing entry is recorded and its
//! siblings are still processed.

use crate::config::types::{ProcError, Result};
use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

struct FdGuard(RawFd);

impl FdGuard {
    fn new(fd: RawFd) -> Self {
        Self(fd)
    }

    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe {
                libc::close(self.0);
            }
        }
    }
}

/// One entry that could not be removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a tree removal
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Entries actually unlinked (files, links, directories)
    pub removed: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &Path, reason: impl std::fmt::Display) {
        log::warn!("cleanup: {}: {}", path.display(), reason);
        self.failures.push(CleanupFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }

    /// Collapse into the crate error when anything was left behind
    pub fn into_result(self) -> Result<Self> {
        match self.failures.first() {
            None => Ok(self),
            Some(first) => Err(ProcError::Cleanup {
                failed: self.failures.len(),
                first: format!("{}: {}", first.path.display(), first.reason),
            }),
        }
    }
}

/// Removes a single entry relative to an open directory.
/// Production uses `unlinkat`; tests substitute failing removers.
pub trait EntryRemover {
    fn remove(&mut self, parent_fd: RawFd, name: &CStr, path: &Path, is_dir: bool) -> io::Result<()>;
}

/// `unlinkat(2)`, with `AT_REMOVEDIR` for directories
pub struct UnlinkAt;

impl EntryRemover for UnlinkAt {
    fn remove(&mut self, parent_fd: RawFd, name: &CStr, _path: &Path, is_dir: bool) -> io::Result<()> {
        let flags = if is_dir { libc::AT_REMOVEDIR } else { 0 };
        let rc = unsafe { libc::unlinkat(parent_fd, name.as_ptr(), flags) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn is_vanished(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOENT)
}

fn open_dir_nofollow(path: &Path) -> io::Result<FdGuard> {
    let path_c = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;

    let fd = unsafe {
        libc::open(
            path_c.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(FdGuard::new(fd))
}

fn openat_dir_nofollow(parent_fd: RawFd, name: &CStr) -> io::Result<FdGuard> {
    let fd = unsafe {
        libc::openat(
            parent_fd,
            name.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(FdGuard::new(fd))
}

fn fstatat_nofollow(parent_fd: RawFd, name: &CStr) -> io::Result<libc::stat> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::zeroed();
    let rc = unsafe {
        libc::fstatat(
            parent_fd,
            name.as_ptr(),
            st.as_mut_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(unsafe { st.assume_init() })
}

fn is_dir(st: &libc::stat) -> bool {
    st.st_mode & libc::S_IFMT == libc::S_IFDIR
}

/// Snapshot the names in a directory, skipping `.` and `..`.
/// Reading everything first keeps only one DIR stream open per call.
fn list_entries(dir_fd: RawFd) -> io::Result<Vec<CString>> {
    let iter_fd = unsafe { libc::dup(dir_fd) };
    if iter_fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let dir = unsafe { libc::fdopendir(iter_fd) };
    if dir.is_null() {
        let err = io::Error::last_os_error();
        unsafe {
            libc::close(iter_fd);
        }
        return Err(err);
    }

    let mut names = Vec::new();
    loop {
        unsafe {
            *libc::__errno_location() = 0;
        }
        let entry = unsafe { libc::readdir(dir) };
        if entry.is_null() {
            let errno = unsafe { *libc::__errno_location() };
            unsafe {
                libc::closedir(dir);
            }
            if errno != 0 {
                return Err(io::Error::from_raw_os_error(errno));
            }
            break;
        }

        let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
        let bytes = name.to_bytes();
        if bytes == b"." || bytes == b".." {
            continue;
        }
        names.push(name.to_owned());
    }

    Ok(names)
}

fn fstat_fd(fd: RawFd) -> io::Result<libc::stat> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::zeroed();
    let rc = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { st.assume_init() })
}

type FileId = (libc::dev_t, libc::ino_t);

fn file_id(st: &libc::stat) -> FileId {
    (st.st_dev, st.st_ino)
}

/// Climb from `dir_fd` to its parent and check it is still the directory
/// we descended from.
fn reopen_parent(dir_fd: RawFd, expected: FileId) -> io::Result<FdGuard> {
    let dotdot = CStr::from_bytes_with_nul(b"..\0")
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad parent name"))?;
    let fd = openat_dir_nofollow(dir_fd, dotdot)?;
    if file_id(&fstat_fd(fd.as_raw_fd())?) != expected {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "parent directory replaced during cleanup",
        ));
    }
    Ok(fd)
}

/// One directory on the descent path. Only the deepest one holds an open
/// descriptor; ancestors are re-entered through `..`, so neither the call
/// stack nor the descriptor count grows with depth.
struct DirFrame {
    name: CString,
    id: FileId,
    pending: Vec<CString>,
}

struct Reaper<'r, R: EntryRemover> {
    remover: &'r mut R,
    root_dev: libc::dev_t,
    report: CleanupReport,
}

impl<'r, R: EntryRemover> Reaper<'r, R> {
    fn remove_leaf(&mut self, parent_fd: RawFd, name: &CStr, path: &Path) {
        match self.remover.remove(parent_fd, name, path, false) {
            Ok(()) => self.report.removed += 1,
            Err(e) if is_vanished(&e) => {}
            Err(e) => self.report.fail(path, e),
        }
    }

    fn remove_empty_dir(&mut self, parent_fd: RawFd, name: &CStr, path: &Path) {
        match self.remover.remove(parent_fd, name, path, true) {
            Ok(()) => self.report.removed += 1,
            Err(e) if is_vanished(&e) => {}
            Err(e) => self.report.fail(path, e),
        }
    }

    /// Open `name` and snapshot its entries. `None` means there is nothing
    /// to descend into: it vanished, or it was already dealt with.
    fn enter(
        &mut self,
        parent_fd: RawFd,
        name: &CStr,
        path: &Path,
        st: &libc::stat,
    ) -> Option<(FdGuard, DirFrame)> {
        let fd = match openat_dir_nofollow(parent_fd, name) {
            Ok(fd) => fd,
            Err(e) if is_vanished(&e) => return None,
            Err(e) => {
                // An unreadable but empty directory can still be removed.
                match self.remover.remove(parent_fd, name, path, true) {
                    Ok(()) => self.report.removed += 1,
                    Err(rm) => self
                        .report
                        .fail(path, format!("cannot open ({}) or remove ({})", e, rm)),
                }
                return None;
            }
        };

        match fstat_fd(fd.as_raw_fd()) {
            Ok(opened) if file_id(&opened) == file_id(st) => {}
            Ok(_) => {
                self.report.fail(path, "replaced during cleanup");
                return None;
            }
            Err(e) => {
                self.report.fail(path, e);
                return None;
            }
        }

        let pending = match list_entries(fd.as_raw_fd()) {
            Ok(names) => names,
            Err(e) => {
                // Still attempt the rmdir on the way back up.
                self.report.fail(path, format!("cannot list: {}", e));
                Vec::new()
            }
        };

        Some((
            fd,
            DirFrame {
                name: name.to_owned(),
                id: file_id(st),
                pending,
            },
        ))
    }

    /// Depth-first, post-order removal of directory `name` under `top_fd`
    fn remove_dir(&mut self, top_fd: RawFd, name: &CStr, path: &Path, st: &libc::stat) {
        let Some((mut current, frame)) = self.enter(top_fd, name, path, st) else {
            return;
        };
        let mut stack = vec![frame];
        // Path of the deepest directory, grown and shrunk with the stack.
        let mut dir_path = path.to_path_buf();

        while let Some(frame) = stack.last_mut() {
            if let Some(child) = frame.pending.pop() {
                let child_path = dir_path.join(OsStr::from_bytes(child.to_bytes()));
                let child_st = match fstatat_nofollow(current.as_raw_fd(), &child) {
                    Ok(st) => st,
                    Err(e) if is_vanished(&e) => continue,
                    Err(e) => {
                        self.report.fail(&child_path, e);
                        continue;
                    }
                };

                if !is_dir(&child_st) {
                    self.remove_leaf(current.as_raw_fd(), &child, &child_path);
                } else if child_st.st_dev != self.root_dev {
                    self.report
                        .fail(&child_path, "refusing to cross filesystem boundary");
                } else if let Some((fd, child_frame)) =
                    self.enter(current.as_raw_fd(), &child, &child_path, &child_st)
                {
                    current = fd;
                    stack.push(child_frame);
                    dir_path = child_path;
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            let done_path = dir_path.clone();
            dir_path.pop();
            match stack.last() {
                None => {
                    drop(current);
                    self.remove_empty_dir(top_fd, &done.name, &done_path);
                    return;
                }
                Some(parent) => match reopen_parent(current.as_raw_fd(), parent.id) {
                    Ok(fd) => {
                        current = fd;
                        self.remove_empty_dir(current.as_raw_fd(), &done.name, &done_path);
                    }
                    Err(e) => {
                        self.report
                            .fail(&dir_path, format!("lost track of directory: {}", e));
                        return;
                    }
                },
            }
        }
    }
}

/// Remove `path` and everything beneath it using `remover` for each unlink.
/// A missing `path` is an empty, clean report.
pub fn remove_tree_with<R: EntryRemover>(path: &Path, remover: &mut R) -> CleanupReport {
    let mut report = CleanupReport::default();

    match std::fs::symlink_metadata(path) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
        Err(e) => {
            report.fail(path, e);
            return report;
        }
    }

    let Some(name_os) = path.file_name() else {
        report.fail(path, "cannot remove path without file name");
        return report;
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name_c = match CString::new(name_os.as_bytes()) {
        Ok(name) => name,
        Err(_) => {
            report.fail(path, "path contains NUL byte");
            return report;
        }
    };

    let parent_fd = match open_dir_nofollow(parent) {
        Ok(fd) => fd,
        Err(e) => {
            report.fail(parent, e);
            return report;
        }
    };
    let st = match fstatat_nofollow(parent_fd.as_raw_fd(), &name_c) {
        Ok(st) => st,
        Err(e) if is_vanished(&e) => return report,
        Err(e) => {
            report.fail(path, e);
            return report;
        }
    };

    let mut reaper = Reaper {
        remover,
        root_dev: st.st_dev,
        report,
    };
    if is_dir(&st) {
        reaper.remove_dir(parent_fd.as_raw_fd(), &name_c, path, &st);
    } else {
        reaper.remove_leaf(parent_fd.as_raw_fd(), &name_c, path);
    }
    reaper.report
}

/// Remove `path` and everything beneath it with `unlinkat`
pub fn remove_tree(path: &Path) -> CleanupReport {
    remove_tree_with(path, &mut UnlinkAt)
}

/// Directory reaper entry point: remove the tree, report aggregate failure
pub fn cleanup_directory(path: &Path) -> Result<CleanupReport> {
    let report = remove_tree(path);
    if report.is_clean() {
        log::info!(
            "cleanup: removed {} entries under {}",
            report.removed,
            path.display()
        );
    } else {
        log::error!(
            "cleanup: {} entries under {} could not be removed",
            report.failures.len(),
            path.display()
        );
    }
    report.into_result()
}
