use std::{io::Write, path::Path};

use crate::{checksum::Checksum, Options, ScanEvent};

/// Deliver an event to the configured reporter, or to `log` when none is set
#[inline]
pub fn report_event(opt: &Options, ev: &ScanEvent) {
    if let Some(cb) = &opt.event_report {
        cb(ev);
        return;
    }
    match ev {
        ScanEvent::EnterDir(p) => log::debug!("entering dir: {}", p.display()),
        ScanEvent::Ignored(p) => log::debug!("ignoring: {}", p.display()),
        ScanEvent::Error(e) => log::warn!("{e}"),
        ScanEvent::Summary(s) => log::info!("{s}"),
    }
}

/// Append `<base64> <16 hex size> <path>\n`
#[inline]
pub fn append_result_line(out: &mut Vec<u8>, checksum: Checksum, size: u64, path: &Path) {
    // writes into a Vec cannot fail
    let _ = write!(out, "{} {:016x} ", checksum.to_base64(), size);
    out.extend_from_slice(&path_bytes(path));
    out.push(b'\n');
}

#[cfg(unix)]
#[inline]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    std::borrow::Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
#[inline]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    match path.to_string_lossy() {
        std::borrow::Cow::Borrowed(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
        std::borrow::Cow::Owned(s) => std::borrow::Cow::Owned(s.into_bytes()),
    }
}

#[cfg(target_os = "linux")]
pub const PINNING_SUPPORTED: bool = true;
#[cfg(not(target_os = "linux"))]
pub const PINNING_SUPPORTED: bool = false;

/// Pin the calling worker to one of the first `cpu_cap` CPUs, round-robin by id
#[cfg(target_os = "linux")]
pub fn pin_current_thread(worker_id: usize, cpu_cap: usize) {
    unsafe {
        let ncpu = libc::sysconf(libc::_SC_NPROCESSORS_ONLN);
        let online = if ncpu > 0 { ncpu as usize } else { cpu_cap };
        let cap = cpu_cap.min(online).max(1);
        let cpu = worker_id % cap;
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let rc = libc::sched_setaffinity(
            0,
            std::mem::size_of::<libc::cpu_set_t>(),
            &set as *const libc::cpu_set_t,
        );
        if rc != 0 {
            log::debug!(
                "worker {worker_id}: sched_setaffinity(cpu {cpu}) failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_worker_id: usize, _cpu_cap: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_line_layout() {
        let mut out = Vec::new();
        append_result_line(&mut out, Checksum(0x0BB0_DD3D), 128, Path::new("hashtest.txt"));
        append_result_line(&mut out, Checksum(0), 12, Path::new("dir/a b.txt"));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "C7DdPQ== 0000000000000080 hashtest.txt\nAAAAAA== 000000000000000c dir/a b.txt\n"
        );
    }
}
