use nix::libc::rlim_t;
use nix::sys::resource::{setrlimit, Resource};
use std::time::Duration;
use tokio::process::Command;

use crate::ResourceLimits;

/// Apply rlimits (and, on Linux, namespace isolation) in the child between
/// fork and exec. Any failure aborts the spawn.
pub(crate) fn install(cmd: &mut Command, limits: &ResourceLimits, timeout: Duration) {
    let cpu_secs = limits
        .cpu_secs
        .unwrap_or_else(|| timeout.as_secs_f64().ceil() as u64 + 1);
    let memory = limits.memory_bytes;
    let file_size = limits.file_size_bytes;
    #[cfg(target_os = "linux")]
    let isolate_network = limits.isolate_network;

    // SAFETY: the closure only makes async-signal-safe syscalls (unshare,
    // setrlimit) and does not allocate or touch locks held by the parent.
    unsafe {
        cmd.pre_exec(move || {
            #[cfg(target_os = "linux")]
            if isolate_network {
                use nix::sched::{unshare, CloneFlags};
                unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET)?;
            }

            setrlimit(Resource::RLIMIT_CPU, cpu_secs as rlim_t, cpu_secs as rlim_t)?;
            if let Some(bytes) = memory {
                setrlimit(Resource::RLIMIT_AS, bytes as rlim_t, bytes as rlim_t)?;
            }
            if let Some(bytes) = file_size {
                setrlimit(Resource::RLIMIT_FSIZE, bytes as rlim_t, bytes as rlim_t)?;
            }
            Ok(())
        });
    }
}
