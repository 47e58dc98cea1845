//! Compiled-in catalog of host capabilities.
//!
//! Each probe exercises one platform surface directly (create a file, bind a
//! socket, spawn a process) and answers whether it worked. Refusals such as
//! `EACCES` or `EADDRNOTAVAIL` are a definite "no"; anything unexpected is
//! returned as an error and the aggregator records the capability as
//! unsupported.

use crate::catalog::{CapabilityCatalog, CapabilityDescriptor, Probe};
use anyhow::{Context, Result, bail};
use std::io::{self, ErrorKind};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::debug;

const PROBE_BYTES: &[u8] = b"capscan-probe";
const UDP_ECHO_TIMEOUT: Duration = Duration::from_secs(2);
// Soft limit below which descriptor-heavy workloads start failing.
const MIN_NOFILE_SOFT_LIMIT: u64 = 1024;

static BUILTIN: OnceLock<CapabilityCatalog> = OnceLock::new();

/// The host capability catalog, built once per process.
pub fn builtin_catalog() -> &'static CapabilityCatalog {
    BUILTIN.get_or_init(|| {
        CapabilityCatalog::new(vec![
            CapabilityDescriptor::new(
                "fs_temp_write",
                "Temporary file round-trip",
                "Create an anonymous temp file, write to it, and read the bytes back.",
                Probe::new(temp_file_round_trip),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man3/tmpfile.3.html"),
            CapabilityDescriptor::new(
                "fs_symlink",
                "Symbolic links",
                "Create a symlink inside a scratch directory and read through it.",
                Probe::new(symlink_round_trip),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man2/symlink.2.html"),
            CapabilityDescriptor::new(
                "fs_cwd_write",
                "Writable working directory",
                "Create a scratch file in the current working directory.",
                Probe::new(cwd_writable),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man2/open.2.html"),
            CapabilityDescriptor::new(
                "fs_procfs",
                "procfs",
                "The /proc pseudo-filesystem is mounted and exposes this process.",
                Probe::new(procfs_mounted),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man5/proc.5.html"),
            CapabilityDescriptor::new(
                "env_home",
                "Home directory",
                "HOME points at an existing directory.",
                Probe::new(home_directory_present),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man7/environ.7.html"),
            CapabilityDescriptor::new(
                "proc_spawn",
                "Process spawning",
                "Spawn a shell child process and collect its exit status.",
                Probe::new(spawn_child),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man3/posix_spawn.3.html"),
            CapabilityDescriptor::new(
                "proc_hw_threads",
                "Parallel hardware threads",
                "More than one hardware thread is available to this process.",
                Probe::new(parallel_hardware_threads),
            )
            .with_reference_url(
                "https://doc.rust-lang.org/std/thread/fn.available_parallelism.html",
            ),
            CapabilityDescriptor::new(
                "sys_root",
                "Root privileges",
                "The process runs with an effective user id of 0.",
                Probe::new(running_as_root),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man2/geteuid.2.html"),
            CapabilityDescriptor::new(
                "sys_nofile_limit",
                "Open file headroom",
                "The soft RLIMIT_NOFILE allows at least 1024 descriptors.",
                Probe::new(nofile_headroom),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man2/getrlimit.2.html"),
            CapabilityDescriptor::new(
                "net_tcp_loopback_v4",
                "IPv4 loopback TCP",
                "Listen on 127.0.0.1 and accept a local connection.",
                Probe::new(|| tcp_loopback("127.0.0.1:0")),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man7/tcp.7.html"),
            CapabilityDescriptor::new(
                "net_tcp_loopback_v6",
                "IPv6 loopback TCP",
                "Listen on [::1] and accept a local connection.",
                Probe::new(|| tcp_loopback("[::1]:0")),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man7/ipv6.7.html"),
            CapabilityDescriptor::new(
                "net_udp_loopback",
                "UDP loopback datagrams",
                "Send a datagram to a loopback UDP socket and receive it.",
                Probe::new(udp_loopback),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man7/udp.7.html"),
            CapabilityDescriptor::new(
                "net_resolve_localhost",
                "Name resolution",
                "Resolve the name localhost through the system resolver.",
                Probe::new(resolve_localhost),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man3/getaddrinfo.3.html"),
            CapabilityDescriptor::new(
                "ipc_unix_socket",
                "Unix domain sockets",
                "Bind a Unix stream socket in a scratch directory and connect to it.",
                Probe::new(unix_socket_round_trip),
            )
            .with_reference_url("https://man7.org/linux/man-pages/man7/unix.7.html"),
        ])
    })
}

/// Errors that mean the platform said "no" rather than "something broke".
fn is_refusal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::PermissionDenied
            | ErrorKind::ReadOnlyFilesystem
            | ErrorKind::AddrNotAvailable
            | ErrorKind::Unsupported
            | ErrorKind::NotFound
    )
}

/// Turn a refusal into `None` and propagate every other error.
fn refused<T>(result: io::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if is_refusal(&err) => {
            debug!(error = %err, "probe refused by platform");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn temp_file_round_trip() -> Result<bool> {
    tokio::task::spawn_blocking(|| -> Result<bool> {
        use std::io::{Read, Seek, SeekFrom, Write};

        let Some(mut file) = refused(tempfile::tempfile())? else {
            return Ok(false);
        };
        file.write_all(PROBE_BYTES).context("writing temp file")?;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).context("reading temp file")?;
        Ok(contents == PROBE_BYTES)
    })
    .await?
}

async fn symlink_round_trip() -> Result<bool> {
    #[cfg(unix)]
    {
        tokio::task::spawn_blocking(|| -> Result<bool> {
            let Some(dir) = refused(tempfile::tempdir())? else {
                return Ok(false);
            };
            let target = dir.path().join("target");
            let link = dir.path().join("link");
            std::fs::write(&target, PROBE_BYTES).context("writing symlink target")?;
            if refused(std::os::unix::fs::symlink(&target, &link))?.is_none() {
                return Ok(false);
            }
            Ok(std::fs::read(&link)? == PROBE_BYTES)
        })
        .await?
    }
    #[cfg(not(unix))]
    {
        Ok(false)
    }
}

async fn cwd_writable() -> Result<bool> {
    tokio::task::spawn_blocking(|| -> Result<bool> {
        let cwd = std::env::current_dir().context("resolving current directory")?;
        Ok(refused(tempfile::tempfile_in(&cwd))?.is_some())
    })
    .await?
}

async fn procfs_mounted() -> Result<bool> {
    let Some(meta) = refused(tokio::fs::metadata("/proc/self/status").await)? else {
        return Ok(false);
    };
    Ok(meta.is_file())
}

async fn home_directory_present() -> Result<bool> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
    let Some(home) = home.filter(|value| !value.is_empty()) else {
        return Ok(false);
    };
    let Some(meta) = refused(tokio::fs::metadata(&home).await)? else {
        return Ok(false);
    };
    Ok(meta.is_dir())
}

async fn spawn_child() -> Result<bool> {
    let mut command = if cfg!(windows) {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.args(["/C", "exit 0"]);
        cmd
    } else {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.args(["-c", "exit 0"]);
        cmd
    };
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    let Some(status) = refused(command.status().await)? else {
        return Ok(false);
    };
    Ok(status.success())
}

async fn parallel_hardware_threads() -> Result<bool> {
    let threads = std::thread::available_parallelism().context("querying available parallelism")?;
    Ok(threads.get() > 1)
}

async fn running_as_root() -> Result<bool> {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        Ok(unsafe { libc::geteuid() } == 0)
    }
    #[cfg(not(unix))]
    {
        Ok(false)
    }
}

async fn nofile_headroom() -> Result<bool> {
    #[cfg(unix)]
    {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `limit` is a valid, writable rlimit for the duration of the call.
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
        if rc != 0 {
            bail!("getrlimit(RLIMIT_NOFILE) failed: {}", io::Error::last_os_error());
        }
        if limit.rlim_cur == libc::RLIM_INFINITY {
            return Ok(true);
        }
        Ok(limit.rlim_cur as u64 >= MIN_NOFILE_SOFT_LIMIT)
    }
    #[cfg(not(unix))]
    {
        Ok(false)
    }
}

async fn tcp_loopback(bind_addr: &'static str) -> Result<bool> {
    let Some(listener) = refused(TcpListener::bind(bind_addr).await)? else {
        return Ok(false);
    };
    let addr = listener.local_addr()?;
    let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let Some(_client) = refused(connected)? else {
        return Ok(false);
    };
    accepted.with_context(|| format!("accepting loopback connection on {addr}"))?;
    Ok(true)
}

async fn udp_loopback() -> Result<bool> {
    let Some(socket) = refused(UdpSocket::bind("127.0.0.1:0").await)? else {
        return Ok(false);
    };
    let addr = socket.local_addr()?;
    if refused(socket.send_to(PROBE_BYTES, addr).await)?.is_none() {
        return Ok(false);
    }
    let mut buf = [0u8; 64];
    match tokio::time::timeout(UDP_ECHO_TIMEOUT, socket.recv_from(&mut buf)).await {
        Ok(received) => {
            let (len, from) = received.context("receiving loopback datagram")?;
            Ok(from == addr && &buf[..len] == PROBE_BYTES)
        }
        Err(_) => {
            debug!(%addr, "loopback datagram never arrived");
            Ok(false)
        }
    }
}

async fn resolve_localhost() -> Result<bool> {
    match tokio::net::lookup_host("localhost:0").await {
        Ok(mut addrs) => Ok(addrs.next().is_some()),
        Err(err) => {
            debug!(error = %err, "localhost did not resolve");
            Ok(false)
        }
    }
}

async fn unix_socket_round_trip() -> Result<bool> {
    #[cfg(unix)]
    {
        use tokio::net::{UnixListener, UnixStream};

        let Some(dir) = refused(tempfile::tempdir())? else {
            return Ok(false);
        };
        let path = dir.path().join("capscan.sock");
        let Some(listener) = refused(UnixListener::bind(&path))? else {
            return Ok(false);
        };
        let (connected, accepted) = tokio::join!(UnixStream::connect(&path), listener.accept());
        if refused(connected)?.is_none() {
            return Ok(false);
        }
        accepted.context("accepting unix socket connection")?;
        Ok(true)
    }
    #[cfg(not(unix))]
    {
        Ok(false)
    }
}
