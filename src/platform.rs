//! Host capabilities that differ between Windows and Unix-like testers.
//!
//! Everything that depends on the operating system sits behind [`Platform`];
//! [`current`] is the only place that looks at the target OS.

use std::env;
use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::identity::ScriptPaths;

/// A program plus its argument list, ready to hand to the process spawner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Capability interface for the host this node runs on.
pub trait Platform: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Shell used to run the maintenance and stopper scripts.
    fn locate_shell(&self) -> Option<PathBuf>;

    /// Interpreter that runs the driver and stopper programs.
    fn locate_interpreter(&self) -> Option<PathBuf>;

    /// Primary routable IPv4 address of this host.
    fn local_interface_address(&self) -> Option<Ipv4Addr>;

    /// Script directory from the platform's legacy variable or the roster.
    fn script_root(&self, paths: &ScriptPaths) -> Option<PathBuf>;

    fn shell_fallback(&self) -> &'static str;

    fn interpreter_fallback(&self) -> &'static str;

    fn update_invocation(&self, shell: &str) -> Invocation;

    fn start_invocation(&self, shell: &str, interpreter: &str, testname: &str) -> Invocation;

    fn stop_invocation(&self, shell: &str, interpreter: &str, tester: &str) -> Invocation;
}

/// Picks the implementation for the running OS.
pub fn current() -> Arc<dyn Platform> {
    if cfg!(windows) {
        Arc::new(WindowsHost)
    } else {
        Arc::new(UnixHost)
    }
}

/// Linux and macOS testers: bash scripts, backgrounded driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixHost;

impl Platform for UnixHost {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn locate_shell(&self) -> Option<PathBuf> {
        find_in_path("bash").or_else(|| find_in_path("sh"))
    }

    fn locate_interpreter(&self) -> Option<PathBuf> {
        find_in_path("python3").or_else(|| find_in_path("python"))
    }

    fn local_interface_address(&self) -> Option<Ipv4Addr> {
        routed_ipv4()
    }

    fn script_root(&self, paths: &ScriptPaths) -> Option<PathBuf> {
        non_empty_var("LIN_SCRIPT_PATH")
            .or_else(|| paths.unix.clone())
            .map(PathBuf::from)
    }

    fn shell_fallback(&self) -> &'static str {
        "sh"
    }

    fn interpreter_fallback(&self) -> &'static str {
        "python3"
    }

    fn update_invocation(&self, shell: &str) -> Invocation {
        Invocation::new(shell, ["updater.sh"])
    }

    fn start_invocation(&self, shell: &str, interpreter: &str, testname: &str) -> Invocation {
        let command = format!(
            "{} driver.py --testname {} --upload y &",
            shell_quote(interpreter),
            shell_quote(testname)
        );
        Invocation::new(shell, ["-c".to_string(), command])
    }

    fn stop_invocation(&self, shell: &str, _interpreter: &str, tester: &str) -> Invocation {
        Invocation::new(shell, ["stopper.sh", tester])
    }
}

/// Windows testers: PowerShell maintenance, driver in its own console.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsHost;

impl Platform for WindowsHost {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn locate_shell(&self) -> Option<PathBuf> {
        find_in_path("pwsh.exe").or_else(|| find_in_path("powershell.exe"))
    }

    fn locate_interpreter(&self) -> Option<PathBuf> {
        find_in_path("python.exe")
    }

    fn local_interface_address(&self) -> Option<Ipv4Addr> {
        hostname_ipv4().or_else(routed_ipv4)
    }

    fn script_root(&self, paths: &ScriptPaths) -> Option<PathBuf> {
        non_empty_var("WIN_SCRIPT_PATH")
            .or_else(|| paths.windows.clone())
            .map(PathBuf::from)
    }

    fn shell_fallback(&self) -> &'static str {
        "powershell.exe"
    }

    fn interpreter_fallback(&self) -> &'static str {
        "python.exe"
    }

    fn update_invocation(&self, shell: &str) -> Invocation {
        Invocation::new(shell, ["-File", "updater.ps1"])
    }

    fn start_invocation(&self, _shell: &str, interpreter: &str, testname: &str) -> Invocation {
        Invocation::new(
            "cmd",
            [
                "/c", "start", "", "cmd", "/c", interpreter, "driver.py", "--testname", testname,
                "--upload", "y",
            ],
        )
    }

    fn stop_invocation(&self, _shell: &str, interpreter: &str, tester: &str) -> Invocation {
        Invocation::new(
            "cmd",
            ["/c", "start", "", "cmd", "/c", interpreter, "stopper.py", "--tester", tester],
        )
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Source address the kernel would use to reach a public host.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
fn routed_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        other => {
            debug!(address = %other, "routed address is not usable");
            None
        }
    }
}

/// First non-loopback IPv4 the machine's own hostname resolves to.
fn hostname_ipv4() -> Option<Ipv4Addr> {
    let host = non_empty_var("COMPUTERNAME")?;
    (host.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
            _ => None,
        })
}

/// Quotes `value` for a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
