//! OS system proxy registration
//!
//! Points the desktop's proxy settings at the local listener for the duration of a
//! session. Every call is best-effort: the controller logs failures and carries on.

use std::process::Command;
use tracing::{debug, info};

use crate::error::FocusError;
use crate::Result;

const WINDOWS_INTERNET_SETTINGS: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";
const GNOME_PROXY_SCHEMA: &str = "org.gnome.system.proxy";
const GNOME_HTTP_SCHEMA: &str = "org.gnome.system.proxy.http";
const GNOME_HTTPS_SCHEMA: &str = "org.gnome.system.proxy.https";

/// Registration of the local proxy as the system-wide HTTP(S) proxy
pub trait SystemProxy: Send + Sync {
    /// Route system traffic through `server` (`host:port`)
    fn enable(&self, server: &str) -> Result<()>;

    /// Restore direct connections. Must succeed when nothing is registered.
    fn disable(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Leaves the OS untouched; the user points the browser at the proxy manually.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSystemProxy;

impl SystemProxy for NoopSystemProxy {
    fn enable(&self, server: &str) -> Result<()> {
        info!("System proxy registration disabled; set your browser proxy to {}", server);
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Mechanism used to change the system proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyPlatform {
    /// Per-user WinINet settings in the registry
    Windows,
    /// `networksetup` on every network service
    MacOs,
    /// GNOME `gsettings`
    Gnome,
}

impl ProxyPlatform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            ProxyPlatform::Windows
        } else if cfg!(target_os = "macos") {
            ProxyPlatform::MacOs
        } else {
            ProxyPlatform::Gnome
        }
    }
}

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCommand {
    pub program: &'static str,
    pub args: Vec<String>,
    /// Failure of this command does not fail the operation
    pub optional: bool,
}

impl ProxyCommand {
    fn new(program: &'static str, args: &[&str]) -> Self {
        Self {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
            optional: false,
        }
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn run(&self) -> Result<String> {
        debug!("Running {} {}", self.program, self.args.join(" "));
        let output = Command::new(self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                FocusError::SystemProxy(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(FocusError::SystemProxy(format!(
                "{} {} exited with {}: {}",
                self.program,
                self.args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// System proxy registration for the current OS
#[derive(Debug, Clone, Copy)]
pub struct PlatformSystemProxy {
    platform: ProxyPlatform,
}

impl PlatformSystemProxy {
    pub fn new() -> Self {
        Self::for_platform(ProxyPlatform::current())
    }

    pub fn for_platform(platform: ProxyPlatform) -> Self {
        Self { platform }
    }

    /// Commands that register `server`. `services` is only used on macOS.
    pub fn enable_commands(
        &self,
        server: &str,
        services: &[String],
    ) -> Result<Vec<ProxyCommand>> {
        let (host, port) = split_server(server)?;
        let commands = match self.platform {
            ProxyPlatform::Windows => vec![
                reg_add("ProxyEnable", "REG_DWORD", "1"),
                reg_add("ProxyServer", "REG_SZ", server),
            ],
            ProxyPlatform::MacOs => services
                .iter()
                .flat_map(|svc| {
                    let svc = svc.as_str();
                    [
                        networksetup(&["-setwebproxy", svc, host, port]),
                        networksetup(&["-setsecurewebproxy", svc, host, port]),
                    ]
                })
                .collect(),
            ProxyPlatform::Gnome => vec![
                gsettings(GNOME_HTTP_SCHEMA, "host", host),
                gsettings(GNOME_HTTP_SCHEMA, "port", port),
                gsettings(GNOME_HTTPS_SCHEMA, "host", host),
                gsettings(GNOME_HTTPS_SCHEMA, "port", port),
                gsettings(GNOME_PROXY_SCHEMA, "mode", "manual"),
            ],
        };
        Ok(commands)
    }

    /// Commands that restore direct connections. `services` is only used on macOS.
    pub fn disable_commands(&self, services: &[String]) -> Vec<ProxyCommand> {
        match self.platform {
            ProxyPlatform::Windows => vec![
                reg_add("ProxyEnable", "REG_DWORD", "0"),
                // absent when nothing was registered
                reg_delete("ProxyServer").optional(),
            ],
            ProxyPlatform::MacOs => services
                .iter()
                .flat_map(|svc| {
                    let svc = svc.as_str();
                    [
                        networksetup(&["-setwebproxystate", svc, "off"]),
                        networksetup(&["-setsecurewebproxystate", svc, "off"]),
                    ]
                })
                .collect(),
            ProxyPlatform::Gnome => vec![gsettings(GNOME_PROXY_SCHEMA, "mode", "none")],
        }
    }

    fn services(&self) -> Result<Vec<String>> {
        if self.platform != ProxyPlatform::MacOs {
            return Ok(Vec::new());
        }
        let listing = networksetup(&["-listallnetworkservices"]).run()?;
        Ok(parse_network_services(&listing))
    }

    fn run_all(commands: &[ProxyCommand]) -> Result<()> {
        for command in commands {
            match command.run() {
                Ok(_) => {}
                Err(e) if command.optional => debug!("Ignoring optional command failure: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Default for PlatformSystemProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProxy for PlatformSystemProxy {
    fn enable(&self, server: &str) -> Result<()> {
        let services = self.services()?;
        Self::run_all(&self.enable_commands(server, &services)?)?;
        info!("System proxy set to {}", server);
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        let services = self.services()?;
        Self::run_all(&self.disable_commands(&services))?;
        info!("System proxy disabled");
        Ok(())
    }

    fn name(&self) -> &'static str {
        match self.platform {
            ProxyPlatform::Windows => "windows-registry",
            ProxyPlatform::MacOs => "networksetup",
            ProxyPlatform::Gnome => "gsettings",
        }
    }
}

fn reg_add(value: &str, kind: &str, data: &str) -> ProxyCommand {
    ProxyCommand::new(
        "reg",
        &[
            "add",
            WINDOWS_INTERNET_SETTINGS,
            "/v",
            value,
            "/t",
            kind,
            "/d",
            data,
            "/f",
        ],
    )
}

fn reg_delete(value: &str) -> ProxyCommand {
    ProxyCommand::new(
        "reg",
        &["delete", WINDOWS_INTERNET_SETTINGS, "/v", value, "/f"],
    )
}

fn networksetup(args: &[&str]) -> ProxyCommand {
    ProxyCommand::new("networksetup", args)
}

fn gsettings(schema: &str, key: &str, value: &str) -> ProxyCommand {
    ProxyCommand::new("gsettings", &["set", schema, key, value])
}

fn split_server(server: &str) -> Result<(&str, &str)> {
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok((host, port)),
        _ => Err(FocusError::Configuration(format!(
            "Proxy server must be host:port, got '{}'",
            server
        ))),
    }
}

/// Parse `networksetup -listallnetworkservices` output.
/// The first line is an explanatory header; disabled services are prefixed with `*`.
fn parse_network_services(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_commands() {
        let proxy = PlatformSystemProxy::for_platform(ProxyPlatform::Windows);
        let enable = proxy.enable_commands("127.0.0.1:8888", &[]).unwrap();
        assert_eq!(enable.len(), 2);
        assert!(enable[1].args.contains(&"127.0.0.1:8888".to_string()));

        let disable = proxy.disable_commands(&[]);
        assert!(disable[0].args.contains(&"0".to_string()));
        assert!(disable[1].optional);
    }

    #[test]
    fn test_macos_commands_per_service() {
        let proxy = PlatformSystemProxy::for_platform(ProxyPlatform::MacOs);
        let services = vec!["Wi-Fi".to_string(), "Ethernet".to_string()];
        let enable = proxy.enable_commands("127.0.0.1:8888", &services).unwrap();
        assert_eq!(enable.len(), 4);
        assert_eq!(
            enable[0].args,
            vec!["-setwebproxy", "Wi-Fi", "127.0.0.1", "8888"]
        );
        assert_eq!(proxy.disable_commands(&services).len(), 4);
    }

    #[test]
    fn test_gnome_commands() {
        let proxy = PlatformSystemProxy::for_platform(ProxyPlatform::Gnome);
        let enable = proxy.enable_commands("127.0.0.1:8888", &[]).unwrap();
        assert_eq!(
            enable.last().unwrap().args,
            vec!["set", "org.gnome.system.proxy", "mode", "manual"]
        );
        let disable = proxy.disable_commands(&[]);
        assert_eq!(
            disable[0].args,
            vec!["set", "org.gnome.system.proxy", "mode", "none"]
        );
    }

    #[test]
    fn test_invalid_server_rejected() {
        let proxy = PlatformSystemProxy::for_platform(ProxyPlatform::Gnome);
        assert!(proxy.enable_commands("localhost", &[]).is_err());
        assert!(proxy.enable_commands(":8888", &[]).is_err());
    }

    #[test]
    fn test_parse_network_services() {
        let listing = "An asterisk (*) denotes that a network service is disabled.\n\
                       Wi-Fi\n*Bluetooth PAN\nThunderbolt Bridge\n\n";
        assert_eq!(
            parse_network_services(listing),
            vec!["Wi-Fi".to_string(), "Thunderbolt Bridge".to_string()]
        );
    }

    #[test]
    fn test_noop_proxy() {
        assert!(NoopSystemProxy.enable("127.0.0.1:8888").is_ok());
        assert!(NoopSystemProxy.disable().is_ok());
        assert_eq!(NoopSystemProxy.name(), "manual");
    }
}
