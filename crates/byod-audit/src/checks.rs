//! Security control definitions and results
//!
//! Every control is a list of probes tried in order. A probe reads one source
//! (a command's stdout or a file) and either reaches a verdict or is
//! inconclusive, in which case the next probe runs. If no probe is
//! conclusive the check's `fallback` verdict is used.

use byod_core::Platform;
use serde::{Deserialize, Serialize};

/// Check IDs, in report order
pub const OS_FIREWALL: &str = "os_firewall";
pub const DISK_ENCRYPTION: &str = "disk_encryption";
pub const AUTOLOCK: &str = "autolock";
pub const GUEST_ACCOUNTS: &str = "guest_accounts";

/// A security control definition for one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCheck {
    /// Stable ID used in reports (`os_firewall`, ...)
    pub id: String,
    /// Check name
    pub name: String,
    /// What a compliant device looks like
    pub description: String,
    /// Platform the probes apply to
    pub platform: Platform,
    /// Probes, tried in order
    pub probes: Vec<Probe>,
    /// Verdict when every probe is inconclusive
    pub fallback: Verdict,
    /// How to fix a failure
    pub remediation: String,
}

/// One way of asking the operating system about a control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    pub source: Source,
    pub check_type: CheckType,
    /// Message on pass. `{minutes}` is replaced for `Within` checks.
    pub pass_message: String,
    /// Message on fail. `{minutes}` is replaced for `Within` checks.
    pub fail_message: String,
    /// Verdict when the source cannot be read (command missing, non-zero
    /// exit, unreadable file). `None` moves on to the next probe.
    pub if_unavailable: Option<Verdict>,
}

/// Where a probe reads from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Source {
    /// Run a command and read its stdout; a non-zero exit counts as unavailable
    Command { command: String, args: Vec<String> },
    /// Read a file; a leading `~/` is the user's home directory
    File { path: String },
}

/// How a probe interprets what it read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CheckType {
    /// Regex match. `fail` is tested first. When neither matches,
    /// `otherwise` decides (`None` is inconclusive).
    Pattern {
        pass: Option<String>,
        fail: Option<String>,
        otherwise: Option<bool>,
    },
    /// Extract a number with the first capture group of `pattern` and pass
    /// when it lies in `min..=max`. `scale` converts the value to minutes
    /// for messages.
    Within {
        pattern: String,
        radix: u32,
        min: u64,
        max: u64,
        scale: u64,
    },
    /// Being able to read the source is the verdict
    Present { passed: bool },
}

/// A concluded pass or fail with a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Result of a security check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check ID
    pub check_id: String,
    /// Check name
    pub check_name: String,
    /// What a compliant device looks like
    pub description: String,
    /// Whether check passed
    #[serde(rename = "status")]
    pub passed: bool,
    /// What was found
    pub message: String,
    /// Remediation steps, empty when the check passed
    pub remediation: String,
}

impl CheckResult {
    pub fn from_verdict(check: &ConfigCheck, verdict: Verdict) -> Self {
        Self {
            check_id: check.id.clone(),
            check_name: check.name.clone(),
            description: check.description.clone(),
            passed: verdict.passed,
            message: verdict.message,
            remediation: if verdict.passed {
                String::new()
            } else {
                check.remediation.clone()
            },
        }
    }
}

fn command(command: &str, args: &[&str]) -> Source {
    Source::Command {
        command: command.into(),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}

fn pattern(pass: Option<&str>, fail: Option<&str>, otherwise: Option<bool>) -> CheckType {
    CheckType::Pattern {
        pass: pass.map(String::from),
        fail: fail.map(String::from),
        otherwise,
    }
}

fn within(pattern: &str, radix: u32, max: u64, scale: u64) -> CheckType {
    CheckType::Within {
        pattern: pattern.into(),
        radix,
        min: 1,
        max,
        scale,
    }
}

fn probe(source: Source, check_type: CheckType, pass_message: &str, fail_message: &str) -> Probe {
    Probe {
        source,
        check_type,
        pass_message: pass_message.into(),
        fail_message: fail_message.into(),
        if_unavailable: None,
    }
}

impl Probe {
    fn or_else(mut self, verdict: Verdict) -> Self {
        self.if_unavailable = Some(verdict);
        self
    }
}

struct Control {
    id: &'static str,
    name: &'static str,
    description: &'static str,
}

const CONTROLS: [Control; 4] = [
    Control {
        id: OS_FIREWALL,
        name: "OS Firewall",
        description: "Built-in operating system firewall enabled",
    },
    Control {
        id: DISK_ENCRYPTION,
        name: "Disk Encryption",
        description: "Full disk encryption enabled",
    },
    Control {
        id: AUTOLOCK,
        name: "Auto-lock",
        description: "Screen lock after 10 minutes idle",
    },
    Control {
        id: GUEST_ACCOUNTS,
        name: "Guest Accounts",
        description: "No active guest accounts",
    },
];

fn control(
    index: usize,
    platform: Platform,
    probes: Vec<Probe>,
    fallback: Verdict,
    remediation: &str,
) -> ConfigCheck {
    let control = &CONTROLS[index];
    ConfigCheck {
        id: control.id.into(),
        name: control.name.into(),
        description: control.description.into(),
        platform,
        probes,
        fallback,
        remediation: remediation.into(),
    }
}

/// The four BYOD controls for a platform, in report order
pub fn byod_checks(platform: Platform) -> Vec<ConfigCheck> {
    match platform {
        Platform::MacOS => macos_checks(),
        Platform::Windows => windows_checks(),
        Platform::Linux => linux_checks(),
        Platform::Unknown => unsupported_checks(platform),
    }
}

fn unsupported_checks(platform: Platform) -> Vec<ConfigCheck> {
    (0..CONTROLS.len())
        .map(|i| {
            control(
                i,
                platform,
                Vec::new(),
                Verdict::fail(format!("Unsupported platform: {}", platform.display_name())),
                "Run the checker on macOS, Windows or Linux",
            )
        })
        .collect()
}

fn macos_checks() -> Vec<ConfigCheck> {
    let p = Platform::MacOS;
    vec![
        control(
            0,
            p,
            vec![
                probe(
                    command("defaults", &["read", "/Library/Preferences/com.apple.alf", "globalstate"]),
                    pattern(Some(r"^\s*[12]\s*$"), Some(r"^\s*0\s*$"), None),
                    "macOS firewall is enabled",
                    "macOS firewall is disabled",
                ),
                probe(
                    command("pgrep", &["-f", "socketfilterfw"]),
                    CheckType::Present { passed: true },
                    "macOS firewall appears to be running",
                    "",
                ),
            ],
            Verdict::fail("Unable to verify firewall status (insufficient permissions)"),
            "Enable macOS firewall: System Settings > Network > Firewall > Turn On Firewall",
        ),
        control(
            1,
            p,
            vec![probe(
                command("fdesetup", &["status"]),
                pattern(Some("FileVault is On"), None, Some(false)),
                "FileVault encryption is enabled",
                "FileVault encryption is not enabled",
            )],
            Verdict::fail("FileVault encryption is not enabled"),
            "Enable FileVault encryption: System Settings > Privacy & Security > FileVault > Turn On",
        ),
        control(
            2,
            p,
            vec![
                probe(
                    command("pmset", &["-g"]),
                    within(r"displaysleep\s+(\d+)", 10, 10, 1),
                    "Display sleep timeout: {minutes} minutes",
                    "Display sleep timeout too long: {minutes} minutes",
                ),
                probe(
                    command("defaults", &["read", "com.apple.screensaver", "idleTime"]),
                    within(r"(\d+)", 10, 600, 60),
                    "Screen saver timeout: {minutes} minutes",
                    "Screen saver timeout too long: {minutes} minutes",
                ),
            ],
            Verdict::fail("Unable to determine screen lock timeout"),
            "Set display sleep to 10 minutes or less and require a password after sleep: \
             System Settings > Lock Screen",
        ),
        control(
            3,
            p,
            vec![
                probe(
                    command("dscl", &[".", "-read", "/Users/Guest"]),
                    CheckType::Present { passed: false },
                    "",
                    "Guest account is enabled",
                ),
                probe(
                    command("dscl", &[".", "-list", "/Users"]),
                    pattern(None, Some(r"(?m)^Guest\s*$"), Some(true)),
                    "Guest account appears to be disabled",
                    "Guest account may be enabled",
                ),
            ],
            Verdict::pass("Guest account appears to be disabled"),
            "Disable guest account: System Settings > Users & Groups > Guest User > \
             Allow guests to log in to this computer (off)",
        ),
    ]
}

fn windows_checks() -> Vec<ConfigCheck> {
    let p = Platform::Windows;
    vec![
        control(
            0,
            p,
            vec![
                probe(
                    command("netsh", &["advfirewall", "show", "allprofiles", "state"]),
                    pattern(Some(r"State\s+ON"), Some(r"State\s+OFF"), None),
                    "Windows Defender Firewall is enabled for all profiles",
                    "Windows Defender Firewall is disabled for at least one profile",
                ),
                probe(
                    command(
                        "powershell",
                        &["-NoProfile", "-Command", "Get-NetFirewallProfile | Select-Object Name, Enabled"],
                    ),
                    pattern(Some(r"\bTrue\b"), Some(r"\bFalse\b"), None),
                    "Windows Defender Firewall is enabled",
                    "Windows Defender Firewall is not fully enabled",
                ),
            ],
            Verdict::fail("Unable to check firewall status"),
            "Enable Windows Defender Firewall: Control Panel > System and Security > \
             Windows Defender Firewall > Turn Windows Defender Firewall on or off",
        ),
        control(
            1,
            p,
            vec![probe(
                command("manage-bde", &["-status"]),
                pattern(Some("Protection On"), None, Some(false)),
                "BitLocker encryption is enabled",
                "BitLocker encryption is not enabled",
            )
            .or_else(Verdict::fail("Unable to check BitLocker status"))],
            Verdict::fail("BitLocker encryption is not enabled"),
            "Enable BitLocker encryption: Control Panel > System and Security > \
             BitLocker Drive Encryption > Turn on BitLocker",
        ),
        control(
            2,
            p,
            vec![
                probe(
                    command(
                        "reg",
                        &["query", r"HKEY_CURRENT_USER\Control Panel\Desktop", "/v", "ScreenSaveTimeOut"],
                    ),
                    within(r"ScreenSaveTimeOut\s+REG_SZ\s+(\d+)", 10, 600, 60),
                    "Screen lock timeout: {minutes} minutes",
                    "Screen lock timeout too long: {minutes} minutes",
                ),
                probe(
                    command("powercfg", &["/query", "SCHEME_CURRENT", "SUB_VIDEO", "VIDEOIDLE"]),
                    within(r"Current AC Power Setting Index: 0x([0-9a-fA-F]+)", 16, 600, 60),
                    "Display timeout: {minutes} minutes",
                    "Display timeout too long: {minutes} minutes",
                ),
            ],
            Verdict::fail("Screen lock not configured properly"),
            "Configure screen lock: Control Panel > Personalization > Screen Saver > Wait \
             (10 minutes or less) and check \"On resume, display logon screen\"",
        ),
        control(
            3,
            p,
            vec![probe(
                command("net", &["user", "guest"]),
                pattern(Some(r"Account active\s+No"), None, Some(false)),
                "Guest account is disabled",
                "Guest account is enabled",
            )
            .or_else(Verdict::pass("Guest account not found (disabled)"))],
            Verdict::pass("Guest account not found (disabled)"),
            "Disable guest account: run \"net user guest /active:no\" as administrator",
        ),
    ]
}

fn linux_checks() -> Vec<ConfigCheck> {
    let p = Platform::Linux;
    vec![
        control(
            0,
            p,
            vec![
                probe(
                    command("ufw", &["status"]),
                    pattern(Some("Status: active"), Some("Status: inactive"), None),
                    "UFW firewall is active",
                    "UFW firewall is inactive",
                ),
                probe(
                    command("firewall-cmd", &["--state"]),
                    pattern(Some("running"), None, Some(false)),
                    "firewalld is running",
                    "firewalld is not running",
                ),
                probe(
                    command("iptables", &["-S"]),
                    pattern(Some(r"(?m)^-A "), None, Some(false)),
                    "iptables firewall rules are configured",
                    "No iptables firewall rules found",
                ),
            ],
            Verdict::fail("No firewall found or unable to check status"),
            "Install and enable a firewall: \"sudo apt install ufw && sudo ufw enable\" on \
             Ubuntu/Debian, or \"sudo systemctl enable --now firewalld\" on Fedora/RHEL",
        ),
        control(
            1,
            p,
            vec![
                probe(
                    command("lsblk", &["-o", "NAME,FSTYPE"]),
                    pattern(Some("crypto_LUKS"), None, None),
                    "LUKS encryption detected",
                    "",
                ),
                probe(
                    command("dmsetup", &["table", "--target", "crypt"]),
                    pattern(Some(r"\bcrypt\b"), None, None),
                    "Disk encryption detected",
                    "",
                ),
            ],
            Verdict::fail("No disk encryption detected"),
            "Enable disk encryption: choose LUKS full disk encryption when installing the OS \
             (encrypting an existing partition with cryptsetup destroys its data, back up first)",
        ),
        control(
            2,
            p,
            vec![
                probe(
                    command("gsettings", &["get", "org.gnome.desktop.screensaver", "lock-enabled"]),
                    pattern(None, Some("false"), None),
                    "",
                    "Screen lock is disabled",
                ),
                probe(
                    command("gsettings", &["get", "org.gnome.desktop.session", "idle-delay"]),
                    within(r"(\d+)\s*$", 10, 600, 60),
                    "Screen lock timeout: {minutes} minutes",
                    "Screen lock timeout too long: {minutes} minutes",
                ),
                probe(
                    Source::File {
                        path: "~/.config/kscreenlockerrc".into(),
                    },
                    within(r"(?m)^Timeout=(\d+)", 10, 10, 1),
                    "Screen lock timeout: {minutes} minutes",
                    "Screen lock timeout too long: {minutes} minutes",
                ),
            ],
            Verdict::fail("Screen lock not configured"),
            "Configure screen lock: Settings > Privacy > Screen Lock on GNOME, or \
             System Settings > Screen Locking on KDE (10 minutes or less)",
        ),
        control(
            3,
            p,
            vec![
                probe(
                    command("getent", &["passwd", "guest"]),
                    pattern(None, None, None),
                    "",
                    "",
                )
                .or_else(Verdict::pass("No guest account found")),
                probe(
                    command("getent", &["shadow", "guest"]),
                    pattern(Some(r"^guest:[!*]"), None, Some(false)),
                    "Guest account is locked",
                    "Guest account is active",
                ),
                probe(
                    command("getent", &["passwd", "guest"]),
                    pattern(Some(r"(/bin/false|nologin)\s*$"), None, Some(false)),
                    "Guest account has login disabled",
                    "Guest account exists (unable to verify lock status)",
                ),
            ],
            Verdict::fail("Unable to verify guest account status"),
            "Lock the guest account: run \"sudo usermod -L guest\" or \"sudo passwd -l guest\"",
        ),
    ]
}
