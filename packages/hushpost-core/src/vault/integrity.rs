//! # Device Integrity Attestation
//!
//! Four independent runtime checks, aggregated into a single verdict:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (a) emulator        virtualized device markers                        │
//! │  (b) debugger        a tracer attached to this process                 │
//! │  (c) compromised OS  jailbreak / root artifacts, sandbox escape        │
//! │  (d) hooking         injection frameworks mapped or preloaded          │
//! │                                                                         │
//! │  verdict = Tampered if ANY check trips, else Trusted                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Limits
//!
//! This is a coarse, best-effort signal. Every check reads state the
//! process itself can observe, so an adversary who controls the device can
//! hide from all of them. Treat `Trusted` as "nothing obvious", never as
//! proof. The vault reports; policy (refusing to start, warning the user)
//! belongs to the caller.
//!
//! Debugger state comes from `sysctl(KERN_PROC_PID)` on Apple platforms and
//! `/proc/self/status` elsewhere. Hosts may pass their own observations in
//! as [`IntegrityReport`] fields; the two reports are merged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One of the four checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityCheck {
    /// Emulated or virtualized device
    Emulator,
    /// Debugger attached
    Debugger,
    /// Jailbreak or root
    CompromisedOs,
    /// Code-injection framework present
    HookingFramework,
}

/// Raw results of the four checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityReport {
    /// Check (a)
    pub emulator: bool,
    /// Check (b)
    pub debugger: bool,
    /// Check (c)
    pub compromised_os: bool,
    /// Check (d)
    pub hooking_framework: bool,
}

impl IntegrityReport {
    /// OR the two reports check by check
    pub fn merge(self, other: IntegrityReport) -> IntegrityReport {
        IntegrityReport {
            emulator: self.emulator || other.emulator,
            debugger: self.debugger || other.debugger,
            compromised_os: self.compromised_os || other.compromised_os,
            hooking_framework: self.hooking_framework || other.hooking_framework,
        }
    }

    /// Checks that tripped, in (a)-(d) order
    pub fn tripped(&self) -> Vec<IntegrityCheck> {
        [
            (self.emulator, IntegrityCheck::Emulator),
            (self.debugger, IntegrityCheck::Debugger),
            (self.compromised_os, IntegrityCheck::CompromisedOs),
            (self.hooking_framework, IntegrityCheck::HookingFramework),
        ]
        .into_iter()
        .filter_map(|(hit, check)| hit.then_some(check))
        .collect()
    }

    /// Aggregate verdict
    pub fn verdict(&self) -> IntegrityVerdict {
        let reasons = self.tripped();
        if reasons.is_empty() {
            IntegrityVerdict::Trusted
        } else {
            IntegrityVerdict::Tampered { reasons }
        }
    }
}

/// Outcome of [`attest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum IntegrityVerdict {
    /// No check tripped
    Trusted,
    /// At least one check tripped
    Tampered {
        /// Which ones
        reasons: Vec<IntegrityCheck>,
    },
}

impl IntegrityVerdict {
    /// Whether any check tripped
    pub fn is_tampered(&self) -> bool {
        matches!(self, IntegrityVerdict::Tampered { .. })
    }
}

/// Source of the four signals
pub trait IntegrityProbe: Send + Sync {
    /// Check (a)
    fn is_emulator(&self) -> bool;
    /// Check (b)
    fn is_debugger_attached(&self) -> bool;
    /// Check (c)
    fn is_os_compromised(&self) -> bool;
    /// Check (d)
    fn has_hooking_framework(&self) -> bool;

    /// Run all four checks
    fn report(&self) -> IntegrityReport {
        IntegrityReport {
            emulator: self.is_emulator(),
            debugger: self.is_debugger_attached(),
            compromised_os: self.is_os_compromised(),
            hooking_framework: self.has_hooking_framework(),
        }
    }
}

/// Run every check on `probe` and aggregate.
pub fn attest(probe: &dyn IntegrityProbe) -> IntegrityVerdict {
    let report = probe.report();
    let verdict = report.verdict();
    if let IntegrityVerdict::Tampered { reasons } = &verdict {
        tracing::warn!("Integrity checks tripped: {:?}", reasons);
    }
    verdict
}

// ============================================================================
// SYSTEM PROBE
// ============================================================================

/// Jailbreak artifacts on iOS
///
/// `bin/bash`, `usr/sbin/sshd` and `etc/apt` are stock on macOS and Linux,
/// so this list only means anything on an iOS device.
pub const IOS_JAILBREAK_PATHS: &[&str] = &[
    "Applications/Cydia.app",
    "Library/MobileSubstrate/MobileSubstrate.dylib",
    "Library/MobileSubstrate/CydiaSubstrate.dylib",
    "bin/bash",
    "usr/sbin/sshd",
    "etc/apt",
    "private/var/lib/apt",
    "private/var/mobile/Library/SBSettings/Themes",
];

/// Root artifacts on Android
pub const ANDROID_ROOT_PATHS: &[&str] = &[
    "system/app/Superuser.apk",
    "sbin/su",
    "system/bin/su",
    "system/xbin/su",
    "data/local/xbin/su",
    "data/local/bin/su",
    "data/local/su",
    "su/bin/su",
];

/// Compromised-OS markers for the platform this build targets
pub fn platform_compromised_markers() -> &'static [&'static str] {
    #[cfg(target_os = "ios")]
    {
        IOS_JAILBREAK_PATHS
    }
    #[cfg(target_os = "android")]
    {
        ANDROID_ROOT_PATHS
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        &[]
    }
}

/// Files present only on emulator images
const EMULATOR_PATHS: &[&str] = &[
    "dev/qemu_pipe",
    "dev/socket/qemud",
    "system/bin/qemu-props",
    "system/lib/libc_malloc_debug_qemu.so",
];

/// Hardware names reported by emulator kernels
const EMULATOR_CPU_MARKERS: &[&str] = &["goldfish", "ranchu"];

/// Library names of known hooking frameworks, matched case-insensitively
const HOOKING_MARKERS: &[&str] = &[
    "substrate",
    "substrateinserter",
    "frida",
    "xposed",
    "libcycript",
];

/// Environment variables used to inject libraries at load time
const PRELOAD_VARS: &[&str] = &["DYLD_INSERT_LIBRARIES", "LD_PRELOAD"];

/// Probe that inspects the filesystem and `/proc`
///
/// All paths are resolved against `root`, which is `/` in production.
pub struct SystemProbe {
    root: PathBuf,
    compromised_markers: &'static [&'static str],
    inspect_environment: bool,
    sandbox_write_test: bool,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe {
    /// Probe the real device
    ///
    /// Also asks the kernel and the process environment, which a
    /// [`with_root`](Self::with_root) probe never does.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
            compromised_markers: platform_compromised_markers(),
            inspect_environment: true,
            sandbox_write_test: cfg!(target_os = "ios"),
        }
    }

    /// Probe a directory tree standing in for the device root, looking for
    /// `compromised_markers` ([`IOS_JAILBREAK_PATHS`], [`ANDROID_ROOT_PATHS`])
    pub fn with_root(
        root: impl Into<PathBuf>,
        compromised_markers: &'static [&'static str],
    ) -> Self {
        Self {
            root: root.into(),
            compromised_markers,
            inspect_environment: false,
            sandbox_write_test: false,
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.path(relative)).ok()
    }

    /// A sandboxed app cannot write outside its container
    fn escaped_sandbox(&self) -> bool {
        let probe = self.path("private/jailbreak_test");
        match std::fs::write(&probe, b"x") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }
}

/// `P_TRACED` from `<sys/proc.h>`
#[cfg(any(target_os = "ios", target_os = "macos"))]
const P_TRACED: libc::c_int = 0x0000_0800;

/// Ask the kernel whether this process is being traced
#[cfg(any(target_os = "ios", target_os = "macos"))]
fn kernel_reports_tracer() -> bool {
    let mut info: libc::kinfo_proc = unsafe { std::mem::zeroed() };
    let mut size = std::mem::size_of::<libc::kinfo_proc>();
    let mut mib = [
        libc::CTL_KERN,
        libc::KERN_PROC,
        libc::KERN_PROC_PID,
        unsafe { libc::getpid() },
    ];
    // SAFETY: mib, info and size outlive the call and size matches info
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            &mut info as *mut libc::kinfo_proc as *mut libc::c_void,
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        tracing::debug!("sysctl(KERN_PROC_PID) failed: {}", std::io::Error::last_os_error());
        return false;
    }
    info.kp_proc.p_flag & P_TRACED != 0
}

#[cfg(not(any(target_os = "ios", target_os = "macos")))]
fn kernel_reports_tracer() -> bool {
    false
}

fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|v| v.trim().parse().ok())
}

fn mentions_hooking(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    HOOKING_MARKERS.iter().any(|m| lower.contains(m))
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

impl IntegrityProbe for SystemProbe {
    fn is_emulator(&self) -> bool {
        if cfg!(all(
            target_os = "ios",
            any(target_arch = "x86_64", target_arch = "x86")
        )) {
            return true;
        }
        if self.inspect_environment && std::env::var_os("SIMULATOR_DEVICE_NAME").is_some() {
            return true;
        }
        if EMULATOR_PATHS.iter().any(|p| exists(&self.path(p))) {
            return true;
        }
        self.read("proc/cpuinfo")
            .map(|info| {
                let lower = info.to_ascii_lowercase();
                EMULATOR_CPU_MARKERS.iter().any(|m| lower.contains(m))
            })
            .unwrap_or(false)
    }

    fn is_debugger_attached(&self) -> bool {
        if self.inspect_environment && kernel_reports_tracer() {
            return true;
        }
        self.read("proc/self/status")
            .and_then(|s| tracer_pid(&s))
            .map(|pid| pid != 0)
            .unwrap_or(false)
    }

    fn is_os_compromised(&self) -> bool {
        if let Some(hit) = self
            .compromised_markers
            .iter()
            .find(|p| exists(&self.path(p)))
        {
            tracing::debug!("Compromised-OS marker present: {}", hit);
            return true;
        }
        self.sandbox_write_test && self.escaped_sandbox()
    }

    fn has_hooking_framework(&self) -> bool {
        if self
            .read("proc/self/maps")
            .map(|maps| mentions_hooking(&maps))
            .unwrap_or(false)
        {
            return true;
        }
        self.inspect_environment
            && PRELOAD_VARS.iter().any(|var| {
                std::env::var(var)
                    .map(|v| mentions_hooking(&v))
                    .unwrap_or(false)
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FixedProbe(IntegrityReport);

    impl IntegrityProbe for FixedProbe {
        fn is_emulator(&self) -> bool {
            self.0.emulator
        }
        fn is_debugger_attached(&self) -> bool {
            self.0.debugger
        }
        fn is_os_compromised(&self) -> bool {
            self.0.compromised_os
        }
        fn has_hooking_framework(&self) -> bool {
            self.0.hooking_framework
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_debugger_alone_is_tampered() {
        let probe = FixedProbe(IntegrityReport {
            debugger: true,
            ..Default::default()
        });
        let verdict = attest(&probe);
        assert!(verdict.is_tampered());
        assert_eq!(
            verdict,
            IntegrityVerdict::Tampered {
                reasons: vec![IntegrityCheck::Debugger]
            }
        );
    }

    #[test]
    fn test_clean_is_trusted() {
        let probe = FixedProbe(IntegrityReport::default());
        assert_eq!(attest(&probe), IntegrityVerdict::Trusted);
    }

    #[test]
    fn test_any_single_check_trips() {
        for report in [
            IntegrityReport { emulator: true, ..Default::default() },
            IntegrityReport { compromised_os: true, ..Default::default() },
            IntegrityReport { hooking_framework: true, ..Default::default() },
        ] {
            assert!(attest(&FixedProbe(report)).is_tampered());
        }
    }

    #[test]
    fn test_merge() {
        let a = IntegrityReport { debugger: true, ..Default::default() };
        let b = IntegrityReport { emulator: true, ..Default::default() };
        let merged = a.merge(b);
        assert_eq!(
            merged.tripped(),
            vec![IntegrityCheck::Emulator, IntegrityCheck::Debugger]
        );
    }

    #[test]
    fn test_system_probe_clean_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "proc/self/status", "Name:\tapp\nTracerPid:\t0\n");
        write(dir.path(), "proc/self/maps", "7f00 r-xp /system/lib/libc.so\n");
        write(dir.path(), "proc/cpuinfo", "Hardware\t: Qualcomm\n");

        let probe = SystemProbe::with_root(dir.path(), IOS_JAILBREAK_PATHS);
        assert_eq!(probe.report(), IntegrityReport::default());
    }

    #[test]
    fn test_system_probe_traced_process() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "proc/self/status", "Name:\tapp\nTracerPid:\t4242\n");

        let probe = SystemProbe::with_root(dir.path(), ANDROID_ROOT_PATHS);
        assert!(probe.is_debugger_attached());
        assert!(attest(&probe).is_tampered());
    }

    #[test]
    fn test_system_probe_root_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "system/xbin/su", "");
        assert!(SystemProbe::with_root(dir.path(), ANDROID_ROOT_PATHS).is_os_compromised());
        assert!(!SystemProbe::with_root(dir.path(), IOS_JAILBREAK_PATHS).is_os_compromised());

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Applications/Cydia.app/Info.plist", "");
        assert!(SystemProbe::with_root(dir.path(), IOS_JAILBREAK_PATHS).is_os_compromised());
    }

    #[test]
    fn test_desktop_shell_is_not_a_jailbreak() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bin/bash", "");
        write(dir.path(), "usr/sbin/sshd", "");
        write(dir.path(), "etc/apt/sources.list", "");

        assert!(!SystemProbe::with_root(dir.path(), ANDROID_ROOT_PATHS).is_os_compromised());
        assert!(SystemProbe::with_root(dir.path(), IOS_JAILBREAK_PATHS).is_os_compromised());
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    #[test]
    fn test_desktop_host_has_no_markers() {
        assert!(platform_compromised_markers().is_empty());
        assert!(!SystemProbe::new().is_os_compromised());
    }

    #[test]
    fn test_system_probe_hooking_and_emulator() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "proc/self/maps", "7f00 r-xp /data/local/tmp/frida-agent-64.so\n");
        write(dir.path(), "proc/cpuinfo", "Hardware\t: ranchu\n");

        let probe = SystemProbe::with_root(dir.path(), ANDROID_ROOT_PATHS);
        assert!(probe.has_hooking_framework());
        assert!(probe.is_emulator());
    }

    #[cfg(any(target_os = "ios", target_os = "macos"))]
    #[test]
    fn test_kernel_sees_untraced_test_process() {
        assert!(!kernel_reports_tracer());
        assert!(!SystemProbe::new().is_debugger_attached());
    }

    #[test]
    fn test_tracer_pid_parse() {
        assert_eq!(tracer_pid("TracerPid:\t0"), Some(0));
        assert_eq!(tracer_pid("Name: x\nTracerPid:   17\n"), Some(17));
        assert_eq!(tracer_pid("Name: x"), None);
    }
}
