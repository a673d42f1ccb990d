// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::config::params;
use crate::ParamSpace;
use labwired_cosim_config::Platform;
use serde::Serialize;

pub const PROGRAM_NAME: &str = "./toplevel";

/// Always passed to the host: no display, monitor to /dev/null, one instruction
/// per icount tick, gdb stub enabled.
pub const STANDARD_ARGUMENTS: [&str; 7] = [
    PROGRAM_NAME,
    "-nographic",
    "-monitor",
    "/dev/null",
    "-icount",
    "1",
    "-s",
];

/// Kernel parameter and the host option it turns into.
const LINUX_ARGUMENTS: [(&str, &str); 4] = [
    (params::KERNEL, "--kernel"),
    (params::ROOTFS, "--initrd"),
    (params::DTB, "--dtb"),
    (params::KERNEL_CMD, "--append"),
];

/// Command line the host simulator is instantiated with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArgumentVector {
    args: Vec<String>,
}

impl ArgumentVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn add_standard_arguments(&mut self) {
        for arg in STANDARD_ARGUMENTS {
            self.push(arg);
        }
    }

    /// `--kernel`, `--initrd`, `--dtb` and `--append`, each only when the
    /// matching parameter is set and non-empty.
    pub fn add_linux_arguments(&mut self, params: &dyn ParamSpace) {
        for (param, flag) in LINUX_ARGUMENTS {
            let Some(value) = params.string_param(param) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            self.push(flag);
            self.push(value);
        }
    }

    pub fn add_aarch64_arguments(&mut self) {
        self.push(PROGRAM_NAME);
    }

    /// Append `CPU.extra_arguments` split on whitespace.
    pub fn add_extra_arguments(&mut self, params: &dyn ParamSpace) {
        let Some(extra) = params.string_param(params::EXTRA_ARGUMENTS) else {
            return;
        };
        for arg in extra.split_whitespace() {
            self.push(arg);
        }
    }

    pub fn add_platform_arguments(&mut self, platform: Platform, params: &dyn ParamSpace) {
        match platform {
            Platform::Generic => {
                self.add_standard_arguments();
                self.add_linux_arguments(params);
            }
            Platform::Aarch64 => self.add_aarch64_arguments(),
        }
        self.add_extra_arguments(params);
    }

    pub fn print(&self) {
        for (i, arg) in self.args.iter().enumerate() {
            tracing::info!("argv[{}] = {}", i, arg);
        }
    }
}

impl std::fmt::Display for ArgumentVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosim::ParamTable;
    use labwired_cosim_config::ParamValue;

    fn table(entries: &[(&str, &str)]) -> ParamTable {
        let mut t = ParamTable::new();
        for (k, v) in entries {
            t.insert(*k, ParamValue::Text(v.to_string()));
        }
        t
    }

    #[test]
    fn test_standard_prefix() {
        let mut argv = ArgumentVector::new();
        argv.add_standard_arguments();
        assert_eq!(
            argv.as_slice(),
            &["./toplevel", "-nographic", "-monitor", "/dev/null", "-icount", "1", "-s"]
        );
    }

    #[test]
    fn test_linux_arguments_skip_empty() {
        let params = table(&[
            ("CPU.kernel", "Image"),
            ("CPU.rootfs", ""),
            ("CPU.dtb", "board.dtb"),
            ("CPU.kernel_cmd", "console=ttyAMA0 earlycon"),
        ]);
        let mut argv = ArgumentVector::new();
        argv.add_linux_arguments(&params);
        assert_eq!(
            argv.as_slice(),
            &[
                "--kernel",
                "Image",
                "--dtb",
                "board.dtb",
                "--append",
                "console=ttyAMA0 earlycon"
            ]
        );
    }

    #[test]
    fn test_extra_arguments_tokenized() {
        let params = table(&[("CPU.extra_arguments", "  -m 2G   -smp 2 ")]);
        let mut argv = ArgumentVector::new();
        argv.add_extra_arguments(&params);
        assert_eq!(argv.as_slice(), &["-m", "2G", "-smp", "2"]);

        let mut argv = ArgumentVector::new();
        argv.add_extra_arguments(&ParamTable::new());
        assert!(argv.is_empty());
    }

    #[test]
    fn test_platform_profiles() {
        let params = table(&[("CPU.kernel", "Image"), ("CPU.extra_arguments", "-d int")]);

        let mut generic = ArgumentVector::new();
        generic.add_platform_arguments(Platform::Generic, &params);
        assert_eq!(generic.len(), 7 + 2 + 2);
        assert_eq!(generic.as_slice()[7], "--kernel");
        assert_eq!(generic.as_slice().last().map(String::as_str), Some("int"));

        let mut aarch64 = ArgumentVector::new();
        aarch64.add_platform_arguments(Platform::Aarch64, &params);
        assert_eq!(aarch64.to_string(), "./toplevel -d int");
    }
}
