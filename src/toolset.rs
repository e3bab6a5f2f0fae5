//! WiX toolset discovery and invocation
//!
//! Builds an MSI from a compiled project with either generation of the WiX
//! toolset:
//!
//! - WiX v3: `candle` compiles the source to a `.wixobj`, `light` links it;
//! - WiX v4 and newer: `wix convert` upgrades the v3 source in place, then
//!   `wix build` produces the package.
//!
//! The same command lines can be written to a batch file instead of being
//! run, for builds on a machine with the toolset installed.

use crate::compiler::{Compilation, Compiler};
use crate::config::{CompilerConfig, ToolsetPreference};
use crate::culture;
use crate::error::{Result, WixError};
use crate::model::extension::WixExtension;
use crate::model::project::{Platform, Project};
use std::path::{Path, PathBuf};
use std::process::Command;

/// WiX toolset version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WixVersion {
    V3,
    V4,
    V5,
}

impl WixVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            WixVersion::V3 => "3.x",
            WixVersion::V4 => "4.x",
            WixVersion::V5 => "5.x",
        }
    }

    /// Version from `wix --version` output such as `4.0.5+0f5f5e2`
    pub fn from_version_output(output: &str) -> Option<Self> {
        let major: u32 = output
            .trim()
            .split(['.', '+', '-'])
            .next()?
            .trim_start_matches(['v', 'V'])
            .parse()
            .ok()?;
        match major {
            3 => Some(WixVersion::V3),
            4 => Some(WixVersion::V4),
            m if m >= 5 => Some(WixVersion::V5),
            _ => None,
        }
    }

    pub fn is_v3(&self) -> bool {
        matches!(self, WixVersion::V3)
    }
}

/// Everything one build needs to know
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Main source first, then additional sources
    pub sources: Vec<PathBuf>,
    pub libraries: Vec<PathBuf>,
    pub output: PathBuf,
    /// Directory for intermediate `.wixobj` files
    pub obj_dir: PathBuf,
    pub extensions: Vec<WixExtension>,
    pub cultures: Vec<String>,
    pub architecture: Option<Platform>,
    pub candle_options: Vec<String>,
    pub light_options: Vec<String>,
}

impl BuildConfig {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let output = source.with_extension("msi");
        let obj_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            sources: vec![source],
            output,
            obj_dir,
            ..Default::default()
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn library(mut self, library: impl Into<PathBuf>) -> Self {
        self.libraries.push(library.into());
        self
    }

    pub fn extension(mut self, extension: WixExtension) -> Self {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
        self
    }

    pub fn culture(mut self, culture: impl Into<String>) -> Self {
        self.cultures.push(culture.into());
        self
    }

    pub fn architecture(mut self, architecture: Platform) -> Self {
        self.architecture = Some(architecture);
        self
    }

    /// Build settings of a compiled project. Options come from both the
    /// compiler config and the project.
    pub fn from_compilation(compilation: &Compilation, config: &CompilerConfig) -> Self {
        let project = &compilation.project;
        let source_base = &project.source_base_dir;

        let mut build = Self::new(compilation.wxs_path());
        for source in &project.wxs_files {
            build = build.source(source_base.join(source));
        }
        for library in &project.lib_files {
            build = build.library(source_base.join(library));
        }
        for extension in &compilation.extensions {
            build = build.extension(extension.clone());
        }
        for culture in culture::split_cultures(&project.language) {
            build = build.culture(culture);
        }
        build.architecture = project.platform;

        build.candle_options = split_options(&config.candle_options);
        build.candle_options.extend(split_options(project.candle_options.as_deref().unwrap_or("")));
        build.light_options = split_options(&config.light_options);
        build.light_options.extend(split_options(project.light_options.as_deref().unwrap_or("")));
        build
    }

    /// `.wixobj` produced by candle for a source
    pub fn obj_file(&self, source: &Path) -> PathBuf {
        let name = source.with_extension("wixobj");
        match name.file_name() {
            Some(file_name) => self.obj_dir.join(file_name),
            None => name,
        }
    }
}

fn split_options(options: &str) -> Vec<String> {
    options.split_whitespace().map(str::to_string).collect()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Detected WiX toolset installation
#[derive(Debug, Clone)]
pub struct WixToolset {
    pub version: WixVersion,
    /// Directory of the binaries
    pub path: PathBuf,
    pub candle_path: Option<PathBuf>,
    pub light_path: Option<PathBuf>,
    pub wix_path: Option<PathBuf>,
}

impl WixToolset {
    /// Find the toolset: the configured location (or `%WIX%\bin`) first,
    /// then `PATH`. `Auto` prefers `wix` over `candle`/`light`.
    pub fn detect(config: &CompilerConfig) -> Result<Self> {
        let location = config.resolved_wix_location();
        let find = |tool: &str| -> Option<PathBuf> {
            if let Some(dir) = &location {
                let exe = dir.join(format!("{}{}", tool, std::env::consts::EXE_SUFFIX));
                if exe.is_file() {
                    return Some(exe);
                }
                if let Ok(path) = which::which_in(tool, Some(dir), ".") {
                    return Some(path);
                }
            }
            which::which(tool).ok()
        };

        let v4 = || {
            find("wix").map(|wix_path| {
                let version = query_version(&wix_path).unwrap_or(WixVersion::V4);
                Self {
                    version,
                    path: parent_dir(&wix_path),
                    candle_path: None,
                    light_path: None,
                    wix_path: Some(wix_path),
                }
            })
        };
        let v3 = || match (find("candle"), find("light")) {
            (Some(candle), Some(light)) => Some(Self {
                version: WixVersion::V3,
                path: parent_dir(&candle),
                candle_path: Some(candle),
                light_path: Some(light),
                wix_path: None,
            }),
            _ => None,
        };

        let toolset = match config.wix_version {
            ToolsetPreference::Auto => v4().or_else(v3),
            ToolsetPreference::V3 => v3(),
            ToolsetPreference::V4 => v4(),
        };

        match toolset {
            Some(toolset) => {
                log::debug!(
                    "Using WiX {} from {}",
                    toolset.version.as_str(),
                    toolset.path.display()
                );
                Ok(toolset)
            }
            None => Err(WixError::ToolsetNotFound),
        }
    }

    /// Toolset with default binary names, for generating commands
    pub fn with_version(version: WixVersion) -> Self {
        let v3 = version.is_v3();
        Self {
            version,
            path: PathBuf::from("."),
            candle_path: v3.then(|| PathBuf::from("candle.exe")),
            light_path: v3.then(|| PathBuf::from("light.exe")),
            wix_path: (!v3).then(|| PathBuf::from("wix")),
        }
    }

    fn candle(&self) -> PathBuf {
        self.candle_path
            .clone()
            .unwrap_or_else(|| self.path.join("candle.exe"))
    }

    fn light(&self) -> PathBuf {
        self.light_path
            .clone()
            .unwrap_or_else(|| self.path.join("light.exe"))
    }

    fn wix(&self) -> PathBuf {
        self.wix_path.clone().unwrap_or_else(|| PathBuf::from("wix"))
    }

    /// `candle` arguments
    pub fn candle_args(&self, config: &BuildConfig) -> Vec<String> {
        let mut args = config.candle_options.clone();

        if let Some(arch) = &config.architecture {
            args.push("-arch".to_string());
            args.push(arch.as_str().to_string());
        }

        for ext in &config.extensions {
            args.push("-ext".to_string());
            args.push(ext.v3_dll().to_string());
        }

        for source in &config.sources {
            args.push(path_arg(source));
        }

        // candle wants a directory when compiling several sources
        args.push("-out".to_string());
        match config.sources.as_slice() {
            [single] => args.push(path_arg(&config.obj_file(single))),
            _ => args.push(format!("{}{}", path_arg(&config.obj_dir), std::path::MAIN_SEPARATOR)),
        }
        args
    }

    /// `light` arguments
    pub fn light_args(&self, config: &BuildConfig) -> Vec<String> {
        let mut args = config.light_options.clone();

        args.push("-b".to_string());
        args.push(path_arg(&config.obj_dir));

        for source in &config.sources {
            args.push(path_arg(&config.obj_file(source)));
        }
        for library in &config.libraries {
            args.push(path_arg(library));
        }

        args.push("-out".to_string());
        args.push(path_arg(&config.output));

        for ext in &config.extensions {
            args.push("-ext".to_string());
            args.push(ext.v3_dll().to_string());
        }

        if !config.cultures.is_empty() {
            args.push(format!("-cultures:{}", config.cultures.join(";")));
        }
        args
    }

    /// `wix convert` arguments for the main source
    pub fn convert_args(&self, config: &BuildConfig) -> Vec<String> {
        let mut args = vec!["convert".to_string()];
        if let Some(source) = config.sources.first() {
            args.push(path_arg(source));
        }
        args
    }

    /// `wix build` arguments
    pub fn wix_build_args(&self, config: &BuildConfig) -> Vec<String> {
        let mut args = vec!["build".to_string()];

        if let Some(arch) = &config.architecture {
            args.push("-arch".to_string());
            args.push(arch.as_str().to_string());
        }

        for ext in &config.extensions {
            args.push("-ext".to_string());
            args.push(ext.v4_name().to_string());
        }

        if !config.cultures.is_empty() {
            args.push("-culture".to_string());
            args.push(config.cultures.join(";"));
        }

        args.push("-o".to_string());
        args.push(path_arg(&config.output));

        for source in &config.sources {
            args.push(path_arg(source));
        }
        for library in &config.libraries {
            args.push(path_arg(library));
        }
        args
    }

    /// Printable command lines of a build, in execution order
    pub fn build_commands(&self, config: &BuildConfig) -> Vec<String> {
        match self.version {
            WixVersion::V3 => vec![
                command_line(&self.candle(), &self.candle_args(config)),
                command_line(&self.light(), &self.light_args(config)),
            ],
            WixVersion::V4 | WixVersion::V5 => vec![
                command_line(&self.wix(), &self.convert_args(config)),
                command_line(&self.wix(), &self.wix_build_args(config)),
            ],
        }
    }

    /// Run the toolset on a written source
    pub fn build(&self, config: &BuildConfig) -> Result<PathBuf> {
        if let Some(parent) = config.output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match self.version {
            WixVersion::V3 => {
                run_tool(&self.candle(), &self.candle_args(config))?;
                run_tool(&self.light(), &self.light_args(config))?;
            }
            WixVersion::V4 | WixVersion::V5 => {
                // convert reports the fixes it applied through its exit code
                if let Err(e) = run_tool(&self.wix(), &self.convert_args(config)) {
                    log::warn!("{}", e);
                }
                run_tool(&self.wix(), &self.wix_build_args(config))?;
            }
        }

        log::info!("Built {}", config.output.display());
        Ok(config.output.clone())
    }

    /// Batch file running the build with this toolset
    pub fn build_script(&self, config: &BuildConfig) -> String {
        let mut lines = vec![
            "echo off".to_string(),
            "@setlocal".to_string(),
            format!("set WixLocation={}", self.path.display()),
        ];

        let steps: Vec<(PathBuf, Vec<String>, &str)> = match self.version {
            WixVersion::V3 => vec![
                (self.candle(), self.candle_args(config), "candle.exe"),
                (self.light(), self.light_args(config), "light.exe"),
            ],
            WixVersion::V4 | WixVersion::V5 => vec![
                (self.wix(), self.convert_args(config), ""),
                (self.wix(), self.wix_build_args(config), "wix build"),
            ],
        };

        for (tool, args, name) in steps {
            lines.push(format!("call \"{}\" {}", tool.display(), join_args(&args)));
            if !name.is_empty() {
                lines.push(format!("if ERRORLEVEL 1 @echo {} failed & GOTO ERROR", name));
            }
        }

        lines.extend(
            ["@endlocal", "EXIT /B 0", ":ERROR", "@endlocal", "EXIT /B 1"]
                .iter()
                .map(|s| s.to_string()),
        );

        let mut script = lines.join("\r\n");
        script.push_str("\r\n");
        script
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().unwrap_or(Path::new(".")).to_path_buf()
}

fn query_version(wix: &Path) -> Option<WixVersion> {
    let output = Command::new(wix).arg("--version").output().ok()?;
    WixVersion::from_version_output(&String::from_utf8_lossy(&output.stdout))
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains([' ', '\t', '&', '(', ')']) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

fn join_args(args: &[String]) -> String {
    args.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" ")
}

fn command_line(tool: &Path, args: &[String]) -> String {
    format!("{} {}", quote(&tool.to_string_lossy()), join_args(args))
}

fn run_tool(tool: &Path, args: &[String]) -> Result<()> {
    log::debug!("Running {}", command_line(tool, args));

    let output = Command::new(tool).args(args).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        log::debug!("{}", line);
    }

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    // candle and light print their errors on stdout
    let details = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    let name = tool
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Err(WixError::BuildFailed(format!(
        "{} exited with {}: {}",
        name, output.status, details
    )))
}

/// Compile `project`, write its source and build the MSI with the detected
/// toolset. Returns the MSI path.
pub fn build_msi(project: &Project, compiler: &mut Compiler) -> Result<PathBuf> {
    let toolset = WixToolset::detect(compiler.config())?;
    let compilation = compiler.compile(project)?;
    compilation.write()?;

    let config = BuildConfig::from_compilation(&compilation, compiler.config());
    toolset.build(&config)
}

/// Compile `project`, write its source and a batch file at `path` that
/// builds the MSI with the detected toolset
pub fn build_msi_cmd(project: &Project, compiler: &mut Compiler, path: &Path) -> Result<PathBuf> {
    let toolset = WixToolset::detect(compiler.config())?;
    write_build_script(&toolset, project, compiler, path)
}

/// [`build_msi_cmd`] with a given toolset
pub fn write_build_script(
    toolset: &WixToolset,
    project: &Project,
    compiler: &mut Compiler,
    path: &Path,
) -> Result<PathBuf> {
    let compilation = compiler.compile(project)?;
    compilation.write()?;

    let config = BuildConfig::from_compilation(&compilation, compiler.config());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, toolset.build_script(&config))?;
    log::info!("Generated {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dir::{Dir, File};
    use tempfile::TempDir;

    fn config() -> BuildConfig {
        BuildConfig::new(PathBuf::from("out").join("Setup.wxs"))
            .extension(WixExtension::Util)
            .extension(WixExtension::Util)
            .culture("en-US")
            .culture("de-DE")
    }

    #[test]
    fn test_version_output() {
        assert_eq!(WixVersion::from_version_output("4.0.5+0f5f5e2\n"), Some(WixVersion::V4));
        assert_eq!(WixVersion::from_version_output("5.0.0"), Some(WixVersion::V5));
        assert_eq!(WixVersion::from_version_output("6.0.1"), Some(WixVersion::V5));
        assert_eq!(WixVersion::from_version_output("garbage"), None);
    }

    #[test]
    fn test_with_version() {
        let v3 = WixToolset::with_version(WixVersion::V3);
        assert!(v3.candle_path.is_some());
        assert!(v3.wix_path.is_none());

        let v4 = WixToolset::with_version(WixVersion::V4);
        assert!(v4.candle_path.is_none());
        assert_eq!(v4.wix_path, Some(PathBuf::from("wix")));
    }

    #[test]
    fn test_candle_args() {
        let toolset = WixToolset::with_version(WixVersion::V3);
        let config = config();
        let args = toolset.candle_args(&config);

        assert_eq!(args.iter().filter(|a| *a == "-ext").count(), 1);
        assert!(args.contains(&"WixUtilExtension.dll".to_string()));
        let obj = path_arg(&PathBuf::from("out").join("Setup.wixobj"));
        assert_eq!(args[args.len() - 2..], ["-out".to_string(), obj]);
    }

    #[test]
    fn test_light_args() {
        let toolset = WixToolset::with_version(WixVersion::V3);
        let args = toolset.light_args(&config());
        assert!(args.contains(&"-cultures:en-US;de-DE".to_string()));
        assert!(args.contains(&path_arg(&PathBuf::from("out").join("Setup.msi"))));
        assert_eq!(args[0], "-b");
    }

    #[test]
    fn test_wix_build_args() {
        let toolset = WixToolset::with_version(WixVersion::V4);
        let config = config().architecture(Platform::X64);
        let args = toolset.wix_build_args(&config);
        assert_eq!(args[0], "build");
        assert_eq!(args[1..3], ["-arch".to_string(), "x64".to_string()]);
        assert!(args.contains(&"WixToolset.Util.wixext".to_string()));
        assert!(args.contains(&"-culture".to_string()));

        let commands = toolset.build_commands(&config);
        assert!(commands[0].starts_with("wix convert"));
        assert!(commands[1].starts_with("wix build"));
    }

    #[test]
    fn test_multiple_sources_use_obj_dir() {
        let toolset = WixToolset::with_version(WixVersion::V3);
        let config = config().source("Extra.wxs");
        let args = toolset.candle_args(&config);
        let out = args.last().unwrap();
        assert!(out.ends_with(std::path::MAIN_SEPARATOR));

        let light = toolset.light_args(&config);
        assert!(light.contains(&path_arg(&PathBuf::from("out").join("Extra.wixobj"))));
    }

    #[test]
    fn test_build_script() {
        let temp = TempDir::new().unwrap();
        let mut project = Project::new("Setup").dir(
            Dir::new(r"%ProgramFiles%\Acme").file(File::new("app.exe")),
        );
        project.out_dir = temp.path().to_path_buf();
        project.candle_options = Some("-dFoo=1".to_string());

        let toolset = WixToolset::with_version(WixVersion::V3);
        let mut compiler = Compiler::default();
        let path = temp.path().join("build.cmd");
        write_build_script(&toolset, &project, &mut compiler, &path).unwrap();

        assert!(temp.path().join("Setup.wxs").is_file());
        let script = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "echo off");
        assert_eq!(lines[1], "@setlocal");
        assert_eq!(lines[2], "set WixLocation=.");
        assert!(lines[3].starts_with("call \"candle.exe\" -sw1026 -dFoo=1"));
        assert_eq!(lines[4], "if ERRORLEVEL 1 @echo candle.exe failed & GOTO ERROR");
        assert!(lines[5].starts_with("call \"light.exe\" -sw1076 -sw1079"));
        assert!(lines[5].contains("-ext WixUIExtension.dll"));
        assert_eq!(lines[6], "if ERRORLEVEL 1 @echo light.exe failed & GOTO ERROR");
        assert_eq!(lines[7..], ["@endlocal", "EXIT /B 0", ":ERROR", "@endlocal", "EXIT /B 1"]);
    }

    #[test]
    fn test_detect_respects_preference() {
        let temp = TempDir::new().unwrap();
        let mut config = CompilerConfig::default();
        config.wix_location = Some(temp.path().to_path_buf());
        config.wix_version = ToolsetPreference::V3;

        // no binaries in the configured directory and none on PATH for v3
        if which::which("candle").is_err() {
            assert!(matches!(
                WixToolset::detect(&config),
                Err(WixError::ToolsetNotFound)
            ));
        }
    }
}
