//! wix-dsl CLI - Compile declarative installer projects to WiX sources and MSIs

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;
use wix_dsl::{
    build_msi, build_msi_cmd, Compiler, CompilerConfig, Dir, Feature, File, FileShortcut,
    Project, ProjectValidator, WixToolset,
};

#[derive(Parser)]
#[command(name = "wix-dsl")]
#[command(about = "Compile declarative installer projects to WiX sources and MSIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample project file
    Init {
        /// Project file to create
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Project file format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: ProjectFormat,
    },

    /// Compile a project file to a .wxs source
    Wxs {
        /// Project file (.json, .yaml)
        project: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Build an MSI with the installed WiX toolset
    Build {
        /// Project file (.json, .yaml)
        project: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write a batch file running the build instead of building
        #[arg(long)]
        cmd: bool,
    },

    /// Show the ids the compiler would assign
    Ids {
        /// Project file (.json, .yaml)
        project: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check a project for errors
    Validate {
        /// Project file (.json, .yaml)
        project: PathBuf,
    },

    /// Detect installed WiX toolset
    Toolset,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProjectFormat {
    Json,
    Yaml,
}

impl ProjectFormat {
    fn extension(&self) -> &'static str {
        match self {
            ProjectFormat::Json => "json",
            ProjectFormat::Yaml => "yaml",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let result = match cli.command {
        Commands::Init { output, format } => run_init(output, format),
        Commands::Wxs {
            project,
            output,
            config,
        } => run_wxs(&project, output, config),
        Commands::Build {
            project,
            output,
            config,
            cmd,
        } => run_build(&project, output, config, cmd),
        Commands::Ids { project, format } => run_ids(&project, format),
        Commands::Validate { project } => run_validate(&project),
        Commands::Toolset => run_toolset(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn sample_project() -> Project {
    let mut project = Project::new("MyProduct")
        .dir(
            Dir::new(r"%ProgramFiles%\Acme\MyProduct")
                .file(
                    File::new(r"bin\MyProduct.exe")
                        .shortcut(FileShortcut::new("MyProduct", "%ProgramMenu%\\Acme")),
                )
                .file(File::new(r"docs\readme.txt").feature("Documentation")),
        );
    project.manufacturer = "Acme".to_string();
    project.guid = Some(Uuid::new_v4());
    project.features.push(Feature::new("Documentation").description("User documentation"));
    project
}

fn run_init(output: Option<PathBuf>, format: ProjectFormat) -> anyhow::Result<ExitCode> {
    let path = output.unwrap_or_else(|| PathBuf::from(format!("project.{}", format.extension())));
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let project = sample_project();
    let content = match format {
        ProjectFormat::Json => serde_json::to_string_pretty(&project)?,
        ProjectFormat::Yaml => serde_yaml::to_string(&project)?,
    };
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {}", "Created".green(), path.display());
    Ok(ExitCode::SUCCESS)
}

/// Config from `--config`, or the config file next to the project
fn load_config(project: &Path, config: Option<PathBuf>) -> anyhow::Result<CompilerConfig> {
    let config = match config {
        Some(path) => CompilerConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let dir = project.parent().unwrap_or(Path::new("."));
            CompilerConfig::find_and_load(dir).context("Failed to load config")?
        }
    };
    Ok(config)
}

fn load_project(path: &Path, output: Option<PathBuf>) -> anyhow::Result<Project> {
    let mut project =
        Project::load(path).with_context(|| format!("Failed to load project {}", path.display()))?;
    if let Some(out_dir) = output {
        project.out_dir = out_dir;
    }
    Ok(project)
}

fn run_wxs(
    project: &Path,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let config = load_config(project, config)?;
    let project = load_project(project, output)?;

    let mut compiler = Compiler::new(config);
    let path = compiler.build_wxs(&project)?;

    println!("{} {}", "Generated".green(), path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_build(
    project: &Path,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    cmd: bool,
) -> anyhow::Result<ExitCode> {
    let config = load_config(project, config)?;
    let project = load_project(project, output)?;
    let mut compiler = Compiler::new(config);

    if cmd {
        let script = project
            .out_dir
            .join(format!("Build_{}.cmd", project.output_name()));
        let path = build_msi_cmd(&project, &mut compiler, &script)?;
        println!("{} {}", "Generated".green(), path.display());
    } else {
        let msi = build_msi(&project, &mut compiler)?;
        println!("{} {}", "Built".green(), msi.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_ids(project: &Path, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let config = load_config(project, None)?;
    let project = load_project(project, None)?;

    let mut compiler = Compiler::new(config);
    let ids = compiler.preview_ids(&project)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ids)?),
        OutputFormat::Text => {
            let width = ids.iter().map(|a| a.kind.len()).max().unwrap_or(0);
            for assignment in &ids {
                println!(
                    "{:width$}  {}  {}",
                    assignment.kind.cyan(),
                    assignment.id.bold(),
                    assignment.name.dimmed(),
                    width = width
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(path: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(path, None)?;
    let project = load_project(path, None)?;

    let issues = ProjectValidator::new(&config.auto_generation).validate(&project);
    if issues.is_empty() {
        println!("{} {}", "OK".green().bold(), path.display());
        return Ok(ExitCode::SUCCESS);
    }

    for issue in &issues {
        let label = if issue.is_error() {
            "error".red().bold()
        } else {
            "warning".yellow().bold()
        };
        println!("{}: {}", label, issue.message);
    }

    let errors = issues.iter().filter(|i| i.is_error()).count();
    println!();
    println!(
        "{} error(s), {} warning(s)",
        errors,
        issues.len() - errors
    );

    Ok(if errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_toolset() -> anyhow::Result<ExitCode> {
    let config = CompilerConfig::find_and_load(Path::new(".")).context("Failed to load config")?;

    match WixToolset::detect(&config) {
        Ok(toolset) => {
            println!("{}", "WiX Toolset Detected".green().bold());
            println!("  Version: {}", toolset.version.as_str());
            println!("  Path: {}", toolset.path.display());
            if let Some(candle) = &toolset.candle_path {
                println!("  candle: {}", candle.display());
            }
            if let Some(light) = &toolset.light_path {
                println!("  light: {}", light.display());
            }
            if let Some(wix) = &toolset.wix_path {
                println!("  wix: {}", wix.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{} {}", "WiX Toolset Not Found:".red().bold(), e);
            println!();
            println!("Install WiX Toolset:");
            println!("  v4+: dotnet tool install --global wix");
            println!("  v3:  https://wixtoolset.org/releases/");
            Ok(ExitCode::FAILURE)
        }
    }
}
