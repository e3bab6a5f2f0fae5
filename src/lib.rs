//! wix-dsl - Declarative object model for WiX installers
//!
//! Describe an installer as a tree of directories, files, features, registry
//! values and custom actions, then compile it to a WiX source file and build
//! an MSI with the installed WiX toolset (v3 candle/light or v4+ wix.exe).
//!
//! # Example
//!
//! ```no_run
//! use wix_dsl::{Compiler, Dir, File, Project};
//!
//! let project = Project::new("MyProduct")
//!     .dir(Dir::new(r"%ProgramFiles%\Acme\MyProduct").file(File::new("app.exe")));
//!
//! let mut compiler = Compiler::default();
//! let wxs = compiler.build_wxs(&project).unwrap();
//! println!("Generated {}", wxs.display());
//! ```

pub mod attributes;
pub mod compiler;
pub mod config;
pub mod culture;
pub mod env_consts;
pub mod error;
pub mod generic;
pub mod guid;
pub mod id;
pub mod model;
pub mod toolset;
pub mod validator;
pub mod wildcard;
pub mod xml;

pub use attributes::Entity;
pub use compiler::{Compilation, Compiler};
pub use config::{AutoGenerationOptions, CompilerConfig, ConfigError, ToolsetPreference};
pub use error::{Result, WixError};
pub use generic::{GenericEntity, GenericItem, ProcessingContext};
pub use id::{IdAssignment, IdGenerator, IdHook, IdKind, IdRequest};
pub use model::*;
pub use toolset::{build_msi, build_msi_cmd, BuildConfig, WixToolset, WixVersion};
pub use validator::{Issue, ProjectValidator, Severity};
pub use wildcard::FileSet;
pub use xml::Element;
