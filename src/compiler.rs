//! Project compilation
//!
//! [`Compiler`] turns a [`Project`] into a WiX source document in three
//! stages:
//!
//! 1. prepare a private copy of the project: wildcards, product GUIDs,
//!    64-bit folders, install directory, validation;
//! 2. assign ids to every entity in a fixed walk order;
//! 3. emit the `Wix` element tree and post-process it (shortcut icons,
//!    custom attribute routing, namespace registration).
//!
//! The caller's project is never modified, so compiling the same project
//! twice yields the same document.

use crate::attributes::{route_attributes, Entity};
use crate::config::{AutoGenerationOptions, CompilerConfig};
use crate::culture;
use crate::env_consts::{
    expand, expand_command_path, expand_wix_env_consts, is_path_rooted, map_64_dirs,
    normalize_wix_string, path_file_name, path_file_stem, special_folder_id,
};
use crate::error::{Result, WixError};
use crate::generic::{add_condition_text, FeatureComponents, GenericEntity, GenericItem, ProcessingContext};
use crate::guid::GuidGenerator;
use crate::id::{hashed_target_path_id, IdAlgorithm, IdAssignment, IdGenerator, IdKind, IdRequest};
use crate::model::action::{Action, ActionKind, Execute, Step};
use crate::model::condition::Condition;
use crate::model::dir::{Dir, ExeFileShortcut, File, ShortcutOptions};
use crate::model::extension::WixExtension;
use crate::model::feature::Feature;
use crate::model::project::{ProductGuids, Project, WixUi};
use crate::model::reboot::RebootInstallSequence;
use crate::model::registry::{RegValue, RegValueData};
use crate::validator::ProjectValidator;
use crate::wildcard::WildcardResolver;
use crate::xml::{to_document_string, Element};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// WiX v3 source namespace
pub const WIX_NAMESPACE: &str = "http://schemas.microsoft.com/wix/2006/wi";

/// Id of the root directory
const TARGETDIR: &str = "TARGETDIR";

/// A compiled project
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Project copy with wildcards resolved and ids assigned
    pub project: Project,
    /// The `Wix` root element
    pub document: Element,
    /// Extensions the document uses, for `-ext` arguments
    pub extensions: Vec<WixExtension>,
    /// Every id assigned or confirmed during the build
    pub ids: Vec<IdAssignment>,
}

impl Compilation {
    /// Serialized `.wxs` content
    pub fn to_xml_string(&self) -> String {
        let header = format!(
            " Generated by wix-dsl {}. Changes to this file will be lost. ",
            env!("CARGO_PKG_VERSION")
        );
        to_document_string(&self.document, Some(&header))
    }

    /// `{out_dir}/{output_name}.wxs`
    pub fn wxs_path(&self) -> PathBuf {
        self.project
            .out_dir
            .join(format!("{}.wxs", self.project.output_name()))
    }

    /// Write the source file, creating the output directory
    pub fn write(&self) -> Result<PathBuf> {
        let path = self.wxs_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, self.to_xml_string())?;
        log::info!("Generated {}", path.display());
        Ok(path)
    }
}

/// Project to WiX source compiler. Owns the id generator, so one compiler
/// can build many projects with reproducible ids.
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
    ids: IdGenerator,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            ids: IdGenerator::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn options(&self) -> &AutoGenerationOptions {
        &self.config.auto_generation
    }

    /// The id generator. Allocations made here before a build are discarded
    /// at the start of the build unless `do_not_reset_id_generator` is set.
    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Compile `project` into the `Wix` root element
    pub fn generate_wix_proj(&mut self, project: &Project) -> Result<Element> {
        Ok(self.compile(project)?.document)
    }

    /// Compile `project` and write its `.wxs` file
    pub fn build_wxs(&mut self, project: &Project) -> Result<PathBuf> {
        self.compile(project)?.write()
    }

    /// Ids the build would assign, in allocation order
    pub fn preview_ids(&mut self, project: &Project) -> Result<Vec<IdAssignment>> {
        Ok(self.prepare(project)?.ids)
    }

    /// Full compilation
    pub fn compile(&mut self, project: &Project) -> Result<Compilation> {
        let prepared = self.prepare(project)?;
        let options = &self.config.auto_generation;

        let guid = prepared.project.guid.unwrap_or_default();
        let mut emitter = Emitter {
            project: &prepared.project,
            options,
            guids: GuidGenerator::new(guid, prepared.project.guid_algorithm),
            feature_components: FeatureComponents::new(),
            extensions: Vec::new(),
            shortcut_locations: Vec::new(),
            install_dir_id: prepared.install_dir_id.clone(),
        };

        let (document, extensions) = emitter.emit()?;
        log::debug!(
            "Compiled '{}' with {} extension(s)",
            prepared.project.name,
            extensions.len()
        );

        Ok(Compilation {
            project: prepared.project,
            document,
            extensions,
            ids: prepared.ids,
        })
    }

    fn prepare(&mut self, project: &Project) -> Result<Prepared> {
        let options = self.config.auto_generation.clone();
        let mut project = project.clone();

        let resolver = WildcardResolver::new(
            project.source_base_dir.clone(),
            options.ignore_wildcard_empty_directories,
        );
        for dir in &mut project.dirs {
            resolver.resolve(dir)?;
        }

        ProductGuids::generate(&project)?.apply(&mut project);

        if project.is_64bit() && options.map_64_install_dirs {
            map_64_bit_folders(&mut project);
        }

        for_each_entity(&mut project, &mut |entity| entity.merge_attributes_definition())?;
        declare_referenced_features(&mut project)?;

        let install_dir_id = resolve_install_dir(&mut project, options.install_dir_default_id.as_deref());
        assign_absolute_dir_ids(&mut project.dirs, &mut 0);

        if project.dirs.is_empty() {
            // MSI needs at least one directory
            let dummy = if project.is_64bit() && options.map_64_install_dirs {
                map_64_dirs("%ProgramFiles%")
            } else {
                "%ProgramFiles%".to_string()
            };
            project.dirs.push(Dir::new(dummy));
        }

        ProjectValidator::new(&options).ensure_valid(&project)?;

        if options.do_not_reset_id_generator {
            log::debug!("Keeping previously allocated ids");
        } else {
            if self.ids.has_allocations() {
                log::warn!("Ids were allocated before the build started; they are discarded");
            }
            self.ids.reset();
        }

        let algorithm = id_algorithm(&project, &options);
        let mut pass = IdPass {
            ids: &mut self.ids,
            algorithm,
            assignments: Vec::new(),
        };
        pass.run(&mut project)?;
        let ids = pass.assignments;

        if !options.do_not_reset_id_generator {
            self.ids.reset();
        }

        Ok(Prepared {
            project,
            install_dir_id,
            ids,
        })
    }
}

struct Prepared {
    project: Project,
    install_dir_id: Option<String>,
    ids: Vec<IdAssignment>,
}

/// Visit the data of every entity of the project
fn for_each_entity(
    project: &mut Project,
    f: &mut dyn FnMut(&mut Entity) -> Result<()>,
) -> Result<()> {
    fn visit_items(
        items: &mut [GenericItem],
        f: &mut dyn FnMut(&mut Entity) -> Result<()>,
    ) -> Result<()> {
        for item in items {
            if let Some((_, entity)) = item.entity_mut() {
                f(entity)?;
            }
        }
        Ok(())
    }

    fn visit_dir(dir: &mut Dir, f: &mut dyn FnMut(&mut Entity) -> Result<()>) -> Result<()> {
        f(&mut dir.entity)?;
        for file in &mut dir.files {
            f(&mut file.entity)?;
            for shortcut in &mut file.shortcuts {
                f(&mut shortcut.entity)?;
            }
            visit_items(&mut file.generic_items, f)?;
        }
        for shortcut in &mut dir.shortcuts {
            f(&mut shortcut.entity)?;
        }
        visit_items(&mut dir.generic_items, f)?;
        for sub in &mut dir.dirs {
            visit_dir(sub, f)?;
        }
        Ok(())
    }

    fn visit_feature(
        feature: &mut Feature,
        f: &mut dyn FnMut(&mut Entity) -> Result<()>,
    ) -> Result<()> {
        f(&mut feature.entity)?;
        for child in &mut feature.children {
            visit_feature(child, f)?;
        }
        Ok(())
    }

    for dir in &mut project.dirs {
        visit_dir(dir, f)?;
    }
    for value in &mut project.reg_values {
        f(&mut value.entity)?;
    }
    for property in &mut project.properties {
        f(&mut property.entity)?;
    }
    for property in &mut project.reg_value_properties {
        f(&mut property.entity)?;
    }
    for action in &mut project.actions {
        f(&mut action.entity)?;
    }
    for binary in &mut project.binaries {
        f(&mut binary.entity)?;
    }
    visit_items(&mut project.generic_items, f)?;
    for feature in &mut project.features {
        visit_feature(feature, f)?;
    }
    f(&mut project.default_feature.entity)
}

fn map_64_bit_folders(project: &mut Project) {
    fn map_dir(dir: &mut Dir) {
        dir.entity.name = map_64_dirs(&dir.entity.name);
        for file in &mut dir.files {
            for shortcut in &mut file.shortcuts {
                shortcut.location = map_64_dirs(&shortcut.location);
            }
        }
        for sub in &mut dir.dirs {
            map_dir(sub);
        }
    }

    for dir in &mut project.dirs {
        map_dir(dir);
    }
}

/// Features referenced by name but never declared become top-level features
fn declare_referenced_features(project: &mut Project) -> Result<()> {
    let mut referenced: Vec<String> = Vec::new();
    for_each_entity(project, &mut |entity| {
        for name in &entity.features {
            if !referenced.contains(name) {
                referenced.push(name.clone());
            }
        }
        Ok(())
    })?;

    for name in referenced {
        let declared = project.default_feature.name() == name
            || project.all_features().iter().any(|f| f.name() == name);
        if !declared {
            log::debug!("Declaring feature '{}' referenced by name", name);
            project.features.push(Feature::new(name));
        }
    }
    Ok(())
}

fn find_dir_mut<'a>(dirs: &'a mut [Dir], pred: &dyn Fn(&Dir) -> bool) -> Option<&'a mut Dir> {
    for dir in dirs {
        if pred(dir) {
            return Some(dir);
        }
        if let Some(found) = find_dir_mut(&mut dir.dirs, pred) {
            return Some(found);
        }
    }
    None
}

/// Determine the installation directory and make sure it carries its id.
///
/// An `is_install_dir` directory wins, then a directory already using the
/// default id. Otherwise the default id is given to the first directory
/// that holds items or branches out.
fn resolve_install_dir(project: &mut Project, default_id: Option<&str>) -> Option<String> {
    if let Some(dir) = find_dir_mut(&mut project.dirs, &|d: &Dir| d.is_install_dir) {
        if dir.entity.id.is_none() {
            dir.entity.id = default_id.map(str::to_string);
        }
        return dir.entity.id.clone();
    }

    let default_id = default_id?;
    if project
        .all_dirs()
        .iter()
        .any(|d| d.entity.id.as_deref() == Some(default_id))
    {
        return Some(default_id.to_string());
    }

    let mut dir = project.dirs.first_mut()?;
    let mut logical_path = dir.entity.name.clone();
    while dir.shortcuts.is_empty() && dir.dirs.len() == 1 && dir.files.is_empty() {
        dir = &mut dir.dirs[0];
        logical_path = format!("{}\\{}", logical_path, dir.entity.name);
    }

    if dir.entity.has_explicit_id() {
        return None;
    }

    if let Some(special) = special_folder_id(&dir.entity.name) {
        log::warn!(
            "Special folder '{}' is used as the install directory and gets the id '{}'. \
             Mark the intended directory with is_install_dir to avoid this.",
            special,
            default_id
        );
    }

    dir.entity.id = Some(default_id.to_string());
    log::debug!("Install directory: {} ({})", logical_path, default_id);
    Some(default_id.to_string())
}

/// Absolute directories need public ids: `TARGETDIR1`, `TARGETDIR2`, ...
fn assign_absolute_dir_ids(dirs: &mut [Dir], count: &mut usize) {
    for dir in dirs {
        if dir.entity.id.is_none() && is_path_rooted(&dir.entity.name) {
            *count += 1;
            dir.entity.id = Some(format!("{}{}", TARGETDIR, count));
        }
        assign_absolute_dir_ids(&mut dir.dirs, count);
    }
}

/// User hook first, then the hashed file id algorithm unless disabled
fn id_algorithm(project: &Project, options: &AutoGenerationOptions) -> Option<IdAlgorithm> {
    let custom = project.custom_id_algorithm.clone();
    if options.legacy_default_id_algorithm {
        return custom.map(|hook| hook.0);
    }

    let mask = options.hashed_target_path_file_id_mask.clone();
    Some(Arc::new(move |request: &IdRequest| {
        custom
            .as_ref()
            .and_then(|hook| (hook.0)(request))
            .or_else(|| hashed_target_path_id(request, &mask))
    }))
}

/// Assigns ids in a fixed walk order
struct IdPass<'a> {
    ids: &'a mut IdGenerator,
    algorithm: Option<IdAlgorithm>,
    assignments: Vec<IdAssignment>,
}

impl IdPass<'_> {
    fn run(&mut self, project: &mut Project) -> Result<()> {
        self.ids.reserve(TARGETDIR);
        let ids = &mut *self.ids;
        for_each_entity(project, &mut |entity| {
            if let Some(id) = &entity.id {
                ids.reserve(id);
            }
            Ok(())
        })?;

        for dir in &mut project.dirs {
            self.dir(dir, TARGETDIR, "");
        }
        for value in &mut project.reg_values {
            let name = value.entity.name.clone();
            self.assign(IdKind::RegValue, &mut value.entity, &name, None);
        }
        for (index, action) in project.actions.iter_mut().enumerate() {
            if action.entity.name.is_empty() {
                action.entity.name = action.kind.default_name(index + 1);
            }
            let name = action.entity.name.clone();
            self.assign(IdKind::Action, &mut action.entity, &name, None);
        }
        for binary in &mut project.binaries {
            let name = binary.entity.name.clone();
            self.assign(IdKind::Binary, &mut binary.entity, &name, None);
        }
        self.items(&mut project.generic_items);
        for feature in &mut project.features {
            self.feature(feature);
        }
        let name = project.default_feature.entity.name.clone();
        self.assign(IdKind::Feature, &mut project.default_feature.entity, &name, None);
        Ok(())
    }

    fn assign(&mut self, kind: IdKind, entity: &mut Entity, name: &str, target_path: Option<String>) {
        if entity.id.is_none() {
            let mut request = IdRequest::new(kind, name);
            if let Some(path) = target_path {
                request = request.with_target_path(path);
            }
            entity.id = Some(self.ids.allocate(&request, self.algorithm.as_ref()));
            entity.auto_id = true;
        }
        self.record(kind, name, entity.id());
    }

    fn record(&mut self, kind: IdKind, name: &str, id: &str) {
        self.assignments.push(IdAssignment {
            kind: kind.to_string(),
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    fn dir(&mut self, dir: &mut Dir, parent_id: &str, parent_path: &str) {
        let name = dir.entity.name.clone();
        let path = if parent_path.is_empty() {
            name.clone()
        } else {
            format!("{}\\{}", parent_path, name)
        };

        if dir.entity.id.is_none() {
            let request = IdRequest::new(IdKind::Dir, name.as_str()).with_target_path(path.as_str());
            let custom = self.algorithm.as_ref().and_then(|hook| hook(&request));
            let id = match (custom, special_folder_id(&name)) {
                (Some(id), _) => self.ids.claim(id),
                (None, Some(special)) => {
                    self.ids.reserve(special);
                    special.to_string()
                }
                (None, None) => {
                    let candidate = format!("{}.{}", parent_id, expand(&name, false));
                    if self.ids.is_taken(&candidate) {
                        self.ids.incremental_id(&IdRequest::new(IdKind::Dir, candidate))
                    } else {
                        self.ids.reserve(&candidate);
                        candidate
                    }
                }
            };
            dir.entity.id = Some(id);
            dir.entity.auto_id = true;
        }
        self.record(IdKind::Dir, &name, dir.entity.id());

        for file in &mut dir.files {
            let source = file.entity.name.clone();
            let target = format!("{}\\{}", path, path_file_name(&source));
            self.assign(IdKind::File, &mut file.entity, &source, Some(target));

            for shortcut in &mut file.shortcuts {
                let name = if shortcut.entity.name.is_empty() {
                    path_file_stem(&source).to_string()
                } else {
                    shortcut.entity.name.clone()
                };
                self.assign(IdKind::FileShortcut, &mut shortcut.entity, &name, None);
            }
            self.items(&mut file.generic_items);
        }

        for shortcut in &mut dir.shortcuts {
            let name = shortcut.entity.name.clone();
            self.assign(IdKind::ExeFileShortcut, &mut shortcut.entity, &name, None);
        }
        self.items(&mut dir.generic_items);

        let id = dir.entity.id().to_string();
        for sub in &mut dir.dirs {
            self.dir(sub, &id, &path);
        }
    }

    fn items(&mut self, items: &mut [GenericItem]) {
        for item in items {
            if let Some((kind, entity)) = item.entity_mut() {
                let name = entity.name.clone();
                self.assign(kind, entity, &name, None);
            }
        }
    }

    fn feature(&mut self, feature: &mut Feature) {
        let name = feature.entity.name.clone();
        self.assign(IdKind::Feature, &mut feature.entity, &name, None);
        for child in &mut feature.children {
            self.feature(child);
        }
    }
}

/// Source path of an item: relative names resolve against the source base
fn source_path(base: &Path, name: &str) -> String {
    if base.as_os_str().is_empty() || is_path_rooted(name) {
        name.to_string()
    } else {
        base.join(name).display().to_string()
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Directory part of a shortcut target, used as its working directory
fn shortcut_working_dir(target: &str) -> String {
    match target.rfind(['\\', '/', ']']) {
        Some(pos) => target[..=pos].replace(['[', ']'], ""),
        None => target.to_string(),
    }
}

/// Directory by logical path (`%ProgramMenu%\Acme`), case-insensitive
fn find_dir_by_path<'a>(dirs: &'a [Dir], path: &str) -> Option<&'a Dir> {
    let mut segments = path.split(['\\', '/']).filter(|s| !s.is_empty());
    let first = segments.next()?;
    let mut current = dirs
        .iter()
        .find(|d| d.entity.name.eq_ignore_ascii_case(first))?;
    for segment in segments {
        current = current
            .dirs
            .iter()
            .find(|d| d.entity.name.eq_ignore_ascii_case(segment))?;
    }
    Some(current)
}

/// Document builder for one prepared project
struct Emitter<'a> {
    project: &'a Project,
    options: &'a AutoGenerationOptions,
    guids: GuidGenerator,
    feature_components: FeatureComponents,
    extensions: Vec<WixExtension>,
    /// Shortcut locations with no matching directory, with their features
    shortcut_locations: Vec<(String, Vec<String>)>,
    install_dir_id: Option<String>,
}

impl Emitter<'_> {
    fn emit(&mut self) -> Result<(Element, Vec<WixExtension>)> {
        let project = self.project;
        let mut product = self.product_element()?;

        self.media(&mut product);
        for (key, value) in &project.wix_variables {
            product.push(
                Element::new("WixVariable")
                    .attr("Id", key.as_str())
                    .attr("Value", value.as_str()),
            );
        }
        for launch in &project.launch_conditions {
            let mut condition = Element::new("Condition").attr("Message", launch.message.as_str());
            add_condition_text(&mut condition, &launch.condition, self.force_cdata());
            product.push(condition);
        }

        let mut targetdir = Element::new("Directory")
            .attr("Id", TARGETDIR)
            .attr("Name", "SourceDir");
        for dir in &project.dirs {
            self.dir(dir, &mut targetdir)?;
        }
        self.auto_shortcut_locations(&mut targetdir)?;
        self.reg_values(&mut targetdir)?;
        let top_level_dir = top_level_dir_id(&targetdir);
        product.push(targetdir);

        self.properties(&mut product)?;
        self.actions(&mut product)?;
        self.binaries(&mut product)?;
        self.project_items(&mut product)?;
        self.features(&mut product)?;
        self.ui(&mut product, top_level_dir);
        self.upgrade(&mut product);
        self.reboot(&mut product);

        inject_absolute_paths(&mut product);
        inject_shortcut_icons(&mut product);
        if project.is_64bit() {
            inject_win64(&mut product);
        }
        if self.options.remove_media_if_no_files
            && !product.descendants().iter().any(|el| el.name == "File")
        {
            product.retain_recursive(&|el: &Element| el.name != "Media");
        }

        let mut extensions = std::mem::take(&mut self.extensions);
        route_custom_attributes(&mut product, &mut extensions)?;
        for ext in &project.wix_extensions {
            if !extensions.contains(ext) {
                extensions.push(ext.clone());
            }
        }

        let mut wix = Element::new("Wix").attr("xmlns", WIX_NAMESPACE);
        for ext in &extensions {
            if let Some((name, namespace)) = ext.xmlns() {
                wix.set_attr(name, namespace);
            }
        }
        wix.push(product);
        Ok((wix, extensions))
    }

    fn force_cdata(&self) -> bool {
        self.options.force_cdata_for_conditions
    }

    fn include(&mut self, extension: WixExtension) {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
    }

    fn condition_element(&self, condition: &Condition) -> Element {
        let mut element = Element::new("Condition");
        add_condition_text(&mut element, condition, self.force_cdata());
        element
    }

    /// Generated component id, or the entity's `Component:Id`
    fn component_id(&self, entity: &Entity, seed: &str) -> String {
        match entity.component_id() {
            Some(id) => id.to_string(),
            None => self
                .project
                .component_id(seed, self.options.force_component_id_uniqueness),
        }
    }

    /// `Component` element mapped to `features`
    fn component(&mut self, id: String, features: &[String]) -> Element {
        let guid = self.guids.new_guid(&id);
        self.map_component(&id, features);
        Element::new("Component")
            .attr("Id", id)
            .attr("Guid", guid.to_string())
    }

    fn map_component(&mut self, id: &str, features: &[String]) {
        if features.is_empty() {
            self.feature_components
                .entry(self.project.default_feature.name().to_string())
                .or_default()
                .push(id.to_string());
        } else {
            for feature in features {
                self.feature_components
                    .entry(feature.clone())
                    .or_default()
                    .push(id.to_string());
            }
        }
    }

    fn process_items(
        &mut self,
        items: &[GenericItem],
        custom: &[Arc<dyn GenericEntity>],
        parent: &mut Element,
    ) -> Result<()> {
        if items.is_empty() && custom.is_empty() {
            return Ok(());
        }

        let force_cdata = self.force_cdata();
        let mut ctx = ProcessingContext {
            project: self.project,
            parent,
            feature_components: &mut self.feature_components,
            extensions: &mut self.extensions,
            guids: &mut self.guids,
            force_cdata,
        };
        for item in items {
            item.process(&mut ctx)?;
        }
        for item in custom {
            item.process(&mut ctx)?;
        }
        Ok(())
    }

    fn product_element(&self) -> Result<Element> {
        let project = self.project;
        let cultures = culture::split_cultures(&project.language);
        let first = cultures.first().copied().unwrap_or("en-US");

        let lcids = cultures
            .iter()
            .map(|c| {
                culture::lcid(c)
                    .map(|l| l.to_string())
                    .ok_or_else(|| WixError::InvalidModel(format!("Unknown culture '{}'", c)))
            })
            .collect::<Result<Vec<_>>>()?;
        let language = lcids.first().cloned().unwrap_or_else(|| "1033".to_string());

        let codepage = project
            .codepage
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| culture::codepage(first).map(|c| c.to_string()));

        let product_id = project.product_id.unwrap_or_default().to_string();
        let upgrade_code = project.upgrade_code.unwrap_or_default().to_string();

        let mut product = Element::new("Product")
            .attr("Id", product_id.as_str())
            .attr("Name", project.name.as_str())
            .attr("Language", language)
            .attr_opt("Codepage", codepage.clone())
            .attr("Version", project.version.as_str())
            .attr("UpgradeCode", upgrade_code)
            .attr_opt(
                "Manufacturer",
                (!project.manufacturer.is_empty()).then(|| project.manufacturer.clone()),
            );
        for (key, value) in &project.product_attributes {
            product.set_attr(key.as_str(), value.as_str());
        }

        let package = Element::new("Package")
            .attr("InstallerVersion", project.installer_version.to_string())
            .attr("Compressed", "yes")
            .attr(
                "Description",
                project.description.clone().unwrap_or_else(|| project.name.clone()),
            )
            .attr_opt("Platform", project.platform.map(|p| p.as_str()))
            .attr_opt("SummaryCodepage", codepage)
            .attr("Languages", lcids.join(","))
            .attr_opt("InstallPrivileges", project.install_privileges.map(|p| p.as_str()))
            .attr_opt("InstallScope", project.install_scope.map(|s| s.as_str()))
            .attr_opt("Id", project.emit_consistent_package_id.then_some(product_id));
        product.push(package);
        Ok(product)
    }

    fn media(&mut self, product: &mut Element) {
        let project = self.project;
        if let Some(template) = &project.media_template {
            product.push(template.to_element());
            return;
        }
        let project_id = expand(&project.name, true);
        for media in &project.media {
            product.push(media.to_element(&project_id));
        }
    }

    fn dir(&mut self, dir: &Dir, parent: &mut Element) -> Result<()> {
        let dir_id = dir.entity.id().to_string();
        let name = if is_path_rooted(&dir.entity.name) {
            dir.entity.name.clone()
        } else {
            expand_wix_env_consts(&dir.entity.name)
        };

        let mut element = Element::new("Directory")
            .attr("Id", dir_id.as_str())
            .attr("Name", name);
        dir.entity.apply_attributes(&mut element)?;

        if dir.is_empty() {
            // special folders always exist
            if special_folder_id(&dir.entity.name).is_some() {
                parent.push(element);
                return Ok(());
            }
            let id = self.component_id(&dir.entity, &format!("Component.{}.EmptyDirectory", dir_id));
            let component = self
                .component(id, &dir.entity.features)
                .child(Element::new("CreateFolder"))
                .child(
                    Element::new("RemoveFolder")
                        .attr("Id", dir_id.as_str())
                        .attr("On", "uninstall"),
                );
            element.push(component);
            parent.push(element);
            return Ok(());
        }

        if !dir.entity.features.is_empty() {
            let id = self.component_id(&dir.entity, &format!("Component.{}", dir_id));
            let component = self.component(id, &dir.entity.features);
            element.push(component);
        }

        for file in &dir.files {
            self.file(file, &dir_id, &mut element)?;
        }
        for shortcut in &dir.shortcuts {
            self.dir_shortcut(shortcut, &dir_id, &mut element)?;
        }
        self.process_items(&dir.generic_items, &dir.custom_items, &mut element)?;
        for sub in &dir.dirs {
            self.dir(sub, &mut element)?;
        }

        parent.push(element);
        Ok(())
    }

    fn file(&mut self, file: &File, dir_id: &str, dir_element: &mut Element) -> Result<()> {
        let project = self.project;
        let file_id = file.entity.id().to_string();
        let component_id = self.component_id(&file.entity, &format!("Component.{}", file_id));
        let mut component = self.component(component_id, &file.entity.features);

        if let Some(condition) = &file.condition {
            component.push(self.condition_element(condition));
        } else if let Some(condition) = file.entity.component_condition() {
            component.push(self.condition_element(&Condition::new(condition)));
        }

        let mut element = Element::new("File")
            .attr("Id", file_id.as_str())
            .attr("Source", source_path(&project.source_base_dir, &file.entity.name));
        file.entity.apply_attributes(&mut element)?;

        for shortcut in &file.shortcuts {
            let location_id = if shortcut.location.is_empty() {
                dir_id.to_string()
            } else if let Some(dir) = find_dir_by_path(&project.dirs, &shortcut.location) {
                dir.entity.id().to_string()
            } else if let Some(dir) = project
                .all_dirs()
                .into_iter()
                .find(|d| d.entity.id.as_deref() == Some(shortcut.location.as_str()))
            {
                dir.entity.id().to_string()
            } else {
                self.register_shortcut_location(&shortcut.location, &file.entity.features);
                expand(&shortcut.location, true)
            };

            let id = if shortcut.entity.auto_id {
                format!("Shortcut.{}.{}", file_id, shortcut.entity.id())
            } else {
                shortcut.entity.id().to_string()
            };
            let name = if shortcut.entity.name.is_empty() {
                path_file_stem(&file.entity.name).to_string()
            } else {
                format!("{}.lnk", shortcut.entity.name)
            };

            let mut sc = Element::new("Shortcut")
                .attr("Id", id)
                .attr(
                    "WorkingDirectory",
                    shortcut
                        .options
                        .working_directory
                        .clone()
                        .unwrap_or_else(|| dir_id.to_string()),
                )
                .attr("Arguments", shortcut.options.arguments.as_str())
                .attr("Directory", location_id)
                .attr("Name", name);
            emit_shortcut_options(&shortcut.entity, &shortcut.options, &mut sc)?;
            element.push(sc);
        }

        self.process_items(&file.generic_items, &file.custom_items, &mut element)?;
        component.push(element);

        if file.overwrite_on_install {
            component.push(
                Element::new("RemoveFile")
                    .attr("Id", format!("Remove_{}", file_id))
                    .attr("Name", path_file_name(&file.entity.name))
                    .attr("On", "both"),
            );
        }

        dir_element.push(component);
        Ok(())
    }

    fn register_shortcut_location(&mut self, location: &str, features: &[String]) {
        if self.shortcut_locations.iter().any(|(l, _)| l == location) {
            return;
        }
        log::warn!(
            "Shortcut location '{}' is not a declared directory; it will be created",
            location
        );
        self.shortcut_locations
            .push((location.to_string(), features.to_vec()));
    }

    fn dir_shortcut(
        &mut self,
        shortcut: &ExeFileShortcut,
        dir_id: &str,
        dir_element: &mut Element,
    ) -> Result<()> {
        let shortcut_id = shortcut.entity.id().to_string();
        let component_id = self.component_id(&shortcut.entity, &format!("Component.{}", shortcut_id));
        let mut component = self.component(component_id, &shortcut.entity.features);

        if let Some(condition) = &shortcut.options.condition {
            component.push(self.condition_element(condition));
        }

        let id = if shortcut.entity.auto_id {
            format!("{}.{}", dir_id, shortcut_id)
        } else {
            shortcut_id
        };
        let working_dir = shortcut
            .options
            .working_directory
            .clone()
            .unwrap_or_else(|| shortcut_working_dir(&shortcut.target));

        let mut sc = Element::new("Shortcut")
            .attr("Id", id)
            .attr("WorkingDirectory", working_dir)
            .attr("Target", normalize_wix_string(&shortcut.target))
            .attr("Arguments", shortcut.options.arguments.as_str())
            .attr("Name", format!("{}.lnk", shortcut.entity.name));
        emit_shortcut_options(&shortcut.entity, &shortcut.options, &mut sc)?;

        component.push(sc);
        dir_element.push(component);
        Ok(())
    }

    /// Create directories for shortcut locations that match no declared
    /// directory, below the longest declared prefix
    fn auto_shortcut_locations(&mut self, targetdir: &mut Element) -> Result<()> {
        let project = self.project;
        for (location, features) in std::mem::take(&mut self.shortcut_locations) {
            let segments: Vec<&str> = location
                .split(['\\', '/'])
                .filter(|s| !s.is_empty())
                .collect();

            let mut parent_dir: Option<(&Dir, usize)> = None;
            for len in (1..segments.len()).rev() {
                if let Some(dir) = find_dir_by_path(&project.dirs, &segments[..len].join("\\")) {
                    parent_dir = Some((dir, len));
                    break;
                }
            }

            let (mut parent_id, rest) = match parent_dir {
                Some((dir, len)) => (dir.entity.id().to_string(), &segments[len..]),
                None => (TARGETDIR.to_string(), &segments[..]),
            };

            // continue below directories created for earlier locations
            let mut created = 0;
            while let Some(name) = rest.get(created) {
                let id = layout_dir_id(&parent_id, name);
                if targetdir.find_by_id("Directory", &id).is_none() {
                    break;
                }
                parent_id = id;
                created += 1;
            }
            if created == rest.len() {
                continue;
            }

            let mut dir = Dir::new(rest[created..].join("\\"));
            for feature in &features {
                dir = dir.feature(feature.as_str());
            }
            assign_layout_ids(&mut dir, &parent_id);

            match targetdir.find_by_id_mut("Directory", &parent_id) {
                Some(parent) => self.dir(&dir, parent)?,
                None => self.dir(&dir, targetdir)?,
            }
        }
        Ok(())
    }

    fn reg_values(&mut self, targetdir: &mut Element) -> Result<()> {
        let project = self.project;
        for (index, value) in project.reg_values.iter().enumerate() {
            let id = project.component_id(
                &format!("Registry.{}", index + 1),
                self.options.force_component_id_uniqueness,
            );
            let mut component = self.component(id, &value.entity.features);

            match project.platform.map(|p| p.is_64bit()) {
                Some(true) if !value.win64 => component.set_attr("Win64", "no"),
                Some(false) | None if value.win64 => component.set_attr("Win64", "yes"),
                _ => {}
            }
            if let Some(condition) = &value.condition {
                component.push(self.condition_element(condition));
            }

            component.push(registry_key(value, index > 0)?);

            let folder = if value.win64 {
                "ProgramFiles64Folder"
            } else {
                "ProgramFilesFolder"
            };
            add_to_permanent_dir(targetdir, folder, component);
        }
        Ok(())
    }

    fn properties(&mut self, product: &mut Element) -> Result<()> {
        let project = self.project;

        for property in &project.properties {
            let mut element = Element::new("Property")
                .attr("Id", property.name())
                .attr_opt("Value", (!property.value.is_empty()).then_some(property.value.as_str()));
            property.entity.apply_attributes(&mut element)?;
            product.push(element);
        }

        for property_ref in &project.property_refs {
            let id = property_ref
                .id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| WixError::InvalidModel("PropertyRef without an id".to_string()))?;
            product.push(Element::new("PropertyRef").attr("Id", id));
        }

        for property in &project.reg_value_properties {
            let win64 = property.win64.unwrap_or(project.is_64bit());
            let search = Element::new("RegistrySearch")
                .attr("Id", format!("{}_RegSearch", property.name()))
                .attr("Root", property.root.as_str())
                .attr("Key", property.key.as_str())
                .attr("Type", "raw")
                .attr_opt(
                    "Name",
                    (!property.entry_name.is_empty()).then_some(property.entry_name.as_str()),
                )
                .attr("Win64", yes_no(win64));

            let mut element = Element::new("Property")
                .attr("Id", property.name())
                .attr_opt("Value", property.default_value.clone())
                .child(search);
            property.entity.apply_attributes(&mut element)?;
            product.push(element);
        }

        if let Some(reboot) = project.reboot_suppressing {
            product.push(Element::new("Property").attr("Id", "REBOOT").attr("Value", reboot.as_str()));
        }
        if project.major_upgrade.is_some() && !project.reinstall_mode.is_empty() {
            product.push(
                Element::new("Property")
                    .attr("Id", "REINSTALLMODE")
                    .attr("Value", project.reinstall_mode.as_str()),
            );
        }
        Ok(())
    }

    fn actions(&mut self, product: &mut Element) -> Result<()> {
        let project = self.project;
        for action in &project.actions {
            self.action(action, product)?;
        }
        Ok(())
    }

    fn action(&mut self, action: &Action, product: &mut Element) -> Result<()> {
        let project = self.project;
        let id = action.entity.id().to_string();
        let rollback_id = format!("{}_Rollback", id);

        let step = resolve_step(action, product)?;
        let schedule = match action.sequence_number {
            Some(number) => ("Sequence".to_string(), number.to_string()),
            None => (action.when.as_str().to_string(), step),
        };

        let mut custom_attrs = Vec::new();
        let mut action_attrs = Vec::new();
        for (key, value) in action.entity.all_attributes()? {
            match key.strip_prefix("Custom:") {
                Some(name) => custom_attrs.push((name.to_string(), value)),
                None => action_attrs.push((key, value)),
            }
        }

        let force_cdata = self.force_cdata();
        let custom = |action_id: &str, (attr, value): (&str, &str), scheduled: bool| {
            let mut element = Element::new("Custom")
                .attr("Action", action_id)
                .attr(attr, value);
            if scheduled {
                for (name, value) in &custom_attrs {
                    element.set_attr(name.as_str(), value.as_str());
                }
            }
            if !action.condition.is_empty() {
                add_condition_text(&mut element, &action.condition, force_cdata);
            }
            element
        };
        let custom_action = |action_id: &str, execute: Execute| {
            let mut element = Element::new("CustomAction").attr("Id", action_id);
            element.set_attr("Return", action.return_type.as_str());
            if let Some(impersonate) = action.impersonate {
                element.set_attr("Impersonate", yes_no(impersonate));
            }
            element.set_attr("Execute", execute.as_str());
            element
        };
        let with_attrs = |mut element: Element| {
            for (key, value) in &action_attrs {
                element.set_attr(key.as_str(), value.as_str());
            }
            element
        };
        let schedule_attr = (schedule.0.as_str(), schedule.1.as_str());

        if let Some(text) = &action.progress_text {
            let mut progress = Element::new("ProgressText").attr("Action", id.as_str());
            progress.add_text(text.as_str());
            product.find_or_add("UI").push(progress);
        }
        if let Some(text) = &action.rollback_progress_text {
            let mut progress = Element::new("ProgressText").attr("Action", rollback_id.as_str());
            progress.add_text(text.as_str());
            product.find_or_add("UI").push(progress);
        }

        let mut customs: Vec<Element> = Vec::new();
        let rollback = action.rollback.as_deref().filter(|_| action.has_rollback());

        match &action.kind {
            ActionKind::SetProperty { property, value } => {
                customs.push(custom(&id, schedule_attr, true));
                let mut element = custom_action(&id, action.execute);
                element.set_attr("Property", property.as_str());
                element.set_attr("Value", value.as_str());
                product.push(with_attrs(element));
            }

            ActionKind::ScriptFile {
                script_file,
                procedure,
            } => {
                let binary_key = format!("{}_File", expand(&action.entity.name, true));
                customs.push(custom(&id, schedule_attr, true));
                product.push(
                    Element::new("Binary")
                        .attr("Id", binary_key.as_str())
                        .attr("SourceFile", source_path(&project.source_base_dir, script_file)),
                );

                let mut element = custom_action(&id, action.execute);
                element.set_attr("BinaryKey", binary_key.as_str());
                element.set_attr("VBScriptCall", procedure.as_str());
                product.push(with_attrs(element));

                if let Some(procedure) = rollback {
                    customs.push(custom(&rollback_id, ("Before", id.as_str()), false));
                    let mut element = custom_action(&rollback_id, Execute::Rollback);
                    element.set_attr("BinaryKey", binary_key.as_str());
                    element.set_attr("VBScriptCall", procedure);
                    product.push(with_attrs(element));
                }
            }

            ActionKind::Script { code } => {
                customs.push(custom(&id, schedule_attr, true));
                let mut element = custom_action(&id, action.execute);
                element.set_attr("Script", "vbscript");
                element.add_cdata(code.as_str());
                product.push(with_attrs(element));

                if let Some(code) = rollback {
                    customs.push(custom(&rollback_id, ("Before", id.as_str()), false));
                    let mut element = custom_action(&rollback_id, Execute::Rollback);
                    element.set_attr("Script", "vbscript");
                    element.add_cdata(code);
                    product.push(with_attrs(element));
                }
            }

            ActionKind::PathFile {
                app_path,
                args,
                working_dir,
            } => {
                let directory = self.working_directory(working_dir);
                customs.push(custom(&id, schedule_attr, true));

                let mut element = custom_action(&id, action.execute);
                element.set_attr("ExeCommand", exe_command(app_path, args));
                element.set_attr("Directory", directory.as_str());
                product.push(with_attrs(element));

                if let Some(rollback_app) = rollback {
                    let rollback_args = action.rollback_arg.as_deref().unwrap_or(args);
                    customs.push(custom(&rollback_id, ("Before", id.as_str()), false));
                    let mut element = custom_action(&rollback_id, Execute::Rollback);
                    element.set_attr("ExeCommand", exe_command(rollback_app, rollback_args));
                    element.set_attr("Directory", directory.as_str());
                    product.push(with_attrs(element));
                }
            }

            ActionKind::InstalledFile { key, args } | ActionKind::BinaryFile { key, args } => {
                let key_attr = if matches!(action.kind, ActionKind::InstalledFile { .. }) {
                    "FileKey"
                } else {
                    "BinaryKey"
                };
                customs.push(custom(&id, schedule_attr, true));

                let mut element = custom_action(&id, action.execute);
                element.set_attr("ExeCommand", expand_command_path(args));
                element.set_attr(key_attr, key.as_str());
                product.push(with_attrs(element));

                if let Some(rollback_key) = rollback {
                    let rollback_args = action.rollback_arg.as_deref().unwrap_or(args);
                    customs.push(custom(&rollback_id, ("Before", id.as_str()), false));
                    let mut element = custom_action(&rollback_id, Execute::Rollback);
                    element.set_attr("ExeCommand", expand_command_path(rollback_args));
                    element.set_attr(key_attr, rollback_key);
                    product.push(with_attrs(element));
                }
            }

            ActionKind::CustomActionRef => {
                customs.push(custom(&id, schedule_attr, true));
                product.push(Element::new("CustomActionRef").attr("Id", id.as_str()));
            }

            ActionKind::QuietExec {
                app_path,
                args,
                command_line_property,
                action_name,
            } => {
                let set_id = format!("Set_{}", id);
                let property = if action.execute == Execute::Immediate {
                    command_line_property.as_str()
                } else {
                    id.as_str()
                };
                product.push(with_attrs(
                    Element::new("CustomAction")
                        .attr("Id", set_id.as_str())
                        .attr("Property", property)
                        .attr("Value", exe_command(app_path, args)),
                ));

                let mut element = custom_action(&id, action.execute);
                element.set_attr("BinaryKey", "WixCA");
                element.set_attr("DllEntry", action_name.as_str());
                product.push(with_attrs(element));

                customs.push(custom(&set_id, schedule_attr, true));
                customs.push(custom(&id, ("After", set_id.as_str()), true));

                if let Some(rollback_app) = rollback {
                    let rollback_args = action.rollback_arg.as_deref().unwrap_or("");
                    product.push(
                        Element::new("SetProperty")
                            .attr("Id", rollback_id.as_str())
                            .attr("Before", rollback_id.as_str())
                            .attr("Sequence", "execute")
                            .attr("Value", exe_command(rollback_app, rollback_args)),
                    );
                    customs.push(custom(&rollback_id, ("Before", id.as_str()), false));

                    let mut element = custom_action(&rollback_id, Execute::Rollback);
                    element.set_attr("BinaryKey", "WixCA");
                    element.set_attr("DllEntry", action_name.as_str());
                    product.push(with_attrs(element));
                }
                self.include(WixExtension::Util);
            }
        }

        for sequence in &action.sequences {
            let sequence = product.find_or_add(sequence.as_str());
            for element in &customs {
                sequence.push(element.clone());
            }
        }
        Ok(())
    }

    /// `Directory` of an exe-launching action
    fn working_directory(&self, working_dir: &str) -> String {
        if working_dir.is_empty() {
            return self
                .install_dir_id
                .clone()
                .unwrap_or_else(|| TARGETDIR.to_string());
        }
        self.project
            .all_dirs()
            .into_iter()
            .find(|d| d.entity.name == working_dir || d.entity.id.as_deref() == Some(working_dir))
            .map(|d| d.entity.id().to_string())
            .unwrap_or_else(|| expand(working_dir, true))
    }

    fn binaries(&mut self, product: &mut Element) -> Result<()> {
        let project = self.project;
        for binary in &project.binaries {
            let mut element = Element::new("Binary")
                .attr("Id", binary.entity.id())
                .attr("SourceFile", source_path(&project.source_base_dir, &binary.entity.name));
            binary.entity.apply_attributes(&mut element)?;
            product.push(element);
        }
        Ok(())
    }

    fn project_items(&mut self, product: &mut Element) -> Result<()> {
        let project = self.project;
        self.process_items(&project.generic_items, &project.custom_items, product)
    }

    fn features(&mut self, product: &mut Element) -> Result<()> {
        let project = self.project;
        let default_name = project.default_feature.name();
        let declares_default = project.all_features().iter().any(|f| f.name() == default_name);

        let mut top_level = Vec::new();
        if !declares_default {
            if let Some(element) = self.feature(&project.default_feature)? {
                top_level.push(element);
            }
        }
        for feature in &project.features {
            if let Some(element) = self.feature(feature)? {
                top_level.push(element);
            }
        }

        for name in self.feature_components.keys() {
            let known = name == default_name || project.all_features().iter().any(|f| f.name() == name);
            if !known {
                log::warn!("Components mapped to unknown feature '{}' are not installed", name);
            }
        }

        for element in top_level {
            product.push(element);
        }
        Ok(())
    }

    /// `Feature` with its component references and children. Features with
    /// neither are left out.
    fn feature(&self, feature: &Feature) -> Result<Option<Element>> {
        let mut element = Element::new("Feature")
            .attr("Id", feature.entity.id())
            .attr("Title", feature.name())
            .attr("Absent", if feature.allow_change { "allow" } else { "disallow" })
            .attr("Level", if feature.is_enabled { "1" } else { "2" })
            .attr_opt("Description", feature.description.clone())
            .attr_opt("ConfigurableDirectory", feature.configurable_dir.clone());
        feature.entity.apply_attributes(&mut element)?;

        if let Some(condition) = &feature.condition {
            let mut cond = Element::new("Condition").attr("Level", condition.level.to_string());
            cond.add_cdata(condition.condition.to_wix_string());
            element.push(cond);
        }

        let mut has_content = false;
        if let Some(components) = self.feature_components.get(feature.name()) {
            for id in components {
                element.push(Element::new("ComponentRef").attr("Id", id.as_str()));
                has_content = true;
            }
        }
        for child in &feature.children {
            if let Some(child) = self.feature(child)? {
                element.push(child);
                has_content = true;
            }
        }

        Ok(has_content.then_some(element))
    }

    fn ui(&mut self, product: &mut Element, top_level_dir: Option<String>) {
        let project = self.project;
        if project.ui == WixUi::ProgressOnly {
            return;
        }

        if project.ui == WixUi::InstallDir {
            match self.install_dir_id.clone().or(top_level_dir) {
                Some(id) => product.push(
                    Element::new("Property")
                        .attr("Id", "WIXUI_INSTALLDIR")
                        .attr("Value", id),
                ),
                None => log::warn!(
                    "Cannot determine the install directory for {}",
                    WixUi::InstallDir.as_str()
                ),
            }
        }

        product.push(Element::new("UIRef").attr("Id", project.ui.as_str()));
        product.push(Element::new("UIRef").attr("Id", "WixUI_ErrorProgressText"));
        self.include(WixExtension::Ui);

        let images = [
            ("WixUIBannerBmp", &project.banner_image),
            ("WixUIDialogBmp", &project.background_image),
            ("WixUILicenseRtf", &project.license_file),
        ];
        for (variable, path) in images {
            if let Some(path) = path {
                product.push(
                    Element::new("WixVariable")
                        .attr("Id", variable)
                        .attr("Value", source_path(&project.source_base_dir, path)),
                );
            }
        }
    }

    fn upgrade(&mut self, product: &mut Element) {
        let project = self.project;
        if let Some(upgrade) = &project.major_upgrade {
            product.push(upgrade.to_element());
        }
        if let Some(strategy) = &project.major_upgrade_strategy {
            let upgrade_code = project.upgrade_code.unwrap_or_default().to_string();
            strategy.apply(product, &upgrade_code, &project.version);
        }
    }

    fn reboot(&mut self, product: &mut Element) {
        let project = self.project;
        if let Some(reboot) = &project.force_reboot {
            product
                .find_or_add("InstallExecuteSequence")
                .push(reboot.to_element("ForceReboot"));
        }

        let Some(reboot) = &project.schedule_reboot else {
            return;
        };
        let element = reboot.to_element("ScheduleReboot");

        if matches!(
            reboot.install_sequence,
            RebootInstallSequence::InstallUI | RebootInstallSequence::Both
        ) {
            match product.find_mut("InstallUISequence") {
                Some(sequence) => sequence.push(element.clone()),
                None => log::warn!(
                    "ScheduleReboot is placed in InstallUISequence, which is not defined"
                ),
            }
        }
        if matches!(
            reboot.install_sequence,
            RebootInstallSequence::InstallExecute | RebootInstallSequence::Both
        ) {
            product.find_or_add("InstallExecuteSequence").push(element);
        }
    }
}

/// Ids of directories created after the id pass
fn assign_layout_ids(dir: &mut Dir, parent_id: &str) {
    if dir.entity.id.is_none() {
        dir.entity.id = Some(layout_dir_id(parent_id, &dir.entity.name));
        dir.entity.auto_id = true;
    }
    let id = dir.entity.id().to_string();
    for sub in &mut dir.dirs {
        assign_layout_ids(sub, &id);
    }
}

fn layout_dir_id(parent_id: &str, name: &str) -> String {
    match special_folder_id(name) {
        Some(special) => special.to_string(),
        None => format!("{}.{}", parent_id, expand(name, false)),
    }
}

fn emit_shortcut_options(entity: &Entity, options: &ShortcutOptions, element: &mut Element) -> Result<()> {
    entity.apply_attributes(element)?;
    if options.arguments.is_empty() {
        element.remove_attr("Arguments");
    }
    if options.advertise {
        element.set_attr("Advertise", "yes");
    }
    if let Some(icon) = options.icon_file.as_deref().filter(|i| !i.is_empty()) {
        element.set_attr("Icon", icon);
        element.set_attr("IconIndex", options.icon_index.to_string());
    }
    if let Some(description) = &options.description {
        element.set_attr("Description", description.as_str());
    }
    Ok(())
}

/// `"app" args` with WiX path syntax
fn exe_command(app_path: &str, args: &str) -> String {
    format!(
        "\"{}\" {}",
        expand_command_path(app_path),
        expand_command_path(args)
    )
    .trim_end()
    .to_string()
}

/// Resolve the `PreviousAction*` placeholders against the last scheduled
/// custom action of the action's first sequence
fn resolve_step(action: &Action, product: &Element) -> Result<String> {
    if !action.step.is_pseudo() {
        return Ok(action.step.to_string());
    }

    let last = action
        .sequences
        .first()
        .and_then(|sequence| product.find(sequence.as_str()))
        .and_then(|sequence| {
            sequence
                .elements()
                .filter(|el| el.name == "Custom")
                .filter_map(|el| el.get_attr("Action"))
                .last()
        })
        .map(str::to_string);

    match action.step.as_str() {
        Step::PREVIOUS_ACTION => last.ok_or_else(|| {
            WixError::InvalidModel(format!(
                "Action '{}' is scheduled after the previous action, but it is the first one in its sequence",
                action.entity.id()
            ))
        }),
        Step::PREVIOUS_ACTION_OR_INSTALL_FINALIZE => {
            Ok(last.unwrap_or_else(|| Step::install_finalize().to_string()))
        }
        _ => Ok(last.unwrap_or_else(|| Step::install_initialize().to_string())),
    }
}

fn registry_key(value: &RegValue, key_path: bool) -> Result<Element> {
    let mut reg_value = Element::new("RegistryValue")
        .attr("Id", value.entity.id())
        .attr("Type", value.value.type_str())
        .attr("KeyPath", yes_no(key_path));
    value.entity.apply_attributes(&mut reg_value)?;

    // `%Token%` constants become folder ids; `\%` keeps a literal `%`
    let data = match &value.value {
        RegValueData::String(text) => expand_wix_env_consts(text).replace("\\%", "%"),
        other => other.value_string(),
    };
    if value.value.type_str() == "multiString" {
        for line in data.lines() {
            let mut item = Element::new("MultiStringValue");
            item.add_text(line);
            reg_value.push(item);
        }
    } else {
        reg_value.set_attr("Value", data);
    }
    if !value.entity.name.is_empty() {
        reg_value.set_attr("Name", value.entity.name.as_str());
    }

    Ok(Element::new("RegistryKey")
        .attr("Root", value.root.as_str())
        .attr_opt("Key", (!value.key.is_empty()).then_some(value.key.as_str()))
        .attr_opt("Action", value.key_action.as_str())
        .attr_opt(
            "ForceCreateOnInstall",
            value.force_create_on_install.then_some("yes"),
        )
        .attr_opt(
            "ForceDeleteOnUninstall",
            value.force_delete_on_uninstall.then_some("yes"),
        )
        .child(reg_value))
}

/// Registry components live in the Program Files directory since it is never
/// removed. It is created under `TARGETDIR` if the layout lacks it.
fn add_to_permanent_dir(targetdir: &mut Element, folder: &str, component: Element) {
    let is_folder = |el: &Element| el.name == "Directory" && el.get_attr("Name") == Some(folder);
    let path = match targetdir.path_to(&is_folder) {
        Some(path) => path,
        None => {
            targetdir.push(Element::new("Directory").attr("Id", folder).attr("Name", folder));
            vec![targetdir.elements().count() - 1]
        }
    };
    if let Some(dir) = targetdir.at_path_mut(&path) {
        dir.push(component);
    }
}

/// First directory holding a component, following first children
fn top_level_dir_id(targetdir: &Element) -> Option<String> {
    let mut dir = targetdir.find("Directory")?;
    loop {
        if dir.elements().any(|el| el.name == "Component") {
            break;
        }
        match dir.find("Directory") {
            Some(next) => dir = next,
            None => break,
        }
    }
    dir.get_attr("Id").map(str::to_string)
}

/// Top-level directories with absolute names get a placeholder name and a
/// custom action setting the real path at install time
fn inject_absolute_paths(product: &mut Element) {
    let mut absolute: Vec<(String, String)> = Vec::new();
    if let Some(targetdir) = product.find_by_id_mut("Directory", TARGETDIR) {
        for dir in targetdir.elements_mut().filter(|el| el.name == "Directory") {
            let Some(name) = dir.get_attr("Name").map(str::to_string) else {
                continue;
            };
            if !is_path_rooted(&name) {
                continue;
            }
            let suffix = if absolute.is_empty() {
                String::new()
            } else {
                absolute.len().to_string()
            };
            dir.set_attr("Name", format!("ABSOLUTEPATH{}", suffix));
            absolute.push((dir.get_attr("Id").unwrap_or_default().to_string(), name));
        }
    }

    for (index, (dir_id, path)) in absolute.into_iter().enumerate() {
        let suffix = if index == 0 { String::new() } else { index.to_string() };
        if index == 0 {
            product.push(
                Element::new("Property")
                    .attr("Id", "INSTALLDIR_ABSOLUTEPATH")
                    .attr("Value", path.as_str()),
            );
        }

        let action_id = format!("Set_DirAbsolutePath{}", suffix);
        product.push(
            Element::new("CustomAction")
                .attr("Id", action_id.as_str())
                .attr("Property", dir_id.as_str())
                .attr("Value", path.as_str()),
        );

        for (sequence, ui_level) in [("InstallExecuteSequence", "UILevel < 5"), ("InstallUISequence", "UILevel = 5")] {
            let mut custom = Element::new("Custom")
                .attr("Action", action_id.as_str())
                .attr("Before", "AppSearch");
            custom.add_text(format!(
                "(NOT Installed) AND ({}) AND ({} = ABSOLUTEPATH{})",
                ui_level, dir_id, suffix
            ));
            product.find_or_add(sequence).push(custom);
        }
    }
}

/// Replace shortcut icon paths with `Icon` element ids
fn inject_shortcut_icons(product: &mut Element) {
    let mut icons: BTreeMap<String, String> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    for shortcut in product.descendants() {
        if shortcut.name != "Shortcut" {
            continue;
        }
        if let Some(file) = shortcut.get_attr("Icon") {
            if !icons.contains_key(file) {
                let id = format!("IconFile{}_{}", order.len() + 1, expand(path_file_name(file), true));
                icons.insert(file.to_string(), id);
                order.push(file.to_string());
            }
        }
    }
    if icons.is_empty() {
        return;
    }

    replace_icon_attrs(product, &icons);
    for file in order {
        if let Some(id) = icons.get(&file) {
            product.push(
                Element::new("Icon")
                    .attr("Id", id.as_str())
                    .attr("SourceFile", file.as_str()),
            );
        }
    }
}

fn replace_icon_attrs(element: &mut Element, icons: &BTreeMap<String, String>) {
    if element.name == "Shortcut" {
        if let Some(id) = element.get_attr("Icon").and_then(|file| icons.get(file)).cloned() {
            element.set_attr("Icon", id);
        }
    }
    for child in element.elements_mut() {
        replace_icon_attrs(child, icons);
    }
}

/// 64-bit packages: components are 64-bit unless they say otherwise
fn inject_win64(element: &mut Element) {
    if element.name == "Component" && !element.has_attr("Win64") {
        element.set_attr("Win64", "yes");
    }
    for child in element.elements_mut() {
        inject_win64(child);
    }
}

/// Route the raw custom attributes of the document: `Component:` attributes
/// move to the enclosing component, namespaced ones get their prefix.
fn route_custom_attributes(product: &mut Element, extensions: &mut Vec<WixExtension>) -> Result<()> {
    let mut moves: Vec<(String, Vec<(String, String)>)> = Vec::new();
    route_element(product, None, &mut moves, extensions)?;

    for (component_id, attributes) in moves {
        match product.find_by_id_mut("Component", &component_id) {
            Some(component) => {
                for (name, value) in attributes {
                    component.set_attr(name, value);
                }
            }
            None => log::warn!("Component '{}' not found for routed attributes", component_id),
        }
    }
    Ok(())
}

fn route_element(
    element: &mut Element,
    component: Option<&str>,
    moves: &mut Vec<(String, Vec<(String, String)>)>,
    extensions: &mut Vec<WixExtension>,
) -> Result<()> {
    let needs_routing = element
        .attributes
        .iter()
        .any(|(name, _)| name.contains(':') || name.starts_with('{'));

    if needs_routing {
        let routed = route_attributes(&element.attributes)?;
        element.attributes = routed.element;
        for ext in routed.extensions {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        if !routed.component.is_empty() {
            match component {
                Some(id) => moves.push((id.to_string(), routed.component)),
                None => log::warn!(
                    "Component attributes on '{}' ignored: it is not inside a component",
                    element.name
                ),
            }
        }
    }

    if let Some((prefix, _)) = element.name.split_once(':') {
        if let Some(ext) = WixExtension::from_prefix(prefix) {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
    }

    let own_id = (element.name == "Component")
        .then(|| element.get_attr("Id").map(str::to_string))
        .flatten();
    let component = own_id.as_deref().or(component);

    for child in element.elements_mut() {
        route_element(child, component, moves, extensions)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action::Sequence;
    use crate::model::project::Platform;
    use crate::model::dir::FileShortcut;
    use crate::model::property::Property;
    use crate::model::registry::RegistryHive;
    use crate::id::IdHook;
    use uuid::Uuid;

    fn guid() -> Uuid {
        Uuid::parse_str("6fe30b47-2577-43ad-9095-1861ba25889b").unwrap()
    }

    fn project() -> Project {
        Project::new("MyProduct").guid(guid()).dir(
            Dir::new(r"%ProgramFiles%\My Company\My Product")
                .file(File::new(r"bin\MyApp.exe"))
                .file(File::new("readme.txt")),
        )
    }

    fn compile(project: &Project) -> Element {
        Compiler::default().generate_wix_proj(project).unwrap()
    }

    fn product(wix: &Element) -> &Element {
        wix.find("Product").unwrap()
    }

    fn ids_of<'a>(root: &'a Element, name: &str) -> Vec<&'a str> {
        root.descendants()
            .into_iter()
            .filter(|el| el.name == name)
            .filter_map(|el| el.get_attr("Id"))
            .collect()
    }

    #[test]
    fn test_product_and_package() {
        let wix = compile(&project().version("1.2.3.4"));
        assert_eq!(wix.get_attr("xmlns"), Some(WIX_NAMESPACE));

        let product = product(&wix);
        assert_eq!(product.get_attr("Name"), Some("MyProduct"));
        assert_eq!(product.get_attr("Language"), Some("1033"));
        assert_eq!(product.get_attr("Codepage"), Some("1252"));
        assert_eq!(product.get_attr("Version"), Some("1.2.3.4"));
        assert_eq!(product.get_attr("UpgradeCode"), Some(guid().to_string().as_str()));
        assert!(!product.has_attr("Manufacturer"));

        let package = product.find("Package").unwrap();
        assert_eq!(package.get_attr("Compressed"), Some("yes"));
        assert_eq!(package.get_attr("InstallerVersion"), Some("200"));
        assert_eq!(package.get_attr("Languages"), Some("1033"));
        assert!(!package.has_attr("Id"));
    }

    #[test]
    fn test_directory_ids_and_install_dir() {
        let wix = compile(&project());
        assert_eq!(
            ids_of(&wix, "Directory"),
            vec!["TARGETDIR", "ProgramFilesFolder", "ProgramFilesFolder.My20Company", "INSTALLDIR"]
        );
    }

    #[test]
    fn test_file_components() {
        let wix = compile(&project());
        let files = ids_of(&wix, "File");
        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with("MyApp.exe_"));

        let components = ids_of(&wix, "Component");
        assert_eq!(components[0], format!("Component.{}", files[0]));
        let feature = product(&wix).find("Feature").unwrap();
        assert_eq!(feature.get_attr("Title"), Some("Complete"));
        assert_eq!(ids_of(feature, "ComponentRef").len(), 2);
    }

    #[test]
    fn test_legacy_ids() {
        let mut config = CompilerConfig::default();
        config.auto_generation.legacy_default_id_algorithm = true;
        let wix = Compiler::new(config).generate_wix_proj(&project()).unwrap();
        assert_eq!(ids_of(&wix, "File"), vec!["MyApp.exe", "readme.txt"]);
    }

    #[test]
    fn test_repeated_builds_are_identical() {
        let mut compiler = Compiler::default();
        let first = compiler.compile(&project()).unwrap().to_xml_string();
        let second = compiler.compile(&project()).unwrap().to_xml_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_caller_project_untouched() {
        let project = project();
        Compiler::default().compile(&project).unwrap();
        assert!(project.all_dirs().iter().all(|d| d.entity.id.is_none()));
    }

    #[test]
    fn test_empty_directory() {
        let project = Project::new("P")
            .guid(guid())
            .dir(
                Dir::new(r"%ProgramFiles%\Acme")
                    .file(File::new("a.exe"))
                    .dir(Dir::new("Logs")),
            );
        let wix = compile(&project);
        let component = wix
            .find_by_id("Component", "Component.INSTALLDIR.Logs.EmptyDirectory")
            .unwrap();
        assert!(component.find("CreateFolder").is_some());
        assert_eq!(
            component.find("RemoveFolder").unwrap().get_attr("Id"),
            Some("INSTALLDIR.Logs")
        );
    }

    #[test]
    fn test_dummy_dir_without_dirs() {
        let project = Project::new("P")
            .guid(guid())
            .reg_value(RegValue::string(RegistryHive::HKLM, r"Software\Acme", "Path", "x"));
        let wix = compile(&project);
        let dir = wix.find_by_id("Directory", "ProgramFilesFolder").unwrap();
        assert!(dir.find_by_id("Component", "Registry.1").is_some());
        // no files: media dropped
        assert!(product(&wix).find("Media").is_none());
    }

    #[test]
    fn test_x64_mapping() {
        let project = project().platform(Platform::X64);
        let wix = compile(&project);
        assert!(wix.find_by_id("Directory", "ProgramFiles64Folder").is_some());
        let component = wix.descendants().into_iter().find(|el| el.name == "Component").unwrap();
        assert_eq!(component.get_attr("Win64"), Some("yes"));
    }

    #[test]
    fn test_absolute_dir() {
        let project = Project::new("P")
            .guid(guid())
            .dir(Dir::new(r"C:\Tools").install_dir().file(File::new("a.exe")));
        let wix = compile(&project);
        let dir = wix.find_by_id("Directory", "INSTALLDIR").unwrap();
        assert_eq!(dir.get_attr("Name"), Some("ABSOLUTEPATH"));
        let action = wix.find_by_id("CustomAction", "Set_DirAbsolutePath").unwrap();
        assert_eq!(action.get_attr("Value"), Some(r"C:\Tools"));

        let project = Project::new("P")
            .guid(guid())
            .dir(Dir::new(r"%ProgramFiles%\Acme").file(File::new("a.exe")))
            .dir(Dir::new(r"D:\Data").file(File::new("b.dat")));
        let wix = compile(&project);
        assert!(wix.find_by_id("Directory", "TARGETDIR1").is_some());
    }

    #[test]
    fn test_file_shortcut_auto_location() {
        let project = Project::new("P").guid(guid()).dir(
            Dir::new(r"%ProgramFiles%\Acme").file(
                File::new("app.exe").shortcut(FileShortcut::new("App", r"%ProgramMenu%\Acme")),
            ),
        );
        let wix = compile(&project);
        let shortcut = wix
            .descendants()
            .into_iter()
            .find(|el| el.name == "Shortcut")
            .unwrap();
        assert_eq!(shortcut.get_attr("Directory"), Some("ProgramMenuFolder.Acme"));
        assert_eq!(shortcut.get_attr("Name"), Some("App.lnk"));
        assert!(!shortcut.has_attr("Arguments"));
        assert!(wix.find_by_id("Directory", "ProgramMenuFolder.Acme").is_some());
    }

    #[test]
    fn test_dir_shortcut() {
        let project = Project::new("P").guid(guid()).dir(
            Dir::new(r"%Desktop%")
                .shortcut(ExeFileShortcut::new("Tool", r"[INSTALLDIR]tool.exe").arguments("-x")),
        );
        let wix = compile(&project);
        let shortcut = wix
            .descendants()
            .into_iter()
            .find(|el| el.name == "Shortcut")
            .unwrap();
        assert_eq!(shortcut.get_attr("Target"), Some("[INSTALLDIR]tool.exe"));
        assert_eq!(shortcut.get_attr("WorkingDirectory"), Some("INSTALLDIR"));
        assert_eq!(shortcut.get_attr("Arguments"), Some("-x"));
        assert_eq!(shortcut.get_attr("Name"), Some("Tool.lnk"));
    }

    #[test]
    fn test_registry_key_path() {
        let project = Project::new("P")
            .guid(guid())
            .reg_value(RegValue::string(RegistryHive::HKCU, r"Software\Acme", "A", "1"))
            .reg_value(RegValue::string(RegistryHive::HKCU, r"Software\Acme", "B", "x\ny"));
        let wix = compile(&project);
        let values: Vec<&Element> = wix
            .descendants()
            .into_iter()
            .filter(|el| el.name == "RegistryValue")
            .collect();
        assert_eq!(values[0].get_attr("KeyPath"), Some("no"));
        assert_eq!(values[1].get_attr("KeyPath"), Some("yes"));
        assert_eq!(values[1].get_attr("Type"), Some("multiString"));
        assert_eq!(values[1].elements().count(), 2);
    }

    #[test]
    fn test_actions_previous_step() {
        let project = project()
            .action(Action::set_property("A", "1"))
            .action(Action::set_property("B", "2"));
        let wix = compile(&project);
        let sequence = product(&wix).find("InstallExecuteSequence").unwrap();
        let customs: Vec<&Element> = sequence.elements().collect();
        assert_eq!(customs[0].get_attr("Action"), Some("Action1SetProp_A"));
        assert_eq!(customs[0].get_attr("After"), Some("InstallInitialize"));
        assert_eq!(customs[1].get_attr("After"), Some("Action1SetProp_A"));
        assert_eq!(customs[1].text(), " (NOT Installed) ");
    }

    #[test]
    fn test_previous_action_without_predecessor() {
        let mut action = Action::set_property("A", "1");
        action.step = Step::previous_action();
        let result = Compiler::default().generate_wix_proj(&project().action(action));
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_exec_with_rollback() {
        let action = Action::quiet_exec(r"%SystemFolder%\cmd.exe", "/c setup")
            .execute(Execute::Deferred)
            .rollback(r"%SystemFolder%\cmd.exe", Some("/c undo".to_string()));
        let wix = compile(&project().action(action));

        let set = wix.find_by_id("CustomAction", "Set_WixQuietExec_cmd.exe").unwrap();
        assert_eq!(set.get_attr("Property"), Some("WixQuietExec_cmd.exe"));
        assert_eq!(set.get_attr("Value"), Some("\"[SystemFolder]cmd.exe\" /c setup"));
        assert!(wix.find_by_id("CustomAction", "WixQuietExec_cmd.exe_Rollback").is_some());
        assert!(wix.get_attr("xmlns:util").is_some());
    }

    #[test]
    fn test_custom_attribute_routing() {
        let mut file = File::new("app.exe");
        file.entity.attributes_definition = Some("Component:Permanent=yes;Checksum=yes".to_string());
        let project = Project::new("P")
            .guid(guid())
            .dir(Dir::new(r"%ProgramFiles%\Acme").file(file));
        let wix = compile(&project);

        let component = wix.descendants().into_iter().find(|el| el.name == "Component").unwrap();
        assert_eq!(component.get_attr("Permanent"), Some("yes"));
        let file = component.find("File").unwrap();
        assert_eq!(file.get_attr("Checksum"), Some("yes"));
        assert!(!file.has_attr("Component:Permanent"));
    }

    #[test]
    fn test_features_pruned_and_mapped() {
        let project = Project::new("P")
            .guid(guid())
            .dir(Dir::new(r"%ProgramFiles%\Acme").file(File::new("a.exe").feature("Tools")))
            .feature(Feature::new("Docs"))
            .feature(Feature::new("Main").child(Feature::new("Tools")));
        let wix = compile(&project);
        let product = product(&wix);
        let features: Vec<&str> = product
            .elements()
            .filter(|el| el.name == "Feature")
            .filter_map(|el| el.get_attr("Title"))
            .collect();
        assert_eq!(features, vec!["Main"]);
        assert!(product.find("Feature").unwrap().find("Feature").is_some());
    }

    #[test]
    fn test_undeclared_feature_is_created() {
        let project = Project::new("P")
            .guid(guid())
            .dir(Dir::new(r"%ProgramFiles%\Acme").file(File::new("a.exe").feature("Extras")));
        let wix = compile(&project);
        assert!(wix.find_by_id("Feature", "Extras").is_some());
    }

    #[test]
    fn test_ui_install_dir() {
        let mut project = project();
        project.ui = WixUi::InstallDir;
        let wix = compile(&project);
        let product = product(&wix);
        assert_eq!(
            product.find_by_id("Property", "WIXUI_INSTALLDIR").unwrap().get_attr("Value"),
            Some("INSTALLDIR")
        );
        assert_eq!(ids_of(product, "UIRef"), vec!["WixUI_InstallDir", "WixUI_ErrorProgressText"]);

        let mut project = project.clone();
        project.ui = WixUi::ProgressOnly;
        assert!(compile(&project).find_by_id("UIRef", "WixUI_ProgressOnly").is_none());
    }

    #[test]
    fn test_properties_and_reboot() {
        let mut project = project().property(Property::new("MYPROP", "value"));
        project.reboot_suppressing = Some(crate::model::reboot::RebootSuppressing::ReallySuppress);
        project.schedule_reboot = Some(crate::model::reboot::Reboot::default());
        let wix = compile(&project);
        let product = product(&wix);
        assert!(product.find_by_id("Property", "MYPROP").is_some());
        assert_eq!(
            product.find_by_id("Property", "REBOOT").unwrap().get_attr("Value"),
            Some("ReallySuppress")
        );
        let sequence = product.find("InstallExecuteSequence").unwrap();
        assert!(sequence.find("ScheduleReboot").is_some());
    }

    #[test]
    fn test_custom_sequence_attributes() {
        let mut action = Action::set_property("A", "1").sequences(vec![
            Sequence::InstallExecuteSequence,
            Sequence::InstallUISequence,
        ]);
        action.entity.set_attribute("Custom:Overridable", "yes");
        let wix = compile(&project().action(action));
        let product = product(&wix);
        for sequence in ["InstallExecuteSequence", "InstallUISequence"] {
            let custom = product.find(sequence).unwrap().find("Custom").unwrap();
            assert_eq!(custom.get_attr("Overridable"), Some("yes"));
        }
        assert!(!product
            .find("CustomAction")
            .unwrap()
            .has_attr("Custom:Overridable"));
    }

    #[test]
    fn test_preview_ids() {
        let ids = Compiler::default().preview_ids(&project()).unwrap();
        let kinds: Vec<&str> = ids.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Dir", "Dir", "Dir", "File", "File", "Feature"]);
        assert_eq!(ids[2].id, "INSTALLDIR");
    }

    #[test]
    fn test_build_wxs() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut project = project();
        project.out_dir = temp.path().join("out");
        let path = Compiler::default().build_wxs(&project).unwrap();
        assert_eq!(path, temp.path().join("out").join("MyProduct.wxs"));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("<?xml"));
        assert!(content.contains("Generated by wix-dsl"));
    }

    fn set_action<'a>(wix: &'a Element) -> &'a Element {
        wix.descendants()
            .into_iter()
            .find(|el| {
                el.name == "CustomAction"
                    && el.get_attr("Id").map_or(false, |id| id.starts_with("Set_"))
            })
            .unwrap()
    }

    #[test]
    fn test_quiet_exec_keeps_literal_percent() {
        let project = project().action(Action::quiet_exec(
            r"[INSTALLDIR]tool.exe",
            "/ratio 50% /home %USERPROFILE%",
        ));
        let wix = compile(&project);
        assert_eq!(
            set_action(&wix).get_attr("Value"),
            Some(r#""[INSTALLDIR]tool.exe" /ratio 50% /home %USERPROFILE%"#)
        );
    }

    #[test]
    fn test_quiet_exec_set_action_gets_attributes() {
        let mut action = Action::quiet_exec(r"%SystemFolder%\cmd.exe", "/c setup");
        action.entity.set_attribute("HideTarget", "yes");
        let wix = compile(&project().action(action));
        assert_eq!(set_action(&wix).get_attr("HideTarget"), Some("yes"));
    }

    #[test]
    fn test_custom_dir_ids_are_unique() {
        let mut project = Project::new("MyProduct").guid(guid()).dir(
            Dir::new(r"%ProgramFiles%\Acme")
                .file(File::new("app.exe"))
                .dir(Dir::new(r"A\bin").file(File::new("a.dll")))
                .dir(Dir::new(r"B\bin").file(File::new("b.dll"))),
        );
        project.custom_id_algorithm = Some(IdHook::new(|request: &IdRequest| {
            (request.kind == IdKind::Dir && request.name == "bin").then(|| "BINDIR".to_string())
        }));

        let wix = compile(&project);
        let mut dirs = ids_of(&wix, "Directory");
        assert!(dirs.contains(&"BINDIR"));
        assert!(dirs.contains(&"BINDIR_"));
        let count = dirs.len();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), count);
    }

    #[test]
    fn test_shortcut_locations_share_special_folder() {
        let project = Project::new("MyProduct").guid(guid()).dir(
            Dir::new(r"%ProgramFiles%\Acme")
                .file(File::new("app.exe").shortcut(FileShortcut::new("App", r"%ProgramMenu%\Acme")))
                .file(File::new("tool.exe").shortcut(FileShortcut::new("Tool", r"%ProgramMenu%\Other"))),
        );
        let wix = compile(&project);
        let dirs = ids_of(&wix, "Directory");
        assert_eq!(dirs.iter().filter(|id| **id == "ProgramMenuFolder").count(), 1);

        let menu = wix.find_by_id("Directory", "ProgramMenuFolder").unwrap();
        let children: Vec<&str> = menu
            .elements()
            .filter(|el| el.name == "Directory")
            .filter_map(|el| el.get_attr("Id"))
            .collect();
        assert_eq!(children, vec!["ProgramMenuFolder.Acme", "ProgramMenuFolder.Other"]);
    }

    #[test]
    fn test_ids_allocated_before_build_are_discarded() {
        let mut config = CompilerConfig::default();
        config.auto_generation.legacy_default_id_algorithm = true;
        let expected = Compiler::new(config.clone())
            .compile(&project())
            .unwrap()
            .to_xml_string();

        let mut compiler = Compiler::new(config);
        compiler.ids_mut().reserve("readme.txt");
        compiler
            .ids_mut()
            .allocate(&IdRequest::new(IdKind::Dir, "My Company"), None);
        let xml = compiler.compile(&project()).unwrap().to_xml_string();
        assert_eq!(xml, expected);
        assert!(!compiler.ids_mut().has_allocations());
    }

    #[test]
    fn test_kept_ids_are_suffixed() {
        let mut config = CompilerConfig::default();
        config.auto_generation.legacy_default_id_algorithm = true;
        config.auto_generation.do_not_reset_id_generator = true;

        let mut compiler = Compiler::new(config);
        compiler.ids_mut().reserve("readme.txt");
        let wix = compiler.generate_wix_proj(&project()).unwrap();
        assert_eq!(ids_of(&wix, "File"), vec!["MyApp.exe", "readme.txt_"]);
        assert!(compiler.ids_mut().is_taken("readme.txt_"));
    }

    #[test]
    fn test_registry_string_expands_constants() {
        let project = project()
            .reg_value(RegValue::string(
                RegistryHive::HKLM,
                r"Software\Acme",
                "Path",
                r"%ProgramFiles%\Acme",
            ))
            .reg_value(RegValue::string(
                RegistryHive::HKLM,
                r"Software\Acme",
                "Search",
                r"\%PATH\%;[INSTALLDIR]",
            ));
        let wix = compile(&project);
        let values: Vec<&Element> = wix
            .descendants()
            .into_iter()
            .filter(|el| el.name == "RegistryValue")
            .collect();

        let path = values.iter().find(|el| el.get_attr("Name") == Some("Path")).unwrap();
        assert_eq!(path.get_attr("Value"), Some(r"ProgramFilesFolder\Acme"));
        assert_eq!(path.get_attr("Type"), Some("expandable"));

        let search = values.iter().find(|el| el.get_attr("Name") == Some("Search")).unwrap();
        assert_eq!(search.get_attr("Value"), Some("%PATH%;[INSTALLDIR]"));
    }
}
