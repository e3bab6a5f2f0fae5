//! Generic entities
//!
//! Items that know how to place themselves in the document. The built-in
//! ones are listed in [`GenericItem`]; library users can attach their own
//! [`GenericEntity`] implementations to directories, files and the project.

use crate::attributes::Entity;
use crate::env_consts::PROGRAM_FILES_IDS;
use crate::error::Result;
use crate::guid::GuidGenerator;
use crate::id::IdKind;
use crate::model::condition::Condition;
use crate::model::extension::WixExtension;
use crate::model::media::MediaTemplate;
use crate::model::project::Project;
use crate::xml::Element;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Component ids per feature name
pub type FeatureComponents = BTreeMap<String, Vec<String>>;

/// User supplied items, processed after the built-in ones
pub type CustomItems = Vec<Arc<dyn GenericEntity>>;

/// Anything that can emit itself into the document being compiled
pub trait GenericEntity: Debug + Send + Sync {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()>;
}

/// State handed to generic entities while they are processed
pub struct ProcessingContext<'a> {
    /// Project being compiled, with ids assigned
    pub project: &'a Project,
    /// Element the entity belongs to (`Directory`, `File` or `Product`)
    pub parent: &'a mut Element,
    pub feature_components: &'a mut FeatureComponents,
    /// Extensions the document needs
    pub extensions: &'a mut Vec<WixExtension>,
    pub guids: &'a mut GuidGenerator,
    /// Write every condition as CDATA
    pub force_cdata: bool,
}

impl ProcessingContext<'_> {
    /// Register an extension used by the emitted elements
    pub fn include(&mut self, extension: WixExtension) {
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
    }

    /// `Component` for an entity that needs one of its own. The id is the
    /// `Component:Id` attribute or the entity id.
    pub fn create_parent_component(&mut self, entity: &Entity) -> Element {
        let id = entity
            .component_id()
            .map(str::to_string)
            .unwrap_or_else(|| entity.id().to_string());
        let guid = self.guids.new_guid(&id);

        let mut component = Element::new("Component")
            .attr("Id", id)
            .attr("Guid", guid.to_string());

        if let Some(condition) = entity.component_condition() {
            let mut element = Element::new("Condition");
            add_condition_text(&mut element, &Condition::new(condition), self.force_cdata);
            component.push(element);
        }
        component
    }

    /// Insert `component` at the best place below [`ProcessingContext::parent`]:
    /// the element holding the first component, else the first Program Files
    /// directory, else the parent itself. The component is then mapped to
    /// `features`.
    pub fn insert_parent_component(&mut self, component: Element, features: &[String]) {
        let id = component.get_attr("Id").unwrap_or_default().to_string();

        let path = self
            .first_component_parent()
            .or_else(|| self.first_program_files_dir());
        let best = match path.as_deref() {
            Some(path) => self.parent.at_path_mut(path),
            None => None,
        };
        match best {
            Some(best) => best.push(component),
            None => self.parent.push(component),
        }

        self.map_component_to_features(&id, features);
    }

    /// Map a component to `features`, or to the default feature when empty
    pub fn map_component_to_features(&mut self, component_id: &str, features: &[String]) {
        if features.is_empty() {
            self.feature_components
                .entry(self.project.default_feature.name().to_string())
                .or_default()
                .push(component_id.to_string());
            return;
        }
        for feature in features {
            self.feature_components
                .entry(feature.clone())
                .or_default()
                .push(component_id.to_string());
        }
    }

    fn first_component_parent(&self) -> Option<Vec<usize>> {
        let holds_component = |el: &Element| el.elements().any(|c| c.name == "Component");
        if holds_component(&*self.parent) {
            return Some(Vec::new());
        }
        self.parent.path_to(&holds_component)
    }

    /// Walk the chain of first `Directory` children looking for Program Files
    fn first_program_files_dir(&self) -> Option<Vec<usize>> {
        let mut path = self.parent.path_to(&|el: &Element| el.name == "Directory")?;
        loop {
            let dir = self.parent.at_path(&path)?;
            let is_program_files = dir
                .get_attr("Name")
                .map(|n| n.starts_with("ProgramFiles") && n.ends_with("Folder"))
                .unwrap_or(false)
                || dir
                    .get_attr("Id")
                    .map(|id| PROGRAM_FILES_IDS.contains(&id))
                    .unwrap_or(false);
            if is_program_files {
                return Some(path);
            }
            let next = dir.elements().position(|el| el.name == "Directory")?;
            path.push(next);
        }
    }
}

/// Write a condition as text, or CDATA when it needs it
pub fn add_condition_text(element: &mut Element, condition: &Condition, force_cdata: bool) {
    if condition.needs_cdata(force_cdata) {
        element.add_cdata(condition.to_wix_string());
    } else {
        element.add_text(condition.to_wix_string());
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// `Environment/@Action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvVarAction {
    Create,
    #[default]
    Set,
    Remove,
}

impl EnvVarAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvVarAction::Create => "create",
            EnvVarAction::Set => "set",
            EnvVarAction::Remove => "remove",
        }
    }
}

/// `Environment/@Part`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvVarPart {
    All,
    First,
    Last,
}

impl EnvVarPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvVarPart::All => "all",
            EnvVarPart::First => "first",
            EnvVarPart::Last => "last",
        }
    }
}

/// Environment variable set on install, in a component of its own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentVariable {
    /// `name` is the variable name
    #[serde(flatten)]
    pub entity: Entity,
    pub value: String,
    pub system: Option<bool>,
    pub permanent: Option<bool>,
    pub action: EnvVarAction,
    pub part: Option<EnvVarPart>,
    pub condition: Option<Condition>,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            value: value.into(),
            ..Default::default()
        }
    }
}

impl GenericEntity for EnvironmentVariable {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        let mut environment = Element::new("Environment")
            .attr("Id", self.entity.id())
            .attr("Name", self.entity.name.as_str())
            .attr_opt("System", self.system.map(yes_no))
            .attr_opt("Permanent", self.permanent.map(yes_no))
            .attr("Value", self.value.as_str())
            .attr("Action", self.action.as_str())
            .attr_opt("Part", self.part.map(|p| p.as_str()));
        self.entity.apply_attributes(&mut environment)?;

        let mut component = ctx.create_parent_component(&self.entity);
        component.push(environment);

        if let Some(condition) = self.condition.as_ref().filter(|c| !c.is_empty()) {
            let mut element = Element::new("Condition");
            add_condition_text(&mut element, condition, ctx.force_cdata);
            component.push(element);
        }

        ctx.insert_parent_component(component, &self.entity.features);
        Ok(())
    }
}

/// `FirewallException/@Profile`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallProfile {
    Domain,
    Private,
    Public,
    All,
}

impl FirewallProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirewallProfile::Domain => "domain",
            FirewallProfile::Private => "private",
            FirewallProfile::Public => "public",
            FirewallProfile::All => "all",
        }
    }
}

/// `FirewallException/@Protocol`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallProtocol {
    Tcp,
    Udp,
}

impl FirewallProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirewallProtocol::Tcp => "tcp",
            FirewallProtocol::Udp => "udp",
        }
    }
}

/// `FirewallException/@Scope`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirewallScope {
    Any,
    LocalSubnet,
}

impl FirewallScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirewallScope::Any => "any",
            FirewallScope::LocalSubnet => "localSubnet",
        }
    }
}

/// Windows Firewall exception (fire extension)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallException {
    #[serde(flatten)]
    pub entity: Entity,
    pub description: Option<String>,
    /// File id of the program; not needed when nested in a file
    pub file: Option<String>,
    pub program: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<FirewallProtocol>,
    pub profile: Option<FirewallProfile>,
    pub scope: Option<FirewallScope>,
    pub ignore_failure: Option<bool>,
    pub remote_addresses: Vec<String>,
}

impl FirewallException {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            entity: Entity::named(name),
            ..Default::default()
        }
    }

    fn to_element(&self) -> Result<Element> {
        let mut element = Element::new("fire:FirewallException")
            .attr("Id", self.entity.id())
            .attr_opt("Description", self.description.clone())
            .attr_opt("File", self.file.clone())
            .attr_opt("IgnoreFailure", self.ignore_failure.map(yes_no))
            .attr("Name", self.entity.name.as_str())
            .attr_opt("Port", self.port.clone())
            .attr_opt("Profile", self.profile.map(|p| p.as_str()))
            .attr_opt("Program", self.program.clone())
            .attr_opt("Protocol", self.protocol.map(|p| p.as_str()))
            .attr_opt("Scope", self.scope.map(|s| s.as_str()));
        self.entity.apply_attributes(&mut element)?;

        for address in &self.remote_addresses {
            element.push(Element::new("fire:RemoteAddress").attr("Value", address.trim()));
        }
        Ok(element)
    }
}

impl GenericEntity for FirewallException {
    /// Gets its own component when the parent already holds components,
    /// otherwise nests directly in the parent (e.g. a `File`).
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        ctx.include(WixExtension::Fire);
        let element = self.to_element()?;

        match ctx.first_component_parent() {
            Some(_) => {
                let mut component = ctx.create_parent_component(&self.entity);
                component.push(element);
                ctx.insert_parent_component(component, &self.entity.features);
            }
            None => ctx.parent.push(element),
        }
        Ok(())
    }
}

/// Certificate store location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreLocation {
    CurrentUser,
    #[default]
    LocalMachine,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::CurrentUser => "currentUser",
            StoreLocation::LocalMachine => "localMachine",
        }
    }
}

/// Certificate store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreName {
    Ca,
    My,
    #[default]
    Personal,
    Request,
    Root,
    OtherPeople,
    TrustedPeople,
    TrustedPublisher,
}

impl StoreName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreName::Ca => "ca",
            StoreName::My => "my",
            StoreName::Personal => "personal",
            StoreName::Request => "request",
            StoreName::Root => "root",
            StoreName::OtherPeople => "otherPeople",
            StoreName::TrustedPeople => "trustedPeople",
            StoreName::TrustedPublisher => "trustedPublisher",
        }
    }
}

/// Certificate installed into a store (iis extension). Either `binary_key`
/// or `certificate_path` names the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    #[serde(flatten)]
    pub entity: Entity,
    pub binary_key: Option<String>,
    pub certificate_path: Option<String>,
    pub overwrite: Option<bool>,
    pub request: Option<bool>,
    pub pfx_password: Option<String>,
    pub store_location: StoreLocation,
    pub store_name: StoreName,
}

impl Certificate {
    pub fn from_binary(
        name: impl Into<String>,
        store_location: StoreLocation,
        store_name: StoreName,
        binary_key: impl Into<String>,
    ) -> Self {
        Self {
            entity: Entity::named(name),
            binary_key: Some(binary_key.into()),
            store_location,
            store_name,
            ..Default::default()
        }
    }
}

impl GenericEntity for Certificate {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        ctx.include(WixExtension::Iis);

        let mut element = Element::new("iis:Certificate")
            .attr("Id", self.entity.id())
            .attr_opt("BinaryKey", self.binary_key.clone())
            .attr_opt("CertificatePath", self.certificate_path.clone())
            .attr("Name", self.entity.name.as_str())
            .attr_opt("Overwrite", self.overwrite.map(yes_no))
            .attr_opt("PFXPassword", self.pfx_password.clone())
            .attr_opt("Request", self.request.map(yes_no))
            .attr("StoreLocation", self.store_location.as_str())
            .attr("StoreName", self.store_name.as_str());
        self.entity.apply_attributes(&mut element)?;

        let mut component = ctx.create_parent_component(&self.entity);
        component.push(element);
        ctx.insert_parent_component(component, &self.entity.features);
        Ok(())
    }
}

impl GenericEntity for MediaTemplate {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        ctx.parent.push(self.to_element());
        Ok(())
    }
}

/// Built-in generic items, loadable from project files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenericItem {
    EnvironmentVariable(EnvironmentVariable),
    FirewallException(FirewallException),
    Certificate(Certificate),
    MediaTemplate(MediaTemplate),
}

impl GenericItem {
    /// Entity needing an id, with the kind it is allocated under
    pub fn entity_mut(&mut self) -> Option<(IdKind, &mut Entity)> {
        match self {
            GenericItem::EnvironmentVariable(v) => {
                Some((IdKind::EnvironmentVariable, &mut v.entity))
            }
            GenericItem::FirewallException(f) => Some((IdKind::FirewallException, &mut f.entity)),
            GenericItem::Certificate(c) => Some((IdKind::Certificate, &mut c.entity)),
            GenericItem::MediaTemplate(_) => None,
        }
    }

    pub fn entity(&self) -> Option<(IdKind, &Entity)> {
        match self {
            GenericItem::EnvironmentVariable(v) => Some((IdKind::EnvironmentVariable, &v.entity)),
            GenericItem::FirewallException(f) => Some((IdKind::FirewallException, &f.entity)),
            GenericItem::Certificate(c) => Some((IdKind::Certificate, &c.entity)),
            GenericItem::MediaTemplate(_) => None,
        }
    }
}

impl GenericEntity for GenericItem {
    fn process(&self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        match self {
            GenericItem::EnvironmentVariable(v) => v.process(ctx),
            GenericItem::FirewallException(f) => f.process(ctx),
            GenericItem::Certificate(c) => c.process(ctx),
            GenericItem::MediaTemplate(m) => m.process(ctx),
        }
    }
}

impl From<EnvironmentVariable> for GenericItem {
    fn from(value: EnvironmentVariable) -> Self {
        GenericItem::EnvironmentVariable(value)
    }
}

impl From<FirewallException> for GenericItem {
    fn from(value: FirewallException) -> Self {
        GenericItem::FirewallException(value)
    }
}

impl From<Certificate> for GenericItem {
    fn from(value: Certificate) -> Self {
        GenericItem::Certificate(value)
    }
}

impl From<MediaTemplate> for GenericItem {
    fn from(value: MediaTemplate) -> Self {
        GenericItem::MediaTemplate(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::GuidAlgorithm;
    use uuid::Uuid;

    struct Fixture {
        project: Project,
        feature_components: FeatureComponents,
        extensions: Vec<WixExtension>,
        guids: GuidGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                project: Project::new("Test"),
                feature_components: FeatureComponents::new(),
                extensions: Vec::new(),
                guids: GuidGenerator::new(Uuid::nil(), GuidAlgorithm::Hashed),
            }
        }

        fn process(&mut self, item: &dyn GenericEntity, parent: &mut Element) {
            let mut ctx = ProcessingContext {
                project: &self.project,
                parent,
                feature_components: &mut self.feature_components,
                extensions: &mut self.extensions,
                guids: &mut self.guids,
                force_cdata: false,
            };
            item.process(&mut ctx).unwrap();
        }
    }

    fn product_with_dirs() -> Element {
        Element::new("Product").child(
            Element::new("Directory")
                .attr("Id", "TARGETDIR")
                .attr("Name", "SourceDir")
                .child(
                    Element::new("Directory")
                        .attr("Id", "ProgramFilesFolder")
                        .attr("Name", "ProgramFilesFolder")
                        .child(Element::new("Directory").attr("Id", "INSTALLDIR")),
                ),
        )
    }

    #[test]
    fn test_environment_variable_goes_to_program_files() {
        let mut fixture = Fixture::new();
        let mut var = EnvironmentVariable::new("MYAPP_HOME", "[INSTALLDIR]");
        var.entity.id = Some("MYAPP_HOME".to_string());

        let mut product = product_with_dirs();
        fixture.process(&var, &mut product);

        let program_files = product.find_by_id("Directory", "ProgramFilesFolder").unwrap();
        let component = program_files.find("Component").unwrap();
        assert_eq!(component.get_attr("Id"), Some("MYAPP_HOME"));
        let env = component.find("Environment").unwrap();
        assert_eq!(env.get_attr("Action"), Some("set"));
        assert_eq!(env.get_attr("Value"), Some("[INSTALLDIR]"));
        assert_eq!(
            fixture.feature_components.get("Complete"),
            Some(&vec!["MYAPP_HOME".to_string()])
        );
    }

    #[test]
    fn test_component_goes_next_to_existing_components() {
        let mut fixture = Fixture::new();
        let mut var = EnvironmentVariable::new("X", "1");
        var.entity.id = Some("X".to_string());
        var.entity.features.push("Tools".to_string());

        let mut product = product_with_dirs();
        if let Some(dir) = product.find_by_id_mut("Directory", "INSTALLDIR") {
            dir.push(Element::new("Component").attr("Id", "Existing"));
        }
        fixture.process(&var, &mut product);

        let install_dir = product.find_by_id("Directory", "INSTALLDIR").unwrap();
        assert_eq!(install_dir.elements().count(), 2);
        assert_eq!(fixture.feature_components.get("Tools").map(Vec::len), Some(1));
    }

    #[test]
    fn test_firewall_exception_nested_without_components() {
        let mut fixture = Fixture::new();
        let mut exception = FirewallException::new("MyApp");
        exception.entity.id = Some("MyApp".to_string());
        exception.remote_addresses = vec![" 127.0.0.1 ".to_string()];

        let mut file = Element::new("File").attr("Id", "app.exe");
        fixture.process(&exception, &mut file);

        let fw = file.find("fire:FirewallException").unwrap();
        assert_eq!(fw.get_attr("Name"), Some("MyApp"));
        assert_eq!(
            fw.find("fire:RemoteAddress").unwrap().get_attr("Value"),
            Some("127.0.0.1")
        );
        assert_eq!(fixture.extensions, vec![WixExtension::Fire]);
        assert!(fixture.feature_components.is_empty());
    }

    #[test]
    fn test_component_condition_attribute() {
        let mut fixture = Fixture::new();
        let mut cert = Certificate::from_binary(
            "MyCert",
            StoreLocation::LocalMachine,
            StoreName::Root,
            "CertBinary",
        );
        cert.entity.id = Some("MyCert".to_string());
        cert.entity.set_component_condition("NOT Installed");
        cert.entity.set_component_id("CertComponent");

        let mut product = product_with_dirs();
        fixture.process(&cert, &mut product);

        let component = product.find_by_id("Component", "CertComponent").unwrap();
        assert_eq!(component.find("Condition").unwrap().text(), "NOT Installed");
        let element = component.find("iis:Certificate").unwrap();
        assert_eq!(element.get_attr("StoreName"), Some("root"));
        assert!(!element.has_attr("Component:Id"));
    }

    #[test]
    fn test_generic_item_yaml() {
        let yaml = "type: environment_variable\nname: PATH\nvalue: '[INSTALLDIR]'\npart: last\n";
        let item: GenericItem = serde_yaml::from_str(yaml).unwrap();
        match item {
            GenericItem::EnvironmentVariable(var) => {
                assert_eq!(var.entity.name, "PATH");
                assert_eq!(var.part, Some(EnvVarPart::Last));
            }
            other => panic!("unexpected item {:?}", other),
        }
    }
}
