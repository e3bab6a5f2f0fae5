//! WiX extensions
//!
//! Each extension contributes an XML namespace (v3 source), a `candle`/`light`
//! assembly and a `wix build` extension package for WiX v4 and newer.

use serde::{Deserialize, Serialize};

/// WiX extension referenced by the generated source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WixExtension {
    Util,
    Fire,
    Iis,
    Difx,
    NetFx,
    Http,
    Sql,
    Bal,
    Ui,
    /// Extension not known to the compiler
    Custom {
        dll: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        namespace: Option<String>,
    },
}

impl WixExtension {
    /// All built-in extensions
    pub const KNOWN: [WixExtension; 9] = [
        WixExtension::Util,
        WixExtension::Fire,
        WixExtension::Iis,
        WixExtension::Difx,
        WixExtension::NetFx,
        WixExtension::Http,
        WixExtension::Sql,
        WixExtension::Bal,
        WixExtension::Ui,
    ];

    /// XML namespace prefix
    pub fn prefix(&self) -> Option<&str> {
        match self {
            WixExtension::Util => Some("util"),
            WixExtension::Fire => Some("fire"),
            WixExtension::Iis => Some("iis"),
            WixExtension::Difx => Some("difx"),
            WixExtension::NetFx => Some("netfx"),
            WixExtension::Http => Some("http"),
            WixExtension::Sql => Some("sql"),
            WixExtension::Bal => Some("bal"),
            WixExtension::Ui => None,
            WixExtension::Custom { prefix, .. } => prefix.as_deref(),
        }
    }

    /// WiX v3 XML namespace
    pub fn namespace(&self) -> Option<&str> {
        match self {
            WixExtension::Util => Some("http://schemas.microsoft.com/wix/UtilExtension"),
            WixExtension::Fire => Some("http://schemas.microsoft.com/wix/FirewallExtension"),
            WixExtension::Iis => Some("http://schemas.microsoft.com/wix/IIsExtension"),
            WixExtension::Difx => Some("http://schemas.microsoft.com/wix/DifxAppExtension"),
            WixExtension::NetFx => Some("http://schemas.microsoft.com/wix/NetFxExtension"),
            WixExtension::Http => Some("http://schemas.microsoft.com/wix/HttpExtension"),
            WixExtension::Sql => Some("http://schemas.microsoft.com/wix/SqlExtension"),
            WixExtension::Bal => Some("http://schemas.microsoft.com/wix/BalExtension"),
            WixExtension::Ui => None,
            WixExtension::Custom { namespace, .. } => namespace.as_deref(),
        }
    }

    /// Assembly passed to `candle`/`light` with `-ext`
    pub fn v3_dll(&self) -> &str {
        match self {
            WixExtension::Util => "WixUtilExtension.dll",
            WixExtension::Fire => "WixFirewallExtension.dll",
            WixExtension::Iis => "WixIIsExtension.dll",
            WixExtension::Difx => "WixDifxAppExtension.dll",
            WixExtension::NetFx => "WiXNetFxExtension.dll",
            WixExtension::Http => "WiXHttpExtension.dll",
            WixExtension::Sql => "WixSqlExtension.dll",
            WixExtension::Bal => "WixBalExtension.dll",
            WixExtension::Ui => "WixUIExtension.dll",
            WixExtension::Custom { dll, .. } => dll,
        }
    }

    /// Extension package passed to `wix build` with `-ext`
    pub fn v4_name(&self) -> &str {
        match self {
            WixExtension::Util => "WixToolset.Util.wixext",
            WixExtension::Fire => "WixToolset.Firewall.wixext",
            WixExtension::Iis => "WixToolset.Iis.wixext",
            WixExtension::Difx => "WixToolset.DifxApp.wixext",
            WixExtension::NetFx => "WixToolset.Netfx.wixext",
            WixExtension::Http => "WixToolset.Http.wixext",
            WixExtension::Sql => "WixToolset.Sql.wixext",
            WixExtension::Bal => "WixToolset.Bal.wixext",
            WixExtension::Ui => "WixToolset.UI.wixext",
            WixExtension::Custom { dll, .. } => dll,
        }
    }

    /// Built-in extension by prefix or assembly name
    pub fn from_str(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        let lower = lower.trim_end_matches(".dll");
        Self::KNOWN.into_iter().find(|ext| {
            ext.prefix() == Some(lower)
                || ext.v3_dll().to_lowercase().trim_end_matches(".dll") == lower
                || ext.v4_name().to_lowercase() == lower
                || (matches!(ext, WixExtension::Ui) && lower == "ui")
        })
    }

    /// Built-in extension owning an XML namespace
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|ext| ext.namespace() == Some(namespace))
    }

    /// Built-in extension owning a namespace prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|ext| ext.prefix() == Some(prefix))
    }

    /// `xmlns:prefix` declaration for the root element
    pub fn xmlns(&self) -> Option<(String, String)> {
        match (self.prefix(), self.namespace()) {
            (Some(prefix), Some(ns)) => Some((format!("xmlns:{}", prefix), ns.to_string())),
            _ => None,
        }
    }
}
