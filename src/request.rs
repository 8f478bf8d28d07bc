//! Admin, query and packaging request documents.
//!
//! These builders only assemble the unsigned request tree and know the path
//! it is posted to. Signing happens in [`crate::envelope`].
use std::fmt;
use std::str::FromStr;

use base64::Engine;

use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::tree::{Element, ADEPT_NS};

/// Value of the `auth` attribute on admin requests.
pub const AUTH_BUILTIN: &str = "builtin";
/// Path of the packaging endpoint.
pub const PACKAGE_PATH: &str = "/packaging/Package";
/// Path of the resource item query endpoint.
pub const QUERY_RESOURCE_ITEMS_PATH: &str = "/admin/QueryResourceItems";

/// Admin API family, each served from `/admin/Manage<Api>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    /// Keyed by distributor + resource.
    DistributionRights,
    /// Keyed by distributor.
    Distributor,
    /// Keyed by fulfillment.
    Fulfillment,
    /// Keyed by fulfillment.
    FulfillmentItem,
    /// Keyed by user + resource.
    License,
    /// Keyed by resource + item.
    ResourceItem,
    /// Keyed by resource.
    ResourceKey,
    /// Keyed by user.
    UserPublic,
}

impl Api {
    pub const ALL: [Api; 8] = [
        Api::DistributionRights,
        Api::Distributor,
        Api::Fulfillment,
        Api::FulfillmentItem,
        Api::License,
        Api::ResourceItem,
        Api::ResourceKey,
        Api::UserPublic,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Api::DistributionRights => "DistributionRights",
            Api::Distributor => "Distributor",
            Api::Fulfillment => "Fulfillment",
            Api::FulfillmentItem => "FulfillmentItem",
            Api::License => "License",
            Api::ResourceItem => "ResourceItem",
            Api::ResourceKey => "ResourceKey",
            Api::UserPublic => "UserPublic",
        }
    }

    /// Endpoint path.
    #[must_use]
    pub fn path(self) -> String {
        format!("/admin/Manage{}", self.as_str())
    }

    /// Name of the element carrying the API arguments, which is also the
    /// element each result is returned in.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            Api::DistributionRights => "distributionRights",
            Api::Distributor => "distributorData",
            Api::Fulfillment => "fulfillmentData",
            Api::FulfillmentItem => "fulfillmentItemData",
            Api::License => "licenseData",
            Api::ResourceItem => "resourceItemInfo",
            Api::ResourceKey => "resourceKey",
            Api::UserPublic => "userPublic",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Api {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Api::ALL
            .into_iter()
            .find(|api| api.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("Unknown api {:?}", s)))
    }
}

/// Admin request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Count,
    Create,
    Delete,
    /// Replaces the whole record; fields left out are cleared on the server.
    Update,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Count => "count",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Action::Get),
            "count" => Ok(Action::Count),
            "create" => Ok(Action::Create),
            "delete" => Ok(Action::Delete),
            "update" => Ok(Action::Update),
            _ => Err(Error::Validation(format!(
                "Action should be one of get, count, create, delete, update, got {:?}",
                s
            ))),
        }
    }
}

/// Pagination bounds. Zero means "not set".
///
/// Signed integers so that negative caller input is rejected rather than
/// silently wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub start: i64,
    pub count: i64,
}

impl Limit {
    pub fn new(start: i64, count: i64) -> Self {
        Self { start, count }
    }

    /// Append a `<limit>` element to `parent` unless both bounds are unset.
    pub fn apply(&self, parent: &mut Element) -> Result<()> {
        if self.start == 0 && self.count == 0 {
            return Ok(());
        }
        if self.start != 0 && self.count == 0 {
            return Err(Error::Validation(
                "Please provide count when using start".to_string(),
            ));
        }
        if self.start < 0 || self.count < 0 {
            return Err(Error::Validation(
                "Please use positive values for count and start".to_string(),
            ));
        }
        let mut limit = Element::new("limit");
        if self.start != 0 {
            limit.subelement("start", self.start.to_string());
        }
        limit.subelement("count", self.count.to_string());
        parent.push(limit);
        Ok(())
    }
}

fn request_root() -> Element {
    Element::in_default_namespace(ADEPT_NS, "request")
}

/// A request against one of the `/admin/Manage*` endpoints.
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub api: Api,
    pub action: Action,
    /// Arguments added as children of the API element, in order.
    pub args: Vec<(String, Fragment)>,
    pub limit: Limit,
    /// Permissions markup appended to the API element. Takes the place of any
    /// `permissions` argument.
    pub permissions: Option<Fragment>,
    /// Resource id appended to the request root.
    pub resource: Option<String>,
}

impl AdminRequest {
    pub fn new(api: Api, action: Action) -> Self {
        Self {
            api,
            action,
            args: Vec::new(),
            limit: Limit::default(),
            permissions: None,
            resource: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Fragment>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn args<K, V>(mut self, args: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Fragment>,
    {
        self.args
            .extend(args.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn limit(mut self, start: i64, count: i64) -> Self {
        self.limit = Limit::new(start, count);
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: impl Into<Fragment>) -> Self {
        self.permissions = Some(permissions.into());
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Endpoint path of this request.
    pub fn path(&self) -> String {
        self.api.path()
    }

    /// Assemble the unsigned request tree.
    pub fn build(&self) -> Result<Element> {
        let mut root = request_root()
            .with_attribute("action", self.action.as_str())
            .with_attribute("auth", AUTH_BUILTIN);

        self.limit.apply(&mut root)?;

        let mut api_el = Element::new(self.api.element_name());
        for (name, value) in &self.args {
            if value.is_empty() {
                continue;
            }
            if name == "permissions" && self.permissions.is_some() {
                continue;
            }
            api_el.push(value.clone().into_element(name)?);
        }
        if let Some(permissions) = &self.permissions {
            api_el.push(permissions.clone().into_element("permissions")?);
        }
        root.push(api_el);

        if let Some(resource) = &self.resource {
            root.subelement("resource", resource.clone());
        }
        Ok(root)
    }
}

/// Listing of packaged resource items.
#[derive(Debug, Clone, Default)]
pub struct QueryResourceItems {
    pub distributor: Option<String>,
    pub shared_secret: Option<String>,
    pub limit: Limit,
}

impl QueryResourceItems {
    pub fn new(start: i64, count: i64) -> Self {
        Self {
            limit: Limit::new(start, count),
            ..Default::default()
        }
    }

    pub fn build(&self) -> Result<Element> {
        let mut root = request_root();
        if let Some(distributor) = &self.distributor {
            root.subelement("distributor", distributor.clone());
        }
        if let Some(secret) = &self.shared_secret {
            root.subelement("sharedSecret", secret.clone());
        }
        self.limit.apply(&mut root)?;
        root.push(Element::new("QueryResourceItems"));
        Ok(root)
    }
}

/// Where the packager reads the source document from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// Document bytes sent inline.
    Data(Vec<u8>),
    /// Path of the document on the server.
    DataPath(String),
}

/// A packaging (upload) request.
#[derive(Debug, Clone, Default)]
pub struct PackageRequest {
    pub source: Option<PackageSource>,
    /// Existing resource id to package into.
    pub resource: Option<String>,
    pub voucher: Option<String>,
    /// Item index for multi-part resources.
    pub resource_item: Option<String>,
    pub file_name: Option<String>,
    /// Server path or FTP URL receiving the encrypted result.
    pub location: Option<String>,
    /// URL the resource is advertised as downloadable from.
    pub src: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub thumbnail_location: Option<String>,
    pub permissions: Option<Fragment>,
    /// Resource metadata; the server fills in missing values from the media.
    pub metadata: Option<Fragment>,
}

impl PackageRequest {
    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Some(PackageSource::Data(data.into())),
            ..Default::default()
        }
    }

    pub fn from_data_path(path: impl Into<String>) -> Self {
        Self {
            source: Some(PackageSource::DataPath(path.into())),
            ..Default::default()
        }
    }

    pub fn build(&self) -> Result<Element> {
        let source = self.source.as_ref().ok_or_else(|| {
            Error::Validation("Package request needs document data or a data path".to_string())
        })?;

        let b64 = base64::engine::general_purpose::STANDARD;
        let mut root = Element::in_default_namespace(ADEPT_NS, "package");
        match source {
            PackageSource::Data(data) => {
                root.subelement("data", b64.encode(data));
            }
            PackageSource::DataPath(path) => {
                root.subelement("dataPath", path.clone());
            }
        }

        let optional = [
            ("resource", &self.resource),
            ("voucher", &self.voucher),
            ("resourceItem", &self.resource_item),
            ("fileName", &self.file_name),
            ("location", &self.location),
            ("src", &self.src),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                root.subelement(name, value.clone());
            }
        }
        if let Some(thumbnail) = &self.thumbnail {
            root.subelement("thumbnailData", b64.encode(thumbnail));
        }
        if let Some(location) = &self.thumbnail_location {
            root.subelement("thumbnailLocation", location.clone());
        }
        if let Some(permissions) = &self.permissions {
            root.push(permissions.clone().into_element("permissions")?);
        }
        if let Some(metadata) = &self.metadata {
            root.push(metadata.clone().into_element("metadata")?);
        }
        Ok(root)
    }
}
