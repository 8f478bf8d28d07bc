//! Content server admin client.
//!
//! Every network method returns `Ok(None)` when the client is in dry-run
//! mode: the request is still built, signed and logged.
use crate::auth;
use crate::config::Config;
use crate::envelope;
use crate::error::{Error, Result};
use crate::link::{self, LinkRequest};
use crate::request::{
    Action, AdminRequest, Api, PackageRequest, QueryResourceItems, PACKAGE_PATH,
    QUERY_RESOURCE_ITEMS_PATH,
};
use crate::transport::Transport;
use crate::tree::{Element, ADEPT_NS};

/// Default distributor used by the server when none is named.
pub const DEFAULT_DISTRIBUTOR: &str = "urn:uuid:00000000-0000-0000-0000-000000000001";

/// Result of an admin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to a `count` action.
    Count(u64),
    /// Every API element in the response, in document order.
    Items(Vec<Element>),
}

impl Reply {
    /// The items, or an empty slice for a count.
    pub fn items(&self) -> &[Element] {
        match self {
            Reply::Items(items) => items,
            Reply::Count(_) => &[],
        }
    }

    fn into_first(self, what: &str) -> Result<Element> {
        match self {
            Reply::Items(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| Error::Server(format!("Server returned no {}", what))),
            Reply::Count(_) => Err(Error::Server(format!(
                "Server returned a count instead of {}",
                what
            ))),
        }
    }
}

/// Client for one content server.
#[derive(Debug, Clone)]
pub struct ContentServer {
    pub host: String,
    pub port: u16,
    password: String,
    /// Distributor used by the shortcuts. The server falls back to its
    /// default distributor when `None`.
    pub distributor: Option<String>,
    config: Config,
    transport: Transport,
}

impl ContentServer {
    /// Create a client for `host`, taking the port from `config`.
    pub fn new(host: impl Into<String>, password: impl Into<String>, config: Config) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Ok(Self {
            host: host.into(),
            port: config.port,
            password: password.into(),
            distributor: None,
            config,
            transport,
        })
    }

    #[must_use]
    pub fn with_distributor(mut self, distributor: impl Into<String>) -> Self {
        self.distributor = Some(distributor.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sign `root` and post it to `path`.
    fn post(&self, root: Element, path: &str) -> Result<Option<Element>> {
        let sealed = envelope::seal(root, &self.password, &self.config)?;
        trace!("Sealed request for {} with hmac {:?}", path, sealed.hmac());
        self.transport
            .send(&self.host, self.port, path, sealed.as_bytes())
    }

    /// Run an admin request. Update actions replace the whole record, so
    /// every field must be supplied.
    pub fn request(&self, request: &AdminRequest) -> Result<Option<Reply>> {
        let Some(response) = self.post(request.build()?, &request.path())? else {
            return Ok(None);
        };

        if request.action == Action::Count {
            let text = if response.is(None, ADEPT_NS, "count") {
                Some(response.text())
            } else {
                response.find(ADEPT_NS, "count").map(Element::text)
            };
            let count = text
                .and_then(|t| t.trim().parse::<u64>().ok())
                .ok_or_else(|| Error::MalformedResponse {
                    reason: "Count reply has no numeric count element".to_string(),
                    raw: response.to_markup().into_bytes(),
                })?;
            return Ok(Some(Reply::Count(count)));
        }

        let items = response
            .find_all(ADEPT_NS, request.api.element_name())
            .into_iter()
            .cloned()
            .collect();
        Ok(Some(Reply::Items(items)))
    }

    /// Package a document. Returns the server's reply document.
    pub fn upload(&self, package: &PackageRequest) -> Result<Option<Element>> {
        self.post(package.build()?, PACKAGE_PATH)
    }

    /// List packaged resource items.
    pub fn query_resource_items(&self, query: &QueryResourceItems) -> Result<Option<Vec<Element>>> {
        let Some(response) = self.post(query.build()?, QUERY_RESOURCE_ITEMS_PATH)? else {
            return Ok(None);
        };
        Ok(Some(
            response
                .find_all(ADEPT_NS, Api::ResourceItem.element_name())
                .into_iter()
                .cloned()
                .collect(),
        ))
    }

    fn first(&self, request: AdminRequest, what: &str) -> Result<Option<Element>> {
        match self.request(&request)? {
            Some(reply) => reply.into_first(what).map(Some),
            None => Ok(None),
        }
    }

    /// Record of `distributor`, or of this client's distributor.
    pub fn distributor_info(&self, distributor: Option<&str>) -> Result<Option<Element>> {
        let mut request = AdminRequest::new(Api::Distributor, Action::Get);
        if let Some(distributor) = distributor.or(self.distributor.as_deref()) {
            request = request.arg("distributor", distributor);
        }
        self.first(request, "distributor")
    }

    /// Every distributor.
    pub fn distributors(&self) -> Result<Option<Vec<Element>>> {
        let reply = self.request(&AdminRequest::new(Api::Distributor, Action::Get))?;
        Ok(reply.map(|r| r.items().to_vec()))
    }

    /// Operator inventory record of `resource`, permissions included.
    pub fn resource_key_info(&self, resource: &str) -> Result<Option<Element>> {
        let request = AdminRequest::new(Api::ResourceKey, Action::Get).arg("resource", resource);
        self.first(request, "resource key")
    }

    /// Replace a resource key record with `info`, typically a record returned
    /// by [`ContentServer::resource_key_info`] with some fields changed.
    pub fn update_resource_key(&self, info: &Element) -> Result<Option<Element>> {
        self.first(update_from(Api::ResourceKey, info), "resource key")
    }

    pub fn resource_item_info(&self, resource: &str) -> Result<Option<Element>> {
        let request = AdminRequest::new(Api::ResourceItem, Action::Get).arg("resource", resource);
        self.first(request, "resource item")
    }

    /// Replace a resource item record. The server does not accept metadata
    /// changes here.
    pub fn update_resource_item(&self, info: &Element) -> Result<Option<Element>> {
        self.first(update_from(Api::ResourceItem, info), "resource item")
    }

    /// Mint a fulfillment link.
    ///
    /// Without `shared_secret` the distributor record is fetched for its
    /// secret, and its name fills in an empty order source.
    pub fn mint(&self, request: &LinkRequest, shared_secret: Option<&str>) -> Result<Option<String>> {
        if let Some(secret) = shared_secret {
            return link::mint(&self.host, self.port, secret, request).map(Some);
        }

        let Some(info) = self.distributor_info(None)? else {
            return Ok(None);
        };
        let secret = info.child_text("sharedSecret").ok_or_else(|| {
            Error::Server("Distributor record has no sharedSecret".to_string())
        })?;
        let mut request = request.clone();
        if request.order_source.is_empty() {
            request.order_source = info.child_text("name").unwrap_or_default().to_string();
        }
        link::mint(&self.host, self.port, secret, &request).map(Some)
    }

    /// A fresh shared secret for a new distributor.
    pub fn make_shared_secret() -> String {
        auth::make_shared_secret()
    }
}

/// Update request carrying every child of a returned record as an argument.
fn update_from(api: Api, info: &Element) -> AdminRequest {
    let args = info
        .children()
        .iter()
        .map(|child| (child.name.local.clone(), child.clone()));
    AdminRequest::new(api, Action::Update).args(args)
}
