//! Origin arithmetic and sender trust checks.
//!
//! Every service lives on its own subdomain of the supervisor's root domain:
//! `https://supervisor.example.com` has root domain `example.com`, and the
//! `tokens` service is served from `https://tokens.example.com`. Whether an
//! inbound message is trusted depends on nothing but the sending window's
//! relation to us and its origin string.

use url::{Host as UrlHost, Url};
use xframe_protocol::{Origin, OriginationData, ServiceId};

use crate::config::SupervisorConfig;
use crate::error::OriginError;
use crate::host::SourceKind;
use crate::plugins::PluginManagers;

/// Origin rules derived from the supervisor's own location.
#[derive(Clone, Debug)]
pub struct OriginPolicy {
    location: Url,
    root_domain: String,
    loader_path: String,
    root_app_name: ServiceId,
    require_https: bool,
}

impl OriginPolicy {
    pub fn new(config: &SupervisorConfig) -> Result<Self, OriginError> {
        let location =
            Url::parse(&config.location).map_err(|e| OriginError::InvalidUrl(e.to_string()))?;
        match location.scheme() {
            "http" | "https" => {}
            other => return Err(OriginError::UnsupportedScheme(other.to_string())),
        }
        let host = match location.host() {
            Some(UrlHost::Domain(host)) => host.to_string(),
            _ => return Err(OriginError::MissingSubdomain(config.location.clone())),
        };
        let root_domain = match host.split_once('.') {
            Some((_, rest)) if !rest.is_empty() => rest.to_string(),
            _ => return Err(OriginError::MissingSubdomain(host)),
        };
        Ok(Self {
            location,
            root_domain,
            loader_path: config.loader_path.clone(),
            root_app_name: config.root_app_name.clone(),
            require_https: config.require_https,
        })
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Origin serving `service`: our own URL with the first label replaced.
    pub fn compute_service_origin(&self, service: &str) -> Result<Origin, OriginError> {
        let url = self.sibling_url(Some(service), "")?;
        Ok(Origin::new(url.origin().ascii_serialization()))
    }

    /// The bare root domain, e.g. `https://example.com`.
    pub fn root_domain_origin(&self) -> Result<Origin, OriginError> {
        let url = self.sibling_url(None, "")?;
        Ok(Origin::new(url.origin().ascii_serialization()))
    }

    /// Our own URL moved to `subdomain` (or to the root domain), with `path`.
    ///
    /// Scheme and port are preserved; query and fragment are dropped.
    pub fn sibling_url(&self, subdomain: Option<&str>, path: &str) -> Result<Url, OriginError> {
        let host = match subdomain {
            Some(label) if label.is_empty() || label.contains('.') => {
                return Err(OriginError::InvalidUrl(format!("bad service label: {label:?}")))
            }
            Some(label) => format!("{label}.{}", self.root_domain),
            None => self.root_domain.clone(),
        };
        let mut url = self.location.clone();
        url.set_host(Some(&host))
            .map_err(|e| OriginError::InvalidUrl(format!("{host}: {e}")))?;
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Where the loader page for `service` is served.
    pub fn loader_url(&self, service: &str) -> Result<String, OriginError> {
        Ok(self.sibling_url(Some(service), &self.loader_path)?.to_string())
    }

    /// Service an origin belongs to, if it is on our root domain.
    pub fn service_from_origin(&self, origin: &Origin) -> Option<ServiceId> {
        let host = domain_of(origin)?;
        if host == self.root_domain {
            return Some(self.root_app_name.clone());
        }
        let label = host.strip_suffix(&self.root_domain)?.strip_suffix('.')?;
        (!label.is_empty() && !label.contains('.')).then(|| label.to_string())
    }

    pub fn origination(&self, origin: &Origin) -> OriginationData {
        OriginationData {
            app: self.service_from_origin(origin),
            origin: origin.clone(),
        }
    }

    /// The sender is the embedding application.
    ///
    /// It must be both our top and our parent window, and be served from the
    /// root domain or one of its subdomains.
    pub fn is_from_application(&self, source: SourceKind, origin: &Origin) -> bool {
        if source != SourceKind::TopAndParent {
            return false;
        }
        let Ok(url) = Url::parse(origin.as_str()) else {
            return false;
        };
        let scheme_ok = match url.scheme() {
            "https" => true,
            "http" => !self.require_https,
            _ => false,
        };
        scheme_ok && domain_of(origin).is_some_and(|host| self.is_on_root_domain(&host))
    }

    /// The sender is a loader frame of a service we track.
    pub fn is_from_known_child_loader(
        &self,
        source: SourceKind,
        origin: &Origin,
        managers: &PluginManagers,
    ) -> bool {
        if source != SourceKind::Child {
            return false;
        }
        managers.services().any(|service| {
            self.compute_service_origin(service)
                .is_ok_and(|expected| &expected == origin)
        })
    }

    fn is_on_root_domain(&self, host: &str) -> bool {
        host == self.root_domain
            || host
                .strip_suffix(&self.root_domain)
                .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
    }
}

fn domain_of(origin: &Origin) -> Option<String> {
    let url = Url::parse(origin.as_str()).ok()?;
    match url.host()? {
        UrlHost::Domain(host) => Some(host.to_string()),
        _ => None,
    }
}
