//
// This module contains the main entry point of the crate, DavServer.
//
// It sits in front of the webdav handler: authenticates the request,
// sets up the property store for the user, and lets the handler do
// the rest.
//
use std::error::Error as StdError;
use std::sync::Arc;

use bytes::Buf;
use dav_server::body::Body;
use dav_server::fakels::FakeLs;
use dav_server::fs::DavFileSystem;
use dav_server::ls::DavLockSystem;
use dav_server::memls::MemLs;
use dav_server::{DavConfig, DavHandler};
use futures_util::stream::Stream;
use http::header::{HeaderValue, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::StreamBody;
use crate::errors::{PropError, PropResult};
use crate::fs::PropFs;
use crate::props::{PropertyBackend, PropertyStore};

pub mod auth;

pub use auth::{Authenticator, UserTable};

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockSystem {
    #[default]
    Mem,
    Fake,
}

impl LockSystem {
    fn build(self) -> Box<dyn DavLockSystem> {
        match self {
            LockSystem::Mem => MemLs::new(),
            LockSystem::Fake => FakeLs::new(),
        }
    }
}

/// Configuration of the server.
pub struct DavServerBuilder {
    /// Prefix to be stripped off when handling request.
    prefix: String,
    /// Filesystem backend. Wrapped in a `PropFs` for every request.
    fs: Option<Box<dyn DavFileSystem>>,
    /// Durable dead property storage.
    store: Option<Arc<dyn PropertyStore>>,
    /// Identity provider.
    auth: Option<Arc<dyn Authenticator>>,
    /// Locksystem backend.
    ls: Option<LockSystem>,
    /// Realm sent with a 401.
    realm: String,
}

impl Default for DavServerBuilder {
    fn default() -> Self {
        DavServerBuilder {
            prefix: String::new(),
            fs: None,
            store: None,
            auth: None,
            ls: None,
            realm: "cloud-dav".to_string(),
        }
    }
}

impl DavServerBuilder {
    pub fn new() -> DavServerBuilder {
        DavServerBuilder::default()
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a filesystem path.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = prefix.into();
        this
    }

    /// Set the filesystem to serve.
    pub fn filesystem(self, fs: Box<dyn DavFileSystem>) -> Self {
        let mut this = self;
        this.fs = Some(fs);
        this
    }

    /// Set the store for dead properties.
    pub fn store(self, store: Arc<dyn PropertyStore>) -> Self {
        let mut this = self;
        this.store = Some(store);
        this
    }

    /// Set the identity provider.
    pub fn authenticator(self, auth: Arc<dyn Authenticator>) -> Self {
        let mut this = self;
        this.auth = Some(auth);
        this
    }

    /// Set the locksystem to use.
    pub fn locksystem(self, ls: LockSystem) -> Self {
        let mut this = self;
        this.ls = Some(ls);
        this
    }

    /// Realm for the `WWW-Authenticate` header.
    pub fn realm(self, realm: impl Into<String>) -> Self {
        let mut this = self;
        this.realm = realm.into();
        this
    }

    pub fn build(self) -> PropResult<DavServer> {
        let fs = self.fs.ok_or(PropError::Config("filesystem"))?;
        let store = self.store.ok_or(PropError::Config("store"))?;
        let auth = self.auth.ok_or(PropError::Config("authenticator"))?;

        // The filesystem and principal are per request, see `request_config`.
        let mut config = DavHandler::builder().strip_prefix(self.prefix);
        if let Some(ls) = self.ls {
            config = config.locksystem(ls.build());
        }

        Ok(DavServer {
            dav: config.build_handler(),
            fs: Arc::from(fs),
            store,
            auth,
            realm: Arc::new(self.realm),
        })
    }
}

/// The webdav server.
///
/// Cheap to clone. Every request gets its own property backend (and
/// with it its own property cache) for the authenticated user.
#[derive(Clone)]
pub struct DavServer {
    dav: DavHandler,
    fs: Arc<dyn DavFileSystem>,
    store: Arc<dyn PropertyStore>,
    auth: Arc<dyn Authenticator>,
    realm: Arc<String>,
}

impl DavServer {
    /// Return a configuration builder.
    pub fn builder() -> DavServerBuilder {
        DavServerBuilder::new()
    }

    /// Handle a webdav request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_with(req, None).await
    }

    /// Handle a webdav request. A `prefix` replaces the one the server
    /// was built with for this request. Used by framework adapters that
    /// mount the server below some path.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        prefix: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        let user = match auth::basic_user(req.headers(), self.auth.as_ref()) {
            Some(user) => user,
            None => {
                debug!("== {} {} unauthenticated", req.method(), req.uri());
                return self.unauthorized();
            }
        };
        debug!("== {} {} as {}", req.method(), req.uri(), user);
        let config = self.request_config(user, prefix);
        self.dav.handle_with(config, req).await
    }

    /// Handles a request with a `Stream` body instead of a `HttpBody`.
    pub async fn handle_stream<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        prefix: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: Stream<Item = Result<ReqData, ReqError>>,
    {
        let req = {
            let (parts, body) = req.into_parts();
            Request::from_parts(parts, StreamBody::new(body))
        };
        self.handle_with(req, prefix).await
    }

    // A fresh PropFs (and property cache) for this request and user.
    fn request_config(&self, user: String, prefix: Option<String>) -> DavConfig {
        let backend = PropertyBackend::new(self.store.clone(), user.clone());
        let mut config = DavConfig::new()
            .filesystem(PropFs::new(self.fs.clone(), backend))
            .principal(user);
        if let Some(prefix) = prefix {
            config = config.strip_prefix(prefix);
        }
        config
    }

    fn unauthorized(&self) -> Response<Body> {
        let mut resp = Response::new(Body::from("authentication required".to_string()));
        *resp.status_mut() = StatusCode::UNAUTHORIZED;
        let challenge = format!("Basic realm=\"{}\"", self.realm);
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            resp.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        resp
    }
}
