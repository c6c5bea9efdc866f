//! Adapter for the `warp` HTTP server framework.
//!
//! The filter in this module always succeeds and never returns an
//! error. A missing file is a 404 reply, bad credentials a 401 reply,
//! not an internal rejection.
//!
use std::convert::Infallible;

use crate::DavServer;
use warp::{filters::BoxedFilter, Filter, Reply};

/// Reply-filter that runs a DavServer.
///
/// The request path up to this point is stripped off as a prefix. It
/// replaces the prefix set with `DavServerBuilder::strip_prefix`.
pub fn dav_server_filter(server: DavServer) -> BoxedFilter<(impl Reply,)> {
    use http::header::HeaderMap;
    use http::{Response, StatusCode};
    use warp::path::{FullPath, Tail};

    warp::method()
        .and(warp::path::full())
        .and(warp::path::tail())
        .and(warp::header::headers_cloned())
        .and(warp::body::stream())
        .and_then(
            move |method, path_full: FullPath, path_tail: Tail, headers: HeaderMap, body| {
                let server = server.clone();

                async move {
                    // rebuild an http::Request struct.
                    let path_str = path_full.as_str();
                    let mut builder = http::Request::builder().method(method).uri(path_str);
                    for (k, v) in headers.iter() {
                        builder = builder.header(k, v);
                    }

                    let prefix = path_str[..path_str.len() - path_tail.as_str().len()].to_string();
                    let response = match builder.body(body) {
                        Ok(request) => server.handle_stream(request, Some(prefix)).await,
                        Err(e) => {
                            debug!("cannot rebuild request for {}: {}", path_str, e);
                            let mut resp = Response::new(dav_server::body::Body::empty());
                            *resp.status_mut() = StatusCode::BAD_REQUEST;
                            resp
                        }
                    };

                    // Need to remap the http_body::Body to a hyper::Body.
                    let (parts, body) = response.into_parts();
                    let response = Response::from_parts(parts, hyper::Body::wrap_stream(body));
                    Ok::<_, Infallible>(response)
                }
            },
        )
        .boxed()
}
