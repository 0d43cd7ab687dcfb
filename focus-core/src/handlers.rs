use crate::interceptor::{Decision, InterceptionHandler};
use crate::page::SubstitutePage;
use hudsucker::{
    hyper::{
        header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, HOST},
        Body, Method, Request, Response, StatusCode,
    },
    HttpContext, HttpHandler, RequestOrResponse,
};
use tracing::debug;

/// Hudsucker handler that routes every proxied request through the
/// [`InterceptionHandler`] of the running focus session.
#[derive(Clone)]
pub struct FocusHandler {
    interceptor: InterceptionHandler,
}

impl FocusHandler {
    pub fn new(interceptor: InterceptionHandler) -> Self {
        Self { interceptor }
    }

    fn decide(&self, req: Request<Body>) -> RequestOrResponse {
        // CONNECT only opens the tunnel; the decrypted requests inside it are classified.
        if req.method() == Method::CONNECT {
            return RequestOrResponse::Request(req);
        }

        let host = match request_host(&req) {
            Some(host) => host,
            None => {
                debug!("No host on request {}, forwarding", req.uri());
                return RequestOrResponse::Request(req);
            }
        };

        match self.interceptor.on_request(&host) {
            Decision::Allow => RequestOrResponse::Request(req),
            Decision::Block(page) => RequestOrResponse::Response(substitute_response(page)),
        }
    }
}

/// Host of a proxied request: the URI authority, else the `Host` header without port.
pub fn request_host<B>(req: &Request<B>) -> Option<String> {
    if let Some(host) = req.uri().host() {
        if !host.is_empty() {
            return Some(host.trim_start_matches('[').trim_end_matches(']').to_string());
        }
    }

    let header = req.headers().get(HOST)?.to_str().ok()?.trim();
    let host = strip_port(header);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => authority,
    }
}

fn substitute_response(page: SubstitutePage) -> Response<Body> {
    let mut res = Response::new(Body::from(page.body));
    *res.status_mut() = StatusCode::OK;
    let headers = res.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(page.content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    res
}

#[async_trait::async_trait]
impl HttpHandler for FocusHandler {
    async fn handle_request(
        &mut self,
        _ctx: &HttpContext,
        req: Request<Body>,
    ) -> RequestOrResponse {
        self.decide(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use crate::filter::{BlockEntry, BlockList};
    use crate::page::MessageSet;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn handler() -> (FocusHandler, Arc<SessionContext>) {
        let ctx = Arc::new(SessionContext::new(
            BlockList::from_entries(vec![BlockEntry::new("X", "x.com").unwrap()]),
            MessageSet::default(),
            100,
        ));
        let interceptor = InterceptionHandler::new(ctx.clone(), Utc::now() + Duration::minutes(3));
        (FocusHandler::new(interceptor), ctx)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_blocked_request_short_circuits() {
        let (h, ctx) = handler();
        match h.decide(request(Method::GET, "https://mobile.x.com/home")) {
            RequestOrResponse::Response(res) => {
                assert_eq!(res.status(), StatusCode::OK);
                assert_eq!(
                    res.headers().get(CONTENT_TYPE).unwrap(),
                    "text/html; charset=utf-8"
                );
                assert_eq!(res.headers().get(CACHE_CONTROL).unwrap(), "no-store");
            }
            RequestOrResponse::Request(_) => panic!("x.com should be blocked"),
        }
        assert_eq!(ctx.block_count(), 1);
    }

    #[test]
    fn test_allowed_request_forwarded() {
        let (h, ctx) = handler();
        match h.decide(request(Method::GET, "http://docs.rs/")) {
            RequestOrResponse::Request(req) => assert_eq!(req.uri().host(), Some("docs.rs")),
            RequestOrResponse::Response(_) => panic!("docs.rs should pass"),
        }
        assert_eq!(ctx.log_len(), 1);
    }

    #[test]
    fn test_connect_is_not_classified() {
        let (h, ctx) = handler();
        let req = request(Method::CONNECT, "x.com:443");
        assert!(matches!(h.decide(req), RequestOrResponse::Request(_)));
        assert_eq!(ctx.log_len(), 0);
    }

    #[test]
    fn test_host_header_fallback() {
        let req = Request::builder()
            .uri("/path")
            .header(HOST, "X.com:8080")
            .body(())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("X.com"));

        let req = Request::builder()
            .uri("/")
            .header(HOST, "[::1]:80")
            .body(())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("::1"));

        let req = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(request_host(&req), None);
    }
}
