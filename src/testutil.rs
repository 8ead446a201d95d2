//! In-process fake upstreams for provider tests

use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct StubUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubUpstream {
    pub async fn start(router: Router) -> Self {
        let requests: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
        let recorder = requests.clone();
        let app = router.layer(middleware::from_fn(move |req: Request, next: Next| {
            let recorder = recorder.clone();
            async move {
                let path = req.uri().path().to_string();
                let query = req.uri().query().unwrap_or("").to_string();
                recorder.lock().push((path, query));
                next.run(req).await
            }
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, requests }
    }

    /// A stub answering `path` with a fixed JSON body.
    pub async fn json(path: &str, body: Value) -> Self {
        Self::start(Router::new().route(
            path,
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        ))
        .await
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|(p, _)| p == path).count()
    }

    /// Raw query strings received on `path`, in arrival order.
    pub fn queries(&self, path: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, q)| q.clone())
            .collect()
    }
}

/// Does a raw query string carry `key=value`?
pub fn has_param(query: &str, key: &str, value: &str) -> bool {
    query.split('&').any(|pair| {
        let mut it = pair.splitn(2, '=');
        let decoded = it
            .nth(1)
            .map(|v| v.replace("%2C", ",").replace("%3A", ":").replace('+', " "));
        pair.split('=').next() == Some(key) && decoded.as_deref() == Some(value)
    })
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}
