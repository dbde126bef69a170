use std::sync::Arc;

use reqwest::StatusCode;

use warden_callback::store::{FilePgtStore, InMemoryPgtStore, PgtStore};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(store: Arc<dyn PgtStore>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = warden_callback::app::build_app(store);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn pgt_is_handed_out_exactly_once() {
    let server = TestServer::spawn(Arc::new(InMemoryPgtStore::new())).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/receive_pgt?pgtId=PGT-baz&pgtIou=PGTIOU-foo"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("/retrieve_pgt?pgtIou=PGTIOU-foo"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "PGT-baz");

    let res = client
        .get(server.url("/retrieve_pgt?pgtIou=PGTIOU-foo"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("may already have been retrieved"));
}

#[tokio::test]
async fn receive_accepts_get_like_cas_servers_send() {
    let store = Arc::new(InMemoryPgtStore::new());
    let server = TestServer::spawn(store.clone()).await;

    let res = reqwest::get(server.url("/receive_pgt?pgtId=PGT-1&pgtIou=PGTIOU-1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.pop("PGTIOU-1").unwrap().as_deref(), Some("PGT-1"));
}

#[tokio::test]
async fn missing_parameters_are_reported() {
    let store = Arc::new(InMemoryPgtStore::new());
    let server = TestServer::spawn(store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/receive_pgt?pgtIou=PGTIOU-foo"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("pgtId is a required parameter"));

    let res = client
        .post(server.url("/receive_pgt?pgtId=PGT-baz"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("pgtIou is a required parameter"));

    let res = client.get(server.url("/retrieve_pgt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(store.is_empty());
}

#[tokio::test]
async fn probe_without_parameters_succeeds_without_storing() {
    let store = Arc::new(InMemoryPgtStore::new());
    let server = TestServer::spawn(store.clone()).await;

    let res = reqwest::Client::new()
        .post(server.url("/receive_pgt"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.text().await.unwrap().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn unknown_iou_is_not_found() {
    let server = TestServer::spawn(Arc::new(InMemoryPgtStore::new())).await;

    let res = reqwest::get(server.url("/retrieve_pgt?pgtIou=PGTIOU-never"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn file_store_outlives_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pgt-store.json");

    {
        let server = TestServer::spawn(Arc::new(FilePgtStore::open(&path).unwrap())).await;
        let res = reqwest::get(server.url("/receive_pgt?pgtId=PGT-durable&pgtIou=PGTIOU-durable"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let server = TestServer::spawn(Arc::new(FilePgtStore::open(&path).unwrap())).await;
    let res = reqwest::get(server.url("/retrieve_pgt?pgtIou=PGTIOU-durable"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "PGT-durable");
}

#[tokio::test]
async fn concurrent_retrievals_get_one_pgt() {
    let store = Arc::new(InMemoryPgtStore::new());
    store.put("PGTIOU-race", "PGT-race").unwrap();
    let server = TestServer::spawn(store).await;
    let client = reqwest::Client::new();

    let requests = (0..10).map(|_| {
        let client = client.clone();
        let url = server.url("/retrieve_pgt?pgtIou=PGTIOU-race");
        tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
    });

    let mut ok = 0;
    for request in requests.collect::<Vec<_>>() {
        match request.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::NOT_FOUND => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn(Arc::new(InMemoryPgtStore::new())).await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
