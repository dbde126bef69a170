use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use url::Url;
use uuid::Uuid;

use warden_auth::{AuthOutcome, Authority, Composite, Configuration, CredentialKind, Credentials, StaticAuthority};
use warden_callback::store::InMemoryPgtStore;
use warden_cas::{CasAuthority, CasClient, CasConfig, CasError, RetrievalPolicy, TicketKind};
use warden_core::Portal;

const SERVICE: &str = "https://app.example.edu/";
const BACKEND: &str = "https://reports.example.edu/";

struct Spawned {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Spawned {
    async fn serve(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.base_url, path)).unwrap()
    }
}

impl Drop for Spawned {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Minimal CAS 2.0 server: single-use tickets, PGT delivery to `pgtUrl`,
/// and `/proxy` issuing proxy tickets.
#[derive(Clone, Default)]
struct FakeCas {
    /// ticket → (username, proxy chain)
    tickets: Arc<Mutex<HashMap<String, (String, Vec<String>)>>>,
    /// pgt → (username, callback it was delivered to)
    pgts: Arc<Mutex<HashMap<String, (String, String)>>>,
    proxy_requests: Arc<AtomicUsize>,
    skip_delivery: bool,
}

impl FakeCas {
    fn issue_service_ticket(&self, username: &str) -> String {
        let ticket = format!("ST-{}", Uuid::now_v7());
        self.tickets
            .lock()
            .unwrap()
            .insert(ticket.clone(), (username.to_string(), Vec::new()));
        ticket
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/cas/serviceValidate", get(validate))
            .route("/cas/proxyValidate", get(validate))
            .route("/cas/proxy", get(proxy))
            .with_state(self.clone())
    }
}

fn envelope(body: &str) -> String {
    format!(r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">{body}</cas:serviceResponse>"#)
}

async fn validate(State(cas): State<FakeCas>, Query(params): Query<HashMap<String, String>>) -> String {
    let ticket = params.get("ticket").cloned().unwrap_or_default();
    let issued = cas.tickets.lock().unwrap().remove(&ticket);
    let Some((username, proxies)) = issued else {
        return envelope(&format!(
            r#"<cas:authenticationFailure code="INVALID_TICKET">ticket {ticket} not recognized</cas:authenticationFailure>"#
        ));
    };

    let mut pgt_element = String::new();
    if let Some(callback) = params.get("pgtUrl") {
        let pgt = format!("PGT-{}", Uuid::now_v7());
        let pgt_iou = format!("PGTIOU-{}", Uuid::now_v7());

        if !cas.skip_delivery {
            let mut delivery = Url::parse(callback).unwrap();
            delivery
                .query_pairs_mut()
                .append_pair("pgtId", &pgt)
                .append_pair("pgtIou", &pgt_iou);
            let status = reqwest::get(delivery).await.unwrap().status();
            assert!(status.is_success());
        }

        cas.pgts
            .lock()
            .unwrap()
            .insert(pgt, (username.clone(), callback.clone()));
        pgt_element = format!("<cas:proxyGrantingTicket>{pgt_iou}</cas:proxyGrantingTicket>");
    }

    let proxies_element = if proxies.is_empty() {
        String::new()
    } else {
        let items: String = proxies.iter().map(|p| format!("<cas:proxy>{p}</cas:proxy>")).collect();
        format!("<cas:proxies>{items}</cas:proxies>")
    };

    envelope(&format!(
        "<cas:authenticationSuccess><cas:user>{username}</cas:user>{pgt_element}{proxies_element}</cas:authenticationSuccess>"
    ))
}

async fn proxy(State(cas): State<FakeCas>, Query(params): Query<HashMap<String, String>>) -> String {
    cas.proxy_requests.fetch_add(1, Ordering::SeqCst);

    let pgt = params.get("pgt").cloned().unwrap_or_default();
    let Some((username, callback)) = cas.pgts.lock().unwrap().get(&pgt).cloned() else {
        return envelope(r#"<cas:proxyFailure code="INVALID_TICKET">unknown pgt</cas:proxyFailure>"#);
    };

    let ticket = format!("PT-{}", Uuid::now_v7());
    cas.tickets
        .lock()
        .unwrap()
        .insert(ticket.clone(), (username, vec![callback]));
    envelope(&format!("<cas:proxySuccess><cas:proxyTicket>{ticket}</cas:proxyTicket></cas:proxySuccess>"))
}

struct Harness {
    cas: FakeCas,
    store: Arc<InMemoryPgtStore>,
    cas_server: Spawned,
    callback_server: Spawned,
}

impl Harness {
    async fn start(cas: FakeCas) -> Self {
        let store = Arc::new(InMemoryPgtStore::new());
        let callback_server = Spawned::serve(warden_callback::app::build_app(store.clone())).await;
        let cas_server = Spawned::serve(cas.router()).await;
        Self {
            cas,
            store,
            cas_server,
            callback_server,
        }
    }

    fn config(&self) -> CasConfig {
        CasConfig::new(self.cas_server.url("/cas"))
            .with_proxy_callback(
                self.callback_server.url("/receive_pgt"),
                self.callback_server.url("/retrieve_pgt"),
            )
            .with_retrieval(RetrievalPolicy {
                attempts: 3,
                interval_ms: 10,
            })
    }

    fn client(&self) -> CasClient {
        CasClient::new(self.config()).unwrap()
    }
}

#[tokio::test]
async fn service_ticket_login_collects_the_pgt() {
    let harness = Harness::start(FakeCas::default()).await;
    let ticket = harness.cas.issue_service_ticket("jo");

    let user = harness
        .client()
        .authenticate(TicketKind::Service, &ticket, SERVICE)
        .await
        .unwrap()
        .expect("ticket should validate");

    assert_eq!(user.username(), "jo");
    let cas = user.cas.as_ref().unwrap();
    assert!(cas.pgt.as_deref().unwrap().starts_with("PGT-"));
    assert!(cas.proxies.is_empty());
    assert!(cas.base_url.ends_with("/cas"));
    // The callback handed the PGT out and forgot it.
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn rejected_ticket_is_no_user() {
    let harness = Harness::start(FakeCas::default()).await;
    let ticket = harness.cas.issue_service_ticket("jo");
    let client = harness.client();

    assert!(client.authenticate(TicketKind::Service, &ticket, SERVICE).await.unwrap().is_some());
    // Tickets are single-use.
    assert!(client.authenticate(TicketKind::Service, &ticket, SERVICE).await.unwrap().is_none());
}

#[tokio::test]
async fn each_proxy_ticket_is_a_fresh_request() {
    let harness = Harness::start(FakeCas::default()).await;
    let ticket = harness.cas.issue_service_ticket("jo");
    let client = harness.client();
    let user = client
        .authenticate(TicketKind::Service, &ticket, SERVICE)
        .await
        .unwrap()
        .unwrap();

    let first = client.proxy_ticket_for(&user, BACKEND).await.unwrap();
    let second = client.proxy_ticket_for(&user, BACKEND).await.unwrap();

    assert!(first.starts_with("PT-"));
    assert_ne!(first, second);
    assert_eq!(harness.cas.proxy_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn composite_authenticates_proxy_tickets_with_their_chain() {
    let harness = Harness::start(FakeCas::default()).await;
    let ticket = harness.cas.issue_service_ticket("jo");
    let front = harness.client();
    let user = front
        .authenticate(TicketKind::Service, &ticket, SERVICE)
        .await
        .unwrap()
        .unwrap();
    let proxy_ticket = front.proxy_ticket_for(&user, BACKEND).await.unwrap();

    // The downstream service validates without asking for its own PGT.
    let backend = CasAuthority::new(CasClient::new(CasConfig::new(harness.cas_server.url("/cas"))).unwrap());
    let mut directory = StaticAuthority::new();
    directory.user("jo").first_name("Jo").last_name("Mueller");
    let authorities: Vec<Arc<dyn Authority>> = vec![Arc::new(backend), Arc::new(directory)];
    let composite = Composite::new(Configuration::new().with_portal("ENU"), authorities);

    let outcome = composite
        .valid_credentials(&CredentialKind::CasProxy, &Credentials::new([proxy_ticket.as_str(), BACKEND]))
        .await
        .unwrap();

    let AuthOutcome::Authenticated(user) = outcome else {
        panic!("expected authentication, got {outcome:?}");
    };
    assert_eq!(user.full_name(), "Jo Mueller");
    assert_eq!(user.default_portal, Some(Portal::from("ENU")));
    let cas = user.cas.unwrap();
    assert_eq!(cas.proxies, vec![harness.callback_server.url("/receive_pgt").to_string()]);
    assert_eq!(cas.pgt, None);
}

#[tokio::test]
async fn composite_reports_bad_tickets_as_invalid() {
    let harness = Harness::start(FakeCas::default()).await;
    let cas: Arc<dyn Authority> = Arc::new(CasAuthority::new(harness.client()));
    let composite = Composite::new(Configuration::new(), vec![cas]);

    let outcome = composite
        .valid_credentials(&CredentialKind::Cas, &Credentials::new(["ST-forged", SERVICE]))
        .await
        .unwrap();
    assert_eq!(outcome.http_status(), 401);

    let outcome = composite
        .valid_credentials(&CredentialKind::User, &Credentials::new(["jo", "secret"]))
        .await
        .unwrap();
    assert!(matches!(outcome, AuthOutcome::Invalid { .. }));
}

#[tokio::test]
async fn undelivered_pgt_gives_up_after_the_policy() {
    let harness = Harness::start(FakeCas {
        skip_delivery: true,
        ..FakeCas::default()
    })
    .await;
    let ticket = harness.cas.issue_service_ticket("jo");

    let err = harness
        .client()
        .authenticate(TicketKind::Service, &ticket, SERVICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CasError::PgtNotDelivered { attempts: 3, .. }));
}

#[tokio::test]
async fn pgt_iou_without_retrieval_url_is_an_error() {
    let harness = Harness::start(FakeCas::default()).await;
    let ticket = harness.cas.issue_service_ticket("jo");
    let mut config = harness.config();
    config.proxy_retrieval_url = None;

    let err = CasClient::new(config)
        .unwrap()
        .authenticate(TicketKind::Service, &ticket, SERVICE)
        .await
        .unwrap_err();
    assert!(matches!(err, CasError::MissingRetrievalUrl));
}

#[tokio::test]
async fn proxying_requires_a_pgt() {
    let harness = Harness::start(FakeCas::default()).await;
    let user = warden_auth::User::new("jo");

    let err = harness.client().proxy_ticket_for(&user, BACKEND).await.unwrap_err();
    assert!(matches!(err, CasError::NoProxyGrantingTicket(name) if name == "jo"));
    assert_eq!(harness.cas.proxy_requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_cas_is_an_authority_error() {
    let harness = Harness::start(FakeCas::default()).await;
    let mut config = harness.config();
    config.base_url = harness.cas_server.url("/missing");
    let cas: Arc<dyn Authority> = Arc::new(CasAuthority::new(CasClient::new(config).unwrap()));
    let composite = Composite::new(Configuration::new(), vec![cas]);

    let result = composite
        .valid_credentials(&CredentialKind::Cas, &Credentials::new(["ST-1", SERVICE]))
        .await;
    assert!(matches!(result, Err(warden_auth::AuthorityError::Backend { .. })));
}
